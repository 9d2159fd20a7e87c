//! Horizontal bar chart of the busiest sub-accounts

use super::format::{format_count, truncate_label};
use super::pdf::{Font, Page, Rgb};
use crate::summary::UsageSummary;

const LABEL_CHARS: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub sent: u64,
    pub delivered: u64,
}

/// Data that can actually be charted
///
/// Constructing one is the capability check: there is no way to get a
/// `ChartSeries` without at least one bar and a non-zero scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    bars: Vec<Bar>,
    max: u64,
}

/// Drawing area in page coordinates, origin bottom-left
#[derive(Debug, Clone, Copy)]
pub struct Area {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ChartSeries {
    /// Top `limit` records by send volume, or `None` when there is nothing to draw
    pub fn from_summary(summary: &UsageSummary, limit: usize) -> Option<Self> {
        let bars: Vec<Bar> = summary
            .records()
            .iter()
            .take(limit)
            .map(|record| Bar {
                label: record.label().to_string(),
                sent: record.counts().sent,
                delivered: record.counts().delivered,
            })
            .collect();

        let max = bars.iter().map(|b| b.sent.max(b.delivered)).max()?;
        if max == 0 {
            return None;
        }
        Some(Self { bars, max })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn draw(&self, page: &mut Page, area: Area) {
        let legend_height = 18.0;
        let label_width = 130.0;
        let value_width = 60.0;
        let plot_x = area.x + label_width;
        let plot_width = area.width - label_width - value_width;
        let slot = (area.height - legend_height) / self.bars.len().max(1) as f32;
        let bar_height = (slot * 0.6).min(18.0);

        let top = area.y + area.height;
        for (i, bar) in self.bars.iter().enumerate() {
            let slot_top = top - slot * i as f32;
            let bar_y = slot_top - (slot + bar_height) / 2.0;

            page.text(
                area.x,
                bar_y + bar_height / 2.0 - 3.0,
                8.0,
                Font::Regular,
                Rgb::BLACK,
                &truncate_label(&bar.label, LABEL_CHARS),
            );

            let sent_width = self.scale(bar.sent, plot_width);
            let delivered_width = self.scale(bar.delivered, plot_width);
            page.fill_rect(plot_x, bar_y, sent_width, bar_height, Rgb::BLUE);
            // delivered drawn inside the sent bar, lower half
            page.fill_rect(plot_x, bar_y, delivered_width, bar_height / 2.0, Rgb::GREEN);

            page.text(
                plot_x + sent_width + 4.0,
                bar_y + bar_height / 2.0 - 3.0,
                8.0,
                Font::Regular,
                Rgb::GRAY,
                &format_count(bar.sent),
            );
        }

        page.line(
            (plot_x, area.y + legend_height),
            (plot_x, top),
            0.5,
            Rgb::GRAY,
        );

        let legend_y = area.y + 4.0;
        page.fill_rect(plot_x, legend_y, 10.0, 8.0, Rgb::BLUE);
        page.text(plot_x + 14.0, legend_y + 1.0, 8.0, Font::Regular, Rgb::BLACK, "Sent");
        page.fill_rect(plot_x + 60.0, legend_y, 10.0, 8.0, Rgb::GREEN);
        page.text(plot_x + 74.0, legend_y + 1.0, 8.0, Font::Regular, Rgb::BLACK, "Delivered");
    }

    fn scale(&self, value: u64, full_width: f32) -> f32 {
        (value as f64 / self.max as f64) as f32 * full_width
    }
}
