//! PDF usage report
//!
//! Page 1 carries the headline figures, the period comparison and a chart of
//! the busiest sub-accounts; the remaining pages list every sub-account.
//! Rendering is a pure function of the [`UsageSummary`].

pub mod chart;
pub mod format;
pub mod pdf;

use crate::error::AppError;
use crate::period::ReportingPeriod;
use crate::summary::{Comparison, Metric, SubaccountUsageRecord, UsageSummary};
use chart::{Area, ChartSeries};
use chrono::{DateTime, Utc};
use format::{format_count, format_delta, format_percent, truncate_label};
use pdf::{Font, Page, Rgb, MARGIN, PAGE_HEIGHT, PAGE_WIDTH};
use std::path::{Path, PathBuf};

pub const REPORT_TITLE: &str = "SMTP2GO Usage Report";
pub const ROWS_PER_PAGE: usize = 30;
pub const CHART_TOP_N: usize = 10;

const NO_COMPARISON_LINE: &str = "Previous period comparison: N/A";
const NO_CHART_NOTE: &str = "Chart unavailable: no send volume recorded for this period.";
const DETAIL_LABEL_CHARS: usize = 34;
const ROW_HEIGHT: f32 = 16.0;

/// A rendered report, ready to be written out or attached
#[derive(Debug, Clone, PartialEq)]
pub struct ReportArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub generated_at: DateTime<Utc>,
    pub period: ReportingPeriod,
}

impl ReportArtifact {
    /// Write the PDF into `dir`, creating it if needed
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, AppError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        tracing::info!(
            path = %path.display(),
            bytes = self.bytes.len(),
            "Report written"
        );
        Ok(path)
    }
}

pub fn report_filename(period: &ReportingPeriod) -> String {
    format!("smtp2go-usage-{}.pdf", period.slug())
}

/// Render `summary` into a PDF artifact
pub fn render(summary: &UsageSummary) -> Result<ReportArtifact, AppError> {
    let chunks: Vec<&[SubaccountUsageRecord]> = summary.records().chunks(ROWS_PER_PAGE).collect();
    let total_pages = 1 + chunks.len();

    let mut pages = Vec::with_capacity(total_pages);
    pages.push(summary_page(summary));
    for (i, chunk) in chunks.iter().enumerate() {
        pages.push(detail_page(chunk, i * ROWS_PER_PAGE));
    }
    for (i, page) in pages.iter_mut().enumerate() {
        footer(page, summary.period(), i + 1, total_pages);
    }

    let title = format!("{} - {}", REPORT_TITLE, summary.period().label());
    let bytes = pdf::write_document(&title, summary.generated_at(), pages)?;

    tracing::debug!(
        pages = total_pages,
        bytes = bytes.len(),
        records = summary.records().len(),
        "Rendered report"
    );

    Ok(ReportArtifact {
        filename: report_filename(summary.period()),
        bytes,
        generated_at: summary.generated_at(),
        period: *summary.period(),
    })
}

fn summary_page(summary: &UsageSummary) -> Page {
    let mut page = Page::new();
    let left = MARGIN;
    let right = PAGE_WIDTH - MARGIN;
    let mut y = PAGE_HEIGHT - MARGIN - 10.0;

    page.text(left, y, 20.0, Font::Bold, Rgb::HEADER, REPORT_TITLE);
    y -= 24.0;
    page.text(
        left,
        y,
        12.0,
        Font::Regular,
        Rgb::BLACK,
        &format!("Reporting period: {}", summary.period().label()),
    );
    y -= 16.0;
    page.text(
        left,
        y,
        9.0,
        Font::Regular,
        Rgb::GRAY,
        &format!(
            "Generated: {}",
            summary.generated_at().format("%Y-%m-%d %H:%M UTC")
        ),
    );

    y -= 32.0;
    page.text(left, y, 14.0, Font::Bold, Rgb::BLACK, "Summary");
    y -= 20.0;

    let totals = summary.totals();
    let comparison = summary.comparison();
    let (current_x, previous_x, change_x) = (300.0, 410.0, right);

    page.fill_rect(left, y - 4.0, right - left, ROW_HEIGHT, Rgb::LIGHT_GRAY);
    page.text(left + 4.0, y, 10.0, Font::Bold, Rgb::BLACK, "Metric");
    page.text_right(current_x, y, 10.0, Font::Bold, Rgb::BLACK, "Current");
    if let Comparison::Available { .. } = comparison {
        page.text_right(previous_x, y, 10.0, Font::Bold, Rgb::BLACK, "Previous");
        page.text_right(change_x - 4.0, y, 10.0, Font::Bold, Rgb::BLACK, "Change");
    }
    y -= ROW_HEIGHT;

    for metric in Metric::ALL {
        page.text(left + 4.0, y, 10.0, Font::Regular, Rgb::BLACK, metric.label());
        page.text_right(
            current_x,
            y,
            10.0,
            Font::Regular,
            Rgb::BLACK,
            &format_count(totals.get(metric)),
        );
        if let Comparison::Available { previous, .. } = comparison {
            page.text_right(
                previous_x,
                y,
                10.0,
                Font::Regular,
                Rgb::BLACK,
                &format_count(previous.get(metric)),
            );
            if let Some(delta) = comparison.delta(metric) {
                page.text_right(
                    change_x - 4.0,
                    y,
                    10.0,
                    Font::Regular,
                    Rgb::BLACK,
                    &format_delta(delta),
                );
            }
        }
        y -= ROW_HEIGHT;
    }

    let derived = [
        ("Delivery rate", format_percent(totals.delivery_rate())),
        ("Bounce rate", format_percent(totals.bounce_rate())),
        ("Sub-accounts", summary.records().len().to_string()),
    ];
    for (label, value) in derived {
        page.text(left + 4.0, y, 10.0, Font::Regular, Rgb::BLACK, label);
        page.text_right(current_x, y, 10.0, Font::Regular, Rgb::BLACK, &value);
        y -= ROW_HEIGHT;
    }

    if *comparison == Comparison::Unavailable {
        y -= 4.0;
        page.text(left, y, 10.0, Font::Regular, Rgb::GRAY, NO_COMPARISON_LINE);
        y -= ROW_HEIGHT;
    }

    y -= 24.0;
    page.text(
        left,
        y,
        14.0,
        Font::Bold,
        Rgb::BLACK,
        &format!("Top {} sub-accounts by volume", CHART_TOP_N),
    );
    y -= 12.0;

    match ChartSeries::from_summary(summary, CHART_TOP_N) {
        Some(series) => {
            let bottom = MARGIN + 30.0;
            series.draw(
                &mut page,
                Area {
                    x: left,
                    y: bottom,
                    width: right - left,
                    height: y - bottom,
                },
            );
        }
        None => {
            tracing::info!("No send volume to chart, rendering tables only");
            y -= 14.0;
            page.text(left, y, 10.0, Font::Regular, Rgb::GRAY, NO_CHART_NOTE);
        }
    }

    page
}

fn detail_page(records: &[SubaccountUsageRecord], offset: usize) -> Page {
    let mut page = Page::new();
    let left = MARGIN;
    let right = PAGE_WIDTH - MARGIN;
    let mut y = PAGE_HEIGHT - MARGIN - 10.0;

    page.text(left, y, 14.0, Font::Bold, Rgb::HEADER, "Sub-account detail");
    y -= 14.0;
    page.text(
        left,
        y,
        9.0,
        Font::Regular,
        Rgb::GRAY,
        &format!(
            "Sub-accounts {} to {}, ordered by messages sent",
            offset + 1,
            offset + records.len()
        ),
    );
    y -= 24.0;

    // right edges of the numeric columns
    let columns: [(&str, f32); 6] = [
        ("Sent", 290.0),
        ("Delivered", 345.0),
        ("Bounced", 395.0),
        ("Rejected", 445.0),
        ("Deliv. %", 495.0),
        ("Bounce %", right - 2.0),
    ];

    page.fill_rect(left, y - 4.0, right - left, ROW_HEIGHT, Rgb::LIGHT_GRAY);
    page.text(left + 2.0, y, 9.0, Font::Bold, Rgb::BLACK, "Sub-account");
    for (title, x) in columns {
        page.text_right(x, y, 9.0, Font::Bold, Rgb::BLACK, title);
    }
    y -= ROW_HEIGHT + 2.0;

    for (i, record) in records.iter().enumerate() {
        if i % 2 == 1 {
            page.fill_rect(left, y - 4.0, right - left, ROW_HEIGHT, Rgb::LIGHT_GRAY);
        }
        let counts = record.counts();
        let label = if record.label() == record.id() {
            record.id().to_string()
        } else {
            format!("{} ({})", record.label(), record.id())
        };
        page.text(
            left + 2.0,
            y,
            9.0,
            Font::Regular,
            Rgb::BLACK,
            &truncate_label(&label, DETAIL_LABEL_CHARS),
        );

        let values = [
            format_count(counts.sent),
            format_count(counts.delivered),
            format_count(counts.bounced),
            format_count(counts.rejected),
            format_percent(record.delivery_rate()),
            format_percent(record.bounce_rate()),
        ];
        for ((_, x), value) in columns.iter().zip(values.iter()) {
            page.text_right(*x, y, 9.0, Font::Regular, Rgb::BLACK, value);
        }
        y -= ROW_HEIGHT + 2.0;
    }

    page
}

fn footer(page: &mut Page, period: &ReportingPeriod, number: usize, total: usize) {
    let y = MARGIN - 20.0;
    page.line(
        (MARGIN, y + 12.0),
        (PAGE_WIDTH - MARGIN, y + 12.0),
        0.5,
        Rgb::LIGHT_GRAY,
    );
    page.text(
        MARGIN,
        y,
        8.0,
        Font::Regular,
        Rgb::GRAY,
        &format!("{} - {}", REPORT_TITLE, period.label()),
    );
    page.text_right(
        PAGE_WIDTH - MARGIN,
        y,
        8.0,
        Font::Regular,
        Rgb::GRAY,
        &format!("Page {} of {}", number, total),
    );
}
