//! Usage summary model and the pure summarization step
//!
//! `summarize` turns raw per-sub-account API objects into a [`UsageSummary`].
//! Aggregate totals are computed inside [`UsageSummary::new`] from the records
//! themselves, so they always equal the element-wise sum of the records.

use crate::client::RawStats;
use crate::period::ReportingPeriod;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Message counters for one sub-account or for a whole period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounts {
    pub sent: u64,
    pub delivered: u64,
    pub bounced: u64,
    pub rejected: u64,
    pub opened: u64,
    pub clicked: u64,
    pub unsubscribed: u64,
}

impl UsageCounts {
    pub fn delivery_rate(&self) -> f64 {
        rate(self.delivered, self.sent)
    }

    pub fn bounce_rate(&self) -> f64 {
        rate(self.bounced, self.sent)
    }

    /// Value of one metric, used for comparisons and tables
    pub fn get(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Sent => self.sent,
            Metric::Delivered => self.delivered,
            Metric::Bounced => self.bounced,
            Metric::Rejected => self.rejected,
            Metric::Opened => self.opened,
            Metric::Clicked => self.clicked,
            Metric::Unsubscribed => self.unsubscribed,
        }
    }
}

impl Add for UsageCounts {
    type Output = UsageCounts;

    fn add(mut self, rhs: UsageCounts) -> UsageCounts {
        self += rhs;
        self
    }
}

impl AddAssign for UsageCounts {
    fn add_assign(&mut self, rhs: UsageCounts) {
        self.sent = self.sent.saturating_add(rhs.sent);
        self.delivered = self.delivered.saturating_add(rhs.delivered);
        self.bounced = self.bounced.saturating_add(rhs.bounced);
        self.rejected = self.rejected.saturating_add(rhs.rejected);
        self.opened = self.opened.saturating_add(rhs.opened);
        self.clicked = self.clicked.saturating_add(rhs.clicked);
        self.unsubscribed = self.unsubscribed.saturating_add(rhs.unsubscribed);
    }
}

impl Sum for UsageCounts {
    fn sum<I: Iterator<Item = UsageCounts>>(iter: I) -> Self {
        iter.fold(UsageCounts::default(), Add::add)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Sent,
    Delivered,
    Bounced,
    Rejected,
    Opened,
    Clicked,
    Unsubscribed,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Sent,
        Metric::Delivered,
        Metric::Bounced,
        Metric::Rejected,
        Metric::Opened,
        Metric::Clicked,
        Metric::Unsubscribed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Sent => "Sent",
            Metric::Delivered => "Delivered",
            Metric::Bounced => "Bounced",
            Metric::Rejected => "Rejected",
            Metric::Opened => "Opened",
            Metric::Clicked => "Clicked",
            Metric::Unsubscribed => "Unsubscribed",
        }
    }

    /// Field names the API uses for this counter, in lookup order
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Metric::Sent => &["sent", "used", "emails", "email_count"],
            Metric::Delivered => &["delivered", "deliveries"],
            Metric::Bounced => &["bounces", "bounced", "bounce_count"],
            Metric::Rejected => &["rejects", "rejected", "reject_count"],
            Metric::Opened => &["opens", "opened", "open_count"],
            Metric::Clicked => &["clicks", "clicked", "click_count"],
            Metric::Unsubscribed => &["unsubscribes", "unsubscribed", "unsubscribe_count"],
        }
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0
pub fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Usage of one sub-account for one period
#[derive(Debug, Clone, PartialEq)]
pub struct SubaccountUsageRecord {
    id: String,
    label: String,
    counts: UsageCounts,
}

impl SubaccountUsageRecord {
    pub fn new(id: impl Into<String>, label: Option<String>, counts: UsageCounts) -> Self {
        let id = id.into();
        let label = label.unwrap_or_else(|| id.clone());
        Self { id, label, counts }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn counts(&self) -> &UsageCounts {
        &self.counts
    }

    pub fn delivery_rate(&self) -> f64 {
        self.counts.delivery_rate()
    }

    pub fn bounce_rate(&self) -> f64 {
        self.counts.bounce_rate()
    }
}

/// Period-over-period change for one metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delta {
    /// Percentage change relative to the previous period
    Percent(f64),
    /// Previous value was zero while the current one is not
    Unavailable,
}

impl Delta {
    pub fn between(previous: u64, current: u64) -> Self {
        match (previous, current) {
            (0, 0) => Delta::Percent(0.0),
            (0, _) => Delta::Unavailable,
            (p, c) => Delta::Percent((c as f64 - p as f64) / p as f64 * 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    /// No previous-period data was fetched
    Unavailable,
    Available {
        previous: UsageCounts,
        deltas: Vec<(Metric, Delta)>,
    },
}

impl Comparison {
    pub fn between(previous: UsageCounts, current: &UsageCounts) -> Self {
        let deltas = Metric::ALL
            .iter()
            .map(|metric| (*metric, Delta::between(previous.get(*metric), current.get(*metric))))
            .collect();
        Comparison::Available { previous, deltas }
    }

    pub fn delta(&self, metric: Metric) -> Option<Delta> {
        match self {
            Comparison::Unavailable => None,
            Comparison::Available { deltas, .. } => deltas
                .iter()
                .find(|(m, _)| *m == metric)
                .map(|(_, delta)| *delta),
        }
    }
}

/// Aggregated usage for one reporting period
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSummary {
    period: ReportingPeriod,
    generated_at: DateTime<Utc>,
    records: Vec<SubaccountUsageRecord>,
    totals: UsageCounts,
    comparison: Comparison,
}

impl UsageSummary {
    /// Build a summary; records are re-sorted and totals derived from them
    pub fn new(
        period: ReportingPeriod,
        generated_at: DateTime<Utc>,
        mut records: Vec<SubaccountUsageRecord>,
        previous_totals: Option<UsageCounts>,
    ) -> Self {
        records.sort_by(|a, b| b.counts.sent.cmp(&a.counts.sent).then_with(|| a.id.cmp(&b.id)));
        let totals: UsageCounts = records.iter().map(|r| r.counts).sum();
        let comparison = match previous_totals {
            Some(previous) => Comparison::between(previous, &totals),
            None => Comparison::Unavailable,
        };

        Self {
            period,
            generated_at,
            records,
            totals,
            comparison,
        }
    }

    pub fn period(&self) -> &ReportingPeriod {
        &self.period
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Records ordered by descending send volume
    pub fn records(&self) -> &[SubaccountUsageRecord] {
        &self.records
    }

    pub fn totals(&self) -> &UsageCounts {
        &self.totals
    }

    pub fn comparison(&self) -> &Comparison {
        &self.comparison
    }
}

/// Normalize raw API data into a [`UsageSummary`]
///
/// Pure apart from logging: missing or non-numeric counters become zero with
/// one warning each. `previous` is the raw data of the comparison period, if
/// it was fetched.
pub fn summarize(
    raw: &BTreeMap<String, RawStats>,
    period: &ReportingPeriod,
    previous: Option<&BTreeMap<String, RawStats>>,
    generated_at: DateTime<Utc>,
) -> UsageSummary {
    let records = raw
        .iter()
        .map(|(id, stats)| {
            let counts = extract_counts(id, &stats.fields);
            SubaccountUsageRecord::new(id.clone(), stats.label.clone(), counts)
        })
        .collect();

    let previous_totals = previous.map(|previous| {
        previous
            .iter()
            .map(|(id, stats)| extract_counts(id, &stats.fields))
            .sum()
    });

    UsageSummary::new(*period, generated_at, records, previous_totals)
}

/// Read every counter for one sub-account, substituting zero for gaps
fn extract_counts(id: &str, fields: &Map<String, Value>) -> UsageCounts {
    let read = |metric: Metric| lookup(fields, metric);

    let sent = read(Metric::Sent);
    let bounced = read(Metric::Bounced);
    let rejected = read(Metric::Rejected);
    let opened = read(Metric::Opened);
    let clicked = read(Metric::Clicked);
    let unsubscribed = read(Metric::Unsubscribed);
    let delivered = read(Metric::Delivered);

    let mut counts = UsageCounts::default();
    for (metric, value, slot) in [
        (Metric::Sent, sent, &mut counts.sent),
        (Metric::Bounced, bounced, &mut counts.bounced),
        (Metric::Rejected, rejected, &mut counts.rejected),
        (Metric::Opened, opened, &mut counts.opened),
        (Metric::Clicked, clicked, &mut counts.clicked),
        (Metric::Unsubscribed, unsubscribed, &mut counts.unsubscribed),
    ] {
        *slot = value.unwrap_or_else(|| {
            tracing::warn!(
                subaccount = id,
                field = metric.aliases()[0],
                "Missing or non-numeric counter, using 0"
            );
            0
        });
    }

    counts.delivered = match delivered {
        Some(value) => value,
        None => {
            let derived = counts
                .sent
                .saturating_sub(counts.bounced)
                .saturating_sub(counts.rejected);
            tracing::warn!(
                subaccount = id,
                field = "delivered",
                derived,
                "Missing delivered counter, derived from sent - bounces - rejects"
            );
            derived
        }
    };

    counts
}

/// First alias holding a non-negative integer (or integer-valued string)
fn lookup(fields: &Map<String, Value>, metric: Metric) -> Option<u64> {
    metric.aliases().iter().find_map(|key| match fields.get(*key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}
