//! One reporting run: fetch, summarize, render, persist, send
//!
//! Stages run strictly in sequence and the first failure aborts the run.
//! This is the only place that matches on [`AppError`] broadly, to log it
//! and turn it into an exit status.

use crate::cli::SettingsArgs;
use crate::client::UsageClient;
use crate::config::Settings;
use crate::error::AppError;
use crate::mailer::Mailer;
use crate::period::ReportingPeriod;
use crate::report;
use crate::summary::{summarize, UsageSummary};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// What a successful run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub summary: UsageSummary,
    pub report_path: PathBuf,
}

/// Run the whole pipeline and map the result to a process exit status
pub async fn run(args: &SettingsArgs, env: &HashMap<String, String>, now: DateTime<Utc>) -> ExitCode {
    match execute(args, env, now).await {
        Ok(outcome) => {
            info!(
                period = %outcome.summary.period(),
                report = %outcome.report_path.display(),
                "Usage report completed"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(
                component = err.component(),
                kind = err.kind(),
                error = %err,
                "Usage report failed"
            );
            ExitCode::from(err.exit_code())
        }
    }
}

/// Load settings, then run every stage
pub async fn execute(
    args: &SettingsArgs,
    env: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> Result<RunOutcome, AppError> {
    let settings = Settings::load(args, env)?;
    execute_with_settings(&settings, now).await
}

/// Run every stage with already validated settings
pub async fn execute_with_settings(
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<RunOutcome, AppError> {
    let period = settings
        .period
        .unwrap_or_else(|| ReportingPeriod::previous_month(now.date_naive()));
    info!(
        period = %period,
        start = %period.start_date(),
        end = %period.end_date(),
        "Starting usage report"
    );

    let client = UsageClient::from_settings(settings)?;
    // resolved once so both periods cover the same sub-accounts
    let subaccounts = client
        .resolve_subaccounts(settings.subaccounts.as_deref())
        .await?;

    let current = client.fetch_usage_for(&period, &subaccounts).await?;
    let previous = if settings.compare_previous {
        let previous_period = period.previous();
        info!(period = %previous_period, "Fetching comparison period");
        Some(client.fetch_usage_for(&previous_period, &subaccounts).await?)
    } else {
        None
    };

    let summary = summarize(&current, &period, previous.as_ref(), now);
    info!(
        records = summary.records().len(),
        sent = summary.totals().sent,
        delivered = summary.totals().delivered,
        "Usage summarized"
    );

    let artifact = report::render(&summary)?;
    let report_path = artifact.write_to(&settings.report_dir)?;

    let mailer = Mailer::from_settings(settings)?;
    mailer
        .send(&artifact, &settings.recipients, &summary)
        .await?;

    Ok(RunOutcome {
        summary,
        report_path,
    })
}
