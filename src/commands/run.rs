use chrono::Utc;
use smtp2go_usage::cli::SettingsArgs;
use smtp2go_usage::pipeline;
use std::collections::HashMap;
use std::process::ExitCode;

/// Execute the run command
///
/// Produces and sends the report for the previous calendar month (or the
/// configured override), returning the exit status for the failure kind.
pub async fn execute(args: &SettingsArgs, env: &HashMap<String, String>) -> ExitCode {
    pipeline::run(args, env, Utc::now()).await
}
