use anyhow::Result;
use colored::Colorize;
use smtp2go_usage::cli::SettingsArgs;
use smtp2go_usage::config::{self, Lenient, RawSettings, Settings};
use smtp2go_usage::logging::SensitiveValue;
use std::collections::HashMap;
use tracing::info;

/// Execute the config show command
///
/// Displays the merged configuration with secrets masked
pub fn show(args: &SettingsArgs, env: &HashMap<String, String>) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!("Loading configuration for display");

    let raw = config::load_raw(args, env)?;
    let sanitized = sanitize_secrets(&raw);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&sanitized)?;
    println!("{}", toml_string);

    info!("Configuration displayed successfully");
    Ok(())
}

/// Execute the config validate command
///
/// Validates the merged configuration without contacting any service
pub fn validate(args: &SettingsArgs, env: &HashMap<String, String>) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!("Validating configuration");

    let settings = Settings::load(args, env)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  {}: {}", "API".cyan(), settings.api_url);
    match &settings.outbox_dir {
        Some(dir) => println!("  {}: outbox {}", "Delivery".cyan(), dir.display()),
        None => println!(
            "  {}: {}:{} ({:?})",
            "Delivery".cyan(),
            settings.smtp.server,
            settings.smtp.port,
            settings.smtp.security
        ),
    }
    println!("  {}: {}", "Sender".cyan(), settings.sender_email);
    println!("  {}: {}", "Recipients".cyan(), settings.recipients.len());
    for recipient in &settings.recipients {
        println!("    - {}", recipient);
    }
    println!(
        "  {}: {}",
        "Sub-accounts".cyan(),
        settings
            .subaccounts
            .as_ref()
            .map(|ids| ids.join(", "))
            .unwrap_or_else(|| "all".to_string())
    );
    println!(
        "  {}: {}",
        "Period".cyan(),
        settings
            .period
            .map(|p| p.label())
            .unwrap_or_else(|| "previous calendar month".to_string())
    );
    println!(
        "  {}: {}",
        "Comparison".cyan(),
        if settings.compare_previous {
            "enabled".green()
        } else {
            "disabled".red()
        }
    );
    println!("  {}: {}", "Report directory".cyan(), settings.report_dir.display());

    info!("Configuration validation successful");
    Ok(())
}

/// Mask secrets in the merged configuration for safe display
fn sanitize_secrets(raw: &RawSettings) -> RawSettings {
    let mut sanitized = raw.clone();
    sanitized.api_key = raw.api_key.as_deref().map(mask_secret);
    sanitized.smtp_password = raw.smtp_password.as_deref().map(mask_secret);
    sanitized
}

fn mask_secret(secret: &str) -> String {
    SensitiveValue::new(secret).to_string()
}
