use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "smtp2go-usage",
    version,
    about = "SMTP2GO Monthly Usage Reporter",
    long_about = "Fetches last month's SMTP2GO usage per sub-account, renders a PDF report \
                  and emails it. Every setting can also come from SMTP2GO_* environment \
                  variables or a configuration file; flags take precedence."
)]
pub struct Cli {
    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Log output format
    #[arg(long, value_enum, env = "SMTP2GO_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Flags overriding individual configuration fields
///
/// Every field is optional; an absent flag falls through to the
/// environment, the configuration file, and finally the built-in default.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Configuration file path (TOML, INI, JSON or YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SMTP2GO API key
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Usage API base URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// SMTP server for sending reports
    #[arg(long, global = true)]
    pub smtp_server: Option<String>,

    /// SMTP port for sending reports
    #[arg(long, global = true)]
    pub smtp_port: Option<u16>,

    /// SMTP connection security: starttls, tls or none
    #[arg(long, global = true, value_parser = ["starttls", "tls", "none"])]
    pub smtp_security: Option<String>,

    /// SMTP username for sending reports
    #[arg(long, global = true)]
    pub smtp_username: Option<String>,

    /// SMTP password for sending reports
    #[arg(long, global = true)]
    pub smtp_password: Option<String>,

    /// Sender email address for reports
    #[arg(long, global = true)]
    pub sender_email: Option<String>,

    /// Comma-separated list of email addresses to send reports to
    #[arg(long, global = true)]
    pub report_recipients: Option<String>,

    /// Directory to save generated PDF reports
    #[arg(long, global = true)]
    pub report_dir: Option<PathBuf>,

    /// Write the report email as .eml files here instead of using SMTP
    #[arg(long, global = true)]
    pub outbox_dir: Option<PathBuf>,

    /// Comma-separated sub-account ids to report on (default: all)
    #[arg(long, global = true)]
    pub subaccounts: Option<String>,

    /// Report on this month instead of the previous one (YYYY-MM)
    #[arg(long, global = true, conflicts_with_all = ["start_date", "end_date"])]
    pub month: Option<String>,

    /// Custom period start date (YYYY-MM-DD, inclusive)
    #[arg(long, global = true, requires = "end_date")]
    pub start_date: Option<String>,

    /// Custom period end date (YYYY-MM-DD, exclusive)
    #[arg(long, global = true, requires = "start_date")]
    pub end_date: Option<String>,

    /// Skip the previous-period comparison
    #[arg(long, global = true)]
    pub no_compare: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Fetch, render and email the usage report (default)
    Run,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display resolved configuration (with secrets masked)
    Show,

    /// Validate configuration without contacting any service
    Validate,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Get the command to execute, defaulting to Run if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}
