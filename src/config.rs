use crate::cli::SettingsArgs;
use crate::error::AppError;
use crate::period::ReportingPeriod;
use crate::retry::RetryPolicy;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_PREFIX: &str = "SMTP2GO";
pub const CONFIG_FILE_ENV: &str = "SMTP2GO_CONFIG_FILE";
pub const DEFAULT_API_URL: &str = "https://api.smtp2go.com/v3";
pub const DEFAULT_SUBJECT_TEMPLATE: &str = "SMTP2GO Usage Report - {period}";

/// Settings exactly as merged from all sources, before validation
///
/// Every optional field may still be missing here; [`Settings::from_raw`]
/// turns this into a validated [`Settings`] or reports every problem.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSettings {
    pub api_key: Option<String>,
    pub api_url: String,
    pub timeout_seconds: Lenient<u64>,
    pub max_attempts: Lenient<u32>,
    pub retry_delay_ms: Lenient<u64>,

    pub smtp_server: String,
    pub smtp_port: Lenient<u16>,
    pub smtp_security: String,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub sender_email: Option<String>,

    pub report_recipients: Option<StringList>,
    pub subject_template: String,
    pub report_dir: PathBuf,
    pub outbox_dir: Option<PathBuf>,

    pub subaccounts: Option<StringList>,
    pub month: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub compare_previous: Lenient<bool>,
}

/// A typed value, or the text it was given as when it did not parse
///
/// Environment variables always arrive as text; keeping the text lets
/// [`Settings::from_raw`] report a bad number alongside every other problem.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Lenient<T> {
    Value(T),
    Text(String),
}

impl<T: FromStr + Copy> Lenient<T> {
    fn resolve(&self, field: &str, expected: &str, problems: &mut Vec<String>) -> Option<T> {
        match self {
            Self::Value(value) => Some(*value),
            Self::Text(text) => match text.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    problems.push(format!("invalid {} '{}': expected {}", field, text, expected));
                    None
                }
            },
        }
    }
}

impl Lenient<bool> {
    fn resolve_flag(&self, field: &str, problems: &mut Vec<String>) -> Option<bool> {
        if let Self::Text(text) = self {
            match text.trim().to_ascii_lowercase().as_str() {
                "1" | "yes" | "on" => return Some(true),
                "0" | "no" | "off" => return Some(false),
                _ => {}
            }
        }
        self.resolve(field, "true or false", problems)
    }
}

/// A list given either as a comma-separated string or as a native array
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum StringList {
    Joined(String),
    Items(Vec<String>),
}

impl StringList {
    /// Split, trim and drop empty entries
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Joined(joined) => parse_list(joined),
            Self::Items(items) => items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS (port 587)
    StartTls,
    /// Implicit TLS from the first byte (port 465)
    Tls,
    /// No transport security, for local relays only
    None,
}

impl SmtpSecurity {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "starttls" => Some(Self::StartTls),
            "tls" | "ssl" => Some(Self::Tls),
            "none" | "plain" => Some(Self::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub username: String,
    pub password: String,
}

/// Validated, immutable settings for one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub api_url: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub smtp: SmtpSettings,
    pub sender_email: String,
    pub recipients: Vec<String>,
    pub subject_template: String,
    pub report_dir: PathBuf,
    pub outbox_dir: Option<PathBuf>,
    /// Explicit sub-account filter; `None` means every sub-account
    pub subaccounts: Option<Vec<String>>,
    /// Explicit period override; `None` means the previous calendar month
    pub period: Option<ReportingPeriod>,
    pub compare_previous: bool,
}

impl Settings {
    /// Load settings from defaults, file, environment and flags
    ///
    /// Precedence, highest first: flag, environment variable, file entry,
    /// built-in default. `env` is passed in rather than read from the process
    /// so callers control exactly what is visible.
    pub fn load(args: &SettingsArgs, env: &HashMap<String, String>) -> Result<Self, AppError> {
        let raw = load_raw(args, env)?;
        Self::from_raw(&raw)
    }

    /// Validate merged settings, collecting every problem before failing
    pub fn from_raw(raw: &RawSettings) -> Result<Self, AppError> {
        let mut problems = Vec::new();

        let api_key = required(&raw.api_key, "api_key", &mut problems);
        let smtp_username = required(&raw.smtp_username, "smtp_username", &mut problems);
        let smtp_password = required(&raw.smtp_password, "smtp_password", &mut problems);
        let sender_email = required(&raw.sender_email, "sender_email", &mut problems);

        let recipients = raw
            .report_recipients
            .as_ref()
            .map(StringList::to_vec)
            .unwrap_or_default();
        if recipients.is_empty() {
            problems.push("missing required field: report_recipients".to_string());
        }
        for recipient in &recipients {
            if recipient.parse::<lettre::Address>().is_err() {
                problems.push(format!("invalid recipient address: {}", recipient));
            }
        }
        if let Some(sender) = &sender_email {
            if sender.parse::<lettre::Address>().is_err() {
                problems.push(format!("invalid sender_email: {}", sender));
            }
        }

        let security = SmtpSecurity::parse(&raw.smtp_security);
        if security.is_none() {
            problems.push(format!(
                "invalid smtp_security '{}': expected starttls, tls or none",
                raw.smtp_security
            ));
        }
        match reqwest::Url::parse(raw.api_url.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => problems.push(format!(
                "invalid api_url '{}': expected an http(s) URL",
                raw.api_url
            )),
        }

        let timeout_seconds = raw
            .timeout_seconds
            .resolve("timeout_seconds", "a whole number of seconds", &mut problems);
        let max_attempts = raw
            .max_attempts
            .resolve("max_attempts", "a positive integer", &mut problems);
        let retry_delay_ms = raw
            .retry_delay_ms
            .resolve("retry_delay_ms", "a whole number of milliseconds", &mut problems);
        let smtp_port = raw
            .smtp_port
            .resolve("smtp_port", "a port number", &mut problems);
        let compare_previous = raw
            .compare_previous
            .resolve_flag("compare_previous", &mut problems);

        if timeout_seconds == Some(0) {
            problems.push("timeout_seconds must be greater than zero".to_string());
        }
        if max_attempts == Some(0) {
            problems.push("max_attempts must be at least 1".to_string());
        }
        if !raw.subject_template.contains("{period}") {
            tracing::warn!(
                template = %raw.subject_template,
                "subject_template has no {{period}} placeholder"
            );
        }

        let period = match resolve_period(raw) {
            Ok(period) => period,
            Err(problem) => {
                problems.push(problem);
                None
            }
        };

        let subaccounts = raw
            .subaccounts
            .as_ref()
            .map(StringList::to_vec)
            .filter(|ids| !ids.is_empty());

        let (
            Some(api_key),
            Some(username),
            Some(password),
            Some(sender_email),
            Some(security),
            Some(timeout_seconds),
            Some(max_attempts),
            Some(retry_delay_ms),
            Some(smtp_port),
            Some(compare_previous),
        ) = (
            api_key,
            smtp_username,
            smtp_password,
            sender_email,
            security,
            timeout_seconds,
            max_attempts,
            retry_delay_ms,
            smtp_port,
            compare_previous,
        )
        else {
            return Err(AppError::Configuration { problems });
        };
        if !problems.is_empty() {
            return Err(AppError::Configuration { problems });
        }

        Ok(Settings {
            api_key,
            api_url: raw.api_url.trim().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(timeout_seconds),
            retry: RetryPolicy {
                max_attempts,
                initial_delay: Duration::from_millis(retry_delay_ms),
                ..RetryPolicy::default()
            },
            smtp: SmtpSettings {
                server: raw.smtp_server.clone(),
                port: smtp_port,
                security,
                username,
                password,
            },
            sender_email,
            recipients,
            subject_template: raw.subject_template.clone(),
            report_dir: raw.report_dir.clone(),
            outbox_dir: raw.outbox_dir.clone(),
            subaccounts,
            period,
            compare_previous,
        })
    }
}

/// Merge every source into [`RawSettings`] without validating
pub fn load_raw(args: &SettingsArgs, env: &HashMap<String, String>) -> Result<RawSettings, AppError> {
    let mut builder = config::Config::builder();
    builder = apply_defaults(builder).map_err(config_error)?;

    if let Some((path, required)) = resolve_config_path(args, env) {
        if required && !path.exists() {
            return Err(AppError::configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        tracing::debug!(path = %path.display(), "Loading configuration file");
        builder = builder.add_source(config::File::from(path.as_path()).required(required));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .ignore_empty(true)
            .source(Some(env.clone())),
    );

    builder = apply_overrides(builder, args).map_err(config_error)?;
    for key in superseded_period_keys(args, env) {
        builder = builder
            .set_override(*key, config::Value::new(None, config::ValueKind::Nil))
            .map_err(config_error)?;
    }

    let merged = builder.build().map_err(config_error)?;
    merged.try_deserialize().map_err(config_error)
}

/// Which configuration file to read, and whether it must exist
///
/// An explicit `--config` or `SMTP2GO_CONFIG_FILE` must exist; the default
/// `~/.smtp2go-usage/config.toml` is only used when present.
fn resolve_config_path(args: &SettingsArgs, env: &HashMap<String, String>) -> Option<(PathBuf, bool)> {
    if let Some(path) = &args.config {
        return Some((path.clone(), true));
    }
    if let Some(path) = env.get(CONFIG_FILE_ENV).filter(|p| !p.trim().is_empty()) {
        return Some((PathBuf::from(path), true));
    }
    let default = dirs::home_dir()?.join(".smtp2go-usage").join("config.toml");
    default.exists().then_some((default, false))
}

fn apply_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    let report_dir = dirs::home_dir()
        .map(|home| home.join("smtp2go-reports"))
        .unwrap_or_else(|| PathBuf::from("smtp2go-reports"));

    builder
        .set_default("api_url", DEFAULT_API_URL)?
        .set_default("timeout_seconds", 30_i64)?
        .set_default("max_attempts", 4_i64)?
        .set_default("retry_delay_ms", 1000_i64)?
        .set_default("smtp_server", "mail.smtp2go.com")?
        .set_default("smtp_port", 587_i64)?
        .set_default("smtp_security", "starttls")?
        .set_default("subject_template", DEFAULT_SUBJECT_TEMPLATE)?
        .set_default("report_dir", report_dir.to_string_lossy().to_string())?
        .set_default("compare_previous", true)
}

fn apply_overrides(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    args: &SettingsArgs,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    let path_string = |p: &Option<PathBuf>| p.as_ref().map(|p| p.to_string_lossy().to_string());

    let mut builder = builder
        .set_override_option("api_key", args.api_key.clone())?
        .set_override_option("api_url", args.api_url.clone())?
        .set_override_option("smtp_server", args.smtp_server.clone())?
        .set_override_option("smtp_port", args.smtp_port.map(i64::from))?
        .set_override_option("smtp_security", args.smtp_security.clone())?
        .set_override_option("smtp_username", args.smtp_username.clone())?
        .set_override_option("smtp_password", args.smtp_password.clone())?
        .set_override_option("sender_email", args.sender_email.clone())?
        .set_override_option("report_recipients", args.report_recipients.clone())?
        .set_override_option("report_dir", path_string(&args.report_dir))?
        .set_override_option("outbox_dir", path_string(&args.outbox_dir))?
        .set_override_option("subaccounts", args.subaccounts.clone())?
        .set_override_option("month", args.month.clone())?
        .set_override_option("start_date", args.start_date.clone())?
        .set_override_option("end_date", args.end_date.clone())?;

    if args.no_compare {
        builder = builder.set_override("compare_previous", false)?;
    }
    Ok(builder)
}

/// Period keys dropped from lower layers
///
/// A month and a date range are alternatives, so whichever form the highest
/// layer sets (flags, then environment) replaces the other form coming from
/// below instead of conflicting with it.
fn superseded_period_keys(args: &SettingsArgs, env: &HashMap<String, String>) -> &'static [&'static str] {
    let env_sets = |key: &str| {
        env.get(&format!("{}_{}", ENV_PREFIX, key.to_ascii_uppercase()))
            .is_some_and(|value| !value.trim().is_empty())
    };

    let flag_month = args.month.is_some();
    let flag_range = args.start_date.is_some() || args.end_date.is_some();
    let (month, range) = if flag_month || flag_range {
        (flag_month, flag_range)
    } else {
        (env_sets("month"), env_sets("start_date") || env_sets("end_date"))
    };

    const RANGE_KEYS: &[&str] = &["start_date", "end_date"];
    const MONTH_KEYS: &[&str] = &["month"];
    match (month, range) {
        (true, false) => RANGE_KEYS,
        (false, true) => MONTH_KEYS,
        _ => &[],
    }
}

fn config_error(err: config::ConfigError) -> AppError {
    AppError::configuration(err.to_string())
}

fn required(value: &Option<String>, field: &str, problems: &mut Vec<String>) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            problems.push(format!("missing required field: {}", field));
            None
        }
    }
}

/// Resolve the explicit period override, if any
fn resolve_period(raw: &RawSettings) -> Result<Option<ReportingPeriod>, String> {
    let parse_date = |field: &str, value: &str| {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|_| format!("invalid {} '{}': expected YYYY-MM-DD", field, value))
    };

    match (&raw.month, &raw.start_date, &raw.end_date) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            Err("month cannot be combined with start_date/end_date".to_string())
        }
        (Some(month), None, None) => ReportingPeriod::parse_month(month)
            .map(Some)
            .ok_or_else(|| format!("invalid month '{}': expected YYYY-MM", month)),
        (None, Some(start), Some(end)) => {
            let start = parse_date("start_date", start)?;
            let end = parse_date("end_date", end)?;
            ReportingPeriod::new(start, end)
                .map(Some)
                .ok_or_else(|| "start_date must be before end_date".to_string())
        }
        (None, Some(_), None) => Err("start_date requires end_date".to_string()),
        (None, None, Some(_)) => Err("end_date requires start_date".to_string()),
        (None, None, None) => Ok(None),
    }
}

/// Parse a comma-separated list, trimming entries and dropping empty ones
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn full_env() -> HashMap<String, String> {
        HashMap::from([
            ("SMTP2GO_API_KEY".to_string(), "env-key".to_string()),
            ("SMTP2GO_SMTP_USERNAME".to_string(), "reporter".to_string()),
            ("SMTP2GO_SMTP_PASSWORD".to_string(), "hunter2".to_string()),
            ("SMTP2GO_SENDER_EMAIL".to_string(), "reports@example.com".to_string()),
            ("SMTP2GO_REPORT_RECIPIENTS".to_string(), "ops@example.com".to_string()),
        ])
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn raw_with(env: &HashMap<String, String>, file: &tempfile::NamedTempFile) -> RawSettings {
        let args = SettingsArgs {
            config: Some(file.path().to_path_buf()),
            ..SettingsArgs::default()
        };
        load_raw(&args, env).unwrap()
    }

    #[test]
    fn test_parse_list_drops_empty_entries() {
        assert_eq!(parse_list("a@x.com, , b@x.com"), vec!["a@x.com", "b@x.com"]);
        assert!(parse_list(" , ,").is_empty());
    }

    #[test]
    fn test_defaults_apply() {
        let file = write_config("");
        let raw = raw_with(&full_env(), &file);
        assert_eq!(raw.api_url, DEFAULT_API_URL);
        assert_eq!(raw.smtp_server, "mail.smtp2go.com");
        assert_eq!(raw.smtp_port, Lenient::Value(587));
        assert_eq!(raw.subject_template, DEFAULT_SUBJECT_TEMPLATE);

        let settings = Settings::from_raw(&raw).unwrap();
        assert_eq!(settings.smtp.port, 587);
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.retry.max_attempts, 4);
        assert!(settings.compare_previous);
    }

    #[test]
    fn test_precedence_flag_over_env_over_file() {
        let file = write_config(
            r#"
api_key = "file-key"
smtp_server = "file.example.com"
smtp_port = 2525
sender_email = "file@example.com"
"#,
        );
        let env = full_env();
        let args = SettingsArgs {
            config: Some(file.path().to_path_buf()),
            api_key: Some("flag-key".to_string()),
            ..SettingsArgs::default()
        };

        let raw = load_raw(&args, &env).unwrap();
        // flag beats env
        assert_eq!(raw.api_key.as_deref(), Some("flag-key"));
        // env beats file
        assert_eq!(raw.sender_email.as_deref(), Some("reports@example.com"));
        // file beats default
        assert_eq!(raw.smtp_server, "file.example.com");
        assert_eq!(Settings::from_raw(&raw).unwrap().smtp.port, 2525);
    }

    #[test]
    fn test_env_port_parsed_from_string() {
        let file = write_config("");
        let mut env = full_env();
        env.insert("SMTP2GO_SMTP_PORT".to_string(), "465".to_string());
        env.insert("SMTP2GO_COMPARE_PREVIOUS".to_string(), "no".to_string());
        let settings = Settings::from_raw(&raw_with(&env, &file)).unwrap();
        assert_eq!(settings.smtp.port, 465);
        assert!(!settings.compare_previous);
    }

    #[test]
    fn test_bad_number_reported_with_missing_fields() {
        let file = write_config("");
        let mut env = full_env();
        env.remove("SMTP2GO_API_KEY");
        env.insert("SMTP2GO_SMTP_PORT".to_string(), "abc".to_string());
        env.insert("SMTP2GO_TIMEOUT_SECONDS".to_string(), "soon".to_string());

        let err = Settings::from_raw(&raw_with(&env, &file)).unwrap_err();
        match err {
            AppError::Configuration { problems } => {
                assert_eq!(problems.len(), 3, "{:?}", problems);
                let joined = problems.join("\n");
                assert!(joined.contains("missing required field: api_key"));
                assert!(joined.contains("invalid smtp_port 'abc'"));
                assert!(joined.contains("invalid timeout_seconds 'soon'"));
            }
            other => panic!("Expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_api_url_reported() {
        let file = write_config(r#"api_url = "not a url""#);
        let err = Settings::from_raw(&raw_with(&full_env(), &file)).unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
        assert!(err.to_string().contains("invalid api_url 'not a url'"));

        let file = write_config(r#"api_url = "ftp://api.example.com""#);
        let err = Settings::from_raw(&raw_with(&full_env(), &file)).unwrap_err();
        assert!(err.to_string().contains("api_url"));
    }

    #[test]
    fn test_recipients_from_env_are_trimmed() {
        let file = write_config("");
        let mut env = full_env();
        env.insert(
            "SMTP2GO_REPORT_RECIPIENTS".to_string(),
            "a@x.com, , b@x.com".to_string(),
        );
        let settings = Settings::from_raw(&raw_with(&env, &file)).unwrap();
        assert_eq!(settings.recipients, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn test_recipients_as_toml_array() {
        let file = write_config(r#"report_recipients = ["a@x.com", " b@x.com ", ""]"#);
        let mut env = full_env();
        env.remove("SMTP2GO_REPORT_RECIPIENTS");
        let settings = Settings::from_raw(&raw_with(&env, &file)).unwrap();
        assert_eq!(settings.recipients, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn test_missing_fields_reported_together() {
        let file = write_config("");
        let raw = raw_with(&HashMap::new(), &file);
        let err = Settings::from_raw(&raw).unwrap_err();

        match err {
            AppError::Configuration { problems } => {
                let joined = problems.join("\n");
                for field in [
                    "api_key",
                    "smtp_username",
                    "smtp_password",
                    "sender_email",
                    "report_recipients",
                ] {
                    assert!(joined.contains(field), "missing {} in {}", field, joined);
                }
            }
            other => panic!("Expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_recipient_list_is_missing() {
        let file = write_config("");
        let mut env = full_env();
        env.insert("SMTP2GO_REPORT_RECIPIENTS".to_string(), " , ".to_string());
        let err = Settings::from_raw(&raw_with(&env, &file)).unwrap_err();
        assert!(err.to_string().contains("report_recipients"));
    }

    #[test]
    fn test_explicit_missing_config_file_fails() {
        let args = SettingsArgs {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..SettingsArgs::default()
        };
        let err = load_raw(&args, &full_env()).unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_period_override_month() {
        let file = write_config(r#"month = "2024-03""#);
        let settings = Settings::from_raw(&raw_with(&full_env(), &file)).unwrap();
        assert_eq!(settings.period, ReportingPeriod::month(2024, 3));
    }

    #[test]
    fn test_period_override_conflict_is_reported() {
        let file = write_config(
            r#"
month = "2024-03"
start_date = "2024-03-01"
end_date = "2024-03-10"
"#,
        );
        let err = Settings::from_raw(&raw_with(&full_env(), &file)).unwrap_err();
        assert!(err.to_string().contains("month cannot be combined"));
    }

    #[test]
    fn test_month_flag_replaces_range_from_file_and_env() {
        let file = write_config(
            r#"
start_date = "2024-01-01"
end_date = "2024-01-10"
"#,
        );
        let args = SettingsArgs {
            config: Some(file.path().to_path_buf()),
            month: Some("2024-03".to_string()),
            ..SettingsArgs::default()
        };
        let settings = Settings::load(&args, &full_env()).unwrap();
        assert_eq!(settings.period, ReportingPeriod::month(2024, 3));

        let empty = write_config("");
        let mut env = full_env();
        env.insert("SMTP2GO_START_DATE".to_string(), "2024-01-01".to_string());
        env.insert("SMTP2GO_END_DATE".to_string(), "2024-01-10".to_string());
        let args = SettingsArgs {
            config: Some(empty.path().to_path_buf()),
            month: Some("2024-03".to_string()),
            ..SettingsArgs::default()
        };
        let settings = Settings::load(&args, &env).unwrap();
        assert_eq!(settings.period, ReportingPeriod::month(2024, 3));
    }

    #[test]
    fn test_range_flags_replace_month_from_lower_layers() {
        let file = write_config(r#"month = "2024-01""#);
        let mut env = full_env();
        env.insert("SMTP2GO_MONTH".to_string(), "2024-02".to_string());
        let args = SettingsArgs {
            config: Some(file.path().to_path_buf()),
            start_date: Some("2024-03-01".to_string()),
            end_date: Some("2024-03-10".to_string()),
            ..SettingsArgs::default()
        };
        let settings = Settings::load(&args, &env).unwrap();
        let expected = ReportingPeriod::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        );
        assert_eq!(settings.period, expected);
    }

    #[test]
    fn test_env_month_replaces_file_range() {
        let file = write_config(
            r#"
start_date = "2024-01-01"
end_date = "2024-01-10"
"#,
        );
        let mut env = full_env();
        env.insert("SMTP2GO_MONTH".to_string(), "2024-03".to_string());
        let settings = Settings::from_raw(&raw_with(&env, &file)).unwrap();
        assert_eq!(settings.period, ReportingPeriod::month(2024, 3));
    }

    #[test]
    fn test_period_override_invalid_range() {
        let file = write_config(
            r#"
start_date = "2024-03-10"
end_date = "2024-03-01"
"#,
        );
        let err = Settings::from_raw(&raw_with(&full_env(), &file)).unwrap_err();
        assert!(err.to_string().contains("start_date must be before end_date"));
    }

    #[test]
    fn test_subaccount_filter_and_no_compare() {
        let file = write_config("");
        let args = SettingsArgs {
            config: Some(file.path().to_path_buf()),
            subaccounts: Some("sub1, sub2,".to_string()),
            no_compare: true,
            ..SettingsArgs::default()
        };
        let settings = Settings::load(&args, &full_env()).unwrap();
        assert_eq!(
            settings.subaccounts,
            Some(vec!["sub1".to_string(), "sub2".to_string()])
        );
        assert!(!settings.compare_previous);
    }

    #[test]
    fn test_invalid_security_reported() {
        let file = write_config(r#"smtp_security = "ssl3""#);
        let err = Settings::from_raw(&raw_with(&full_env(), &file)).unwrap_err();
        assert!(err.to_string().contains("smtp_security"));
    }
}
