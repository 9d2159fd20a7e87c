use reqwest::StatusCode;
use thiserror::Error;

/// Application error types
///
/// Each pipeline stage raises its own variant. Only the run orchestrator
/// matches on them broadly, to log and pick an exit status.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid settings, reported all at once
    #[error("Configuration error: {}", problems.join("; "))]
    Configuration { problems: Vec<String> },

    /// API key missing or rejected by the usage API
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Non-retryable rejection from the usage API
    #[error("Request error ({status}): {body}")]
    Request { status: StatusCode, body: String },

    /// Transient API failure that survived every retry attempt
    #[error("Transient API error after {attempts} attempt(s): {message}")]
    TransientApi { attempts: u32, message: String },

    /// A single attempt failed in a way the retry loop may repeat
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// Report could not be rendered
    #[error("Render error: {0}")]
    Render(String),

    /// Mail transport or recipient rejection failure
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Report artifact could not be persisted
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn configuration(problem: impl Into<String>) -> Self {
        Self::Configuration {
            problems: vec![problem.into()],
        }
    }

    /// Stable snake_case name used in structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Authentication(_) => "authentication_error",
            Self::Request { .. } => "request_error",
            Self::TransientApi { .. } => "transient_api_error",
            Self::Unavailable(_) => "upstream_unavailable",
            Self::Render(_) => "render_error",
            Self::Delivery(_) => "delivery_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Pipeline stage that raised this error
    pub fn component(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "config",
            Self::Authentication(_)
            | Self::Request { .. }
            | Self::TransientApi { .. }
            | Self::Unavailable(_) => "usage_api",
            Self::Render(_) => "renderer",
            Self::Delivery(_) => "dispatcher",
            Self::Io(_) => "artifact",
        }
    }

    /// Process exit status for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration { .. } => 2,
            Self::Authentication(_) => 3,
            Self::Request { .. } => 4,
            Self::TransientApi { .. } | Self::Unavailable(_) => 5,
            Self::Render(_) => 6,
            Self::Delivery(_) => 7,
            Self::Io(_) => 8,
        }
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Delivery(format!("message build failed: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Delivery(err.to_string())
    }
}

impl From<lopdf::Error> for AppError {
    fn from(err: lopdf::Error) -> Self {
        Self::Render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_lists_every_problem() {
        let error = AppError::Configuration {
            problems: vec![
                "missing api_key".to_string(),
                "missing sender_email".to_string(),
            ],
        };
        assert_eq!(
            error.to_string(),
            "Configuration error: missing api_key; missing sender_email"
        );
    }

    #[test]
    fn test_error_kind_and_component() {
        let error = AppError::Request {
            status: StatusCode::BAD_REQUEST,
            body: "bad date".to_string(),
        };
        assert_eq!(error.kind(), "request_error");
        assert_eq!(error.component(), "usage_api");

        let error = AppError::Delivery("550 no such user".to_string());
        assert_eq!(error.kind(), "delivery_error");
        assert_eq!(error.component(), "dispatcher");

        let unavailable = AppError::Unavailable("connection refused".to_string());
        let exhausted = AppError::TransientApi {
            attempts: 4,
            message: "connection refused".to_string(),
        };
        assert_eq!(unavailable.kind(), "upstream_unavailable");
        assert_eq!(exhausted.kind(), "transient_api_error");
        assert_eq!(unavailable.component(), "usage_api");
    }

    #[test]
    fn test_exit_codes_are_distinct_and_non_zero() {
        let errors = [
            AppError::configuration("x"),
            AppError::Authentication("x".to_string()),
            AppError::Request {
                status: StatusCode::NOT_FOUND,
                body: String::new(),
            },
            AppError::TransientApi {
                attempts: 3,
                message: "x".to_string(),
            },
            AppError::Render("x".to_string()),
            AppError::Delivery("x".to_string()),
            AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, "x")),
        ];
        let mut codes: Vec<u8> = errors.iter().map(AppError::exit_code).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
