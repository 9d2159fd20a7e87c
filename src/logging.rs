//! Safe logging helpers
//!
//! Masks secrets before they reach log output and bounds the size of
//! upstream response bodies attached to error records.

use std::fmt;

/// Masked representation of a secret (API key, SMTP password)
///
/// Shows at most the first 4 characters followed by `***`.
#[derive(Clone, Debug)]
pub struct SensitiveValue<'a> {
    inner: &'a str,
}

impl<'a> SensitiveValue<'a> {
    /// Wrap a secret for display
    ///
    /// # Example
    /// ```
    /// use smtp2go_usage::logging::SensitiveValue;
    ///
    /// let key = "api-1234567890ABCDEF";
    /// assert_eq!(SensitiveValue::new(key).to_string(), "api-***");
    /// ```
    pub fn new(value: &'a str) -> Self {
        Self { inner: value }
    }
}

impl<'a> fmt::Display for SensitiveValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const VISIBLE: usize = 4;
        if self.inner.chars().count() <= VISIBLE * 2 {
            // Too short to reveal any prefix
            write!(f, "***")
        } else {
            let prefix: String = self.inner.chars().take(VISIBLE).collect();
            write!(f, "{}***", prefix)
        }
    }
}

/// Truncate body content if it exceeds `max_chars` characters
///
/// Returns the (possibly shortened) body and whether it was truncated.
pub fn truncate_body(body: &str, max_chars: usize) -> (String, bool) {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => (format!("{}...", &body[..idx]), true),
        None => (body.to_string(), false),
    }
}
