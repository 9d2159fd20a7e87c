//! SMTP2GO usage API client
//!
//! Thin wrapper over `reqwest` that knows the two endpoints the reporter
//! needs: sub-account search and grouped email history. Every call goes
//! through [`execute_with_retry`] so transient failures are retried here and
//! nowhere else.

use crate::config::Settings;
use crate::error::AppError;
use crate::logging::{truncate_body, SensitiveValue};
use crate::period::ReportingPeriod;
use crate::retry::{classify_transport_error, execute_with_retry, RetryPolicy};
use chrono::SecondsFormat;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

pub const API_KEY_HEADER: &str = "X-Smtp2go-Api-Key";

/// Key used for usage that is not attributed to any sub-account
pub const PRIMARY_ACCOUNT_ID: &str = "primary";

const MAX_LOGGED_BODY: usize = 512;
const MAX_SEARCH_PAGES: usize = 50;

/// Raw counters for one sub-account, as returned by the API
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStats {
    /// Display name, when the API provided one
    pub label: Option<String>,
    /// Untouched JSON object of the history entry
    pub fields: Map<String, Value>,
}

/// Sub-account identity from `/subaccounts/search`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubaccountInfo {
    pub id: String,
    pub name: Option<String>,
}

pub struct UsageClient {
    http: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl UsageClient {
    /// Create a client; an empty API key fails before any network I/O
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, AppError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::Authentication("API key is missing".to_string()));
        }

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("smtp2go-usage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::configuration(format!("failed to build HTTP client: {}", e)))?;
        tracing::debug!(api_key = %SensitiveValue::new(&api_key), "Usage API client ready");

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            retry,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        Self::new(
            settings.api_url.clone(),
            settings.api_key.clone(),
            settings.request_timeout,
            settings.retry.clone(),
        )
    }

    /// Fetch usage for `period`, grouped by sub-account
    ///
    /// With `subaccount_ids = None` the account's sub-accounts are enumerated
    /// first; an account without sub-accounts reports on the primary account.
    pub async fn fetch_usage(
        &self,
        period: &ReportingPeriod,
        subaccount_ids: Option<&[String]>,
    ) -> Result<BTreeMap<String, RawStats>, AppError> {
        let subaccounts = self.resolve_subaccounts(subaccount_ids).await?;
        self.fetch_usage_for(period, &subaccounts).await
    }

    /// Turn an optional explicit filter into the list of sub-accounts to query
    pub async fn resolve_subaccounts(
        &self,
        subaccount_ids: Option<&[String]>,
    ) -> Result<Vec<SubaccountInfo>, AppError> {
        match subaccount_ids {
            Some(ids) => Ok(ids
                .iter()
                .map(|id| SubaccountInfo {
                    id: id.clone(),
                    name: None,
                })
                .collect()),
            None => self.search_subaccounts().await,
        }
    }

    /// Enumerate every sub-account, following `continue_token` paging
    pub async fn search_subaccounts(&self) -> Result<Vec<SubaccountInfo>, AppError> {
        let mut subaccounts = Vec::new();
        let mut continue_token: Option<String> = None;

        for _ in 0..MAX_SEARCH_PAGES {
            let payload = match &continue_token {
                Some(token) => json!({ "continue_token": token }),
                None => json!({}),
            };
            let response = self.post("subaccounts/search", &payload).await?;
            let data = response.get("data").unwrap_or(&response);

            let page = data
                .get("subaccounts")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            subaccounts.extend(page.iter().filter_map(parse_subaccount));

            continue_token = data
                .get("continue_token")
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map(str::to_string);
            if continue_token.is_none() {
                break;
            }
        }

        if subaccounts.is_empty() {
            tracing::info!("No sub-accounts found, reporting on the primary account only");
        } else {
            tracing::info!(count = subaccounts.len(), "Resolved sub-accounts");
        }
        Ok(subaccounts)
    }

    /// Fetch grouped email history for an already resolved sub-account list
    pub async fn fetch_usage_for(
        &self,
        period: &ReportingPeriod,
        subaccounts: &[SubaccountInfo],
    ) -> Result<BTreeMap<String, RawStats>, AppError> {
        let mut payload = json!({
            "group_by": "subaccount",
            "start_date": period.start().to_rfc3339_opts(SecondsFormat::Secs, true),
            "end_date": period.end().to_rfc3339_opts(SecondsFormat::Secs, true),
        });
        if !subaccounts.is_empty() {
            let ids: Vec<&str> = subaccounts.iter().map(|s| s.id.as_str()).collect();
            payload["subaccounts"] = json!(ids);
        }

        tracing::info!(
            period = %period,
            subaccounts = subaccounts.len(),
            "Fetching email history"
        );
        let response = self.post("stats/email_history", &payload).await?;

        let names: BTreeMap<&str, &str> = subaccounts
            .iter()
            .filter_map(|s| s.name.as_deref().map(|name| (s.id.as_str(), name)))
            .collect();

        let mut usage = BTreeMap::new();
        for entry in history_entries(&response) {
            let Some(fields) = entry.as_object() else {
                tracing::warn!(entry = %entry, "Skipping non-object history entry");
                continue;
            };

            let id = entry_id(fields).unwrap_or_else(|| PRIMARY_ACCOUNT_ID.to_string());
            let label = names
                .get(id.as_str())
                .map(|name| name.to_string())
                .or_else(|| entry_label(fields));

            if usage.contains_key(&id) {
                tracing::warn!(subaccount = %id, "Duplicate history entry ignored");
                continue;
            }
            usage.insert(
                id,
                RawStats {
                    label,
                    fields: fields.clone(),
                },
            );
        }

        let missing = subaccounts
            .iter()
            .filter(|s| !usage.contains_key(&s.id))
            .count();
        if missing > 0 {
            tracing::info!(missing, "Some sub-accounts returned no usage for the period");
        }
        tracing::debug!(records = usage.len(), "Parsed email history");

        Ok(usage)
    }

    async fn post(&self, endpoint: &str, payload: &Value) -> Result<Value, AppError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let url = url.as_str();
        execute_with_retry(&self.retry, endpoint, move || self.post_once(url, payload)).await
    }

    async fn post_once(&self, url: &str, payload: &Value) -> Result<Value, AppError> {
        tracing::debug!(url, "Sending API request");

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport_error)?;
        let (logged_body, _) = truncate_body(&body, MAX_LOGGED_BODY);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::Authentication(format!(
                "API key rejected (HTTP {}): {}",
                status, logged_body
            )));
        }
        if !status.is_success() {
            return Err(AppError::Request {
                status,
                body: logged_body,
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| AppError::Request {
            status,
            body: format!("invalid JSON ({}): {}", e, logged_body),
        })?;

        if let Some(error) = value.pointer("/data/error").and_then(Value::as_str) {
            return Err(AppError::Request {
                status,
                body: error.to_string(),
            });
        }

        Ok(value)
    }
}

fn parse_subaccount(value: &Value) -> Option<SubaccountInfo> {
    let id = scalar_string(value.get("id")?)?;
    let name = value
        .get("name")
        .or_else(|| value.get("fullname"))
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string);
    Some(SubaccountInfo { id, name })
}

/// History entries live under `data.history` or `data.stats`
fn history_entries(response: &Value) -> &[Value] {
    let data = response.get("data").unwrap_or(response);
    ["history", "stats"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn entry_id(fields: &Map<String, Value>) -> Option<String> {
    ["subaccount_id", "subaccount", "id"]
        .iter()
        .find_map(|key| fields.get(*key).and_then(scalar_string))
}

fn entry_label(fields: &Map<String, Value>) -> Option<String> {
    ["subaccount_name", "name", "username"]
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str))
        .filter(|label| !label.trim().is_empty())
        .map(str::to_string)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
