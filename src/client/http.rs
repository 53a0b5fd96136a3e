//! Production Marketo client
//!
//! Wraps reqwest with the three things every Marketo call needs: a cached
//! OAuth2 bearer token, the per-window rate budget, and retries for transient
//! transport failures. API-level failures ride inside HTTP 200 responses as
//! `{"success": false, "errors": [...]}`; expired-token codes trigger one
//! refresh-and-retry, everything else surfaces as an API error.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::{BulkAction, MarketoClient, ResourceKind};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{JsonValue, Method, OptionStringExt, StringMap};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Seconds subtracted from a token's lifetime so a token is refreshed before
/// it can expire mid-request
const TOKEN_EXPIRY_BUFFER_SECS: i64 = 30;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

// ============================================================================
// Cached Token
// ============================================================================

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn expires_in(token: String, seconds: u64) -> Self {
        Self {
            token,
            expires_at: Utc::now() + ChronoDuration::seconds(seconds.min(i64::MAX as u64) as i64),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() + ChronoDuration::seconds(TOKEN_EXPIRY_BUFFER_SECS) >= self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

// ============================================================================
// HTTP Marketo Client
// ============================================================================

/// Marketo client over OAuth2 client credentials
pub struct HttpMarketoClient {
    config: Config,
    http: reqwest::Client,
    token: Arc<RwLock<Option<CachedToken>>>,
    rate_limiter: RateLimiter,
}

impl HttpMarketoClient {
    /// Build a client from the tap configuration
    pub fn new(config: Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(agent) = config.user_agent.clone().none_if_empty() {
            builder = builder.user_agent(agent);
        }
        let http = builder.build()?;

        let rate_limiter = RateLimiter::new(&RateLimiterConfig::per_window(
            config.rate_limit_requests,
            Duration::from_secs(config.rate_limit_window_seconds),
        ));

        Ok(Self {
            config,
            http,
            token: Arc::new(RwLock::new(None)),
            rate_limiter,
        })
    }

    /// Fetch a token if none is cached, verifying the credentials work
    pub async fn check_credentials(&self) -> Result<()> {
        self.get_or_refresh_token().await.map(|_| ())
    }

    // ========================================================================
    // Token Handling
    // ========================================================================

    async fn get_or_refresh_token(&self) -> Result<String> {
        {
            let guard = self.token.read().await;
            if let Some(cached) = guard.as_ref() {
                if !cached.is_expired() {
                    return Ok(cached.token.clone());
                }
            }
        }

        // Re-check under the write lock; another task may have already
        // refreshed while we waited for it.
        let mut guard = self.token.write().await;
        if let Some(cached) = guard.as_ref() {
            if !cached.is_expired() {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(token)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let url = format!(
            "{}/oauth/token",
            self.config.identity_endpoint().trim_end_matches('/')
        );
        debug!("fetching access token");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenRefresh {
                message: format!("token endpoint returned {}: {body}", status.as_u16()),
            });
        }

        let parsed: TokenResponse = response.json().await?;
        debug!(expires_in = parsed.expires_in, "obtained access token");
        Ok(CachedToken::expires_in(
            parsed.access_token,
            parsed.expires_in,
        ))
    }

    // ========================================================================
    // Request Plumbing
    // ========================================================================

    /// Send one request with rate limiting, auth, and transport retries.
    ///
    /// Retries cover connection failures, timeouts, 429 (honoring
    /// `Retry-After`), and retryable 5xx statuses. Everything else returns
    /// the response or an error as-is.
    async fn send_with_retries(
        &self,
        method: Method,
        url: &str,
        params: &StringMap,
        headers: &StringMap,
        body: Option<&JsonValue>,
    ) -> Result<Response> {
        let max_retries = self.config.max_retries;
        let mut last_error = None;
        let mut attempt = 0;

        while attempt <= max_retries {
            self.rate_limiter.wait().await;
            let token = self.get_or_refresh_token().await?;

            let mut request = self
                .http
                .request(method.into(), url)
                .bearer_auth(&token);
            if !params.is_empty() {
                request = request.query(params);
            }
            for (key, value) in headers {
                request = request.header(key.as_str(), value.as_str());
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = extract_retry_after(&response);
                        if attempt < max_retries {
                            warn!(
                                "rate limited (429), attempt {}/{}, waiting {retry_after}s",
                                attempt + 1,
                                max_retries + 1
                            );
                            tokio::time::sleep(Duration::from_secs(retry_after)).await;
                            attempt += 1;
                            continue;
                        }
                        return Err(Error::RateLimited {
                            retry_after_seconds: retry_after,
                        });
                    }

                    if is_retryable_status(status) && attempt < max_retries {
                        let delay = backoff_delay(attempt);
                        warn!(
                            "request failed with {}, attempt {}/{}, retrying in {delay:?}",
                            status.as_u16(),
                            attempt + 1,
                            max_retries + 1
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        last_error = Some(Error::http_status(status.as_u16(), String::new()));
                        continue;
                    }

                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::http_status(status.as_u16(), body));
                    }

                    return Ok(response);
                }
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && attempt < max_retries {
                        let delay = backoff_delay(attempt);
                        warn!(
                            "transport error ({e}), attempt {}/{}, retrying in {delay:?}",
                            attempt + 1,
                            max_retries + 1
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        last_error = Some(Error::Http(e));
                        continue;
                    }
                    return Err(Error::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::MaxRetriesExceeded { max_retries }))
    }

    /// Issue a JSON API call and unwrap Marketo's success envelope
    async fn call_api(
        &self,
        method: Method,
        path: &str,
        params: &StringMap,
        body: Option<&JsonValue>,
    ) -> Result<JsonValue> {
        let url = self.build_url(path);
        let no_headers = StringMap::new();
        let mut refreshed = false;

        loop {
            let response = self
                .send_with_retries(method, &url, params, &no_headers, body)
                .await?;
            let data: JsonValue = response.json().await?;

            // Only an explicit `"success": false` marks a failed envelope;
            // raw endpoints respond without the field at all.
            if data["success"] != false {
                return Ok(data);
            }

            let (codes, detail) = collect_api_errors(&data);
            if !refreshed && codes.iter().any(|c| c == "601" || c == "602") {
                debug!("access token rejected ({detail}), refreshing and retrying");
                self.invalidate_token().await;
                refreshed = true;
                continue;
            }

            let code = codes.into_iter().next().unwrap_or_else(|| "unknown".to_string());
            return Err(Error::api(code, detail));
        }
    }

    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn poll_export(&self, kind: ResourceKind, export_id: &str) -> Result<String> {
        let path = self.bulk_endpoint(kind, BulkAction::Status, Some(export_id));
        let data = self
            .call_api(Method::GET, &path, &StringMap::new(), None)
            .await?;
        data["result"][0]["status"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::api("export_status", "status response carried no status field"))
    }

    async fn enqueue_export(&self, kind: ResourceKind, export_id: &str) -> Result<()> {
        let path = self.bulk_endpoint(kind, BulkAction::Enqueue, Some(export_id));
        self.call_api(Method::POST, &path, &StringMap::new(), None)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MarketoClient for HttpMarketoClient {
    fn use_corona(&self) -> bool {
        self.config.use_corona
    }

    async fn request(&self, method: Method, path: &str, params: &StringMap) -> Result<JsonValue> {
        self.call_api(method, path, params, None).await
    }

    async fn raw_request(&self, method: Method, path: &str, headers: &StringMap) -> Result<Bytes> {
        let url = self.build_url(path);
        let response = self
            .send_with_retries(method, &url, &StringMap::new(), headers, None)
            .await?;
        Ok(response.bytes().await?)
    }

    async fn create_export(
        &self,
        kind: ResourceKind,
        fields: &[String],
        query: JsonValue,
    ) -> Result<String> {
        let payload = serde_json::json!({
            "format": "CSV",
            "fields": fields,
            "filter": query,
        });
        let path = self.bulk_endpoint(kind, BulkAction::Create, None);
        info!(kind = %kind, "creating bulk export");

        let data = self
            .call_api(Method::POST, &path, &StringMap::new(), Some(&payload))
            .await?;
        match &data["result"][0]["exportId"] {
            JsonValue::String(id) => Ok(id.clone()),
            JsonValue::Number(id) => Ok(id.to_string()),
            _ => Err(Error::api(
                "export_create",
                "create response carried no exportId",
            )),
        }
    }

    async fn wait_for_export(&self, kind: ResourceKind, export_id: &str) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.job_timeout_seconds);
        let poll_interval = Duration::from_secs(self.config.poll_interval_seconds);

        while Instant::now() < deadline {
            let status = self.poll_export(kind, export_id).await?;
            debug!(kind = %kind, export_id, status, "polled export");

            match status.as_str() {
                // A created export is not running yet; it starts on enqueue.
                "Created" => self.enqueue_export(kind, export_id).await?,
                "Completed" => return Ok(()),
                "Failed" | "Cancelled" => return Err(Error::export_failed(status)),
                _ => {}
            }

            tokio::time::sleep(poll_interval).await;
        }

        Err(Error::export_failed(format!(
            "Export timed out after {} seconds",
            self.config.job_timeout_seconds
        )))
    }
}

impl std::fmt::Debug for HttpMarketoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMarketoClient")
            .field("endpoint", &self.config.endpoint)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 500 | 502 | 503 | 504)
}

fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    std::cmp::min(INITIAL_BACKOFF * factor, MAX_BACKOFF)
}

fn extract_retry_after(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}

/// Pull error codes and a joined `code: message` summary out of a failed
/// response envelope
fn collect_api_errors(data: &JsonValue) -> (Vec<String>, String) {
    let mut codes = Vec::new();
    let mut details = Vec::new();

    if let Some(errors) = data["errors"].as_array() {
        for error in errors {
            let code = match &error["code"] {
                JsonValue::String(code) => code.clone(),
                other => other.to_string(),
            };
            let message = error["message"].as_str().unwrap_or_default();
            details.push(format!("{code}: {message}"));
            codes.push(code);
        }
    }

    if details.is_empty() {
        details.push("request was not successful".to_string());
    }
    (codes, details.join(", "))
}
