//! Hiddify panel API client
//!
//! Thin wrapper over the panel's v2 REST API. Every call is throttled by a
//! governor limiter and guarded by a consecutive-failure circuit breaker;
//! idempotent GET calls are retried with a linear backoff.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PanelConfig;
use crate::utils::errors::{PanelError, PanelResult, Result, ShopError};

const API_KEY_HEADER: &str = "Hiddify-API-Key";
const RETRY_BACKOFF_MS: u64 = 200;

/// Body for `POST /admin/user/`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PanelUserRequest {
    pub uuid: String,
    pub name: String,
    pub package_days: i32,
    #[serde(rename = "usage_limit_GB")]
    pub usage_limit_gb: f64,
    pub mode: String,
    pub comment: Option<String>,
    pub telegram_id: Option<i64>,
    pub enable: bool,
}

/// User record as returned by the admin endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PanelUser {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub package_days: Option<i64>,
    #[serde(default, rename = "usage_limit_GB")]
    pub usage_limit_gb: Option<f64>,
    #[serde(default, rename = "current_usage_GB")]
    pub current_usage_gb: Option<f64>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub enable: Option<bool>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub last_online: Option<String>,
}

/// Subset of `GET /user/me/` shown on the "my services" page
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PanelProfile {
    #[serde(default)]
    pub profile_title: Option<String>,
    #[serde(default)]
    pub profile_usage_current: f64,
    #[serde(default)]
    pub profile_usage_total: f64,
    #[serde(default)]
    pub profile_remaining_days: Option<i64>,
    #[serde(default)]
    pub profile_reset_days: Option<i64>,
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Opens after `threshold` consecutive failures and rejects calls for `cooldown`
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Returns `CircuitOpen` while the cooldown is running
    pub fn check(&self) -> PanelResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.open_until {
            Some(until) if until > Instant::now() => {
                let remaining = until.saturating_duration_since(Instant::now());
                Err(PanelError::CircuitOpen {
                    retry_after_secs: remaining.as_secs().max(1),
                })
            }
            Some(_) => {
                // half-open: let the next call through
                state.open_until = None;
                state.consecutive_failures = self.threshold.saturating_sub(1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.consecutive_failures = 0;
        state.open_until = None;
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.threshold {
            warn!(
                failures = state.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "Panel circuit breaker opened"
            );
            state.open_until = Some(Instant::now() + self.cooldown);
        }
    }

    pub fn is_open(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(state.open_until, Some(until) if until > Instant::now())
    }
}

/// Client for the Hiddify v2 API
#[derive(Clone)]
pub struct PanelClient {
    client: reqwest::Client,
    base_url: String,
    proxy_path: String,
    user_proxy_path: String,
    api_key: String,
    max_retries: u32,
    limiter: Arc<DefaultDirectRateLimiter>,
    breaker: Arc<CircuitBreaker>,
}

impl std::fmt::Debug for PanelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // the api key stays out of logs
        f.debug_struct("PanelClient")
            .field("base_url", &self.base_url)
            .field("proxy_path", &self.proxy_path)
            .field("user_proxy_path", &self.user_proxy_path)
            .field("max_retries", &self.max_retries)
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}

impl PanelClient {
    pub fn new(config: &PanelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            ShopError::Config("panel.requests_per_second must be greater than 0".to_string())
        })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            proxy_path: config.proxy_path.trim_matches('/').to_string(),
            user_proxy_path: config.user_proxy_path.trim_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
            breaker: Arc::new(CircuitBreaker::new(
                config.breaker_threshold,
                Duration::from_secs(config.breaker_cooldown_seconds),
            )),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}/api/v2{}", self.base_url, self.proxy_path, endpoint)
    }

    /// Link a user imports into their VPN client
    pub fn subscription_url(&self, secret_uuid: &str) -> String {
        format!("{}/{}/{}/", self.base_url, self.user_proxy_path, secret_uuid)
    }

    pub fn is_circuit_open(&self) -> bool {
        self.breaker.is_open()
    }

    async fn request(&self, method: Method, endpoint: &str, body: Option<&Value>) -> PanelResult<Value> {
        self.breaker.check()?;

        let url = self.url(endpoint);
        let attempts = if method == Method::GET { self.max_retries + 1 } else { 1 };
        let mut last_error = PanelError::Request("no attempt made".to_string());

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64)).await;
                debug!(endpoint = endpoint, attempt = attempt, "Retrying panel request");
            }

            self.limiter.until_ready().await;

            match self.send_once(method.clone(), &url, body).await {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(error) if is_transient(&error) => {
                    warn!(method = %method, endpoint = endpoint, error = %error, "Panel request failed");
                    self.breaker.record_failure();
                    last_error = error;
                }
                Err(error) => {
                    // the panel answered, so it is reachable
                    self.breaker.record_success();
                    return Err(error);
                }
            }
        }

        Err(last_error)
    }

    async fn send_once(&self, method: Method, url: &str, body: Option<&Value>) -> PanelResult<Value> {
        let mut request = self
            .client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            return Err(PanelError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| PanelError::InvalidResponse(e.to_string()))
    }

    fn decode<T: for<'de> Deserialize<'de>>(value: Value) -> PanelResult<T> {
        serde_json::from_value(value).map_err(|e| PanelError::InvalidResponse(e.to_string()))
    }

    // Users

    pub async fn list_users(&self) -> PanelResult<Vec<PanelUser>> {
        let value = self.request(Method::GET, "/admin/user/", None).await?;
        Self::decode(value)
    }

    pub async fn create_user(&self, request: &PanelUserRequest) -> PanelResult<PanelUser> {
        let body = serde_json::to_value(request).map_err(|e| PanelError::InvalidResponse(e.to_string()))?;
        let value = self.request(Method::POST, "/admin/user/", Some(&body)).await?;
        Self::decode(value)
    }

    pub async fn get_user(&self, uuid: &str) -> PanelResult<PanelUser> {
        let value = self.request(Method::GET, &format!("/admin/user/{}/", uuid), None).await?;
        Self::decode(value)
    }

    pub async fn update_user(&self, uuid: &str, body: &Value) -> PanelResult<Value> {
        self.request(Method::PATCH, &format!("/admin/user/{}/", uuid), Some(body)).await
    }

    pub async fn delete_user(&self, uuid: &str) -> PanelResult<()> {
        self.request(Method::DELETE, &format!("/admin/user/{}/", uuid), None).await?;
        Ok(())
    }

    pub async fn user_profile(&self, secret_uuid: &str) -> PanelResult<PanelProfile> {
        let endpoint = format!("/panel/{}/api/v2/user/me/", secret_uuid);
        let value = self.request(Method::GET, &endpoint, None).await?;
        Self::decode(value)
    }

    pub async fn user_configs(&self, secret_uuid: &str) -> PanelResult<Value> {
        let endpoint = format!("/panel/{}/api/v2/user/all-configs/", secret_uuid);
        self.request(Method::GET, &endpoint, None).await
    }

    // Admins

    pub async fn list_admins(&self) -> PanelResult<Value> {
        self.request(Method::GET, "/admin/admin_user/", None).await
    }

    pub async fn create_admin(&self, body: &Value) -> PanelResult<Value> {
        self.request(Method::POST, "/admin/admin_user/", Some(body)).await
    }

    pub async fn get_admin(&self, uuid: &str) -> PanelResult<Value> {
        self.request(Method::GET, &format!("/admin/admin_user/{}/", uuid), None).await
    }

    // System

    pub async fn server_status(&self) -> PanelResult<Value> {
        self.request(Method::GET, "/admin/server_status/", None).await
    }

    pub async fn panel_info(&self) -> PanelResult<Value> {
        self.request(Method::GET, "/panel/info/", None).await
    }

    pub async fn all_configs(&self) -> PanelResult<Value> {
        self.request(Method::GET, "/admin/all-configs/", None).await
    }
}

fn map_transport_error(error: reqwest::Error) -> PanelError {
    if error.is_timeout() {
        PanelError::Timeout
    } else {
        PanelError::Request(error.to_string())
    }
}

/// Transport problems and 5xx answers count against the breaker
fn is_transient(error: &PanelError) -> bool {
    match error {
        PanelError::Request(_) | PanelError::Timeout => true,
        PanelError::Status { status, .. } => *status >= 500,
        PanelError::InvalidResponse(_) | PanelError::CircuitOpen { .. } => false,
    }
}

/// Flatten the interesting parts of `server_status` into label/value pairs
pub fn summarize_server_status(status: &Value) -> Vec<(String, String)> {
    let system = status
        .get("stats")
        .and_then(|stats| stats.get("system"))
        .unwrap_or(status);

    let mut lines = Vec::new();

    if let Some(cpu) = system.get("cpu_percent").and_then(Value::as_f64) {
        lines.push(("CPU".to_string(), format!("{:.1}%", cpu)));
    }

    let pair = |used: &str, total: &str| {
        match (system.get(used).and_then(Value::as_f64), system.get(total).and_then(Value::as_f64)) {
            (Some(used), Some(total)) => Some(format!("{:.2} / {:.2} GB", used, total)),
            _ => None,
        }
    };

    if let Some(ram) = pair("ram_used", "ram_total") {
        lines.push(("RAM".to_string(), ram));
    }
    if let Some(disk) = pair("disk_used", "disk_total") {
        lines.push(("Disk".to_string(), disk));
    }
    if let Some(online) = system.get("online_users").and_then(Value::as_i64) {
        lines.push(("Online".to_string(), online.to_string()));
    }
    if let Some(users) = system.get("total_users").and_then(Value::as_i64) {
        lines.push(("Users".to_string(), users.to_string()));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn config() -> PanelConfig {
        PanelConfig {
            base_url: "https://panel.example.com/".to_string(),
            api_key: "key".to_string(),
            proxy_path: "/admin-proxy/".to_string(),
            user_proxy_path: "sub".to_string(),
            timeout_seconds: 5,
            requests_per_second: 10,
            max_retries: 1,
            breaker_threshold: 2,
            breaker_cooldown_seconds: 60,
        }
    }

    #[test]
    fn test_urls() {
        let client = PanelClient::new(&config()).unwrap();
        assert_eq!(
            client.url("/admin/user/"),
            "https://panel.example.com/admin-proxy/api/v2/admin/user/"
        );
        assert_eq!(
            client.subscription_url("abc"),
            "https://panel.example.com/sub/abc/"
        );
    }

    #[test]
    fn test_zero_rate_rejected() {
        let mut config = config();
        config.requests_per_second = 0;
        assert_matches!(PanelClient::new(&config), Err(ShopError::Config(_)));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let mut config = config();
        config.api_key = "secret-token-123".to_string();
        let printed = format!("{:?}", PanelClient::new(&config).unwrap());
        assert!(printed.contains("panel.example.com"));
        assert!(!printed.contains("secret-token-123"));
    }

    #[test]
    fn test_breaker_opens_after_threshold() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));
        assert!(breaker.check().is_ok());
        breaker.record_failure();
        assert!(breaker.check().is_ok());
        breaker.record_failure();
        assert_matches!(breaker.check(), Err(PanelError::CircuitOpen { .. }));
        assert!(breaker.is_open());
    }

    #[test]
    fn test_breaker_resets_on_success() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert!(breaker.check().is_ok());
    }

    #[test]
    fn test_breaker_half_open_after_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(0));
        breaker.record_failure();
        assert!(breaker.check().is_ok());
        // one more failure reopens immediately
        breaker.record_failure();
        assert!(breaker.state.lock().unwrap().open_until.is_some());
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&PanelError::Timeout));
        assert!(is_transient(&PanelError::Status { status: 502, body: String::new() }));
        assert!(!is_transient(&PanelError::Status { status: 404, body: String::new() }));
        assert!(!is_transient(&PanelError::InvalidResponse("x".into())));
    }

    #[test]
    fn test_user_request_field_names() {
        let request = PanelUserRequest {
            uuid: "u".into(),
            name: "n".into(),
            package_days: 30,
            usage_limit_gb: 50.0,
            mode: "no_reset".into(),
            comment: None,
            telegram_id: Some(1),
            enable: true,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["usage_limit_GB"], json!(50.0));
        assert_eq!(value["package_days"], json!(30));
    }

    #[test]
    fn test_summarize_server_status() {
        let status = json!({
            "stats": {
                "system": {
                    "cpu_percent": 12.5,
                    "ram_used": 1.0,
                    "ram_total": 4.0,
                    "online_users": 3
                }
            }
        });
        let lines = summarize_server_status(&status);
        assert_eq!(lines[0], ("CPU".to_string(), "12.5%".to_string()));
        assert_eq!(lines[1].1, "1.00 / 4.00 GB");
        assert_eq!(lines[2], ("Online".to_string(), "3".to_string()));
        assert!(summarize_server_status(&json!({})).is_empty());
    }
}
