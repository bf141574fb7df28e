//! Mock Hiddify panel for testing

use serde_json::{json, Value};
use wiremock::{
    matchers::{header, method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

use hiddyshop::config::PanelConfig;

pub const TEST_PANEL_KEY: &str = "test-panel-key";
pub const TEST_PROXY_PATH: &str = "secretproxy";

pub struct PanelMockServer {
    pub server: MockServer,
}

impl PanelMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Client settings pointing at this server
    pub fn config(&self) -> PanelConfig {
        PanelConfig {
            base_url: self.server.uri(),
            api_key: TEST_PANEL_KEY.to_string(),
            proxy_path: TEST_PROXY_PATH.to_string(),
            user_proxy_path: "sub".to_string(),
            timeout_seconds: 2,
            requests_per_second: 100,
            max_retries: 1,
            breaker_threshold: 3,
            breaker_cooldown_seconds: 60,
        }
    }

    fn admin_path(endpoint: &str) -> String {
        format!("/{}/api/v2{}", TEST_PROXY_PATH, endpoint)
    }

    /// `POST /admin/user/` echoes the requested uuid back
    pub async fn mock_create_user_ok(&self) {
        Mock::given(method("POST"))
            .and(path(Self::admin_path("/admin/user/")))
            .and(header("Hiddify-API-Key", TEST_PANEL_KEY))
            .respond_with(|request: &wiremock::Request| {
                let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
                ResponseTemplate::new(200).set_body_json(json!({
                    "uuid": body["uuid"],
                    "name": body["name"],
                    "package_days": body["package_days"],
                    "usage_limit_GB": body["usage_limit_GB"],
                    "mode": body["mode"],
                    "enable": true
                }))
            })
            .mount(&self.server)
            .await;
    }

    /// `POST /admin/user/` always answers with the same uuid
    pub async fn mock_create_user_fixed_uuid(&self, uuid: &str) {
        Mock::given(method("POST"))
            .and(path(Self::admin_path("/admin/user/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uuid": uuid,
                "name": "fixed",
                "package_days": 30,
                "usage_limit_GB": 50.0,
                "mode": "no_reset",
                "enable": true
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_create_user_failure(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(Self::admin_path("/admin/user/")))
            .respond_with(ResponseTemplate::new(status).set_body_string("panel error"))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_user_profile(&self, used_gb: f64, total_gb: f64, remaining_days: i64) {
        Mock::given(method("GET"))
            .and(path_regex(format!(r"^/{}/api/v2/panel/[^/]+/api/v2/user/me/$", TEST_PROXY_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "profile_title": "HiddyShop",
                "profile_usage_current": used_gb,
                "profile_usage_total": total_gb,
                "profile_remaining_days": remaining_days
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_server_status(&self, body: Value) {
        Mock::given(method("GET"))
            .and(path(Self::admin_path("/admin/server_status/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the panel received on `endpoint`
    pub async fn hits(&self, endpoint: &str) -> usize {
        let full = Self::admin_path(endpoint);
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == full)
            .count()
    }
}
