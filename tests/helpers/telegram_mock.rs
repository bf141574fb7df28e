//! Mock Telegram API server for testing
//!
//! Answers every Bot API call with a plausible success response and lets
//! tests inspect what the bot sent.

use serde_json::{json, Value};
use teloxide::Bot;
use wiremock::{
    matchers::{method, path_regex},
    Mock, MockServer, ResponseTemplate,
};

pub const TEST_BOT_TOKEN: &str = "12345:test_token";

/// Mock Telegram API server for testing
pub struct TelegramMockServer {
    pub server: MockServer,
}

impl TelegramMockServer {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let mock = Self { server };
        mock.setup_default_mocks().await;
        mock
    }

    /// Bot whose requests go to this server
    pub fn bot(&self) -> Bot {
        let url = url::Url::parse(&self.server.uri()).expect("mock server uri is a valid url");
        Bot::new(TEST_BOT_TOKEN).set_api_url(url)
    }

    pub async fn setup_default_mocks(&self) {
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/bot[^/]+/(sendMessage|editMessageText)$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok(message_result())))
            .mount(&self.server)
            .await;

        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/bot[^/]+/getMe$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({
                "id": 12345,
                "is_bot": true,
                "first_name": "HiddyShop",
                "username": "hiddyshop_test_bot",
                "can_join_groups": false,
                "can_read_all_group_messages": false,
                "supports_inline_queries": false
            }))))
            .mount(&self.server)
            .await;

        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/bot[^/]+/(answerCallbackQuery|setMyCommands)$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!(true))))
            .mount(&self.server)
            .await;
    }

    /// Bodies of every `sendMessage` call so far
    ///
    /// Method names are matched case-insensitively, as the Bot API does.
    pub async fn sent_messages(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path().to_ascii_lowercase().ends_with("/sendmessage"))
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }

    /// Texts of messages sent to one chat
    pub async fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent_messages()
            .await
            .into_iter()
            .filter(|body| body["chat_id"].as_i64() == Some(chat_id))
            .filter_map(|body| body["text"].as_str().map(str::to_string))
            .collect()
    }

    pub async fn reset(&self) {
        self.server.reset().await;
        self.setup_default_mocks().await;
    }
}

fn ok(result: Value) -> Value {
    json!({ "ok": true, "result": result })
}

fn message_result() -> Value {
    json!({
        "message_id": 123,
        "from": {
            "id": 12345,
            "is_bot": true,
            "first_name": "HiddyShop",
            "username": "hiddyshop_test_bot"
        },
        "chat": {
            "id": 1001,
            "first_name": "Test",
            "type": "private"
        },
        "date": 1_700_000_000,
        "text": "ok"
    })
}
