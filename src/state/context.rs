//! Conversation context management
//!
//! This module handles user conversation context, tracking current scenarios,
//! steps, and associated data for each user's interaction with the bot.

use std::collections::HashMap;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc, Duration};

use crate::config::Settings;
use crate::i18n::{I18n, TranslationParams};
use crate::services::ServiceFactory;
use crate::state::scenarios::ScenarioManager;
use crate::state::storage::StateStorage;
use crate::utils::errors::{ShopError, Result};

/// Application-wide context handed to every handler
#[derive(Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub services: Arc<ServiceFactory>,
    pub scenarios: Arc<ScenarioManager>,
    pub storage: StateStorage,
    pub i18n: Arc<I18n>,
}

impl AppContext {
    pub fn new(
        settings: Settings,
        services: Arc<ServiceFactory>,
        scenarios: Arc<ScenarioManager>,
        storage: StateStorage,
        i18n: Arc<I18n>,
    ) -> Self {
        Self {
            settings,
            services,
            scenarios,
            storage,
            i18n,
        }
    }

    pub fn t(&self, key: &str, lang: &str) -> String {
        self.i18n.t(key, lang, None)
    }

    pub fn tr(&self, key: &str, lang: &str, params: &TranslationParams) -> String {
        self.i18n.t(key, lang, Some(params))
    }

    /// Stored context of a user, or a fresh one
    pub async fn context(&self, telegram_id: i64) -> Result<ConversationContext> {
        Ok(self
            .storage
            .load_context(telegram_id)
            .await?
            .unwrap_or_else(|| ConversationContext::new(telegram_id)))
    }

    /// Put a user into the first step of a scenario, with optional seed data
    pub async fn begin_scenario(
        &self,
        telegram_id: i64,
        scenario_id: &str,
        seed: &[(&str, serde_json::Value)],
    ) -> Result<ConversationContext> {
        let mut context = ConversationContext::new(telegram_id);
        self.scenarios.start_scenario(&mut context, scenario_id)?;
        for (key, value) in seed {
            context.set_data(key, value)?;
        }
        self.storage.save_context(&context).await?;
        Ok(context)
    }

    pub async fn clear_context(&self, telegram_id: i64) -> Result<()> {
        self.storage.delete_context(telegram_id).await
    }
}

/// User conversation context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Telegram id of the user this context belongs to
    pub user_id: i64,
    pub scenario: Option<String>,
    pub step: Option<String>,
    /// Scenario-specific data
    pub data: HashMap<String, serde_json::Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            scenario: None,
            step: None,
            data: HashMap::new(),
            expires_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Start a new scenario
    pub fn start_scenario(&mut self, scenario: &str, initial_step: &str) -> Result<()> {
        self.scenario = Some(scenario.to_string());
        self.step = Some(initial_step.to_string());
        self.data.clear();
        self.updated_at = Utc::now();
        self.expires_at = Some(Utc::now() + Duration::hours(1));
        Ok(())
    }

    /// Move to the next step in the current scenario
    pub fn next_step(&mut self, step: &str) -> Result<()> {
        if self.scenario.is_none() {
            return Err(ShopError::InvalidStateTransition {
                from: "no_scenario".to_string(),
                to: step.to_string(),
            });
        }

        self.step = Some(step.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Complete the current scenario and clear context
    pub fn complete_scenario(&mut self) {
        self.scenario = None;
        self.step = None;
        self.data.clear();
        self.expires_at = None;
        self.updated_at = Utc::now();
    }

    pub fn set_data<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)?;
        self.data.insert(key.to_string(), json_value);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn get_data<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get_data::<String>(key).unwrap_or(None)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_data::<i64>(key).unwrap_or(None)
    }

    /// Like `get_i64` but a missing value is an error
    pub fn require_i64(&self, key: &str) -> Result<i64> {
        self.get_i64(key)
            .ok_or_else(|| ShopError::InvalidInput(format!("Missing required context data: {}", key)))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |expires_at| Utc::now() > expires_at)
    }

    pub fn set_expiry(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = Some(expires_at);
        self.updated_at = Utc::now();
    }

    pub fn is_in_scenario(&self, scenario: &str) -> bool {
        self.scenario.as_deref() == Some(scenario)
    }

    pub fn is_at(&self, scenario: &str, step: &str) -> bool {
        self.is_in_scenario(scenario) && self.step.as_deref() == Some(step)
    }

    /// Get current scenario and step as tuple
    pub fn current_state(&self) -> (Option<&str>, Option<&str>) {
        (self.scenario.as_deref(), self.step.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_new_context() {
        let context = ConversationContext::new(123);
        assert_eq!(context.user_id, 123);
        assert_eq!(context.current_state(), (None, None));
        assert!(context.data.is_empty());
        assert!(!context.is_expired());
    }

    #[test]
    fn test_scenario_lifecycle() {
        let mut context = ConversationContext::new(123);
        context.start_scenario("agent_request", "full_name").unwrap();
        assert!(context.is_at("agent_request", "full_name"));
        assert!(context.expires_at.is_some());

        context.set_data("full_name", "Sara Ahmadi").unwrap();
        context.next_step("phone").unwrap();
        assert!(context.is_at("agent_request", "phone"));
        assert_eq!(context.get_string("full_name").as_deref(), Some("Sara Ahmadi"));

        context.complete_scenario();
        assert!(!context.is_in_scenario("agent_request"));
        assert!(context.data.is_empty());
    }

    #[test]
    fn test_next_step_without_scenario() {
        let mut context = ConversationContext::new(1);
        assert_matches!(context.next_step("amount"), Err(ShopError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_typed_data() {
        let mut context = ConversationContext::new(1);
        context.set_data("plan_id", 7).unwrap();
        assert_eq!(context.get_i64("plan_id"), Some(7));
        assert_eq!(context.require_i64("plan_id").unwrap(), 7);
        assert!(context.require_i64("user_id").is_err());
        assert_eq!(context.get_string("plan_id"), None);
    }

    #[test]
    fn test_expiry() {
        let mut context = ConversationContext::new(1);
        context.set_expiry(Utc::now() - Duration::minutes(1));
        assert!(context.is_expired());
        context.set_expiry(Utc::now() + Duration::minutes(1));
        assert!(!context.is_expired());
    }
}
