//! Conversation scenarios implementation
//!
//! A scenario is a short, linear chat dialog: the bot asks for a value,
//! validates what the user types and moves on. Every step names the
//! translation key of its prompt, and a failed validation carries the
//! translation key of the hint to show.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use crate::utils::errors::{ShopError, Result};
use crate::utils::validators::{parse_amount, validate_amount, validate_email, validate_phone, normalize_digit};
use super::context::ConversationContext;

/// Scenario identifiers
pub mod ids {
    pub const DISCOUNT_ENTRY: &str = "discount_entry";
    pub const TOPUP: &str = "topup";
    pub const AGENT_REQUEST: &str = "agent_request";
    pub const PROFILE_PHONE: &str = "profile_phone";
    pub const ADMIN_PLAN_CREATE: &str = "admin_plan_create";
    pub const ADMIN_PLAN_EDIT: &str = "admin_plan_edit";
    pub const ADMIN_DISCOUNT_CREATE: &str = "admin_discount_create";
    pub const ADMIN_DISCOUNT_EDIT: &str = "admin_discount_edit";
    pub const ADMIN_USER_SEARCH: &str = "admin_user_search";
    pub const ADMIN_WALLET_ADJUST: &str = "admin_wallet_adjust";
    pub const ADMIN_AGENT_REJECT: &str = "admin_agent_reject";
}

/// Typed by the user to skip an optional step
pub const SKIP_MARKER: &str = "-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub initial_step: String,
    pub steps: HashMap<String, ScenarioStep>,
    /// Maximum duration for this scenario (in seconds)
    pub max_duration: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub id: String,
    /// Translation key of the question asked at this step
    pub prompt_key: String,
    /// Possible next steps from this step
    pub next_steps: Vec<String>,
    pub requires_input: bool,
    pub validation: Option<StepValidation>,
    pub skippable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepValidation {
    pub input_type: InputType,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Translation key shown when the input is rejected
    pub error_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputType {
    Text,
    /// Several lines parsed later by a form parser
    MultiLine,
    Amount,
    Phone,
    Email,
}

#[derive(Debug, Clone)]
pub struct ScenarioManager {
    scenarios: HashMap<String, Scenario>,
}

impl Default for ScenarioManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioManager {
    /// Create a new scenario manager with the shop scenarios
    pub fn new() -> Self {
        let mut manager = Self {
            scenarios: HashMap::new(),
        };

        manager.register_default_scenarios();
        manager
    }

    fn register_default_scenarios(&mut self) {
        self.register_scenario(single_step(ids::DISCOUNT_ENTRY, "code", "shop.enter_discount", text(2, 32)));
        self.register_scenario(single_step(ids::TOPUP, "amount", "wallet.enter_topup_amount", input(InputType::Amount)));
        self.register_scenario(create_agent_request_scenario());
        self.register_scenario(single_step(ids::PROFILE_PHONE, "phone", "profile.ask_phone", input(InputType::Phone)));
        self.register_scenario(single_step(ids::ADMIN_PLAN_CREATE, "form", "admin.plans.create_prompt", input(InputType::MultiLine)));
        self.register_scenario(single_step(ids::ADMIN_PLAN_EDIT, "field", "admin.plans.edit_prompt", input(InputType::MultiLine)));
        self.register_scenario(single_step(ids::ADMIN_DISCOUNT_CREATE, "form", "admin.discounts.create_prompt", input(InputType::MultiLine)));
        self.register_scenario(single_step(ids::ADMIN_DISCOUNT_EDIT, "field", "admin.discounts.edit_prompt", input(InputType::MultiLine)));
        self.register_scenario(single_step(ids::ADMIN_USER_SEARCH, "query", "admin.users.search_prompt", text(1, 64)));
        self.register_scenario(single_step(ids::ADMIN_WALLET_ADJUST, "amount", "admin.users.wallet_amount_prompt", input(InputType::Amount)));
        self.register_scenario(single_step(ids::ADMIN_AGENT_REJECT, "reason", "admin.agents.reject_reason_prompt", text(2, 500)));
    }

    pub fn register_scenario(&mut self, scenario: Scenario) {
        self.scenarios.insert(scenario.id.clone(), scenario);
    }

    pub fn get_scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.get(id)
    }

    /// Start a scenario for a user
    pub fn start_scenario(&self, context: &mut ConversationContext, scenario_id: &str) -> Result<()> {
        let scenario = self.get_scenario(scenario_id)
            .ok_or_else(|| ShopError::InvalidInput(format!("Unknown scenario: {}", scenario_id)))?;

        context.start_scenario(scenario_id, &scenario.initial_step)?;

        if let Some(max_duration) = scenario.max_duration {
            let expiry = chrono::Utc::now() + chrono::Duration::seconds(max_duration as i64);
            context.set_expiry(expiry);
        }

        Ok(())
    }

    /// Move to the next step in a scenario
    pub fn next_step(&self, context: &mut ConversationContext, next_step: &str) -> Result<()> {
        let current_step = self.get_current_step(context)?;

        if !current_step.next_steps.iter().any(|s| s == next_step) {
            return Err(ShopError::InvalidStateTransition {
                from: current_step.id.clone(),
                to: next_step.to_string(),
            });
        }

        context.next_step(next_step)
    }

    /// Advance along the single path of a linear scenario
    ///
    /// Returns the new step, or `None` when the current step is the last one.
    pub fn advance(&self, context: &mut ConversationContext) -> Result<Option<ScenarioStep>> {
        let next = match self.get_current_step(context)?.next_steps.first() {
            Some(next) => next.clone(),
            None => return Ok(None),
        };
        self.next_step(context, &next)?;
        Ok(Some(self.get_current_step(context)?.clone()))
    }

    /// Validate user input for the current step
    ///
    /// On failure the `InvalidInput` payload is the hint's translation key.
    pub fn validate_input(&self, context: &ConversationContext, input: &str) -> Result<()> {
        let step = self.get_current_step(context)?;
        let input = input.trim();

        if step.skippable && input == SKIP_MARKER {
            return Ok(());
        }

        match &step.validation {
            Some(validation) if !input_matches(input, validation) => {
                Err(ShopError::InvalidInput(validation.error_key.clone()))
            }
            _ => Ok(()),
        }
    }

    pub fn get_current_step(&self, context: &ConversationContext) -> Result<&ScenarioStep> {
        let (scenario_id, step_id) = match context.current_state() {
            (Some(scenario), Some(step)) => (scenario, step),
            _ => return Err(ShopError::InvalidInput("No active scenario".to_string())),
        };

        let scenario = self.get_scenario(scenario_id)
            .ok_or_else(|| ShopError::InvalidInput(format!("Unknown scenario: {}", scenario_id)))?;

        scenario.steps.get(step_id)
            .ok_or_else(|| ShopError::InvalidInput(format!("Unknown step: {}", step_id)))
    }
}

fn input_matches(input: &str, validation: &StepValidation) -> bool {
    let length = input.chars().count();
    if validation.min_length.map_or(false, |min| length < min) {
        return false;
    }
    if validation.max_length.map_or(false, |max| length > max) {
        return false;
    }

    match validation.input_type {
        InputType::Text => true,
        InputType::MultiLine => !input.is_empty(),
        InputType::Amount => parse_amount(input).map_or(false, |amount| validate_amount(amount).is_ok()),
        InputType::Phone => {
            let normalized: String = input.chars().map(normalize_digit).collect();
            validate_phone(&normalized)
        }
        InputType::Email => validate_email(input),
    }
}

fn input(input_type: InputType) -> StepValidation {
    let error_key = match input_type {
        InputType::Amount => "scenario.invalid_amount",
        InputType::Phone => "scenario.invalid_phone",
        InputType::Email => "scenario.invalid_email",
        InputType::Text | InputType::MultiLine => "scenario.invalid_text",
    };
    StepValidation {
        input_type,
        min_length: None,
        max_length: None,
        error_key: error_key.to_string(),
    }
}

fn text(min: usize, max: usize) -> StepValidation {
    StepValidation {
        min_length: Some(min),
        max_length: Some(max),
        ..input(InputType::Text)
    }
}

fn step(id: &str, prompt_key: &str, validation: Option<StepValidation>, next: Option<&str>) -> ScenarioStep {
    ScenarioStep {
        id: id.to_string(),
        prompt_key: prompt_key.to_string(),
        next_steps: next.map(|n| vec![n.to_string()]).unwrap_or_default(),
        requires_input: validation.is_some(),
        validation,
        skippable: false,
    }
}

fn single_step(id: &str, step_id: &str, prompt_key: &str, validation: StepValidation) -> Scenario {
    let mut steps = HashMap::new();
    steps.insert(step_id.to_string(), step(step_id, prompt_key, Some(validation), None));

    Scenario {
        id: id.to_string(),
        initial_step: step_id.to_string(),
        steps,
        max_duration: Some(900),
    }
}

/// full name, phone, email, address, experience, confirm
fn create_agent_request_scenario() -> Scenario {
    let skippable = |mut s: ScenarioStep| {
        s.skippable = true;
        s
    };

    let steps = [
        step("full_name", "agent.ask_full_name", Some(text(3, 100)), Some("phone")),
        step("phone", "agent.ask_phone", Some(input(InputType::Phone)), Some("email")),
        skippable(step("email", "agent.ask_email", Some(input(InputType::Email)), Some("address"))),
        skippable(step("address", "agent.ask_address", Some(text(0, 300)), Some("experience"))),
        skippable(step("experience", "agent.ask_experience", Some(text(0, 1000)), Some("confirm"))),
        step("confirm", "agent.confirm", None, None),
    ];

    Scenario {
        id: ids::AGENT_REQUEST.to_string(),
        initial_step: "full_name".to_string(),
        steps: steps.into_iter().map(|s| (s.id.clone(), s)).collect(),
        max_duration: Some(1800),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn started(manager: &ScenarioManager, id: &str) -> ConversationContext {
        let mut context = ConversationContext::new(42);
        manager.start_scenario(&mut context, id).unwrap();
        context
    }

    #[test]
    fn test_every_scenario_starts() {
        let manager = ScenarioManager::new();
        for id in [
            ids::DISCOUNT_ENTRY, ids::TOPUP, ids::AGENT_REQUEST, ids::PROFILE_PHONE,
            ids::ADMIN_PLAN_CREATE, ids::ADMIN_PLAN_EDIT, ids::ADMIN_DISCOUNT_CREATE, ids::ADMIN_DISCOUNT_EDIT,
            ids::ADMIN_USER_SEARCH, ids::ADMIN_WALLET_ADJUST, ids::ADMIN_AGENT_REJECT,
        ] {
            let context = started(&manager, id);
            assert!(manager.get_current_step(&context).is_ok(), "{}", id);
        }
    }

    #[test]
    fn test_unknown_scenario() {
        let manager = ScenarioManager::new();
        let mut context = ConversationContext::new(1);
        assert_matches!(manager.start_scenario(&mut context, "onboarding"), Err(ShopError::InvalidInput(_)));
    }

    #[test]
    fn test_agent_request_walks_all_steps() {
        let manager = ScenarioManager::new();
        let mut context = started(&manager, ids::AGENT_REQUEST);

        let mut visited = vec![context.step.clone().unwrap()];
        while let Some(step) = manager.advance(&mut context).unwrap() {
            visited.push(step.id);
        }
        assert_eq!(visited, vec!["full_name", "phone", "email", "address", "experience", "confirm"]);
    }

    #[test]
    fn test_invalid_transition() {
        let manager = ScenarioManager::new();
        let mut context = started(&manager, ids::AGENT_REQUEST);
        assert_matches!(
            manager.next_step(&mut context, "experience"),
            Err(ShopError::InvalidStateTransition { .. })
        );
    }

    #[test]
    fn test_amount_validation() {
        let manager = ScenarioManager::new();
        let context = started(&manager, ids::TOPUP);
        assert!(manager.validate_input(&context, "50,000").is_ok());
        assert!(manager.validate_input(&context, "۵۰۰۰۰").is_ok());
        assert_matches!(
            manager.validate_input(&context, "fifty"),
            Err(ShopError::InvalidInput(key)) if key == "scenario.invalid_amount"
        );
        assert!(manager.validate_input(&context, "0").is_err());
    }

    #[test]
    fn test_skippable_email_step() {
        let manager = ScenarioManager::new();
        let mut context = started(&manager, ids::AGENT_REQUEST);
        manager.advance(&mut context).unwrap();
        assert!(manager.validate_input(&context, "۰۹۱۲۳۴۵۶۷۸۹").is_ok());
        assert!(manager.validate_input(&context, "-").is_err());

        manager.advance(&mut context).unwrap();
        assert!(manager.validate_input(&context, "-").is_ok());
        assert!(manager.validate_input(&context, "sara@example.com").is_ok());
        assert!(manager.validate_input(&context, "sara@").is_err());
    }

    #[test]
    fn test_text_length_limits() {
        let manager = ScenarioManager::new();
        let context = started(&manager, ids::ADMIN_AGENT_REJECT);
        assert!(manager.validate_input(&context, "x").is_err());
        assert!(manager.validate_input(&context, "incomplete documents").is_ok());
    }
}
