//! State management module
//!
//! This module handles conversation state and user context

pub mod context;
pub mod scenarios;
pub mod storage;

// Re-export commonly used state components
pub use context::{AppContext, ConversationContext};
pub use scenarios::{ids as scenario_ids, Scenario, ScenarioManager, ScenarioStep, StepValidation, InputType, SKIP_MARKER};
pub use storage::StateStorage;
