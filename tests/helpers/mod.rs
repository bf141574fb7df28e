//! Test helpers module
//!
//! Shared setup for the integration tests: a Postgres database, mock
//! Telegram and panel servers, and the services wired against them.

#![allow(dead_code)]

pub mod database_helper;
pub mod panel_mock;
pub mod telegram_mock;
pub mod test_context;
pub mod test_data;

pub use database_helper::*;
pub use panel_mock::*;
pub use telegram_mock::*;
pub use test_context::*;
pub use test_data::*;

/// Skip the current test when no database is reachable
#[macro_export]
macro_rules! require_context {
    () => {
        match $crate::helpers::TestContext::new().await {
            Some(ctx) => ctx,
            None => {
                eprintln!("skipping: no test database (set TEST_DATABASE_URL or start Docker)");
                return;
            }
        }
    };
}
