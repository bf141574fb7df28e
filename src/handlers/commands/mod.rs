//! Command handlers module
//!
//! This module contains handlers for all bot commands like /start, /help, etc.
//! Buttons reuse the same screens, so most functions here take a `Reply`
//! and render into either a fresh message or the pressed one.

pub mod account;
pub mod admin;
pub mod admin_catalog;
pub mod admin_users;
pub mod help;
pub mod shop;
pub mod start;
pub mod wallet;

use teloxide::{Bot, types::Message, utils::command::BotCommands};
use tracing::debug;

use crate::handlers::{report_error, resolve_user, sender_language, Reply};
use crate::state::AppContext;
use crate::utils::errors::Result;
use crate::utils::logging::log_user_action;

/// All available bot commands
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "HiddyShop commands:")]
pub enum Command {
    #[command(description = "Open the main menu")]
    Start(String),
    #[command(description = "Show help information")]
    Help,
    #[command(description = "Admin panel (admin only)")]
    Admin,
    #[command(description = "Wallet balance and top-up")]
    Wallet,
    #[command(description = "Your referral link and earnings")]
    Referral,
    #[command(description = "Show your profile")]
    Profile,
    #[command(description = "Shop statistics (admin only)")]
    Stats,
    #[command(description = "Cancel the current operation")]
    Cancel,
}

/// Main command dispatcher
///
/// Errors are shown to the user as a translated message and not propagated.
pub async fn handle_command(bot: Bot, msg: Message, cmd: Command, ctx: AppContext) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    if !msg.chat.id.is_user() {
        debug!(chat_id = ?msg.chat.id, "Ignoring command outside a private chat");
        return Ok(());
    }

    let lang = sender_language(&ctx, from);
    let (user, created) = match resolve_user(&ctx, from).await {
        Ok(resolved) => resolved,
        Err(e) => {
            report_error(&bot, &ctx, msg.chat.id, &lang, &e, "resolve_user", Some(from.id.0 as i64)).await;
            return Ok(());
        }
    };

    log_user_action(user.id, "command", Some(&format!("{:?}", cmd)));
    let reply = Reply::new_message(msg.chat.id);

    let result = match &cmd {
        Command::Start(payload) => start::handle_start(&bot, &ctx, reply, &user, created, payload).await,
        Command::Help => help::handle_help(&bot, &ctx, reply, &user).await,
        Command::Admin => admin::show_admin_menu(&bot, &ctx, reply, &user).await,
        Command::Wallet => wallet::show_wallet(&bot, &ctx, reply, &user).await,
        Command::Referral => account::show_referral(&bot, &ctx, reply, &user).await,
        Command::Profile => account::show_profile(&bot, &ctx, reply, &user).await,
        Command::Stats => admin::show_stats(&bot, &ctx, reply, &user).await,
        Command::Cancel => start::handle_cancel(&bot, &ctx, reply, &user).await,
    };

    if let Err(e) = result {
        report_error(&bot, &ctx, msg.chat.id, &user.language_code, &e, "command", Some(user.id)).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", "hiddyshop_bot").unwrap(), Command::Start(String::new()));
        assert_eq!(
            Command::parse("/start ABCD1234", "hiddyshop_bot").unwrap(),
            Command::Start("ABCD1234".to_string())
        );
        assert_eq!(Command::parse("/cancel", "hiddyshop_bot").unwrap(), Command::Cancel);
        assert!(Command::parse("/events", "hiddyshop_bot").is_err());
    }
}
