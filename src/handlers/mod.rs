//! Bot handlers module
//!
//! This module contains all Telegram bot handlers organized by type:
//! - Command handlers for bot commands
//! - Callback handlers for inline keyboard interactions
//! - Message handlers for scenario input

pub mod callbacks;
pub mod commands;
pub mod keyboards;
pub mod messages;

pub use callbacks::handle_callback_query;
pub use commands::{handle_command, Command};
pub use messages::handle_message;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::{debug, warn};

use crate::i18n::{params, TranslationParams};
use crate::models::User;
use crate::state::AppContext;
use crate::utils::errors::{ShopError, Result};
use crate::utils::helpers::format_price;
use crate::utils::logging::log_error_with_context;

pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Where a handler answers: a new message, or an edit of the message whose
/// button was pressed
#[derive(Debug, Clone, Copy)]
pub struct Reply {
    pub chat_id: ChatId,
    pub message_id: Option<MessageId>,
}

impl Reply {
    pub fn new_message(chat_id: ChatId) -> Self {
        Self { chat_id, message_id: None }
    }

    pub fn edit(chat_id: ChatId, message_id: MessageId) -> Self {
        Self { chat_id, message_id: Some(message_id) }
    }

    /// Send HTML text, editing in place when possible
    pub async fn send(&self, bot: &Bot, text: String, keyboard: Option<InlineKeyboardMarkup>) -> Result<()> {
        if let Some(message_id) = self.message_id {
            let mut request = bot
                .edit_message_text(self.chat_id, message_id, text.clone())
                .parse_mode(ParseMode::Html);
            if let Some(keyboard) = keyboard.clone() {
                request = request.reply_markup(keyboard);
            }
            match request.await {
                Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => return Ok(()),
                Err(e) => debug!(chat_id = ?self.chat_id, error = %e, "Edit failed, sending a new message"),
            }
        }

        let mut request = bot.send_message(self.chat_id, text).parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }
        request.await?;
        Ok(())
    }
}

/// Register the sender or load them, refusing blocked users
///
/// The flag is `true` when this update created the user.
pub async fn resolve_user(ctx: &AppContext, from: &teloxide::types::User) -> Result<(User, bool)> {
    let (user, created) = ctx
        .services
        .user_service
        .register_or_get_user(
            from.id.0 as i64,
            from.username.clone(),
            Some(from.first_name.clone()),
            from.last_name.clone(),
            from.language_code.clone(),
        )
        .await?;

    if created {
        debug!(user_id = user.id, "User registered on first contact");
    }

    ctx.services.auth_service.ensure_not_blocked(&user)?;
    Ok((user, created))
}

/// Language for a sender we may not have loaded yet
pub fn sender_language(ctx: &AppContext, from: &teloxide::types::User) -> String {
    ctx.i18n.detect_user_language(from.language_code.as_deref())
}

/// Put the user into a scenario and ask for its first input
pub async fn begin_scenario(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    user: &User,
    scenario_id: &str,
    seed: &[(&str, serde_json::Value)],
) -> Result<()> {
    let context = ctx.begin_scenario(user.telegram_id, scenario_id, seed).await?;
    let step = ctx.scenarios.get_current_step(&context)?;
    prompt(bot, ctx, reply, &user.language_code, &step.prompt_key).await
}

/// Ask for scenario input, with a cancel button
pub async fn prompt(bot: &Bot, ctx: &AppContext, reply: Reply, lang: &str, key: &str) -> Result<()> {
    reply
        .send(bot, ctx.t(key, lang), Some(keyboards::cancel(&ctx.i18n, lang)))
        .await
}

fn error_params(err: &ShopError) -> TranslationParams {
    match err {
        ShopError::InsufficientBalance { balance, required } => params([
            ("balance", format_price(*balance)),
            ("required", format_price(*required)),
        ]),
        _ => TranslationParams::new(),
    }
}

/// Log an error and show the user its translated message
pub async fn report_error(
    bot: &Bot,
    ctx: &AppContext,
    chat_id: ChatId,
    lang: &str,
    err: &ShopError,
    context: &str,
    user_id: Option<i64>,
) {
    log_error_with_context(err, context, user_id);

    let text = ctx.tr(err.user_message_key(), lang, &error_params(err));
    if let Err(e) = bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await {
        warn!(chat_id = ?chat_id, error = %e, "Failed to deliver error message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_params() {
        let err = ShopError::InsufficientBalance { balance: 5_000, required: 20_000 };
        let p = error_params(&err);
        assert_eq!(p.get("required").map(String::as_str), Some(format_price(20_000).as_str()));
        assert!(error_params(&ShopError::RateLimitExceeded).is_empty());
    }
}
