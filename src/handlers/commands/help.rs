//! Help command handler

use teloxide::Bot;

use crate::handlers::{keyboards, Reply};
use crate::i18n::params;
use crate::models::User;
use crate::state::AppContext;
use crate::utils::errors::Result;
use crate::utils::helpers::escape_html;

/// Handle /help
pub async fn handle_help(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    let lang = &user.language_code;
    let support = ctx
        .settings
        .shop
        .support_username
        .as_deref()
        .map(|name| format!("@{}", escape_html(name.trim_start_matches('@'))))
        .unwrap_or_else(|| "-".to_string());

    let text = ctx.tr("help.text", lang, &params([("support", support)]));
    reply.send(bot, text, Some(keyboards::back_to_main(&ctx.i18n, lang))).await
}
