//! Callback query handlers module
//!
//! This module routes inline keyboard button callbacks of the form
//! `section:action[:arg[:arg]]` to the screens in `handlers::commands`.

use teloxide::{Bot, types::{CallbackQuery, ChatId}, prelude::*};
use tracing::{debug, warn};

use crate::handlers::commands::admin_users::WalletAdjustment;
use crate::handlers::commands::{account, admin, admin_catalog, admin_users, help, shop, start, wallet};
use crate::handlers::keyboards::MAX_CALLBACK_DATA;
use crate::handlers::{report_error, resolve_user, sender_language, Reply};
use crate::models::User;
use crate::state::AppContext;
use crate::utils::errors::{ShopError, Result};
use crate::utils::logging::log_user_action;

/// Parsed callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackData {
    pub section: String,
    pub action: String,
    pub args: Vec<String>,
}

impl CallbackData {
    pub fn parse(data: &str) -> Result<Self> {
        if data.len() > MAX_CALLBACK_DATA {
            return Err(ShopError::InvalidInput(format!("callback data too long: {} bytes", data.len())));
        }

        let mut parts = data.split(':');
        let section = parts.next().filter(|s| !s.is_empty());
        let action = parts.next().filter(|s| !s.is_empty());
        match (section, action) {
            (Some(section), Some(action)) => Ok(Self {
                section: section.to_string(),
                action: action.to_string(),
                args: parts.map(str::to_string).collect(),
            }),
            _ => Err(ShopError::InvalidInput(format!("malformed callback data: {}", data))),
        }
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str).filter(|a| !a.is_empty())
    }

    pub fn id(&self, index: usize) -> Result<i64> {
        self.arg(index)
            .and_then(|a| a.parse::<i64>().ok())
            .ok_or_else(|| ShopError::InvalidInput(format!("missing numeric argument in {}:{}", self.section, self.action)))
    }

    /// Page argument, 1 when absent
    pub fn page(&self) -> i64 {
        self.arg(0).and_then(|a| a.parse::<i64>().ok()).unwrap_or(1).max(1)
    }
}

/// Main callback query dispatcher
pub async fn handle_callback_query(bot: Bot, query: CallbackQuery, ctx: AppContext) -> Result<()> {
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!(error = %e, callback_id = %query.id, "Failed to answer callback query");
    }

    let Some(data) = query.data.as_deref() else {
        return Ok(());
    };
    let from = &query.from;
    let (chat_id, reply) = match query.message.as_ref() {
        Some(message) => (message.chat().id, Reply::edit(message.chat().id, message.id())),
        None => (ChatId(from.id.0 as i64), Reply::new_message(ChatId(from.id.0 as i64))),
    };
    debug!(user_id = from.id.0, callback_data = %data, "Processing callback query");

    let lang = sender_language(&ctx, from);
    let callback = match CallbackData::parse(data) {
        Ok(callback) => callback,
        Err(e) => {
            warn!(callback_data = %data, error = %e, "Ignoring unparseable callback");
            return Ok(());
        }
    };
    if callback.section == "noop" {
        return Ok(());
    }

    let (user, _) = match resolve_user(&ctx, from).await {
        Ok(resolved) => resolved,
        Err(e) => {
            report_error(&bot, &ctx, chat_id, &lang, &e, "resolve_user", Some(from.id.0 as i64)).await;
            return Ok(());
        }
    };
    log_user_action(user.id, "callback", Some(data));

    if let Err(e) = route(&bot, &ctx, reply, &user, &callback).await {
        report_error(&bot, &ctx, chat_id, &user.language_code, &e, data, Some(user.id)).await;
    }
    Ok(())
}

async fn route(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, cb: &CallbackData) -> Result<()> {
    match cb.section.as_str() {
        "menu" => route_menu(bot, ctx, reply, user, cb).await,
        "shop" => route_shop(bot, ctx, reply, user, cb).await,
        "wallet" => match cb.action.as_str() {
            "topup" => wallet::start_topup(bot, ctx, reply, user).await,
            "history" => wallet::show_history(bot, ctx, reply, user, cb.page()).await,
            _ => unknown(cb),
        },
        "profile" => match cb.action.as_str() {
            "phone" => account::start_phone_update(bot, ctx, reply, user).await,
            _ => unknown(cb),
        },
        "agent" => match cb.action.as_str() {
            "start" => account::start_agent_request(bot, ctx, reply, user).await,
            "submit" => account::submit_agent_request(bot, ctx, reply, user).await,
            _ => unknown(cb),
        },
        "admin" => route_admin(bot, ctx, reply, user, cb).await,
        _ => unknown(cb),
    }
}

async fn route_menu(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, cb: &CallbackData) -> Result<()> {
    match cb.action.as_str() {
        "main" => start::show_main_menu(bot, ctx, reply, user).await,
        "cancel" => start::handle_cancel(bot, ctx, reply, user).await,
        "shop" => shop::show_plans(bot, ctx, reply, user).await,
        "wallet" => wallet::show_wallet(bot, ctx, reply, user).await,
        "services" => shop::show_services(bot, ctx, reply, user).await,
        "referral" => account::show_referral(bot, ctx, reply, user).await,
        "profile" => account::show_profile(bot, ctx, reply, user).await,
        "help" => help::handle_help(bot, ctx, reply, user).await,
        _ => unknown(cb),
    }
}

async fn route_shop(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, cb: &CallbackData) -> Result<()> {
    let plan_id = cb.id(0)?;
    let code = cb.arg(1);
    match cb.action.as_str() {
        "plan" => shop::show_plan(bot, ctx, reply, user, plan_id).await,
        "buy" => shop::show_quote(bot, ctx, reply, user, plan_id, None).await,
        "discount" => shop::start_discount_entry(bot, ctx, reply, user, plan_id).await,
        "pay_wallet" => shop::pay_with_wallet(bot, ctx, reply, user, plan_id, code).await,
        "pay_manual" => shop::pay_manually(bot, ctx, reply, user, plan_id, code).await,
        _ => unknown(cb),
    }
}

async fn route_admin(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, cb: &CallbackData) -> Result<()> {
    match cb.action.as_str() {
        "menu" => admin::show_admin_menu(bot, ctx, reply, user).await,
        "stats" => admin::show_stats(bot, ctx, reply, user).await,
        "panel" => admin::show_panel_status(bot, ctx, reply, user).await,

        "users" => admin_users::show_users(bot, ctx, reply, user, cb.page()).await,
        "user" => admin_users::show_user(bot, ctx, reply, user, cb.id(0)?).await,
        "search" => admin_users::start_search(bot, ctx, reply, user).await,
        "block" => admin_users::set_blocked(bot, ctx, reply, user, cb.id(0)?, true).await,
        "unblock" => admin_users::set_blocked(bot, ctx, reply, user, cb.id(0)?, false).await,
        "toggle_admin" => admin_users::toggle_admin(bot, ctx, reply, user, cb.id(0)?).await,
        "toggle_agent" => admin_users::toggle_agent(bot, ctx, reply, user, cb.id(0)?).await,
        "wallet_add" => {
            admin_users::start_wallet_adjust(bot, ctx, reply, user, cb.id(0)?, WalletAdjustment::Add).await
        }
        "wallet_deduct" => {
            admin_users::start_wallet_adjust(bot, ctx, reply, user, cb.id(0)?, WalletAdjustment::Deduct).await
        }
        "wallet_set" => {
            admin_users::start_wallet_adjust(bot, ctx, reply, user, cb.id(0)?, WalletAdjustment::Set).await
        }

        "plans" => admin_catalog::show_plans(bot, ctx, reply, user, cb.page()).await,
        "plan" => admin_catalog::show_plan(bot, ctx, reply, user, cb.id(0)?).await,
        "plan_new" => admin_catalog::start_plan_create(bot, ctx, reply, user).await,
        "plan_edit" => admin_catalog::start_plan_edit(bot, ctx, reply, user, cb.id(0)?).await,
        "plan_toggle" => admin_catalog::toggle_plan(bot, ctx, reply, user, cb.id(0)?).await,
        "plan_delete" => admin_catalog::delete_plan(bot, ctx, reply, user, cb.id(0)?).await,

        "discounts" => admin_catalog::show_discounts(bot, ctx, reply, user, cb.page()).await,
        "discount_new" => admin_catalog::start_discount_create(bot, ctx, reply, user).await,
        "discount_edit" => admin_catalog::start_discount_edit(bot, ctx, reply, user, cb.id(0)?).await,
        "discount_toggle" => admin_catalog::toggle_discount(bot, ctx, reply, user, cb.id(0)?).await,
        "discount_delete" => admin_catalog::delete_discount(bot, ctx, reply, user, cb.id(0)?).await,

        "payments" => admin::show_payments(bot, ctx, reply, user).await,
        "pay_ok" => admin::verify_payment(bot, ctx, reply, user, cb.id(0)?, true).await,
        "pay_no" => admin::verify_payment(bot, ctx, reply, user, cb.id(0)?, false).await,
        "pay_stats" => admin::show_payment_stats(bot, ctx, reply, user).await,

        "agents" => admin::show_agents(bot, ctx, reply, user).await,
        "agent_ok" => admin::approve_agent(bot, ctx, reply, user, cb.id(0)?).await,
        "agent_no" => admin::start_agent_reject(bot, ctx, reply, user, cb.id(0)?).await,

        "referrals" => admin::show_referrals(bot, ctx, reply, user).await,
        "ref_pay" => admin::pay_commission(bot, ctx, reply, user, cb.id(0)?).await,

        "backup" => admin::show_backups(bot, ctx, reply, user).await,
        "backup_new" => admin::create_backup(bot, ctx, reply, user).await,
        "backup_restore" => admin::confirm_restore(bot, ctx, reply, user, backup_name(cb)?).await,
        "backup_apply" => admin::restore_backup(bot, ctx, reply, user, backup_name(cb)?).await,
        "backup_delete" => admin::delete_backup(bot, ctx, reply, user, backup_name(cb)?).await,

        _ => unknown(cb),
    }
}

fn backup_name(cb: &CallbackData) -> Result<&str> {
    cb.arg(0)
        .ok_or_else(|| ShopError::InvalidInput("missing backup name".to_string()))
}

fn unknown(cb: &CallbackData) -> Result<()> {
    warn!(section = %cb.section, action = %cb.action, "Unknown callback action");
    Ok(())
}
