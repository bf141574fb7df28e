//! Inline keyboards
//!
//! Every button carries flat `section:action[:arg[:arg]]` callback data,
//! at most 64 bytes, routed by `handlers::callbacks`.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::i18n::{I18n, params};
use crate::models::{AgentRequest, DiscountCode, Payment, Plan, Referral, User};
use crate::services::BackupInfo;
use crate::utils::helpers::{format_price, truncate_text};

/// Telegram's limit on callback data
pub const MAX_CALLBACK_DATA: usize = 64;

fn button(i18n: &I18n, lang: &str, key: &str, data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(i18n.t(key, lang, None), data.into())
}

fn back_row(i18n: &I18n, lang: &str, data: &str) -> Vec<InlineKeyboardButton> {
    vec![button(i18n, lang, "buttons.back", data)]
}

/// Previous/next buttons around a page counter; empty when there is one page
fn pagination_row(prefix: &str, page: i64, pages: i64) -> Vec<InlineKeyboardButton> {
    let mut row = Vec::new();
    if pages <= 1 {
        return row;
    }
    if page > 1 {
        row.push(InlineKeyboardButton::callback("«", format!("{}:{}", prefix, page - 1)));
    }
    row.push(InlineKeyboardButton::callback(format!("{}/{}", page, pages), "noop:page"));
    if page < pages {
        row.push(InlineKeyboardButton::callback("»", format!("{}:{}", prefix, page + 1)));
    }
    row
}

fn with_pagination(
    mut rows: Vec<Vec<InlineKeyboardButton>>,
    prefix: &str,
    page: i64,
    pages: i64,
) -> Vec<Vec<InlineKeyboardButton>> {
    let nav = pagination_row(prefix, page, pages);
    if !nav.is_empty() {
        rows.push(nav);
    }
    rows
}

pub fn main_menu(i18n: &I18n, lang: &str, is_admin: bool, agent_requests: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![
        vec![button(i18n, lang, "menu.shop", "menu:shop")],
        vec![
            button(i18n, lang, "menu.wallet", "menu:wallet"),
            button(i18n, lang, "menu.services", "menu:services"),
        ],
        vec![
            button(i18n, lang, "menu.referral", "menu:referral"),
            button(i18n, lang, "menu.profile", "menu:profile"),
        ],
    ];
    let mut last = vec![button(i18n, lang, "menu.help", "menu:help")];
    if agent_requests {
        last.insert(0, button(i18n, lang, "menu.agent", "agent:start"));
    }
    rows.push(last);
    if is_admin {
        rows.push(vec![button(i18n, lang, "menu.admin", "admin:menu")]);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn back_to_main(i18n: &I18n, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![back_row(i18n, lang, "menu:main")])
}

pub fn cancel(i18n: &I18n, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button(i18n, lang, "buttons.cancel", "menu:cancel")]])
}

pub fn plans_list(i18n: &I18n, lang: &str, plans: &[Plan]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = plans
        .iter()
        .map(|plan| {
            vec![InlineKeyboardButton::callback(
                format!("{} | {}", truncate_text(&plan.name, 30), format_price(plan.price)),
                format!("shop:plan:{}", plan.id),
            )]
        })
        .collect();
    rows.push(back_row(i18n, lang, "menu:main"));
    InlineKeyboardMarkup::new(rows)
}

pub fn plan_details(i18n: &I18n, lang: &str, plan_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button(i18n, lang, "shop.buy", format!("shop:buy:{}", plan_id))],
        back_row(i18n, lang, "menu:shop"),
    ])
}

/// Payment choices for a quote; the applied discount code rides along
pub fn payment_methods(
    i18n: &I18n,
    lang: &str,
    plan_id: i64,
    discount_code: Option<&str>,
    manual_enabled: bool,
) -> InlineKeyboardMarkup {
    let suffix = discount_code.map(|c| format!(":{}", c)).unwrap_or_default();
    let mut rows = vec![vec![button(
        i18n,
        lang,
        "shop.pay_wallet",
        format!("shop:pay_wallet:{}{}", plan_id, suffix),
    )]];
    if manual_enabled {
        rows.push(vec![button(
            i18n,
            lang,
            "shop.pay_manual",
            format!("shop:pay_manual:{}{}", plan_id, suffix),
        )]);
    }
    if discount_code.is_none() {
        rows.push(vec![button(i18n, lang, "shop.discount", format!("shop:discount:{}", plan_id))]);
    }
    rows.push(back_row(i18n, lang, &format!("shop:plan:{}", plan_id)));
    InlineKeyboardMarkup::new(rows)
}

pub fn wallet_menu(i18n: &I18n, lang: &str, topup_enabled: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![button(i18n, lang, "wallet.history", "wallet:history:1")]];
    if topup_enabled {
        rows.insert(0, vec![button(i18n, lang, "wallet.topup", "wallet:topup")]);
    }
    rows.push(back_row(i18n, lang, "menu:main"));
    InlineKeyboardMarkup::new(rows)
}

pub fn wallet_history(i18n: &I18n, lang: &str, page: i64, pages: i64) -> InlineKeyboardMarkup {
    let mut rows = with_pagination(Vec::new(), "wallet:history", page, pages);
    rows.push(back_row(i18n, lang, "menu:wallet"));
    InlineKeyboardMarkup::new(rows)
}

pub fn profile_menu(i18n: &I18n, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button(i18n, lang, "profile.set_phone", "profile:phone")],
        back_row(i18n, lang, "menu:main"),
    ])
}

pub fn agent_confirm(i18n: &I18n, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button(i18n, lang, "buttons.confirm", "agent:submit"),
        button(i18n, lang, "buttons.cancel", "menu:cancel"),
    ]])
}

pub fn admin_menu(i18n: &I18n, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button(i18n, lang, "admin.menu.users", "admin:users:1"),
            button(i18n, lang, "admin.menu.plans", "admin:plans:1"),
        ],
        vec![
            button(i18n, lang, "admin.menu.payments", "admin:payments"),
            button(i18n, lang, "admin.menu.agents", "admin:agents"),
        ],
        vec![
            button(i18n, lang, "admin.menu.discounts", "admin:discounts:1"),
            button(i18n, lang, "admin.menu.referrals", "admin:referrals"),
        ],
        vec![
            button(i18n, lang, "admin.menu.stats", "admin:stats"),
            button(i18n, lang, "admin.menu.backup", "admin:backup"),
        ],
        vec![button(i18n, lang, "admin.menu.panel", "admin:panel")],
        back_row(i18n, lang, "menu:main"),
    ])
}

pub fn admin_back(i18n: &I18n, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![back_row(i18n, lang, "admin:menu")])
}

pub fn admin_users(i18n: &I18n, lang: &str, users: &[User], page: i64, pages: i64) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = users
        .iter()
        .map(|user| {
            let marker = if user.is_blocked { "⛔ " } else { "" };
            vec![InlineKeyboardButton::callback(
                format!("{}{}", marker, truncate_text(&user.display_name(), 40)),
                format!("admin:user:{}", user.id),
            )]
        })
        .collect();
    let mut rows = with_pagination(rows, "admin:users", page, pages);
    rows.push(vec![button(i18n, lang, "admin.users.search", "admin:search")]);
    rows.push(back_row(i18n, lang, "admin:menu"));
    InlineKeyboardMarkup::new(rows)
}

pub fn admin_user_actions(i18n: &I18n, lang: &str, user: &User) -> InlineKeyboardMarkup {
    let id = user.id;
    let block = if user.is_blocked {
        button(i18n, lang, "admin.users.unblock", format!("admin:unblock:{}", id))
    } else {
        button(i18n, lang, "admin.users.block", format!("admin:block:{}", id))
    };
    InlineKeyboardMarkup::new(vec![
        vec![block],
        vec![
            button(i18n, lang, "admin.users.toggle_admin", format!("admin:toggle_admin:{}", id)),
            button(i18n, lang, "admin.users.toggle_agent", format!("admin:toggle_agent:{}", id)),
        ],
        vec![
            button(i18n, lang, "admin.users.wallet_add", format!("admin:wallet_add:{}", id)),
            button(i18n, lang, "admin.users.wallet_deduct", format!("admin:wallet_deduct:{}", id)),
        ],
        vec![button(i18n, lang, "admin.users.wallet_set", format!("admin:wallet_set:{}", id))],
        back_row(i18n, lang, "admin:users:1"),
    ])
}

pub fn admin_plans(i18n: &I18n, lang: &str, plans: &[Plan], page: i64, pages: i64) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = plans
        .iter()
        .map(|plan| {
            let marker = if plan.is_active { "🟢" } else { "🔴" };
            vec![InlineKeyboardButton::callback(
                format!("{} {}", marker, truncate_text(&plan.name, 40)),
                format!("admin:plan:{}", plan.id),
            )]
        })
        .collect();
    let mut rows = with_pagination(rows, "admin:plans", page, pages);
    rows.push(vec![button(i18n, lang, "admin.plans.new", "admin:plan_new")]);
    rows.push(back_row(i18n, lang, "admin:menu"));
    InlineKeyboardMarkup::new(rows)
}

pub fn admin_plan_actions(i18n: &I18n, lang: &str, plan: &Plan) -> InlineKeyboardMarkup {
    let id = plan.id;
    InlineKeyboardMarkup::new(vec![
        vec![
            button(i18n, lang, "admin.plans.edit", format!("admin:plan_edit:{}", id)),
            button(i18n, lang, "admin.plans.toggle", format!("admin:plan_toggle:{}", id)),
        ],
        vec![button(i18n, lang, "admin.plans.delete", format!("admin:plan_delete:{}", id))],
        back_row(i18n, lang, "admin:plans:1"),
    ])
}

/// Confirm/reject buttons for a pending manual payment
pub fn payment_review(i18n: &I18n, lang: &str, payment_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button(i18n, lang, "admin.payments.approve", format!("admin:pay_ok:{}", payment_id)),
        button(i18n, lang, "admin.payments.reject", format!("admin:pay_no:{}", payment_id)),
    ]])
}

pub fn admin_payments(i18n: &I18n, lang: &str, payments: &[Payment]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = payments
        .iter()
        .map(|payment| {
            let p = params([("id", payment.id.to_string())]);
            vec![
                InlineKeyboardButton::callback(
                    i18n.t("admin.payments.approve_id", lang, Some(&p)),
                    format!("admin:pay_ok:{}", payment.id),
                ),
                InlineKeyboardButton::callback(
                    i18n.t("admin.payments.reject_id", lang, Some(&p)),
                    format!("admin:pay_no:{}", payment.id),
                ),
            ]
        })
        .collect();
    rows.push(vec![button(i18n, lang, "admin.payments.stats", "admin:pay_stats")]);
    rows.push(back_row(i18n, lang, "admin:menu"));
    InlineKeyboardMarkup::new(rows)
}

/// Approve/reject buttons for an agent application
pub fn agent_review(i18n: &I18n, lang: &str, request_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button(i18n, lang, "admin.agents.approve", format!("admin:agent_ok:{}", request_id)),
        button(i18n, lang, "admin.agents.reject", format!("admin:agent_no:{}", request_id)),
    ]])
}

pub fn admin_agents(i18n: &I18n, lang: &str, requests: &[AgentRequest]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = requests
        .iter()
        .map(|request| {
            let p = params([("id", request.id.to_string())]);
            vec![
                InlineKeyboardButton::callback(
                    i18n.t("admin.agents.approve_id", lang, Some(&p)),
                    format!("admin:agent_ok:{}", request.id),
                ),
                InlineKeyboardButton::callback(
                    i18n.t("admin.agents.reject_id", lang, Some(&p)),
                    format!("admin:agent_no:{}", request.id),
                ),
            ]
        })
        .collect();
    rows.push(back_row(i18n, lang, "admin:menu"));
    InlineKeyboardMarkup::new(rows)
}

pub fn admin_discounts(
    i18n: &I18n,
    lang: &str,
    discounts: &[DiscountCode],
    page: i64,
    pages: i64,
) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = discounts
        .iter()
        .map(|discount| {
            let marker = if discount.is_active { "🟢" } else { "🔴" };
            vec![
                InlineKeyboardButton::callback(
                    format!("{} {}", marker, discount.code),
                    format!("admin:discount_toggle:{}", discount.id),
                ),
                InlineKeyboardButton::callback("✏️", format!("admin:discount_edit:{}", discount.id)),
                InlineKeyboardButton::callback("🗑", format!("admin:discount_delete:{}", discount.id)),
            ]
        })
        .collect();
    let mut rows = with_pagination(rows, "admin:discounts", page, pages);
    rows.push(vec![button(i18n, lang, "admin.discounts.new", "admin:discount_new")]);
    rows.push(back_row(i18n, lang, "admin:menu"));
    InlineKeyboardMarkup::new(rows)
}

pub fn admin_referrals(i18n: &I18n, lang: &str, referrals: &[Referral]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = referrals
        .iter()
        .map(|referral| {
            let p = params([
                ("id", referral.id.to_string()),
                ("amount", format_price(referral.commission_amount)),
            ]);
            vec![InlineKeyboardButton::callback(
                i18n.t("admin.referrals.pay", lang, Some(&p)),
                format!("admin:ref_pay:{}", referral.id),
            )]
        })
        .collect();
    rows.push(back_row(i18n, lang, "admin:menu"));
    InlineKeyboardMarkup::new(rows)
}

pub fn admin_backups(i18n: &I18n, lang: &str, backups: &[BackupInfo]) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![button(i18n, lang, "admin.backup.create", "admin:backup_new")]];
    rows.extend(backups.iter().map(|backup| {
        vec![
            InlineKeyboardButton::callback(
                format!("♻️ {}", backup.name),
                format!("admin:backup_restore:{}", backup.name),
            ),
            InlineKeyboardButton::callback("🗑", format!("admin:backup_delete:{}", backup.name)),
        ]
    }));
    rows.push(back_row(i18n, lang, "admin:menu"));
    InlineKeyboardMarkup::new(rows)
}

pub fn confirm_restore(i18n: &I18n, lang: &str, name: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button(i18n, lang, "buttons.confirm", format!("admin:backup_apply:{}", name)),
        button(i18n, lang, "buttons.cancel", "admin:backup"),
    ]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::I18nConfig;
    use chrono::Utc;
    use teloxide::types::InlineKeyboardButtonKind;

    fn i18n() -> I18n {
        I18n::new(&I18nConfig {
            default_language: "en".to_string(),
            supported_languages: vec!["en".to_string()],
            translations_dir: "translations".to_string(),
        })
    }

    fn callback_data(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_pagination_row() {
        assert!(pagination_row("admin:users", 1, 1).is_empty());
        assert_eq!(pagination_row("admin:users", 1, 3).len(), 2);
        assert_eq!(pagination_row("admin:users", 2, 3).len(), 3);
        assert_eq!(pagination_row("admin:users", 3, 3).len(), 2);
    }

    #[test]
    fn test_longest_callback_data_fits() {
        let i18n = i18n();
        let code = "A".repeat(32);
        let markup = payment_methods(&i18n, "en", i64::from(i32::MAX), Some(&code), true);
        let backup = BackupInfo {
            name: "backup_20240601_080509_123_99.json".to_string(),
            size_bytes: 0,
        };
        let backups = admin_backups(&i18n, "en", &[backup]);
        let restore = confirm_restore(&i18n, "en", "backup_20240601_080509_123_99.json");

        for data in [markup, backups, restore].iter().flat_map(callback_data) {
            assert!(data.len() <= MAX_CALLBACK_DATA, "{} is too long", data);
        }
    }

    #[test]
    fn test_main_menu_admin_button() {
        let i18n = i18n();
        let user_menu = callback_data(&main_menu(&i18n, "en", false, true));
        assert!(!user_menu.contains(&"admin:menu".to_string()));
        assert!(user_menu.contains(&"agent:start".to_string()));

        let admin_menu = callback_data(&main_menu(&i18n, "en", true, false));
        assert!(admin_menu.contains(&"admin:menu".to_string()));
        assert!(!admin_menu.contains(&"agent:start".to_string()));
    }

    #[test]
    fn test_discount_rows_offer_edit() {
        let i18n = i18n();
        let discount = DiscountCode {
            id: 12,
            code: "SPRING".to_string(),
            description: None,
            discount_type: "percentage".to_string(),
            discount_value: 20,
            max_uses: 0,
            used_count: 0,
            valid_from: None,
            valid_until: None,
            is_active: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let data = callback_data(&admin_discounts(&i18n, "en", &[discount], 1, 1));
        assert!(data.contains(&"admin:discount_toggle:12".to_string()));
        assert!(data.contains(&"admin:discount_edit:12".to_string()));
        assert!(data.contains(&"admin:discount_delete:12".to_string()));
    }

    #[test]
    fn test_payment_methods_carry_discount() {
        let i18n = i18n();
        let data = callback_data(&payment_methods(&i18n, "en", 4, Some("SPRING"), false));
        assert!(data.contains(&"shop:pay_wallet:4:SPRING".to_string()));
        assert!(!data.iter().any(|d| d.starts_with("shop:pay_manual")));
        assert!(!data.iter().any(|d| d.starts_with("shop:discount")));
    }

    #[test]
    fn test_user_actions_toggle_block() {
        let i18n = i18n();
        let mut user = User {
            id: 9,
            telegram_id: 900,
            username: None,
            first_name: Some("Reza".to_string()),
            last_name: None,
            phone: None,
            language_code: "en".to_string(),
            is_admin: false,
            is_agent: false,
            is_active: true,
            is_blocked: false,
            wallet_balance: 0,
            referral_code: "ZXCV1234".to_string(),
            referred_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(callback_data(&admin_user_actions(&i18n, "en", &user)).contains(&"admin:block:9".to_string()));
        user.is_blocked = true;
        assert!(callback_data(&admin_user_actions(&i18n, "en", &user)).contains(&"admin:unblock:9".to_string()));
    }
}
