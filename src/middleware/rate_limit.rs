//! Rate limiting middleware
//!
//! Per-user limits on incoming updates, so one chatty client cannot
//! monopolise the database or the panel. Configured admins are exempt.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use teloxide::prelude::*;
use teloxide::types::Update;
use tracing::{debug, warn};

use crate::config::settings::RateLimitConfig;
use crate::state::AppContext;
use crate::utils::errors::{ShopError, Result};

/// Rate limiting middleware
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<DefaultKeyedRateLimiter<i64>>,
    exempt_ids: Vec<i64>,
}

/// `max_requests` per `window_seconds`, all of which may arrive at once
pub fn quota(config: &RateLimitConfig) -> Quota {
    let burst = NonZeroU32::new(config.max_requests).unwrap_or(NonZeroU32::MIN);
    let window = Duration::from_secs(config.window_seconds.max(1));
    Quota::with_period(window / burst.get())
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

impl RateLimitMiddleware {
    pub fn new(config: &RateLimitConfig, exempt_ids: Vec<i64>) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota(config))),
            exempt_ids,
        }
    }

    /// Check if user is rate limited
    pub fn check_rate_limit(&self, telegram_id: i64) -> Result<()> {
        if self.exempt_ids.contains(&telegram_id) {
            return Ok(());
        }

        match self.limiter.check_key(&telegram_id) {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!(user_id = telegram_id, "Rate limit exceeded");
                Err(ShopError::RateLimitExceeded)
            }
        }
    }

    /// Drop state of users whose buckets have refilled
    pub fn cleanup_old_entries(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        debug!(tracked_users = self.limiter.len(), "Cleaned up rate limit entries");
    }
}

/// Update filter: `true` lets the update through
///
/// A limited user is told once per rejected update in their language.
pub async fn allow_update(bot: Bot, update: Update, ctx: AppContext, limiter: RateLimitMiddleware) -> bool {
    let Some(user) = update.from() else {
        return true;
    };
    let telegram_id = user.id.0 as i64;

    if limiter.check_rate_limit(telegram_id).is_ok() {
        return true;
    }

    if let Some(chat) = update.chat() {
        if chat.is_private() {
            let lang = ctx.i18n.detect_user_language(user.language_code.as_deref());
            let text = ctx.t(ShopError::RateLimitExceeded.user_message_key(), &lang);
            if let Err(e) = bot.send_message(chat.id, text).await {
                debug!(user_id = telegram_id, error = %e, "Could not deliver rate limit notice");
            }
        }
    }
    false
}
