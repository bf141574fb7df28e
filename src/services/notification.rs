//! Notification service implementation
//!
//! Sends translated messages to users and fans admin alerts out to every
//! admin. Delivery failures are logged and counted; they never abort the
//! operation that triggered them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};
use tracing::{info, warn, debug};

use crate::config::settings::Settings;
use crate::database::repositories::UserRepository;
use crate::i18n::{I18n, TranslationParams};
use crate::utils::errors::Result;

/// Delivery counters since startup
#[derive(Debug, Default)]
pub struct NotificationStats {
    pub total_sent: AtomicU64,
    pub total_failed: AtomicU64,
}

/// Notification service for message handling
#[derive(Clone)]
pub struct NotificationService {
    bot: Bot,
    i18n: Arc<I18n>,
    settings: Settings,
    user_repository: UserRepository,
    stats: Arc<NotificationStats>,
}

impl NotificationService {
    pub fn new(bot: Bot, i18n: Arc<I18n>, settings: Settings, user_repository: UserRepository) -> Self {
        Self {
            bot,
            i18n,
            settings,
            user_repository,
            stats: Arc::new(NotificationStats::default()),
        }
    }

    /// Send a translated message to one chat
    pub async fn notify_user(
        &self,
        telegram_id: i64,
        language: &str,
        key: &str,
        params: Option<&TranslationParams>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let text = self.i18n.t(key, language, params);
        self.send_text(ChatId(telegram_id), text, keyboard).await
    }

    /// Send a translated message to every admin in their default language
    ///
    /// Returns how many admins received it.
    pub async fn notify_admins(
        &self,
        key: &str,
        params: Option<&TranslationParams>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<usize> {
        let admin_ids = self.admin_ids().await?;
        if admin_ids.is_empty() {
            warn!("No admins to notify");
            return Ok(0);
        }

        let text = self.i18n.t(key, &self.settings.i18n.default_language, params);
        let sends = admin_ids
            .into_iter()
            .map(|id| self.send_text(ChatId(id), text.clone(), keyboard.clone()));

        let delivered = join_all(sends).await.into_iter().filter(|r| r.is_ok()).count();
        info!(key = %key, delivered = delivered, "Admin notification sent");
        Ok(delivered)
    }

    async fn admin_ids(&self) -> Result<Vec<i64>> {
        let mut ids = self.settings.bot.admin_ids.clone();
        for id in self.user_repository.admin_telegram_ids().await? {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn send_text(&self, chat_id: ChatId, text: String, keyboard: Option<InlineKeyboardMarkup>) -> Result<()> {
        let mut request = self.bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }

        match request.await {
            Ok(_) => {
                self.stats.total_sent.fetch_add(1, Ordering::Relaxed);
                debug!(chat_id = ?chat_id, "Notification sent");
                Ok(())
            }
            Err(e) => {
                self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
                warn!(chat_id = ?chat_id, error = %e, "Failed to send notification");
                Err(e.into())
            }
        }
    }

    pub fn i18n(&self) -> &I18n {
        &self.i18n
    }

    /// Language used for admin-facing messages
    pub fn admin_language(&self) -> &str {
        &self.settings.i18n.default_language
    }

    pub fn sent_count(&self) -> u64 {
        self.stats.total_sent.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> u64 {
        self.stats.total_failed.load(Ordering::Relaxed)
    }
}
