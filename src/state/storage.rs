//! State storage implementation
//!
//! Conversation contexts live in Redis as JSON under
//! `{prefix}context:{telegram_id}` with a TTL, so an abandoned dialog
//! disappears on its own.

use redis::AsyncCommands;
use tracing::{debug, warn, error};
use crate::utils::errors::Result;
use crate::config::RedisConfig;
use super::context::ConversationContext;

/// Minimum TTL given to a stored context
const MIN_TTL_SECONDS: u64 = 60;

/// Redis-based state storage manager
#[derive(Clone)]
pub struct StateStorage {
    connection_manager: redis::aio::ConnectionManager,
    config: RedisConfig,
}

impl StateStorage {
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            connection_manager,
            config,
        })
    }

    pub async fn save_context(&self, context: &ConversationContext) -> Result<()> {
        let key = self.get_context_key(context.user_id);
        let serialized = serde_json::to_string(context)?;
        let ttl_seconds = context_ttl(context, self.config.ttl_seconds);

        let mut conn = self.connection_manager.clone();
        if let Err(e) = conn.set_ex::<_, _, ()>(&key, serialized, ttl_seconds).await {
            error!(user_id = context.user_id, error = %e, "Failed to save context to Redis");
            return Err(e.into());
        }

        debug!(user_id = context.user_id, scenario = ?context.scenario, step = ?context.step,
               ttl_seconds = ttl_seconds, "Context saved");
        Ok(())
    }

    /// Load a context; expired or unreadable entries are dropped
    pub async fn load_context(&self, user_id: i64) -> Result<Option<ConversationContext>> {
        let key = self.get_context_key(user_id);
        let mut conn = self.connection_manager.clone();

        let serialized: Option<String> = conn.get(&key).await?;
        let data = match serialized {
            Some(data) => data,
            None => return Ok(None),
        };

        let context = match serde_json::from_str::<ConversationContext>(&data) {
            Ok(context) => context,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Discarding unreadable context");
                self.delete_context(user_id).await?;
                return Ok(None);
            }
        };

        if context.is_expired() {
            debug!(user_id = user_id, expires_at = ?context.expires_at, "Context has expired, removing");
            self.delete_context(user_id).await?;
            return Ok(None);
        }

        Ok(Some(context))
    }

    pub async fn delete_context(&self, user_id: i64) -> Result<()> {
        let key = self.get_context_key(user_id);
        let mut conn = self.connection_manager.clone();

        let deleted: u32 = conn.del(&key).await?;
        debug!(user_id = user_id, deleted = deleted, "Context deleted");
        Ok(())
    }

    /// PING the server
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection_manager.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }

    fn get_context_key(&self, user_id: i64) -> String {
        context_key(&self.config.prefix, user_id)
    }
}

pub fn context_key(prefix: &str, user_id: i64) -> String {
    format!("{}context:{}", prefix, user_id)
}

/// Seconds until the context's own expiry, or the configured default
pub fn context_ttl(context: &ConversationContext, default_ttl: u64) -> u64 {
    match context.expires_at {
        Some(expires_at) => {
            let remaining = (expires_at - chrono::Utc::now()).num_seconds();
            std::cmp::max(remaining, MIN_TTL_SECONDS as i64) as u64
        }
        None => default_ttl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_context_key() {
        assert_eq!(context_key("hiddyshop:", 42), "hiddyshop:context:42");
    }

    #[test]
    fn test_context_ttl() {
        let mut context = ConversationContext::new(1);
        assert_eq!(context_ttl(&context, 3600), 3600);

        context.set_expiry(Utc::now() + Duration::seconds(5));
        assert_eq!(context_ttl(&context, 3600), MIN_TTL_SECONDS);

        context.set_expiry(Utc::now() + Duration::minutes(30));
        let ttl = context_ttl(&context, 3600);
        assert!(ttl > 1700 && ttl <= 1800);
    }
}
