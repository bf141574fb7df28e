//! HiddyShop Telegram Bot
//!
//! Main application entry point

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use teloxide::dispatching::UpdateHandler;
use teloxide::{prelude::*, types::Update, utils::command::BotCommands};
use tracing::{info, warn, error};

use hiddyshop::{
    config::Settings,
    database::{self, DatabaseService},
    handlers::{handle_callback_query, handle_command, handle_message, Command, HandlerResult},
    i18n::I18n,
    middleware::{allow_update, logging::PerformanceTracker, LoggingMiddleware, RateLimitMiddleware},
    services::ServiceFactory,
    state::{AppContext, ScenarioManager, StateStorage},
    utils::logging,
};

/// How often idle rate limit buckets are dropped
const RATE_LIMIT_CLEANUP: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("loading configuration")?;
    settings.validate().context("validating configuration")?;

    let _log_guard = logging::init_logging(&settings.logging)?;
    info!("Starting {}...", hiddyshop::info());

    info!("Connecting to database...");
    let pool = database::create_pool(&database::DatabaseConfig::from_settings(&settings.database))
        .await
        .context("connecting to the database")?;
    database::run_migrations(&pool).await.context("running migrations")?;
    let database_service = DatabaseService::new(pool);

    info!("Loading translations...");
    let mut i18n = I18n::new(&settings.i18n);
    i18n.load_translations().await.context("loading translations")?;
    let i18n = Arc::new(i18n);

    info!("Connecting to Redis...");
    let storage = StateStorage::new(settings.redis.clone())
        .await
        .context("connecting to Redis")?;

    let bot = Bot::new(&settings.bot.token);

    info!("Initializing services...");
    let services = ServiceFactory::new(bot.clone(), settings.clone(), database_service, i18n.clone())?;
    let health = services.health_check(&storage).await;
    if health.is_healthy() {
        info!("All services healthy");
    } else {
        for issue in health.get_issues() {
            warn!(issue = %issue, "Service health issue at startup");
        }
    }

    let ctx = AppContext::new(
        settings.clone(),
        Arc::new(services),
        Arc::new(ScenarioManager::new()),
        storage,
        i18n,
    );
    let limiter = RateLimitMiddleware::new(&settings.rate_limit, settings.bot.admin_ids.clone());
    spawn_rate_limit_cleanup(limiter.clone());

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Could not register bot commands");
    }

    if let Some(webhook_url) = &settings.bot.webhook_url {
        warn!(webhook_url = %webhook_url, "Webhook delivery is not wired up, using long polling");
    }

    let mut dispatcher = Dispatcher::builder(bot, create_handler())
        .dependencies(dptree::deps![ctx, limiter, LoggingMiddleware::default()])
        .default_handler(|upd| async move {
            tracing::debug!(update_id = upd.id.0, "Unhandled update");
        })
        .error_handler(LoggingErrorHandler::with_custom_text("An error from the update listener"))
        .enable_ctrlc_handler()
        .build();

    info!("HiddyShop bot is ready, starting long polling");
    dispatcher.dispatch().await;

    info!("HiddyShop bot has been shut down.");
    Ok(())
}

fn spawn_rate_limit_cleanup(limiter: RateLimitMiddleware) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP);
        loop {
            interval.tick().await;
            limiter.cleanup_old_entries();
        }
    });
}

/// Create the main update handler
fn create_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dptree::entry()
        .filter_async(allow_update)
        .inspect(|update: Update, updates_log: LoggingMiddleware| updates_log.log_update(&update))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_commands),
                )
                .branch(dptree::endpoint(handle_messages)),
        )
        .branch(Update::filter_callback_query().endpoint(handle_callbacks))
}

/// Handle bot commands
async fn handle_commands(bot: Bot, msg: Message, cmd: Command, ctx: AppContext, updates_log: LoggingMiddleware) -> HandlerResult {
    let tracker = updates_log.track("command");
    let result = handle_command(bot, msg, cmd, ctx).await;
    finish(tracker, "command", result)
}

/// Handle regular messages
async fn handle_messages(bot: Bot, msg: Message, ctx: AppContext, updates_log: LoggingMiddleware) -> HandlerResult {
    let tracker = updates_log.track("message");
    let result = handle_message(bot, msg, ctx).await;
    finish(tracker, "message", result)
}

/// Handle callback queries
async fn handle_callbacks(bot: Bot, query: CallbackQuery, ctx: AppContext, updates_log: LoggingMiddleware) -> HandlerResult {
    let tracker = updates_log.track("callback");
    let result = handle_callback_query(bot, query, ctx).await;
    finish(tracker, "callback", result)
}

fn finish(tracker: Option<PerformanceTracker>, kind: &str, result: hiddyshop::Result<()>) -> HandlerResult {
    if let Some(tracker) = tracker {
        tracker.complete(result.is_ok());
    }
    if let Err(e) = result {
        error!(handler = kind, error = %e, "Handler failed");
        return Err(e.into());
    }
    Ok(())
}
