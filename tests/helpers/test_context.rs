//! Test context for unified test setup
//!
//! Wires the real services to a test database, a mock Telegram API and a
//! mock panel.

use std::sync::Arc;
use tempfile::TempDir;

use hiddyshop::config::Settings;
use hiddyshop::database::DatabaseService;
use hiddyshop::i18n::I18n;
use hiddyshop::services::ServiceFactory;

use super::{
    database_helper::TestDatabase, panel_mock::PanelMockServer, telegram_mock::TelegramMockServer,
    test_data::TEST_ADMIN_TELEGRAM_ID,
};

pub struct TestContext {
    pub database: TestDatabase,
    pub telegram: TelegramMockServer,
    pub panel: PanelMockServer,
    pub settings: Settings,
    pub services: ServiceFactory,
    pub temp_dir: TempDir,
}

impl TestContext {
    /// Full context, or `None` when no database is available
    pub async fn new() -> Option<Self> {
        Self::with_settings(|_| {}).await
    }

    /// Full context with test settings adjusted by `configure`
    pub async fn with_settings(configure: impl FnOnce(&mut Settings)) -> Option<Self> {
        let database = TestDatabase::new().await?;
        let telegram = TelegramMockServer::new().await;
        let panel = PanelMockServer::new().await;
        let temp_dir = tempfile::tempdir().ok()?;

        let mut settings = test_settings(&database, &panel, &temp_dir);
        configure(&mut settings);

        let services = build_services(&settings, &database, &telegram).await;

        Some(Self {
            database,
            telegram,
            panel,
            settings,
            services,
            temp_dir,
        })
    }
}

/// Settings for tests; nothing touches the network beyond the mocks
pub fn test_settings(database: &TestDatabase, panel: &PanelMockServer, temp_dir: &TempDir) -> Settings {
    let mut settings = Settings::default();

    settings.bot.token = super::telegram_mock::TEST_BOT_TOKEN.to_string();
    settings.bot.admin_ids = vec![TEST_ADMIN_TELEGRAM_ID];

    settings.database.url = database.database_url.clone();
    settings.database.max_connections = 5;

    settings.panel = panel.config();

    settings.shop.card_number = Some("6037-0000-0000-0000".to_string());
    settings.shop.card_holder = Some("Test Holder".to_string());
    settings.shop.referral_commission_percent = 10;

    settings.backup.directory = temp_dir.path().join("backups").to_string_lossy().to_string();
    settings.i18n.translations_dir = format!("{}/translations", env!("CARGO_MANIFEST_DIR"));
    settings.logging.level = "debug".to_string();
    settings.logging.directory = temp_dir.path().join("logs").to_string_lossy().to_string();

    settings
}

pub async fn load_translations(settings: &Settings) -> Arc<I18n> {
    let mut i18n = I18n::new(&settings.i18n);
    i18n.load_translations().await.expect("load translations");
    Arc::new(i18n)
}

async fn build_services(settings: &Settings, database: &TestDatabase, telegram: &TelegramMockServer) -> ServiceFactory {
    let i18n = load_translations(settings).await;
    ServiceFactory::new(
        telegram.bot(),
        settings.clone(),
        DatabaseService::new(database.pool.clone()),
        i18n,
    )
    .expect("build services")
}
