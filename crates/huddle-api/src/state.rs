//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository traits, but AppState pins them to the
//! SQLite implementations. A single `EventBus` is created here and shared by
//! the conversation service and the subscription gateway.

use std::path::PathBuf;
use std::sync::Arc;

use huddle_core::event::EventBus;
use huddle_core::service::conversation::ConversationService;
use huddle_core::service::user::UserService;
use huddle_core::subscription::SubscriptionGateway;
use huddle_infra::config::{load_server_config, resolve_data_dir};
use huddle_infra::sqlite::conversation::SqliteConversationRepository;
use huddle_infra::sqlite::pool::{DatabasePool, database_url_for};
use huddle_infra::sqlite::session::SqliteSessionStore;
use huddle_infra::sqlite::user::SqliteUserRepository;
use huddle_types::config::ServerConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteConversationService = ConversationService<SqliteConversationRepository>;

pub type ConcreteUserService = UserService<SqliteUserRepository>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub conversation_service: Arc<ConcreteConversationService>,
    pub user_service: Arc<ConcreteUserService>,
    pub sessions: Arc<SqliteSessionStore>,
    pub gateway: SubscriptionGateway,
    pub event_bus: Arc<EventBus>,
    pub config: Arc<ServerConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state from the resolved data directory.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_server_config(&data_dir).await;
        Self::with_config(data_dir, config).await
    }

    /// Connect to the database and wire services for an explicit config.
    pub async fn with_config(data_dir: PathBuf, config: ServerConfig) -> anyhow::Result<Self> {
        let db_url = config
            .database_url
            .clone()
            .unwrap_or_else(|| database_url_for(&data_dir));
        let db_pool = DatabasePool::new(&db_url).await?;

        let event_bus = Arc::new(EventBus::new(config.event_bus_capacity));

        let conversation_service = ConversationService::new(
            SqliteConversationRepository::new(db_pool.clone()),
            event_bus.clone(),
        );
        let user_service = UserService::new(SqliteUserRepository::new(db_pool.clone()));
        let sessions = SqliteSessionStore::new(db_pool.clone());
        let gateway = SubscriptionGateway::new(event_bus.clone(), config.fanout_policy);

        tracing::debug!(
            data_dir = %data_dir.display(),
            fanout = ?config.fanout_policy,
            "application state initialised"
        );

        Ok(Self {
            conversation_service: Arc::new(conversation_service),
            user_service: Arc::new(user_service),
            sessions: Arc::new(sessions),
            gateway,
            event_bus,
            config: Arc::new(config),
            data_dir,
            db_pool,
        })
    }

    /// Session lifetime from config. Zero means sessions never expire.
    pub fn session_ttl(&self) -> Option<chrono::Duration> {
        match self.config.session_ttl_hours {
            0 => None,
            hours => Some(chrono::Duration::hours(i64::from(hours))),
        }
    }
}

#[cfg(test)]
pub(crate) async fn test_state(config: ServerConfig) -> AppState {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_path_buf();
    // Leak tempdir so it lives for the test
    std::mem::forget(dir);
    AppState::with_config(data_dir, config).await.unwrap()
}
