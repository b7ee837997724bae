//! Runtime wiring for the Swapmeet backend: telemetry, service
//! initialisation, and shutdown handling.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use swapmeet_auth::Authenticator;
use swapmeet_config::AppConfig;
use swapmeet_database::{initialize_database, ConversationRepository};
use swapmeet_realtime::{ConversationStore, RealtimeHub, StoreError};
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::INFO)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// SQL-backed implementation of the hub's conversation-store seam.
pub struct SqlConversationStore {
    repository: ConversationRepository,
}

impl SqlConversationStore {
    pub fn new(repository: ConversationRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl ConversationStore for SqlConversationStore {
    async fn is_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<bool, StoreError> {
        self.repository
            .is_participant(conversation_id, user_id)
            .await
            .map_err(|err| StoreError::Lookup(err.to_string()))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
    pub hub: Arc<RealtimeHub>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database).await?;

        let authenticator = Authenticator::new(db_pool.clone(), config.auth.clone());

        let store = Arc::new(SqlConversationStore::new(ConversationRepository::new(
            db_pool.clone(),
        )));
        let hub = Arc::new(RealtimeHub::new(store, config.realtime.channel_capacity));

        info!("realtime hub ready");

        Ok(Self {
            db_pool,
            authenticator,
            hub,
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapmeet_config::{AppConfig, DatabaseConfig};
    use tempfile::TempDir;

    #[tokio::test]
    async fn initialise_wires_services_against_fresh_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_url = format!("sqlite://{}", temp_dir.path().join("runtime.db").display());

        let config = AppConfig {
            database: DatabaseConfig {
                url: db_url,
                max_connections: 1,
            },
            ..AppConfig::default()
        };

        let services = BackendServices::initialise(&config).await.unwrap();
        assert!(services.hub.list_connected_users().await.is_empty());

        // The authenticator shares the migrated pool.
        let user = services
            .authenticator
            .register_with_password("init@example.com", "s3cret", None)
            .await
            .unwrap();
        assert!(!user.public_id.is_empty());
    }

    #[tokio::test]
    async fn sql_store_answers_participation_queries() {
        let temp_dir = TempDir::new().unwrap();
        let db_url = format!("sqlite://{}", temp_dir.path().join("store.db").display());

        let config = AppConfig {
            database: DatabaseConfig {
                url: db_url,
                max_connections: 1,
            },
            ..AppConfig::default()
        };

        let services = BackendServices::initialise(&config).await.unwrap();
        let user = services
            .authenticator
            .register_with_password("trader@example.com", "s3cret", Some("Trader"))
            .await
            .unwrap();

        let repository = ConversationRepository::new(services.db_pool.clone());
        let conversation = repository.create(None, &[user.id]).await.unwrap();

        let store = SqlConversationStore::new(repository);
        assert!(store
            .is_participant(&conversation.public_id, &user.public_id)
            .await
            .unwrap());
        assert!(!store
            .is_participant(&conversation.public_id, "someone-else")
            .await
            .unwrap());
    }
}
