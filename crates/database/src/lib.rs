//! Swapmeet Database Crate
//!
//! Connection management, migrations, and repositories for the Swapmeet
//! backend. The real-time layer only ever reaches this crate through narrow
//! repository interfaces.

use sqlx::SqlitePool;
use swapmeet_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod error;
pub mod migrations;
pub mod repos;

pub use connection::prepare_database;
pub use entities::{Conversation, ConversationStatus};
pub use error::{DatabaseError, DatabaseResult};
pub use migrations::run_migrations;
pub use repos::ConversationRepository;

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    Ok(pool)
}
