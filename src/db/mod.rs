//! Database module for the pouch server
//!
//! Every request works through one [`Store`] handle. The handle opens its
//! transaction on first use, keeps it for the rest of the request and either
//! commits or rolls it back when the request is done with it.

pub mod memory;
pub mod models;
pub mod operations;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{AppError, DatabaseError};

pub use memory::{MemoryStore, MemoryStoreProvider, MemoryTables};
pub use models::{Account, NewAccount, NewQuery, QuerySummary, Version};
pub use operations::{PgStore, PgStoreProvider};

/// Request-scoped access to the catalogue tables.
///
/// Statements issued through one handle share a transaction. A failed
/// statement leaves the handle in an error state; `close` then rolls back
/// instead of committing.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Store: Send {
    /// Newest queries first, with distinct version labels and tags aggregated.
    async fn latest_queries(&mut self, limit: i64) -> Result<Vec<QuerySummary>, DatabaseError>;

    async fn versions(&mut self) -> Result<Vec<Version>, DatabaseError>;

    async fn account_exists(&mut self, account: &str) -> Result<bool, DatabaseError>;

    async fn create_account(&mut self, account: &NewAccount) -> Result<i32, DatabaseError>;

    async fn find_account(
        &mut self,
        account: &str,
        password_hash: &str,
    ) -> Result<Option<Account>, DatabaseError>;

    async fn insert_query(&mut self, query: &NewQuery) -> Result<i32, DatabaseError>;

    async fn link_versions(&mut self, query_id: i32, versions: &[i32]) -> Result<(), DatabaseError>;

    /// Looks a tag up by its case-folded text.
    async fn find_tag(&mut self, tag: &str) -> Result<Option<i32>, DatabaseError>;

    /// Inserts the case-folded tag text.
    async fn insert_tag(&mut self, tag: &str) -> Result<i32, DatabaseError>;

    async fn link_tag(&mut self, query_id: i32, tag_id: i32) -> Result<(), DatabaseError>;

    /// Discards everything written so far. The next statement starts a new transaction.
    async fn rollback(&mut self) -> Result<(), DatabaseError>;

    /// Commits a clean transaction, rolls back one in an error state.
    async fn close(&mut self) -> Result<(), DatabaseError>;
}

/// Hands out one [`Store`] per request.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Store>, DatabaseError>;
}

/// Builds the provider named by the database url.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn StoreProvider>, AppError> {
    if config.is_memory() {
        info!("Using the in-memory store");
        return Ok(Arc::new(MemoryStoreProvider::default()));
    }

    let provider = PgStoreProvider::connect(
        &config.url,
        config.max_connections,
        Duration::from_secs(config.acquire_timeout_secs),
    )
    .await?;

    if config.run_migrations {
        provider.migrate().await?;
        info!("Database migrations applied");
    }

    Ok(Arc::new(provider))
}
