use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::db::models::{Account, NewAccount, NewQuery, QuerySummary, Version};
use crate::db::{Store, StoreProvider};
use crate::error::DatabaseError;

const ABORTED: &str = "current transaction is aborted, commands ignored until end of transaction block";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAccount {
    pub account: Account,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredQuery {
    pub id: i32,
    pub query: String,
    pub title: String,
    pub description: String,
    pub account_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTag {
    pub id: i32,
    pub tag: String,
}

/// Committed contents of the in-memory catalogue.
#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    pub accounts: Vec<StoredAccount>,
    pub queries: Vec<StoredQuery>,
    pub versions: Vec<Version>,
    pub tags: Vec<StoredTag>,
    pub queries_versions: Vec<(i32, i32)>,
    pub queries_tags: Vec<(i32, i32)>,
}

impl MemoryTables {
    pub fn with_versions(versions: Vec<Version>) -> Self {
        Self {
            versions,
            ..Self::default()
        }
    }

    fn next_id(ids: impl Iterator<Item = i32>) -> i32 {
        ids.max().unwrap_or(0) + 1
    }

    fn summarize(&self, query: &StoredQuery) -> QuerySummary {
        let versions: BTreeSet<&str> = self
            .queries_versions
            .iter()
            .filter(|(query_id, _)| *query_id == query.id)
            .filter_map(|(_, num)| self.versions.iter().find(|v| v.version_num == *num))
            .map(|v| v.version.as_str())
            .collect();
        let tags: BTreeSet<&str> = self
            .queries_tags
            .iter()
            .filter(|(query_id, _)| *query_id == query.id)
            .filter_map(|(_, tag_id)| self.tags.iter().find(|t| t.id == *tag_id))
            .map(|t| t.tag.as_str())
            .collect();

        QuerySummary {
            id: query.id,
            query: query.query.clone(),
            versions: (!versions.is_empty()).then(|| versions.into_iter().collect::<Vec<_>>().join(", ")),
            title: query.title.clone(),
            description: Some(query.description.clone()),
            tags: tags.into_iter().map(str::to_string).collect(),
        }
    }
}

/// Process-local backend selected with a `memory://` database url.
///
/// A store locks the tables at its first statement and keeps the lock until
/// it is closed, rolled back or dropped, so transactions run one at a time.
/// Statements work on a staged copy; closing a clean store publishes it.
pub struct MemoryStoreProvider {
    tables: Arc<Mutex<MemoryTables>>,
}

impl MemoryStoreProvider {
    pub fn new(tables: MemoryTables) -> Self {
        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }

    /// The committed tables. Waits for an open transaction to finish.
    pub async fn snapshot(&self) -> MemoryTables {
        self.tables.lock().await.clone()
    }

    pub fn store(&self) -> MemoryStore {
        MemoryStore {
            shared: self.tables.clone(),
            guard: None,
            staged: None,
            failed: false,
        }
    }
}

impl Default for MemoryStoreProvider {
    fn default() -> Self {
        let versions = [(90000, "9.0"), (90100, "9.1"), (90200, "9.2"), (90300, "9.3"), (90400, "9.4")]
            .into_iter()
            .map(|(version_num, version)| Version {
                version_num,
                version: version.to_string(),
            })
            .collect();
        Self::new(MemoryTables::with_versions(versions))
    }
}

#[async_trait]
impl StoreProvider for MemoryStoreProvider {
    async fn open(&self) -> Result<Box<dyn Store>, DatabaseError> {
        Ok(Box::new(self.store()))
    }
}

pub struct MemoryStore {
    shared: Arc<Mutex<MemoryTables>>,
    guard: Option<OwnedMutexGuard<MemoryTables>>,
    staged: Option<MemoryTables>,
    failed: bool,
}

impl MemoryStore {
    async fn tables(&mut self) -> Result<&mut MemoryTables, DatabaseError> {
        if self.failed {
            return Err(DatabaseError::QueryError(ABORTED.to_string()));
        }
        if self.staged.is_none() {
            let guard = self.shared.clone().lock_owned().await;
            self.staged = Some(MemoryTables::clone(&guard));
            self.guard = Some(guard);
        }
        Ok(self.staged.get_or_insert_with(MemoryTables::default))
    }

    fn fail<T>(&mut self, err: DatabaseError) -> Result<T, DatabaseError> {
        debug!("Memory statement failed: {}", err);
        self.failed = true;
        Err(err)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn latest_queries(&mut self, limit: i64) -> Result<Vec<QuerySummary>, DatabaseError> {
        let tables = self.tables().await?;
        let mut queries: Vec<&StoredQuery> = tables.queries.iter().collect();
        queries.sort_by(|a, b| b.id.cmp(&a.id));

        Ok(queries
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|query| tables.summarize(query))
            .collect())
    }

    async fn versions(&mut self) -> Result<Vec<Version>, DatabaseError> {
        let mut versions = self.tables().await?.versions.clone();
        versions.sort_by_key(|v| v.version_num);
        Ok(versions)
    }

    async fn account_exists(&mut self, account: &str) -> Result<bool, DatabaseError> {
        let tables = self.tables().await?;
        Ok(tables.accounts.iter().any(|a| a.account.account == account))
    }

    async fn create_account(&mut self, account: &NewAccount) -> Result<i32, DatabaseError> {
        let tables = self.tables().await?;
        if tables.accounts.iter().any(|a| a.account.account == account.account) {
            return self.fail(DatabaseError::Duplicate);
        }

        let id = MemoryTables::next_id(tables.accounts.iter().map(|a| a.account.id));
        tables.accounts.push(StoredAccount {
            account: Account {
                id,
                account: account.account.clone(),
                fullname: account.fullname.clone(),
                email: account.email.clone(),
                is_admin: false,
            },
            password_hash: account.password_hash.clone(),
        });
        Ok(id)
    }

    async fn find_account(
        &mut self,
        account: &str,
        password_hash: &str,
    ) -> Result<Option<Account>, DatabaseError> {
        let tables = self.tables().await?;
        Ok(tables
            .accounts
            .iter()
            .find(|a| a.account.account == account && a.password_hash == password_hash)
            .map(|a| a.account.clone()))
    }

    async fn insert_query(&mut self, query: &NewQuery) -> Result<i32, DatabaseError> {
        let tables = self.tables().await?;
        if !tables.accounts.iter().any(|a| a.account.id == query.account_id) {
            return self.fail(DatabaseError::QueryError(format!(
                "account {} does not exist",
                query.account_id
            )));
        }

        let id = MemoryTables::next_id(tables.queries.iter().map(|q| q.id));
        tables.queries.push(StoredQuery {
            id,
            query: query.query.clone(),
            title: query.title.clone(),
            description: query.description.clone(),
            account_id: query.account_id,
        });
        Ok(id)
    }

    async fn link_versions(&mut self, query_id: i32, versions: &[i32]) -> Result<(), DatabaseError> {
        let tables = self.tables().await?;
        for version_num in versions {
            if !tables.versions.iter().any(|v| v.version_num == *version_num) {
                return self.fail(DatabaseError::QueryError(format!(
                    "version {} does not exist",
                    version_num
                )));
            }
            if tables.queries_versions.contains(&(query_id, *version_num)) {
                return self.fail(DatabaseError::Duplicate);
            }
            tables.queries_versions.push((query_id, *version_num));
        }
        Ok(())
    }

    async fn find_tag(&mut self, tag: &str) -> Result<Option<i32>, DatabaseError> {
        let folded = tag.to_lowercase();
        let tables = self.tables().await?;
        Ok(tables.tags.iter().find(|t| t.tag == folded).map(|t| t.id))
    }

    async fn insert_tag(&mut self, tag: &str) -> Result<i32, DatabaseError> {
        let folded = tag.to_lowercase();
        let tables = self.tables().await?;
        if tables.tags.iter().any(|t| t.tag == folded) {
            return self.fail(DatabaseError::Duplicate);
        }

        let id = MemoryTables::next_id(tables.tags.iter().map(|t| t.id));
        tables.tags.push(StoredTag { id, tag: folded });
        Ok(id)
    }

    async fn link_tag(&mut self, query_id: i32, tag_id: i32) -> Result<(), DatabaseError> {
        let tables = self.tables().await?;
        if tables.queries_tags.contains(&(query_id, tag_id)) {
            return self.fail(DatabaseError::Duplicate);
        }
        tables.queries_tags.push((query_id, tag_id));
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.staged = None;
        self.guard = None;
        self.failed = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DatabaseError> {
        let staged = self.staged.take();
        let guard = self.guard.take();
        if self.failed {
            self.failed = false;
            return Ok(());
        }
        if let (Some(tables), Some(mut guard)) = (staged, guard) {
            *guard = tables;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str) -> NewAccount {
        NewAccount {
            account: name.to_string(),
            fullname: "Test User".to_string(),
            email: format!("{}@example.com", name),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_close_publishes_clean_writes() {
        let provider = MemoryStoreProvider::default();
        let mut store = provider.store();

        store.create_account(&account("alice")).await.unwrap();
        store.close().await.unwrap();
        assert_eq!(provider.snapshot().await.accounts.len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_stores_keep_both_writes() {
        let provider = MemoryStoreProvider::default();
        let mut first = provider.store();
        let mut second = provider.store();

        first.create_account(&account("alice")).await.unwrap();

        // The second transaction waits for the first to finish
        let pending = tokio::spawn(async move {
            let id = second.create_account(&account("bob")).await.unwrap();
            second.close().await.unwrap();
            id
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        first.close().await.unwrap();
        let bob = pending.await.unwrap();

        let accounts = provider.snapshot().await.accounts;
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].account.account, "alice");
        assert_eq!(accounts[1].account.account, "bob");
        assert_eq!(accounts[1].account.id, bob);
        assert_ne!(accounts[0].account.id, bob);
    }

    #[tokio::test]
    async fn test_failed_statement_aborts_transaction() {
        let provider = MemoryStoreProvider::default();
        let mut store = provider.store();

        store.create_account(&account("alice")).await.unwrap();
        assert_eq!(store.create_account(&account("alice")).await, Err(DatabaseError::Duplicate));
        assert!(matches!(store.account_exists("alice").await, Err(DatabaseError::QueryError(_))));

        store.close().await.unwrap();
        assert!(provider.snapshot().await.accounts.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_starts_fresh_transaction() {
        let provider = MemoryStoreProvider::default();
        let mut store = provider.store();

        store.create_account(&account("alice")).await.unwrap();
        store.rollback().await.unwrap();
        assert!(!store.account_exists("alice").await.unwrap());

        store.create_account(&account("bob")).await.unwrap();
        store.close().await.unwrap();

        let accounts = provider.snapshot().await.accounts;
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account.account, "bob");
    }

    #[tokio::test]
    async fn test_dropped_store_discards_writes() {
        let provider = MemoryStoreProvider::default();
        {
            let mut store = provider.store();
            store.create_account(&account("alice")).await.unwrap();
        }
        assert!(provider.snapshot().await.accounts.is_empty());
    }

    #[tokio::test]
    async fn test_tags_are_case_folded() {
        let provider = MemoryStoreProvider::default();
        let mut store = provider.store();

        let id = store.insert_tag("PgBouncer").await.unwrap();
        assert_eq!(store.find_tag("pgbouncer").await.unwrap(), Some(id));
        assert_eq!(store.find_tag("PGBOUNCER").await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_latest_queries_aggregates_links() {
        let provider = MemoryStoreProvider::default();
        let mut store = provider.store();

        let account_id = store.create_account(&account("alice")).await.unwrap();
        let new_query = |title: &str| NewQuery {
            query: "select 1".to_string(),
            title: title.to_string(),
            description: String::new(),
            account_id,
        };
        let first = store.insert_query(&new_query("first")).await.unwrap();
        let second = store.insert_query(&new_query("second")).await.unwrap();
        store.link_versions(second, &[90300, 90100]).await.unwrap();
        let tag = store.insert_tag("locks").await.unwrap();
        store.link_tag(second, tag).await.unwrap();

        let latest = store.latest_queries(10).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].id, second);
        assert_eq!(latest[0].versions.as_deref(), Some("9.1, 9.3"));
        assert_eq!(latest[0].tags, vec!["locks".to_string()]);
        assert_eq!(latest[1].id, first);
        assert_eq!(latest[1].versions, None);
        assert!(latest[1].tags.is_empty());

        assert_eq!(store.latest_queries(1).await.unwrap().len(), 1);
    }
}
