use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::{Query, QueryAs};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::db::models::{Account, NewAccount, NewQuery, QuerySummary, Version};
use crate::db::{Store, StoreProvider};
use crate::error::DatabaseError;

const LATEST_QUERIES: &str = r#"
    SELECT q.id, q.query, string_agg(DISTINCT v.version, ', ') AS versions, q.title, q.description,
      array_remove(array_agg(DISTINCT t.tag), NULL) AS tags
    FROM queries q
      LEFT JOIN queries_versions qv ON (q.id = qv.query_id)
      LEFT JOIN versions v ON (qv.version_num = v.version_num)
      LEFT JOIN queries_tags qt ON (q.id = qt.query_id)
      LEFT JOIN tags t ON (qt.tag_id = t.id)
    GROUP BY q.id, q.title, q.description
    ORDER BY q.id DESC
    LIMIT $1
"#;

pub struct PgStoreProvider {
    pool: Arc<PgPool>,
}

impl PgStoreProvider {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await
    }
}

#[async_trait]
impl StoreProvider for PgStoreProvider {
    async fn open(&self) -> Result<Box<dyn Store>, DatabaseError> {
        Ok(Box::new(PgStore::new(self.pool.clone())))
    }
}

/// A request's transaction on the Postgres pool.
///
/// Dropping a store that was never closed rolls its transaction back.
pub struct PgStore {
    pool: Arc<PgPool>,
    transaction: Option<Transaction<'static, Postgres>>,
    failed: bool,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            transaction: None,
            failed: false,
        }
    }

    async fn connection(&mut self) -> Result<&mut PgConnection, DatabaseError> {
        let transaction = match self.transaction.take() {
            Some(transaction) => transaction,
            None => {
                debug!("Beginning request transaction");
                self.pool
                    .begin()
                    .await
                    .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?
            }
        };
        Ok(&mut **self.transaction.insert(transaction))
    }

    fn track<T>(&mut self, result: Result<T, sqlx::Error>) -> Result<T, DatabaseError> {
        result.map_err(|e| {
            warn!("Statement failed, transaction marked for rollback: {}", e);
            self.failed = true;
            DatabaseError::from(e)
        })
    }

    /// Every row the query returns.
    pub async fn fetch_all<'q, T>(
        &mut self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Vec<T>, DatabaseError>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let result = {
            let connection = self.connection().await?;
            query.fetch_all(connection).await
        };
        self.track(result)
    }

    /// The first row the query returns, if any.
    pub async fn fetch_optional<'q, T>(
        &mut self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Option<T>, DatabaseError>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let result = {
            let connection = self.connection().await?;
            query.fetch_optional(connection).await
        };
        self.track(result)
    }

    pub async fn execute<'q>(&mut self, query: Query<'q, Postgres, PgArguments>) -> Result<u64, DatabaseError> {
        let result = {
            let connection = self.connection().await?;
            query.execute(connection).await
        };
        self.track(result).map(|done| done.rows_affected())
    }

    async fn fetch_id<'q>(
        &mut self,
        query: QueryAs<'q, Postgres, (i32,), PgArguments>,
    ) -> Result<i32, DatabaseError> {
        self.fetch_optional(query)
            .await?
            .map(|(id,)| id)
            .ok_or(DatabaseError::NotFound)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn latest_queries(&mut self, limit: i64) -> Result<Vec<QuerySummary>, DatabaseError> {
        self.fetch_all(sqlx::query_as::<_, QuerySummary>(LATEST_QUERIES).bind(limit))
            .await
    }

    async fn versions(&mut self) -> Result<Vec<Version>, DatabaseError> {
        self.fetch_all(sqlx::query_as::<_, Version>(
            "SELECT version_num, version FROM versions ORDER BY 1",
        ))
        .await
    }

    async fn account_exists(&mut self, account: &str) -> Result<bool, DatabaseError> {
        let row = self
            .fetch_optional(
                sqlx::query_as::<_, (i32,)>("SELECT 1 FROM accounts WHERE account = $1").bind(account),
            )
            .await?;
        Ok(row.is_some())
    }

    async fn create_account(&mut self, account: &NewAccount) -> Result<i32, DatabaseError> {
        self.fetch_id(
            sqlx::query_as(
                r#"
                INSERT INTO accounts (account, fullname, password, email)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(&account.account)
            .bind(&account.fullname)
            .bind(&account.password_hash)
            .bind(&account.email),
        )
        .await
    }

    async fn find_account(
        &mut self,
        account: &str,
        password_hash: &str,
    ) -> Result<Option<Account>, DatabaseError> {
        self.fetch_optional(
            sqlx::query_as::<_, Account>(
                r#"
                SELECT id, account, fullname, email, is_admin
                FROM accounts
                WHERE account = $1 AND password = $2
                "#,
            )
            .bind(account)
            .bind(password_hash),
        )
        .await
    }

    async fn insert_query(&mut self, query: &NewQuery) -> Result<i32, DatabaseError> {
        self.fetch_id(
            sqlx::query_as(
                r#"
                INSERT INTO queries (query, title, description, account_id)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(&query.query)
            .bind(&query.title)
            .bind(&query.description)
            .bind(query.account_id),
        )
        .await
    }

    async fn link_versions(&mut self, query_id: i32, versions: &[i32]) -> Result<(), DatabaseError> {
        for version_num in versions {
            self.execute(
                sqlx::query("INSERT INTO queries_versions (query_id, version_num) VALUES ($1, $2)")
                    .bind(query_id)
                    .bind(*version_num),
            )
            .await?;
        }
        Ok(())
    }

    async fn find_tag(&mut self, tag: &str) -> Result<Option<i32>, DatabaseError> {
        let row = self
            .fetch_optional(sqlx::query_as::<_, (i32,)>("SELECT id FROM tags WHERE tag = lower($1)").bind(tag))
            .await?;
        Ok(row.map(|(id,)| id))
    }

    async fn insert_tag(&mut self, tag: &str) -> Result<i32, DatabaseError> {
        self.fetch_id(sqlx::query_as("INSERT INTO tags (tag) VALUES (lower($1)) RETURNING id").bind(tag))
            .await
    }

    async fn link_tag(&mut self, query_id: i32, tag_id: i32) -> Result<(), DatabaseError> {
        self.execute(
            sqlx::query("INSERT INTO queries_tags (query_id, tag_id) VALUES ($1, $2)")
                .bind(query_id)
                .bind(tag_id),
        )
        .await
        .map(|_| ())
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.failed = false;
        if let Some(transaction) = self.transaction.take() {
            transaction.rollback().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DatabaseError> {
        let Some(transaction) = self.transaction.take() else {
            return Ok(());
        };

        if self.failed {
            debug!("Rolling back failed request transaction");
            self.failed = false;
            transaction.rollback().await?;
        } else {
            transaction.commit().await?;
        }
        Ok(())
    }
}
