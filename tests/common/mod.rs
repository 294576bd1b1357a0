#![allow(dead_code)]

use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::test::TestRequest;
use actix_web::web;
use async_trait::async_trait;
use pouch_server::auth::session::SessionData;
use pouch_server::db::{
    Account, MemoryStore, MemoryStoreProvider, NewAccount, NewQuery, QuerySummary, Store, StoreProvider, Version,
};
use pouch_server::error::DatabaseError;
use pouch_server::{AppState, SessionUser, Settings};

pub fn state(stores: Arc<dyn StoreProvider>) -> web::Data<AppState> {
    let mut settings = Settings::defaults().expect("Failed to load default settings");
    settings.database.url = "memory://".to_string();
    web::Data::new(AppState::with_stores(settings, stores).expect("Failed to build state"))
}

/// Creates an account directly in the store and returns a cookie logged in as it.
pub async fn logged_in(state: &AppState, stores: &MemoryStoreProvider, username: &str) -> Cookie<'static> {
    let mut store = stores.store();
    let id = store
        .create_account(&NewAccount {
            account: username.to_string(),
            fullname: format!("{} Example", username),
            email: format!("{}@example.com", username),
            password_hash: pouch_server::auth::hash_password("password123"),
        })
        .await
        .expect("Failed to create account");
    store.close().await.expect("Failed to commit account");

    let value = state
        .sessions
        .encode(&SessionData {
            user: Some(SessionUser {
                id,
                username: username.to_string(),
                fullname: format!("{} Example", username),
                email: format!("{}@example.com", username),
                admin: false,
            }),
            flashes: Vec::new(),
        })
        .expect("Failed to encode session");
    Cookie::new("session", value)
}

pub fn post_form(uri: &str, pairs: &[(&str, &str)]) -> TestRequest {
    TestRequest::post().uri(uri).set_form(pairs)
}

pub fn register_form(username: &str, password: &str) -> TestRequest {
    post_form(
        "/register",
        &[
            ("username", username),
            ("fullname", "Alice Liddell"),
            ("email", "alice@example.com"),
            ("password", password),
            ("confirm_password", password),
            ("terms", "y"),
        ],
    )
}

pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .map(|cookie| cookie.into_owned())
}

pub fn location<B>(resp: &ServiceResponse<B>) -> Option<String> {
    resp.headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Memory stores whose tag inserts fail for one tag text.
pub struct FailingTagStores {
    pub inner: Arc<MemoryStoreProvider>,
    pub fail_on: &'static str,
}

#[async_trait]
impl StoreProvider for FailingTagStores {
    async fn open(&self) -> Result<Box<dyn Store>, DatabaseError> {
        Ok(Box::new(FailingTagStore {
            inner: self.inner.store(),
            fail_on: self.fail_on,
            failed: false,
        }))
    }
}

pub struct FailingTagStore {
    inner: MemoryStore,
    fail_on: &'static str,
    failed: bool,
}

#[async_trait]
impl Store for FailingTagStore {
    async fn latest_queries(&mut self, limit: i64) -> Result<Vec<QuerySummary>, DatabaseError> {
        self.inner.latest_queries(limit).await
    }

    async fn versions(&mut self) -> Result<Vec<Version>, DatabaseError> {
        self.inner.versions().await
    }

    async fn account_exists(&mut self, account: &str) -> Result<bool, DatabaseError> {
        self.inner.account_exists(account).await
    }

    async fn create_account(&mut self, account: &NewAccount) -> Result<i32, DatabaseError> {
        self.inner.create_account(account).await
    }

    async fn find_account(
        &mut self,
        account: &str,
        password_hash: &str,
    ) -> Result<Option<Account>, DatabaseError> {
        self.inner.find_account(account, password_hash).await
    }

    async fn insert_query(&mut self, query: &NewQuery) -> Result<i32, DatabaseError> {
        self.inner.insert_query(query).await
    }

    async fn link_versions(&mut self, query_id: i32, versions: &[i32]) -> Result<(), DatabaseError> {
        self.inner.link_versions(query_id, versions).await
    }

    async fn find_tag(&mut self, tag: &str) -> Result<Option<i32>, DatabaseError> {
        self.inner.find_tag(tag).await
    }

    async fn insert_tag(&mut self, tag: &str) -> Result<i32, DatabaseError> {
        if tag == self.fail_on {
            self.failed = true;
            return Err(DatabaseError::QueryError("simulated tag insert failure".to_string()));
        }
        self.inner.insert_tag(tag).await
    }

    async fn link_tag(&mut self, query_id: i32, tag_id: i32) -> Result<(), DatabaseError> {
        self.inner.link_tag(query_id, tag_id).await
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.failed = false;
        self.inner.rollback().await
    }

    async fn close(&mut self) -> Result<(), DatabaseError> {
        if self.failed {
            self.failed = false;
            return self.inner.rollback().await;
        }
        self.inner.close().await
    }
}
