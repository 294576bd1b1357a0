use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the front page listing, with the aggregated version labels and tags.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuerySummary {
    pub id: i32,
    pub query: String,
    pub versions: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Version {
    pub version_num: i32,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: i32,
    pub account: String,
    pub fullname: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub account: String,
    pub fullname: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuery {
    pub query: String,
    pub title: String,
    pub description: String,
    pub account_id: i32,
}
