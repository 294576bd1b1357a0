use tracing::debug;

use crate::db::{NewQuery, QuerySummary, Store};
use crate::error::DatabaseError;
use crate::queries::format::pretty_sql;

/// A front page entry, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryView {
    pub id: i32,
    pub query: String,
    pub versions: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl From<QuerySummary> for QueryView {
    fn from(summary: QuerySummary) -> Self {
        Self {
            id: summary.id,
            query: pretty_sql(&summary.query),
            // No version rows means the query works with any version
            versions: summary.versions.unwrap_or_else(|| "All versions".to_string()),
            title: summary.title,
            description: summary.description.unwrap_or_default(),
            tags: summary.tags,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AddQueryRequest {
    pub query: NewQuery,
    pub versions: Vec<i32>,
    pub tags: Vec<String>,
}

/// Splits the tag field on whitespace, commas and semicolons.
///
/// Tags come back case-folded, without empty entries and without repeats,
/// in the order they were first typed.
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for token in input.split(|c: char| c.is_whitespace() || c == ',' || c == ';') {
        if token.is_empty() {
            continue;
        }
        let tag = token.to_lowercase();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Writes a query with its version and tag links.
///
/// Stops at the first failing statement; the caller decides whether the
/// transaction is rolled back.
pub async fn save_query(store: &mut dyn Store, request: &AddQueryRequest) -> Result<i32, DatabaseError> {
    let query_id = store.insert_query(&request.query).await?;

    if !request.versions.is_empty() {
        store.link_versions(query_id, &request.versions).await?;
    }

    let mut linked: Vec<i32> = Vec::with_capacity(request.tags.len());
    for tag in &request.tags {
        let tag_id = match store.find_tag(tag).await? {
            Some(id) => id,
            None => store.insert_tag(tag).await?,
        };
        if linked.contains(&tag_id) {
            continue;
        }
        store.link_tag(query_id, tag_id).await?;
        linked.push(tag_id);
    }

    debug!(
        "Saved query {} with {} versions and {} tags",
        query_id,
        request.versions.len(),
        linked.len()
    );
    Ok(query_id)
}
