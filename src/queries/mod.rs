//! Browsing and submitting queries.

pub mod format;
pub mod handlers;
pub mod service;

pub use service::{parse_tags, save_query, AddQueryRequest, QueryView};
