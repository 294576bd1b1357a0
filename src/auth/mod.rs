//! Authentication module for the pouch server
//!
//! Accounts, password checks and the signed session cookie.

pub mod handlers;
pub mod service;
pub mod session;

pub use service::{hash_password, Registration};
pub use session::{require_login, Session, SessionCodec, SessionUser};
