use sha2::{Digest, Sha256};
use tracing::info;

use crate::auth::session::SessionUser;
use crate::db::{NewAccount, Store};
use crate::error::DatabaseError;

/// Outcome of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(SessionUser),
    UsernameTaken,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub password: String,
}

/// Unsalted SHA-256, hex encoded. This is the format stored in `accounts.password`.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

pub async fn register(store: &mut dyn Store, request: &RegisterRequest) -> Result<Registration, DatabaseError> {
    if store.account_exists(&request.username).await? {
        return Ok(Registration::UsernameTaken);
    }

    let account = NewAccount {
        account: request.username.clone(),
        fullname: request.fullname.clone(),
        email: request.email.clone(),
        password_hash: hash_password(&request.password),
    };

    let id = match store.create_account(&account).await {
        Ok(id) => id,
        // Lost a race with a concurrent registration of the same name
        Err(DatabaseError::Duplicate) => return Ok(Registration::UsernameTaken),
        Err(e) => return Err(e),
    };
    info!("Registered account {} ({})", account.account, id);

    Ok(Registration::Created(SessionUser {
        id,
        username: account.account,
        fullname: account.fullname,
        email: account.email,
        admin: false,
    }))
}

pub async fn authenticate(
    store: &mut dyn Store,
    username: &str,
    password: &str,
) -> Result<Option<SessionUser>, DatabaseError> {
    let account = store.find_account(username, &hash_password(password)).await?;
    Ok(account.map(SessionUser::from))
}
