use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header::{ContentType, LOCATION};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, error};

use crate::config::SessionConfig;
use crate::db::Account;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Identity of the logged-in account, as carried by the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i32,
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub admin: bool,
}

impl From<Account> for SessionUser {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.account,
            fullname: account.fullname,
            email: account.email,
            admin: account.is_admin,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flashes: Vec<String>,
}

/// Session state for one request. Changes are written back only when made.
#[derive(Debug, Default)]
pub struct Session {
    data: SessionData,
    modified: bool,
}

impl Session {
    pub fn user(&self) -> Option<&SessionUser> {
        self.data.user.as_ref()
    }

    pub fn login(&mut self, user: SessionUser) {
        self.data.user = Some(user);
        self.modified = true;
    }

    /// Forgets the user. Returns whether someone was logged in.
    pub fn logout(&mut self) -> bool {
        let was_logged_in = self.data.user.take().is_some();
        self.modified |= was_logged_in;
        was_logged_in
    }

    /// Queues a message for the next rendered page.
    pub fn flash(&mut self, message: impl Into<String>) {
        self.data.flashes.push(message.into());
        self.modified = true;
    }

    pub fn take_flashes(&mut self) -> Vec<String> {
        if self.data.flashes.is_empty() {
            return Vec::new();
        }
        self.modified = true;
        std::mem::take(&mut self.data.flashes)
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

/// Signs and verifies the session cookie.
///
/// The cookie value is `base64url(json) "." hex(hmac_sha256(secret, base64url(json)))`.
/// Cookies whose signature does not verify are treated as no session at all.
#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
    cookie_name: String,
    secure: bool,
}

impl SessionCodec {
    pub fn new(config: &SessionConfig) -> Result<Self, AppError> {
        let mac = HmacSha256::new_from_slice(config.secret_key.as_bytes())
            .map_err(|e| AppError::ConfigError(format!("Invalid session secret: {}", e)))?;

        Ok(Self {
            mac,
            cookie_name: config.cookie_name.clone(),
            secure: config.secure,
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn encode(&self, data: &SessionData) -> Result<String, AppError> {
        let json = serde_json::to_vec(data).map_err(|e| AppError::InternalError(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.sign(&payload);
        Ok(format!("{}.{}", payload, signature))
    }

    pub fn decode(&self, value: &str) -> Option<SessionData> {
        let (payload, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }

    pub fn load(&self, req: &HttpRequest) -> Session {
        let data = req.cookie(&self.cookie_name).and_then(|cookie| {
            let data = self.decode(cookie.value());
            if data.is_none() {
                debug!("Ignoring session cookie with a bad signature");
            }
            data
        });

        Session {
            data: data.unwrap_or_default(),
            modified: false,
        }
    }

    /// Writes the session back onto the response when it changed.
    pub fn finish(&self, session: &Session, mut response: HttpResponse) -> HttpResponse {
        if !session.is_modified() {
            return response;
        }

        let value = match self.encode(&session.data) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to encode session: {}", e);
                return response;
            }
        };
        let cookie = Cookie::build(self.cookie_name.clone(), value)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .finish();

        if let Err(e) = response.add_cookie(&cookie) {
            error!("Failed to set session cookie: {}", e);
        }
        response
    }

    pub fn html(&self, session: &Session, status: StatusCode, body: String) -> HttpResponse {
        let response = HttpResponse::build(status)
            .content_type(ContentType::html())
            .body(body);
        self.finish(session, response)
    }

    pub fn redirect(&self, session: &Session, location: &str) -> HttpResponse {
        self.finish(session, redirect(location))
    }
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, location.to_string()))
        .finish()
}

/// Guard for pages that need a logged-in account.
///
/// Call at the top of the handler; the error is the redirect to send back.
pub fn require_login(session: &Session) -> Result<SessionUser, HttpResponse> {
    session
        .user()
        .cloned()
        .ok_or_else(|| redirect("/login"))
}
