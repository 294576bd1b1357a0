pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod queries;
pub mod views;

use std::sync::Arc;
use actix_web::web;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{SessionCodec, SessionUser};
pub use db::{MemoryStoreProvider, PgStoreProvider, Store, StoreProvider};

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub stores: Arc<dyn StoreProvider>,
    pub sessions: SessionCodec,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let stores = db::connect(&config.database).await?;
        Self::with_stores(config, stores)
    }

    pub fn with_stores(config: Settings, stores: Arc<dyn StoreProvider>) -> Result<Self> {
        let sessions = SessionCodec::new(&config.session)?;
        Ok(Self {
            config: Arc::new(config),
            stores,
            sessions,
        })
    }
}

/// Registers every route of the site.
pub fn routes(cfg: &mut web::ServiceConfig) {
    use auth::handlers as accounts;
    use queries::handlers as catalogue;

    cfg.route("/", web::get().to(catalogue::index))
        .service(
            web::resource("/add")
                .route(web::get().to(catalogue::add_page))
                .route(web::post().to(catalogue::add_submit)),
        )
        .service(
            web::resource("/register")
                .route(web::get().to(accounts::register_page))
                .route(web::post().to(accounts::register)),
        )
        .service(
            web::resource("/login")
                .route(web::get().to(accounts::login_page))
                .route(web::post().to(accounts::login)),
        )
        .route("/logout", web::get().to(accounts::logout))
        .service(
            web::resource("/profile")
                .route(web::get().to(accounts::profile_page))
                .route(web::post().to(accounts::update_profile)),
        )
        .route("/tag", web::get().to(catalogue::tag_cloud))
        .route("/tag/{tag}", web::get().to(catalogue::by_tag))
        .default_service(web::to(catalogue::not_found));
}
