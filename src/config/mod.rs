use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming an extra settings file layered over the defaults.
pub const SETTINGS_ENV: &str = "POUCH_SETTINGS";

/// Memory-backed stores are selected with this database url scheme.
pub const MEMORY_URL_SCHEME: &str = "memory://";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url.starts_with(MEMORY_URL_SCHEME)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub secret_key: String,
    pub cookie_name: String,
    pub secure: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
}

impl Settings {
    /// Loads the settings the server runs with.
    ///
    /// Sources, each overriding the previous: hardcoded defaults, a `settings`
    /// file in the working directory, the file named by `POUCH_SETTINGS`, and
    /// `POUCH_*` environment variables (e.g. `POUCH_DATABASE__URL`).
    pub fn new() -> Result<Self, ConfigError> {
        let named = env::var_os(SETTINGS_ENV).map(PathBuf::from);
        Self::load(named.as_deref())
    }

    pub fn load(named_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Self::with_defaults()?
            .add_source(File::with_name("settings").required(false));

        // A file that was named explicitly has to exist
        if let Some(path) = named_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix("pouch")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?
            .try_deserialize()
    }

    /// Hardcoded defaults only, without reading files or the environment.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::with_defaults()?.build()?.try_deserialize()
    }

    fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.url", "postgres://localhost/pouch")?
            .set_default("database.max_connections", 5)?
            .set_default("database.acquire_timeout_secs", 5)?
            .set_default("database.run_migrations", true)?
            .set_default("session.secret_key", "one hard to find development key")?
            .set_default("session.cookie_name", "session")?
            .set_default("session.secure", false)
    }
}
