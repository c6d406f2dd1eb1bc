//! mirror_sync basic configuration, express in toml.
//!
//! Basic configuration file example:
//! ```toml
//! [primary]
//! # primary db url, need to be a replica set so change streams are available.
//! url = "mongodb://localhost:27017/?replicaSet=rs0"
//! db = "app"
//!
//! [secondary]
//! # name of the secret which holds secondary credentials in json.
//! secret = "SECONDARY_SERVICE_ACCOUNT"
//! app_name = "mirror-secondary"
//!
//! [mirror]
//! collections = ["players", "fixtures"]
//! restart_delay_secs = 10
//! max_restarts = 10
//! ```
use crate::{Result, DEFAULT_SECONDARY_APP_NAME, DEFAULT_SECRET_NAME, TRACKED_COLLECTIONS};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Global mirror configuration.
#[derive(Deserialize, Debug)]
pub struct MirrorConfig {
    primary: Primary,
    #[serde(default)]
    secondary: Secondary,
    #[serde(default)]
    mirror: MirrorSettings,
}

impl MirrorConfig {
    /// load configuration from a toml file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<MirrorConfig> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// parse configuration from toml `content`.
    pub fn from_toml(content: &str) -> Result<MirrorConfig> {
        Ok(toml::from_str(content)?)
    }

    /// get primary mongodb url.
    pub fn get_primary_url(&self) -> &str {
        &self.primary.url
    }

    /// get primary database to watch.
    pub fn get_primary_db(&self) -> &str {
        &self.primary.db
    }

    /// get the secret name which holds secondary credentials.
    pub fn get_secret_name(&self) -> &str {
        &self.secondary.secret
    }

    /// get application name used by secondary client.
    pub fn get_secondary_app_name(&self) -> &str {
        &self.secondary.app_name
    }

    /// get directory of mounted secret files, None means secrets come from environment.
    pub fn get_secret_dir(&self) -> Option<&Path> {
        self.secondary.secret_dir.as_deref()
    }

    /// get collections to mirror.
    pub fn get_collections(&self) -> &[String] {
        &self.mirror.collections
    }

    /// seconds to wait before restarting a failed watcher.
    pub fn get_restart_delay_secs(&self) -> u64 {
        self.mirror.restart_delay_secs
    }

    /// how many times a failed watcher will be restarted.
    pub fn get_max_restarts(&self) -> usize {
        self.mirror.max_restarts
    }
}

/// Primary database configuration.
#[derive(Deserialize, Debug)]
pub struct Primary {
    /// Primary database url, it needs to be replica set, begins with 'mongodb://'
    url: String,
    /// database name
    db: String,
}

/// Secondary database configuration, connection detail lives in a secret.
#[derive(Deserialize, Debug)]
pub struct Secondary {
    #[serde(default = "default_secret_name")]
    secret: String,
    #[serde(default = "default_app_name")]
    app_name: String,
    #[serde(default)]
    secret_dir: Option<PathBuf>,
}

impl Default for Secondary {
    fn default() -> Self {
        Secondary {
            secret: default_secret_name(),
            app_name: default_app_name(),
            secret_dir: None,
        }
    }
}

/// Mirror settings, it indicates which collections to watch and how watchers restart.
#[derive(Deserialize, Debug)]
pub struct MirrorSettings {
    /// collections to mirror, default to all tracked collections.
    #[serde(default = "default_collections")]
    collections: Vec<String>,
    #[serde(default = "default_restart_delay")]
    restart_delay_secs: u64,
    #[serde(default = "default_max_restarts")]
    max_restarts: usize,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        MirrorSettings {
            collections: default_collections(),
            restart_delay_secs: default_restart_delay(),
            max_restarts: default_max_restarts(),
        }
    }
}

fn default_secret_name() -> String {
    DEFAULT_SECRET_NAME.to_string()
}

fn default_app_name() -> String {
    DEFAULT_SECONDARY_APP_NAME.to_string()
}

fn default_collections() -> Vec<String> {
    TRACKED_COLLECTIONS.iter().map(|c| c.to_string()).collect()
}

fn default_restart_delay() -> u64 {
    10
}

fn default_max_restarts() -> usize {
    10
}
