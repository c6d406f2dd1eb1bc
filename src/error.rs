use mongodb::error::Error as MongoError;
use rayon::ThreadPoolBuildError;
use std::result::Result as StdResult;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Missing credential: secret {secret:?} is absent or empty")]
    MissingCredential { secret: String },
    #[error("Credential in secret {secret:?} is not valid json")]
    MalformedCredential {
        secret: String,
        source: serde_json::Error,
    },
    #[error("Credential in secret {secret:?} is invalid: {reason}")]
    InvalidCredential { secret: String, reason: String },
    #[error("Mirror operation on {collection}/{id} failed")]
    Store {
        collection: String,
        id: String,
        source: MongoError,
    },
    #[error("Mongodb connection error")]
    Connect(#[source] MongoError),
    #[error("Check permission for database {db:?} failed, connection string: {uri:?}, detailed: {detail:?}")]
    PermissionError {
        uri: String,
        db: String,
        detail: MongoError,
    },
    #[error("Change stream on collection {collection:?} failed")]
    Watch {
        collection: String,
        source: MongoError,
    },
    #[error("Change stream on collection {collection:?} closed, invalidated: {invalidated}")]
    StreamClosed {
        collection: String,
        invalidated: bool,
    },
    #[error("No trigger registered for collection {0:?}")]
    UnknownCollection(String),
    #[error("Invalid configuration file")]
    Config(#[from] toml::de::Error),
    #[error("Io error")]
    Io(#[from] std::io::Error),
    #[error("Build watcher thread pool failed")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

impl MirrorError {
    /// Missing or unreadable secondary credentials, detected before any store access.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            MirrorError::MissingCredential { .. }
                | MirrorError::MalformedCredential { .. }
                | MirrorError::InvalidCredential { .. }
        )
    }
}

pub type Result<T> = StdResult<T, MirrorError>;
