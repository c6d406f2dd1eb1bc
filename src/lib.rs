//! Mirror sync lib, which mirrors tracked collections from a primary mongodb to a secondary mongodb.
//!
//! Every tracked collection gets a [Trigger], fired for each document write on the primary.
//! Creates and updates replace the whole secondary document, deletes remove it.
//! The secondary client is built lazily from credentials in a secret, see [SecondaryProvider].
//!
//! # Trigger example:
//! ```
//! use bson::doc;
//! use mirror_sync::{
//!     DocumentChange, MemoryConnector, MemoryStore, MirrorContext, SecondaryProvider,
//!     StaticSecrets, TriggerEvent, TriggerSet, TRACKED_COLLECTIONS,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let secrets = StaticSecrets::new().with(
//!     "SECONDARY_SERVICE_ACCOUNT",
//!     r#"{"uri": "mongodb://localhost:27018", "database": "mirror"}"#,
//! );
//! let provider = SecondaryProvider::new(
//!     "SECONDARY_SERVICE_ACCOUNT",
//!     "mirror-secondary",
//!     Box::new(secrets),
//!     Box::new(MemoryConnector::new(store.clone())),
//! );
//! let ctx = MirrorContext::new(provider);
//! let triggers = TriggerSet::register_all(&TRACKED_COLLECTIONS, "SECONDARY_SERVICE_ACCOUNT");
//!
//! let created = DocumentChange::Created(doc! {"name": "Bo"});
//! triggers.dispatch(&ctx, TriggerEvent::new("players", "42", Some(created))).unwrap();
//! assert_eq!(store.get("players", "42").unwrap(), doc! {"name": "Bo", "id": "42"});
//! ```
//!
//! # Watch example:
//! ```no_run
//! use mirror_sync::{
//!     CollectionWatcher, EnvSecrets, MirrorConfig, MirrorContext, MongoConnector,
//!     PrimaryConnection, SecondaryProvider, TriggerSet, Watch, WatchManager,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let conf = MirrorConfig::from_file("mirror.toml").unwrap();
//! let primary = PrimaryConnection::new(&conf).unwrap();
//! let provider = SecondaryProvider::new(
//!     conf.get_secret_name(),
//!     conf.get_secondary_app_name(),
//!     Box::new(EnvSecrets),
//!     Box::new(MongoConnector),
//! );
//! let ctx = Arc::new(MirrorContext::new(provider));
//! let watchers: Vec<Box<dyn Watch>> = TriggerSet::register_all(conf.get_collections(), conf.get_secret_name())
//!     .iter()
//!     .map(|t| Box::new(CollectionWatcher::new(&primary.get_db(), t.clone(), ctx.clone())) as Box<dyn Watch>)
//!     .collect();
//! WatchManager::new(Duration::from_secs(10), 10).run(watchers).unwrap();
//! ```

#![warn(missing_docs)]

#[doc(hidden)]
pub mod blocking;
mod config;
mod error;
pub mod secret;

/// collections mirrored by default.
pub const TRACKED_COLLECTIONS: [&str; 9] = [
    "players",
    "fixtures",
    "transactions",
    "participations",
    "opponents",
    "venues",
    "referees",
    "kitDetails",
    "kitQueue",
];

/// identifier field injected into mirrored body.
const ID_FIELD: &str = "id";
/// mongodb primary key name.
const MONGO_ID_KEY: &str = "_id";

/// default secret which holds secondary credentials.
pub const DEFAULT_SECRET_NAME: &str = "SECONDARY_SERVICE_ACCOUNT";
/// default application name of secondary client.
pub const DEFAULT_SECONDARY_APP_NAME: &str = "mirror-secondary";
/// application name of primary client.
pub const PRIMARY_APP_NAME: &str = "mirror-primary";

pub use blocking::mirror::{mirror_delete, mirror_write};
pub use blocking::{
    CollectionWatcher, Connector, Dispatch, DocumentChange, MemoryConnector, MemoryStore,
    MirrorContext, MirrorStore, MongoConnector, MongoMirrorStore, PrimaryConnection,
    SecondaryHandle, SecondaryProvider, Trigger, TriggerEvent, TriggerSet, Watch, WatchManager,
};
pub use config::MirrorConfig;
pub use error::{MirrorError, Result};
pub use secret::{EnvSecrets, FileSecrets, SecretSource, ServiceCredentials, StaticSecrets};
