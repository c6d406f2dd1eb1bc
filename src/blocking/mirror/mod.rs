#[doc(hidden)]
pub mod bson_helper;
pub mod ops;
pub mod provider;
pub mod store;
mod time_helper;
pub mod trigger;
pub mod watcher;

pub use ops::{mirror_delete, mirror_write};
pub use provider::{Connector, MemoryConnector, MirrorContext, SecondaryHandle, SecondaryProvider};
pub use store::{MemoryStore, MirrorStore, MongoMirrorStore};
pub use trigger::{Dispatch, DocumentChange, Trigger, TriggerEvent, TriggerSet};
pub use watcher::{CollectionWatcher, Watch, WatchManager, WatchStatus};
