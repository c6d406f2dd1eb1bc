/// provide mirror blocking apis.
mod connection;
#[doc(hidden)]
pub mod mirror;

pub use connection::{MongoConnector, PrimaryConnection};
pub use mirror::{
    CollectionWatcher, Connector, Dispatch, DocumentChange, MemoryConnector, MemoryStore,
    MirrorContext, MirrorStore, MongoMirrorStore, SecondaryHandle, SecondaryProvider, Trigger,
    TriggerEvent, TriggerSet, Watch, WatchManager,
};
