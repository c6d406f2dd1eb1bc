//! Secondary client provider and the mirror context handed to every trigger.

use super::ops;
use super::store::{MemoryStore, MirrorStore};
use crate::secret::{SecretSource, ServiceCredentials};
use crate::Result;
use bson::Document;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared handle of the secondary store.
pub type SecondaryHandle = Arc<dyn MirrorStore>;

/// Build a secondary store client from service credentials.
pub trait Connector: Send + Sync {
    /// connect with `credentials`, identifying the client as `app_name`.
    fn connect(
        &self,
        credentials: &ServiceCredentials,
        app_name: &str,
    ) -> Result<SecondaryHandle>;
}

/// Connector which always hands out the same [MemoryStore].
#[derive(Debug, Default)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
    connects: AtomicUsize,
}

impl MemoryConnector {
    /// create a connector over `store`.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        MemoryConnector {
            store,
            connects: AtomicUsize::new(0),
        }
    }

    /// how many times [connect](Connector::connect) has been called.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    fn connect(
        &self,
        _credentials: &ServiceCredentials,
        _app_name: &str,
    ) -> Result<SecondaryHandle> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }
}

impl<C: Connector + ?Sized> Connector for Arc<C> {
    fn connect(&self, credentials: &ServiceCredentials, app_name: &str) -> Result<SecondaryHandle> {
        (**self).connect(credentials, app_name)
    }
}

/// Lazily build and memoize the secondary store handle.
///
/// The first [handle](SecondaryProvider::handle) call reads credentials from the secret
/// and connects, later calls return the cached handle.  A failed first call caches nothing.
pub struct SecondaryProvider {
    secret: String,
    app_name: String,
    secrets: Box<dyn SecretSource>,
    connector: Box<dyn Connector>,
    handle: OnceCell<SecondaryHandle>,
}

impl SecondaryProvider {
    /// create a provider reading credentials from `secret` in `secrets`.
    pub fn new(
        secret: &str,
        app_name: &str,
        secrets: Box<dyn SecretSource>,
        connector: Box<dyn Connector>,
    ) -> Self {
        SecondaryProvider {
            secret: secret.to_string(),
            app_name: app_name.to_string(),
            secrets,
            connector,
            handle: OnceCell::new(),
        }
    }

    /// get the secondary store handle, initialize it on first call.
    pub fn handle(&self) -> Result<SecondaryHandle> {
        self.handle
            .get_or_try_init(|| {
                let credentials = ServiceCredentials::load(self.secrets.as_ref(), &self.secret)?;
                info!(secret = %self.secret, app_name = %self.app_name, database = %credentials.database,
                    "Connecting to secondary store.");
                self.connector.connect(&credentials, &self.app_name)
            })
            .map(Arc::clone)
    }

    /// check if the handle has been built.
    pub fn is_initialized(&self) -> bool {
        self.handle.get().is_some()
    }

    /// name of the secret holding credentials.
    pub fn secret_name(&self) -> &str {
        &self.secret
    }
}

/// Everything a trigger invocation needs, built once at startup and passed explicitly.
pub struct MirrorContext {
    provider: SecondaryProvider,
}

impl MirrorContext {
    /// create a context over `provider`.
    pub fn new(provider: SecondaryProvider) -> Self {
        MirrorContext { provider }
    }

    /// get the secondary store handle.
    pub fn secondary(&self) -> Result<SecondaryHandle> {
        self.provider.handle()
    }

    /// get the provider.
    pub fn provider(&self) -> &SecondaryProvider {
        &self.provider
    }

    /// [mirror_write](ops::mirror_write) against the secondary store.
    pub fn mirror_write(&self, collection: &str, id: &str, record: Document) -> Result<()> {
        let store = self.secondary()?;
        ops::mirror_write(store.as_ref(), collection, id, record)
    }

    /// [mirror_delete](ops::mirror_delete) against the secondary store.
    pub fn mirror_delete(&self, collection: &str, id: &str) -> Result<()> {
        let store = self.secondary()?;
        ops::mirror_delete(store.as_ref(), collection, id)
    }
}
