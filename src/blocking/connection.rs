use crate::blocking::mirror::provider::{Connector, SecondaryHandle};
use crate::blocking::mirror::store::MongoMirrorStore;
use crate::error::{MirrorError, Result};
use crate::secret::ServiceCredentials;
use crate::{MirrorConfig, PRIMARY_APP_NAME};
use mongodb::options::{ClientOptions, Credential};
use mongodb::sync::{Client, Database};
use std::sync::Arc;

/// Build a mongodb client from `uri`, identifying itself as `app_name`.
fn client_with_app_name(
    uri: &str,
    app_name: &str,
    credential: Option<Credential>,
) -> Result<Client> {
    let mut options = ClientOptions::parse(uri).map_err(MirrorError::Connect)?;
    options.app_name = Some(app_name.to_string());
    if credential.is_some() {
        options.credential = credential;
    }
    Client::with_options(options).map_err(MirrorError::Connect)
}

/// Connection to the primary database, where change streams come from.
#[derive(Clone, Debug)]
pub struct PrimaryConnection {
    client: Client,
    db_name: String,
    uri: String,
}

impl PrimaryConnection {
    /// create a new connection from given `config`.
    pub fn new(config: &MirrorConfig) -> Result<PrimaryConnection> {
        let client = client_with_app_name(config.get_primary_url(), PRIMARY_APP_NAME, None)?;
        Ok(PrimaryConnection {
            client,
            db_name: config.get_primary_db().to_string(),
            uri: config.get_primary_url().to_string(),
        })
    }

    /// Check if we have enough permissions to watch primary database.
    pub fn check_permissions(&self) -> Result<()> {
        if let Err(e) = self.get_db().list_collection_names(None) {
            return Err(MirrorError::PermissionError {
                uri: self.uri.clone(),
                db: self.db_name.clone(),
                detail: e,
            });
        }
        Ok(())
    }

    /// get database to watch.
    pub fn get_db(&self) -> Database {
        self.client.database(&self.db_name)
    }
}

/// Connect secondary mongodb with service credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct MongoConnector;

impl Connector for MongoConnector {
    fn connect(&self, credentials: &ServiceCredentials, app_name: &str) -> Result<SecondaryHandle> {
        let credential = credentials.username.as_ref().map(|username| {
            let mut credential = Credential::default();
            credential.username = Some(username.clone());
            credential.password = credentials.password.clone();
            credential.source = credentials.auth_source.clone();
            credential
        });
        let client = client_with_app_name(&credentials.uri, app_name, credential)?;
        let db = client.database(&credentials.database);
        Ok(Arc::new(MongoMirrorStore::new(db)))
    }
}
