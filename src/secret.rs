//! Secret sources and the secondary service credential bundle.
//!
//! Secondary credentials are stored in one named secret as json:
//! ```json
//! {
//!     "uri": "mongodb://mirror.example.com:27017",
//!     "database": "mirror",
//!     "username": "mirror-writer",
//!     "password": "...",
//!     "auth_source": "admin"
//! }
//! ```
use crate::{MirrorError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env::VarError;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// A place to read named secret values from.
pub trait SecretSource: Send + Sync {
    /// read secret `name`, returns None if it's not bound.
    fn read_secret(&self, name: &str) -> Result<Option<String>>;
}

/// Secrets bound as environment variables named after the secret.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn read_secret(&self, name: &str) -> Result<Option<String>> {
        match std::env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => Err(MirrorError::InvalidCredential {
                secret: name.to_string(),
                reason: "value is not valid unicode".to_string(),
            }),
        }
    }
}

/// Secrets mounted as files, one file per secret under `dir`.
#[derive(Debug, Clone)]
pub struct FileSecrets {
    dir: PathBuf,
}

impl FileSecrets {
    /// create a source which reads `<dir>/<name>`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSecrets { dir: dir.into() }
    }
}

impl SecretSource for FileSecrets {
    fn read_secret(&self, name: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.dir.join(name)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MirrorError::Io(e)),
        }
    }
}

/// In memory secrets.
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    /// create an empty source, every read returns None.
    pub fn new() -> Self {
        Self::default()
    }

    /// bind `value` to secret `name`.
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

impl SecretSource for StaticSecrets {
    fn read_secret(&self, name: &str) -> Result<Option<String>> {
        Ok(self.values.get(name).cloned())
    }
}

/// Service identity of the secondary store.
#[derive(Deserialize, Clone, PartialEq)]
pub struct ServiceCredentials {
    /// secondary connection string, begins with 'mongodb://' or 'mongodb+srv://'
    pub uri: String,
    /// secondary database name.
    pub database: String,
    #[serde(default)]
    /// user name of service identity.
    pub username: Option<String>,
    #[serde(default)]
    /// password of service identity.
    pub password: Option<String>,
    #[serde(default)]
    /// authentication database.
    pub auth_source: Option<String>,
}

impl ServiceCredentials {
    /// Read and parse credentials stored in `secret` from `source`.
    ///
    /// Absent or blank secret is a [MissingCredential](MirrorError::MissingCredential) error,
    /// malformed content is a [MalformedCredential](MirrorError::MalformedCredential) error.
    pub fn load(source: &dyn SecretSource, secret: &str) -> Result<ServiceCredentials> {
        let raw = source
            .read_secret(secret)?
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| MirrorError::MissingCredential {
                secret: secret.to_string(),
            })?;
        Self::parse(secret, &raw)
    }

    /// Parse json credentials `raw`, `secret` is only used for error reporting.
    pub fn parse(secret: &str, raw: &str) -> Result<ServiceCredentials> {
        let creds: ServiceCredentials =
            serde_json::from_str(raw).map_err(|e| MirrorError::MalformedCredential {
                secret: secret.to_string(),
                source: e,
            })?;

        let invalid = |reason: &str| MirrorError::InvalidCredential {
            secret: secret.to_string(),
            reason: reason.to_string(),
        };
        if creds.uri.trim().is_empty() {
            return Err(invalid("`uri` is empty"));
        }
        if creds.database.trim().is_empty() {
            return Err(invalid("`database` is empty"));
        }
        if creds.password.is_some() && creds.username.is_none() {
            return Err(invalid("`password` given without `username`"));
        }
        Ok(creds)
    }
}

impl fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("uri", &self.uri)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("auth_source", &self.auth_source)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SECRET: &str = "TEST_SECONDARY";

    #[test]
    fn test_parse_full_credentials() {
        let creds = ServiceCredentials::parse(
            SECRET,
            r#"{"uri": "mongodb://localhost:27018", "database": "mirror",
                "username": "writer", "password": "pw", "auth_source": "admin"}"#,
        )
        .unwrap();
        assert_eq!(creds.uri, "mongodb://localhost:27018");
        assert_eq!(creds.database, "mirror");
        assert_eq!(creds.username.as_deref(), Some("writer"));
        assert_eq!(creds.auth_source.as_deref(), Some("admin"));
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = ServiceCredentials::parse(
            SECRET,
            r#"{"uri": "mongodb://localhost", "database": "m", "username": "u", "password": "hunter2"}"#,
        )
        .unwrap();
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn test_load_missing_and_blank() {
        let source = StaticSecrets::new().with("BLANK", "  \n");
        let err = ServiceCredentials::load(&source, SECRET).unwrap_err();
        assert!(matches!(err, MirrorError::MissingCredential { .. }));
        let err = ServiceCredentials::load(&source, "BLANK").unwrap_err();
        assert!(matches!(err, MirrorError::MissingCredential { .. }));
    }

    #[test]
    fn test_malformed_and_invalid() {
        let err = ServiceCredentials::parse(SECRET, "{not json").unwrap_err();
        assert!(matches!(err, MirrorError::MalformedCredential { .. }));

        let err = ServiceCredentials::parse(SECRET, r#"{"uri": "mongodb://x"}"#).unwrap_err();
        assert!(matches!(err, MirrorError::MalformedCredential { .. }));

        let err =
            ServiceCredentials::parse(SECRET, r#"{"uri": "", "database": "m"}"#).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidCredential { .. }));

        let err = ServiceCredentials::parse(
            SECRET,
            r#"{"uri": "mongodb://x", "database": "m", "password": "p"}"#,
        )
        .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_env_secrets() {
        let name = "MIRROR_SYNC_TEST_ENV_SECRET";
        assert!(EnvSecrets.read_secret(name).unwrap().is_none());
        std::env::set_var(name, r#"{"uri": "mongodb://x", "database": "m"}"#);
        let creds = ServiceCredentials::load(&EnvSecrets, name).unwrap();
        assert_eq!(creds.database, "m");
        std::env::remove_var(name);
    }

    #[cfg(unix)]
    #[test]
    fn test_env_secret_not_unicode() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let name = "MIRROR_SYNC_TEST_ENV_SECRET_BYTES";
        std::env::set_var(name, OsStr::from_bytes(&[0x7b, 0xff, 0xfe, 0x7d]));
        let err = ServiceCredentials::load(&EnvSecrets, name).unwrap_err();
        std::env::remove_var(name);
        assert!(matches!(err, MirrorError::InvalidCredential { .. }));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_file_secrets_absent() {
        let source = FileSecrets::new("/nonexistent-mirror-secret-dir");
        assert!(source.read_secret(SECRET).unwrap().is_none());
    }
}
