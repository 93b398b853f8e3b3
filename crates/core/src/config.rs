//! Configuration management
//!
//! Storage settings are read from a TOML file. The file location resolves
//! from an explicit path, `$RSTORE_CONFIG_DIR/config.toml`, or the platform
//! config directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keys::{KeyMapper, is_nested};
use crate::pool::PoolConfig;
use crate::traits::WriteOptions;

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "RSTORE_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Settings for one bucket-backed storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: String,
    /// Root for regular objects
    pub path: String,
    /// Root for object-disk backups
    pub object_disk_path: Option<String>,
    /// Custom endpoint URL; without credentials requests are unauthenticated
    pub endpoint: Option<String>,
    pub region: String,
    pub force_path_style: bool,
    /// Credentials document as a JSON string
    pub credentials_json: Option<String>,
    /// Base64 of the credentials document
    pub credentials_json_encoded: Option<String>,
    /// File holding the credentials document
    pub credentials_file: Option<PathBuf>,
    pub storage_class: Option<String>,
    /// Metadata attached to every uploaded object
    pub object_labels: BTreeMap<String, String>,
    pub client_pool_size: usize,
    /// How long to wait for a pooled client; unset waits indefinitely
    pub pool_wait_timeout_secs: Option<u64>,
    /// Log every request and response
    pub debug: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            path: String::new(),
            object_disk_path: None,
            endpoint: None,
            region: "us-east-1".to_string(),
            force_path_style: false,
            credentials_json: None,
            credentials_json_encoded: None,
            credentials_file: None,
            storage_class: None,
            object_labels: BTreeMap::new(),
            client_pool_size: 16,
            pool_wait_timeout_secs: None,
            debug: false,
        }
    }
}

/// Static credentials document
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Resolved way of authenticating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Static(StaticCredentials),
    /// Custom endpoint without authentication
    Anonymous,
    /// SDK default provider chain (environment, profile, instance metadata)
    DefaultChain,
}

impl StorageConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Check the settings for consistency
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(Error::Config("bucket must be set".to_string()));
        }
        if self.client_pool_size == 0 {
            return Err(Error::Config("client_pool_size must be at least 1".to_string()));
        }
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| Error::Config(format!("Invalid endpoint '{endpoint}': {e}")))?;
        }

        let forms = [
            self.credentials_json.is_some(),
            self.credentials_json_encoded.is_some(),
            self.credentials_file.is_some(),
        ];
        if forms.iter().filter(|set| **set).count() > 1 {
            return Err(Error::Config(
                "credentials_json, credentials_json_encoded and credentials_file are mutually exclusive"
                    .to_string(),
            ));
        }

        if let Some(object_disk_path) = &self.object_disk_path {
            let overlap =
                is_nested(&self.path, object_disk_path) || is_nested(object_disk_path, &self.path);
            let same = KeyMapper::new(&self.path, None).root()
                == KeyMapper::new(object_disk_path, None).root();
            if overlap && !same {
                return Err(Error::Config(format!(
                    "object_disk_path '{object_disk_path}' overlaps path '{}'",
                    self.path
                )));
            }
        }

        Ok(())
    }

    /// Work out which credentials to use
    pub fn credential_source(&self) -> Result<CredentialSource> {
        let document = if let Some(json) = &self.credentials_json {
            Some(json.clone())
        } else if let Some(encoded) = &self.credentials_json_encoded {
            let bytes = general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| Error::Config(format!("credentials_json_encoded is not base64: {e}")))?;
            Some(String::from_utf8(bytes).map_err(|e| {
                Error::Config(format!("credentials_json_encoded is not UTF-8: {e}"))
            })?)
        } else if let Some(path) = &self.credentials_file {
            Some(std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read credentials file {}: {e}", path.display()))
            })?)
        } else {
            None
        };

        match document {
            Some(json) => serde_json::from_str(&json)
                .map(CredentialSource::Static)
                .map_err(|e| Error::Config(format!("Invalid credentials document: {e}"))),
            None if self.endpoint.is_some() => Ok(CredentialSource::Anonymous),
            None => Ok(CredentialSource::DefaultChain),
        }
    }

    pub fn key_mapper(&self) -> KeyMapper {
        KeyMapper::new(&self.path, self.object_disk_path.as_deref())
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            storage_class: self.storage_class.clone().filter(|s| !s.is_empty()),
            metadata: self.object_labels.clone(),
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        let config = PoolConfig::new(self.client_pool_size);
        match self.pool_wait_timeout_secs {
            Some(secs) => config.wait_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }
}

/// Locates and loads the config file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Resolve the default location
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Cannot determine config directory".to_string()))?
                .join("rstore"),
        };
        Ok(Self::with_path(dir.join(CONFIG_FILE)))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Parse the config file without validating it, `None` when it is absent
    pub fn read(&self) -> Result<Option<StorageConfig>> {
        match std::fs::read_to_string(&self.config_path) {
            Ok(content) => StorageConfig::from_toml_str(&content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Load and validate the config
    pub fn load(&self) -> Result<StorageConfig> {
        let config = self.read()?.ok_or_else(|| {
            Error::Config(format!("Config file not found: {}", self.config_path.display()))
        })?;
        config.validate()?;
        tracing::debug!(path = %self.config_path.display(), bucket = %config.bucket, "loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config(bucket: &str) -> StorageConfig {
        StorageConfig {
            bucket: bucket.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_toml() {
        let config = StorageConfig::from_toml_str(
            r#"
            bucket = "backups"
            path = "cluster/shard1"
            object_disk_path = "object_disks"
            storage_class = "STANDARD_IA"
            client_pool_size = 4
            pool_wait_timeout_secs = 30

            [object_labels]
            team = "storage"
            "#,
        )
        .unwrap();

        assert_eq!(config.bucket, "backups");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.client_pool_size, 4);
        assert_eq!(config.object_labels.get("team").map(String::as_str), Some("storage"));
        assert_eq!(
            config.pool_config().wait_timeout,
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            config.key_mapper().to_secondary_key("a").unwrap(),
            "object_disks/a"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_error() {
        let err = StorageConfig::from_toml_str("bucket = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_requires_bucket() {
        assert!(config("").validate().is_err());
        assert!(config("b").validate().is_ok());
    }

    #[test]
    fn test_validate_credentials_exclusive() {
        let mut cfg = config("b");
        cfg.credentials_json = Some("{}".to_string());
        cfg.credentials_file = Some(PathBuf::from("/tmp/creds.json"));
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_endpoint() {
        let mut cfg = config("b");
        cfg.endpoint = Some("not a url".to_string());
        assert!(cfg.validate().is_err());
        cfg.endpoint = Some("http://localhost:9000".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_overlapping_roots() {
        let mut cfg = config("b");
        cfg.path = "backup".to_string();
        cfg.object_disk_path = Some("backup/disks".to_string());
        assert!(cfg.validate().is_err());

        cfg.object_disk_path = Some("disks".to_string());
        assert!(cfg.validate().is_ok());

        cfg.object_disk_path = Some("/backup/".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_credential_source_json_and_base64() {
        let json = r#"{"access_key_id":"AK","secret_access_key":"SK"}"#;

        let mut cfg = config("b");
        cfg.credentials_json = Some(json.to_string());
        let CredentialSource::Static(creds) = cfg.credential_source().unwrap() else {
            panic!("expected static credentials");
        };
        assert_eq!(creds.access_key_id, "AK");
        assert!(creds.session_token.is_none());

        let mut cfg = config("b");
        cfg.credentials_json_encoded = Some(general_purpose::STANDARD.encode(json));
        assert!(matches!(
            cfg.credential_source().unwrap(),
            CredentialSource::Static(_)
        ));

        cfg.credentials_json_encoded = Some("%%%".to_string());
        assert!(matches!(cfg.credential_source(), Err(Error::Config(_))));
    }

    #[test]
    fn test_credential_source_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"access_key_id":"AK","secret_access_key":"SK","session_token":"T"}}"#
        )
        .unwrap();

        let mut cfg = config("b");
        cfg.credentials_file = Some(file.path().to_path_buf());
        let CredentialSource::Static(creds) = cfg.credential_source().unwrap() else {
            panic!("expected static credentials");
        };
        assert_eq!(creds.session_token.as_deref(), Some("T"));
    }

    #[test]
    fn test_credential_source_fallbacks() {
        let mut cfg = config("b");
        assert_eq!(cfg.credential_source().unwrap(), CredentialSource::DefaultChain);

        cfg.endpoint = Some("http://localhost:9000".to_string());
        assert_eq!(cfg.credential_source().unwrap(), CredentialSource::Anonymous);
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = StaticCredentials {
            access_key_id: "AK".to_string(),
            secret_access_key: "very-secret".to_string(),
            session_token: None,
        };
        assert!(!format!("{creds:?}").contains("very-secret"));
    }

    #[test]
    fn test_write_options_skip_empty_storage_class() {
        let mut cfg = config("b");
        cfg.storage_class = Some(String::new());
        assert!(cfg.write_options().storage_class.is_none());
        assert!(cfg.write_options().metadata.is_empty());
    }

    #[test]
    fn test_config_manager_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "bucket = \"backups\"\n").unwrap();

        let config = ConfigManager::with_path(&path).load().unwrap();
        assert_eq!(config.bucket, "backups");

        let missing = ConfigManager::with_path(dir.path().join("missing.toml")).load();
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[test]
    fn test_config_manager_read_skips_validation() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "path = \"shadow\"\n").unwrap();

        let manager = ConfigManager::with_path(&path);
        let config = manager.read().unwrap().expect("file exists");
        assert_eq!(config.path, "shadow");
        assert!(manager.load().is_err());

        let missing = ConfigManager::with_path(dir.path().join("missing.toml"));
        assert!(missing.read().unwrap().is_none());
    }
}
