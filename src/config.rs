//! Configuration file handling for mf.
//!
//! The configuration file is stored at `$MF_HOME/config.json` and contains the login email, the
//! site URLs and the pacing of refreshes. The password is never stored.

use crate::api::{Endpoints, APP_URL, ID_URL};
use crate::session::RefreshOptions;
use crate::utils;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "mf";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const TIMEOUT_SECS: u64 = 10;
const POLL_INTERVAL_SECS: u64 = 2;
const MAX_WAIT_SECS: u64 = 300;
const STALENESS_SECS: u64 = 60;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$MF_HOME` and from there it loads `$MF_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    endpoints: Endpoints,
}

impl Config {
    /// Creates the data directory if needed and writes an initial `config.json` with default
    /// settings for `email`.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of data directory, e.g. `$HOME/mf`
    /// - `email` - The email address used to log in.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail or if `config.json` already exists.
    pub async fn create(dir: impl Into<PathBuf>, email: &str) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the mf home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!("The config file already exists '{}'", config_path.display())
        }

        let config_file = ConfigFile {
            email: email.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;
        let endpoints = config_file.endpoints()?;

        Ok(Self {
            root,
            config_path,
            config_file,
            endpoints,
        })
    }

    /// This will
    /// - validate that `mf_home` exists and that the config file exists
    /// - load the config file and validate its URLs
    /// - return the loaded configuration object
    pub async fn load(mf_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = mf_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("MF Home is missing")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let endpoints = config_file.endpoints()?;

        Ok(Self {
            root,
            config_path,
            config_file,
            endpoints,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn email(&self) -> &str {
        &self.config_file.email
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn timeout_secs(&self) -> u64 {
        self.config_file.timeout_secs
    }

    /// The refresh pacing from the config file.
    pub fn refresh_options(&self) -> RefreshOptions {
        RefreshOptions {
            poll_interval: Duration::from_secs(self.config_file.poll_interval_secs),
            max_wait: Duration::from_secs(self.config_file.max_wait_secs),
            staleness: Duration::from_secs(self.config_file.staleness_secs),
        }
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "mf",
///   "config_version": 1,
///   "email": "someone@example.com",
///   "timeout_secs": 10,
///   "poll_interval_secs": 2,
///   "max_wait_secs": 300,
///   "staleness_secs": 60
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "mf"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The login email address
    email: String,

    /// Overrides the application URL, e.g. for a staging site
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,

    /// Overrides the identity (login) URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_url: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,

    /// Time between two polls while waiting for a refresh
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,

    /// Longest time to wait for a refresh
    #[serde(default = "default_max_wait_secs")]
    max_wait_secs: u64,

    /// Sources updated longer ago than this are refreshed
    #[serde(default = "default_staleness_secs")]
    staleness_secs: u64,
}

fn default_timeout_secs() -> u64 {
    TIMEOUT_SECS
}

fn default_poll_interval_secs() -> u64 {
    POLL_INTERVAL_SECS
}

fn default_max_wait_secs() -> u64 {
    MAX_WAIT_SECS
}

fn default_staleness_secs() -> u64 {
    STALENESS_SECS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            email: String::new(),
            base_url: None,
            id_url: None,
            timeout_secs: TIMEOUT_SECS,
            poll_interval_secs: POLL_INTERVAL_SECS,
            max_wait_secs: MAX_WAIT_SECS,
            staleness_secs: STALENESS_SECS,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it is not an mf config file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .with_context(|| format!("Failed to load config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.poll_interval_secs > 0,
            "Invalid poll_interval_secs in config file: must be greater than zero"
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// The site URLs, with the production site wherever the file does not override them.
    fn endpoints(&self) -> Result<Endpoints> {
        let parse = |value: Option<&String>, default: &str, name: &str| -> Result<Url> {
            let value = value.map(String::as_str).unwrap_or(default);
            Url::parse(value).with_context(|| format!("Invalid {name} in config file '{value}'"))
        };
        Ok(Endpoints::new(
            parse(self.base_url.as_ref(), APP_URL, "base_url")?,
            parse(self.id_url.as_ref(), ID_URL, "id_url")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    async fn write_json(path: &Path, json: &str) {
        let mut file = tokio::fs::File::create(path).await.unwrap();
        file.write_all(json.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("mf_home");

        let config = Config::create(&home_dir, "someone@example.com")
            .await
            .unwrap();

        assert_eq!("someone@example.com", config.email());
        assert!(config.config_path().is_file());
        assert_eq!(config.timeout_secs(), 10);
        assert_eq!(config.endpoints(), &Endpoints::default());

        // Loading what was written gives the same settings.
        let loaded = Config::load(&home_dir).await.unwrap();
        assert_eq!(loaded.email(), config.email());
        assert_eq!(loaded.refresh_options(), RefreshOptions::default());
    }

    #[tokio::test]
    async fn test_config_create_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path(), "a@example.com").await.unwrap();
        let result = Config::create(dir.path(), "b@example.com").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(dir.path()).await;
        assert!(result.unwrap_err().to_string().contains("missing"));
    }

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.app_name, "mf");
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.max_wait_secs, 300);
        assert_eq!(config.staleness_secs, 60);
        assert_eq!(config.endpoints().unwrap(), Endpoints::default());
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "mf",
            "config_version": 1,
            "email": "someone@example.com"
        }"#;
        write_json(&config_path, json).await;

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(config.email, "someone@example.com");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.base_url, None);
    }

    #[tokio::test]
    async fn test_config_file_url_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "mf",
            "config_version": 1,
            "email": "someone@example.com",
            "base_url": "https://staging.example.com/",
            "id_url": "https://id.staging.example.com/"
        }"#;
        write_json(&config_path, json).await;

        let endpoints = ConfigFile::load(&config_path)
            .await
            .unwrap()
            .endpoints()
            .unwrap();
        assert_eq!(
            endpoints.app("/cf").unwrap().as_str(),
            "https://staging.example.com/cf"
        );
        assert_eq!(
            endpoints.id("/sign_in").unwrap().as_str(),
            "https://id.staging.example.com/sign_in"
        );
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "wrong_app",
            "config_version": 1,
            "email": "someone@example.com"
        }"#;
        write_json(&config_path, json).await;

        let result = ConfigFile::load(&config_path).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "mf",
            "config_version": 1,
            "email": "someone@example.com",
            "base_url": "not a url"
        }"#;
        write_json(&config_path, json).await;

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert!(config.endpoints().is_err());
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let config = ConfigFile::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("base_url"));
        assert!(!json.contains("id_url"));
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let t = TempDir::new().unwrap();
        let path = t.path().join("file.json");
        let original = ConfigFile {
            email: "someone@example.com".to_string(),
            staleness_secs: 120,
            ..ConfigFile::default()
        };
        original.save(&path).await.unwrap();
        let read = ConfigFile::load(&path).await.unwrap();
        assert_eq!(original, read);
    }
}
