use crate::session::DEFAULT_SESSION_LIFETIME;
use crate::storage::StorageConfig;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure that can be loaded from CLI, config file, or environment
///
/// Example configuration file content
/// # Beta gate configuration
///
/// listen_on_port = 4173
/// public_dir = "./public"
/// password = "let-me-in"
///
/// # Session cookie lifetime (default 7 days) and download link validity (default 10 minutes)
/// session_lifetime_secs = 604800
/// link_expiry_secs = 600
///
/// # Object storage holding the artifact
/// storage_url = "https://project.supabase.co"
/// storage_service_key = "service-role-key"
/// storage_bucket = "beta-downloads"
/// download_filename = "PluginnerFX-beta.zip"
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[serde(default)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 4173)]
    #[serde(default = "default_port")]
    pub listen_on_port: u16,

    /// Shared beta password
    #[arg(long, env = "BETA_PASSWORD", hide_env_values = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Directory served for every non-API path. Must not contain the config file.
    #[arg(long, env = "PUBLIC_DIR", default_value = "./public")]
    #[serde(default = "default_public_dir")]
    pub public_dir: String,

    /// Base URL of the storage provider (e.g. https://project.supabase.co)
    #[arg(long, env = "SUPABASE_URL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,

    /// Service key used to sign download URLs
    #[arg(long, env = "SUPABASE_SERVICE_KEY", hide_env_values = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_service_key: Option<String>,

    /// Bucket holding the artifact
    #[arg(long, env = "STORAGE_BUCKET", default_value = "beta-downloads")]
    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,

    /// Object name of the artifact inside the bucket
    #[arg(long, env = "DOWNLOAD_FILENAME", default_value = "PluginnerFX-beta.zip")]
    #[serde(default = "default_download_filename")]
    pub download_filename: String,

    /// Session lifetime in seconds, used for both the token and the cookie
    #[arg(long, default_value_t = DEFAULT_SESSION_LIFETIME.as_secs())]
    #[serde(default = "default_session_lifetime_secs")]
    pub session_lifetime_secs: u64,

    /// Validity of generated download links in seconds
    #[arg(long, default_value_t = 600)]
    #[serde(default = "default_link_expiry_secs")]
    pub link_expiry_secs: u64,

    /// Drop the Secure cookie attribute and relax SameSite (plain-http local development only)
    #[arg(long, env = "INSECURE_COOKIES")]
    pub insecure_cookies: bool,

    /// Configuration file path
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_on_port: default_port(),
            password: None,
            public_dir: default_public_dir(),
            storage_url: None,
            storage_service_key: None,
            storage_bucket: default_storage_bucket(),
            download_filename: default_download_filename(),
            session_lifetime_secs: default_session_lifetime_secs(),
            link_expiry_secs: default_link_expiry_secs(),
            insecure_cookies: false,
            config: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Config::parse();

        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // If CLI value is default, use file value
        if self.listen_on_port == default_port() {
            self.listen_on_port = file_config.listen_on_port;
        }
        if self.public_dir == default_public_dir() {
            self.public_dir = file_config.public_dir;
        }
        if self.storage_bucket == default_storage_bucket() {
            self.storage_bucket = file_config.storage_bucket;
        }
        if self.download_filename == default_download_filename() {
            self.download_filename = file_config.download_filename;
        }
        if self.session_lifetime_secs == default_session_lifetime_secs() {
            self.session_lifetime_secs = file_config.session_lifetime_secs;
        }
        if self.link_expiry_secs == default_link_expiry_secs() {
            self.link_expiry_secs = file_config.link_expiry_secs;
        }
        self.insecure_cookies |= file_config.insecure_cookies;

        // For Option fields, CLI takes precedence if Some
        if self.password.is_none() {
            self.password = file_config.password;
        }
        if self.storage_url.is_none() {
            self.storage_url = file_config.storage_url;
        }
        if self.storage_service_key.is_none() {
            self.storage_service_key = file_config.storage_service_key;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.password.as_ref().map(|s| s.is_empty()).unwrap_or(true) {
            return Err(anyhow::anyhow!(
                "Beta password is required (--password or BETA_PASSWORD)"
            ));
        }

        if self.session_lifetime_secs == 0 {
            return Err(anyhow::anyhow!("Session lifetime must be greater than zero"));
        }
        if self.link_expiry_secs == 0 {
            return Err(anyhow::anyhow!("Link expiry must be greater than zero"));
        }

        if let Some(storage_url) = &self.storage_url
            && !storage_url.starts_with("http://")
            && !storage_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "Storage URL must start with http:// or https://"
            ));
        }

        if self.download_filename.trim_matches('/').is_empty() {
            return Err(anyhow::anyhow!("Download filename cannot be empty"));
        }

        self.check_config_not_public()
    }

    /// Refuse a public directory that would serve the config file itself
    fn check_config_not_public(&self) -> anyhow::Result<()> {
        let Some(config_path) = &self.config else {
            return Ok(());
        };
        let (Ok(config_path), Ok(public_dir)) = (
            std::fs::canonicalize(config_path),
            std::fs::canonicalize(&self.public_dir),
        ) else {
            return Ok(());
        };

        if config_path.starts_with(&public_dir) {
            return Err(anyhow::anyhow!(
                "Config file {} is inside the public directory {}",
                config_path.display(),
                public_dir.display()
            ));
        }

        Ok(())
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_lifetime_secs)
    }

    pub fn link_expiry(&self) -> Duration {
        Duration::from_secs(self.link_expiry_secs)
    }

    /// Storage settings, present only when both URL and service key are set
    pub fn to_storage_config(&self) -> Option<StorageConfig> {
        let base_url = self.storage_url.clone().filter(|s| !s.is_empty())?;
        let service_key = self.storage_service_key.clone().filter(|s| !s.is_empty())?;

        Some(StorageConfig {
            base_url,
            service_key,
            bucket: self.storage_bucket.clone(),
            object: self.download_filename.clone(),
            link_expiry: self.link_expiry(),
        })
    }
}

// Default value functions
fn default_port() -> u16 {
    4173
}

fn default_public_dir() -> String {
    "./public".to_string()
}

fn default_storage_bucket() -> String {
    "beta-downloads".to_string()
}

fn default_download_filename() -> String {
    "PluginnerFX-beta.zip".to_string()
}

fn default_session_lifetime_secs() -> u64 {
    DEFAULT_SESSION_LIFETIME.as_secs()
}

fn default_link_expiry_secs() -> u64 {
    10 * 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_from_cli() {
        let cli_content = [
            "CLI",
            "--listen-on-port",
            "8080",
            "--password",
            "correct",
            "--public-dir",
            "/srv/www",
            "--storage-url",
            "https://proj.supabase.co",
            "--storage-service-key",
            "key",
            "--download-filename",
            "Other.zip",
            "--session-lifetime-secs",
            "3600",
            "--insecure-cookies",
        ];

        let config = Config::try_parse_from(cli_content).unwrap();

        assert_eq!(config.listen_on_port, 8080);
        assert_eq!(config.password.as_deref(), Some("correct"));
        assert_eq!(config.public_dir, "/srv/www");
        assert_eq!(config.download_filename, "Other.zip");
        assert_eq!(config.session_lifetime(), Duration::from_secs(3600));
        assert_eq!(config.link_expiry(), Duration::from_secs(600));
        assert!(config.insecure_cookies);
        assert!(config.validate().is_ok());

        let storage = config.to_storage_config().unwrap();
        assert_eq!(storage.base_url, "https://proj.supabase.co");
        assert_eq!(storage.bucket, "beta-downloads");
        assert_eq!(storage.object, "Other.zip");
    }

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
            listen_on_port = 8080
            password = "from-file"
            storage_url = "http://localhost:54321"
            storage_service_key = "key"
            link_expiry_secs = 60
        "#;

        let config: Config = toml::from_str(toml_content).unwrap();

        assert_eq!(config.listen_on_port, 8080);
        assert_eq!(config.password.as_deref(), Some("from-file"));
        assert_eq!(config.link_expiry(), Duration::from_secs(60));
        assert_eq!(config.session_lifetime(), Duration::from_secs(604800));
        assert_eq!(config.storage_bucket, "beta-downloads");
        assert!(!config.insecure_cookies);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_merge_with_file() {
        let file_config = Config {
            listen_on_port: 9000,
            password: Some("file-password".to_string()),
            storage_url: Some("https://file.example".to_string()),
            link_expiry_secs: 30,
            ..Default::default()
        };

        let cli_config = Config {
            password: Some("cli-password".to_string()),
            ..Default::default()
        };

        let merged = cli_config.merge_with_file(file_config);

        assert_eq!(merged.listen_on_port, 9000); // File value used when CLI is default
        assert_eq!(merged.password.as_deref(), Some("cli-password")); // CLI value takes precedence
        assert_eq!(merged.storage_url.as_deref(), Some("https://file.example"));
        assert_eq!(merged.link_expiry_secs, 30);
    }

    #[test]
    fn test_missing_password_is_fatal() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let config = Config {
            password: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = Config {
            password: Some("pw".to_string()),
            ..Default::default()
        };
        assert!(base.validate().is_ok());

        let zero_lifetime = Config {
            session_lifetime_secs: 0,
            ..base.clone()
        };
        assert!(zero_lifetime.validate().is_err());

        let zero_link = Config {
            link_expiry_secs: 0,
            ..base.clone()
        };
        assert!(zero_link.validate().is_err());

        let bad_url = Config {
            storage_url: Some("ftp://storage".to_string()),
            ..base.clone()
        };
        assert!(bad_url.validate().is_err());

        let empty_file = Config {
            download_filename: "/".to_string(),
            ..base
        };
        assert!(empty_file.validate().is_err());
    }

    #[test]
    fn test_storage_config_requires_url_and_key() {
        let config = Config {
            storage_url: Some("https://proj.supabase.co".to_string()),
            ..Default::default()
        };
        assert!(config.to_storage_config().is_none());

        let config = Config {
            storage_service_key: Some("key".to_string()),
            ..Default::default()
        };
        assert!(config.to_storage_config().is_none());
    }

    #[test]
    fn test_default_lifetime_matches_authority() {
        let config = Config::default();
        assert_eq!(config.session_lifetime(), DEFAULT_SESSION_LIFETIME);
        assert_eq!(config.public_dir, "./public");
    }

    #[test]
    fn test_config_file_inside_public_dir_rejected() {
        let root = std::env::temp_dir().join(format!(
            "beta-gate-config-test-{}",
            std::process::id()
        ));
        let public_dir = root.join("public");
        std::fs::create_dir_all(&public_dir).unwrap();

        let inside = public_dir.join("beta.toml");
        let outside = root.join("beta.toml");
        std::fs::write(&inside, "password = \"pw\"\n").unwrap();
        std::fs::write(&outside, "password = \"pw\"\n").unwrap();

        let base = Config {
            password: Some("pw".to_string()),
            public_dir: public_dir.to_string_lossy().into_owned(),
            ..Default::default()
        };

        let exposed = Config {
            config: Some(inside.to_string_lossy().into_owned()),
            ..base.clone()
        };
        let hidden = Config {
            config: Some(outside.to_string_lossy().into_owned()),
            ..base.clone()
        };
        // Same directory reached through a relative segment
        let exposed_dotted = Config {
            public_dir: root.join("public/../public").to_string_lossy().into_owned(),
            config: Some(inside.to_string_lossy().into_owned()),
            ..base
        };

        let results = (
            exposed.validate(),
            hidden.validate(),
            exposed_dotted.validate(),
        );
        std::fs::remove_dir_all(&root).ok();

        assert!(results.0.is_err());
        assert!(results.1.is_ok());
        assert!(results.2.is_err());
    }
}
