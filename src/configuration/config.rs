use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::{Parser, Subcommand};
use log::{debug, info};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Application configuration structure that defines all runtime parameters.
///
/// Values come from an optional TOML settings file; every key that the file
/// leaves out keeps its default. The defaults are enough to run a local
/// development instance.
///
/// # Example file
///
/// ```toml
/// database = "/var/lib/microblog/microblog.db"
/// upload_folder = "/var/lib/microblog/files"
/// allowed_extensions = ["txt", "pdf"]
/// username = "admin"
/// password = "hunter2"
/// secret_key = "change me"
/// port = 8080
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path of the SQLite database file.
    pub database: PathBuf,

    /// Directory uploaded attachments are written to.
    pub upload_folder: PathBuf,

    /// Extensions accepted for uploads, compared case-sensitively against
    /// the part of the filename after the last dot.
    pub allowed_extensions: Vec<String>,

    /// Admin account name.
    pub username: String,

    /// Admin account password, compared as plain text.
    pub password: String,

    /// Key used to sign the session cookie.
    ///
    /// Changing it invalidates every outstanding session.
    pub secret_key: String,

    /// Upper bound for any request body, in bytes. Larger requests are
    /// answered with 413 before the body is read.
    pub max_content_length: u64,

    /// IP address the HTTP server binds to.
    pub bind_address: String,

    /// TCP port the HTTP server listens on.
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            upload_folder: PathBuf::from(DEFAULT_UPLOAD_FOLDER),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Reads and validates a TOML settings file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!("Loaded settings from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the settings file when one is given, the defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                debug!("No settings file given, using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.is_empty() {
            return Err(ConfigError::EmptyValue("secret_key".into()));
        }
        if self.username.is_empty() {
            return Err(ConfigError::EmptyValue("username".into()));
        }
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::EmptyValue("allowed_extensions".into()));
        }
        if self.max_content_length == 0 {
            return Err(ConfigError::NotInRange(
                "max_content_length must be greater than zero".into(),
            ));
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| ConfigError::BadAddressFormatting(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Command-line interface of the `microblog` binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "microblog")]
#[command(version)]
#[command(about = "A minimal single-author microblog with file attachments")]
pub struct Cli {
    /// TOML settings file
    ///
    /// # Command Line
    /// Use `--config <FILE>` or the `MICROBLOG_SETTINGS` environment variable
    #[arg(long, env = "MICROBLOG_SETTINGS")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        /// Overrides `bind_address` from the settings file
        #[arg(long)]
        bind_address: Option<String>,

        /// Overrides `port` from the settings file
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create (or reset) the database tables
    InitDb,
}

impl Cli {
    /// Builds the effective configuration: settings file first, then the
    /// command-line overrides.
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Command::Serve { bind_address, port } = &self.command {
            if let Some(addr) = bind_address {
                config.bind_address = addr.clone();
            }
            if let Some(port) = port {
                config.port = *port;
            }
        }
        config.validate()?;
        Ok(config)
    }
}
