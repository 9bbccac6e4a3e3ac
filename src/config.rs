use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w300";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const APP_DIR_NAME: &str = "watchdeck";
const DB_FILE_NAME: &str = "watchdeck.db";

/// CLI arguments that take part in config resolution.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub api_key: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub debug: bool,
}

/// Optional TOML config file. Every value present here wins over the CLI.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub image_base_url: Option<String>,
    pub language: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub data_dir: Option<String>,
    pub log_dir: Option<String>,
    pub debug: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub api_base_url: Url,
    pub image_base_url: String,
    pub language: Option<String>,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub debug: bool,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and an optional TOML file.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let api_key = file
            .api_key
            .or_else(|| cli.api_key.clone())
            .filter(|key| !key.trim().is_empty());

        let api_base_url = file
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL);
        let api_base_url = Url::parse(api_base_url)
            .with_context(|| format!("Invalid api_base_url: {}", api_base_url))?;
        if !matches!(api_base_url.scheme(), "http" | "https") {
            bail!("api_base_url must be http or https: {}", api_base_url);
        }

        let image_base_url = file
            .image_base_url
            .unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string());

        let request_timeout_secs = file
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }

        let data_dir = match file.data_dir.map(PathBuf::from).or_else(|| cli.data_dir.clone()) {
            Some(dir) => dir,
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR_NAME))
                .ok_or_else(|| anyhow!("No data directory available; pass --data-dir"))?,
        };
        if data_dir.exists() && !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let log_dir = file
            .log_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("logs"));

        Ok(Self {
            api_key,
            api_base_url,
            image_base_url,
            language: file.language,
            request_timeout: Duration::from_secs(request_timeout_secs),
            data_dir,
            log_dir,
            debug: file.debug.unwrap_or(cli.debug),
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    /// The catalog credential, required only by operations that hit the network.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("A TMDB API key is required; pass --api-key or set TMDB_API_KEY"))
    }
}
