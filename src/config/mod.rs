pub mod catalog;

use crate::utils::error::{BotError, Result};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use catalog::{CatalogFile, PurchaseSettings, RetailerConfig, Selectors};

pub const DEFAULT_STREAM_ENDPOINT: &str = "https://stream.twitter.com/1.1/statuses/filter.json";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
pub const DEFAULT_AUDIT_LOG_PATH: &str = "out.jsonl";
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// 追蹤的帳號：d_winch (測試用)、PartAlert (顯示卡)、PA_Console (PS5)
pub const DEFAULT_TRACKED_AUTHORS: [&str; 3] =
    ["3373551", "1314575666130694144", "1320083775934631937"];

#[derive(Clone, Serialize, Deserialize)]
pub struct RetailerCredentials {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StreamCredentials {
    pub consumer_key: String,
    #[serde(skip_serializing)]
    pub consumer_secret: String,
    pub access_token: String,
    #[serde(skip_serializing)]
    pub access_token_secret: String,
}

// 密碼與金鑰不進日誌
impl fmt::Debug for RetailerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetailerCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl fmt::Debug for StreamCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"***")
            .field("access_token", &self.access_token)
            .field("access_token_secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Firefox,
    Chrome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub retailer_credentials: RetailerCredentials,
    pub stream_credentials: StreamCredentials,
    pub stream_endpoint: String,
    pub webdriver_url: String,
    pub browser: BrowserKind,
    pub tracked_authors: Vec<String>,
    pub worker_count: usize,
    pub audit_log_path: String,
    pub catalog_path: Option<String>,
    pub verbose: bool,
    pub log_format: LogFormat,
}

impl BotConfig {
    /// 從行程環境變數讀取 (先載入 .env)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 以任意查找函式讀取，方便測試時不動到行程環境
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| BotError::MissingConfigError {
                field: key.to_string(),
            })
        };

        let retailer_credentials = RetailerCredentials {
            username: get("RETAILER_USERNAME")
                .or_else(|| get("USERNAME"))
                .ok_or_else(|| BotError::MissingConfigError {
                    field: "RETAILER_USERNAME".to_string(),
                })?,
            password: get("RETAILER_PASSWORD")
                .or_else(|| get("PASSWORD"))
                .ok_or_else(|| BotError::MissingConfigError {
                    field: "RETAILER_PASSWORD".to_string(),
                })?,
        };

        let stream_credentials = StreamCredentials {
            consumer_key: require("CONSUMER_KEY")?,
            consumer_secret: require("CONSUMER_SECRET")?,
            access_token: require("ACCESS_TOKEN")?,
            access_token_secret: require("ACCESS_TOKEN_SECRET")?,
        };

        let tracked_authors = match get("TRACKED_AUTHORS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_TRACKED_AUTHORS.iter().map(|s| s.to_string()).collect(),
        };

        let worker_count = match get("WORKER_COUNT") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|e| BotError::InvalidConfigValueError {
                    field: "WORKER_COUNT".to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => DEFAULT_WORKER_COUNT,
        };

        let browser = match get("BROWSER").as_deref().map(str::to_ascii_lowercase) {
            None => BrowserKind::Firefox,
            Some(name) if name == "firefox" => BrowserKind::Firefox,
            Some(name) if name == "chrome" || name == "chromium" => BrowserKind::Chrome,
            Some(other) => {
                return Err(BotError::InvalidConfigValueError {
                    field: "BROWSER".to_string(),
                    value: other,
                    reason: "Supported browsers: firefox, chrome".to_string(),
                })
            }
        };

        let verbose = get("RESTOCK_VERBOSE")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            retailer_credentials,
            stream_credentials,
            stream_endpoint: get("STREAM_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_STREAM_ENDPOINT.to_string()),
            webdriver_url: get("WEBDRIVER_URL").unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
            browser,
            tracked_authors,
            worker_count,
            audit_log_path: get("AUDIT_LOG_PATH")
                .unwrap_or_else(|| DEFAULT_AUDIT_LOG_PATH.to_string()),
            catalog_path: get("CATALOG_PATH"),
            verbose,
            log_format: get("RESTOCK_LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        })
    }

    pub fn load_catalog(&self) -> Result<CatalogFile> {
        match &self.catalog_path {
            Some(path) => CatalogFile::from_file(path),
            None => CatalogFile::builtin(),
        }
    }
}

impl Validate for BotConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string(
            "RETAILER_USERNAME",
            &self.retailer_credentials.username,
        )?;
        validation::validate_url("STREAM_ENDPOINT", &self.stream_endpoint)?;
        validation::validate_url("WEBDRIVER_URL", &self.webdriver_url)?;
        validation::validate_path("AUDIT_LOG_PATH", &self.audit_log_path)?;
        validation::validate_positive_number("WORKER_COUNT", self.worker_count, 1)?;

        validation::validate_account_ids("TRACKED_AUTHORS", &self.tracked_authors)?;

        if let Some(path) = &self.catalog_path {
            validation::validate_path("CATALOG_PATH", path)?;
        }
        Ok(())
    }
}
