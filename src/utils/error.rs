use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid decimal value: {0}")]
    DecimalError(#[from] rust_decimal::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("WebDriver command '{command}' failed: {message}")]
    WebDriverError { command: String, message: String },

    #[error("Element {locator} not visible within {timeout:?}")]
    ElementTimeout { locator: String, timeout: Duration },

    #[error("Stream returned HTTP {status}: {message}")]
    StreamHttpError { status: u16, message: String },

    #[error("Stream disconnected: {reason}")]
    StreamDisconnected { reason: String },

    #[error("Malformed post payload: {message}")]
    PayloadError { message: String },

    #[error("Event queue is closed")]
    QueueClosed,

    #[error("Worker task failed: {message}")]
    WorkerError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Browser,
    Stream,
    Data,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BotError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BotError::ConfigError { .. }
            | BotError::MissingConfigError { .. }
            | BotError::InvalidConfigValueError { .. }
            | BotError::TomlError(_) => ErrorCategory::Configuration,
            BotError::HttpError(_) | BotError::IoError(_) => ErrorCategory::Network,
            BotError::WebDriverError { .. } | BotError::ElementTimeout { .. } => {
                ErrorCategory::Browser
            }
            BotError::StreamHttpError { .. } | BotError::StreamDisconnected { .. } => {
                ErrorCategory::Stream
            }
            BotError::SerializationError(_)
            | BotError::DecimalError(_)
            | BotError::PayloadError { .. } => ErrorCategory::Data,
            BotError::QueueClosed | BotError::WorkerError { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::Critical,
            ErrorCategory::Browser | ErrorCategory::Internal => ErrorSeverity::High,
            ErrorCategory::Network | ErrorCategory::Stream => {
                if self.is_transient() {
                    ErrorSeverity::Medium
                } else {
                    ErrorSeverity::High
                }
            }
            ErrorCategory::Data => ErrorSeverity::Low,
        }
    }

    /// 串流層可重連的錯誤：網路中斷、限流、伺服器錯誤
    pub fn is_transient(&self) -> bool {
        match self {
            BotError::HttpError(e) => !e.is_builder(),
            BotError::IoError(_) => true,
            BotError::StreamDisconnected { .. } => true,
            BotError::StreamHttpError { status, .. } => {
                !matches!(status, 401 | 403 | 404 | 406 | 413 | 416)
            }
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            BotError::StreamHttpError {
                status: 420 | 429,
                ..
            }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BotError::MissingConfigError { .. } => {
                "Set the missing variable in the environment or in the .env file"
            }
            BotError::InvalidConfigValueError { .. } | BotError::ConfigError { .. } => {
                "Check the environment variables and the catalog file"
            }
            BotError::TomlError(_) => "Make sure the catalog file is valid TOML",
            BotError::StreamHttpError { status: 401, .. } => {
                "Verify the four stream API credentials"
            }
            BotError::StreamHttpError { .. } | BotError::StreamDisconnected { .. } => {
                "The stream will reconnect; check the account's API access if this persists"
            }
            BotError::WebDriverError { .. } | BotError::ElementTimeout { .. } => {
                "Check the retailer account for a partial order and verify the WebDriver server is running"
            }
            BotError::HttpError(_) | BotError::IoError(_) => "Check network connectivity",
            _ => "Restart the bot; inspect the logs for the failing event",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("配置錯誤: {}", self),
            ErrorCategory::Browser => format!("瀏覽器操作失敗: {}", self),
            ErrorCategory::Stream | ErrorCategory::Network => format!("連線失敗: {}", self),
            ErrorCategory::Data => format!("資料格式錯誤: {}", self),
            ErrorCategory::Internal => format!("內部錯誤: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_status_transience() {
        let rate_limited = BotError::StreamHttpError {
            status: 420,
            message: "Enhance Your Calm".to_string(),
        };
        assert!(rate_limited.is_transient());
        assert!(rate_limited.is_rate_limited());

        let unauthorized = BotError::StreamHttpError {
            status: 401,
            message: "Unauthorized".to_string(),
        };
        assert!(!unauthorized.is_transient());
        assert_eq!(unauthorized.severity(), ErrorSeverity::High);

        let server = BotError::StreamHttpError {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        assert!(server.is_transient());
        assert!(!server.is_rate_limited());
    }

    #[test]
    fn test_browser_errors_are_not_transient() {
        let err = BotError::ElementTimeout {
            locator: "name=submit.buy-now".to_string(),
            timeout: Duration::from_secs(20),
        };
        assert!(!err.is_transient());
        assert_eq!(err.category(), ErrorCategory::Browser);
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = BotError::MissingConfigError {
            field: "CONSUMER_KEY".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().contains("CONSUMER_KEY"));
    }
}
