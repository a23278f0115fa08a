use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// RESTOCK_LOG_FORMAT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// RUST_LOG 優先；否則 verbose 時開 debug
fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "restock_bot=debug,info" } else { "restock_bot=info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// 安裝全域 subscriber。重複呼叫 (例如測試) 時保留第一個，不會 panic
pub fn init_logger(verbose: bool, format: LogFormat) {
    let (compact, json) = match format {
        LogFormat::Compact => (
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            ),
            None,
        ),
        // 給 log shipper 用，保留 target 方便分辨 worker 與串流
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_target(true).with_current_span(false)),
        ),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(compact)
        .with(json)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Logger already installed, keeping the existing subscriber");
    }
}
