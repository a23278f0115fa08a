//! 以 OAuth 1.0a 簽章連到 statuses/filter 的長連線串流客戶端。
//! 回應是以換行分隔的 JSON，空行是 keep-alive。

use crate::adapters::oauth::OAuthSigner;
use crate::config::StreamCredentials;
use crate::domain::model::PostEvent;
use crate::domain::ports::{FilterRequest, StreamClient, StreamControl, StreamEnd, StreamListener};
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use std::time::Duration;

/// 伺服器每 30 秒會送 keep-alive，超過 90 秒沒有資料就視為卡住
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(90);

pub struct HttpStreamClient {
    client: Client,
    endpoint: String,
    signer: OAuthSigner,
    stall_timeout: Duration,
}

/// 單行解析後的結果
enum Dispatch {
    Continue,
    Stop,
    Disconnect(String),
}

impl HttpStreamClient {
    pub fn new(endpoint: impl Into<String>, credentials: &StreamCredentials) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("restock-bot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            signer: OAuthSigner::new(credentials),
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        })
    }

    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    fn form_params(request: &FilterRequest) -> Vec<(String, String)> {
        let mut params = vec![("follow".to_string(), request.follow.join(","))];
        if request.extended {
            params.push(("tweet_mode".to_string(), "extended".to_string()));
        }
        if request.stall_warnings {
            params.push(("stall_warnings".to_string(), "true".to_string()));
        }
        params
    }

    fn dispatch_line(line: &str, request: &FilterRequest, listener: &dyn StreamListener) -> Dispatch {
        let message: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("⚠️ Skipping malformed stream line: {}", e);
                return Dispatch::Continue;
            }
        };

        let control = if let Some(limit) = message.get("limit") {
            let undelivered = limit.get("track").and_then(Value::as_u64).unwrap_or(0);
            listener.on_limit(undelivered)
        } else if let Some(warning) = message.get("warning") {
            let notice = warning
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("stall warning");
            listener.on_warning(notice)
        } else if let Some(disconnect) = message.get("disconnect") {
            let reason = disconnect
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("disconnect message")
                .to_string();
            return Dispatch::Disconnect(reason);
        } else if message.get("user").is_some() {
            if !request.include_retweets && message.get("retweeted_status").is_some() {
                return Dispatch::Continue;
            }
            match PostEvent::from_json(line) {
                Ok(event) => listener.on_post(event),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping unreadable post: {}", e);
                    StreamControl::Continue
                }
            }
        } else {
            tracing::debug!("Ignoring stream message without a post");
            StreamControl::Continue
        };

        match control {
            StreamControl::Continue => Dispatch::Continue,
            StreamControl::Stop => Dispatch::Stop,
        }
    }
}

#[async_trait]
impl StreamClient for HttpStreamClient {
    async fn filter(&self, request: &FilterRequest, listener: &dyn StreamListener) -> Result<StreamEnd> {
        let params = Self::form_params(request);
        let authorization = self
            .signer
            .authorization_header("POST", &self.endpoint, &params)?;

        tracing::debug!("Connecting to stream endpoint {}", self.endpoint);
        let mut response = self
            .client
            .post(&self.endpoint)
            .header(header::AUTHORIZATION, authorization)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            if (code == 420 || code == 429) && listener.on_rate_limited(code) == StreamControl::Stop {
                return Ok(StreamEnd::Stopped);
            }
            let message = response.text().await.unwrap_or_default();
            return Err(BotError::StreamHttpError { status: code, message });
        }

        tracing::info!("📡 Stream connected");
        listener.on_connect();

        let mut buffer: Vec<u8> = Vec::new();
        loop {
            let chunk = match tokio::time::timeout(self.stall_timeout, response.chunk()).await {
                Ok(chunk) => chunk?,
                Err(_) => {
                    if listener.on_timeout() == StreamControl::Stop {
                        return Ok(StreamEnd::Stopped);
                    }
                    return Err(BotError::StreamDisconnected {
                        reason: format!("stalled for {:?}", self.stall_timeout),
                    });
                }
            };

            let Some(bytes) = chunk else {
                tracing::debug!("Stream body ended");
                return Ok(StreamEnd::Disconnected);
            };
            buffer.extend_from_slice(&bytes);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match Self::dispatch_line(line, request, listener) {
                    Dispatch::Continue => {}
                    Dispatch::Stop => return Ok(StreamEnd::Stopped),
                    Dispatch::Disconnect(reason) => {
                        return Err(BotError::StreamDisconnected { reason });
                    }
                }
            }
        }
    }
}
