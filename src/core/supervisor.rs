//! 串流重連迴圈。網路與限流錯誤無限重試，只有取消或無法恢復的錯誤
//! (認證失敗、請求格式錯誤) 才會結束。

use crate::domain::model::PostEvent;
use crate::domain::ports::{FilterRequest, StreamClient, StreamControl, StreamEnd, StreamListener};
use crate::utils::error::{BotError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// 網路錯誤：線性增加
    pub network_step: Duration,
    pub network_max: Duration,
    /// HTTP 錯誤：指數增加
    pub http_initial: Duration,
    pub http_max: Duration,
    /// 420 / 429：指數增加
    pub rate_limit_initial: Duration,
    pub rate_limit_max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            network_step: Duration::from_millis(250),
            network_max: Duration::from_secs(16),
            http_initial: Duration::from_secs(5),
            http_max: Duration::from_secs(320),
            rate_limit_initial: Duration::from_secs(60),
            rate_limit_max: Duration::from_secs(960),
        }
    }
}

impl ReconnectPolicy {
    /// 測試用：不等待直接重連
    pub fn immediate() -> Self {
        Self {
            network_step: Duration::ZERO,
            network_max: Duration::ZERO,
            http_initial: Duration::ZERO,
            http_max: Duration::ZERO,
            rate_limit_initial: Duration::ZERO,
            rate_limit_max: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct Backoff {
    policy: ReconnectPolicy,
    network: Duration,
    http: Option<Duration>,
    rate_limit: Option<Duration>,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            network: Duration::ZERO,
            http: None,
            rate_limit: None,
        }
    }

    pub fn reset(&mut self) {
        self.network = Duration::ZERO;
        self.http = None;
        self.rate_limit = None;
    }

    pub fn next_delay(&mut self, error: &BotError) -> Duration {
        if error.is_rate_limited() {
            let next = match self.rate_limit {
                None => self.policy.rate_limit_initial,
                Some(prev) => (prev * 2).min(self.policy.rate_limit_max),
            };
            self.rate_limit = Some(next);
            return next;
        }

        if matches!(error, BotError::StreamHttpError { .. }) {
            let next = match self.http {
                None => self.policy.http_initial,
                Some(prev) => (prev * 2).min(self.policy.http_max),
            };
            self.http = Some(next);
            return next;
        }

        self.next_network_delay()
    }

    /// 伺服器正常關閉連線也走線性退避，避免連上就斷時空轉
    pub fn next_network_delay(&mut self) -> Duration {
        self.network = (self.network + self.policy.network_step).min(self.policy.network_max);
        self.network
    }
}

/// 記錄這一次連線是否成功建立過，用來重設退避
struct ConnectTracker<'a> {
    inner: &'a dyn StreamListener,
    connected: AtomicBool,
}

impl StreamListener for ConnectTracker<'_> {
    fn on_connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.inner.on_connect();
    }

    fn on_timeout(&self) -> StreamControl {
        self.inner.on_timeout()
    }

    fn on_rate_limited(&self, status: u16) -> StreamControl {
        self.inner.on_rate_limited(status)
    }

    fn on_error(&self, error: &BotError) -> StreamControl {
        self.inner.on_error(error)
    }

    fn on_limit(&self, undelivered: u64) -> StreamControl {
        self.inner.on_limit(undelivered)
    }

    fn on_warning(&self, notice: &str) -> StreamControl {
        self.inner.on_warning(notice)
    }

    fn on_post(&self, event: PostEvent) -> StreamControl {
        self.inner.on_post(event)
    }
}

pub struct StreamSupervisor {
    client: Arc<dyn StreamClient>,
    request: FilterRequest,
    policy: ReconnectPolicy,
}

impl StreamSupervisor {
    pub fn new(client: Arc<dyn StreamClient>, request: FilterRequest) -> Self {
        Self {
            client,
            request,
            policy: ReconnectPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn run(&self, listener: &dyn StreamListener, cancel: CancellationToken) -> Result<()> {
        let mut backoff = Backoff::new(self.policy.clone());
        let mut connections: u64 = 0;

        tracing::info!(
            "🚀 Following {} accounts on the stream",
            self.request.follow.len()
        );

        loop {
            let tracker = ConnectTracker {
                inner: listener,
                connected: AtomicBool::new(false),
            };
            connections += 1;
            tracing::debug!("Opening stream connection #{}", connections);

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Stream supervisor cancelled");
                    return Ok(());
                }
                result = self.client.filter(&self.request, &tracker) => result,
            };

            if tracker.connected.load(Ordering::SeqCst) {
                backoff.reset();
            }

            let delay = match result {
                Ok(StreamEnd::Stopped) => {
                    tracing::info!("Listener stopped the stream");
                    return Ok(());
                }
                Ok(StreamEnd::Disconnected) => {
                    let delay = backoff.next_network_delay();
                    tracing::warn!("⚠️ Stream disconnected, reconnecting in {:?}", delay);
                    delay
                }
                Err(e) if e.is_transient() => {
                    if !e.is_rate_limited() && listener.on_error(&e) == StreamControl::Stop {
                        return Ok(());
                    }
                    let delay = backoff.next_delay(&e);
                    tracing::error!("❌ ENCOUNTERED ERROR: {} (retrying in {:?})", e, delay);
                    delay
                }
                Err(e) => {
                    listener.on_error(&e);
                    tracing::error!("❌ Unrecoverable stream error: {}", e);
                    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
                    return Err(e);
                }
            };

            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Stream supervisor cancelled during backoff");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
