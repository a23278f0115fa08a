use crate::core::queue::EventSender;
use crate::domain::model::PostEvent;
use crate::domain::ports::{StreamControl, StreamListener};
use crate::utils::error::BotError;

/// 把串流送來的貼文丟進佇列，其餘回呼只記錄並繼續
#[derive(Debug, Clone)]
pub struct QueueingListener {
    queue: EventSender,
}

impl QueueingListener {
    pub fn new(queue: EventSender) -> Self {
        Self { queue }
    }
}

impl StreamListener for QueueingListener {
    fn on_connect(&self) {
        tracing::info!("📡 Connected. Streaming posts...");
    }

    fn on_timeout(&self) -> StreamControl {
        tracing::warn!("⚠️ Timeout... Continuing...");
        StreamControl::Continue
    }

    fn on_rate_limited(&self, status: u16) -> StreamControl {
        tracing::error!(
            "❌ Stream returned {}. Reconnecting after backoff...",
            status
        );
        StreamControl::Continue
    }

    fn on_error(&self, error: &BotError) -> StreamControl {
        tracing::error!("❌ Stream error: {}", error);
        StreamControl::Continue
    }

    fn on_post(&self, event: PostEvent) -> StreamControl {
        tracing::debug!("📨 Post from {}: {}", event.author_id, event.text);
        match self.queue.push(event) {
            Ok(()) => StreamControl::Continue,
            Err(_) => {
                tracing::info!("Event queue closed, stopping stream");
                StreamControl::Stop
            }
        }
    }
}
