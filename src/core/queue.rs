//! 貼文事件佇列：單一生產者 (串流監聽器)、多個消費者 (worker)。
//!
//! 底層是 tokio 的無界 mpsc，接收端由所有 worker 共用，因此每個事件只會被
//! 一個 worker 取走。佇列另外追蹤「已送出但尚未處理完」的事件數，
//! 讓呼叫端可以等待佇列追上進度。

use crate::domain::model::PostEvent;
use crate::utils::error::{BotError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};

#[derive(Debug, Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

impl Pending {
    fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

pub struct EventQueue;

impl EventQueue {
    pub fn new() -> (EventSender, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Pending::default());
        (
            EventSender {
                tx,
                pending: pending.clone(),
            },
            EventReceiver {
                rx: Arc::new(Mutex::new(rx)),
                pending,
            },
        )
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<PostEvent>,
    pending: Arc<Pending>,
}

impl EventSender {
    /// 不阻塞；只有在所有接收端都已關閉時才會失敗
    pub fn push(&self, event: PostEvent) -> Result<()> {
        self.pending.increment();
        self.tx.send(event).map_err(|_| {
            self.pending.decrement();
            BotError::QueueClosed
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }

    /// 等到所有已送出的事件都被處理完
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.pending.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventReceiver {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<PostEvent>>>,
    pending: Arc<Pending>,
}

impl EventReceiver {
    /// 阻塞直到有事件；所有發送端都釋放後回傳 None。
    /// 所有接收端都釋放後，發送端的 push 會回傳 QueueClosed
    pub async fn recv(&self) -> Option<Delivery> {
        let event = self.rx.lock().await.recv().await?;
        Some(Delivery {
            event,
            pending: self.pending.clone(),
        })
    }
}

/// 取出的事件；drop 時視為處理完畢
#[derive(Debug)]
pub struct Delivery {
    event: PostEvent,
    pending: Arc<Pending>,
}

impl Delivery {
    pub fn event(&self) -> &PostEvent {
        &self.event
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.pending.decrement();
    }
}
