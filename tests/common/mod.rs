#![allow(dead_code)]

use async_trait::async_trait;
use restock_bot::config::{PurchaseSettings, RetailerConfig, RetailerCredentials, Selectors};
use restock_bot::domain::model::{Catalog, PostEvent, Product};
use restock_bot::domain::ports::{
    BrowserDriver, BrowserSession, ElementHandle, FilterRequest, Locator, StreamClient,
    StreamControl, StreamEnd, StreamListener,
};
use restock_bot::{BotError, Result};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TRACKED: &str = "1320083775934631937";
pub const UNTRACKED: &str = "42";

pub fn retailer() -> RetailerConfig {
    RetailerConfig {
        name: "Retailer Example".to_string(),
        domain: "retailer.example".to_string(),
        aggregator_domain: Some("alerts.example".to_string()),
        country_marker: Some("tld=.example".to_string()),
        product_url: "https://retailer.example/co/{id}".to_string(),
        selectors: Selectors::default(),
    }
}

/// 不等待的購買設定
pub fn instant_settings() -> PurchaseSettings {
    PurchaseSettings {
        max_additional_cost: Decimal::from(50),
        max_price_attempts: 20,
        price_wait_secs: 0,
        cookie_wait_secs: 0,
        buy_wait_secs: 0,
        login_field_delay_secs: 0,
        confirm_settle_secs: 0,
    }
}

pub fn credentials() -> RetailerCredentials {
    RetailerCredentials {
        username: "buyer@example.com".to_string(),
        password: "hunter2".to_string(),
    }
}

pub fn product(id: &str, price: Decimal) -> Product {
    Product {
        id: id.to_string(),
        name: format!("Product {}", id),
        category: "Console".to_string(),
        price,
    }
}

pub fn catalog(products: Vec<Product>) -> Arc<Catalog> {
    Arc::new(Catalog::new(products).unwrap())
}

pub fn post_json(author: &str, urls: &[&str]) -> String {
    let urls: Vec<serde_json::Value> = urls
        .iter()
        .map(|u| serde_json::json!({"url": "https://t.co/x", "expanded_url": u}))
        .collect();
    serde_json::json!({
        "text": "In stock now",
        "truncated": false,
        "user": {"id_str": author},
        "entities": {"urls": urls}
    })
    .to_string()
}

pub fn post(author: &str, urls: &[&str]) -> PostEvent {
    PostEvent::from_json(&post_json(author, urls)).unwrap()
}

/// 假瀏覽器的行為腳本
#[derive(Debug, Clone)]
pub struct BrowserScript {
    pub price: Locator,
    /// 第 n 次讀價格的結果；None 代表逾時，用完後重複最後一筆
    pub price_reads: Vec<Option<String>>,
    /// 永遠不會出現的元素
    pub missing: Vec<Locator>,
}

impl BrowserScript {
    pub fn priced(text: &str) -> Self {
        Self {
            price: Selectors::default().price,
            price_reads: vec![Some(text.to_string())],
            missing: Vec::new(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            price: Selectors::default().price,
            price_reads: Vec::new(),
            missing: Vec::new(),
        }
    }
}

/// 所有 session 共用的操作紀錄
#[derive(Debug, Default)]
pub struct Journal {
    events: Mutex<Vec<String>>,
    price_reads: AtomicUsize,
    sessions: AtomicUsize,
}

impl Journal {
    fn record(&self, entry: String) {
        self.events.lock().unwrap().push(entry);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn price_reads(&self) -> usize {
        self.price_reads.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

pub struct ScriptedDriver {
    script: BrowserScript,
    dead: bool,
    pub journal: Arc<Journal>,
}

impl ScriptedDriver {
    pub fn new(script: BrowserScript) -> Self {
        Self {
            script,
            dead: false,
            journal: Arc::new(Journal::default()),
        }
    }

    /// 開得起來，但之後每個指令 (含 close) 都回 invalid session id
    pub fn with_dead_sessions(script: BrowserScript) -> Self {
        Self {
            dead: true,
            ..Self::new(script)
        }
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn start_session(&self) -> Result<Box<dyn BrowserSession>> {
        self.journal.sessions.fetch_add(1, Ordering::SeqCst);
        self.journal.record("start".to_string());
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            dead: self.dead,
            journal: self.journal.clone(),
        }))
    }
}

pub struct ScriptedSession {
    script: BrowserScript,
    dead: bool,
    journal: Arc<Journal>,
}

impl ScriptedSession {
    fn alive(&self, command: &str) -> Result<()> {
        if self.dead {
            return Err(BotError::WebDriverError {
                command: command.to_string(),
                message: "invalid session id: session deleted".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.journal.record(format!("navigate {}", url));
        self.alive("navigate")
    }

    async fn wait_for_visible(&mut self, locator: &Locator, timeout: Duration) -> Result<ElementHandle> {
        let timed_out = BotError::ElementTimeout {
            locator: locator.to_string(),
            timeout,
        };
        self.alive("find element")?;

        if self.script.missing.contains(locator) {
            self.journal.record(format!("timeout {}", locator));
            return Err(timed_out);
        }

        if *locator == self.script.price {
            let n = self.journal.price_reads.fetch_add(1, Ordering::SeqCst);
            let reads = &self.script.price_reads;
            return match reads.get(n).or(reads.last()).cloned().flatten() {
                Some(text) => Ok(ElementHandle(format!("price|{}", text))),
                None => Err(timed_out),
            };
        }

        Ok(ElementHandle(locator.to_string()))
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        self.journal.record(format!("click {}", element.0));
        Ok(())
    }

    async fn send_keys(&mut self, element: &ElementHandle, text: &str, submit: bool) -> Result<()> {
        self.journal
            .record(format!("keys {} {} submit={}", element.0, text, submit));
        Ok(())
    }

    async fn read_text(&mut self, element: &ElementHandle) -> Result<String> {
        Ok(element
            .0
            .strip_prefix("price|")
            .unwrap_or_default()
            .to_string())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.journal.record("close".to_string());
        self.alive("delete session")
    }
}

/// 一次連線結束的方式
#[derive(Debug, Clone)]
pub enum ConnectionEnd {
    /// 保持連線直到被取消
    Hang,
    Disconnect,
    Stop,
    Fail(u16),
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub posts: Vec<String>,
    pub end: ConnectionEnd,
}

/// 依腳本回放貼文的串流客戶端；腳本用完後保持連線
#[derive(Default)]
pub struct ScriptedStream {
    connections: Mutex<VecDeque<Connection>>,
    calls: AtomicUsize,
}

impl ScriptedStream {
    pub fn new(connections: Vec<Connection>) -> Self {
        Self {
            connections: Mutex::new(connections.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamClient for ScriptedStream {
    async fn filter(&self, _request: &FilterRequest, listener: &dyn StreamListener) -> Result<StreamEnd> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.connections.lock().unwrap().pop_front();
        let connection = next.unwrap_or(Connection {
            posts: Vec::new(),
            end: ConnectionEnd::Hang,
        });

        if let ConnectionEnd::Fail(status) = connection.end {
            return Err(BotError::StreamHttpError {
                status,
                message: "scripted failure".to_string(),
            });
        }

        listener.on_connect();
        for raw in &connection.posts {
            let event = PostEvent::from_json(raw)?;
            if listener.on_post(event) == StreamControl::Stop {
                return Ok(StreamEnd::Stopped);
            }
        }

        match connection.end {
            ConnectionEnd::Hang => std::future::pending::<Result<StreamEnd>>().await,
            ConnectionEnd::Disconnect => Ok(StreamEnd::Disconnected),
            ConnectionEnd::Stop => Ok(StreamEnd::Stopped),
            ConnectionEnd::Fail(_) => unreachable!(),
        }
    }
}
