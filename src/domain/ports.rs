use crate::domain::model::PostEvent;
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 頁面元素定位方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    Id(String),
    Name(String),
    Css(String),
}

impl Locator {
    pub fn id(value: impl Into<String>) -> Self {
        Locator::Id(value.into())
    }

    pub fn name(value: impl Into<String>) -> Self {
        Locator::Name(value.into())
    }

    /// 轉成 CSS selector，WebDriver 只需要這一種策略
    pub fn to_css(&self) -> String {
        match self {
            Locator::Id(id) => format!("[id=\"{}\"]", id.replace('"', "\\\"")),
            Locator::Name(name) => format!("[name=\"{}\"]", name.replace('"', "\\\"")),
            Locator::Css(css) => css.clone(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(v) => write!(f, "id={}", v),
            Locator::Name(v) => write!(f, "name={}", v),
            Locator::Css(v) => write!(f, "css={}", v),
        }
    }
}

/// 瀏覽器端元素的不透明參照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// 啟動一個無頭、最大化的瀏覽器 session
    async fn start_session(&self) -> Result<Box<dyn BrowserSession>>;
}

#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn wait_for_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle>;

    /// 盡力而為的查找，找不到就回傳 None，由呼叫端決定是否繼續
    async fn try_acquire(&mut self, locator: &Locator, timeout: Duration) -> Option<ElementHandle> {
        match self.wait_for_visible(locator, timeout).await {
            Ok(element) => Some(element),
            Err(e) => {
                tracing::debug!("Optional element {} not acquired: {}", locator, e);
                None
            }
        }
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()>;

    async fn send_keys(&mut self, element: &ElementHandle, text: &str, submit: bool) -> Result<()>;

    async fn read_text(&mut self, element: &ElementHandle) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// 串流回呼的指示：繼續或停止
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    Continue,
    Stop,
}

/// 串流客戶端的回呼介面
pub trait StreamListener: Send + Sync {
    fn on_connect(&self);

    fn on_timeout(&self) -> StreamControl;

    /// HTTP 420 / 429
    fn on_rate_limited(&self, status: u16) -> StreamControl;

    fn on_error(&self, error: &BotError) -> StreamControl;

    fn on_limit(&self, undelivered: u64) -> StreamControl {
        tracing::warn!("⚠️ Stream limit notice: {} posts undelivered", undelivered);
        StreamControl::Continue
    }

    fn on_warning(&self, notice: &str) -> StreamControl {
        tracing::warn!("⚠️ Stream warning: {}", notice);
        StreamControl::Continue
    }

    fn on_post(&self, event: PostEvent) -> StreamControl;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRequest {
    pub follow: Vec<String>,
    pub extended: bool,
    pub include_retweets: bool,
    pub stall_warnings: bool,
}

impl FilterRequest {
    pub fn follow(authors: Vec<String>) -> Self {
        Self {
            follow: authors,
            extended: true,
            include_retweets: true,
            stall_warnings: true,
        }
    }
}

/// 一次連線結束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// 伺服器關閉連線，需要重連
    Disconnected,
    /// 監聽器要求停止
    Stopped,
}

#[async_trait]
pub trait StreamClient: Send + Sync {
    /// 建立一次連線並持續派送事件，直到連線結束
    async fn filter(&self, request: &FilterRequest, listener: &dyn StreamListener)
        -> Result<StreamEnd>;
}
