//! W3C WebDriver 協定客戶端 (geckodriver / chromedriver / Selenium)。
//! 所有元素定位都轉成 CSS selector。

use crate::config::BrowserKind;
use crate::domain::ports::{BrowserDriver, BrowserSession, ElementHandle, Locator};
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;

/// W3C 規定的元素識別鍵
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
/// Enter 鍵
const ENTER_KEY: &str = "\u{E007}";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct WebDriverClient {
    http: Client,
    base_url: String,
    browser: BrowserKind,
}

impl WebDriverClient {
    pub fn new(base_url: impl Into<String>, browser: BrowserKind) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            browser,
        })
    }

    fn capabilities(&self) -> Value {
        let always_match = match self.browser {
            BrowserKind::Firefox => json!({
                "browserName": "firefox",
                "moz:firefoxOptions": { "args": ["-headless"] }
            }),
            BrowserKind::Chrome => json!({
                "browserName": "chrome",
                "goog:chromeOptions": { "args": ["--headless=new", "--start-maximized"] }
            }),
        };
        json!({ "capabilities": { "alwaysMatch": always_match } })
    }
}

/// 送出一個 WebDriver 指令並取出 `value`
async fn execute(
    http: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
    command: &str,
) -> Result<Value> {
    let mut request = http.request(method.clone(), url);
    if method == Method::POST {
        request = request.json(&body.unwrap_or_else(|| json!({})));
    }

    let response = request.send().await?;
    let status = response.status();
    let payload: Value = response.json().await.unwrap_or(Value::Null);
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let message = value.get("message").and_then(Value::as_str).unwrap_or("");
        return Err(BotError::WebDriverError {
            command: command.to_string(),
            message: format!("{}: {}", error, message),
        });
    }
    Ok(value)
}

/// 這兩種錯誤代表元素還沒準備好，輪詢時繼續等
fn is_not_ready(error: &BotError) -> bool {
    match error {
        BotError::WebDriverError { message, .. } => {
            message.starts_with("no such element") || message.starts_with("stale element reference")
        }
        _ => false,
    }
}

#[async_trait]
impl BrowserDriver for WebDriverClient {
    async fn start_session(&self) -> Result<Box<dyn BrowserSession>> {
        let value = execute(
            &self.http,
            Method::POST,
            &format!("{}/session", self.base_url),
            Some(self.capabilities()),
            "new session",
        )
        .await?;

        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BotError::WebDriverError {
                command: "new session".to_string(),
                message: "response did not contain a sessionId".to_string(),
            })?
            .to_string();

        tracing::debug!("🌐 Started {:?} session {}", self.browser, id);
        let session = WebDriverSession {
            http: self.http.clone(),
            session_url: format!("{}/session/{}", self.base_url, id),
            id,
            closed: false,
        };

        if let Err(e) = execute(
            &session.http,
            Method::POST,
            &session.url("/window/maximize"),
            None,
            "maximize window",
        )
        .await
        {
            tracing::debug!("Window maximize not supported: {}", e);
        }

        Ok(Box::new(session))
    }
}

pub struct WebDriverSession {
    http: Client,
    session_url: String,
    id: String,
    closed: bool,
}

impl WebDriverSession {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.session_url, path)
    }

    fn element_url(&self, element: &ElementHandle, path: &str) -> String {
        format!("{}/element/{}{}", self.session_url, element.0, path)
    }

    async fn find_displayed(&self, locator: &Locator) -> Result<Option<ElementHandle>> {
        let found = execute(
            &self.http,
            Method::POST,
            &self.url("/element"),
            Some(json!({ "using": "css selector", "value": locator.to_css() })),
            "find element",
        )
        .await;

        let value = match found {
            Ok(value) => value,
            Err(e) if is_not_ready(&e) => return Ok(None),
            Err(e) => return Err(e),
        };

        let element = value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementHandle(id.to_string()))
            .ok_or_else(|| BotError::WebDriverError {
                command: "find element".to_string(),
                message: format!("unexpected element reference: {}", value),
            })?;

        let displayed = execute(
            &self.http,
            Method::GET,
            &self.element_url(&element, "/displayed"),
            None,
            "is displayed",
        )
        .await;

        match displayed {
            Ok(Value::Bool(true)) => Ok(Some(element)),
            Ok(_) => Ok(None),
            Err(e) if is_not_ready(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// DELETE 成功後才標記為已關閉，失敗時 drop 仍會警告
    async fn delete(&mut self) -> Result<()> {
        execute(&self.http, Method::DELETE, &self.session_url, None, "delete session").await?;
        self.closed = true;
        tracing::debug!("Closed browser session {}", self.id);
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        execute(
            &self.http,
            Method::POST,
            &self.url("/url"),
            Some(json!({ "url": url })),
            "navigate",
        )
        .await?;
        Ok(())
    }

    async fn wait_for_visible(&mut self, locator: &Locator, timeout: Duration) -> Result<ElementHandle> {
        let deadline = Instant::now() + timeout;

        // 至少嘗試一次，即使 timeout 為零
        loop {
            if let Some(element) = self.find_displayed(locator).await? {
                return Ok(element);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(BotError::ElementTimeout {
                    locator: locator.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        execute(
            &self.http,
            Method::POST,
            &self.element_url(element, "/click"),
            None,
            "click",
        )
        .await?;
        Ok(())
    }

    async fn send_keys(&mut self, element: &ElementHandle, text: &str, submit: bool) -> Result<()> {
        let mut keys = text.to_string();
        if submit {
            keys.push_str(ENTER_KEY);
        }
        execute(
            &self.http,
            Method::POST,
            &self.element_url(element, "/value"),
            Some(json!({ "text": keys })),
            "send keys",
        )
        .await?;
        Ok(())
    }

    async fn read_text(&mut self, element: &ElementHandle) -> Result<String> {
        let value = execute(
            &self.http,
            Method::GET,
            &self.element_url(element, "/text"),
            None,
            "get text",
        )
        .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut session = self;
        session.delete().await
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!("⚠️ Browser session {} dropped without being closed", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn session_at(base_url: &str) -> WebDriverSession {
        WebDriverSession {
            http: Client::new(),
            session_url: format!("{}/session/abc", base_url),
            id: "abc".to_string(),
            closed: false,
        }
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_session_open() {
        let server = MockServer::start_async().await;
        let delete = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/session/abc");
                then.status(500).json_body(serde_json::json!({
                    "value": {"error": "unknown error", "message": "browser crashed"}
                }));
            })
            .await;

        let mut session = session_at(&server.base_url());
        assert!(session.delete().await.is_err());
        assert!(!session.closed);
        delete.assert_async().await;

        session.closed = true;
    }

    #[tokio::test]
    async fn test_successful_delete_marks_session_closed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/session/abc");
                then.status(200).json_body(serde_json::json!({"value": null}));
            })
            .await;

        let mut session = session_at(&server.base_url());
        session.delete().await.unwrap();
        assert!(session.closed);
    }

    #[test]
    fn test_capabilities_per_browser() {
        let firefox = WebDriverClient::new("http://localhost:4444/", BrowserKind::Firefox).unwrap();
        assert_eq!(firefox.base_url, "http://localhost:4444");
        assert_eq!(
            firefox.capabilities()["capabilities"]["alwaysMatch"]["moz:firefoxOptions"]["args"][0],
            "-headless"
        );

        let chrome = WebDriverClient::new("http://localhost:9515", BrowserKind::Chrome).unwrap();
        let args = &chrome.capabilities()["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"];
        assert_eq!(args[0], "--headless=new");
    }

    #[test]
    fn test_not_ready_errors() {
        let missing = BotError::WebDriverError {
            command: "find element".to_string(),
            message: "no such element: Unable to locate".to_string(),
        };
        let crashed = BotError::WebDriverError {
            command: "find element".to_string(),
            message: "invalid session id: gone".to_string(),
        };
        assert!(is_not_ready(&missing));
        assert!(!is_not_ready(&crashed));
    }
}
