use crate::domain::ports::{BrowserSession, Locator};
use crate::utils::error::{BotError, Result};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

/// 價格查詢結果。找到價格時把 session 交還給呼叫端，
/// 找不到時 session 已經在這裡關閉
pub enum PriceCheck {
    Found {
        price: Decimal,
        session: Box<dyn BrowserSession>,
        attempts: u32,
    },
    Unavailable {
        attempts: u32,
    },
}

impl std::fmt::Debug for PriceCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceCheck::Found { price, attempts, .. } => f
                .debug_struct("Found")
                .field("price", price)
                .field("attempts", attempts)
                .finish(),
            PriceCheck::Unavailable { attempts } => f
                .debug_struct("Unavailable")
                .field("attempts", attempts)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PriceChecker {
    price_locator: Locator,
    max_attempts: u32,
    wait: Duration,
}

impl PriceChecker {
    pub fn new(price_locator: Locator, max_attempts: u32, wait: Duration) -> Self {
        Self {
            price_locator,
            max_attempts,
            wait,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 快速輪詢：每次失敗立刻重試，不退避
    pub async fn check(&self, mut session: Box<dyn BrowserSession>, url: &str) -> Result<PriceCheck> {
        tracing::info!("Visiting {}", url);

        for attempt in 1..=self.max_attempts {
            tracing::info!(
                "Attempting to retrieve price, attempt {} of {}",
                attempt,
                self.max_attempts
            );

            match self.read_price(session.as_mut(), url).await {
                Ok(price) => {
                    tracing::info!("💰 Price found: {}", price);
                    return Ok(PriceCheck::Found {
                        price,
                        session,
                        attempts: attempt,
                    });
                }
                Err(e) => tracing::info!("Failed to find price: {}", e),
            }
        }

        tracing::info!("Price not found (likely unavailable) - closing browser");
        // 關不掉的 session 不影響「缺貨」這個結果
        if let Err(e) = session.close().await {
            tracing::warn!("⚠️ Failed to close browser session after {}: {}", url, e);
        }
        Ok(PriceCheck::Unavailable {
            attempts: self.max_attempts,
        })
    }

    async fn read_price(&self, session: &mut dyn BrowserSession, url: &str) -> Result<Decimal> {
        session.navigate(url).await?;
        let element = session.wait_for_visible(&self.price_locator, self.wait).await?;
        let text = session.read_text(&element).await?;
        parse_price(&text).ok_or_else(|| BotError::PayloadError {
            message: format!("no price in element text {:?}", text),
        })
    }
}

fn price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+\.\d+").expect("price pattern is a valid regex"))
}

/// 取出文字中的第一個小數，千分位逗號先去掉
pub fn parse_price(text: &str) -> Option<Decimal> {
    let cleaned = text.replace(',', "");
    let found = price_pattern().find(&cleaned)?;
    Decimal::from_str(found.as_str()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("£123.45 "), Some(dec!(123.45)));
        assert_eq!(parse_price("£1,234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_price("Now 99.00 was 129.99"), Some(dec!(99.00)));
        assert_eq!(parse_price("£499"), None);
        assert_eq!(parse_price("Currently unavailable."), None);
    }
}
