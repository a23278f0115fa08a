//! 購買流程狀態機：
//! `Checking → {Unavailable, PriceTooHigh, Buying} → LoggingIn → Confirming → Done`
//!
//! Buying 之後的任何錯誤都直接往上傳，不在這裡重試；一筆訂單做到一半時
//! 寧可讓 worker 失敗、由外部重啟，也不要默默吞掉。

use crate::config::{PurchaseSettings, RetailerConfig, RetailerCredentials};
use crate::core::price::{PriceCheck, PriceChecker};
use crate::domain::model::{Product, PurchaseOutcome};
use crate::domain::ports::{BrowserDriver, BrowserSession};
use crate::utils::error::Result;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseState {
    Checking,
    Unavailable,
    PriceTooHigh,
    Preempted,
    Buying,
    LoggingIn,
    Confirming,
    Done,
}

impl fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PurchaseState::Checking => "checking",
            PurchaseState::Unavailable => "unavailable",
            PurchaseState::PriceTooHigh => "price-too-high",
            PurchaseState::Preempted => "preempted",
            PurchaseState::Buying => "buying",
            PurchaseState::LoggingIn => "logging-in",
            PurchaseState::Confirming => "confirming",
            PurchaseState::Done => "done",
        };
        f.write_str(name)
    }
}

/// 單次購買嘗試的暫存狀態，只屬於建立它的那次 `run`
#[derive(Debug, Clone)]
pub struct PurchaseAttempt {
    pub product_id: String,
    pub observed_price: Option<Decimal>,
    pub price_attempts: u32,
    pub states: Vec<PurchaseState>,
}

impl PurchaseAttempt {
    fn new(product_id: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            observed_price: None,
            price_attempts: 0,
            states: Vec::new(),
        }
    }

    fn enter(&mut self, state: PurchaseState) {
        tracing::debug!("{}: entering state {}", self.product_id, state);
        self.states.push(state);
    }

    pub fn state(&self) -> Option<PurchaseState> {
        self.states.last().copied()
    }
}

#[derive(Debug, Clone)]
pub struct PurchaseReport {
    pub outcome: PurchaseOutcome,
    pub attempt: PurchaseAttempt,
}

/// 整個行程只允許一次結帳。成功後閂住，之後的嘗試都會被搶先
#[derive(Debug, Clone, Default)]
pub struct CheckoutGate {
    completed: Arc<Mutex<bool>>,
}

pub struct CheckoutPermit {
    guard: OwnedMutexGuard<bool>,
}

impl CheckoutGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 等待前一筆結帳結束；已有成功的結帳時回傳 None
    pub async fn acquire(&self) -> Option<CheckoutPermit> {
        let guard = self.completed.clone().lock_owned().await;
        if *guard {
            None
        } else {
            Some(CheckoutPermit { guard })
        }
    }

    pub async fn is_completed(&self) -> bool {
        *self.completed.lock().await
    }
}

impl CheckoutPermit {
    fn complete(mut self) {
        *self.guard = true;
    }
}

pub struct PurchaseSequencer {
    driver: Arc<dyn BrowserDriver>,
    price_checker: PriceChecker,
    retailer: RetailerConfig,
    settings: PurchaseSettings,
    credentials: RetailerCredentials,
    gate: CheckoutGate,
}

impl PurchaseSequencer {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        retailer: RetailerConfig,
        settings: PurchaseSettings,
        credentials: RetailerCredentials,
        gate: CheckoutGate,
    ) -> Self {
        let price_checker = PriceChecker::new(
            retailer.selectors.price.clone(),
            settings.max_price_attempts,
            settings.price_wait(),
        );
        Self {
            driver,
            price_checker,
            retailer,
            settings,
            credentials,
            gate,
        }
    }

    pub fn price_limit(&self, product: &Product) -> Decimal {
        product.price + self.settings.max_additional_cost
    }

    pub async fn run(&self, product: &Product) -> Result<PurchaseReport> {
        let mut attempt = PurchaseAttempt::new(&product.id);
        tracing::info!("🚀 Starting purchase attempt for {} ({})", product.name, product.id);

        attempt.enter(PurchaseState::Checking);
        let session = self.driver.start_session().await?;
        let url = self.retailer.product_url(&product.id);

        let (price, mut session) = match self.price_checker.check(session, &url).await? {
            PriceCheck::Unavailable { attempts } => {
                attempt.price_attempts = attempts;
                attempt.enter(PurchaseState::Unavailable);
                tracing::info!("No dice this time for {}", product.id);
                return Ok(PurchaseReport {
                    outcome: PurchaseOutcome::Unavailable,
                    attempt,
                });
            }
            PriceCheck::Found {
                price,
                session,
                attempts,
            } => {
                attempt.price_attempts = attempts;
                attempt.observed_price = Some(price);
                (price, session)
            }
        };

        let limit = self.price_limit(product);
        if price > limit {
            attempt.enter(PurchaseState::PriceTooHigh);
            tracing::info!("💸 Too expensive: {} > {} for {}", price, limit, product.id);
            close_quietly(session, &product.id).await;
            return Ok(PurchaseReport {
                outcome: PurchaseOutcome::PriceTooHigh { price, limit },
                attempt,
            });
        }

        let Some(permit) = self.gate.acquire().await else {
            attempt.enter(PurchaseState::Preempted);
            tracing::info!("Another purchase already completed, abandoning {}", product.id);
            close_quietly(session, &product.id).await;
            return Ok(PurchaseReport {
                outcome: PurchaseOutcome::Preempted,
                attempt,
            });
        };

        let checkout = self.checkout(session.as_mut(), &mut attempt).await;
        if let Err(e) = checkout {
            tracing::error!(
                "❌ Purchase of {} failed in state {:?}: {}",
                product.id,
                attempt.state(),
                e
            );
            close_quietly(session, &product.id).await;
            return Err(e);
        }

        permit.complete();
        attempt.enter(PurchaseState::Done);
        tracing::info!("✅ Purchase appears successful. Check the {} account.", self.retailer.name);
        close_quietly(session, &product.id).await;

        Ok(PurchaseReport {
            outcome: PurchaseOutcome::Completed {
                product_id: product.id.clone(),
                price,
            },
            attempt,
        })
    }

    async fn checkout(
        &self,
        session: &mut dyn BrowserSession,
        attempt: &mut PurchaseAttempt,
    ) -> Result<()> {
        let selectors = &self.retailer.selectors;

        attempt.enter(PurchaseState::Buying);
        tracing::info!("Attempting to click 'Buy Now'");
        if let Some(accept) = session
            .try_acquire(&selectors.cookie_accept, self.settings.cookie_wait())
            .await
        {
            if let Err(e) = session.click(&accept).await {
                tracing::debug!("Cookie prompt click ignored: {}", e);
            }
        }
        let buy_now = session
            .wait_for_visible(&selectors.buy_now, self.settings.buy_wait())
            .await?;
        session.click(&buy_now).await?;

        attempt.enter(PurchaseState::LoggingIn);
        tracing::info!("Logging in");
        let email = session
            .wait_for_visible(&selectors.email, self.settings.buy_wait())
            .await?;
        session
            .send_keys(&email, &self.credentials.username, true)
            .await?;
        tokio::time::sleep(self.settings.login_field_delay()).await;
        let password = session
            .wait_for_visible(&selectors.password, self.settings.buy_wait())
            .await?;
        session
            .send_keys(&password, &self.credentials.password, true)
            .await?;

        attempt.enter(PurchaseState::Confirming);
        tracing::info!("Submitting the order");
        let place_order = session
            .wait_for_visible(&selectors.place_order, self.settings.buy_wait())
            .await?;
        session.click(&place_order).await?;
        tokio::time::sleep(self.settings.confirm_settle()).await;

        Ok(())
    }
}

async fn close_quietly(session: Box<dyn BrowserSession>, product_id: &str) {
    tracing::info!("Closing browser for {}", product_id);
    if let Err(e) = session.close().await {
        tracing::warn!("⚠️ Failed to close browser session for {}: {}", product_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gate_latches_after_completion() {
        let gate = CheckoutGate::new();
        let permit = gate.acquire().await.unwrap();
        permit.complete();
        assert!(gate.is_completed().await);
        assert!(gate.acquire().await.is_none());
    }

    #[tokio::test]
    async fn test_gate_released_without_completion() {
        let gate = CheckoutGate::new();
        let permit = gate.acquire().await.unwrap();
        drop(permit);
        assert!(!gate.is_completed().await);
        assert!(gate.acquire().await.is_some());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PurchaseState::PriceTooHigh.to_string(), "price-too-high");
        assert_eq!(PurchaseState::Done.to_string(), "done");
    }
}
