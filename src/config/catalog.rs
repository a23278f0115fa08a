use crate::domain::model::{Catalog, Product};
use crate::domain::ports::Locator;
use crate::utils::error::{BotError, Result};
use crate::utils::validation::{self, Validate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 內建的商品清單，未設定 CATALOG_PATH 時使用
pub const DEFAULT_CATALOG: &str = include_str!("../../catalog.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub retailer: RetailerConfig,
    #[serde(default)]
    pub purchase: PurchaseSettings,
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetailerConfig {
    pub name: String,
    /// 零售商的國家網域，例如 amazon.co.uk
    pub domain: String,
    pub aggregator_domain: Option<String>,
    /// 聚合站連結必須帶的國家標記，例如 tld=.co.uk
    pub country_marker: Option<String>,
    /// 含 `{id}` 的商品頁模板
    pub product_url: String,
    #[serde(default)]
    pub selectors: Selectors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub price: Locator,
    pub cookie_accept: Locator,
    pub buy_now: Locator,
    pub email: Locator,
    pub password: Locator,
    pub place_order: Locator,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            price: Locator::id("priceblock_ourprice"),
            cookie_accept: Locator::name("accept"),
            buy_now: Locator::name("submit.buy-now"),
            email: Locator::name("email"),
            password: Locator::id("ap_password"),
            place_order: Locator::id("submitOrderButtonId"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PurchaseSettings {
    /// 運費等額外成本的容許值，加在商品上限價之上
    pub max_additional_cost: Decimal,
    pub max_price_attempts: u32,
    pub price_wait_secs: u64,
    pub cookie_wait_secs: u64,
    pub buy_wait_secs: u64,
    pub login_field_delay_secs: u64,
    pub confirm_settle_secs: u64,
}

impl Default for PurchaseSettings {
    fn default() -> Self {
        Self {
            max_additional_cost: Decimal::from(50),
            max_price_attempts: 20,
            price_wait_secs: 3,
            cookie_wait_secs: 20,
            buy_wait_secs: 20,
            login_field_delay_secs: 2,
            confirm_settle_secs: 20,
        }
    }
}

impl PurchaseSettings {
    pub fn price_wait(&self) -> Duration {
        Duration::from_secs(self.price_wait_secs)
    }

    pub fn cookie_wait(&self) -> Duration {
        Duration::from_secs(self.cookie_wait_secs)
    }

    pub fn buy_wait(&self) -> Duration {
        Duration::from_secs(self.buy_wait_secs)
    }

    pub fn login_field_delay(&self) -> Duration {
        Duration::from_secs(self.login_field_delay_secs)
    }

    pub fn confirm_settle(&self) -> Duration {
        Duration::from_secs(self.confirm_settle_secs)
    }
}

impl RetailerConfig {
    pub fn product_url(&self, product_id: &str) -> String {
        self.product_url.replace("{id}", product_id)
    }
}

impl CatalogFile {
    /// 從 TOML 檔案載入商品清單
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BotError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(DEFAULT_CATALOG)
    }

    /// 替換環境變數 (例如 ${MAX_COST})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| BotError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn catalog(&self) -> Result<Catalog> {
        Catalog::new(self.products.clone())
    }
}

impl Validate for CatalogFile {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("retailer.domain", &self.retailer.domain)?;
        validation::validate_template("retailer.product_url", &self.retailer.product_url, "{id}")?;

        if self.retailer.aggregator_domain.is_some() && self.retailer.country_marker.is_none() {
            return Err(BotError::InvalidConfigValueError {
                field: "retailer.country_marker".to_string(),
                value: String::new(),
                reason: "An aggregator domain needs a country marker".to_string(),
            });
        }

        validation::validate_positive_number(
            "purchase.max_price_attempts",
            self.purchase.max_price_attempts as usize,
            1,
        )?;

        validation::validate_non_negative(
            "purchase.max_additional_cost",
            self.purchase.max_additional_cost,
        )?;

        if self.products.is_empty() {
            return Err(BotError::ConfigError {
                message: "Catalog contains no products".to_string(),
            });
        }

        self.catalog().map(|_| ())
    }
}
