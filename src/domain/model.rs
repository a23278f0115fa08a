use crate::utils::error::{BotError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// 零售商的商品編號，以子字串比對 URL
    pub id: String,
    pub name: String,
    pub category: String,
    /// 目標價格上限
    pub price: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Result<Self> {
        let mut seen = HashSet::new();
        for product in &products {
            if product.id.trim().is_empty() {
                return Err(BotError::InvalidConfigValueError {
                    field: "products.id".to_string(),
                    value: product.id.clone(),
                    reason: "Product id cannot be empty".to_string(),
                });
            }
            if !seen.insert(product.id.as_str()) {
                return Err(BotError::InvalidConfigValueError {
                    field: "products.id".to_string(),
                    value: product.id.clone(),
                    reason: "Duplicate product id".to_string(),
                });
            }
            if product.price.is_sign_negative() {
                return Err(BotError::InvalidConfigValueError {
                    field: format!("products.{}.price", product.id),
                    value: product.price.to_string(),
                    reason: "Ceiling price cannot be negative".to_string(),
                });
            }
        }
        Ok(Self { products })
    }

    /// 第一個 id 出現在 URL 內的商品
    pub fn find_in(&self, url: &str) -> Option<&Product> {
        self.products.iter().find(|p| url.contains(p.id.as_str()))
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// 串流送來的一則貼文
#[derive(Debug, Clone, PartialEq)]
pub struct PostEvent {
    pub author_id: String,
    pub text: String,
    pub urls: Vec<String>,
    pub extended_urls: Vec<String>,
    pub truncated: bool,
    /// 原始 JSON，稽核日誌逐字寫入
    pub raw: String,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    full_text: Option<String>,
    #[serde(default)]
    truncated: bool,
    user: UserPayload,
    #[serde(default)]
    entities: EntitiesPayload,
    #[serde(default)]
    extended_tweet: Option<ExtendedPayload>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id_str: String,
}

#[derive(Debug, Default, Deserialize)]
struct EntitiesPayload {
    #[serde(default)]
    urls: Vec<UrlPayload>,
}

#[derive(Debug, Deserialize)]
struct UrlPayload {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    expanded_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtendedPayload {
    #[serde(default)]
    full_text: Option<String>,
    #[serde(default)]
    entities: EntitiesPayload,
}

impl EntitiesPayload {
    fn expanded(self) -> Vec<String> {
        self.urls
            .into_iter()
            .filter_map(|u| u.expanded_url.or(u.url))
            .collect()
    }
}

impl PostEvent {
    pub fn from_json(raw: &str) -> Result<Self> {
        let payload: StatusPayload = serde_json::from_str(raw)?;

        let (extended_text, extended_urls) = match payload.extended_tweet {
            Some(ext) => (ext.full_text, ext.entities.expanded()),
            None => (None, Vec::new()),
        };
        let text = extended_text
            .or(payload.full_text)
            .or(payload.text)
            .unwrap_or_default();

        Ok(Self {
            author_id: payload.user.id_str,
            text,
            urls: payload.entities.expanded(),
            extended_urls,
            truncated: payload.truncated,
            raw: raw.to_string(),
        })
    }

    /// 被截斷的貼文只看 extended 欄位
    pub fn effective_urls(&self) -> &[String] {
        if self.truncated {
            &self.extended_urls
        } else {
            &self.urls
        }
    }
}

/// 一次購買流程的結果
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    Unavailable,
    PriceTooHigh { price: Decimal, limit: Decimal },
    Preempted,
    Completed { product_id: String, price: Decimal },
}

impl PurchaseOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PurchaseOutcome::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(id: &str, price: Decimal) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            category: "GPU".to_string(),
            price,
        }
    }

    #[test]
    fn test_catalog_rejects_duplicates_and_negative_prices() {
        assert!(Catalog::new(vec![product("A1", dec!(10)), product("A1", dec!(20))]).is_err());
        assert!(Catalog::new(vec![product("A1", dec!(-1))]).is_err());
        assert!(Catalog::new(vec![product("  ", dec!(1))]).is_err());
        assert!(Catalog::new(vec![product("A1", dec!(0)), product("B2", dec!(5))]).is_ok());
    }

    #[test]
    fn test_catalog_first_match_wins() {
        let catalog =
            Catalog::new(vec![product("B08H", dec!(10)), product("B08H95Y452", dec!(20))]).unwrap();
        let found = catalog
            .find_in("https://www.amazon.co.uk/dp/B08H95Y452")
            .unwrap();
        assert_eq!(found.id, "B08H");
        assert!(catalog.find_in("https://www.amazon.co.uk/dp/Z999").is_none());
    }

    #[test]
    fn test_post_event_from_status_json() {
        let raw = r#"{
            "text": "PS5 in stock",
            "truncated": true,
            "user": {"id_str": "1320083775934631937"},
            "entities": {"urls": [{"url": "https://t.co/a", "expanded_url": "https://primary.example/1"}]},
            "extended_tweet": {
                "full_text": "PS5 in stock at Amazon UK",
                "entities": {"urls": [{"url": "https://t.co/b", "expanded_url": "https://www.amazon.co.uk/dp/B08H95Y452"}]}
            }
        }"#;
        let event = PostEvent::from_json(raw).unwrap();

        assert_eq!(event.author_id, "1320083775934631937");
        assert_eq!(event.text, "PS5 in stock at Amazon UK");
        assert!(event.truncated);
        assert_eq!(event.urls, vec!["https://primary.example/1"]);
        assert_eq!(
            event.effective_urls(),
            &["https://www.amazon.co.uk/dp/B08H95Y452".to_string()]
        );
        assert_eq!(event.raw, raw);
    }

    #[test]
    fn test_post_event_without_user_is_rejected() {
        assert!(PostEvent::from_json(r#"{"limit": {"track": 3}}"#).is_err());
    }
}
