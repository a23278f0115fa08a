use crate::config::RetailerConfig;
use crate::domain::model::{Catalog, PostEvent, Product};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// 單一 URL 的分類結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlVerdict {
    Accepted,
    /// 只有網域根目錄，沒有商品路徑
    NotProductLink,
    /// 不是零售商網域，也不是帶國家標記的聚合站
    ForeignDomain,
}

/// 整則貼文的過濾結果
#[derive(Debug, Clone, PartialEq)]
pub enum FilterDecision {
    UntrackedAuthor,
    NoMatch,
    Matched { product: Product, url: String },
}

/// 網址拆成比對用的三段：去掉 www. 的小寫主機、去掉結尾 / 的小寫路徑、query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub host: String,
    pub path: String,
    pub query: Option<String>,
}

impl UrlParts {
    /// 沒有 scheme 的網址 (例如設定檔裡的 `retailer.example/co`) 當成 https
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let parsed = match Url::parse(trimmed) {
            Ok(parsed) => parsed,
            Err(_) => Url::parse(&format!("https://{}", trimmed)).ok()?,
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }

        let host = parsed.host_str()?.to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        let path = parsed.path().trim_end_matches('/').to_lowercase();
        let query = parsed.query().map(str::to_lowercase);
        Some(Self { host, path, query })
    }

    /// 主機相同，或是它的子網域
    fn on_host(&self, host: &str) -> bool {
        self.host == host
            || self
                .host
                .strip_suffix(host)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    /// 路徑等於 prefix 或在它底下；`/co` 不會吃到 `/cox`
    fn under_path(&self, prefix: &str) -> bool {
        prefix.is_empty()
            || self
                .path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

#[derive(Debug, Clone)]
pub struct LinkFilter {
    tracked_authors: Arc<HashSet<String>>,
    retailer_label: String,
    retailer: Option<UrlParts>,
    aggregator_host: Option<String>,
    country_marker: Option<String>,
    catalog: Arc<Catalog>,
}

impl LinkFilter {
    pub fn new(tracked_authors: &[String], retailer: &RetailerConfig, catalog: Arc<Catalog>) -> Self {
        let parsed = UrlParts::parse(&retailer.domain);
        if parsed.is_none() {
            tracing::warn!("⚠️ Retailer domain {:?} is not a valid host, no link will match", retailer.domain);
        }
        Self {
            tracked_authors: Arc::new(tracked_authors.iter().cloned().collect()),
            retailer_label: retailer.domain.trim().to_lowercase(),
            retailer: parsed,
            aggregator_host: retailer
                .aggregator_domain
                .as_deref()
                .and_then(UrlParts::parse)
                .map(|parts| parts.host),
            country_marker: retailer.country_marker.as_ref().map(|m| m.to_lowercase()),
            catalog,
        }
    }

    pub fn is_tracked(&self, event: &PostEvent) -> bool {
        self.tracked_authors.contains(&event.author_id)
    }

    /// 只看主機與路徑；網址其他地方出現零售商名稱不算數
    pub fn classify(&self, url: &str) -> UrlVerdict {
        let Some(parts) = UrlParts::parse(url) else {
            return UrlVerdict::ForeignDomain;
        };

        if let Some(retailer) = &self.retailer {
            if parts.on_host(&retailer.host) && parts.under_path(&retailer.path) {
                if parts.path == retailer.path && parts.query.is_none() {
                    return UrlVerdict::NotProductLink;
                }
                return UrlVerdict::Accepted;
            }
        }

        if let (Some(aggregator), Some(marker)) = (&self.aggregator_host, &self.country_marker) {
            let marked = parts.query.as_deref().is_some_and(|q| q.contains(marker.as_str()));
            if parts.on_host(aggregator) && marked {
                return UrlVerdict::Accepted;
            }
        }

        UrlVerdict::ForeignDomain
    }

    /// 依序檢查貼文內的 URL，第一個命中商品清單的就回傳
    pub fn evaluate(&self, event: &PostEvent) -> FilterDecision {
        if !self.is_tracked(event) {
            tracing::debug!("Ignoring post from untracked author {}", event.author_id);
            return FilterDecision::UntrackedAuthor;
        }

        if event.truncated {
            tracing::debug!("Post was truncated, using extended URLs");
        }

        for url in event.effective_urls() {
            tracing::info!("🔗 URL: {}", url);

            match self.classify(url) {
                UrlVerdict::NotProductLink => {
                    tracing::info!("Not a product link: {}", url);
                    continue;
                }
                UrlVerdict::ForeignDomain => {
                    tracing::info!("Not a {} link: {}", self.retailer_label, url);
                    continue;
                }
                UrlVerdict::Accepted => {}
            }

            if let Some(product) = self.catalog.find_in(url) {
                tracing::info!("🎯 {} - {} found!", product.id, product.category);
                return FilterDecision::Matched {
                    product: product.clone(),
                    url: url.clone(),
                };
            }
            tracing::info!("Product is not in the buyable product list: {}", url);
        }

        FilterDecision::NoMatch
    }
}
