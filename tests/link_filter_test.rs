mod common;

use common::{catalog, post, product, retailer, TRACKED, UNTRACKED};
use restock_bot::core::filter::{FilterDecision, LinkFilter, UrlVerdict};
use restock_bot::domain::model::PostEvent;
use rust_decimal_macros::dec;

fn filter() -> LinkFilter {
    LinkFilter::new(
        &[TRACKED.to_string()],
        &retailer(),
        catalog(vec![product("B08H95Y452", dec!(449.99)), product("B08KWLMZV4", dec!(469.99))]),
    )
}

#[test]
fn test_url_classification() {
    let filter = filter();

    assert_eq!(
        filter.classify("https://www.retailer.example/co/B08H95Y452"),
        UrlVerdict::Accepted
    );
    assert_eq!(filter.classify("https://retailer.example/"), UrlVerdict::NotProductLink);
    assert_eq!(filter.classify("retailer.example"), UrlVerdict::NotProductLink);
    assert_eq!(
        filter.classify("https://other-site.example/co/B08H95Y452"),
        UrlVerdict::ForeignDomain
    );
}

#[test]
fn test_retailer_name_outside_host_is_foreign() {
    let filter = filter();

    for url in [
        "https://other-site.example/retailer.example/B08H95Y452",
        "https://retailer.example.evil.test/co/B08H95Y452",
        "https://other-site.example/B08H95Y452?r=retailer.example",
        "https://notretailer.example/co/B08H95Y452",
        "https://other-site.example/product?tld=.example&ref=alerts.example",
    ] {
        assert_eq!(filter.classify(url), UrlVerdict::ForeignDomain, "{}", url);
    }

    assert_eq!(
        filter.evaluate(&post(
            TRACKED,
            &["https://other-site.example/retailer.example/B08H95Y452"]
        )),
        FilterDecision::NoMatch
    );
}

#[test]
fn test_retailer_subdomain_is_accepted() {
    assert_eq!(
        filter().classify("https://smile.retailer.example/co/B08H95Y452"),
        UrlVerdict::Accepted
    );
}

#[test]
fn test_aggregator_link_needs_country_marker() {
    let filter = filter();

    assert_eq!(
        filter.classify("https://alerts.example/product/B08H95Y452?asin=B08H95Y452&tld=.example"),
        UrlVerdict::Accepted
    );
    assert_eq!(
        filter.classify("https://alerts.example/product/B08H95Y452?asin=B08H95Y452&tld=.com"),
        UrlVerdict::ForeignDomain
    );
    // 標記只認 query，也不接受假冒的聚合站主機
    assert_eq!(
        filter.classify("https://alerts.example/tld=.example/B08H95Y452"),
        UrlVerdict::ForeignDomain
    );
    assert_eq!(
        filter.classify("https://alerts.example.evil.test/product?asin=B08H95Y452&tld=.example"),
        UrlVerdict::ForeignDomain
    );
}

#[test]
fn test_matching_post_selects_catalog_product() {
    let decision = filter().evaluate(&post(
        TRACKED,
        &[
            "https://retailer.example/",
            "https://other-site.example/co/B08H95Y452",
            "https://www.retailer.example/co/B08KWLMZV4",
        ],
    ));

    match decision {
        FilterDecision::Matched { product, url } => {
            assert_eq!(product.id, "B08KWLMZV4");
            assert_eq!(url, "https://www.retailer.example/co/B08KWLMZV4");
        }
        other => panic!("expected a match, got {:?}", other),
    }
}

#[test]
fn test_unknown_product_and_untracked_author() {
    let filter = filter();

    assert_eq!(
        filter.evaluate(&post(TRACKED, &["https://retailer.example/co/UNKNOWN1"])),
        FilterDecision::NoMatch
    );
    assert_eq!(
        filter.evaluate(&post(UNTRACKED, &["https://retailer.example/co/B08H95Y452"])),
        FilterDecision::UntrackedAuthor
    );
    assert_eq!(filter.evaluate(&post(TRACKED, &[])), FilterDecision::NoMatch);
}

#[test]
fn test_truncated_post_uses_extended_urls_only() {
    let raw = serde_json::json!({
        "text": "PS5 restock…",
        "truncated": true,
        "user": {"id_str": TRACKED},
        "entities": {"urls": [{"url": "https://t.co/a", "expanded_url": "https://retailer.example/co/B08H95Y452"}]},
        "extended_tweet": {
            "full_text": "PS5 restock at the retailer",
            "entities": {"urls": [{"url": "https://t.co/b", "expanded_url": "https://other-site.example/co/B08H95Y452"}]}
        }
    })
    .to_string();
    let event = PostEvent::from_json(&raw).unwrap();

    // 主欄位有命中，但貼文被截斷時只看 extended 欄位
    assert_eq!(filter().evaluate(&event), FilterDecision::NoMatch);
}

#[test]
fn test_country_path_domain() {
    let mut retailer = retailer();
    retailer.domain = "retailer.example/co".to_string();
    let filter = LinkFilter::new(
        &[TRACKED.to_string()],
        &retailer,
        catalog(vec![product("B08H95Y452", dec!(449.99))]),
    );

    assert_eq!(filter.classify("https://retailer.example/co/B08H95Y452"), UrlVerdict::Accepted);
    assert_eq!(filter.classify("https://retailer.example/co"), UrlVerdict::NotProductLink);
    assert_eq!(filter.classify("http://www.retailer.example/co/"), UrlVerdict::NotProductLink);
    assert_eq!(
        filter.classify("https://other-site.example/B08H95Y452"),
        UrlVerdict::ForeignDomain
    );
    // 同一個零售商的其他國家路徑
    assert_eq!(
        filter.classify("https://retailer.example/de/B08H95Y452"),
        UrlVerdict::ForeignDomain
    );
    assert_eq!(
        filter.classify("https://retailer.example/cox/B08H95Y452"),
        UrlVerdict::ForeignDomain
    );
}
