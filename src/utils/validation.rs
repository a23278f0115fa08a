use crate::utils::error::{BotError, Result};
use rust_decimal::Decimal;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> BotError {
    BotError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// 只接受 http / https；WebDriver 與串流端點都走 HTTP
pub fn validate_url(field: &str, raw: &str) -> Result<Url> {
    if raw.trim().is_empty() {
        return Err(invalid(field, raw, "URL cannot be empty"));
    }

    let url = Url::parse(raw).map_err(|e| invalid(field, raw, format!("Invalid URL format: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(field, raw, format!("Unsupported URL scheme: {}", url.scheme())));
    }
    Ok(url)
}

pub fn validate_path(field: &str, path: &str) -> Result<()> {
    if path.is_empty() || path.contains('\0') {
        return Err(invalid(field, path, "Path must be non-empty and free of null bytes"));
    }
    if path.ends_with('/') || path.ends_with(std::path::MAIN_SEPARATOR) {
        return Err(invalid(field, path, "Path points to a directory, expected a file"));
    }
    Ok(())
}

pub fn validate_positive_number(field: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(invalid(field, value, format!("Value must be at least {}", min_value)));
    }
    Ok(())
}

pub fn validate_non_negative(field: &str, value: Decimal) -> Result<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(invalid(field, value, "Amount cannot be negative"));
    }
    Ok(())
}

pub fn validate_non_empty_string(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, value, "Value cannot be empty or whitespace-only"));
    }
    Ok(())
}

/// 串流帳號 id 是純數字字串
pub fn validate_account_ids(field: &str, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        return Err(invalid(field, "", "At least one account id is required"));
    }
    match ids
        .iter()
        .find(|id| id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()))
    {
        Some(bad) => Err(invalid(field, bad, "Account ids are numeric")),
        None => Ok(()),
    }
}

/// 產品 URL 模板必須包含 `{id}` 佔位符
pub fn validate_template(field: &str, template: &str, placeholder: &str) -> Result<()> {
    if !template.contains(placeholder) {
        return Err(invalid(
            field,
            template,
            format!("Template must contain the {} placeholder", placeholder),
        ));
    }
    validate_url(field, &template.replace(placeholder, "x")).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_url() {
        assert_eq!(
            validate_url("WEBDRIVER_URL", "http://localhost:4444").unwrap().port(),
            Some(4444)
        );
        assert!(validate_url("WEBDRIVER_URL", "https://example.com").is_ok());
        assert!(validate_url("WEBDRIVER_URL", "  ").is_err());
        assert!(validate_url("WEBDRIVER_URL", "invalid-url").is_err());
        assert!(validate_url("WEBDRIVER_URL", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("AUDIT_LOG_PATH", "out.jsonl").is_ok());
        assert!(validate_path("AUDIT_LOG_PATH", "logs/").is_err());
        assert!(validate_path("AUDIT_LOG_PATH", "").is_err());
    }

    #[test]
    fn test_validate_numbers() {
        assert!(validate_positive_number("WORKER_COUNT", 4, 1).is_ok());
        assert!(validate_positive_number("WORKER_COUNT", 0, 1).is_err());
        assert!(validate_non_negative("purchase.max_additional_cost", dec!(0)).is_ok());
        assert!(validate_non_negative("purchase.max_additional_cost", dec!(-0.01)).is_err());
    }

    #[test]
    fn test_validate_account_ids() {
        let ids = vec!["3373551".to_string(), "1314575666130694144".to_string()];
        assert!(validate_account_ids("TRACKED_AUTHORS", &ids).is_ok());
        assert!(validate_account_ids("TRACKED_AUTHORS", &[]).is_err());
        match validate_account_ids("TRACKED_AUTHORS", &["PartAlert".to_string()]) {
            Err(BotError::InvalidConfigValueError { value, .. }) => assert_eq!(value, "PartAlert"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_template() {
        assert!(validate_template("product_url", "https://www.amazon.co.uk/dp/{id}", "{id}").is_ok());
        assert!(validate_template("product_url", "https://www.amazon.co.uk/dp/", "{id}").is_err());
        assert!(validate_template("product_url", "not a url {id}", "{id}").is_err());
        assert!(validate_non_empty_string("username", "   ").is_err());
    }
}
