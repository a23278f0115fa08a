//! OAuth 1.0a (HMAC-SHA1) request signing for the stream endpoint.

use crate::config::StreamCredentials;
use crate::utils::error::{BotError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Clone)]
pub struct OAuthSigner {
    consumer_key: String,
    consumer_secret: String,
    token: String,
    token_secret: String,
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

impl OAuthSigner {
    pub fn new(credentials: &StreamCredentials) -> Self {
        Self {
            consumer_key: credentials.consumer_key.clone(),
            consumer_secret: credentials.consumer_secret.clone(),
            token: credentials.access_token.clone(),
            token_secret: credentials.access_token_secret.clone(),
        }
    }

    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> Result<String> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, params, &nonce, &timestamp)
    }

    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let mut oauth_params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        let mut all_params = params.to_vec();
        all_params.extend(oauth_params.iter().cloned());
        let base = signature_base_string(method, url, &all_params)?;
        let signature = self.sign(&base)?;
        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();

        let fields: Vec<String> = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();
        Ok(format!("OAuth {}", fields.join(", ")))
    }

    fn sign(&self, base: &str) -> Result<String> {
        let key = format!("{}&{}", encode(&self.consumer_secret), encode(&self.token_secret));
        let mut mac = HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| BotError::ConfigError {
            message: format!("Invalid signing key: {}", e),
        })?;
        mac.update(base.as_bytes());
        Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// METHOD&encoded-base-url&encoded-sorted-params；URL 上的 query 也算參數
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| BotError::InvalidConfigValueError {
        field: "STREAM_ENDPOINT".to_string(),
        value: url.to_string(),
        reason: e.to_string(),
    })?;

    let mut base_url = format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or_default());
    if let Some(port) = parsed.port() {
        base_url.push_str(&format!(":{}", port));
    }
    base_url.push_str(parsed.path());

    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .chain(
            parsed
                .query_pairs()
                .map(|(k, v)| (encode(&k), encode(&v))),
        )
        .collect();
    encoded.sort();

    let joined = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(&base_url),
        encode(&joined)
    ))
}
