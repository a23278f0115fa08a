pub mod audit_log;
pub mod oauth;
pub mod twitter_stream;
pub mod webdriver;

pub use audit_log::AuditLog;
pub use oauth::OAuthSigner;
pub use twitter_stream::HttpStreamClient;
pub use webdriver::{WebDriverClient, WebDriverSession};
