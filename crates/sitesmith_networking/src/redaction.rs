use url::Url;

/// A default string to use for redaction.
pub const DEFAULT_REDACTION_STR: &str = "********";

/// Query parameters whose values are treated as secrets.
const SECRET_QUERY_KEYS: &[&str] = &["key", "api_key", "api-key", "token", "access_token"];

/// Checks whether a URL carries a secret, either as the password of its user info or as the value
/// of a well known query parameter. If it does, returns a copy of the URL with every secret
/// replaced by `redaction`.
///
/// # Example
///
/// ```rust
/// # use sitesmith_networking::{redact_known_secrets_from_url, DEFAULT_REDACTION_STR};
/// # use url::Url;
///
/// let url = Url::parse("https://example.com/v1/chat?key=secret").unwrap();
/// let redacted_url = redact_known_secrets_from_url(&url, DEFAULT_REDACTION_STR).unwrap_or(url);
/// assert_eq!(redacted_url.as_str(), "https://example.com/v1/chat?key=********");
/// ```
pub fn redact_known_secrets_from_url(url: &Url, redaction: &str) -> Option<Url> {
    let has_password = url.password().is_some();
    let has_secret_query = url
        .query_pairs()
        .any(|(key, _)| SECRET_QUERY_KEYS.contains(&key.as_ref()));
    if !has_password && !has_secret_query {
        return None;
    }

    let mut url = url.clone();
    if has_password {
        url.set_password(Some(redaction)).ok()?;
    }
    if has_secret_query {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| {
                let value = if SECRET_QUERY_KEYS.contains(&key.as_ref()) {
                    redaction.to_owned()
                } else {
                    value.into_owned()
                };
                (key.into_owned(), value)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    Some(url)
}

/// A trait to redact known secrets from a type.
pub trait Redact {
    /// Redacts any secrets from this instance.
    fn redact(self) -> Self;
}

impl Redact for reqwest_middleware::Error {
    fn redact(self) -> Self {
        if let Some(url) = self.url() {
            let redacted_url = redact_known_secrets_from_url(url, DEFAULT_REDACTION_STR)
                .unwrap_or_else(|| url.clone());
            self.with_url(redacted_url)
        } else {
            self
        }
    }
}

impl Redact for reqwest::Error {
    fn redact(self) -> Self {
        if let Some(url) = self.url() {
            let redacted_url = redact_known_secrets_from_url(url, DEFAULT_REDACTION_STR)
                .unwrap_or_else(|| url.clone());
            self.with_url(redacted_url)
        } else {
            self
        }
    }
}

impl Redact for Url {
    fn redact(self) -> Self {
        redact_known_secrets_from_url(&self, DEFAULT_REDACTION_STR).unwrap_or(self)
    }
}
