use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::ScrapeError;

static BOOK_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"/book/(\d+)/").ok());

/// Accepts only absolute http(s) URLs with a host.
pub fn validate_product_url(raw: &str) -> Result<Url, ScrapeError> {
    let url = Url::parse(raw.trim()).map_err(|e| ScrapeError::InvalidUrl(format!("{raw}: {e}")))?;
    if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() {
        return Ok(url);
    }
    Err(ScrapeError::InvalidUrl(format!(
        "{raw}: expected an http(s) URL, got `{}:`",
        url.scheme()
    )))
}

/// Numeric id from a `/book/<digits>/` path segment.
pub fn book_id_from_url(url: &str) -> Option<String> {
    BOOK_ID
        .as_ref()?
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// `scheme://host[:port]` of the page, used as the `origin` header.
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
