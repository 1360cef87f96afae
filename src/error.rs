use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[cfg(feature = "browser")]
    #[error("Browser error: {0}")]
    Browser(String),
}

impl From<serde_yaml::Error> for ScrapeError {
    fn from(err: serde_yaml::Error) -> Self {
        ScrapeError::Config(err.to_string())
    }
}
