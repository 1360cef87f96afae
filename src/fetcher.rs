use anyhow::Result;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use reqwest::redirect;
use tracing::info;

use crate::config::ScraperConfig;
use crate::error::ScrapeError;

/// Source of product page markup.
///
/// Implemented by the plain HTTP fetcher and, with the `browser` feature,
/// by the headless Chromium fetcher. Both hand back markup that goes
/// through the same parser.
pub trait PageFetcher {
    fn fetch_page(&self, url: &str) -> Result<String>;

    fn name(&self) -> &'static str;
}

/// Blocking client shared by the page fetch and the specification call.
pub fn build_client(config: &ScraperConfig) -> Result<Client, ScrapeError> {
    let max_redirects = config.max_redirects;
    let redirect_policy = redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            attempt.error(format!("Too many redirects (>{max_redirects})"))
        } else {
            attempt.follow()
        }
    });

    Ok(Client::builder().redirect(redirect_policy).build()?)
}

pub struct HttpFetcher {
    client: Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(client: Client, config: &ScraperConfig) -> Self {
        Self {
            client,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch_page(&self, url: &str) -> Result<String> {
        info!("Fetching main page HTML from {url}");
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(ScrapeError::from)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }
        Ok(resp.text().map_err(ScrapeError::from)?)
    }

    fn name(&self) -> &'static str {
        "plain"
    }
}
