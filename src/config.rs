use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ScrapeError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Everything the scraper needs to know about the target site.
///
/// Built once at startup and passed by reference afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub default_url: String,
    pub selectors: SelectorConfig,
    /// Dimension every image URL is rewritten to, e.g. `260X372`.
    pub target_dimensions: String,
    /// Must capture (1) the path marker, (2) the `<w>X<h>` token, (3) the rest.
    pub dimension_pattern: String,
    /// Opaque `next-action` header value routing the specification call.
    pub next_action_id: String,
    pub user_agent: String,
    pub max_redirects: usize,
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub title: String,
    pub summary: String,
    pub main_image: String,
    pub list_images: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    /// How long to wait for the title selector to show up after navigation.
    pub settle_timeout_ms: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            default_url: "https://www.rokomari.com/book/48659/masud-rana-hacker-1-and-2".into(),
            selectors: SelectorConfig::default(),
            target_dimensions: "260X372".into(),
            dimension_pattern: r"(?i)(/(?:ProductNew\d+|product|book|Content)/)(\d+X\d+)(/.*)".into(),
            next_action_id: "28417b2a8c56565e7953dccc20653cea74746d3a".into(),
            user_agent: DEFAULT_USER_AGENT.into(),
            max_redirects: 10,
            browser: BrowserSettings::default(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            title: ".detailsBookContainer_bookName__pLCtW".into(),
            summary: ".productSummary_summeryText__Pd_tX".into(),
            main_image: ".lookInside_imageContainer__A2WcA img".into(),
            list_images: ".bookImageThumbs_bookImageThumb__368gC img".into(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            settle_timeout_ms: 10_000,
        }
    }
}

impl ScraperConfig {
    /// Defaults when `path` is `None`, otherwise defaults overlaid with the YAML file.
    pub fn load(path: Option<&Path>) -> Result<Self, ScrapeError> {
        match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|e| {
                    ScrapeError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_yaml(&contents)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ScrapeError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ScraperConfig::from_yaml(
            "target_dimensions: 400X600\nselectors:\n  title: h1.name\n",
        )
        .unwrap();

        assert_eq!(config.target_dimensions, "400X600");
        assert_eq!(config.selectors.title, "h1.name");
        assert_eq!(config.selectors.summary, SelectorConfig::default().summary);
        assert_eq!(config.next_action_id, ScraperConfig::default().next_action_id);
        assert!(config.browser.headless);
    }

    #[test]
    fn empty_yaml_is_default() {
        let config = ScraperConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.target_dimensions, "260X372");
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        let err = ScraperConfig::from_yaml("selectors: [unclosed").unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ScraperConfig::load(Some(Path::new("/nonexistent/scraper.yaml"))).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
