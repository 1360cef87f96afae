use std::borrow::Cow;

use regex::Regex;

use crate::config::ScraperConfig;
use crate::error::ScrapeError;

/// Rewrites the `<w>X<h>` segment of image URLs to a fixed target size.
///
/// URLs that don't carry a dimension segment pass through untouched.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    target: String,
    pattern: Regex,
}

impl ImageNormalizer {
    pub fn new(target: impl Into<String>, pattern: &str) -> Result<Self, ScrapeError> {
        Ok(Self {
            target: target.into(),
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        Self::new(config.target_dimensions.clone(), &config.dimension_pattern)
    }

    pub fn normalize<'a>(&self, url: &'a str) -> Cow<'a, str> {
        if url.is_empty() {
            return Cow::Borrowed(url);
        }
        let Some(caps) = self.pattern.captures(url) else {
            return Cow::Borrowed(url);
        };
        let (Some(marker), Some(dims), Some(rest)) = (caps.get(1), caps.get(2), caps.get(3)) else {
            return Cow::Borrowed(url);
        };
        if dims.as_str().eq_ignore_ascii_case(&self.target) {
            return Cow::Borrowed(url);
        }

        let mut out = String::with_capacity(url.len() + self.target.len());
        out.push_str(&url[..marker.end()]);
        out.push_str(&self.target);
        out.push_str(rest.as_str());
        Cow::Owned(out)
    }

    /// `normalize` over an optional raw attribute value.
    pub fn normalize_opt(&self, url: Option<&str>) -> Option<String> {
        url.map(|u| self.normalize(u).into_owned())
    }
}
