use std::path::Path;

use tracing::{error, info};

use crate::archiver;
use crate::error::ScrapeError;
use crate::fetcher::PageFetcher;
use crate::models::ProductRecord;
use crate::normalizer::ImageNormalizer;
use crate::parser::{self, Selectors};
use crate::specs::SpecificationSource;
use crate::urls;

/// Everything one scrape needs, borrowed from `main`.
pub struct Scraper<'a> {
    pub fetcher: &'a dyn PageFetcher,
    pub specs: &'a dyn SpecificationSource,
    pub selectors: &'a Selectors,
    pub normalizer: &'a ImageNormalizer,
    /// Where to write the fetched markup, if anywhere.
    pub dump_html: Option<&'a Path>,
}

impl Scraper<'_> {
    /// Validates `raw_url` before any request goes out.
    pub fn scrape_url(&self, raw_url: &str) -> Result<ProductRecord, ScrapeError> {
        urls::validate_product_url(raw_url)?;
        Ok(self.scrape(raw_url.trim()))
    }

    /// Page fetch failures end up in `error`; whatever was gathered is kept.
    pub fn scrape(&self, url: &str) -> ProductRecord {
        let book_id = urls::book_id_from_url(url);
        let mut record = ProductRecord::new(url, book_id);
        info!(
            "Starting scrape of {url} (book ID: {}, fetcher: {})",
            record.book_id.as_deref().unwrap_or("none"),
            self.fetcher.name()
        );

        let html = match self.fetcher.fetch_page(url) {
            Ok(html) => html,
            Err(e) => {
                error!("An error occurred during the scraping process for {url}: {e:#}");
                record.error = Some(format!("{e:#}"));
                return record;
            }
        };

        if let Some(path) = self.dump_html {
            if let Err(e) = archiver::dump_html(&html, path) {
                error!("Failed to write HTML to {}: {e:#}", path.display());
            }
        }

        let fields = parser::parse_page(&html, self.selectors, self.normalizer);
        record.title = fields.title;
        record.summary = fields.summary;
        record.main_image = fields.main_image;
        record.list_images = fields.list_images;

        if record.book_id.is_some() {
            record.specifications = self.specs.fetch_specifications(url, record.book_id.as_deref());
        }
        record
    }
}
