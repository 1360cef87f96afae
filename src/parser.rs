use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::config::{ScraperConfig, SelectorConfig};
use crate::error::ScrapeError;
use crate::normalizer::ImageNormalizer;

/// Compiled form of [`SelectorConfig`].
#[derive(Debug, Clone)]
pub struct Selectors {
    title: Selector,
    summary: Selector,
    main_image: Selector,
    list_images: Selector,
}

impl Selectors {
    pub fn new(config: &SelectorConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            title: compile(&config.title)?,
            summary: compile(&config.summary)?,
            main_image: compile(&config.main_image)?,
            list_images: compile(&config.list_images)?,
        })
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        Self::new(&config.selectors)
    }
}

fn compile(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| ScrapeError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Fields pulled out of the product page markup.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PageFields {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub main_image: Option<String>,
    pub list_images: Vec<String>,
}

/// Each field is extracted on its own; a miss leaves only that field empty.
pub fn parse_page(html: &str, selectors: &Selectors, normalizer: &ImageNormalizer) -> PageFields {
    let doc = Html::parse_document(html);

    let title = first_text(&doc, &selectors.title);
    match &title {
        Some(title) => info!("Title: {title}"),
        None => warn!("Title not found"),
    }

    let summary = first_text(&doc, &selectors.summary);
    match &summary {
        Some(summary) => info!("Summary: {}...", preview(summary, 100)),
        None => warn!("Summary not found"),
    }

    let main_image =
        normalizer.normalize_opt(doc.select(&selectors.main_image).next().and_then(image_src));
    match &main_image {
        Some(src) => info!("Main image: {src}"),
        None => warn!("Main image not found"),
    }

    let list_images: Vec<String> = doc
        .select(&selectors.list_images)
        .filter_map(image_src)
        .map(|src| normalizer.normalize(src).into_owned())
        .collect();
    info!("List images: {} found", list_images.len());

    PageFields {
        title,
        summary,
        main_image,
        list_images,
    }
}

fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// `src`, or the lazy-load `data-src` when `src` is missing or blank.
fn image_src(img: ElementRef<'_>) -> Option<&str> {
    let attr = |name: &str| img.value().attr(name).map(str::trim).filter(|v| !v.is_empty());
    attr("src").or_else(|| attr("data-src"))
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
