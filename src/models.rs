use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub url: String,
    pub book_id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub main_image: Option<String>,
    pub list_images: Vec<String>,
    pub specifications: Option<Vec<Value>>,
    pub error: Option<String>,
    pub scraped_at: String,
}

impl ProductRecord {
    pub fn new(url: &str, book_id: Option<String>) -> Self {
        Self {
            url: url.to_string(),
            book_id,
            title: None,
            summary: None,
            main_image: None,
            list_images: Vec::new(),
            specifications: None,
            error: None,
            scraped_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
