use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::models::ProductRecord;

pub fn to_json(record: &ProductRecord, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(record)?
    } else {
        serde_json::to_string(record)?
    };
    Ok(json)
}

pub fn save_to_file(record: &ProductRecord, path: &Path) -> Result<()> {
    let json = to_json(record, true)?;
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Raw page markup, for checking selectors against what was actually served.
pub fn dump_html(html: &str, path: &Path) -> Result<()> {
    std::fs::write(path, html).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("rokomari_scraper_{}_{name}", std::process::id()))
    }

    #[test]
    fn saved_file_round_trips() {
        let mut record = ProductRecord::new("https://x.test/book/9/a", Some("9".into()));
        record.title = Some("Title".into());
        let path = temp_path("record.json");

        save_to_file(&record, &path).unwrap();
        let back: ProductRecord = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(back, record);
    }

    #[test]
    fn compact_json_is_single_line() {
        let record = ProductRecord::new("https://x.test/", None);
        assert!(!to_json(&record, false).unwrap().contains('\n'));
        assert!(to_json(&record, true).unwrap().contains("\n  \"bookId\": null"));
    }

    #[test]
    fn dump_to_missing_directory_fails() {
        let path = temp_path("missing-dir").join("page.html");
        assert!(dump_html("<html></html>", &path).is_err());
    }
}
