//! Extracted-content artifacts: JSON and human-readable dumps.
//!
//! `docchat extract` runs every extractor over a PDF and writes what it
//! found without touching the index: `all_content.json` (array of content
//! items), `all_content.txt` (page/type-headed readable dump), and the
//! images directory with the embedded images pulled from the document.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::extract;
use crate::models::{ContentItem, ContentKind};
use crate::ocr;

pub struct ArtifactPaths {
    pub json: PathBuf,
    pub text: PathBuf,
}

/// Write `all_content.json` and `all_content.txt` under `dir`.
pub fn write_artifacts(items: &[ContentItem], dir: &Path) -> Result<ArtifactPaths> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create artifacts dir: {}", dir.display()))?;

    let json_path = dir.join("all_content.json");
    let json = serde_json::to_string_pretty(items)?;
    std::fs::write(&json_path, json)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;

    let text_path = dir.join("all_content.txt");
    let mut out = String::new();
    for item in items {
        out.push_str(&"=".repeat(80));
        out.push('\n');
        out.push_str(&format!("PAGE {} | TYPE: {}\n", item.page, item.kind));
        out.push_str(&"=".repeat(80));
        out.push('\n');
        out.push_str(&item.content);
        out.push('\n');
    }
    std::fs::write(&text_path, out)
        .with_context(|| format!("Failed to write {}", text_path.display()))?;

    Ok(ArtifactPaths {
        json: json_path,
        text: text_path,
    })
}

/// Run every extractor over the PDF and collect the items in document
/// order: text, then tables, then image OCR (matching ingestion order).
pub fn extract_all(
    pdf_bytes: &[u8],
    images_dir: &Path,
    ocr_command: &str,
    skip_images: bool,
) -> Result<Vec<ContentItem>> {
    let pages = extract::extract_pages(pdf_bytes)?;

    let mut items = extract::text_items(&pages);
    items.extend(extract::table_items(&pages));

    if !skip_images {
        let saved = ocr::extract_images(pdf_bytes, images_dir)?;
        items.extend(ocr::ocr_items(&saved, ocr_command));
    }

    Ok(items)
}

/// CLI entry point for `docchat extract`.
pub async fn run_extract(config: &Config, pdf: &Path, out: Option<&Path>) -> Result<()> {
    let bytes = std::fs::read(pdf)
        .with_context(|| format!("Failed to read PDF: {}", pdf.display()))?;

    let out_dir = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.extraction.artifacts_dir.clone());
    let images_dir = out_dir.join("images");

    let items = extract_all(&bytes, &images_dir, &config.extraction.ocr_command, false)?;
    let paths = write_artifacts(&items, &out_dir)?;

    let counts = kind_counts(&items);
    println!("extract {}", pdf.display());
    println!("  text sections: {}", counts.0);
    println!("  tables: {}", counts.1);
    println!("  images with OCR: {}", counts.2);
    println!("  total items: {}", items.len());
    println!("  wrote: {}", paths.json.display());
    println!("  wrote: {}", paths.text.display());
    println!("  images: {}", images_dir.display());
    println!("ok");

    Ok(())
}

/// (text, table, image_ocr) item counts.
pub fn kind_counts(items: &[ContentItem]) -> (usize, usize, usize) {
    let text = items.iter().filter(|i| i.kind == ContentKind::Text).count();
    let table = items.iter().filter(|i| i.kind == ContentKind::Table).count();
    let image = items
        .iter()
        .filter(|i| i.kind == ContentKind::ImageOcr)
        .count();
    (text, table, image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<ContentItem> {
        vec![
            ContentItem {
                content: "Page one prose.".to_string(),
                page: 1,
                kind: ContentKind::Text,
                table_number: None,
                image_path: None,
            },
            ContentItem {
                content: "Table 1 (Page 2):\n\nA | B\n--- | ---\n1 | 2\n".to_string(),
                page: 2,
                kind: ContentKind::Table,
                table_number: Some(1),
                image_path: None,
            },
        ]
    }

    #[test]
    fn artifacts_round_trip_through_json() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = write_artifacts(&items(), tmp.path()).unwrap();

        let json = std::fs::read_to_string(&paths.json).unwrap();
        let parsed: Vec<ContentItem> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].page, 1);
        assert_eq!(parsed[1].kind, ContentKind::Table);
        assert_eq!(parsed[1].table_number, Some(1));
    }

    #[test]
    fn text_dump_has_page_and_type_headers() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = write_artifacts(&items(), tmp.path()).unwrap();

        let text = std::fs::read_to_string(&paths.text).unwrap();
        assert!(text.contains("PAGE 1 | TYPE: text"));
        assert!(text.contains("PAGE 2 | TYPE: table"));
        assert!(text.contains("Page one prose."));
    }

    #[test]
    fn kind_counts_split_by_type() {
        assert_eq!(kind_counts(&items()), (1, 1, 0));
    }
}
