//! Page text and table extraction for PDF documents.
//!
//! Extraction is pipeline-layer: callers supply the PDF bytes and this
//! module returns [`ContentItem`]s tagged with 1-based page numbers.
//! Image/OCR extraction lives in [`crate::ocr`] since it shells out to an
//! external engine and writes files.
//!
//! The text extractor emits one item per page with non-empty text;
//! whitespace-only pages are omitted. The table extractor detects runs of
//! columnar lines (tab or multi-space separated) in the page text and
//! renders them as pipe-delimited rows with a header separator, numbered
//! per page starting at 1.

use crate::models::{ContentItem, ContentKind};

/// Extraction error. A malformed document fails as a whole; individual
/// tables and images are skipped by their extractors instead.
#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract per-page plain text from PDF bytes. One string per page,
/// including empty strings for pages without extractable text.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// One [`ContentItem`] per page with non-empty text.
pub fn text_items(pages: &[String]) -> Vec<ContentItem> {
    pages
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| ContentItem {
            content: text.clone(),
            page: (i + 1) as u32,
            kind: ContentKind::Text,
            table_number: None,
            image_path: None,
        })
        .collect()
}

/// Detect tables on every page and render each as a delimited text block.
pub fn table_items(pages: &[String]) -> Vec<ContentItem> {
    let mut items = Vec::new();
    for (i, text) in pages.iter().enumerate() {
        let page = (i + 1) as u32;
        for (n, table) in detect_tables(text).into_iter().enumerate() {
            let table_number = (n + 1) as u32;
            items.push(ContentItem {
                content: render_table(&table, page, table_number),
                page,
                kind: ContentKind::Table,
                table_number: Some(table_number),
                image_path: None,
            });
        }
    }
    items
}

/// A detected table: rows of cells, first row treated as the header.
type TableRows = Vec<Vec<String>>;

/// Minimum rows (header + one data row) for a run to count as a table.
const MIN_TABLE_ROWS: usize = 2;

/// Scan page text for runs of consecutive columnar lines. A line is
/// columnar when splitting on tabs or 2+ space gaps yields at least two
/// cells. Runs shorter than [`MIN_TABLE_ROWS`] are ignored.
fn detect_tables(page_text: &str) -> Vec<TableRows> {
    let mut tables = Vec::new();
    let mut run: TableRows = Vec::new();

    for line in page_text.lines() {
        match split_columns(line) {
            Some(cells) => run.push(cells),
            None => {
                flush_run(&mut run, &mut tables);
            }
        }
    }
    flush_run(&mut run, &mut tables);

    tables
}

fn flush_run(run: &mut TableRows, tables: &mut Vec<TableRows>) {
    if run.len() >= MIN_TABLE_ROWS {
        tables.push(std::mem::take(run));
    } else {
        run.clear();
    }
}

/// Split a line into cells on tabs, falling back to runs of 2+ spaces.
/// Returns None for lines with fewer than two cells.
fn split_columns(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim_end();
    if trimmed.trim().is_empty() {
        return None;
    }

    let cells: Vec<String> = if trimmed.contains('\t') {
        trimmed
            .split('\t')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    } else {
        split_on_space_runs(trimmed)
    };

    if cells.len() >= 2 {
        Some(cells)
    } else {
        None
    }
}

/// Split on gaps of two or more spaces without pulling in a regex engine.
fn split_on_space_runs(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut space_run = 0usize;

    for ch in line.chars() {
        if ch == ' ' {
            space_run += 1;
            if space_run < 2 {
                current.push(ch);
            } else if space_run == 2 {
                // The single space already pushed belongs to the gap.
                current.pop();
            }
        } else {
            if space_run >= 2 && !current.trim().is_empty() {
                cells.push(current.trim().to_string());
                current = String::new();
            }
            space_run = 0;
            current.push(ch);
        }
    }
    if !current.trim().is_empty() {
        cells.push(current.trim().to_string());
    }

    cells
}

/// Render a table in the pipe-delimited shape used by the content dumps:
/// a title line, the header row, a `---` separator row, then data rows.
/// Rows shorter than the header are padded with empty cells.
fn render_table(rows: &TableRows, page: u32, table_number: u32) -> String {
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);

    let mut out = format!("Table {} (Page {}):\n\n", table_number, page);

    let mut render_row = |row: &[String]| {
        let mut padded: Vec<&str> = row.iter().map(|s| s.as_str()).collect();
        padded.resize(width, "");
        out.push_str(&padded.join(" | "));
        out.push('\n');
    };

    render_row(&rows[0]);
    let sep: Vec<String> = vec!["---".to_string(); width];
    render_row(&sep);
    for row in &rows[1..] {
        render_row(row);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_items_skip_whitespace_pages() {
        let pages = vec![
            "First page text".to_string(),
            "   \n\t\n".to_string(),
            "Third page".to_string(),
        ];
        let items = text_items(&pages);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].page, 1);
        assert_eq!(items[1].page, 3);
        assert!(items.iter().all(|i| i.kind == ContentKind::Text));
    }

    #[test]
    fn text_items_one_per_nonempty_page() {
        let pages: Vec<String> = (1..=4).map(|i| format!("Page {} body", i)).collect();
        let items = text_items(&pages);
        assert_eq!(items.len(), 4);
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.page, (i + 1) as u32);
            assert!(!item.content.trim().is_empty());
        }
    }

    #[test]
    fn detects_multi_space_table() {
        let page = "Quarterly results follow.\n\
                    Region  Revenue  Growth\n\
                    North  1200  4%\n\
                    South  900  2%\n\
                    That concludes the figures.";
        let tables = detect_tables(page);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].len(), 3);
        assert_eq!(tables[0][0], vec!["Region", "Revenue", "Growth"]);
        assert_eq!(tables[0][2], vec!["South", "900", "2%"]);
    }

    #[test]
    fn detects_tab_separated_table() {
        let page = "Name\tQty\nApples\t10\nPears\t5";
        let tables = detect_tables(page);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0][1], vec!["Apples", "10"]);
    }

    #[test]
    fn single_columnar_line_is_not_a_table() {
        let page = "Intro line\nName  Qty\nplain prose again";
        assert!(detect_tables(page).is_empty());
    }

    #[test]
    fn rendered_table_has_title_and_separator() {
        let page = "Name  Qty\nApples  10";
        let items = table_items(&[page.to_string()]);
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.table_number, Some(1));
        assert!(item.content.starts_with("Table 1 (Page 1):\n\n"));
        assert!(item.content.contains("Name | Qty\n"));
        assert!(item.content.contains("--- | ---\n"));
        assert!(item.content.contains("Apples | 10\n"));
    }

    #[test]
    fn ragged_rows_are_padded() {
        let page = "A  B  C\n1  2\nmore prose";
        let items = table_items(&[page.to_string()]);
        assert_eq!(items.len(), 1);
        assert!(items[0].content.contains("1 | 2 | \n"));
    }

    // The scenario from the behavior contract: a 3-page document with a
    // table on page 2 and no images yields 3 text items + 1 table item.
    #[test]
    fn three_pages_one_table_yields_four_items() {
        let pages = vec![
            "Introduction with plain prose only.".to_string(),
            "Summary table below.\nItem  Count\nWidgets  7\nGadgets  3".to_string(),
            "Closing remarks.".to_string(),
        ];
        let text = text_items(&pages);
        let tables = table_items(&pages);
        assert_eq!(text.len(), 3);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page, 2);
        assert_eq!(text.len() + tables.len(), 4);
    }

    #[test]
    fn extraction_is_deterministic() {
        let pages = vec![
            "Some page one text.".to_string(),
            "Col1  Col2\n1  2\n3  4".to_string(),
        ];
        let a: Vec<_> = text_items(&pages)
            .into_iter()
            .chain(table_items(&pages))
            .map(|i| (i.page, i.kind, i.content))
            .collect();
        let b: Vec<_> = text_items(&pages)
            .into_iter()
            .chain(table_items(&pages))
            .map(|i| (i.page, i.kind, i.content))
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_pdf_bytes_error() {
        let err = extract_pages(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }
}
