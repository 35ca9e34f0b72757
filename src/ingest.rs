//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for one PDF: extract (text, tables, image
//! OCR) → artifact dumps → normalize into document rows → chunk → embed
//! inline (non-fatal on failure) → store. Re-ingesting a source replaces
//! every row previously derived from it; the index is rebuilt whole per
//! document rather than updated incrementally.

use anyhow::{Context, Result};
use std::path::Path;
use uuid::Uuid;

use crate::chunk;
use crate::config::Config;
use crate::embed_cmd;
use crate::export;
use crate::models::{ContentItem, Document};
use crate::store;

/// Counters reported by [`ingest_document`].
pub struct IngestSummary {
    pub source: String,
    pub text_items: usize,
    pub table_items: usize,
    pub image_items: usize,
    pub documents: u64,
    pub chunks: u64,
    pub embedded: u64,
    pub pending: u64,
}

/// Run the full pipeline for one PDF and return the counters.
pub async fn ingest_document(
    config: &Config,
    pdf: &Path,
    skip_images: bool,
) -> Result<IngestSummary> {
    let bytes = std::fs::read(pdf)
        .with_context(|| format!("Failed to read PDF: {}", pdf.display()))?;

    let source = source_name(pdf);
    let images_dir = config.extraction.images_dir.join(source_stem(pdf));

    let items = export::extract_all(
        &bytes,
        &images_dir,
        &config.extraction.ocr_command,
        skip_images,
    )?;
    let (text_count, table_count, image_count) = export::kind_counts(&items);

    export::write_artifacts(&items, &config.extraction.artifacts_dir)?;

    let pool = store::connect(config).await?;
    store::delete_source(&pool, &source).await?;

    let mut documents = 0u64;
    let mut chunks_written = 0u64;
    let mut embedded = 0u64;
    let mut pending = 0u64;

    for item in &items {
        let doc = normalize(&source, item);
        let chunks = chunk::chunk_document(
            &doc.id,
            &doc.content,
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
        )?;
        store::insert_document_with_chunks(&pool, &doc, &chunks).await?;

        let (emb_ok, emb_pending) = embed_cmd::embed_chunks_inline(config, &pool, &chunks).await;
        embedded += emb_ok;
        pending += emb_pending;

        documents += 1;
        chunks_written += chunks.len() as u64;
    }

    pool.close().await;

    Ok(IngestSummary {
        source,
        text_items: text_count,
        table_items: table_count,
        image_items: image_count,
        documents,
        chunks: chunks_written,
        embedded,
        pending,
    })
}

/// Convert one extracted item into its stored document row. One-to-one:
/// the content is untouched, provenance metadata travels alongside.
fn normalize(source: &str, item: &ContentItem) -> Document {
    Document {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        page: item.page,
        kind: item.kind,
        table_number: item.table_number,
        image_path: item.image_path.clone(),
        content: item.content.clone(),
        content_hash: store::hash_text(&item.content),
        created_at: chrono::Utc::now().timestamp(),
    }
}

fn source_name(pdf: &Path) -> String {
    pdf.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| pdf.display().to_string())
}

fn source_stem(pdf: &Path) -> String {
    pdf.file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string())
}

/// CLI entry point for `docchat ingest`.
pub async fn run_ingest(
    config: &Config,
    pdf: &Path,
    dry_run: bool,
    skip_images: bool,
) -> Result<()> {
    if dry_run {
        let bytes = std::fs::read(pdf)
            .with_context(|| format!("Failed to read PDF: {}", pdf.display()))?;
        let images_dir = config.extraction.images_dir.join(source_stem(pdf));
        // Dry run still extracts (that is the work being estimated) but
        // skips OCR side effects along with all database writes.
        let items = export::extract_all(&bytes, &images_dir, "", true)?;
        let (text_count, table_count, _) = export::kind_counts(&items);
        let total_chunks: usize = items
            .iter()
            .map(|item| {
                chunk::split_text(
                    &item.content,
                    config.chunking.chunk_size,
                    config.chunking.chunk_overlap,
                )
                .map(|c| c.len())
                .unwrap_or(0)
            })
            .sum();

        println!("ingest {} (dry-run)", pdf.display());
        println!("  text sections: {}", text_count);
        println!("  tables: {}", table_count);
        println!("  items found: {}", items.len());
        println!("  estimated chunks: {}", total_chunks);
        return Ok(());
    }

    let summary = ingest_document(config, pdf, skip_images).await?;

    println!("ingest {}", summary.source);
    println!("  text sections: {}", summary.text_items);
    println!("  tables: {}", summary.table_items);
    println!("  images with OCR: {}", summary.image_items);
    println!("  documents written: {}", summary.documents);
    println!("  chunks written: {}", summary.chunks);
    if config.embedding.is_enabled() {
        println!("  embeddings written: {}", summary.embedded);
        println!("  embeddings pending: {}", summary.pending);
    }
    println!("ok");

    Ok(())
}
