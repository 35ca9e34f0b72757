//! Index statistics overview.
//!
//! A quick summary of what's indexed: document and chunk counts, embedding
//! coverage, and the per-kind breakdown. Used by `docchat stats` to check
//! that ingest and embedding runs did what was expected.

use anyhow::Result;

use crate::config::Config;
use crate::store;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = store::connect(config).await?;

    let total_docs = store::count_documents(&pool).await?;
    let total_chunks = store::count_chunks(&pool).await?;
    let total_embedded = store::count_vectors(&pool).await?;
    let sources = store::indexed_sources(&pool).await?;
    let breakdown = store::kind_breakdown(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("docchat — Index Stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", total_docs);
    println!("  Chunks:      {}", total_chunks);
    println!(
        "  Embedded:    {} / {} ({}%)",
        total_embedded,
        total_chunks,
        if total_chunks > 0 {
            (total_embedded * 100) / total_chunks
        } else {
            0
        }
    );

    if !sources.is_empty() {
        println!();
        println!("  Sources:");
        for source in &sources {
            println!("    {}", source);
        }
    }

    if !breakdown.is_empty() {
        println!();
        println!("  By kind:");
        println!("  {:<12} {:>6} {:>8}", "KIND", "DOCS", "CHUNKS");
        println!("  {}", "-".repeat(28));
        for row in &breakdown {
            println!(
                "  {:<12} {:>6} {:>8}",
                row.kind, row.doc_count, row.chunk_count
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
