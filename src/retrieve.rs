//! Top-k chunk retrieval by embedding similarity.
//!
//! Embeds the query, scores every stored vector with cosine similarity,
//! and returns `min(k, index size)` chunks ordered by decreasing score.
//! Ties break deterministically by original document order (page, then
//! chunk index, then chunk id), so identical queries always return
//! identical rankings. An empty index yields an empty result.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::embedding;
use crate::models::RetrievedChunk;
use crate::store;

pub async fn retrieve(
    pool: &SqlitePool,
    config: &Config,
    query: &str,
    k: usize,
) -> Result<Vec<RetrievedChunk>> {
    let rows = store::load_vector_rows(pool).await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let query_vec = embedding::embed_query(provider.as_ref(), &config.embedding, query).await?;

    let mut candidates: Vec<Candidate> = rows
        .into_iter()
        .map(|row| {
            let vec = embedding::blob_to_vec(&row.embedding);
            let score = embedding::cosine_similarity(&query_vec, &vec) as f64;
            Candidate {
                score,
                page: row.page,
                chunk_index: row.chunk_index,
                chunk: RetrievedChunk {
                    chunk_id: row.chunk_id,
                    document_id: row.document_id,
                    text: row.text,
                    score,
                    page: row.page,
                    kind: row.kind,
                    source: row.source,
                },
            }
        })
        .collect();

    rank(&mut candidates);
    candidates.truncate(k);

    Ok(candidates.into_iter().map(|c| c.chunk).collect())
}

struct Candidate {
    score: f64,
    page: u32,
    chunk_index: i64,
    chunk: RetrievedChunk,
}

/// Score descending; ties by document order (page, chunk index, id) so
/// equal-similarity results have a stable ranking.
fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.page.cmp(&b.page))
            .then(a.chunk_index.cmp(&b.chunk_index))
            .then(a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
    });
}

/// CLI entry point for `docchat search`.
pub async fn run_search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = store::connect(config).await?;
    let k = k.unwrap_or(config.retrieval.top_k);
    let results = retrieve(&pool, config, query, k).await?;

    if results.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    println!("Found {} relevant chunks:", results.len());
    println!();
    for (i, result) in results.iter().enumerate() {
        let preview: String = result.text.chars().take(200).collect();
        println!(
            "{}. [{:.4}] page {} ({}) — {}",
            i + 1,
            result.score,
            result.page,
            result.kind,
            result.source
        );
        println!("   {}", preview.replace('\n', " ").trim());
        println!();
    }

    pool.close().await;
    Ok(())
}
