//! Embedding backfill commands.
//!
//! `embed pending` finds chunks without a vector (or whose text changed
//! since they were embedded) and fills them in; `embed rebuild` clears
//! every vector and regenerates from scratch — useful when switching
//! embedding models or dimensions. Ingest calls [`embed_chunks_inline`]
//! for the same work inline, non-fatally.

use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::embedding;
use crate::models::Chunk;
use crate::store;

pub async fn run_embed_pending(
    config: &Config,
    limit: Option<usize>,
    batch_size_override: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let model_name = provider.model_name().to_string();
    let pool = store::connect(config).await?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);

    let pending = store::find_pending_chunks(&pool, &model_name, limit).await?;

    if dry_run {
        println!("embed pending (dry-run)");
        println!("  chunks needing embeddings: {}", pending.len());
        return Ok(());
    }

    if pending.is_empty() {
        println!("embed pending");
        println!("  all chunks up to date");
        return Ok(());
    }

    let total = pending.len();
    let (embedded, failed) =
        embed_pending_batches(config, &pool, provider.as_ref(), &pending, batch_size).await;

    println!("embed pending");
    println!("  total pending: {}", total);
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);

    pool.close().await;
    Ok(())
}

pub async fn run_embed_rebuild(config: &Config, batch_size_override: Option<usize>) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let model_name = provider.model_name().to_string();
    let pool = store::connect(config).await?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);

    store::clear_embeddings(&pool).await?;
    println!("embed rebuild — cleared existing embeddings");

    let all_chunks = store::find_pending_chunks(&pool, &model_name, None).await?;

    if all_chunks.is_empty() {
        println!("  no chunks to embed");
        pool.close().await;
        return Ok(());
    }

    let total = all_chunks.len();
    let (embedded, failed) =
        embed_pending_batches(config, &pool, provider.as_ref(), &all_chunks, batch_size).await;

    println!("embed rebuild");
    println!("  total chunks: {}", total);
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);

    pool.close().await;
    Ok(())
}

/// Embed pending chunks batch-by-batch. A failed batch is reported and
/// counted, not fatal — remaining batches still run.
async fn embed_pending_batches(
    config: &Config,
    pool: &SqlitePool,
    provider: &dyn embedding::EmbeddingProvider,
    pending: &[store::PendingChunk],
    batch_size: usize,
) -> (u64, u64) {
    let model_name = provider.model_name().to_string();
    let mut embedded = 0u64;
    let mut failed = 0u64;

    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();

        match embedding::embed_texts(provider, &config.embedding, &texts).await {
            Ok(vectors) => {
                for (item, vec) in batch.iter().zip(vectors.iter()) {
                    let blob = embedding::vec_to_blob(vec);
                    match store::upsert_embedding(
                        pool,
                        &item.chunk_id,
                        &item.document_id,
                        &model_name,
                        provider.dims(),
                        &item.text_hash,
                        &blob,
                    )
                    .await
                    {
                        Ok(()) => embedded += 1,
                        Err(e) => {
                            eprintln!(
                                "Warning: failed to store embedding for {}: {}",
                                item.chunk_id, e
                            );
                            failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("Warning: embedding batch failed: {}", e);
                failed += batch.len() as u64;
            }
        }
    }

    (embedded, failed)
}

/// Embed chunks during ingest. Non-fatal: failures leave chunks pending
/// for a later `embed pending` run. Returns (embedded, pending) counts.
pub async fn embed_chunks_inline(
    config: &Config,
    pool: &SqlitePool,
    chunks: &[Chunk],
) -> (u64, u64) {
    if !config.embedding.is_enabled() {
        return (0, 0);
    }

    let provider = match embedding::create_provider(&config.embedding) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Warning: could not create embedding provider: {}", e);
            return (0, chunks.len() as u64);
        }
    };

    let model_name = provider.model_name().to_string();
    let mut embedded = 0u64;
    let mut pending = 0u64;

    for batch in chunks.chunks(config.embedding.batch_size.max(1)) {
        // Skip chunks whose stored embedding already matches their text.
        let mut need_embedding = Vec::new();
        for chunk in batch {
            let existing = store::embedding_hash(pool, &chunk.id, &model_name)
                .await
                .unwrap_or(None);
            if existing.as_deref() == Some(chunk.hash.as_str()) {
                embedded += 1;
                continue;
            }
            need_embedding.push(chunk);
        }

        if need_embedding.is_empty() {
            continue;
        }

        let texts: Vec<String> = need_embedding.iter().map(|c| c.text.clone()).collect();

        match embedding::embed_texts(provider.as_ref(), &config.embedding, &texts).await {
            Ok(vectors) => {
                for (chunk, vec) in need_embedding.iter().zip(vectors.iter()) {
                    let blob = embedding::vec_to_blob(vec);
                    match store::upsert_embedding(
                        pool,
                        &chunk.id,
                        &chunk.document_id,
                        &model_name,
                        provider.dims(),
                        &chunk.hash,
                        &blob,
                    )
                    .await
                    {
                        Ok(()) => embedded += 1,
                        Err(e) => {
                            eprintln!(
                                "Warning: failed to store embedding for {}: {}",
                                chunk.id, e
                            );
                            pending += 1;
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("Warning: embedding batch failed: {}", e);
                pending += need_embedding.len() as u64;
            }
        }
    }

    (embedded, pending)
}
