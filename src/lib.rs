//! # docchat
//!
//! A local-first chat-with-your-PDF pipeline.
//!
//! docchat extracts text, tables, and image OCR from a PDF, chunks and
//! embeds the content into a SQLite-backed vector index, and answers
//! natural-language questions about the document through a hosted LLM —
//! with page-level source citations, via a CLI, an interactive terminal
//! chat, and a JSON HTTP chat server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │  Extractors  │──▶│   Pipeline   │──▶│  SQLite   │
//! │ text/table/  │   │ chunk+embed  │   │  vectors  │
//! │  image OCR   │   └──────────────┘   └─────┬─────┘
//! └──────────────┘                            │
//!                        ┌────────────────────┤
//!                        ▼                    ▼
//!                  ┌───────────┐        ┌───────────┐
//!                  │ retrieve  │───────▶│ hosted LLM│
//!                  └─────┬─────┘        └─────┬─────┘
//!                        ▼                    ▼
//!                   chat / ask / serve — answers with citations
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat init                    # create the database
//! docchat ingest report.pdf       # extract, chunk, embed, index
//! docchat search "key findings"   # inspect retrieval
//! docchat ask "What is this document about?"
//! docchat chat                    # interactive session
//! docchat serve                   # HTTP chat API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Page text and table extraction |
//! | [`ocr`] | Embedded-image extraction + external OCR |
//! | [`chunk`] | Overlapping-window text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | SQLite storage and migrations |
//! | [`ingest`] | Pipeline orchestration |
//! | [`embed_cmd`] | Embedding backfill commands |
//! | [`export`] | Extracted-content artifact dumps |
//! | [`retrieve`] | Top-k similarity retrieval |
//! | [`answer`] | Prompting and hosted generation |
//! | [`chat`] | Session state machine and terminal chat |
//! | [`server`] | JSON HTTP chat server |
//! | [`stats`] | Index statistics |

pub mod answer;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod embed_cmd;
pub mod embedding;
pub mod export;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod ocr;
pub mod retrieve;
pub mod server;
pub mod stats;
pub mod store;
