//! # kbrag
//!
//! Retrieval over a local knowledge base of office documents.
//!
//! Documents under a knowledge root (PDF, Word, Excel, CSV, JSON, Markdown,
//! plain text) are extracted to text and cut into fixed-size chunk files.
//! A question is answered with the single chunk whose TF-IDF vector is most
//! similar to the question's, provided the cosine similarity clears a
//! threshold.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Extractors │──▶│   Chunker   │──▶│ Chunk files  │
//! │ pdf/docx/.. │   │ 500 chars   │   │ base/*.txt   │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ snapshot
//!                                            ▼
//!                  ┌──────────┐       ┌──────────────┐
//!                  │ CLI (kb) │◀─────▶│  Retriever   │
//!                  │ HTTP     │       │ TF-IDF + cos │
//!                  └──────────┘       └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kb ingest                       # chunk ./knowledge_base into ./knowledge_base/base
//! kb ask "política de férias"     # best matching chunk
//! kb chat                         # interactive loop
//! kb serve                        # POST /chat on 0.0.0.0:5000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed library errors |
//! | [`models`] | Core data types |
//! | [`extract`] | Format-specific text extraction |
//! | [`ocr`] | OCR fallback for scanned PDF pages |
//! | [`sources`] | Knowledge root walker |
//! | [`chunk`] | Fixed-window text chunking |
//! | [`store`] | Corpus snapshots and chunk persistence |
//! | [`stopwords`] | Built-in stopword lists |
//! | [`tokenize`] | Tokenizer |
//! | [`vectorize`] | TF / TF-IDF vectorizer |
//! | [`similarity`] | Cosine similarity and best-match resolution |
//! | [`retriever`] | Query entry point |
//! | [`ingest`] | Ingestion pipeline |
//! | [`server`] | HTTP chat server |

pub mod chunk;
pub mod config;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod ocr;
pub mod retriever;
pub mod server;
pub mod similarity;
pub mod sources;
pub mod stopwords;
pub mod store;
pub mod tokenize;
pub mod vectorize;
