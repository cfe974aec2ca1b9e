//! # Study Retrieval
//!
//! Semantic retrieval over lesson and book study material.
//!
//! Study Retrieval walks a corpus of lesson and book JSON documents, embeds
//! one chunk per lesson day or book item, and writes a flat squared-L2
//! vector index with a row-aligned metadata table. Searches embed the
//! query, take the nearest rows, score them, and re-read each hit's text
//! from its source document.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   Corpus    │──▶│   Builder   │──▶│  Artifacts   │
//! │ lessons/    │   │ batch embed │   │ index + meta │
//! │ books/      │   └─────────────┘   └──────┬───────┘
//! └─────────────┘                            │ load
//!                                     ┌──────▼───────┐
//!                                     │  IndexStore  │
//!                                     └──────┬───────┘
//!                      ┌─────────────────────┤
//!                      ▼                     ▼
//!                 ┌──────────┐         ┌──────────┐
//!                 │   CLI    │         │   HTTP   │
//!                 │ (study)  │         │  (axum)  │
//!                 └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! study build                    # embed the corpus
//! study search "faith" --top-k 3
//! study serve                    # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`corpus`] | Walking the lesson and book collections |
//! | [`embedding`] | Embedding providers |
//! | [`artifacts`] | Reading and writing the index/metadata pair |
//! | [`build`] | Index builder |
//! | [`store`] | Process-wide index store |
//! | [`reconstruct`] | Re-reading hit text from source documents |
//! | [`search`] | Search service and result ranking |
//! | [`server`] | HTTP server |
//!
//! The data model, vector index and search algorithm live in
//! `study-retrieval-core`.

pub mod artifacts;
pub mod build;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod reconstruct;
pub mod search;
pub mod server;
pub mod store;
