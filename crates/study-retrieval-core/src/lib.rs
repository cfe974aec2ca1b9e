//! # Study Retrieval Core
//!
//! Shared logic for Study Retrieval: the chunk model, the flat L2 vector
//! index and its artifact codec, the embedding trait, corpus extraction
//! and reconstruction over parsed JSON, and the search algorithm.
//!
//! This crate contains no tokio runtime, filesystem I/O, or network code.
//! The `study-retrieval` app crate supplies those.

pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod search;
pub mod snapshot;
