//! # Answer Harness Core
//!
//! Shared logic for Answer Harness: data models, text chunking, the category
//! vocabulary, structured extraction, the retrieval engine, template answer
//! composition, and the storage/embedding traits.
//!
//! This crate contains no tokio runtime, sqlx, HTTP, or filesystem
//! dependencies. Everything here is driven through the [`store::VectorStore`]
//! and [`embedding::Embedder`] traits so the application crate can plug in
//! SQLite and remote inference backends while tests use in-memory
//! implementations.

pub mod categories;
pub mod chunk;
pub mod compose;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod models;
pub mod retrieve;
pub mod store;
pub mod stream;

pub use error::HarnessError;
