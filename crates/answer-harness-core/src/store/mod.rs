//! Storage abstraction for passages and their vectors.
//!
//! The [`VectorStore`] trait defines every storage operation the pipeline
//! needs, enabling pluggable backends: the application ships a SQLite
//! implementation, and [`memory::InMemoryStore`] backs the test suites.
//!
//! Tenant isolation is the load-bearing invariant here: every query takes a
//! `tenant_id` and implementations must never return rows belonging to a
//! different tenant.

pub mod memory;

use async_trait::async_trait;

use crate::error::HarnessError;
use crate::models::{Passage, PassageHit};

/// Abstract passage storage with tenant-scoped nearest-neighbor search.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_passages`](VectorStore::insert_passages) | Persist a batch of embedded passages |
/// | [`search`](VectorStore::search) | Nearest-neighbor search within one tenant |
/// | [`delete_document`](VectorStore::delete_document) | Remove a document's passages |
/// | [`count`](VectorStore::count) | Number of passages stored for a tenant |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist a batch of embedded passages.
    async fn insert_passages(&self, passages: &[Passage]) -> Result<(), HarnessError>;

    /// Nearest-neighbor search scoped to `tenant_id`.
    ///
    /// Results are ordered by ascending distance to `query_vec`, limited to
    /// `top_k`. When `max_distance` is set, rows at or beyond it are
    /// excluded; `None` disables the filter and returns the raw top-k. Ties
    /// in distance keep insertion order (stable sort); callers must not
    /// depend on any particular order among exact ties.
    async fn search(
        &self,
        tenant_id: &str,
        query_vec: &[f32],
        top_k: usize,
        max_distance: Option<f32>,
    ) -> Result<Vec<PassageHit>, HarnessError>;

    /// Delete all passages belonging to `document_id` within `tenant_id`.
    /// Returns the number of rows removed.
    async fn delete_document(&self, tenant_id: &str, document_id: &str)
        -> Result<usize, HarnessError>;

    /// Number of passages stored for `tenant_id`.
    async fn count(&self, tenant_id: &str) -> Result<usize, HarnessError>;
}
