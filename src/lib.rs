//! # Answer Harness
//!
//! A multi-tenant retrieval-augmented document question-answering service.
//!
//! Documents are ingested per tenant, split into overlapping passages,
//! embedded, and stored. At question time the pipeline runs retrieval →
//! structured extraction → answer synthesis → (optionally) incremental
//! streaming, with every retrieval scoped to a single tenant.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────────────┐   ┌───────────┐
//! │ Raw text + │──▶│ Normalize, chunk, │──▶│  SQLite   │
//! │ tenant id  │   │ embed             │   │ passages  │
//! └────────────┘   └───────────────────┘   └─────┬─────┘
//!                                                │
//!                      ┌─────────────────────────┤
//!                      ▼                         ▼
//!                ┌──────────┐             ┌──────────┐
//!                │   CLI    │             │   HTTP   │
//!                │  (anh)   │             │ (+ SSE)  │
//!                └──────────┘             └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! anh init                                   # create database
//! anh ingest notes.txt --tenant acme         # ingest a document
//! anh ask "who can help with rent?" --tenant acme
//! anh serve                                  # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store_sqlite`] | SQLite passage store with vector search |
//! | [`embedding`] | Embedding provider backends |
//! | [`llm`] | LLM chat backends |
//! | [`normalize`] | Ingestion-time structured normalization |
//! | [`ingest`] | Ingestion pipeline |
//! | [`answer`] | Answer synthesis |
//! | [`stream`] | Streaming transcoder and SSE encoding |
//! | [`server`] | HTTP server |

pub mod answer;
pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod normalize;
pub mod server;
pub mod store_sqlite;
pub mod stream;
