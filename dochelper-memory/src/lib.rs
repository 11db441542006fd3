//! In-memory document storage backend for dochelper.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait,
//! intended for tests and local development.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Insertion ordered** - Unsorted finds return documents in the order they were inserted
//! - **Filters** - The full filter AST, with dotted paths into embedded documents
//! - **Indexes** - Listing, creation and unique-key enforcement
//! - **Aggregation** - `$match`, `$sort`, `$skip`, `$limit` and `$count`
//!
//! # Quick Start
//!
//! ```ignore
//! use dochelper::{StoreHelper, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let helper = StoreHelper::new(InMemoryStore::new());
//!     helper.insert_one("countries", &Country::new("GB")).await?;
//!     assert_eq!(helper.count("countries", None).await?, 1);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as dochelper_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
