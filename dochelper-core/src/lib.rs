//! A convenience layer over document database clients.
//!
//! This crate is the core of the dochelper project and provides:
//!
//! - **Models** ([`model`]) - The narrow trait seeded records implement, and identity kinds
//! - **Filters** ([`query`]) - Filter expressions and find queries
//! - **Pagination** ([`page`]) - Page arithmetic, find options and paginated results
//! - **Indexes** ([`index`]) - Ordered index key specifications and descriptors
//! - **Store backend abstraction** ([`backend`]) - The trait storage backends implement
//! - **Store helper** ([`helper`], [`collection`]) - Finds, reads, writes and index management
//! - **Seeding** ([`seed`]) - Reconciling declared records into a collection
//! - **Migrations** ([`migrate`]) - Named index and seed tasks and the runner applying them
//! - **Error handling** ([`error`]) - Error types, aggregates and result types
//!
//! # Example
//!
//! ```ignore
//! use dochelper::helper::StoreHelper;
//! use dochelper::index::IndexKeys;
//!
//! let helper = StoreHelper::new(backend);
//! helper.ensure_index("countries", IndexKeys::new().asc("code"), "code_1").await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as dochelper_core;

pub mod backend;
pub mod collection;
pub mod error;
pub mod helper;
pub mod index;
pub mod migrate;
pub mod model;
pub mod page;
pub mod query;
pub mod seed;

pub use tokio_util::sync::CancellationToken;
