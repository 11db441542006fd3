//! Main dochelper crate: pagination, index management and declarative seeding for document
//! databases.
//!
//! This crate is the primary entry point for users of dochelper. It re-exports the core types
//! from the sub-crates, the `#[derive(Model)]` macro and the available storage backends.
//!
//! # Features
//!
//! - **Paginated finds** - Count, page and sort in one call, with page metadata in the result
//! - **Index reconciliation** - Create named indexes only when they are missing
//! - **Declarative seeding** - Insert or update records matched by a caller-supplied filter
//! - **Migration runs** - Apply named index and seed tasks, collecting every failure
//!
//! # Quick Start
//!
//! ```ignore
//! use dochelper::{prelude::*, memory::InMemoryStore};
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
//! pub struct Country {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     pub id: Option<ObjectId>,
//!     pub code: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> StoreResult<()> {
//!     let helper = StoreHelper::new(InMemoryStore::new());
//!
//!     let task = SeedTableTask::builder("countries")
//!         .items(["GB", "FR"].map(|code| Country { code: code.into(), ..Default::default() }))
//!         .find_filter(|c: &Country| Ok(Some(Filter::eq("code", c.code.clone()))))
//!         .model(Country::default())
//!         .build();
//!
//!     let mut tasks = std::collections::HashMap::new();
//!     tasks.insert(
//!         "country code index".to_string(),
//!         CreateIndexTask::unique("countries", "code_1", IndexKeys::new().asc("code")).into(),
//!     );
//!     tasks.insert("countries".to_string(), Task::from(task));
//!     helper.migrator().run(&tasks).await?;
//!
//!     let page = helper
//!         .find::<Country>("countries", None, FindOptions::builder().page_size(10).build())
//!         .await?;
//!     println!("{} countries on {} page(s)", page.total, page.number_of_pages);
//!
//!     helper.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires the `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as dochelper;

pub mod prelude;

pub use dochelper_core::{
    CancellationToken, backend, collection, error, helper, index, migrate, model, page, query, seed,
};
pub use dochelper_core::helper::StoreHelper;
pub use dochelper_macros::Model;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use dochelper_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use dochelper_mongodb::{MongoDbConfig, MongoDbStore, MongoDbStoreBuilder};
}
