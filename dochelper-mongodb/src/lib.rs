//! MongoDB backend implementation for dochelper.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait on top of the
//! official async driver. Filters are translated to native query documents, so pagination,
//! sorting and aggregation all run server-side.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! dochelper = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! The store is built either from a connection string and database name, or from a
//! [`MongoDbConfig`] loaded from application configuration.
//!
//! # Example
//!
//! ```ignore
//! use dochelper::{StoreHelper, backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .app_name("seeder")
//!         .build()
//!         .await?;
//!     let helper = StoreHelper::new(store);
//!
//!     helper.shutdown().await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as dochelper_mongodb;

pub mod query;
pub mod store;

pub use store::{MongoDbConfig, MongoDbStore, MongoDbStoreBuilder};
