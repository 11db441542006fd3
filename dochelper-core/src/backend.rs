//! Storage backend abstraction consumed by the store facade.
//!
//! A backend is a connection-scoped handle to a document database. It exposes the handful of
//! per-collection primitives the helper needs (count, find, find-one, insert, replace, index
//! listing and creation, aggregation) and nothing else. Pagination, identity handling and error
//! context all live above this layer in [`StoreHelper`](crate::helper::StoreHelper).
//!
//! # Traits
//!
//! - [`StoreBackend`]: the object-safe async interface backends implement
//! - [`StoreBackendBuilder`]: factory trait for creating backend instances
//!
//! # Example
//!
//! ```ignore
//! use dochelper::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//! let ack = backend.insert_document("users", doc! { "name": "Alice" }).await?;
//! println!("inserted {:?}", ack.inserted_id);
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{fmt::Debug, sync::Arc};

use crate::{
    error::StoreResult,
    index::{IndexDescriptor, IndexModel},
    query::{Expr, Query},
};

/// Acknowledgement of a single-document insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    /// The identity the store assigned or accepted, if it reported one.
    pub inserted_id: Option<Bson>,
}

/// Acknowledgement of a single-document replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the helper keeps one behind an `Arc` and may share it
/// between clones.
///
/// # Cancellation
///
/// Every method is a suspend point. Callers cancel by dropping the returned future, so
/// implementations must not leave shared state half-updated across an `.await`.
///
/// # Errors
///
/// Backends report driver failures as [`StoreError::Backend`](crate::error::StoreError::Backend)
/// (or a more specific variant); the facade adds the failing operation's name.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Counts documents in `collection` matching `filter` (all documents when `None`).
    async fn count_documents(&self, collection: &str, filter: Option<&Expr>) -> StoreResult<u64>;

    /// Returns the documents matching `query`, honouring its sort, skip and limit.
    ///
    /// A missing collection yields an empty result.
    async fn find_documents(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>>;

    /// Returns the first document matching `filter`, or `None`.
    async fn find_one_document(
        &self,
        collection: &str,
        filter: &Expr,
    ) -> StoreResult<Option<Document>>;

    /// Inserts one document, creating the collection if needed.
    ///
    /// Documents without an `_id` are given one by the store.
    async fn insert_document(
        &self,
        collection: &str,
        document: Document,
    ) -> StoreResult<InsertOneResult>;

    /// Replaces the first document matching `filter` with `document`.
    ///
    /// Matching nothing is not an error at this level; callers inspect
    /// [`ReplaceResult::matched_count`].
    async fn replace_document(
        &self,
        collection: &str,
        filter: &Expr,
        document: Document,
    ) -> StoreResult<ReplaceResult>;

    /// Lists the indexes defined on `collection`.
    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexDescriptor>>;

    /// Creates an index on `collection`.
    async fn create_index(&self, collection: &str, index: IndexModel) -> StoreResult<()>;

    /// Runs an aggregation pipeline and returns the resulting documents.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> StoreResult<Vec<Document>>;

    /// Releases backend resources such as connection pools.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn count_documents(&self, collection: &str, filter: Option<&Expr>) -> StoreResult<u64> {
        (**self).count_documents(collection, filter).await
    }

    async fn find_documents(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        (**self).find_documents(collection, query).await
    }

    async fn find_one_document(
        &self,
        collection: &str,
        filter: &Expr,
    ) -> StoreResult<Option<Document>> {
        (**self).find_one_document(collection, filter).await
    }

    async fn insert_document(
        &self,
        collection: &str,
        document: Document,
    ) -> StoreResult<InsertOneResult> {
        (**self).insert_document(collection, document).await
    }

    async fn replace_document(
        &self,
        collection: &str,
        filter: &Expr,
        document: Document,
    ) -> StoreResult<ReplaceResult> {
        (**self).replace_document(collection, filter, document).await
    }

    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexDescriptor>> {
        (**self).list_indexes(collection).await
    }

    async fn create_index(&self, collection: &str, index: IndexModel) -> StoreResult<()> {
        (**self).create_index(collection, index).await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> StoreResult<Vec<Document>> {
        (**self).aggregate(collection, pipeline).await
    }

    async fn shutdown(&self) -> StoreResult<()> {
        (**self).shutdown().await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> StoreResult<Self::Backend>;
}
