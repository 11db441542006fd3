//! Main store helper interface.
//!
//! [`StoreHelper`] wraps a [`StoreBackend`] and exposes paginated finds, single-document reads and
//! writes, index management and aggregation against named collections. It also carries the
//! [`CancellationToken`] that every suspend point races against.
//!
//! # Example
//!
//! ```ignore
//! use dochelper::helper::StoreHelper;
//! use dochelper::page::FindOptions;
//!
//! let helper = StoreHelper::new(backend);
//! let page = helper
//!     .find::<Country>("countries", None, FindOptions::builder().page_size(20).build())
//!     .await?;
//! println!("{} of {}", page.items.len(), page.total);
//! ```

use bson::{Document, oid::ObjectId};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    backend::{InsertOneResult, StoreBackend},
    collection::{self, Collection},
    error::{StoreError, StoreResult},
    index::{IndexDescriptor, IndexKeys, IndexModel},
    page::{FindOptions, PaginationResult},
    query::Expr,
};

/// A document store facade bound to a shared backend.
///
/// Cloning is cheap: clones share the backend and the cancellation token.
#[derive(Debug, Clone)]
pub struct StoreHelper {
    backend: Arc<dyn StoreBackend>,
    cancel: CancellationToken,
}

impl StoreHelper {
    /// Creates a helper over `backend` with a token that is never cancelled.
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    /// Creates a helper over an already shared backend.
    pub fn from_arc(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns a helper sharing this backend but observing `token` instead.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let token = CancellationToken::new();
    /// let scoped = helper.with_cancellation(token.clone());
    /// token.cancel();
    /// assert!(scoped.count("countries", None).await.unwrap_err().is_cancelled());
    /// ```
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            cancel: token,
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the shared backend.
    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// Gets a handle to the collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a> {
        Collection::new(name.to_string(), self.backend.as_ref(), &self.cancel)
    }

    /// Finds the documents in `collection` matching `filter`, one page at a time.
    ///
    /// # Arguments
    ///
    /// * `collection` - The name of the collection
    /// * `filter` - Filter to match, or `None` for every document
    /// * `opts` - Page, page size and sort keys; a page size of `0` returns everything
    ///
    /// # Errors
    ///
    /// Returns an error if counting, querying or decoding fails.
    pub async fn find<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: Option<Expr>,
        opts: FindOptions,
    ) -> StoreResult<PaginationResult<T>> {
        self.collection(collection).find(filter, opts).await
    }

    /// Decodes the first document matching `filter` into `item`.
    ///
    /// Returns `Ok(false)` and leaves `item` untouched when nothing matches.
    pub async fn find_one<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &Expr,
        item: &mut T,
    ) -> StoreResult<bool> {
        self.collection(collection).find_one(filter, item).await
    }

    /// Inserts `item` into `collection`.
    ///
    /// # Returns
    ///
    /// The store-generated `ObjectId`, or `None` when the store accepted a different identity
    /// kind (see [`StoreHelper::id_from_insert_result`]).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the insert fails, or if the store reported no identity.
    pub async fn insert_one<T: Serialize>(
        &self,
        collection: &str,
        item: &T,
    ) -> StoreResult<Option<ObjectId>> {
        self.collection(collection).insert_one(item).await
    }

    /// Decodes the identity out of an insert acknowledgement.
    pub fn id_from_insert_result(result: &InsertOneResult) -> StoreResult<Option<ObjectId>> {
        collection::id_from_insert_result(result)
    }

    /// Replaces the first document in `collection` matching `filter` with `item`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoMatches`] if nothing matched.
    pub async fn update_one<T: Serialize>(
        &self,
        collection: &str,
        filter: &Expr,
        item: &T,
    ) -> StoreResult<()> {
        self.collection(collection).update_one(filter, item).await
    }

    pub async fn count(&self, collection: &str, filter: Option<&Expr>) -> StoreResult<u64> {
        self.collection(collection).count(filter).await
    }

    pub async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexDescriptor>> {
        self.collection(collection).list_indexes().await
    }

    /// Returns the index named `name`, if it exists.
    pub async fn get_index(
        &self,
        collection: &str,
        name: &str,
    ) -> StoreResult<Option<IndexDescriptor>> {
        Ok(self
            .list_indexes(collection)
            .await?
            .into_iter()
            .find(|index| index.name == name))
    }

    pub async fn has_index(&self, collection: &str, name: &str) -> StoreResult<bool> {
        Ok(self.get_index(collection, name).await?.is_some())
    }

    /// Creates an index unconditionally.
    pub async fn create_index(&self, collection: &str, index: IndexModel) -> StoreResult<()> {
        self.collection(collection).create_index(index).await
    }

    /// Creates the index `name` on `collection` unless an index with that name already exists.
    ///
    /// Only the name is compared; an existing index with different keys is left alone.
    ///
    /// # Arguments
    ///
    /// * `collection` - The name of the collection
    /// * `keys` - Ordered key specification for the index
    /// * `name` - The index name to look for and create
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoCollection`] if `collection` is empty, and otherwise surfaces any
    /// listing or creation error unchanged.
    pub async fn ensure_index(
        &self,
        collection: &str,
        keys: IndexKeys,
        name: &str,
    ) -> StoreResult<()> {
        self.reconcile_index(collection, IndexModel::new(name, keys)).await
    }

    /// Alias for [`StoreHelper::ensure_index`].
    pub async fn add_index_if_not_exists(
        &self,
        collection: &str,
        keys: IndexKeys,
        name: &str,
    ) -> StoreResult<()> {
        self.ensure_index(collection, keys, name).await
    }

    /// Like [`StoreHelper::ensure_index`], but a newly created index enforces uniqueness.
    pub async fn ensure_unique_index(
        &self,
        collection: &str,
        keys: IndexKeys,
        name: &str,
    ) -> StoreResult<()> {
        self.reconcile_index(collection, IndexModel::new(name, keys).unique(true))
            .await
    }

    async fn reconcile_index(&self, collection: &str, index: IndexModel) -> StoreResult<()> {
        if collection.is_empty() {
            return Err(StoreError::NoCollection);
        }

        if self.has_index(collection, &index.name).await? {
            debug!(collection, index = %index.name, "index already present");
            return Ok(());
        }

        let name = index.name.clone();
        self.create_index(collection, index).await?;
        info!(collection, index = %name, "created index");

        Ok(())
    }

    /// Runs an aggregation pipeline and returns the raw result documents.
    pub async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> StoreResult<Vec<Document>> {
        self.collection(collection).aggregate(pipeline).await
    }

    /// Releases backend resources.
    ///
    /// Other clones of this helper share the backend and become unusable afterwards.
    pub async fn shutdown(&self) -> StoreResult<()> {
        self.backend
            .shutdown()
            .await
            .map_err(|e| e.during("shutdown"))
    }
}
