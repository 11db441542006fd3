//! A handle to a single named collection.
//!
//! [`Collection`] is what [`StoreHelper`](crate::helper::StoreHelper) hands out for per-collection
//! work. Every call is a suspend point that races the backend against the helper's cancellation
//! token and tags failures with the operation's name.
//!
//! # Example
//!
//! ```ignore
//! let countries = helper.collection("countries");
//!
//! let mut gb = Country::default();
//! if countries.find_one(&Filter::eq("code", "GB"), &mut gb).await? {
//!     println!("found {:?}", gb.id);
//! }
//! ```

use bson::{Document, oid::ObjectId};
use futures::future::{self, Either};
use serde::{Serialize, de::DeserializeOwned};
use std::{future::Future, pin::pin};
use tokio_util::sync::CancellationToken;

use crate::{
    backend::{InsertOneResult, StoreBackend},
    error::{StoreError, StoreResult},
    index::{IndexDescriptor, IndexModel},
    model::{ModelExt, from_document},
    page::{FindOptions, Pagination, PaginationResult},
    query::{Expr, Query},
};

/// Decodes the identity out of an insert acknowledgement.
///
/// - an `ObjectId` is returned as `Some(id)`;
/// - any other non-null identity (a caller-supplied string, say) yields `Ok(None)`;
/// - a missing or null identity is [`StoreError::UnexpectedInsertResult`].
///
/// The middle case reports success with no identity even though the store did accept one.
/// This is kept as-is, but a caller that needs the accepted value must read it from the
/// acknowledgement directly.
pub fn id_from_insert_result(result: &InsertOneResult) -> StoreResult<Option<ObjectId>> {
    match &result.inserted_id {
        Some(bson::Bson::ObjectId(id)) => Ok(Some(*id)),
        Some(bson::Bson::Null) | None => Err(StoreError::UnexpectedInsertResult),
        Some(_) => Ok(None),
    }
}

/// A named collection bound to a backend and a cancellation token.
#[derive(Debug)]
pub struct Collection<'a> {
    name: String,
    backend: &'a dyn StoreBackend,
    cancel: &'a CancellationToken,
}

impl<'a> Collection<'a> {
    pub(crate) fn new(
        name: String,
        backend: &'a dyn StoreBackend,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            name,
            backend,
            cancel,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `operation` unless the token fires first.
    ///
    /// Backend errors are wrapped with `op`; cancellation surfaces as [`StoreError::Cancelled`].
    async fn guard<T>(
        &self,
        op: &'static str,
        operation: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled(op.to_string()));
        }

        let cancelled = pin!(self.cancel.cancelled());
        let operation = pin!(operation);

        match future::select(cancelled, operation).await {
            Either::Left(((), _)) => Err(StoreError::Cancelled(op.to_string())),
            Either::Right((result, _)) => result.map_err(|e| e.during(op)),
        }
    }

    /// Counts the documents matching `filter`.
    pub async fn count(&self, filter: Option<&Expr>) -> StoreResult<u64> {
        self.guard("count", self.backend.count_documents(&self.name, filter))
            .await
    }

    /// Finds the documents matching `filter` and decodes them into `T`.
    ///
    /// The matches are counted first so the result carries the total and page metadata.
    /// With `opts.page_size == 0` every match is returned and the page fields stay zero.
    ///
    /// # Errors
    ///
    /// Fails if counting, querying or decoding any document fails.
    pub async fn find<T: DeserializeOwned>(
        &self,
        filter: Option<Expr>,
        opts: FindOptions,
    ) -> StoreResult<PaginationResult<T>> {
        let total = self
            .guard(
                "count on find",
                self.backend.count_documents(&self.name, filter.as_ref()),
            )
            .await?;

        let pagination = Pagination::calculate(total, opts.page, opts.page_size);
        let query = Query {
            filter,
            sort: opts.sort,
            skip: pagination.skip,
            limit: pagination.limit,
        };

        let items = self
            .guard("find", self.backend.find_documents(&self.name, &query))
            .await?
            .into_iter()
            .map(from_document::<T>)
            .collect::<StoreResult<Vec<T>>>()
            .map_err(|e| e.during("find"))?;

        Ok(PaginationResult::new(items, total, pagination))
    }

    /// Looks up the first document matching `filter` and decodes it into `item`.
    ///
    /// Returns `false` and leaves `item` untouched when nothing matches; a miss is not an error.
    pub async fn find_one<T: DeserializeOwned>(
        &self,
        filter: &Expr,
        item: &mut T,
    ) -> StoreResult<bool> {
        let found = self
            .guard("find one", self.backend.find_one_document(&self.name, filter))
            .await?;

        match found {
            Some(document) => {
                *item = from_document(document).map_err(|e| e.during("decode on find one"))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Inserts `item` and returns the generated identity.
    ///
    /// See [`id_from_insert_result`] for how the acknowledgement is decoded.
    pub async fn insert_one<T: Serialize>(&self, item: &T) -> StoreResult<Option<ObjectId>> {
        let document = item.to_document()?;
        let result = self
            .guard("insert one", self.backend.insert_document(&self.name, document))
            .await?;

        id_from_insert_result(&result)
    }

    /// Replaces the first document matching `filter` with `item`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoMatches`] when no document matched.
    pub async fn update_one<T: Serialize>(&self, filter: &Expr, item: &T) -> StoreResult<()> {
        let document = item.to_document()?;
        let result = self
            .guard(
                "update one",
                self.backend.replace_document(&self.name, filter, document),
            )
            .await?;

        if result.matched_count == 0 {
            return Err(StoreError::NoMatches);
        }

        Ok(())
    }

    pub async fn list_indexes(&self) -> StoreResult<Vec<IndexDescriptor>> {
        self.guard("list indexes", self.backend.list_indexes(&self.name))
            .await
    }

    pub async fn create_index(&self, index: IndexModel) -> StoreResult<()> {
        self.guard("create index", self.backend.create_index(&self.name, index))
            .await
    }

    /// Runs an aggregation pipeline against this collection.
    pub async fn aggregate(&self, pipeline: Vec<Document>) -> StoreResult<Vec<Document>> {
        self.guard("aggregate", self.backend.aggregate(&self.name, pipeline))
            .await
    }

    /// Runs an aggregation pipeline and decodes every resulting document into `T`.
    pub async fn aggregate_as<T: DeserializeOwned>(
        &self,
        pipeline: Vec<Document>,
    ) -> StoreResult<Vec<T>> {
        self.aggregate(pipeline)
            .await?
            .into_iter()
            .map(from_document::<T>)
            .collect::<StoreResult<Vec<T>>>()
            .map_err(|e| e.during("decode on aggregate"))
    }
}
