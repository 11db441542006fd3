#![allow(dead_code)]

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use dochelper::{
    CancellationToken, Model, StoreHelper,
    backend::{InsertOneResult, ReplaceResult, StoreBackend},
    error::{StoreError, StoreResult},
    index::{IndexDescriptor, IndexModel},
    memory::InMemoryStore,
    query::{Expr, Query},
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Model)]
pub struct Example {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
    pub id: Option<ObjectId>,
    pub str: String,
    pub num: i64,
}

impl Example {
    pub fn new(str: &str, num: i64) -> Self {
        Self {
            id: None,
            str: str.to_string(),
            num,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Model)]
pub struct ExampleStrId {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub num: i64,
}

/// Wraps the in-memory store, logging every call and optionally failing or stalling one kind.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: InMemoryStore,
    log: Mutex<Vec<String>>,
    failing: Mutex<Option<&'static str>>,
    stall: Mutex<Option<(&'static str, CancellationToken)>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn helper(self: &Arc<Self>) -> StoreHelper {
        StoreHelper::from_arc(self.clone())
    }

    /// Makes every call of `op` fail with a backend error.
    pub fn fail(&self, op: &'static str) {
        *self.failing.lock().unwrap() = Some(op);
    }

    /// Makes the next call of `op` cancel `token` and never complete.
    pub fn stall(&self, op: &'static str, token: CancellationToken) {
        *self.stall.lock().unwrap() = Some((op, token));
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Number of recorded calls of `op`, across collections.
    pub fn count(&self, op: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.split(':').next() == Some(op))
            .count()
    }

    async fn enter(&self, op: &'static str, collection: &str) -> StoreResult<()> {
        self.log.lock().unwrap().push(format!("{op}:{collection}"));

        let stalled = {
            let mut stall = self.stall.lock().unwrap();
            match stall.as_ref() {
                Some((stalled_op, _)) if *stalled_op == op => stall.take(),
                _ => None,
            }
        };
        if let Some((_, token)) = stalled {
            token.cancel();
            futures::future::pending::<()>().await;
        }

        if *self.failing.lock().unwrap() == Some(op) {
            return Err(StoreError::Backend(format!("injected {op} failure")));
        }

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for RecordingStore {
    async fn count_documents(&self, collection: &str, filter: Option<&Expr>) -> StoreResult<u64> {
        self.enter("count", collection).await?;
        self.inner.count_documents(collection, filter).await
    }

    async fn find_documents(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.enter("find", collection).await?;
        self.inner.find_documents(collection, query).await
    }

    async fn find_one_document(
        &self,
        collection: &str,
        filter: &Expr,
    ) -> StoreResult<Option<Document>> {
        self.enter("find_one", collection).await?;
        self.inner.find_one_document(collection, filter).await
    }

    async fn insert_document(
        &self,
        collection: &str,
        document: Document,
    ) -> StoreResult<InsertOneResult> {
        self.enter("insert", collection).await?;
        self.inner.insert_document(collection, document).await
    }

    async fn replace_document(
        &self,
        collection: &str,
        filter: &Expr,
        document: Document,
    ) -> StoreResult<ReplaceResult> {
        self.enter("replace", collection).await?;
        self.inner.replace_document(collection, filter, document).await
    }

    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexDescriptor>> {
        self.enter("list_indexes", collection).await?;
        self.inner.list_indexes(collection).await
    }

    async fn create_index(&self, collection: &str, index: IndexModel) -> StoreResult<()> {
        self.enter("create_index", collection).await?;
        self.inner.create_index(collection, index).await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> StoreResult<Vec<Document>> {
        self.enter("aggregate", collection).await?;
        self.inner.aggregate(collection, pipeline).await
    }
}
