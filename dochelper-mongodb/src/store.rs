use async_trait::async_trait;
use bson::Document;
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, IndexModel as MongoIndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dochelper_core::{
    backend::{InsertOneResult, ReplaceResult, StoreBackend, StoreBackendBuilder},
    error::{StoreError, StoreResult},
    index::{IndexDescriptor, IndexModel},
    query::{Expr, Query},
};

use crate::query::MongoQueryTranslator;

const DUPLICATE_KEY: i32 = 11000;
const NAMESPACE_NOT_FOUND: i32 = 26;

fn backend_error(collection: &str, error: MongoError) -> StoreError {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
            StoreError::DuplicateKey(write.message.clone(), collection.to_string())
        }
        _ => StoreError::Backend(error.to_string()),
    }
}

fn is_namespace_not_found(error: &MongoError) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Command(command) if command.code == NAMESPACE_NOT_FOUND
    )
}

#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn count_documents(&self, collection: &str, filter: Option<&Expr>) -> StoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::translate(filter)?)
            .await
            .map_err(|e| backend_error(collection, e))
    }

    async fn find_documents(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        options.skip = query.skip;
        options.sort = MongoQueryTranslator::sort(&query.sort);

        self.get_collection(collection)
            .find(MongoQueryTranslator::translate(query.filter.as_ref())?)
            .with_options(options)
            .await
            .map_err(|e| backend_error(collection, e))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| backend_error(collection, e))
    }

    async fn find_one_document(
        &self,
        collection: &str,
        filter: &Expr,
    ) -> StoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(MongoQueryTranslator::translate(Some(filter))?)
            .await
            .map_err(|e| backend_error(collection, e))
    }

    async fn insert_document(
        &self,
        collection: &str,
        document: Document,
    ) -> StoreResult<InsertOneResult> {
        let result = self
            .get_collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| backend_error(collection, e))?;

        Ok(InsertOneResult {
            inserted_id: Some(result.inserted_id),
        })
    }

    async fn replace_document(
        &self,
        collection: &str,
        filter: &Expr,
        document: Document,
    ) -> StoreResult<ReplaceResult> {
        let result = self
            .get_collection(collection)
            .replace_one(MongoQueryTranslator::translate(Some(filter))?, document)
            .await
            .map_err(|e| backend_error(collection, e))?;

        Ok(ReplaceResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexDescriptor>> {
        let cursor = match self.get_collection(collection).list_indexes().await {
            Ok(cursor) => cursor,
            Err(e) if is_namespace_not_found(&e) => return Ok(vec![]),
            Err(e) => return Err(backend_error(collection, e)),
        };

        let indexes = cursor
            .try_collect::<Vec<MongoIndexModel>>()
            .await
            .map_err(|e| backend_error(collection, e))?;

        Ok(indexes
            .into_iter()
            .map(|index| {
                let options = index.options.unwrap_or_default();
                IndexDescriptor {
                    name: options.name.unwrap_or_default(),
                    keys: index.keys.into(),
                    unique: options.unique.unwrap_or(false),
                }
            })
            .collect())
    }

    async fn create_index(&self, collection: &str, index: IndexModel) -> StoreResult<()> {
        debug!(collection, index = %index.name, unique = index.unique, "creating index");

        self.get_collection(collection)
            .create_index(
                MongoIndexModel::builder()
                    .keys(index.keys.into_document())
                    .options(
                        IndexOptions::builder()
                            .name(index.name)
                            .unique(index.unique)
                            .build(),
                    )
                    .build(),
            )
            .await
            .map_err(|e| backend_error(collection, e))?;

        Ok(())
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> StoreResult<Vec<Document>> {
        self.get_collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(|e| backend_error(collection, e))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| backend_error(collection, e))
    }

    async fn shutdown(&self) -> StoreResult<()> {
        self.client.clone().shutdown().await;
        info!(database = %self.database, "mongodb client shut down");

        Ok(())
    }
}

/// Connection settings, deserializable from application configuration.
///
/// ```ignore
/// let config: MongoDbConfig = serde_json::from_str(r#"{
///     "uri": "mongodb://localhost:27017",
///     "database": "app",
///     "app_name": "seeder"
/// }"#)?;
/// let store = MongoDbStore::from_config(config).build().await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoDbConfig {
    pub uri: String,
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
}

impl MongoDbStore {
    pub fn from_config(config: MongoDbConfig) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::from(config)
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    app_name: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            app_name: None,
        }
    }

    /// Name reported to the server in the connection handshake.
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

impl From<MongoDbConfig> for MongoDbStoreBuilder {
    fn from(config: MongoDbConfig) -> Self {
        Self {
            dsn: config.uri,
            database: config.database,
            app_name: config.app_name,
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        if self.database.is_empty() {
            return Err(StoreError::Initialization("database name is empty".to_string()));
        }

        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| StoreError::Initialization(e.to_string()))?;
        if self.app_name.is_some() {
            options.app_name = self.app_name;
        }

        let client =
            Client::with_options(options).map_err(|e| StoreError::Initialization(e.to_string()))?;
        info!(database = %self.database, "connected to mongodb");

        Ok(MongoDbStore::new(client, self.database))
    }
}
