//! In-memory storage implementation.
//!
//! Collections keep their documents in insertion order, which is also the natural order of
//! unsorted finds. Every collection starts with the implicit unique `_id_` index.

use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use mea::rwlock::RwLock;
use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use dochelper_core::{
    backend::{InsertOneResult, ReplaceResult, StoreBackend, StoreBackendBuilder},
    error::{StoreError, StoreResult},
    index::{IndexDescriptor, IndexKeys, IndexModel},
    query::{Expr, Filter, Query, Sort, SortDirection},
};

use crate::evaluator::{Comparable, DocumentEvaluator, lookup};

const ID_FIELD: &str = "_id";
const ID_INDEX: &str = "_id_";

#[derive(Debug)]
struct CollectionData {
    documents: Vec<Document>,
    indexes: Vec<IndexDescriptor>,
}

impl Default for CollectionData {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            indexes: vec![IndexDescriptor {
                name: ID_INDEX.to_string(),
                keys: IndexKeys::new().asc(ID_FIELD),
                unique: true,
            }],
        }
    }
}

impl CollectionData {
    fn matching<'a>(
        &'a self,
        filter: Option<&'a Expr>,
    ) -> impl Iterator<Item = StoreResult<(usize, &'a Document)>> + 'a {
        self.documents
            .iter()
            .enumerate()
            .filter_map(move |(position, document)| {
                match DocumentEvaluator::matches(document, filter) {
                    Ok(true) => Some(Ok((position, document))),
                    Ok(false) => None,
                    Err(err) => Some(Err(err)),
                }
            })
    }

    /// Rejects `candidate` if it collides with another document on any unique index.
    fn check_unique(
        &self,
        collection: &str,
        candidate: &Document,
        replacing: Option<usize>,
    ) -> StoreResult<()> {
        for index in self.indexes.iter().filter(|index| index.unique) {
            let key = index_key(candidate, &index.keys);

            let collides = self
                .documents
                .iter()
                .enumerate()
                .filter(|(position, _)| Some(*position) != replacing)
                .any(|(_, document)| same_key(&key, &index_key(document, &index.keys)));

            if collides {
                return Err(StoreError::DuplicateKey(describe_key(&key), collection.to_string()));
            }
        }

        Ok(())
    }
}

type StoreMap = HashMap<String, CollectionData>;

fn index_key(document: &Document, keys: &IndexKeys) -> Vec<Bson> {
    keys.fields()
        .map(|field| lookup(document, field).cloned().unwrap_or(Bson::Null))
        .collect()
}

fn same_key(left: &[Bson], right: &[Bson]) -> bool {
    left.iter()
        .zip(right)
        .all(|(l, r)| Comparable::from(l) == Comparable::from(r))
}

fn describe_key(key: &[Bson]) -> String {
    match key {
        [single] => single.to_string(),
        many => {
            let parts = many.iter().map(Bson::to_string).collect::<Vec<_>>();
            format!("({})", parts.join(", "))
        }
    }
}

fn compare_documents(left: &Document, right: &Document, sort: &[Sort]) -> Ordering {
    for key in sort {
        let l = lookup(left, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);
        let r = lookup(right, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = match key.direction {
            SortDirection::Asc => l.sort_cmp(&r),
            SortDirection::Desc => r.sort_cmp(&l),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// Rebuilds `document` so that `_id` comes first and holds `id`.
fn with_id(id: Bson, document: Document) -> Document {
    let mut stored = doc! { ID_FIELD: id };
    for (key, value) in document {
        if key != ID_FIELD {
            stored.insert(key, value);
        }
    }
    stored
}

fn stage_count(stage: &str, value: &Bson) -> StoreResult<usize> {
    let count = match value {
        Bson::Int32(n) => u64::try_from(*n).ok(),
        Bson::Int64(n) => u64::try_from(*n).ok(),
        Bson::Double(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as u64),
        _ => None,
    };

    count
        .map(to_usize)
        .ok_or_else(|| {
            StoreError::InvalidDocument(format!("{stage} expects a non-negative integer"))
        })
}

fn match_stage(spec: &Document) -> StoreResult<Expr> {
    spec.iter()
        .map(|(field, value)| match value {
            Bson::Document(inner) if inner.keys().any(|k| k.starts_with('$')) => Err(
                StoreError::InvalidDocument(format!("unsupported $match operator on '{field}'")),
            ),
            _ => Ok(Filter::eq(field.as_str(), value.clone())),
        })
        .collect::<StoreResult<Vec<_>>>()
        .map(Filter::and)
}

fn sort_stage(spec: &Document) -> StoreResult<Vec<Sort>> {
    spec.iter()
        .map(|(field, value)| {
            let direction = match value {
                Bson::Int32(1) | Bson::Int64(1) => SortDirection::Asc,
                Bson::Int32(-1) | Bson::Int64(-1) => SortDirection::Desc,
                Bson::Double(d) if *d == 1.0 => SortDirection::Asc,
                Bson::Double(d) if *d == -1.0 => SortDirection::Desc,
                _ => {
                    return Err(StoreError::InvalidDocument(format!(
                        "$sort direction for '{field}' must be 1 or -1"
                    )));
                }
            };
            Ok(Sort::new(field.as_str(), direction))
        })
        .collect()
}

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable; clones share the same underlying data. Queries scan every
/// document of a collection, and indexes exist only for listing and uniqueness checks.
///
/// # Example
///
/// ```ignore
/// use dochelper_memory::InMemoryStore;
/// use dochelper::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let ack = store.insert_document("test", doc! { "str": "test1", "num": 999 }).await?;
/// assert!(ack.inserted_id.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Names of the collections created so far, in no particular order.
    pub async fn collection_names(&self) -> Vec<String> {
        self.store.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn count_documents(&self, collection: &str, filter: Option<&Expr>) -> StoreResult<u64> {
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(0);
        };

        let mut count = 0_u64;
        for found in data.matching(filter) {
            found?;
            count += 1;
        }

        Ok(count)
    }

    async fn find_documents(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut found = data
            .matching(query.filter.as_ref())
            .map(|found| found.map(|(_, document)| document))
            .collect::<StoreResult<Vec<_>>>()?;

        if !query.sort.is_empty() {
            found.sort_by(|a, b| compare_documents(a, b, &query.sort));
        }

        Ok(found
            .into_iter()
            .skip(query.skip.map(to_usize).unwrap_or(0))
            .take(query.limit.map(to_usize).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn find_one_document(
        &self,
        collection: &str,
        filter: &Expr,
    ) -> StoreResult<Option<Document>> {
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(None);
        };

        match data.matching(Some(filter)).next() {
            Some(found) => found.map(|(_, document)| Some(document.clone())),
            None => Ok(None),
        }
    }

    async fn insert_document(
        &self,
        collection: &str,
        document: Document,
    ) -> StoreResult<InsertOneResult> {
        let mut store = self.store.write().await;
        let data = store.entry(collection.to_string()).or_default();

        let id = match document.get(ID_FIELD) {
            None | Some(Bson::Null) => Bson::ObjectId(ObjectId::new()),
            Some(id) => id.clone(),
        };
        let document = with_id(id.clone(), document);

        data.check_unique(collection, &document, None)?;
        data.documents.push(document);

        Ok(InsertOneResult {
            inserted_id: Some(id),
        })
    }

    async fn replace_document(
        &self,
        collection: &str,
        filter: &Expr,
        document: Document,
    ) -> StoreResult<ReplaceResult> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(ReplaceResult::default());
        };

        let Some(position) = data.matching(Some(filter)).next().transpose()?.map(|(p, _)| p)
        else {
            return Ok(ReplaceResult::default());
        };

        let existing_id = data.documents[position]
            .get(ID_FIELD)
            .cloned()
            .unwrap_or(Bson::Null);

        match document.get(ID_FIELD) {
            None | Some(Bson::Null) => {}
            Some(id) if Comparable::from(id) == Comparable::from(&existing_id) => {}
            Some(id) => {
                return Err(StoreError::InvalidDocument(format!(
                    "replacement would change _id from {existing_id} to {id}"
                )));
            }
        }

        let document = with_id(existing_id, document);
        data.check_unique(collection, &document, Some(position))?;

        let modified = data.documents[position] != document;
        data.documents[position] = document;

        Ok(ReplaceResult {
            matched_count: 1,
            modified_count: u64::from(modified),
        })
    }

    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexDescriptor>> {
        Ok(self
            .store
            .read()
            .await
            .get(collection)
            .map(|data| data.indexes.clone())
            .unwrap_or_default())
    }

    async fn create_index(&self, collection: &str, index: IndexModel) -> StoreResult<()> {
        if index.keys.is_empty() {
            return Err(StoreError::InvalidDocument(format!(
                "index '{}' has no keys",
                index.name
            )));
        }

        let mut store = self.store.write().await;
        let data = store.entry(collection.to_string()).or_default();

        if let Some(existing) = data.indexes.iter().find(|i| i.name == index.name) {
            if existing.keys == index.keys && existing.unique == index.unique {
                return Ok(());
            }
            return Err(StoreError::Backend(format!(
                "index '{}' already exists on {collection} with different options",
                index.name
            )));
        }

        if index.unique {
            let keys = data
                .documents
                .iter()
                .map(|document| index_key(document, &index.keys))
                .collect::<Vec<_>>();

            for (i, key) in keys.iter().enumerate() {
                if keys[..i].iter().any(|earlier| same_key(key, earlier)) {
                    return Err(StoreError::DuplicateKey(describe_key(key), collection.to_string()));
                }
            }
        }

        data.indexes.push(index.into());

        Ok(())
    }

    /// Supports `$match` (top-level equality only), `$sort`, `$skip`, `$limit` and `$count`.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> StoreResult<Vec<Document>> {
        let mut documents = self
            .store
            .read()
            .await
            .get(collection)
            .map(|data| data.documents.clone())
            .unwrap_or_default();

        for stage in &pipeline {
            let mut entries = stage.iter();
            let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
                return Err(StoreError::InvalidDocument(
                    "aggregation stages must have exactly one field".to_string(),
                ));
            };

            match (name.as_str(), spec) {
                ("$match", Bson::Document(spec)) => {
                    let filter = match_stage(spec)?;
                    let mut kept = Vec::with_capacity(documents.len());
                    for document in documents {
                        if DocumentEvaluator::matches(&document, Some(&filter))? {
                            kept.push(document);
                        }
                    }
                    documents = kept;
                }
                ("$sort", Bson::Document(spec)) => {
                    let sort = sort_stage(spec)?;
                    documents.sort_by(|a, b| compare_documents(a, b, &sort));
                }
                ("$skip", value) => {
                    let skip = stage_count("$skip", value)?;
                    documents = documents.into_iter().skip(skip).collect();
                }
                ("$limit", value) => {
                    documents.truncate(stage_count("$limit", value)?);
                }
                ("$count", Bson::String(field)) => {
                    let count = i64::try_from(documents.len()).unwrap_or(i64::MAX);
                    documents = if count == 0 { vec![] } else { vec![doc! { field: count }] };
                }
                (name, _) => {
                    return Err(StoreError::InvalidDocument(format!(
                        "unsupported aggregation stage '{name}'"
                    )));
                }
            }
        }

        Ok(documents)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// Collections added with [`InMemoryStoreBuilder::collection`] are loaded on build through the
/// regular insert path, so identities are generated and duplicates rejected as usual.
///
/// # Example
///
/// ```ignore
/// use dochelper_memory::InMemoryStore;
/// use dochelper::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .collection("test", vec![doc! { "str": "test1", "num": 999 }])
///     .build()
///     .await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    collections: Vec<(String, Vec<Document>)>,
}

impl InMemoryStoreBuilder {
    pub fn collection(mut self, name: impl Into<String>, documents: Vec<Document>) -> Self {
        self.collections.push((name.into(), documents));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        let store = InMemoryStore::new();

        for (name, documents) in self.collections {
            store.store.write().await.entry(name.clone()).or_default();
            for document in documents {
                store
                    .insert_document(&name, document)
                    .await
                    .map_err(|e| StoreError::Initialization(e.to_string()))?;
            }
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dochelper_core::query::QueryBuilder;

    #[tokio::test]
    async fn insert_generates_leading_object_id() {
        let store = InMemoryStore::new();

        let ack = store
            .insert_document("test", doc! { "str": "test1", "_id": Bson::Null })
            .await
            .unwrap();
        let Some(Bson::ObjectId(id)) = ack.inserted_id else {
            panic!("expected generated ObjectId, got {:?}", ack.inserted_id);
        };

        let stored = store.find_one_document("test", &Filter::id(id)).await.unwrap().unwrap();
        assert_eq!(stored.keys().next().map(String::as_str), Some("_id"));
        assert_eq!(stored.get_str("str").unwrap(), "test1");
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = InMemoryStore::new();
        store.insert_document("test2", doc! { "_id": "test1", "num": 1 }).await.unwrap();

        let err = store
            .insert_document("test2", doc! { "_id": "test1", "num": 2 })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_, ref c) if c == "test2"));
        assert_eq!(store.count_documents("test2", None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn integer_ids_beyond_double_precision_stay_distinct() {
        let store = InMemoryStore::new();
        let (low, high) = (1_i64 << 53, (1_i64 << 53) + 1);

        store.insert_document("test", doc! { "_id": low, "num": 1 }).await.unwrap();
        store.insert_document("test", doc! { "_id": high, "num": 2 }).await.unwrap();

        assert_eq!(store.count_documents("test", None).await.unwrap(), 2);
        let stored = store
            .find_one_document("test", &Filter::id(high))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.get_i32("num").unwrap(), 2);
    }

    #[tokio::test]
    async fn replace_keeps_matched_identity() {
        let store = InMemoryStore::new();
        let ack = store.insert_document("test", doc! { "str": "a", "num": 1 }).await.unwrap();
        let id = ack.inserted_id.unwrap();

        let result = store
            .replace_document("test", &Filter::eq("num", 1), doc! { "str": "b", "num": 1 })
            .await
            .unwrap();
        assert_eq!(
            result,
            ReplaceResult {
                matched_count: 1,
                modified_count: 1
            }
        );

        let stored = store.find_one_document("test", &Filter::eq("num", 1)).await.unwrap().unwrap();
        assert_eq!(stored, doc! { "_id": id, "str": "b", "num": 1 });

        let err = store
            .replace_document(
                "test",
                &Filter::eq("num", 1),
                doc! { "_id": ObjectId::new(), "num": 1 },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn replace_without_match_reports_zero() {
        let store = InMemoryStore::new();

        let result = store
            .replace_document("test", &Filter::eq("num", 1), doc! { "num": 1 })
            .await
            .unwrap();
        assert_eq!(result.matched_count, 0);
    }

    #[tokio::test]
    async fn find_sorts_skips_and_limits() {
        let store = InMemoryStore::builder()
            .collection(
                "test",
                vec![
                    doc! { "str": "b", "num": 2 },
                    doc! { "str": "a", "num": 2 },
                    doc! { "str": "c", "num": 1 },
                    doc! { "str": "d", "num": 3 },
                ],
            )
            .build()
            .await
            .unwrap();

        let query = QueryBuilder::new()
            .filter(Filter::gte("num", 2))
            .sort("num", SortDirection::Asc)
            .sort("str", SortDirection::Asc)
            .skip(1)
            .limit(5)
            .build();
        let found = store.find_documents("test", &query).await.unwrap();

        let names = found.iter().map(|d| d.get_str("str").unwrap()).collect::<Vec<_>>();
        assert_eq!(names, vec!["b", "d"]);
    }

    #[tokio::test]
    async fn indexes_start_with_id_and_reject_conflicts() {
        let store = InMemoryStore::new();
        store.insert_document("test", doc! { "num": 1 }).await.unwrap();

        let index = IndexModel::new("num_1", IndexKeys::new().asc("num"));
        store.create_index("test", index.clone()).await.unwrap();
        store.create_index("test", index).await.unwrap();

        let names = store
            .list_indexes("test")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["_id_", "num_1"]);

        let conflicting = IndexModel::new("num_1", IndexKeys::new().desc("num"));
        assert!(store.create_index("test", conflicting).await.is_err());
    }

    #[tokio::test]
    async fn unique_indexes_are_enforced() {
        let store = InMemoryStore::new();
        let index = IndexModel::new("str_1", IndexKeys::new().asc("str")).unique(true);
        store.create_index("test", index).await.unwrap();

        store.insert_document("test", doc! { "str": "test1" }).await.unwrap();
        let err = store.insert_document("test", doc! { "str": "test1" }).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(..)));
    }

    #[tokio::test]
    async fn aggregation_subset() {
        let store = InMemoryStore::builder()
            .collection(
                "test",
                vec![
                    doc! { "str": "x", "num": 3 },
                    doc! { "str": "y", "num": 1 },
                    doc! { "str": "x", "num": 2 },
                ],
            )
            .build()
            .await
            .unwrap();

        let sorted = store
            .aggregate(
                "test",
                vec![
                    doc! { "$match": { "str": "x" } },
                    doc! { "$sort": { "num": 1 } },
                    doc! { "$limit": 1 },
                ],
            )
            .await
            .unwrap();
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].get_i32("num").unwrap(), 2);

        let counted = store
            .aggregate("test", vec![doc! { "$match": { "str": "x" } }, doc! { "$count": "total" }])
            .await
            .unwrap();
        assert_eq!(counted, vec![doc! { "total": 2_i64 }]);

        let unsupported = store.aggregate("test", vec![doc! { "$group": { "_id": "$str" } }]).await;
        assert!(matches!(unsupported, Err(StoreError::InvalidDocument(_))));
    }
}
