//! Integration tests for the store helper: finds, writes and index management.

mod common;

use bson::{doc, oid::ObjectId};
use common::{Example, ExampleStrId, RecordingStore};
use dochelper::{
    CancellationToken, StoreHelper,
    backend::{InsertOneResult, StoreBackendBuilder},
    error::StoreError,
    index::IndexKeys,
    memory::InMemoryStore,
    page::FindOptions,
    query::{Filter, SortDirection},
};

async fn helper_with(count: i64) -> StoreHelper {
    let helper = StoreHelper::new(InMemoryStore::new());
    for num in 0..count {
        helper
            .insert_one("test", &Example::new(&format!("test{num}"), num))
            .await
            .unwrap();
    }
    helper
}

#[tokio::test]
async fn find_reports_page_metadata() {
    let helper = helper_with(11).await;
    let opts = FindOptions::builder()
        .page(3)
        .page_size(5)
        .sort("num", SortDirection::Asc)
        .build();

    let page = helper.find::<Example>("test", None, opts).await.unwrap();

    assert_eq!(page.total, 11);
    assert_eq!(page.page_size, 5);
    assert_eq!(page.current_page, 3);
    assert_eq!(page.number_of_pages, 3);
    assert_eq!(page.items.iter().map(|e| e.num).collect::<Vec<_>>(), vec![10]);
    assert!(!page.has_next_page());
}

#[tokio::test]
async fn find_without_page_size_returns_everything() {
    let helper = helper_with(11).await;

    let page = helper
        .find::<Example>("test", Some(Filter::lt("num", 7)), FindOptions::new())
        .await
        .unwrap();

    assert_eq!(page.total, 7);
    assert_eq!(page.items.len(), 7);
    assert_eq!((page.page_size, page.current_page, page.number_of_pages), (0, 0, 0));
}

#[tokio::test]
async fn find_on_low_page_starts_at_first() {
    let helper = helper_with(4).await;
    let opts = FindOptions::builder().page_size(3).sort("num", SortDirection::Desc).build();

    let page = helper.find::<Example>("test", None, opts).await.unwrap();

    assert_eq!(page.current_page, 1);
    assert_eq!(page.number_of_pages, 2);
    assert_eq!(page.items.iter().map(|e| e.num).collect::<Vec<_>>(), vec![3, 2, 1]);
}

#[tokio::test]
async fn find_on_empty_collection() {
    let helper = StoreHelper::new(InMemoryStore::new());

    let page = helper
        .find::<Example>("test", None, FindOptions::builder().page_size(10).build())
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert_eq!((page.total, page.current_page, page.number_of_pages), (0, 1, 0));
}

#[tokio::test]
async fn find_counts_before_querying() {
    let store = RecordingStore::new();
    let helper = store.helper();

    helper.find::<Example>("test", None, FindOptions::new()).await.unwrap();
    assert_eq!(store.calls(), vec!["count:test", "find:test"]);

    store.fail("count");
    let err = helper
        .find::<Example>("test", None, FindOptions::new())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("failed count on find"), "{err}");
    assert_eq!(store.count("find"), 1);
}

#[tokio::test]
async fn find_surfaces_decode_errors() {
    let store = InMemoryStore::builder()
        .collection("test", vec![doc! { "str": "test1", "num": "not a number" }])
        .build()
        .await
        .unwrap();
    let helper = StoreHelper::new(store);

    let err = helper
        .find::<Example>("test", None, FindOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err.root(), StoreError::Serialization(_)), "{err:?}");
}

#[tokio::test]
async fn find_one_populates_on_hit_and_keeps_item_on_miss() {
    let helper = helper_with(2).await;

    let mut found = Example::default();
    assert!(helper.find_one("test", &Filter::eq("num", 1), &mut found).await.unwrap());
    assert_eq!(found.str, "test1");
    assert!(found.id.is_some());

    let mut missing = Example::new("untouched", 42);
    assert!(!helper.find_one("test", &Filter::eq("num", 9), &mut missing).await.unwrap());
    assert_eq!(missing, Example::new("untouched", 42));
}

#[tokio::test]
async fn insert_returns_generated_object_id() {
    let helper = StoreHelper::new(InMemoryStore::new());

    let id = helper
        .insert_one("test", &Example::new("test1", 999))
        .await
        .unwrap()
        .unwrap();

    let mut stored = Example::default();
    helper.find_one("test", &Filter::id(id), &mut stored).await.unwrap();
    assert_eq!(stored.id, Some(id));
}

#[tokio::test]
async fn insert_with_string_identity_reports_no_object_id() {
    let helper = StoreHelper::new(InMemoryStore::new());
    let item = ExampleStrId {
        id: "test1".into(),
        num: 999,
    };

    assert_eq!(helper.insert_one("test2", &item).await.unwrap(), None);
    assert_eq!(helper.count("test2", Some(&Filter::id("test1"))).await.unwrap(), 1);
}

#[test]
fn insert_acknowledgement_decoding() {
    let id = ObjectId::new();
    let typed = InsertOneResult {
        inserted_id: Some(id.into()),
    };
    let foreign = InsertOneResult {
        inserted_id: Some("test1".into()),
    };
    let empty = InsertOneResult { inserted_id: None };

    assert_eq!(StoreHelper::id_from_insert_result(&typed).unwrap(), Some(id));
    assert_eq!(StoreHelper::id_from_insert_result(&foreign).unwrap(), None);
    assert!(matches!(
        StoreHelper::id_from_insert_result(&empty),
        Err(StoreError::UnexpectedInsertResult),
    ));
}

#[tokio::test]
async fn update_replaces_matching_document() {
    let helper = helper_with(1).await;

    helper
        .update_one("test", &Filter::eq("num", 0), &Example::new("replaced", 0))
        .await
        .unwrap();

    let mut stored = Example::default();
    helper.find_one("test", &Filter::eq("num", 0), &mut stored).await.unwrap();
    assert_eq!(stored.str, "replaced");
    assert!(stored.id.is_some());
}

#[tokio::test]
async fn update_without_match_is_an_error() {
    let helper = helper_with(1).await;

    let err = helper
        .update_one("test", &Filter::eq("num", 5), &Example::new("x", 5))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::NoMatches));
}

#[tokio::test]
async fn ensure_index_is_idempotent() {
    let store = RecordingStore::new();
    let helper = store.helper();
    let keys = IndexKeys::new().asc("num");

    helper.ensure_index("test", keys.clone(), "num_1").await.unwrap();
    helper.add_index_if_not_exists("test", keys.clone(), "num_1").await.unwrap();

    assert_eq!(store.count("create_index"), 1);
    assert_eq!(store.count("list_indexes"), 2);

    let index = helper.get_index("test", "num_1").await.unwrap().unwrap();
    assert_eq!(index.keys, keys);
    assert!(!index.unique);
}

#[tokio::test]
async fn ensure_index_compares_names_only() {
    let store = RecordingStore::new();
    let helper = store.helper();

    helper.ensure_index("test", IndexKeys::new().asc("num"), "idx").await.unwrap();
    helper.ensure_index("test", IndexKeys::new().desc("str"), "idx").await.unwrap();

    assert_eq!(store.count("create_index"), 1);
}

#[tokio::test]
async fn ensure_index_requires_collection() {
    let store = RecordingStore::new();

    let err = store
        .helper()
        .ensure_index("", IndexKeys::new().asc("num"), "num_1")
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::NoCollection));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn ensure_index_surfaces_store_errors() {
    let store = RecordingStore::new();
    let helper = store.helper();

    store.fail("create_index");
    let err = helper
        .ensure_index("test", IndexKeys::new().asc("num"), "num_1")
        .await
        .unwrap_err();
    assert!(matches!(err.root(), StoreError::Backend(_)));
    assert_eq!(store.count("create_index"), 1);

    store.fail("list_indexes");
    assert!(helper.has_index("test", "num_1").await.is_err());
}

#[tokio::test]
async fn unique_index_rejects_duplicates() {
    let helper = StoreHelper::new(InMemoryStore::new());

    helper
        .ensure_unique_index("test", IndexKeys::new().asc("str"), "str_1")
        .await
        .unwrap();
    assert!(helper.get_index("test", "str_1").await.unwrap().unwrap().unique);

    helper.insert_one("test", &Example::new("test1", 1)).await.unwrap();
    let err = helper.insert_one("test", &Example::new("test1", 2)).await.unwrap_err();
    assert!(matches!(err.root(), StoreError::DuplicateKey(..)));
}

#[tokio::test]
async fn aggregate_runs_pipeline() {
    let helper = helper_with(5).await;

    let result = helper
        .aggregate(
            "test",
            vec![doc! { "$sort": { "num": -1 } }, doc! { "$skip": 1 }, doc! { "$limit": 2 }],
        )
        .await
        .unwrap();
    let nums = result.iter().map(|d| d.get_i64("num").unwrap()).collect::<Vec<_>>();
    assert_eq!(nums, vec![3, 2]);

    let typed = helper
        .collection("test")
        .aggregate_as::<Example>(vec![doc! { "$match": { "num": 4_i64 } }])
        .await
        .unwrap();
    assert_eq!(typed.len(), 1);
    assert_eq!(typed[0].str, "test4");
}

#[tokio::test]
async fn cancelled_token_stops_operations() {
    let store = RecordingStore::new();
    let token = CancellationToken::new();
    let helper = store.helper().with_cancellation(token.clone());

    token.cancel();

    let err = helper.count("test", None).await.unwrap_err();
    assert!(matches!(err, StoreError::Cancelled(ref op) if op == "count"));

    let err = helper.insert_one("test", &Example::new("x", 1)).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_pending_call() {
    let store = RecordingStore::new();
    let token = CancellationToken::new();
    let helper = store.helper().with_cancellation(token.clone());

    store.stall("find", token);
    let err = helper
        .find::<Example>("test", None, FindOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Cancelled(ref op) if op == "find"));
}

#[tokio::test]
async fn scoped_helpers_share_the_backend() {
    let helper = StoreHelper::new(InMemoryStore::new());
    let scoped = helper.with_cancellation(CancellationToken::new());

    scoped.insert_one("test", &Example::new("shared", 1)).await.unwrap();

    assert_eq!(helper.count("test", None).await.unwrap(), 1);
    assert!(!helper.is_cancelled());
    helper.shutdown().await.unwrap();
}
