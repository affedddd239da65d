use std::collections::HashSet;

use super::*;
use crate::storage::{FingerprintRecord, JsonCodec};

type Store = MockFingerprintStore<JsonCodec<FingerprintRecord>>;

fn fp(n: u32) -> FingerprintId {
    FingerprintId::parse(&format!("{:032x}", n)).unwrap()
}

fn record(n: u32) -> FingerprintRecord {
    FingerprintRecord::new(fp(n), format!("artifact-{}.jar", n))
}

fn store(instance: &str) -> Store {
    MockFingerprintStore::new(InstanceId::new(instance).unwrap(), JsonCodec::new())
}

#[tokio::test]
async fn test_mock_save_and_load() {
    let store = store("a");
    let mut r = record(1);
    r.add_usage("build", 4);

    store.save(&r).await.unwrap();

    assert_eq!(store.load(&fp(1)).await.unwrap(), Some(r));
    assert_eq!(store.load(&fp(2)).await.unwrap(), None);
}

#[tokio::test]
async fn test_mock_uses_redis_key_layout() {
    let store = store("inst");
    store.save(&record(7)).await.unwrap();

    let record_key = format!("inst{}", fp(7));
    assert!(store.keyspace().get_raw(&record_key).await.is_some());
    assert!(store
        .keyspace()
        .members("INSTANCE:inst")
        .await
        .contains(fp(7).as_str()));
}

#[tokio::test]
async fn test_mock_delete_removes_record_and_index_entry() {
    let store = store("a");
    store.save(&record(1)).await.unwrap();

    store.delete(&fp(1)).await.unwrap();
    store.delete(&fp(1)).await.unwrap();

    assert_eq!(store.load(&fp(1)).await.unwrap(), None);
    assert!(!store.is_ready().await.unwrap());
    assert_eq!(store.keyspace().value_count().await, 0);
}

#[tokio::test]
async fn test_mock_shared_keyspace_isolates_instances() {
    let keyspace = MockKeyspace::new();
    let a = MockFingerprintStore::with_keyspace(
        keyspace.clone(),
        InstanceId::new("a").unwrap(),
        JsonCodec::<FingerprintRecord>::new(),
    );
    let b = MockFingerprintStore::with_keyspace(
        keyspace.clone(),
        InstanceId::new("b").unwrap(),
        JsonCodec::<FingerprintRecord>::new(),
    );

    a.save(&record(1)).await.unwrap();

    assert!(a.load(&fp(1)).await.unwrap().is_some());
    assert!(b.load(&fp(1)).await.unwrap().is_none());
    assert!(!b.is_ready().await.unwrap());

    b.delete(&fp(1)).await.unwrap();
    assert!(a.load(&fp(1)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_mock_corrupt_blob() {
    let store = store("a");
    store
        .keyspace()
        .set_raw(store.keys().record_key(&fp(3)), "definitely not json")
        .await;

    match store.load(&fp(3)).await {
        Err(StoreError::CorruptRecord { id, .. }) => assert_eq!(id, fp(3).to_string()),
        other => panic!("expected CorruptRecord, got {:?}", other),
    }
}

#[tokio::test]
async fn test_mock_bulk_load_preserves_order() {
    let store = store("a");
    let (one, three) = (record(1), record(3));
    store.save(&one).await.unwrap();
    store.save(&three).await.unwrap();
    store
        .keyspace()
        .set_raw(store.keys().record_key(&fp(4)), "<fingerprint/>")
        .await;

    let outcomes = store
        .bulk_load(&[fp(3), fp(2), fp(4), fp(1)])
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[0], LoadOutcome::Found(three));
    assert!(outcomes[1].is_absent());
    assert!(outcomes[2].is_corrupt());
    assert_eq!(outcomes[3], LoadOutcome::Found(one));
}

#[tokio::test]
async fn test_mock_scan_visits_every_id() {
    let store = store("a");
    for n in 0..25 {
        store.save(&record(n)).await.unwrap();
    }

    let mut cursor = ScanCursor::START;
    let mut seen = HashSet::new();
    let mut pages = 0;
    loop {
        let page = store.scan_index(&cursor, 10).await.unwrap();
        assert!(page.ids.len() <= 10);
        seen.extend(page.ids);
        pages += 1;
        cursor = page.cursor;
        if cursor.is_start() {
            break;
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 25);
}

#[tokio::test]
async fn test_mock_scan_tolerates_concurrent_removal() {
    let store = store("a");
    for n in 0..6 {
        store.save(&record(n)).await.unwrap();
    }

    let first = store.scan_index(&ScanCursor::START, 2).await.unwrap();
    // Remove an id already returned; the rest must still be visited.
    store.delete(&fp(0)).await.unwrap();

    let mut seen: HashSet<String> = first.ids.into_iter().collect();
    let mut cursor = first.cursor;
    while !cursor.is_start() {
        let page = store.scan_index(&cursor, 2).await.unwrap();
        seen.extend(page.ids);
        cursor = page.cursor;
    }

    for n in 1..6 {
        assert!(seen.contains(fp(n).as_str()));
    }
}

#[tokio::test]
async fn test_mock_scan_empty_index() {
    let page = store("a").scan_index(&ScanCursor::START, 10).await.unwrap();
    assert!(page.ids.is_empty());
    assert!(page.cursor.is_start());
}

#[tokio::test]
async fn test_mock_unavailable() {
    let store = store("a");
    store.set_unavailable(true).await;

    assert!(matches!(
        store.save(&record(1)).await,
        Err(StoreError::Unavailable(_))
    ));
    assert!(matches!(
        store.is_ready().await,
        Err(StoreError::Unavailable(_))
    ));

    store.set_unavailable(false).await;
    store.save(&record(1)).await.unwrap();
    assert!(store.is_ready().await.unwrap());
}
