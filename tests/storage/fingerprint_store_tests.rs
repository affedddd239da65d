//! FingerprintStore interface tests.
//!
//! These tests verify the contract of the FingerprintStore trait.
//! Each storage implementation should run these tests.

use std::collections::HashSet;

use uuid::Uuid;

use fingerprint_redis::storage::{
    FingerprintId, FingerprintRecord, FingerprintStore, LoadOutcome, ScanCursor,
};

/// A fresh, random fingerprint id.
pub fn random_id() -> FingerprintId {
    FingerprintId::parse(&Uuid::new_v4().simple().to_string()).expect("uuid is 32 hex chars")
}

/// Create a test fingerprint with one recorded usage.
pub fn make_record(file_name: &str) -> FingerprintRecord {
    let mut record =
        FingerprintRecord::new(random_id(), file_name).with_original("upstream", 1);
    record.add_usage("downstream", 7);
    record
}

/// Walk the whole index and collect every id returned.
pub async fn scan_all<S>(store: &S, batch_size: usize) -> (Vec<String>, usize)
where
    S: FingerprintStore<Record = FingerprintRecord>,
{
    let mut cursor = ScanCursor::START;
    let mut ids = Vec::new();
    let mut pages = 0;
    loop {
        let page = store
            .scan_index(&cursor, batch_size)
            .await
            .expect("scan should succeed");
        ids.extend(page.ids);
        pages += 1;
        cursor = page.cursor;
        if cursor.is_start() {
            return (ids, pages);
        }
    }
}

// =============================================================================
// FingerprintStore::is_ready tests (require an empty instance)
// =============================================================================

pub async fn test_is_ready_tracks_index<S>(store: &S)
where
    S: FingerprintStore<Record = FingerprintRecord>,
{
    assert!(
        !store.is_ready().await.expect("is_ready should succeed"),
        "empty instance should not be ready"
    );

    let record = make_record("ready.jar");
    store.save(&record).await.expect("save should succeed");
    assert!(store.is_ready().await.expect("is_ready should succeed"));

    store
        .delete(&record.id)
        .await
        .expect("delete should succeed");
    assert!(
        !store.is_ready().await.expect("is_ready should succeed"),
        "instance should be empty again after deleting its only fingerprint"
    );
}

// =============================================================================
// FingerprintStore::save / load tests
// =============================================================================

pub async fn test_load_nonexistent<S>(store: &S)
where
    S: FingerprintStore<Record = FingerprintRecord>,
{
    let loaded = store
        .load(&random_id())
        .await
        .expect("load should succeed");
    assert!(loaded.is_none(), "nonexistent fingerprint should be None");
}

pub async fn test_save_then_load<S>(store: &S)
where
    S: FingerprintStore<Record = FingerprintRecord>,
{
    let record = make_record("app.jar");
    store.save(&record).await.expect("save should succeed");

    let loaded = store
        .load(&record.id)
        .await
        .expect("load should succeed")
        .expect("fingerprint should exist");
    assert_eq!(loaded, record);
}

pub async fn test_save_overwrites<S>(store: &S)
where
    S: FingerprintStore<Record = FingerprintRecord>,
{
    let mut record = make_record("lib.jar");
    store.save(&record).await.expect("save should succeed");

    record.add_usage("nightly", 42);
    record.remove_job("downstream");
    store.save(&record).await.expect("second save should succeed");

    let loaded = store
        .load(&record.id)
        .await
        .expect("load should succeed")
        .expect("fingerprint should exist");
    assert_eq!(loaded, record);
}

pub async fn test_save_indexes_id<S>(store: &S)
where
    S: FingerprintStore<Record = FingerprintRecord>,
{
    let record = make_record("indexed.jar");
    store.save(&record).await.expect("save should succeed");
    store.save(&record).await.expect("resave should succeed");

    let (ids, _) = scan_all(store, 50).await;
    let hits = ids.iter().filter(|id| *id == record.id.as_str()).count();
    assert!(hits >= 1, "saved id should be in the index");
}

// =============================================================================
// FingerprintStore::delete tests
// =============================================================================

pub async fn test_delete_existing<S>(store: &S)
where
    S: FingerprintStore<Record = FingerprintRecord>,
{
    let record = make_record("gone.jar");
    store.save(&record).await.expect("save should succeed");
    store
        .delete(&record.id)
        .await
        .expect("delete should succeed");

    let loaded = store.load(&record.id).await.expect("load should succeed");
    assert!(loaded.is_none(), "deleted fingerprint should be None");

    let (ids, _) = scan_all(store, 50).await;
    assert!(
        !ids.iter().any(|id| id == record.id.as_str()),
        "deleted id should leave the index"
    );
}

pub async fn test_delete_nonexistent<S>(store: &S)
where
    S: FingerprintStore<Record = FingerprintRecord>,
{
    let id = random_id();
    store.delete(&id).await.expect("delete should succeed");
    store.delete(&id).await.expect("repeated delete should succeed");
}

pub async fn test_delete_then_recreate<S>(store: &S)
where
    S: FingerprintStore<Record = FingerprintRecord>,
{
    let record = make_record("again.jar");
    store.save(&record).await.expect("save should succeed");
    store
        .delete(&record.id)
        .await
        .expect("delete should succeed");
    store.save(&record).await.expect("resave should succeed");

    let loaded = store.load(&record.id).await.expect("load should succeed");
    assert_eq!(loaded, Some(record));
}

// =============================================================================
// FingerprintStore::bulk_load tests
// =============================================================================

pub async fn test_bulk_load_empty<S>(store: &S)
where
    S: FingerprintStore<Record = FingerprintRecord>,
{
    let outcomes = store.bulk_load(&[]).await.expect("bulk_load should succeed");
    assert!(outcomes.is_empty());
}

pub async fn test_bulk_load_preserves_order<S>(store: &S)
where
    S: FingerprintStore<Record = FingerprintRecord>,
{
    let first = make_record("first.jar");
    let second = make_record("second.jar");
    store.save(&first).await.expect("save should succeed");
    store.save(&second).await.expect("save should succeed");
    let missing = random_id();

    let outcomes = store
        .bulk_load(&[second.id.clone(), missing, first.id.clone()])
        .await
        .expect("bulk_load should succeed");

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0], LoadOutcome::Found(second));
    assert!(outcomes[1].is_absent());
    assert_eq!(outcomes[2], LoadOutcome::Found(first));
}

// =============================================================================
// FingerprintStore::scan_index tests
// =============================================================================

pub async fn test_scan_visits_every_saved_id<S>(store: &S)
where
    S: FingerprintStore<Record = FingerprintRecord>,
{
    let mut saved = HashSet::new();
    for n in 0..35 {
        let record = make_record(&format!("scan-{}.jar", n));
        store.save(&record).await.expect("save should succeed");
        saved.insert(record.id.to_string());
    }

    let (ids, pages) = scan_all(store, 10).await;
    let seen: HashSet<String> = ids.into_iter().collect();

    assert!(pages >= 1);
    for id in &saved {
        assert!(seen.contains(id), "scan missed {}", id);
    }
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all FingerprintStore interface tests against a store implementation.
///
/// The store must start with an empty instance index.
#[macro_export]
macro_rules! run_fingerprint_store_tests {
    ($store:expr) => {
        use $crate::storage::fingerprint_store_tests::*;

        // is_ready tests (must run first, on an empty index)
        test_is_ready_tracks_index($store).await;
        println!("  test_is_ready_tracks_index: PASSED");

        // save / load tests
        test_load_nonexistent($store).await;
        println!("  test_load_nonexistent: PASSED");

        test_save_then_load($store).await;
        println!("  test_save_then_load: PASSED");

        test_save_overwrites($store).await;
        println!("  test_save_overwrites: PASSED");

        test_save_indexes_id($store).await;
        println!("  test_save_indexes_id: PASSED");

        // delete tests
        test_delete_existing($store).await;
        println!("  test_delete_existing: PASSED");

        test_delete_nonexistent($store).await;
        println!("  test_delete_nonexistent: PASSED");

        test_delete_then_recreate($store).await;
        println!("  test_delete_then_recreate: PASSED");

        // bulk_load tests
        test_bulk_load_empty($store).await;
        println!("  test_bulk_load_empty: PASSED");

        test_bulk_load_preserves_order($store).await;
        println!("  test_bulk_load_preserves_order: PASSED");

        // scan tests
        test_scan_visits_every_saved_id($store).await;
        println!("  test_scan_visits_every_saved_id: PASSED");
    };
}
