//! Concurrent table hydration: coalescing, cancellation, timeouts and the
//! propagation wait.

mod common;

use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

use catalogd::catalog::TableLoadState;
use catalogd::metastore::TableFault;
use catalogd::CatalogConfig;

use common::{catalog_with, store};

fn wait_until_loading(cat: &catalogd::Catalog, db: &str, name: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while cat.table_load_state(db, name) != Some(TableLoadState::Loading) {
        assert!(Instant::now() < deadline, "load of {}.{} never started", db, name);
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn concurrent_readers_share_one_fetch() {
    let ms = store(&[("default", "hot")]);
    ms.set_table_fault("default", "hot", TableFault::Delay(Duration::from_millis(150)));
    let cat = catalog_with(&ms, CatalogConfig::default());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cat = cat.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                cat.get_table("default", "hot").unwrap().unwrap()
            })
        })
        .collect();
    let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(ms.load_calls("default", "hot"), 1);
    let first = &tables[0];
    assert!(!first.is_incomplete());
    assert!(tables.iter().all(|t| t.id() == first.id() && t.version() == first.version()));
    assert_eq!(cat.table_load_state("default", "hot"), Some(TableLoadState::Loaded));
}

#[test]
fn snapshot_and_reader_coalesce_on_the_same_table() {
    let ms = store(&[("default", "slow")]);
    ms.set_table_fault("default", "slow", TableFault::Delay(Duration::from_millis(100)));
    let cat = catalog_with(&ms, CatalogConfig::default());

    let reader = {
        let cat = cat.clone();
        std::thread::spawn(move || cat.get_table("default", "slow").unwrap().unwrap())
    };
    wait_until_loading(&cat, "default", "slow");
    let snap = cat.get_catalog_objects(0).unwrap();
    let table = reader.join().unwrap();

    assert_eq!(ms.load_calls("default", "slow"), 1);
    assert_eq!(snap.find_table("default", "slow").unwrap().catalog_version, table.version());
}

#[test]
fn cancelled_load_yields_incomplete_table() {
    let ms = store(&[("default", "stuck")]);
    ms.set_table_fault("default", "stuck", TableFault::Delay(Duration::from_secs(3)));
    let cat = catalog_with(&ms, CatalogConfig::default().with_load_timeout(Duration::ZERO));
    assert!(!cat.cancel_load("default", "stuck"));

    let started = Instant::now();
    let loader = {
        let cat = cat.clone();
        std::thread::spawn(move || cat.get_table("default", "stuck").unwrap().unwrap())
    };
    wait_until_loading(&cat, "default", "stuck");
    assert!(cat.cancel_load("DEFAULT", "Stuck"));
    let table = loader.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(table.load_error().unwrap().code_str(), "load_cancelled");
    assert_eq!(cat.table_load_state("default", "stuck"), Some(TableLoadState::Incomplete));
    assert!(!cat.cancel_load("default", "stuck"));
}

#[test]
fn invalidate_after_timeout_allows_a_retry() {
    let ms = store(&[("default", "flaky")]);
    ms.set_table_fault("default", "flaky", TableFault::Delay(Duration::from_millis(300)));
    let cat = catalog_with(&ms, CatalogConfig::default().with_load_timeout(Duration::from_millis(30)));
    assert!(cat.get_table("default", "flaky").unwrap().unwrap().is_incomplete());

    ms.clear_table_fault("default", "flaky");
    cat.invalidate_table("default", "flaky").unwrap();
    let t = cat.get_table("default", "flaky").unwrap().unwrap();
    assert!(!t.is_incomplete());
    assert_eq!(ms.load_calls("default", "flaky"), 2);
}

#[test]
fn ddl_caller_wakes_when_a_snapshot_covers_its_version() {
    let ms = store(&[]);
    let cat = catalog_with(&ms, CatalogConfig::default());
    let v = cat.create_database("events", "etl", None, false).unwrap();

    let waiter = {
        let cat = cat.clone();
        std::thread::spawn(move || cat.wait_for_version(v, Duration::from_secs(5)))
    };
    std::thread::sleep(Duration::from_millis(20));
    let snap = cat.get_catalog_objects(0).unwrap();
    assert!(snap.max_catalog_version >= v);
    assert!(waiter.join().unwrap());
    assert!(!cat.wait_for_version(v + 1, Duration::from_millis(20)));
}

fn wait_for_idle_metastore(cat: &catalogd::Catalog) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while cat.metastore_calls_running() > 0 {
        assert!(Instant::now() < deadline, "metastore calls never returned");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn slow_database_listing_times_out_without_blocking_snapshots() {
    let ms = store(&[("default", "t1")]);
    ms.set_list_delay("default", Duration::from_millis(400));
    let cat = catalog_with(&ms, CatalogConfig::lazy().with_load_timeout(Duration::from_millis(50)));
    cat.db_names().unwrap();

    let reader = {
        let cat = cat.clone();
        std::thread::spawn(move || {
            let started = Instant::now();
            let found = cat.get_table("default", "t1").unwrap();
            (found.is_none(), started.elapsed())
        })
    };
    std::thread::sleep(Duration::from_millis(10));
    let started = Instant::now();
    cat.get_catalog_objects(0).unwrap();
    assert!(started.elapsed() < Duration::from_millis(300), "snapshot waited on a listing: {:?}", started.elapsed());

    let (missing, waited) = reader.join().unwrap();
    assert!(missing);
    assert!(waited < Duration::from_millis(300), "listing was not bounded: {:?}", waited);
    assert_eq!(cat.table_names("default").unwrap(), Some(vec![]));

    let before = cat.current_version();
    let err = cat.create_table("default", common::text_table("events"), false).unwrap_err();
    assert_eq!(err.code_str(), "load_timeout");
    assert_eq!(cat.current_version(), before);
    assert!(cat.metastore_calls_running() > 0);

    wait_for_idle_metastore(&cat);
    ms.clear_list_fault("default");
    assert!(cat.get_table("default", "t1").unwrap().is_some());
    assert_eq!(cat.table_names("default").unwrap(), Some(vec!["t1".to_string()]));
}
