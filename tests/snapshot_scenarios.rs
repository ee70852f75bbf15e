//! Snapshot exporter scenarios: delta skeletons, incomplete tables, concurrent
//! drops, lazy start-up and the fatal serialisation path.

mod common;

use std::sync::Arc;
use std::time::Duration;

use catalogd::catalog::{FormatRegistry, HdfsTable, Table, TableFormat, TableLoadState};
use catalogd::metastore::{InMemoryMetaStore, MetaStore, MetastoreDatabase, MetastoreError, MetastoreFunction, MetastoreResult, MetastoreTable, TableFault};
use catalogd::wire::{CatalogObjectKind, CatalogSnapshot, FormatWire, TableBody, WirePayload};
use catalogd::{AppError, AppResult, Catalog, CatalogConfig};

use common::{catalog_with, mtable, store, text_table};

/// Properties every snapshot must satisfy.
fn check_invariants(snap: &CatalogSnapshot, from_version: u64) {
    assert_eq!(snap.count(CatalogObjectKind::Catalog), 1, "exactly one catalog object");
    let meta = snap.catalog_meta().unwrap();
    assert_eq!(meta.catalog_version, snap.max_catalog_version);
    for o in &snap.objects {
        assert!(o.catalog_version <= snap.max_catalog_version, "{:?} above max version", o);
        if o.as_table().is_some() && o.catalog_version < from_version {
            assert!(o.is_skeleton(), "stale table must be a skeleton: {:?}", o);
        }
    }
}

#[test]
fn delta_snapshot_sends_skeletons_for_unchanged_tables() {
    let ms = store(&[]);
    let cat = catalog_with(&ms, CatalogConfig::default());
    let t1 = cat.create_table("default", text_table("t1"), false).unwrap();
    let db_v = cat.alter_database("default", "dba").unwrap();
    let t2 = cat.create_table("analytics", text_table("t2"), false).unwrap();
    assert!(t1 < db_v && db_v < t2);
    assert_eq!(cat.current_version(), t2);

    let snap = cat.get_catalog_objects(db_v).unwrap();
    check_invariants(&snap, db_v);
    assert_eq!(snap.max_catalog_version, t2);
    let kinds: Vec<_> = snap.objects.iter().map(|o| o.kind).collect();
    assert_eq!(kinds, vec![
        CatalogObjectKind::Database,
        CatalogObjectKind::Database,
        CatalogObjectKind::Table,
        CatalogObjectKind::Table,
        CatalogObjectKind::Catalog,
    ]);
    assert_eq!(snap.find_database("default").unwrap().catalog_version, db_v);
    assert_eq!(snap.find_database("analytics").unwrap().catalog_version, t2);

    let skel = snap.find_table("default", "t1").unwrap();
    assert!(skel.is_skeleton());
    assert_eq!(skel.catalog_version, 0);
    let full = snap.find_table("analytics", "t2").unwrap();
    assert!(!full.is_skeleton());
    assert_eq!(full.catalog_version, t2);
    match &snap.catalog_meta().unwrap().payload {
        WirePayload::Catalog(c) => assert_eq!(c.service_id, cat.service_id()),
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn timed_out_table_is_exported_as_incomplete() {
    let ms = store(&[("default", "t3")]);
    ms.set_table_fault("default", "t3", TableFault::Delay(Duration::from_millis(400)));
    let cat = catalog_with(&ms, CatalogConfig::default().with_load_timeout(Duration::from_millis(40)));

    let t3 = cat.get_table_no_throw("default", "t3").unwrap();
    let err = t3.load_error().unwrap();
    assert!(matches!(err, AppError::LoadFailure { .. }));
    assert_eq!(err.code_str(), "load_timeout");
    assert_eq!(cat.table_load_state("default", "t3"), Some(TableLoadState::Incomplete));

    let snap = cat.get_catalog_objects(0).unwrap();
    check_invariants(&snap, 0);
    let obj = snap.find_table("default", "t3").unwrap();
    assert_eq!(obj.catalog_version, t3.version());
    match &obj.as_table().unwrap().body {
        Some(TableBody::Incomplete(i)) => assert_eq!(i.error.code, "load_timeout"),
        other => panic!("expected incomplete body, got {:?}", other),
    }
}

#[test]
fn broken_table_does_not_abort_the_snapshot() {
    let ms = store(&[("default", "good"), ("default", "gone"), ("analytics", "also_good")]);
    ms.set_table_fault("default", "gone", TableFault::Fail(MetastoreError::NotFound("default.gone".into())));
    let cat = catalog_with(&ms, CatalogConfig::default());
    let snap = cat.get_catalog_objects(0).unwrap();
    check_invariants(&snap, 0);
    assert_eq!(snap.count(CatalogObjectKind::Table), 3);
    let bodies: Vec<_> = ["good", "gone"].iter()
        .map(|n| snap.find_table("default", n).unwrap().as_table().unwrap().body.clone())
        .collect();
    assert!(matches!(bodies[0], Some(TableBody::Hdfs(_))));
    assert!(matches!(bodies[1], Some(TableBody::Incomplete(_))));
}

#[test]
fn concurrent_drops_never_fail_a_snapshot() {
    let names: Vec<String> = (0..40).map(|i| format!("t{}", i)).collect();
    let pairs: Vec<(&str, &str)> = names.iter().map(|n| ("default", n.as_str())).collect();
    let ms = store(&pairs);
    let cat = catalog_with(&ms, CatalogConfig::default());

    let dropper = {
        let cat = cat.clone();
        let names = names.clone();
        std::thread::spawn(move || {
            for n in &names {
                cat.drop_table("default", n, false).unwrap();
            }
        })
    };
    let mut seen = Vec::new();
    for _ in 0..20 {
        let snap = cat.get_catalog_objects(0).unwrap();
        check_invariants(&snap, 0);
        seen.push(snap.count(CatalogObjectKind::Table));
    }
    dropper.join().unwrap();
    assert!(seen.windows(2).all(|w| w[0] >= w[1]), "tables only disappear: {:?}", seen);
    let last = cat.get_catalog_objects(0).unwrap();
    assert_eq!(last.count(CatalogObjectKind::Table), 0);
}

#[test]
fn lazy_catalog_exports_databases_only_until_tables_are_touched() {
    let ms = store(&[("default", "t1"), ("analytics", "t2")]);
    let cat = catalog_with(&ms, CatalogConfig::lazy());
    let snap = cat.get_catalog_objects(0).unwrap();
    check_invariants(&snap, 0);
    let kinds: Vec<_> = snap.objects.iter().map(|o| o.kind).collect();
    assert_eq!(kinds, vec![CatalogObjectKind::Database, CatalogObjectKind::Database, CatalogObjectKind::Catalog]);
    assert_eq!(ms.load_calls("default", "t1"), 0);

    cat.get_table("default", "t1").unwrap().unwrap();
    let snap = cat.get_catalog_objects(0).unwrap();
    assert!(snap.find_table("default", "t1").is_some());
    assert!(snap.find_table("analytics", "t2").is_none());
}

#[test]
fn exported_tables_round_trip_through_the_wire() {
    let ms = store(&[("default", "t1")]);
    let cat = catalog_with(&ms, CatalogConfig::default());
    let snap = CatalogSnapshot::decode(&cat.get_catalog_objects(0).unwrap().encode().unwrap()).unwrap();
    let rebuilt = Table::from_wire(snap.find_table("default", "t1").unwrap(), cat.formats()).unwrap();
    assert_eq!(rebuilt, cat.get_table("default", "t1").unwrap().unwrap());
}

#[test]
fn snapshots_feed_the_version_watch() {
    let ms = store(&[]);
    let cat = catalog_with(&ms, CatalogConfig::default());
    let v = cat.create_database("staging", "etl", None, false).unwrap();
    assert!(!cat.wait_for_version(v, Duration::from_millis(10)));
    let snap = cat.get_catalog_objects(0).unwrap();
    assert_eq!(snap.max_catalog_version, v);
    assert!(cat.wait_for_version(v, Duration::from_millis(10)));
    assert_eq!(cat.published_version(), v);
}

#[derive(Debug)]
struct BrokenFormat;

impl TableFormat for BrokenFormat {
    fn table_type(&self) -> &'static str { "HDFS_BROKEN_TABLE" }
    fn input_format(&self) -> &'static str { "com.example.BrokenInputFormat" }
    fn to_wire(&self, table: &HdfsTable) -> AppResult<FormatWire> {
        Err(AppError::internal("serde_failure".to_string(), format!("cannot describe {}", table.name)))
    }
}

#[test]
fn to_wire_failure_on_a_loaded_table_is_fatal() {
    let ms = store(&[("default", "ok")]);
    let mut broken = mtable("default", "broken");
    broken.input_format = "com.example.BrokenInputFormat".into();
    ms.put_table(broken);
    let mut formats = FormatRegistry::default();
    formats.register(Arc::new(BrokenFormat));
    let cat = Catalog::with_formats(CatalogConfig::default(), Arc::new(ms), formats).unwrap();

    let err = cat.get_catalog_objects(0).unwrap_err();
    assert!(matches!(err, AppError::Fatal { .. }));
    assert_eq!(err.code_str(), "to_wire_failed");
    assert_eq!(cat.published_version(), 0);
    // a delta that skips the broken table still succeeds
    let snap = cat.get_catalog_objects(cat.current_version() + 1).unwrap();
    assert!(snap.find_table("default", "broken").unwrap().is_skeleton());
}

/// Metastore that is unreachable for enumeration.
struct DownMetaStore;

impl MetaStore for DownMetaStore {
    fn list_databases(&self) -> MetastoreResult<Vec<MetastoreDatabase>> { Err(MetastoreError::Transient("connection refused".into())) }
    fn list_tables(&self, _db: &str) -> MetastoreResult<Vec<String>> { Err(MetastoreError::Transient("connection refused".into())) }
    fn load_table(&self, db: &str, name: &str) -> MetastoreResult<MetastoreTable> { Err(MetastoreError::NotFound(format!("{}.{}", db, name))) }
    fn list_functions(&self, _db: &str) -> MetastoreResult<Vec<MetastoreFunction>> { Ok(vec![]) }
}

#[test]
fn unreachable_metastore_surfaces_on_snapshot_but_not_on_no_throw_lookup() {
    let cat = Catalog::new(CatalogConfig::lazy(), Arc::new(DownMetaStore)).unwrap();
    assert!(cat.get_table_no_throw("default", "t1").is_none());
    assert!(cat.get_table_no_throw("", "..").is_none());
    let err = cat.get_catalog_objects(0).unwrap_err();
    assert!(err.is_load_failure());
    assert!(Catalog::new(CatalogConfig::default(), Arc::new(DownMetaStore)).is_err());
    // in-memory store for comparison: nothing listed, nothing failed
    assert!(Catalog::new(CatalogConfig::default(), Arc::new(InMemoryMetaStore::new())).is_ok());
}
