//! Table hydration.
//!
//! Every load of an entry runs under that entry's latch, so concurrent readers
//! of an unloaded table coalesce onto one metastore fetch and all observe its
//! outcome. The fetch runs on its own thread; the loading thread polls it so a
//! timeout or a cancel request can end the wait early. Whatever happens, the
//! entry ends up `Loaded` or `Incomplete` with a fresh version and table id.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::table::{Table, TableEntry, TableSlot};
use super::Catalog;
use crate::error::{AppError, AppResult};
use crate::ident::TableName;
use crate::metastore::{MetaStore, MetastoreResult, MetastoreTable};

/// Granularity at which a pending fetch checks for cancel and deadline.
const POLL_SLICE: Duration = Duration::from_millis(20);

/// Deregisters an in-flight load when the loading thread leaves.
struct InFlightGuard<'a> {
    catalog: &'a Catalog,
    key: TableName,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) { self.catalog.in_flight.lock().remove(&self.key); }
}

impl Catalog {
    /// Return the entry's table, loading it first if needed. The caller holds
    /// the store lock (read or write); this only takes the entry's latch.
    pub(crate) fn load_entry(&self, entry: &Arc<TableEntry>) -> AppResult<Table> {
        if let Some(t) = entry.loaded() {
            return Ok(t);
        }
        let _latch = entry.latch.lock();
        if let Some(t) = entry.loaded() {
            crate::tprintln!("[loader] {}.{} loaded by a concurrent reader", entry.db_name, entry.name);
            return Ok(t);
        }

        let key = TableName::new(&entry.db_name, &entry.name);
        entry.cancel.store(false, Ordering::Release);
        entry.begin_loading();
        self.in_flight.lock().insert(key.clone(), entry.clone());
        let _registered = InFlightGuard { catalog: self, key };

        let started = Instant::now();
        let fetched = self.fetch_table(&entry.db_name, &entry.name, &entry.cancel);
        let version = match self.versions.next() {
            Ok(v) => v,
            Err(e) => {
                entry.abort_loading();
                return Err(e);
            }
        };
        let table = self.build_table(&entry.db_name, &entry.name, fetched, version);
        match &table {
            Table::Incomplete(i) => warn!(target: "catalogd::loader", "{}.{} is incomplete at version {}: {}", entry.db_name, entry.name, version, i.cause),
            _ => debug!(target: "catalogd::loader", "loaded {}.{} at version {} in {:?}", entry.db_name, entry.name, version, started.elapsed()),
        }
        entry.set_slot(TableSlot::Ready(table.clone()));
        Ok(table)
    }

    /// Turn a fetch outcome into a loaded or incomplete table under a new table id.
    pub(crate) fn build_table(&self, db: &str, name: &str, fetched: AppResult<MetastoreTable>, version: u64) -> Table {
        let id = self.allocate_table_id();
        match fetched.and_then(|m| Table::from_metastore(&m, id, version, &self.formats)) {
            Ok(t) => t,
            Err(e) => Table::incomplete(id, db, name, e, version),
        }
    }

    /// Fetch one table descriptor, bounded by the configured load timeout and
    /// abandoned as soon as `cancel` is raised.
    pub(crate) fn fetch_table(&self, db: &str, name: &str, cancel: &AtomicBool) -> AppResult<MetastoreTable> {
        let (d, n) = (db.to_string(), name.to_string());
        self.call_metastore(&format!("{}.{}", db, name), cancel, move |store| store.load_table(&d, &n))
    }

    /// Run one metastore call on a helper thread and wait for it no longer
    /// than the load timeout. A call that is given up on keeps running
    /// detached until the metastore answers; `metastore_calls_running` counts
    /// those threads.
    pub(crate) fn call_metastore<T, F>(&self, what: &str, cancel: &AtomicBool, call: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn MetaStore) -> MetastoreResult<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let store = self.metastore.clone();
        let running = self.calls_running.clone();
        running.fetch_add(1, Ordering::AcqRel);
        let spawned = std::thread::Builder::new()
            .name(format!("catalog-metastore-{}", what))
            .spawn(move || {
                let res = call(store.as_ref());
                running.fetch_sub(1, Ordering::AcqRel);
                let _ = tx.send(res);
            });
        if let Err(e) = spawned {
            self.calls_running.fetch_sub(1, Ordering::AcqRel);
            return Err(AppError::load_failure("metastore_transient".to_string(), format!("cannot start metastore call for {}: {}", what, e)));
        }

        let deadline = self.config.load_timeout().map(|t| Instant::now() + t);
        loop {
            if cancel.load(Ordering::Acquire) {
                self.abandon(what, "cancelled");
                return Err(AppError::load_failure("load_cancelled".to_string(), format!("metastore call for {} was cancelled", what)));
            }
            let wait = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        self.abandon(what, "timed out");
                        return Err(AppError::load_failure(
                            "load_timeout".to_string(),
                            format!("metastore did not answer for {} within {}ms", what, self.config.load_timeout_ms),
                        ));
                    }
                    (d - now).min(POLL_SLICE)
                }
                None => POLL_SLICE,
            };
            match rx.recv_timeout(wait) {
                Ok(res) => return res.map_err(AppError::from),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(AppError::load_failure("metastore_transient".to_string(), format!("metastore call for {} ended without a result", what)));
                }
            }
        }
    }

    fn abandon(&self, what: &str, why: &str) {
        warn!(target: "catalogd::loader", "metastore call for {} {}; its thread stays detached ({} metastore call(s) still running)",
            what, why, self.calls_running.load(Ordering::Acquire));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::table::TableLoadState;
    use crate::config::CatalogConfig;
    use crate::metastore::{InMemoryMetaStore, MetastoreError, MetastoreTable, TableFault};

    fn store_with(db: &str, names: &[&str]) -> InMemoryMetaStore {
        let ms = InMemoryMetaStore::new();
        ms.add_database(db, "admin");
        for n in names {
            ms.put_table(MetastoreTable {
                db_name: db.into(),
                name: (*n).into(),
                owner: "admin".into(),
                table_type: Default::default(),
                columns: vec![],
                partition_keys: vec![],
                partitions: vec![],
                input_format: crate::catalog::format::TEXT_INPUT_FORMAT.into(),
                location: format!("/wh/{}/{}", db, n),
                view_text: None,
                last_ddl_time: 0,
                parameters: Default::default(),
            });
        }
        ms
    }

    #[test]
    fn metastore_failure_becomes_incomplete_with_fresh_version() {
        let ms = store_with("default", &["t1"]);
        ms.set_table_fault("default", "t1", TableFault::Fail(MetastoreError::Transient("connection reset".into())));
        let cat = Catalog::new(CatalogConfig::default(), Arc::new(ms.clone())).unwrap();
        let before = cat.current_version();
        let t = cat.get_table("default", "t1").unwrap().unwrap();
        assert!(t.is_incomplete());
        assert_eq!(t.load_error().unwrap().code_str(), "metastore_transient");
        assert_eq!(t.version(), before + 1);
        assert_eq!(cat.table_load_state("default", "t1"), Some(TableLoadState::Incomplete));
        // terminal until reload: no second fetch
        cat.get_table("default", "t1").unwrap();
        assert_eq!(ms.load_calls("default", "t1"), 1);
    }

    #[test]
    fn every_load_gets_a_new_table_id() {
        let ms = store_with("default", &["a", "b"]);
        ms.set_table_fault("default", "b", TableFault::Fail(MetastoreError::NotFound("default.b".into())));
        let cat = Catalog::new(CatalogConfig::default(), Arc::new(ms)).unwrap();
        let a = cat.get_table("default", "a").unwrap().unwrap();
        let b = cat.get_table("default", "b").unwrap().unwrap();
        assert_ne!(a.id(), b.id());
        assert!(b.is_incomplete());
    }

    #[test]
    fn slow_fetch_times_out() {
        let ms = store_with("default", &["slow"]);
        ms.set_table_fault("default", "slow", TableFault::Delay(Duration::from_millis(500)));
        let cfg = CatalogConfig::default().with_load_timeout(Duration::from_millis(50));
        let cat = Catalog::new(cfg, Arc::new(ms)).unwrap();
        let started = Instant::now();
        let t = cat.get_table_no_throw("default", "slow").unwrap();
        assert!(started.elapsed() < Duration::from_millis(450));
        assert_eq!(t.load_error().unwrap().code_str(), "load_timeout");
    }

    #[test]
    fn abandoned_fetch_stays_counted_until_the_metastore_answers() {
        let ms = store_with("default", &["slow"]);
        ms.set_table_fault("default", "slow", TableFault::Delay(Duration::from_millis(300)));
        let cfg = CatalogConfig::default().with_load_timeout(Duration::from_millis(30));
        let cat = Catalog::new(cfg, Arc::new(ms)).unwrap();
        assert_eq!(cat.metastore_calls_running(), 0);
        let t = cat.get_table_no_throw("default", "slow").unwrap();
        assert_eq!(t.load_error().unwrap().code_str(), "load_timeout");
        assert_eq!(cat.metastore_calls_running(), 1);

        let deadline = Instant::now() + Duration::from_secs(5);
        while cat.metastore_calls_running() > 0 {
            assert!(Instant::now() < deadline, "fetch thread never returned");
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}
