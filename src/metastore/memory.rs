//! Map-backed metastore with fault injection.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use super::{MetaStore, MetastoreDatabase, MetastoreError, MetastoreFunction, MetastoreResult, MetastoreTable};
use crate::ident::normalize_identifier;

/// Injected behaviour for `load_table` of one table, or for the listings of
/// one database.
#[derive(Debug, Clone)]
pub enum TableFault {
    /// Fail every load with this error.
    Fail(MetastoreError),
    /// Sleep before answering normally.
    Delay(Duration),
}

#[derive(Default)]
struct DbEntry {
    info: Option<MetastoreDatabase>,
    tables: BTreeMap<String, MetastoreTable>,
    functions: Vec<MetastoreFunction>,
}

#[derive(Clone, Default)]
pub struct InMemoryMetaStore {
    dbs: Arc<RwLock<BTreeMap<String, DbEntry>>>,
    faults: Arc<RwLock<HashMap<(String, String), TableFault>>>,
    list_faults: Arc<RwLock<HashMap<String, TableFault>>>,
    load_calls: Arc<RwLock<HashMap<(String, String), usize>>>,
}

fn key(db: &str, name: &str) -> (String, String) { (normalize_identifier(db), normalize_identifier(name)) }

impl InMemoryMetaStore {
    pub fn new() -> Self { Self::default() }

    pub fn add_database(&self, name: &str, owner: &str) {
        let k = normalize_identifier(name);
        let mut w = self.dbs.write();
        let ent = w.entry(k.clone()).or_default();
        ent.info = Some(MetastoreDatabase { name: k, owner: owner.to_string(), comment: None });
    }

    pub fn remove_database(&self, name: &str) { self.dbs.write().remove(&normalize_identifier(name)); }

    /// Insert or replace a table; the parent database is created if missing.
    pub fn put_table(&self, table: MetastoreTable) {
        let db = normalize_identifier(&table.db_name);
        let mut w = self.dbs.write();
        let ent = w.entry(db.clone()).or_default();
        if ent.info.is_none() {
            ent.info = Some(MetastoreDatabase { name: db, owner: String::new(), comment: None });
        }
        ent.tables.insert(normalize_identifier(&table.name), table);
    }

    pub fn remove_table(&self, db: &str, name: &str) {
        if let Some(ent) = self.dbs.write().get_mut(&normalize_identifier(db)) {
            ent.tables.remove(&normalize_identifier(name));
        }
    }

    pub fn put_function(&self, func: MetastoreFunction) {
        let db = normalize_identifier(&func.db_name);
        let mut w = self.dbs.write();
        let ent = w.entry(db.clone()).or_default();
        if ent.info.is_none() {
            ent.info = Some(MetastoreDatabase { name: db, owner: String::new(), comment: None });
        }
        ent.functions.push(func);
    }

    pub fn set_table_fault(&self, db: &str, name: &str, fault: TableFault) { self.faults.write().insert(key(db, name), fault); }
    pub fn clear_table_fault(&self, db: &str, name: &str) { self.faults.write().remove(&key(db, name)); }

    /// Make `list_tables` / `list_functions` of a database fail.
    pub fn set_list_fault(&self, db: &str, err: MetastoreError) { self.list_faults.write().insert(normalize_identifier(db), TableFault::Fail(err)); }
    /// Make `list_tables` / `list_functions` of a database sleep before answering.
    pub fn set_list_delay(&self, db: &str, delay: Duration) { self.list_faults.write().insert(normalize_identifier(db), TableFault::Delay(delay)); }
    pub fn clear_list_fault(&self, db: &str) { self.list_faults.write().remove(&normalize_identifier(db)); }

    /// Number of `load_table` calls observed for a table.
    pub fn load_calls(&self, db: &str, name: &str) -> usize { self.load_calls.read().get(&key(db, name)).copied().unwrap_or(0) }

    fn check_list_fault(&self, db: &str) -> MetastoreResult<()> {
        let fault = self.list_faults.read().get(db).cloned();
        match fault {
            Some(TableFault::Fail(e)) => Err(e),
            Some(TableFault::Delay(d)) => {
                std::thread::sleep(d);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl MetaStore for InMemoryMetaStore {
    fn list_databases(&self) -> MetastoreResult<Vec<MetastoreDatabase>> {
        Ok(self.dbs.read().values().filter_map(|e| e.info.clone()).collect())
    }

    fn list_tables(&self, db: &str) -> MetastoreResult<Vec<String>> {
        let db = normalize_identifier(db);
        self.check_list_fault(&db)?;
        match self.dbs.read().get(&db) {
            Some(ent) => Ok(ent.tables.keys().cloned().collect()),
            None => Err(MetastoreError::NotFound(db)),
        }
    }

    fn load_table(&self, db: &str, name: &str) -> MetastoreResult<MetastoreTable> {
        let k = key(db, name);
        *self.load_calls.write().entry(k.clone()).or_insert(0) += 1;
        let fault = self.faults.read().get(&k).cloned();
        match fault {
            Some(TableFault::Fail(e)) => return Err(e),
            Some(TableFault::Delay(d)) => std::thread::sleep(d),
            None => {}
        }
        let r = self.dbs.read();
        r.get(&k.0)
            .and_then(|ent| ent.tables.get(&k.1))
            .cloned()
            .ok_or_else(|| MetastoreError::NotFound(format!("{}.{}", k.0, k.1)))
    }

    fn list_functions(&self, db: &str) -> MetastoreResult<Vec<MetastoreFunction>> {
        let db = normalize_identifier(db);
        self.check_list_fault(&db)?;
        match self.dbs.read().get(&db) {
            Some(ent) => Ok(ent.functions.clone()),
            None => Err(MetastoreError::NotFound(db)),
        }
    }
}
