//!
//! catalogd catalog store
//! ----------------------
//! In-memory, versioned cache of the external metastore. The store owns every
//! database and, through them, every table, view and function. A single
//! reader/writer lock guards the database map:
//! - readers (lookups and the snapshot exporter) share the lock; an unloaded
//!   table hit on a read path is hydrated under a per-table latch instead of
//!   upgrading to the write lock;
//! - DDL takes the write lock, mutates, and stamps the affected objects with a
//!   fresh version from the process-wide counter.
//!
//! Lookups hand out values (`Table`, `DatabaseInfo`, `Function`) so callers
//! are unaffected by later DDL.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{CatalogConfig, InitStrategy};
use crate::error::{AppError, AppResult};
use crate::ident::{normalize_identifier, TableName};
use crate::metastore::{MetaStore, MetastoreDatabase, MetastoreFunction};

pub mod database;
pub mod ddl;
pub mod format;
pub mod function;
pub mod loader;
pub mod object;
pub mod schema;
pub mod snapshot;
pub mod table;
pub mod version;

pub use database::DatabaseInfo;
pub use ddl::{AlterTableOp, DdlRequest, DdlResponse, TableDef, ViewDef};
pub use format::{FormatRegistry, TableFormat, TableSink};
pub use function::{Function, FunctionDef};
pub use object::{CatalogMeta, CatalogObject};
pub use schema::{Column, ColumnType, Partition, TableSchema};
pub use table::{HdfsTable, IncompleteTable, Table, TableLoadState, View};
pub use version::{VersionCounter, VersionWatch, INITIAL_CATALOG_VERSION};

use database::Database;
use function::normalize_signature;
use table::TableEntry;

/// One database's table names and functions as listed by the metastore.
#[derive(Debug, Default)]
pub(crate) struct DbListing {
    pub(crate) tables: Vec<String>,
    pub(crate) functions: Vec<MetastoreFunction>,
}

/// Names a DDL is about to install itself, so a listing taken on its behalf
/// must not insert them.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ListingClaims<'a> {
    pub(crate) table: Option<&'a str>,
    pub(crate) function: Option<&'a str>,
}

impl<'a> ListingClaims<'a> {
    pub(crate) fn table(name: &'a str) -> Self { Self { table: Some(name), function: None } }
    pub(crate) fn function(sig: &'a str) -> Self { Self { table: None, function: Some(sig) } }
}

#[derive(Debug, Default)]
pub(crate) struct CatalogInner {
    pub(crate) databases: BTreeMap<String, Database>,
}

pub struct Catalog {
    config: CatalogConfig,
    service_id: Uuid,
    metastore: Arc<dyn MetaStore>,
    formats: FormatRegistry,
    versions: VersionCounter,
    published: VersionWatch,
    next_table_id: AtomicU32,
    initialized: AtomicBool,
    /// Entries with a metastore fetch in flight, for cancellation and introspection.
    in_flight: Mutex<HashMap<TableName, Arc<TableEntry>>>,
    /// Metastore helper threads still running, including abandoned ones.
    calls_running: Arc<AtomicUsize>,
    init_latch: Mutex<()>,
    inner: RwLock<CatalogInner>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("service_id", &self.service_id)
            .field("init_strategy", &self.config.init_strategy)
            .field("version", &self.versions.current())
            .finish_non_exhaustive()
    }
}

impl Catalog {
    pub fn new(config: CatalogConfig, metastore: Arc<dyn MetaStore>) -> AppResult<Self> {
        Self::with_formats(config, metastore, FormatRegistry::default())
    }

    /// Build a catalog with an explicit set of storage-format handlers.
    pub fn with_formats(config: CatalogConfig, metastore: Arc<dyn MetaStore>, formats: FormatRegistry) -> AppResult<Self> {
        let catalog = Self {
            service_id: config.service_id,
            config,
            metastore,
            formats,
            versions: VersionCounter::new(),
            published: VersionWatch::new(),
            next_table_id: AtomicU32::new(0),
            initialized: AtomicBool::new(false),
            in_flight: Mutex::new(HashMap::new()),
            calls_running: Arc::new(AtomicUsize::new(0)),
            init_latch: Mutex::new(()),
            inner: RwLock::new(CatalogInner::default()),
        };
        if catalog.config.init_strategy == InitStrategy::Immediate {
            catalog.ensure_initialized()?;
        }
        info!(target: "startup", service_id = %catalog.service_id, strategy = ?catalog.config.init_strategy,
            "catalog ready at version {}", catalog.versions.current());
        Ok(catalog)
    }

    pub fn config(&self) -> &CatalogConfig { &self.config }

    pub fn service_id(&self) -> Uuid { self.service_id }

    pub fn formats(&self) -> &FormatRegistry { &self.formats }

    /// Last version issued by the counter.
    pub fn current_version(&self) -> u64 { self.versions.current() }

    /// Highest `max_catalog_version` of any snapshot produced so far.
    pub fn published_version(&self) -> u64 { self.published.last_seen() }

    /// Block until a snapshot covering `version` was produced; false on timeout.
    pub fn wait_for_version(&self, version: u64, timeout: Duration) -> bool {
        self.published.wait_at_least(version, timeout)
    }

    pub fn is_initialized(&self) -> bool { self.initialized.load(Ordering::Acquire) }

    /// Metastore calls whose helper thread has not returned yet. Calls given
    /// up on after a timeout or cancel stay counted until the metastore answers.
    pub fn metastore_calls_running(&self) -> usize { self.calls_running.load(Ordering::Acquire) }

    /// Enumerate the metastore's databases if that has not happened yet.
    /// Under `IMMEDIATE` each database's tables and functions are listed too.
    /// Metastore calls run without the store lock; only installing the result
    /// takes the write lock.
    pub fn ensure_initialized(&self) -> AppResult<()> {
        if self.is_initialized() {
            return Ok(());
        }
        let _init = self.init_latch.lock();
        if self.is_initialized() {
            return Ok(());
        }
        let dbs = self.call_metastore("database list", &AtomicBool::new(false), |store| store.list_databases())?;
        let eager = self.config.init_strategy == InitStrategy::Immediate;
        let mut found: BTreeMap<String, (MetastoreDatabase, Option<DbListing>)> = BTreeMap::new();
        for d in dbs {
            let key = normalize_identifier(&d.name);
            if key.is_empty() || found.contains_key(&key) {
                continue;
            }
            let listing = if eager { self.list_database_or_warn(&key) } else { None };
            found.insert(key, (d, listing));
        }

        let mut inner = self.inner.write();
        for (key, (d, listing)) in found {
            if inner.databases.contains_key(&key) {
                continue;
            }
            let mut db = Database::new(&key, &d.owner, d.comment.clone(), self.versions.next()?, false);
            if let Some(listing) = listing {
                self.install_listing(&mut db, listing, ListingClaims::default())?;
            }
            inner.databases.insert(key, db);
        }
        self.initialized.store(true, Ordering::Release);
        info!(target: "startup", "catalog initialised: {} database(s), eager={}", inner.databases.len(), eager);
        Ok(())
    }

    /// List a database's tables and functions, bounded by the load timeout.
    pub(crate) fn list_database(&self, db: &str) -> AppResult<DbListing> {
        let name = db.to_string();
        self.call_metastore(&format!("listing of {}", db), &AtomicBool::new(false), move |store| {
            Ok(DbListing { tables: store.list_tables(&name)?, functions: store.list_functions(&name)? })
        })
    }

    fn list_database_or_warn(&self, db: &str) -> Option<DbListing> {
        match self.list_database(db) {
            Ok(l) => Some(l),
            Err(e) => {
                warn!(target: "catalogd::metastore", "listing database '{}' failed, it stays unhydrated: {}", db, e);
                None
            }
        }
    }

    /// Add listed tables (as unloaded entries) and functions to `db` and mark
    /// it hydrated. Names already present, and names in `claims`, are left
    /// to their current owner.
    pub(crate) fn install_listing(&self, db: &mut Database, listing: DbListing, claims: ListingClaims<'_>) -> AppResult<()> {
        let name = db.name().to_string();
        for t in listing.tables {
            let key = normalize_identifier(&t);
            if key.is_empty() || db.tables.contains_key(&key) || claims.table == Some(key.as_str()) {
                continue;
            }
            let entry = TableEntry::unloaded(&name, &key, self.versions.next()?);
            db.tables.insert(key, Arc::new(entry));
        }
        for f in listing.functions {
            match function::Function::from_metastore(&f, INITIAL_CATALOG_VERSION) {
                Ok(mut func) => {
                    func.db_name = name.clone();
                    let sig = func.signature();
                    if db.functions.contains_key(&sig) || claims.function == Some(sig.as_str()) {
                        continue;
                    }
                    func.version = self.versions.next()?;
                    db.functions.insert(sig, Arc::new(func));
                }
                Err(e) => warn!(target: "catalogd::metastore", "skipping function {}.{}: {}", name, f.name, e),
            }
        }
        db.hydrated = true;
        debug!(target: "catalogd::metastore", "hydrated database '{}': {} table(s), {} function(s)", name, db.tables.len(), db.functions.len());
        Ok(())
    }

    fn needs_listing(&self, db: &str) -> bool {
        matches!(self.inner.read().databases.get(db), Some(d) if !d.hydrated)
    }

    /// Hydrate `db` on first targeted access from a read path. A listing
    /// failure is logged and leaves the database unhydrated so a later access
    /// retries. No-op for unknown or hydrated databases.
    pub(crate) fn ensure_db_hydrated(&self, db: &str) -> AppResult<()> {
        if !self.needs_listing(db) {
            return Ok(());
        }
        if let Some(listing) = self.list_database_or_warn(db) {
            let mut inner = self.inner.write();
            if let Some(database) = inner.databases.get_mut(db).filter(|d| !d.hydrated) {
                self.install_listing(database, listing, ListingClaims::default())?;
            }
        }
        Ok(())
    }

    /// Hydrate `db` ahead of a DDL on it. The metastore already reflects the
    /// change being replayed, so the names in `claims` are not taken from the
    /// listing. Returns true when this call installed the listing; listing
    /// failures are returned and leave the database unhydrated.
    pub(crate) fn hydrate_for_ddl(&self, db: &str, claims: ListingClaims<'_>) -> AppResult<bool> {
        if !self.needs_listing(db) {
            return Ok(false);
        }
        let listing = self.list_database(db)?;
        let mut inner = self.inner.write();
        match inner.databases.get_mut(db).filter(|d| !d.hydrated) {
            Some(database) => {
                self.install_listing(database, listing, claims)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Mutable lookup of a hydrated database for write paths.
    pub(crate) fn db_mut<'a>(&self, inner: &'a mut CatalogInner, db: &str) -> AppResult<&'a mut Database> {
        let database = inner.databases.get_mut(db)
            .ok_or_else(|| AppError::not_found("database_not_found".to_string(), format!("Database not found: {}", db)))?;
        if !database.hydrated {
            return Err(AppError::load_failure("metastore_transient".to_string(), format!("Database {} has not been listed from the metastore", db)));
        }
        Ok(database)
    }

    /// Read guard after lazy initialisation and hydration of `db`.
    fn read_hydrated(&self, db: &str) -> AppResult<RwLockReadGuard<'_, CatalogInner>> {
        self.ensure_initialized()?;
        self.ensure_db_hydrated(db)?;
        Ok(self.inner.read())
    }

    pub(crate) fn allocate_table_id(&self) -> u32 { self.next_table_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1) }

    pub fn db_names(&self) -> AppResult<Vec<String>> {
        self.ensure_initialized()?;
        Ok(self.inner.read().databases.keys().cloned().collect())
    }

    pub fn get_db(&self, name: &str) -> AppResult<Option<DatabaseInfo>> {
        self.ensure_initialized()?;
        let key = normalize_identifier(name);
        Ok(self.inner.read().databases.get(&key).map(|d| d.info.clone()))
    }

    pub fn table_names(&self, db: &str) -> AppResult<Option<Vec<String>>> {
        let db = normalize_identifier(db);
        let inner = self.read_hydrated(&db)?;
        Ok(inner.databases.get(&db).map(|d| d.table_names()))
    }

    /// Resolve a table, hydrating it from the metastore if it is unloaded.
    /// Load failures come back as an incomplete table, not as an error.
    pub fn get_table(&self, db: &str, name: &str) -> AppResult<Option<Table>> {
        let (db, name) = (normalize_identifier(db), normalize_identifier(name));
        let inner = self.read_hydrated(&db)?;
        let entry = match inner.databases.get(&db).and_then(|d| d.table(&name)) {
            Some(e) => e.clone(),
            None => return Ok(None),
        };
        let table = self.load_entry(&entry)?;
        drop(inner);
        Ok(Some(table))
    }

    /// Like `get_table` but never fails; every problem resolves to `None` or
    /// an incomplete table.
    pub fn get_table_no_throw(&self, db: &str, name: &str) -> Option<Table> {
        match self.get_table(db, name) {
            Ok(t) => t,
            Err(e) => {
                debug!(target: "catalogd::loader", "get_table_no_throw({}.{}) swallowed: {}", db, name, e);
                None
            }
        }
    }

    /// Load state of a table entry without triggering a load.
    pub fn table_load_state(&self, db: &str, name: &str) -> Option<TableLoadState> {
        let key = TableName::new(db, name);
        if self.in_flight.lock().contains_key(&key) {
            return Some(TableLoadState::Loading);
        }
        let inner = self.inner.read();
        inner.databases.get(&key.db_name).and_then(|d| d.table(&key.table_name)).map(|e| e.load_state())
    }

    /// Cancel the metastore fetch in flight for `db.name`. Returns false when
    /// no load was running.
    pub fn cancel_load(&self, db: &str, name: &str) -> bool {
        let key = TableName::new(db, name);
        match self.in_flight.lock().get(&key) {
            Some(entry) => {
                entry.cancel.store(true, Ordering::Release);
                info!(target: "catalogd::loader", "cancel requested for {}", key);
                true
            }
            None => false,
        }
    }

    pub fn get_function(&self, db: &str, signature: &str) -> AppResult<Option<Function>> {
        let db = normalize_identifier(db);
        let sig = normalize_signature(signature)?;
        let inner = self.read_hydrated(&db)?;
        Ok(inner.databases.get(&db).and_then(|d| d.functions.get(&sig)).map(|f| (**f).clone()))
    }

    pub fn function_signatures(&self, db: &str) -> AppResult<Option<Vec<String>>> {
        let db = normalize_identifier(db);
        let inner = self.read_hydrated(&db)?;
        Ok(inner.databases.get(&db).map(|d| d.functions.keys().cloned().collect()))
    }
}
