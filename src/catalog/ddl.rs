//!
//! catalogd DDL mutator
//! --------------------
//! Write-side operations on the catalog. Each operation runs under the store
//! write lock, validates everything first, and only then draws one version
//! from the counter. That version stamps the affected object and, for adds
//! and drops, its parent database. A failed operation never draws a version
//! of its own, and a no-op (`if_exists` / `if_not_exists`) returns the
//! current version unchanged.
//!
//! The catalog caches the metastore; callers apply a change to the metastore
//! first and then replay it here so the new state propagates to workers.
//! A database that was never listed is listed before the operation, outside
//! the write lock, exactly as a lookup would list it. That listing already
//! shows the change being replayed, so it does not claim the name a create
//! or rename installs, and a drop whose target the listing no longer has
//! succeeds as if the entry had been there. DDL therefore behaves the same
//! under `LAZY` and `IMMEDIATE` start-up.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::database::Database;
use super::function::{normalize_signature, Function, FunctionDef};
use super::schema::{Column, TableSchema};
use super::table::{HdfsTable, Table, TableEntry, TableSlot, View};
use super::{Catalog, ListingClaims};
use crate::error::{AppError, AppResult};
use crate::ident::{normalize_identifier, validate_identifier};

/// Definition of a file-backed table for `CREATE TABLE`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    #[serde(default)]
    pub owner: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub partition_keys: Vec<Column>,
    pub input_format: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Seconds since the epoch; now when absent.
    #[serde(default)]
    pub last_ddl_time: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDef {
    pub name: String,
    #[serde(default)]
    pub owner: String,
    pub query_text: String,
    #[serde(default)]
    pub columns: Vec<Column>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlterTableOp {
    AddColumns { columns: Vec<Column> },
    DropColumn { column: String },
    RenameTo { db: String, name: String },
    SetOwner { owner: String },
    SetProperties { properties: BTreeMap<String, String> },
}

/// One DDL request as accepted on the HTTP surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DdlRequest {
    CreateDatabase {
        name: String,
        #[serde(default)]
        owner: String,
        #[serde(default)]
        comment: Option<String>,
        #[serde(default)]
        if_not_exists: bool,
    },
    DropDatabase {
        name: String,
        #[serde(default)]
        if_exists: bool,
        #[serde(default)]
        cascade: bool,
    },
    AlterDatabase { name: String, owner: String },
    CreateTable {
        db: String,
        table: TableDef,
        #[serde(default)]
        if_not_exists: bool,
    },
    CreateView {
        db: String,
        view: ViewDef,
        #[serde(default)]
        if_not_exists: bool,
    },
    AlterTable { db: String, name: String, alter: AlterTableOp },
    AlterView {
        db: String,
        name: String,
        query_text: String,
        #[serde(default)]
        columns: Vec<Column>,
    },
    DropTable {
        db: String,
        name: String,
        #[serde(default)]
        if_exists: bool,
    },
    DropView {
        db: String,
        name: String,
        #[serde(default)]
        if_exists: bool,
    },
    CreateFunction {
        db: String,
        function: FunctionDef,
        #[serde(default)]
        if_not_exists: bool,
    },
    DropFunction {
        db: String,
        signature: String,
        #[serde(default)]
        if_exists: bool,
    },
    RefreshTable { db: String, name: String },
    InvalidateTable { db: String, name: String },
    UpdateLastDdlTime { db: String, name: String, ddl_time: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdlResponse {
    pub new_version: u64,
}

fn table_not_found(db: &str, name: &str) -> AppError {
    AppError::not_found("table_not_found".to_string(), format!("Table not found: {}.{}", db, name))
}

fn name_taken(db: &str, name: &str) -> AppError {
    AppError::conflict("table_exists".to_string(), format!("Table or view already exists: {}.{}", db, name))
}

impl Catalog {
    pub fn execute_ddl(&self, req: DdlRequest) -> AppResult<DdlResponse> {
        let new_version = match req {
            DdlRequest::CreateDatabase { name, owner, comment, if_not_exists } => self.create_database(&name, &owner, comment, if_not_exists)?,
            DdlRequest::DropDatabase { name, if_exists, cascade } => self.drop_database(&name, if_exists, cascade)?,
            DdlRequest::AlterDatabase { name, owner } => self.alter_database(&name, &owner)?,
            DdlRequest::CreateTable { db, table, if_not_exists } => self.create_table(&db, table, if_not_exists)?,
            DdlRequest::CreateView { db, view, if_not_exists } => self.create_view(&db, view, if_not_exists)?,
            DdlRequest::AlterTable { db, name, alter } => self.alter_table(&db, &name, alter)?,
            DdlRequest::AlterView { db, name, query_text, columns } => self.alter_view(&db, &name, &query_text, columns)?,
            DdlRequest::DropTable { db, name, if_exists } => self.drop_table(&db, &name, if_exists)?,
            DdlRequest::DropView { db, name, if_exists } => self.drop_view(&db, &name, if_exists)?,
            DdlRequest::CreateFunction { db, function, if_not_exists } => self.create_function(&db, function, if_not_exists)?,
            DdlRequest::DropFunction { db, signature, if_exists } => self.drop_function(&db, &signature, if_exists)?,
            DdlRequest::RefreshTable { db, name } => self.refresh_table(&db, &name)?,
            DdlRequest::InvalidateTable { db, name } => self.invalidate_table(&db, &name)?,
            DdlRequest::UpdateLastDdlTime { db, name, ddl_time } => {
                self.update_last_ddl_time(&db, &name, ddl_time);
                self.versions.current()
            }
        };
        Ok(DdlResponse { new_version })
    }

    pub fn create_database(&self, name: &str, owner: &str, comment: Option<String>, if_not_exists: bool) -> AppResult<u64> {
        let key = validate_identifier("database", name)?;
        self.ensure_initialized()?;
        let mut inner = self.inner.write();
        if inner.databases.contains_key(&key) {
            if if_not_exists {
                return Ok(self.versions.current());
            }
            return Err(AppError::conflict("database_exists".to_string(), format!("Database already exists: {}", key)));
        }
        let v = self.versions.next()?;
        inner.databases.insert(key.clone(), Database::new(&key, owner, comment, v, true));
        info!(target: "catalogd::ddl", "created database {} at version {}", key, v);
        Ok(v)
    }

    /// Drop a database. A non-empty database needs `cascade`.
    pub fn drop_database(&self, name: &str, if_exists: bool, cascade: bool) -> AppResult<u64> {
        let key = normalize_identifier(name);
        self.ensure_initialized()?;
        match self.hydrate_for_ddl(&key, ListingClaims::default()) {
            Ok(_) => {}
            Err(e) if e.code_str() == "metastore_not_found" => {
                debug!(target: "catalogd::ddl", "database {} is already gone from the metastore", key);
            }
            Err(e) => return Err(e),
        }
        let mut inner = self.inner.write();
        let db = match inner.databases.get(&key) {
            Some(db) => db,
            None if if_exists => return Ok(self.versions.current()),
            None => return Err(AppError::not_found("database_not_found".to_string(), format!("Database not found: {}", key))),
        };
        if !db.is_empty() && !cascade {
            return Err(AppError::conflict(
                "database_not_empty".to_string(),
                format!("Database {} has {} table(s) and {} function(s); use cascade", key, db.tables.len(), db.functions.len()),
            ));
        }
        let v = self.versions.next()?;
        inner.databases.remove(&key);
        info!(target: "catalogd::ddl", "dropped database {} at version {}", key, v);
        Ok(v)
    }

    pub fn alter_database(&self, name: &str, owner: &str) -> AppResult<u64> {
        let key = normalize_identifier(name);
        self.ensure_initialized()?;
        let mut inner = self.inner.write();
        let db = inner.databases.get_mut(&key)
            .ok_or_else(|| AppError::not_found("database_not_found".to_string(), format!("Database not found: {}", key)))?;
        let v = self.versions.next()?;
        db.info.owner = owner.to_string();
        db.set_version(v);
        Ok(v)
    }

    pub fn create_table(&self, db: &str, def: TableDef, if_not_exists: bool) -> AppResult<u64> {
        let db_key = normalize_identifier(db);
        let name = validate_identifier("table", &def.name)?;
        let schema = TableSchema::new(def.columns, def.partition_keys)?;
        let format = self.formats.resolve(&def.input_format).ok_or_else(|| {
            AppError::user("unsupported_format".to_string(), format!("Unsupported input format '{}'", def.input_format))
        })?;
        self.ensure_initialized()?;
        self.hydrate_for_ddl(&db_key, ListingClaims::table(&name))?;
        let mut inner = self.inner.write();
        let database = self.db_mut(&mut inner, &db_key)?;
        if database.tables.contains_key(&name) {
            if if_not_exists {
                return Ok(self.versions.current());
            }
            return Err(name_taken(&db_key, &name));
        }
        let v = self.versions.next()?;
        let table = HdfsTable {
            id: self.allocate_table_id(),
            db_name: db_key.clone(),
            name: name.clone(),
            owner: def.owner,
            schema,
            partitions: Vec::new(),
            location: def.location,
            last_ddl_time: def.last_ddl_time.unwrap_or_else(|| chrono::Utc::now().timestamp()),
            properties: def.properties,
            format,
            version: v,
        };
        database.tables.insert(name.clone(), Arc::new(TableEntry::ready(Table::Hdfs(Arc::new(table)))));
        database.set_version(v);
        info!(target: "catalogd::ddl", "created table {}.{} at version {}", db_key, name, v);
        Ok(v)
    }

    pub fn create_view(&self, db: &str, def: ViewDef, if_not_exists: bool) -> AppResult<u64> {
        let db_key = normalize_identifier(db);
        let name = validate_identifier("view", &def.name)?;
        if def.query_text.trim().is_empty() {
            return Err(AppError::user("invalid_view", "view query text must not be empty"));
        }
        TableSchema::new(def.columns.clone(), Vec::new())?;
        self.ensure_initialized()?;
        self.hydrate_for_ddl(&db_key, ListingClaims::table(&name))?;
        let mut inner = self.inner.write();
        let database = self.db_mut(&mut inner, &db_key)?;
        if database.tables.contains_key(&name) {
            if if_not_exists {
                return Ok(self.versions.current());
            }
            return Err(name_taken(&db_key, &name));
        }
        let v = self.versions.next()?;
        let view = View {
            id: self.allocate_table_id(),
            db_name: db_key.clone(),
            name: name.clone(),
            owner: def.owner,
            query_text: def.query_text,
            columns: def.columns,
            version: v,
        };
        database.tables.insert(name.clone(), Arc::new(TableEntry::ready(Table::View(Arc::new(view)))));
        database.set_version(v);
        info!(target: "catalogd::ddl", "created view {}.{} at version {}", db_key, name, v);
        Ok(v)
    }

    /// Drop any entry of the table namespace (table or view).
    pub fn drop_table(&self, db: &str, name: &str, if_exists: bool) -> AppResult<u64> {
        self.drop_table_entry(db, name, if_exists, false)
    }

    /// Drop a view; fails if `name` is a table.
    pub fn drop_view(&self, db: &str, name: &str, if_exists: bool) -> AppResult<u64> {
        self.drop_table_entry(db, name, if_exists, true)
    }

    fn drop_table_entry(&self, db: &str, name: &str, if_exists: bool, views_only: bool) -> AppResult<u64> {
        let (db_key, name) = (normalize_identifier(db), normalize_identifier(name));
        self.ensure_initialized()?;
        let listed_now = self.hydrate_for_ddl(&db_key, ListingClaims::default())?;
        let mut inner = self.inner.write();
        let entry = match self.db_mut(&mut inner, &db_key).map(|d| d.table(&name).cloned()) {
            Ok(Some(e)) => Some(e),
            Ok(None) if listed_now => None,
            Ok(None) if if_exists => return Ok(self.versions.current()),
            Ok(None) => return Err(table_not_found(&db_key, &name)),
            Err(AppError::NotFound { .. }) if if_exists => return Ok(self.versions.current()),
            Err(e) => return Err(e),
        };
        if let Some(entry) = &entry {
            if views_only && !matches!(self.load_entry(entry)?, Table::View(_)) {
                return Err(AppError::user("not_a_view".to_string(), format!("{}.{} is not a view", db_key, name)));
            }
        }
        let v = self.versions.next()?;
        let database = self.db_mut(&mut inner, &db_key)?;
        database.tables.remove(&name);
        database.set_version(v);
        match entry {
            Some(_) => info!(target: "catalogd::ddl", "dropped {}.{} at version {}", db_key, name, v),
            None => info!(target: "catalogd::ddl", "dropped {}.{} at version {} (already gone from the metastore listing)", db_key, name, v),
        }
        Ok(v)
    }

    pub fn alter_table(&self, db: &str, name: &str, op: AlterTableOp) -> AppResult<u64> {
        let (db_key, name) = (normalize_identifier(db), normalize_identifier(name));
        self.ensure_initialized()?;
        let op = match op {
            AlterTableOp::RenameTo { db: to_db, name: to_name } => {
                let to_db = normalize_identifier(&to_db);
                let to_name = validate_identifier("table", &to_name)?;
                return self.rename_table(&db_key, &name, &to_db, &to_name);
            }
            AlterTableOp::AddColumns { columns } => InPlaceAlter::AddColumns(columns),
            AlterTableOp::DropColumn { column } => InPlaceAlter::DropColumn(column),
            AlterTableOp::SetOwner { owner } => InPlaceAlter::SetOwner(owner),
            AlterTableOp::SetProperties { properties } => InPlaceAlter::SetProperties(properties),
        };
        self.hydrate_for_ddl(&db_key, ListingClaims::default())?;
        let mut inner = self.inner.write();
        let entry = self.db_mut(&mut inner, &db_key)?
            .table(&name).cloned()
            .ok_or_else(|| table_not_found(&db_key, &name))?;
        let altered = match op {
            InPlaceAlter::AddColumns(columns) => {
                let t = self.loaded_hdfs(&entry)?;
                let mut schema = t.schema.clone();
                schema.columns.extend(columns);
                schema.validate()?;
                AlteredTable::Hdfs(HdfsTable { schema, ..(*t).clone() })
            }
            InPlaceAlter::DropColumn(column) => {
                let t = self.loaded_hdfs(&entry)?;
                let col = normalize_identifier(&column);
                if t.schema.partition_keys.iter().any(|c| c.name == col) {
                    return Err(AppError::user("partition_column".to_string(), format!("Cannot drop partition column '{}'", col)));
                }
                let mut schema = t.schema.clone();
                let before = schema.columns.len();
                schema.columns.retain(|c| c.name != col);
                if schema.columns.len() == before {
                    return Err(AppError::not_found("column_not_found".to_string(), format!("Column not found: {}.{}.{}", db_key, name, col)));
                }
                AlteredTable::Hdfs(HdfsTable { schema, ..(*t).clone() })
            }
            InPlaceAlter::SetProperties(properties) => {
                let t = self.loaded_hdfs(&entry)?;
                let mut merged = t.properties.clone();
                merged.extend(properties);
                AlteredTable::Hdfs(HdfsTable { properties: merged, ..(*t).clone() })
            }
            InPlaceAlter::SetOwner(owner) => match self.load_entry(&entry)? {
                Table::Hdfs(t) => AlteredTable::Hdfs(HdfsTable { owner, ..(*t).clone() }),
                Table::View(v) => AlteredTable::View(View { owner, ..(*v).clone() }),
                Table::Incomplete(i) => return Err(i.cause.clone()),
            },
        };
        let v = self.versions.next()?;
        let table = match altered {
            AlteredTable::Hdfs(t) => Table::Hdfs(Arc::new(HdfsTable { version: v, ..t })),
            AlteredTable::View(view) => Table::View(Arc::new(View { version: v, ..view })),
        };
        entry.set_slot(TableSlot::Ready(table));
        info!(target: "catalogd::ddl", "altered {}.{} at version {}", db_key, name, v);
        Ok(v)
    }

    /// The file-backed table behind `entry`, loading it if needed.
    fn loaded_hdfs(&self, entry: &Arc<TableEntry>) -> AppResult<Arc<HdfsTable>> {
        match self.load_entry(entry)? {
            Table::Hdfs(t) => Ok(t),
            Table::View(_) => Err(AppError::user("not_a_table".to_string(), format!("{}.{} is a view; use alter_view", entry.db_name, entry.name))),
            Table::Incomplete(i) => Err(i.cause.clone()),
        }
    }

    /// Move a table-namespace entry to `to_db.to_name`. When the source
    /// database was listed for this call and no longer shows the table, the
    /// metastore has already renamed it and the target gets an unloaded entry.
    fn rename_table(&self, from_db: &str, from_name: &str, to_db: &str, to_name: &str) -> AppResult<u64> {
        let target_claims = ListingClaims::table(to_name);
        let source_listed_now = if from_db == to_db {
            self.hydrate_for_ddl(from_db, target_claims)?
        } else {
            self.hydrate_for_ddl(to_db, target_claims)?;
            self.hydrate_for_ddl(from_db, ListingClaims::default())?
        };
        let mut inner = self.inner.write();
        let entry = match self.db_mut(&mut inner, from_db)?.table(from_name).cloned() {
            Some(e) => Some(e),
            None if source_listed_now => None,
            None => return Err(table_not_found(from_db, from_name)),
        };
        if self.db_mut(&mut inner, to_db)?.tables.contains_key(to_name) {
            return Err(name_taken(to_db, to_name));
        }
        let v = self.versions.next()?;
        let moved = match entry.as_ref().map(|e| e.slot()) {
            Some(TableSlot::Ready(Table::Hdfs(t))) => {
                TableEntry::ready(Table::Hdfs(Arc::new(HdfsTable { db_name: to_db.to_string(), name: to_name.to_string(), version: v, ..(*t).clone() })))
            }
            Some(TableSlot::Ready(Table::View(view))) => {
                TableEntry::ready(Table::View(Arc::new(View { db_name: to_db.to_string(), name: to_name.to_string(), version: v, ..(*view).clone() })))
            }
            _ => TableEntry::unloaded(to_db, to_name, v),
        };
        let src = self.db_mut(&mut inner, from_db)?;
        src.tables.remove(from_name);
        src.set_version(v);
        let dst = self.db_mut(&mut inner, to_db)?;
        dst.tables.insert(to_name.to_string(), Arc::new(moved));
        dst.set_version(v);
        info!(target: "catalogd::ddl", "renamed {}.{} to {}.{} at version {}", from_db, from_name, to_db, to_name, v);
        Ok(v)
    }

    pub fn alter_view(&self, db: &str, name: &str, query_text: &str, columns: Vec<Column>) -> AppResult<u64> {
        let (db_key, name) = (normalize_identifier(db), normalize_identifier(name));
        if query_text.trim().is_empty() {
            return Err(AppError::user("invalid_view", "view query text must not be empty"));
        }
        TableSchema::new(columns.clone(), Vec::new())?;
        self.ensure_initialized()?;
        self.hydrate_for_ddl(&db_key, ListingClaims::default())?;
        let mut inner = self.inner.write();
        let entry = self.db_mut(&mut inner, &db_key)?
            .table(&name).cloned()
            .ok_or_else(|| table_not_found(&db_key, &name))?;
        let view = match self.load_entry(&entry)? {
            Table::View(v) => v,
            _ => return Err(AppError::user("not_a_view".to_string(), format!("{}.{} is not a view", db_key, name))),
        };
        let v = self.versions.next()?;
        let altered = View { query_text: query_text.to_string(), columns, version: v, ..(*view).clone() };
        entry.set_slot(TableSlot::Ready(Table::View(Arc::new(altered))));
        info!(target: "catalogd::ddl", "altered view {}.{} at version {}", db_key, name, v);
        Ok(v)
    }

    pub fn create_function(&self, db: &str, def: FunctionDef, if_not_exists: bool) -> AppResult<u64> {
        let db_key = normalize_identifier(db);
        let mut func = Function::from_def(&db_key, &def, 0)?;
        let sig = func.signature();
        self.ensure_initialized()?;
        self.hydrate_for_ddl(&db_key, ListingClaims::function(&sig))?;
        let mut inner = self.inner.write();
        let database = self.db_mut(&mut inner, &db_key)?;
        if database.functions.contains_key(&sig) {
            if if_not_exists {
                return Ok(self.versions.current());
            }
            return Err(AppError::conflict("function_exists".to_string(), format!("Function already exists: {}.{}", db_key, sig)));
        }
        let v = self.versions.next()?;
        func.version = v;
        database.functions.insert(sig.clone(), Arc::new(func));
        database.set_version(v);
        info!(target: "catalogd::ddl", "created function {}.{} at version {}", db_key, sig, v);
        Ok(v)
    }

    pub fn drop_function(&self, db: &str, signature: &str, if_exists: bool) -> AppResult<u64> {
        let db_key = normalize_identifier(db);
        let sig = normalize_signature(signature)?;
        self.ensure_initialized()?;
        let listed_now = self.hydrate_for_ddl(&db_key, ListingClaims::default())?;
        let mut inner = self.inner.write();
        let database = match self.db_mut(&mut inner, &db_key) {
            Ok(d) => d,
            Err(AppError::NotFound { .. }) if if_exists => return Ok(self.versions.current()),
            Err(e) => return Err(e),
        };
        if !database.functions.contains_key(&sig) && !listed_now {
            if if_exists {
                return Ok(self.versions.current());
            }
            return Err(AppError::not_found("function_not_found".to_string(), format!("Function not found: {}.{}", db_key, sig)));
        }
        let v = self.versions.next()?;
        database.functions.remove(&sig);
        database.set_version(v);
        info!(target: "catalogd::ddl", "dropped function {}.{} at version {}", db_key, sig, v);
        Ok(v)
    }

    /// Re-read a table from the metastore and install it at a new version.
    ///
    /// The fetch runs without the store lock. A failed fetch is returned to the
    /// caller and the previous state stays in place.
    pub fn refresh_table(&self, db: &str, name: &str) -> AppResult<u64> {
        let (db_key, name) = (normalize_identifier(db), normalize_identifier(name));
        self.ensure_initialized()?;
        self.hydrate_for_ddl(&db_key, ListingClaims::default())?;
        let entry = self.inner.read().databases.get(&db_key).and_then(|d| d.table(&name).cloned())
            .ok_or_else(|| table_not_found(&db_key, &name))?;

        let meta = self.fetch_table(&db_key, &name, &AtomicBool::new(false))?;
        let id = self.allocate_table_id();
        let fresh = Table::from_metastore(&meta, id, 0, &self.formats)?;

        let inner = self.inner.write();
        let still_there = inner.databases.get(&db_key).and_then(|d| d.table(&name)).map(|e| Arc::ptr_eq(e, &entry)).unwrap_or(false);
        if !still_there {
            return Err(AppError::inconsistent("table_dropped".to_string(), format!("{}.{} was dropped or replaced during refresh", db_key, name)));
        }
        if let (Some(old), Some(new)) = (entry.loaded().and_then(|t| t.last_ddl_time()), fresh.last_ddl_time()) {
            if old != new {
                info!(target: "catalogd::ddl", "{}.{} was modified outside the catalog (last_ddl_time {} -> {})", db_key, name, old, new);
            }
        }
        let v = self.versions.next()?;
        entry.set_slot(TableSlot::Ready(fresh.with_version(v)));
        drop(inner);
        info!(target: "catalogd::ddl", "refreshed {}.{} at version {}", db_key, name, v);
        Ok(v)
    }

    /// Drop a table's loaded state; the next access reloads it.
    pub fn invalidate_table(&self, db: &str, name: &str) -> AppResult<u64> {
        let (db_key, name) = (normalize_identifier(db), normalize_identifier(name));
        self.ensure_initialized()?;
        self.hydrate_for_ddl(&db_key, ListingClaims::default())?;
        let mut inner = self.inner.write();
        let entry = self.db_mut(&mut inner, &db_key)?
            .table(&name).cloned()
            .ok_or_else(|| table_not_found(&db_key, &name))?;
        let v = self.versions.next()?;
        entry.set_slot(TableSlot::Unloaded { version: v });
        info!(target: "catalogd::ddl", "invalidated {}.{} at version {}", db_key, name, v);
        Ok(v)
    }

    /// Record a new `last_ddl_time` on a loaded table. Advisory only: never
    /// bumps the version and every failure is dropped.
    pub fn update_last_ddl_time(&self, db: &str, name: &str, ddl_time: i64) {
        if let Err(e) = self.try_update_last_ddl_time(db, name, ddl_time) {
            debug!(target: "catalogd::ddl", "last_ddl_time update of {}.{} ignored: {}", db, name, e);
        }
    }

    fn try_update_last_ddl_time(&self, db: &str, name: &str, ddl_time: i64) -> AppResult<()> {
        let (db_key, name) = (normalize_identifier(db), normalize_identifier(name));
        self.ensure_initialized()?;
        self.hydrate_for_ddl(&db_key, ListingClaims::default())?;
        let mut inner = self.inner.write();
        let entry = self.db_mut(&mut inner, &db_key)?
            .table(&name).cloned()
            .ok_or_else(|| table_not_found(&db_key, &name))?;
        match self.load_entry(&entry)? {
            Table::Hdfs(t) => {
                entry.set_slot(TableSlot::Ready(Table::Hdfs(Arc::new(HdfsTable { last_ddl_time: ddl_time, ..(*t).clone() }))));
                Ok(())
            }
            Table::View(_) => Err(AppError::user("not_a_table".to_string(), format!("{}.{} is a view", db_key, name))),
            Table::Incomplete(i) => Err(i.cause.clone()),
        }
    }
}

/// Alter operations that rewrite an entry where it is.
enum InPlaceAlter {
    AddColumns(Vec<Column>),
    DropColumn(String),
    SetOwner(String),
    SetProperties(BTreeMap<String, String>),
}

enum AlteredTable {
    Hdfs(HdfsTable),
    View(View),
}
