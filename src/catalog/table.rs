//! Tables, views and the incomplete-table sentinel.
//!
//! A `Table` is a cheap handle (`Arc` inside) captured by value: once a reader
//! holds one, later DDL replaces the catalog's slot but never mutates the
//! instance the reader sees.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::catalog::format::{FormatRegistry, TableFormat, TableSink};
use crate::catalog::schema::{Column, Partition, TableSchema};
use crate::error::{AppError, AppResult};
use crate::ident::normalize_identifier;
use crate::metastore::{MetastoreError, MetastoreTable, MetastoreTableType};
use crate::wire::{CatalogObjectKind, HdfsTableWire, IncompleteWire, TableBody, TableWire, ViewWire, WireError, WireObject, WirePayload};

/// A file-backed table with its storage-format handler.
#[derive(Clone)]
pub struct HdfsTable {
    pub id: u32,
    pub db_name: String,
    pub name: String,
    pub owner: String,
    pub schema: TableSchema,
    pub partitions: Vec<Partition>,
    pub location: String,
    pub last_ddl_time: i64,
    pub properties: BTreeMap<String, String>,
    pub format: Arc<dyn TableFormat>,
    pub version: u64,
}

impl fmt::Debug for HdfsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdfsTable")
            .field("id", &self.id)
            .field("table", &format_args!("{}.{}", self.db_name, self.name))
            .field("format", &self.format.table_type())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl PartialEq for HdfsTable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.db_name == other.db_name
            && self.name == other.name
            && self.owner == other.owner
            && self.schema == other.schema
            && self.partitions == other.partitions
            && self.location == other.location
            && self.last_ddl_time == other.last_ddl_time
            && self.properties == other.properties
            && self.format.table_type() == other.format.table_type()
            && self.version == other.version
    }
}

impl HdfsTable {
    pub fn create_write_sink(&self, partition_key_exprs: &[String], overwrite: bool) -> AppResult<TableSink> {
        self.format.create_write_sink(self, partition_key_exprs, overwrite)
    }

    fn wire_body(&self) -> AppResult<HdfsTableWire> {
        Ok(HdfsTableWire {
            id: self.id,
            owner: self.owner.clone(),
            columns: self.schema.columns.clone(),
            partition_keys: self.schema.partition_keys.clone(),
            partitions: self.partitions.clone(),
            location: self.location.clone(),
            last_ddl_time: self.last_ddl_time,
            properties: self.properties.clone(),
            format: self.format.to_wire(self)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct View {
    pub id: u32,
    pub db_name: String,
    pub name: String,
    pub owner: String,
    pub query_text: String,
    pub columns: Vec<Column>,
    pub version: u64,
}

/// Stands in for a table whose metadata could not be hydrated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncompleteTable {
    pub id: u32,
    pub db_name: String,
    pub name: String,
    /// Always an `AppError::LoadFailure`.
    pub cause: AppError,
    pub version: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Table {
    Hdfs(Arc<HdfsTable>),
    View(Arc<View>),
    Incomplete(Arc<IncompleteTable>),
}

impl Table {
    pub fn incomplete(id: u32, db_name: &str, name: &str, cause: AppError, version: u64) -> Self {
        let cause = match cause {
            e @ AppError::LoadFailure { .. } => e,
            other => AppError::load_failure(other.code_str().to_string(), other.message().to_string()),
        };
        Table::Incomplete(Arc::new(IncompleteTable { id, db_name: db_name.to_string(), name: name.to_string(), cause, version }))
    }

    pub fn kind(&self) -> CatalogObjectKind {
        match self {
            Table::View(_) => CatalogObjectKind::View,
            _ => CatalogObjectKind::Table,
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            Table::Hdfs(t) => t.id,
            Table::View(v) => v.id,
            Table::Incomplete(i) => i.id,
        }
    }

    pub fn db_name(&self) -> &str {
        match self {
            Table::Hdfs(t) => &t.db_name,
            Table::View(v) => &v.db_name,
            Table::Incomplete(i) => &i.db_name,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Table::Hdfs(t) => &t.name,
            Table::View(v) => &v.name,
            Table::Incomplete(i) => &i.name,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            Table::Hdfs(t) => t.version,
            Table::View(v) => v.version,
            Table::Incomplete(i) => i.version,
        }
    }

    pub fn is_incomplete(&self) -> bool { matches!(self, Table::Incomplete(_)) }

    pub fn load_error(&self) -> Option<&AppError> {
        match self {
            Table::Incomplete(i) => Some(&i.cause),
            _ => None,
        }
    }

    pub fn last_ddl_time(&self) -> Option<i64> {
        match self {
            Table::Hdfs(t) => Some(t.last_ddl_time),
            _ => None,
        }
    }

    pub fn as_hdfs(&self) -> Option<&HdfsTable> {
        match self {
            Table::Hdfs(t) => Some(t.as_ref()),
            _ => None,
        }
    }

    /// Same table at a new version.
    pub(crate) fn with_version(&self, version: u64) -> Table {
        match self {
            Table::Hdfs(t) => Table::Hdfs(Arc::new(HdfsTable { version, ..(**t).clone() })),
            Table::View(v) => Table::View(Arc::new(View { version, ..(**v).clone() })),
            Table::Incomplete(i) => Table::Incomplete(Arc::new(IncompleteTable { version, ..(**i).clone() })),
        }
    }

    /// Full wire object. For incomplete tables the payload carries the load error.
    pub fn to_wire(&self) -> AppResult<WireObject> {
        let body = match self {
            Table::Hdfs(t) => TableBody::Hdfs(t.wire_body()?),
            Table::View(v) => TableBody::View(ViewWire { id: v.id, owner: v.owner.clone(), query_text: v.query_text.clone(), columns: v.columns.clone() }),
            Table::Incomplete(i) => TableBody::Incomplete(IncompleteWire {
                id: i.id,
                error: WireError { kind: "LOAD_FAILURE".to_string(), code: i.cause.code_str().to_string(), message: i.cause.message().to_string() },
            }),
        };
        Ok(WireObject {
            kind: self.kind(),
            catalog_version: self.version(),
            payload: WirePayload::Table(TableWire { db_name: self.db_name().to_string(), table_name: self.name().to_string(), body: Some(body) }),
        })
    }

    /// Rebuild a table from a full wire object.
    pub fn from_wire(obj: &WireObject, formats: &FormatRegistry) -> AppResult<Table> {
        let tw = obj.as_table().ok_or_else(|| AppError::user("not_a_table".to_string(), format!("{:?} object is not a table", obj.kind)))?;
        let body = tw.body.as_ref().ok_or_else(|| AppError::user("skeleton_table".to_string(), format!("{}.{} is a skeleton entry", tw.db_name, tw.table_name)))?;
        let version = obj.catalog_version;
        Ok(match body {
            TableBody::Hdfs(h) => {
                let format = formats.by_table_type(&h.format.table_type).ok_or_else(|| {
                    AppError::user("unsupported_format".to_string(), format!("No handler for table type '{}'", h.format.table_type))
                })?;
                Table::Hdfs(Arc::new(HdfsTable {
                    id: h.id,
                    db_name: tw.db_name.clone(),
                    name: tw.table_name.clone(),
                    owner: h.owner.clone(),
                    schema: TableSchema { columns: h.columns.clone(), partition_keys: h.partition_keys.clone() },
                    partitions: h.partitions.clone(),
                    location: h.location.clone(),
                    last_ddl_time: h.last_ddl_time,
                    properties: h.properties.clone(),
                    format,
                    version,
                }))
            }
            TableBody::View(v) => Table::View(Arc::new(View {
                id: v.id,
                db_name: tw.db_name.clone(),
                name: tw.table_name.clone(),
                owner: v.owner.clone(),
                query_text: v.query_text.clone(),
                columns: v.columns.clone(),
                version,
            })),
            TableBody::Incomplete(i) => Table::incomplete(i.id, &tw.db_name, &tw.table_name, AppError::load_failure(i.error.code.clone(), i.error.message.clone()), version),
        })
    }

    /// Build from a metastore descriptor. Errors are load failures.
    pub(crate) fn from_metastore(meta: &MetastoreTable, id: u32, version: u64, formats: &FormatRegistry) -> AppResult<Table> {
        let db_name = normalize_identifier(&meta.db_name);
        let name = normalize_identifier(&meta.name);
        let columns = meta.columns.iter().map(Column::from_metastore).collect::<Result<Vec<_>, MetastoreError>>()?;
        if meta.table_type == MetastoreTableType::View {
            let query_text = meta.view_text.clone()
                .ok_or_else(|| AppError::from(MetastoreError::Schema(format!("view {}.{} has no view text", db_name, name))))?;
            return Ok(Table::View(Arc::new(View { id, db_name, name, owner: meta.owner.clone(), query_text, columns, version })));
        }
        let partition_keys = meta.partition_keys.iter().map(Column::from_metastore).collect::<Result<Vec<_>, MetastoreError>>()?;
        let schema = TableSchema { columns, partition_keys };
        schema.validate().map_err(|e| AppError::load_failure("metastore_schema".to_string(), e.message().to_string()))?;
        let format = formats.resolve(&meta.input_format).ok_or_else(|| {
            AppError::load_failure("unsupported_format".to_string(), format!("{}.{}: unsupported input format '{}'", db_name, name, meta.input_format))
        })?;
        Ok(Table::Hdfs(Arc::new(HdfsTable {
            id,
            db_name,
            name,
            owner: meta.owner.clone(),
            schema,
            partitions: meta.partitions.iter().map(Partition::from).collect(),
            location: meta.location.clone(),
            last_ddl_time: meta.last_ddl_time,
            properties: meta.parameters.clone(),
            format,
            version,
        })))
    }
}

/// Observable hydration state of a catalog table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableLoadState {
    Unloaded,
    Loading,
    Loaded,
    Incomplete,
}

#[derive(Clone, Debug)]
pub(crate) enum TableSlot {
    Unloaded { version: u64 },
    Loading { version: u64 },
    Ready(Table),
}

/// One name in a database's table namespace.
///
/// `latch` serialises hydration so concurrent readers issue one metastore
/// fetch; `cancel` is raised by `Catalog::cancel_load` for the fetch in flight.
#[derive(Debug)]
pub(crate) struct TableEntry {
    pub(crate) db_name: String,
    pub(crate) name: String,
    slot: Mutex<TableSlot>,
    pub(crate) latch: Mutex<()>,
    pub(crate) cancel: AtomicBool,
}

impl TableEntry {
    pub(crate) fn unloaded(db_name: &str, name: &str, version: u64) -> Self {
        Self::with_slot(db_name, name, TableSlot::Unloaded { version })
    }

    pub(crate) fn ready(table: Table) -> Self {
        let (db, name) = (table.db_name().to_string(), table.name().to_string());
        Self::with_slot(&db, &name, TableSlot::Ready(table))
    }

    fn with_slot(db_name: &str, name: &str, slot: TableSlot) -> Self {
        Self { db_name: db_name.to_string(), name: name.to_string(), slot: Mutex::new(slot), latch: Mutex::new(()), cancel: AtomicBool::new(false) }
    }

    pub(crate) fn slot(&self) -> TableSlot { self.slot.lock().clone() }

    pub(crate) fn set_slot(&self, slot: TableSlot) { *self.slot.lock() = slot; }

    pub(crate) fn loaded(&self) -> Option<Table> {
        match &*self.slot.lock() {
            TableSlot::Ready(t) => Some(t.clone()),
            _ => None,
        }
    }

    pub(crate) fn version(&self) -> u64 {
        match &*self.slot.lock() {
            TableSlot::Unloaded { version } | TableSlot::Loading { version } => *version,
            TableSlot::Ready(t) => t.version(),
        }
    }

    pub(crate) fn load_state(&self) -> TableLoadState {
        match &*self.slot.lock() {
            TableSlot::Unloaded { .. } => TableLoadState::Unloaded,
            TableSlot::Loading { .. } => TableLoadState::Loading,
            TableSlot::Ready(Table::Incomplete(_)) => TableLoadState::Incomplete,
            TableSlot::Ready(_) => TableLoadState::Loaded,
        }
    }

    /// Unloaded -> Loading; returns false if another state was found.
    pub(crate) fn begin_loading(&self) -> bool {
        let mut g = self.slot.lock();
        match *g {
            TableSlot::Unloaded { version } => {
                *g = TableSlot::Loading { version };
                true
            }
            _ => false,
        }
    }

    /// Loading -> Unloaded, used when no version could be issued for the result.
    pub(crate) fn abort_loading(&self) {
        let mut g = self.slot.lock();
        if let TableSlot::Loading { version } = *g {
            *g = TableSlot::Unloaded { version };
        }
    }

    pub(crate) fn is_loading(&self) -> bool { matches!(*self.slot.lock(), TableSlot::Loading { .. }) }
}
