//!
//! catalogd wire model
//! -------------------
//! Serializable views of catalog objects shipped to workers. A snapshot is an
//! ordered list of `WireObject`s plus the catalog version it is current as of.
//! Every object carries its own `catalog_version`.
//!
//! Table objects may be skeletons: a `TableWire` with no `body` only advertises
//! that `(db_name, table_name)` exists, so unchanged metadata is not re-sent.
//!
//! The compact transport encoding is bincode; the HTTP surface uses JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::schema::{Column, ColumnType, Partition};
use crate::catalog::version::INITIAL_CATALOG_VERSION;
use crate::error::AppResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalogObjectKind {
    Database,
    Table,
    View,
    Function,
    Catalog,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireObject {
    pub kind: CatalogObjectKind,
    pub catalog_version: u64,
    pub payload: WirePayload,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WirePayload {
    Database(DatabaseWire),
    Table(TableWire),
    Function(FunctionWire),
    Catalog(CatalogWire),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseWire {
    pub name: String,
    pub owner: String,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableWire {
    pub db_name: String,
    pub table_name: String,
    /// `None` for a skeleton entry.
    pub body: Option<TableBody>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TableBody {
    Hdfs(HdfsTableWire),
    View(ViewWire),
    Incomplete(IncompleteWire),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdfsTableWire {
    pub id: u32,
    pub owner: String,
    pub columns: Vec<Column>,
    pub partition_keys: Vec<Column>,
    pub partitions: Vec<Partition>,
    pub location: String,
    pub last_ddl_time: i64,
    pub properties: BTreeMap<String, String>,
    pub format: FormatWire,
}

/// Storage-format specific part of a table descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatWire {
    /// Discriminant such as `HDFS_TEXT_TABLE`.
    pub table_type: String,
    pub input_format: String,
    /// Handler-specific attributes (delimiters, serde library, ...).
    pub attributes: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewWire {
    pub id: u32,
    pub owner: String,
    pub query_text: String,
    pub columns: Vec<Column>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteWire {
    pub id: u32,
    pub error: WireError,
}

/// Error carried to remote consumers in place of a table payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub kind: String,
    pub code: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionWire {
    pub db_name: String,
    pub name: String,
    pub signature: String,
    pub arg_types: Vec<ColumnType>,
    pub return_type: ColumnType,
    pub has_var_args: bool,
    pub location: String,
    pub symbol: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogWire {
    pub service_id: Uuid,
}

impl WireObject {
    /// Name-only table entry at the initial sentinel version.
    pub fn table_skeleton(db_name: &str, table_name: &str) -> Self {
        WireObject {
            kind: CatalogObjectKind::Table,
            catalog_version: INITIAL_CATALOG_VERSION,
            payload: WirePayload::Table(TableWire { db_name: db_name.to_string(), table_name: table_name.to_string(), body: None }),
        }
    }

    pub fn catalog_meta(service_id: Uuid, version: u64) -> Self {
        WireObject { kind: CatalogObjectKind::Catalog, catalog_version: version, payload: WirePayload::Catalog(CatalogWire { service_id }) }
    }

    pub fn as_table(&self) -> Option<&TableWire> {
        match &self.payload { WirePayload::Table(t) => Some(t), _ => None }
    }

    pub fn is_skeleton(&self) -> bool { self.as_table().map(|t| t.body.is_none()).unwrap_or(false) }
}

/// Response of a snapshot request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub objects: Vec<WireObject>,
    pub max_catalog_version: u64,
}

impl CatalogSnapshot {
    pub fn encode(&self) -> AppResult<Vec<u8>> { Ok(bincode::serialize(self)?) }

    pub fn decode(bytes: &[u8]) -> AppResult<Self> { Ok(bincode::deserialize(bytes)?) }

    pub fn count(&self, kind: CatalogObjectKind) -> usize { self.objects.iter().filter(|o| o.kind == kind).count() }

    pub fn find_table(&self, db: &str, table: &str) -> Option<&WireObject> {
        let (db, table) = (crate::ident::normalize_identifier(db), crate::ident::normalize_identifier(table));
        self.objects.iter().find(|o| o.as_table().map(|t| t.db_name == db && t.table_name == table).unwrap_or(false))
    }

    pub fn find_database(&self, db: &str) -> Option<&WireObject> {
        let db = crate::ident::normalize_identifier(db);
        self.objects.iter().find(|o| matches!(&o.payload, WirePayload::Database(d) if d.name == db))
    }

    pub fn catalog_meta(&self) -> Option<&WireObject> { self.objects.iter().find(|o| o.kind == CatalogObjectKind::Catalog) }
}
