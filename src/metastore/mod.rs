//!
//! External metadata store contract
//! --------------------------------
//! The metastore is the source of truth for databases, tables and functions.
//! The catalog only reads from it: databases, table names and functions are
//! enumerated, and individual tables are hydrated on demand via `load_table`.
//!
//! Two implementations ship with the crate:
//! - `InMemoryMetaStore`: map-backed, with per-table fault injection and load
//!   counters. Used by tests and benchmarks.
//! - `DirMetaStore`: JSON documents under a root folder. Used by the binary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod memory;
pub mod dir;

pub use dir::DirMetaStore;
pub use memory::{InMemoryMetaStore, TableFault};

/// Typed metastore failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetastoreError {
    #[error("object not found in metastore: {0}")]
    NotFound(String),
    #[error("transient metastore failure: {0}")]
    Transient(String),
    #[error("metastore schema error: {0}")]
    Schema(String),
}

pub type MetastoreResult<T> = Result<T, MetastoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetastoreDatabase {
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetastoreTableType {
    #[default]
    Managed,
    External,
    View,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetastoreColumn {
    pub name: String,
    /// Type name as the metastore spells it, e.g. `int`, `string`, `bigint`.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetastorePartition {
    pub values: Vec<String>,
    #[serde(default)]
    pub location: String,
}

/// Raw table descriptor as returned by `load_table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetastoreTable {
    pub db_name: String,
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub table_type: MetastoreTableType,
    #[serde(default)]
    pub columns: Vec<MetastoreColumn>,
    #[serde(default)]
    pub partition_keys: Vec<MetastoreColumn>,
    #[serde(default)]
    pub partitions: Vec<MetastorePartition>,
    /// Input format class; selects the storage-format handler.
    #[serde(default)]
    pub input_format: String,
    #[serde(default)]
    pub location: String,
    /// Only set for views.
    #[serde(default)]
    pub view_text: Option<String>,
    #[serde(default)]
    pub last_ddl_time: i64,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetastoreFunction {
    pub db_name: String,
    pub name: String,
    #[serde(default)]
    pub arg_types: Vec<String>,
    pub return_type: String,
    #[serde(default)]
    pub has_var_args: bool,
    /// Location of the binary implementing the function.
    pub location: String,
    #[serde(default)]
    pub symbol: String,
}

/// Read-side contract of the external metadata store.
///
/// Any call may fail. Implementations must be callable from several threads at
/// once: the catalog runs `load_table` on a dedicated thread so it can bound it
/// with a timeout.
pub trait MetaStore: Send + Sync + 'static {
    fn list_databases(&self) -> MetastoreResult<Vec<MetastoreDatabase>>;
    fn list_tables(&self, db: &str) -> MetastoreResult<Vec<String>>;
    fn load_table(&self, db: &str, name: &str) -> MetastoreResult<MetastoreTable>;
    fn list_functions(&self, db: &str) -> MetastoreResult<Vec<MetastoreFunction>>;
}
