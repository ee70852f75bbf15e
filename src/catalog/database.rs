use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::function::Function;
use crate::catalog::table::TableEntry;
use crate::wire::{CatalogObjectKind, DatabaseWire, WireObject, WirePayload};

/// Point-in-time view of a database's own metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub owner: String,
    pub comment: Option<String>,
    pub version: u64,
}

impl DatabaseInfo {
    pub fn to_wire(&self) -> WireObject {
        WireObject {
            kind: CatalogObjectKind::Database,
            catalog_version: self.version,
            payload: WirePayload::Database(DatabaseWire { name: self.name.clone(), owner: self.owner.clone(), comment: self.comment.clone() }),
        }
    }
}

/// Catalog-side database: metadata plus its table and function namespaces.
/// Map keys are normalised names (signatures for functions); iteration order
/// is therefore stable across snapshots.
#[derive(Debug)]
pub(crate) struct Database {
    pub(crate) info: DatabaseInfo,
    pub(crate) tables: BTreeMap<String, Arc<TableEntry>>,
    pub(crate) functions: BTreeMap<String, Arc<Function>>,
    /// False until tables and functions were enumerated from the metastore.
    pub(crate) hydrated: bool,
}

impl Database {
    pub(crate) fn new(name: &str, owner: &str, comment: Option<String>, version: u64, hydrated: bool) -> Self {
        Self {
            info: DatabaseInfo { name: name.to_string(), owner: owner.to_string(), comment, version },
            tables: BTreeMap::new(),
            functions: BTreeMap::new(),
            hydrated,
        }
    }

    pub(crate) fn name(&self) -> &str { &self.info.name }

    pub(crate) fn version(&self) -> u64 { self.info.version }

    pub(crate) fn set_version(&mut self, version: u64) { self.info.version = version; }

    pub(crate) fn table(&self, name: &str) -> Option<&Arc<TableEntry>> { self.tables.get(name) }

    pub(crate) fn is_empty(&self) -> bool { self.tables.is_empty() && self.functions.is_empty() }

    pub(crate) fn table_names(&self) -> Vec<String> { self.tables.keys().cloned().collect() }
}
