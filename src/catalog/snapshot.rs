//! Snapshot exporter: a consistent, delta-compressed export of the catalog.

use tracing::{debug, error};

use super::object::{CatalogMeta, CatalogObject};
use super::table::Table;
use super::{Catalog, CatalogInner};
use crate::error::{AppError, AppResult};
use crate::wire::{CatalogSnapshot, WireObject};

impl Catalog {
    /// Export every object under one read lock.
    ///
    /// Tables whose version is below `from_version` are emitted as name-only
    /// skeletons. A table that fails to hydrate is exported as incomplete; only
    /// a serialisation failure of a loaded table aborts the snapshot.
    pub fn get_catalog_objects(&self, from_version: u64) -> AppResult<CatalogSnapshot> {
        self.ensure_initialized()?;
        let inner = self.inner.read();
        let mut objects: Vec<WireObject> = Vec::new();

        for db in inner.databases.values() {
            objects.push(db.info.to_wire());
        }

        let (mut full, mut skeletons) = (0usize, 0usize);
        for db in inner.databases.values() {
            for name in db.tables.keys() {
                let table = match self.resolve_for_snapshot(&inner, db.name(), name) {
                    Some(t) => t,
                    None => {
                        error!(target: "catalogd::snapshot", "table {}.{} disappeared during the catalog walk, skipping", db.name(), name);
                        continue;
                    }
                };
                if table.version() >= from_version {
                    let wire = CatalogObject::to_wire(&table).map_err(|e| {
                        AppError::fatal("to_wire_failed".to_string(), format!("cannot serialise loaded table {}.{}: {}", db.name(), name, e))
                    })?;
                    objects.push(wire);
                    full += 1;
                } else {
                    objects.push(WireObject::table_skeleton(db.name(), name));
                    skeletons += 1;
                }
            }
        }

        for db in inner.databases.values() {
            for f in db.functions.values() {
                objects.push(f.to_wire());
            }
        }

        let max_version = self.versions.current();
        objects.push(CatalogMeta { service_id: self.service_id, version: max_version }.to_wire()?);
        drop(inner);

        debug!(target: "catalogd::snapshot", from_version, max_version, full, skeletons, "snapshot produced with {} object(s)", objects.len());
        self.published.observe(max_version);
        Ok(CatalogSnapshot { objects, max_catalog_version: max_version })
    }

    /// Non-throwing table resolution on the exporter's own read guard. Never
    /// hydrates a database's table list.
    fn resolve_for_snapshot(&self, inner: &CatalogInner, db: &str, name: &str) -> Option<Table> {
        let entry = inner.databases.get(db)?.table(name)?.clone();
        match self.load_entry(&entry) {
            Ok(t) => Some(t),
            Err(e) => {
                error!(target: "catalogd::snapshot", "cannot resolve {}.{}: {}", db, name, e);
                None
            }
        }
    }
}
