use uuid::Uuid;

use crate::catalog::database::DatabaseInfo;
use crate::catalog::function::Function;
use crate::catalog::table::Table;
use crate::error::AppResult;
use crate::wire::{CatalogObjectKind, WireObject};

/// Behaviour shared by everything the catalog versions and ships.
pub trait CatalogObject {
    fn kind(&self) -> CatalogObjectKind;
    /// Version at which the object reached its current state.
    fn version(&self) -> u64;
    fn to_wire(&self) -> AppResult<WireObject>;
}

/// Catalog-wide singleton emitted once per snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CatalogMeta {
    pub service_id: Uuid,
    pub version: u64,
}

impl CatalogObject for CatalogMeta {
    fn kind(&self) -> CatalogObjectKind { CatalogObjectKind::Catalog }
    fn version(&self) -> u64 { self.version }
    fn to_wire(&self) -> AppResult<WireObject> { Ok(WireObject::catalog_meta(self.service_id, self.version)) }
}

impl CatalogObject for DatabaseInfo {
    fn kind(&self) -> CatalogObjectKind { CatalogObjectKind::Database }
    fn version(&self) -> u64 { self.version }
    fn to_wire(&self) -> AppResult<WireObject> { Ok(DatabaseInfo::to_wire(self)) }
}

impl CatalogObject for Table {
    fn kind(&self) -> CatalogObjectKind { Table::kind(self) }
    fn version(&self) -> u64 { Table::version(self) }
    fn to_wire(&self) -> AppResult<WireObject> { Table::to_wire(self) }
}

impl CatalogObject for Function {
    fn kind(&self) -> CatalogObjectKind { CatalogObjectKind::Function }
    fn version(&self) -> u64 { self.version }
    fn to_wire(&self) -> AppResult<WireObject> { Ok(Function::to_wire(self)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn objects_report_kind_and_version_through_the_trait() {
        let objs: Vec<Box<dyn CatalogObject>> = vec![
            Box::new(CatalogMeta { service_id: Uuid::new_v4(), version: 9 }),
            Box::new(DatabaseInfo { name: "default".into(), owner: "admin".into(), comment: None, version: 2 }),
            Box::new(Table::incomplete(1, "default", "t", AppError::load_failure("load_cancelled", "cancelled"), 4)),
        ];
        let kinds: Vec<_> = objs.iter().map(|o| o.kind()).collect();
        assert_eq!(kinds, vec![CatalogObjectKind::Catalog, CatalogObjectKind::Database, CatalogObjectKind::Table]);
        for o in &objs {
            assert_eq!(o.to_wire().unwrap().catalog_version, o.version());
        }
    }
}
