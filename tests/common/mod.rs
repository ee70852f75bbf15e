//! Fixtures shared by the integration suites.
#![allow(dead_code)]

use std::sync::Arc;

use catalogd::catalog::format::TEXT_INPUT_FORMAT;
use catalogd::catalog::{Column, ColumnType, TableDef};
use catalogd::metastore::{InMemoryMetaStore, MetastoreColumn, MetastoreTable, MetastoreTableType};
use catalogd::{Catalog, CatalogConfig};

pub fn mtable(db: &str, name: &str) -> MetastoreTable {
    MetastoreTable {
        db_name: db.into(),
        name: name.into(),
        owner: "etl".into(),
        table_type: MetastoreTableType::External,
        columns: vec![
            MetastoreColumn { name: "id".into(), type_name: "bigint".into(), comment: None },
            MetastoreColumn { name: "payload".into(), type_name: "string".into(), comment: None },
        ],
        partition_keys: vec![],
        partitions: vec![],
        input_format: TEXT_INPUT_FORMAT.into(),
        location: format!("/warehouse/{}/{}", db, name),
        view_text: None,
        last_ddl_time: 1_700_000_000,
        parameters: Default::default(),
    }
}

/// `default` and `analytics` databases holding `tables` as `(db, name)` pairs.
pub fn store(tables: &[(&str, &str)]) -> InMemoryMetaStore {
    let ms = InMemoryMetaStore::new();
    ms.add_database("default", "admin");
    ms.add_database("analytics", "bi");
    for (db, name) in tables {
        ms.put_table(mtable(db, name));
    }
    ms
}

pub fn catalog_with(ms: &InMemoryMetaStore, config: CatalogConfig) -> Arc<Catalog> {
    Arc::new(Catalog::new(config, Arc::new(ms.clone())).expect("catalog"))
}

pub fn text_table(name: &str) -> TableDef {
    TableDef {
        name: name.into(),
        owner: "etl".into(),
        columns: vec![Column::new("id", ColumnType::BigInt)],
        partition_keys: vec![],
        input_format: TEXT_INPUT_FORMAT.into(),
        location: format!("/warehouse/{}", name),
        properties: Default::default(),
        last_ddl_time: None,
    }
}
