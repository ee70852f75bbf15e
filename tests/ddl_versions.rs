//! Version accounting of DDL: every successful mutation draws exactly one new
//! version, failures and no-ops draw none, and the counter always matches the
//! newest live object.

mod common;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use catalogd::catalog::{AlterTableOp, Column, ColumnType, DdlRequest, FunctionDef, TableLoadState, ViewDef};
use catalogd::wire::CatalogObjectKind;
use catalogd::CatalogConfig;

use common::{catalog_with, store, text_table};

#[test]
fn counter_matches_newest_live_object_after_random_ddl() {
    let ms = store(&[("default", "base1"), ("default", "base2"), ("analytics", "facts")]);
    let cat = catalog_with(&ms, CatalogConfig::default());
    let mut rng = StdRng::seed_from_u64(0x5EED_CA7A);
    let dbs = ["default", "analytics", "scratch"];
    let mut last_ok = cat.current_version();

    for step in 0..1000 {
        let db = dbs[rng.gen_range(0..dbs.len())];
        let name = format!("t{}", rng.gen_range(0..12));
        let res = match rng.gen_range(0..12) {
            0 => cat.create_database(db, "etl", None, rng.gen_bool(0.5)),
            1 => cat.create_table(db, text_table(&name), rng.gen_bool(0.5)),
            2 => cat.drop_table(db, &name, rng.gen_bool(0.5)),
            3 => cat.create_view(db, ViewDef { name: name.clone(), owner: "bi".into(), query_text: "SELECT 1".into(), columns: vec![] }, false),
            4 => cat.alter_table(db, &name, AlterTableOp::SetOwner { owner: format!("o{}", step) }),
            5 => cat.alter_table(db, &name, AlterTableOp::AddColumns { columns: vec![Column::new(&format!("c{}", step), ColumnType::Int)] }),
            6 => {
                let to = dbs[rng.gen_range(0..dbs.len())];
                cat.alter_table(db, &name, AlterTableOp::RenameTo { db: to.into(), name: format!("t{}", rng.gen_range(0..12)) })
            }
            7 => cat.invalidate_table(db, &name),
            8 => cat.refresh_table(db, "base1"),
            9 => {
                let def = FunctionDef {
                    name: format!("f{}", rng.gen_range(0..4)),
                    arg_types: vec![ColumnType::Int],
                    return_type: ColumnType::Int,
                    has_var_args: false,
                    location: "/lib/f.so".into(),
                    symbol: "f".into(),
                };
                cat.create_function(db, def, true)
            }
            10 => cat.drop_function(db, &format!("f{}(int)", rng.gen_range(0..4)), true),
            _ => cat.alter_database(db, &format!("owner{}", step)),
        };
        if let Ok(v) = res {
            assert!(v >= last_ok, "step {}: version went backwards ({} < {})", step, v, last_ok);
            last_ok = v;
        }
        if step % 100 == 99 {
            let snap = cat.get_catalog_objects(0).unwrap();
            let newest = snap.objects.iter()
                .filter(|o| o.kind != CatalogObjectKind::Catalog)
                .map(|o| o.catalog_version)
                .max()
                .unwrap();
            assert_eq!(cat.current_version(), newest, "step {}", step);
            assert_eq!(snap.max_catalog_version, newest);
        }
    }
}

#[test]
fn successful_ddl_draws_exactly_one_version() {
    let cat = catalog_with(&store(&[]), CatalogConfig::default());
    let mut prev = cat.current_version();
    let ops = vec![
        DdlRequest::CreateDatabase { name: "sales".into(), owner: "etl".into(), comment: None, if_not_exists: false },
        DdlRequest::CreateTable { db: "sales".into(), table: text_table("orders"), if_not_exists: false },
        DdlRequest::AlterTable { db: "sales".into(), name: "orders".into(), alter: AlterTableOp::SetProperties { properties: BTreeMap::new() } },
        DdlRequest::CreateView {
            db: "sales".into(),
            view: ViewDef { name: "recent".into(), owner: "bi".into(), query_text: "SELECT * FROM sales.orders".into(), columns: vec![] },
            if_not_exists: false,
        },
        DdlRequest::AlterView { db: "sales".into(), name: "recent".into(), query_text: "SELECT id FROM sales.orders".into(), columns: vec![] },
        DdlRequest::InvalidateTable { db: "sales".into(), name: "orders".into() },
        DdlRequest::DropView { db: "sales".into(), name: "recent".into(), if_exists: false },
        DdlRequest::DropTable { db: "sales".into(), name: "orders".into(), if_exists: false },
        DdlRequest::DropDatabase { name: "sales".into(), if_exists: false, cascade: false },
    ];
    for op in ops {
        let resp = cat.execute_ddl(op.clone()).unwrap_or_else(|e| panic!("{:?} failed: {}", op, e));
        assert_eq!(resp.new_version, prev + 1, "{:?}", op);
        prev = resp.new_version;
    }
}

#[test]
fn missing_table_ddl_time_update_is_silent_and_free() {
    let ms = store(&[("default", "t1")]);
    let cat = catalog_with(&ms, CatalogConfig::default());
    let v = cat.current_version();
    cat.update_last_ddl_time("default", "missing", 1_800_000_000);
    cat.update_last_ddl_time("nodb", "missing", 1_800_000_000);
    assert_eq!(cat.current_version(), v);

    cat.get_table("default", "t1").unwrap();
    let loaded_at = cat.current_version();
    cat.update_last_ddl_time("default", "t1", 1_800_000_000);
    assert_eq!(cat.current_version(), loaded_at);
    assert_eq!(cat.get_table("default", "t1").unwrap().unwrap().last_ddl_time(), Some(1_800_000_000));
}

#[test]
fn invalidate_is_idempotent_apart_from_versions() {
    let ms = store(&[("default", "t1")]);
    let cat = catalog_with(&ms, CatalogConfig::default());
    let a = cat.invalidate_table("default", "t1").unwrap();
    let snap_a = cat.table_load_state("default", "t1");
    let b = cat.invalidate_table("default", "t1").unwrap();
    let snap_b = cat.table_load_state("default", "t1");
    assert!(b > a);
    assert_eq!(snap_a, Some(TableLoadState::Unloaded));
    assert_eq!(snap_a, snap_b);
    assert_eq!(ms.load_calls("default", "t1"), 0);
}

#[test]
fn strict_failures_report_typed_codes() {
    let cat = catalog_with(&store(&[("default", "t1")]), CatalogConfig::default());
    let before = cat.current_version();
    let cases: Vec<(DdlRequest, &str, u16)> = vec![
        (DdlRequest::CreateDatabase { name: "a.b".into(), owner: String::new(), comment: None, if_not_exists: false }, "invalid_identifier", 400),
        (DdlRequest::DropDatabase { name: "nope".into(), if_exists: false, cascade: true }, "database_not_found", 404),
        (DdlRequest::DropDatabase { name: "default".into(), if_exists: false, cascade: false }, "database_not_empty", 409),
        (DdlRequest::AlterTable { db: "default".into(), name: "t1".into(), alter: AlterTableOp::DropColumn { column: "nope".into() } }, "column_not_found", 404),
        (DdlRequest::DropFunction { db: "default".into(), signature: "bad signature".into(), if_exists: true }, "invalid_signature", 400),
        (DdlRequest::AlterView { db: "default".into(), name: "t1".into(), query_text: "SELECT 1".into(), columns: vec![] }, "not_a_view", 400),
    ];
    for (req, code, status) in cases {
        let err = cat.execute_ddl(req).unwrap_err();
        assert_eq!(err.code_str(), code);
        assert_eq!(err.http_status(), status);
    }
    // loading t1 for the alter checks is the only version movement
    assert_eq!(cat.current_version(), before + 1);
}
