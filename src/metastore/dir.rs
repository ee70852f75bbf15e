//! Directory-backed metastore.
//!
//! Layout under the root folder:
//! - `<db>/database.json`            database descriptor (owner, comment)
//! - `<db>/tables/<table>.json`      one `MetastoreTable` per file
//! - `<db>/functions/<any>.json`     one `MetastoreFunction` per file
//!
//! Folders starting with `.` are ignored.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use super::{MetaStore, MetastoreDatabase, MetastoreError, MetastoreFunction, MetastoreResult, MetastoreTable};
use crate::ident::{normalize_identifier, to_local_path};

#[derive(Clone, Debug)]
pub struct DirMetaStore {
    root: PathBuf,
}

fn io_err(path: &Path, e: std::io::Error) -> MetastoreError {
    if e.kind() == ErrorKind::NotFound {
        MetastoreError::NotFound(path.display().to_string())
    } else {
        MetastoreError::Transient(format!("{}: {}", path.display(), e))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> MetastoreResult<T> {
    let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str::<T>(&text).map_err(|e| MetastoreError::Schema(format!("{}: {}", path.display(), e)))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> MetastoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| MetastoreError::Schema(e.to_string()))?;
    // write-then-rename so concurrent readers never observe a torn file
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_err(path, e))
}

impl DirMetaStore {
    pub fn new(root: impl AsRef<Path>) -> MetastoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        Ok(Self { root })
    }

    pub fn root_path(&self) -> &Path { &self.root }

    fn db_dir(&self, db: &str) -> PathBuf { to_local_path(&self.root, &[&normalize_identifier(db)]) }
    fn tables_dir(&self, db: &str) -> PathBuf { self.db_dir(db).join("tables") }
    fn functions_dir(&self, db: &str) -> PathBuf { self.db_dir(db).join("functions") }

    fn table_path(&self, db: &str, name: &str) -> PathBuf {
        let file = format!("{}.json", normalize_identifier(name));
        to_local_path(&self.tables_dir(db), &[&file])
    }

    pub fn write_database(&self, db: &MetastoreDatabase) -> MetastoreResult<()> {
        write_json(&self.db_dir(&db.name).join("database.json"), db)
    }

    pub fn write_table(&self, table: &MetastoreTable) -> MetastoreResult<()> {
        write_json(&self.table_path(&table.db_name, &table.name), table)
    }

    pub fn write_function(&self, func: &MetastoreFunction) -> MetastoreResult<()> {
        let file = format!("{}_{}.json", normalize_identifier(&func.name), func.arg_types.len());
        write_json(&to_local_path(&self.functions_dir(&func.db_name), &[&file]), func)
    }

    fn json_files(dir: &Path) -> MetastoreResult<Vec<PathBuf>> {
        let rd = fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
        let mut out: Vec<PathBuf> = Vec::new();
        for ent in rd.flatten() {
            let p = ent.path();
            if p.is_file() && p.extension().and_then(|s| s.to_str()).map(|x| x.eq_ignore_ascii_case("json")).unwrap_or(false) {
                out.push(p);
            }
        }
        out.sort();
        Ok(out)
    }
}

impl MetaStore for DirMetaStore {
    fn list_databases(&self) -> MetastoreResult<Vec<MetastoreDatabase>> {
        let rd = fs::read_dir(&self.root).map_err(|e| io_err(&self.root, e))?;
        let mut out: Vec<MetastoreDatabase> = Vec::new();
        for ent in rd.flatten() {
            if !ent.file_type().map(|ft| ft.is_dir()).unwrap_or(false) { continue; }
            let name = ent.file_name().to_string_lossy().to_string();
            if name.starts_with('.') { continue; }
            let desc = ent.path().join("database.json");
            let db = if desc.exists() {
                let mut d: MetastoreDatabase = read_json(&desc)?;
                d.name = normalize_identifier(&name);
                d
            } else {
                MetastoreDatabase { name: normalize_identifier(&name), owner: String::new(), comment: None }
            };
            out.push(db);
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(target: "catalogd::metastore", "list_databases root='{}' count={}", self.root.display(), out.len());
        Ok(out)
    }

    fn list_tables(&self, db: &str) -> MetastoreResult<Vec<String>> {
        let db_dir = self.db_dir(db);
        if !db_dir.is_dir() { return Err(MetastoreError::NotFound(normalize_identifier(db))); }
        let tables_dir = self.tables_dir(db);
        if !tables_dir.exists() { return Ok(Vec::new()); }
        let names = Self::json_files(&tables_dir)?
            .into_iter()
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(normalize_identifier))
            .collect();
        Ok(names)
    }

    fn load_table(&self, db: &str, name: &str) -> MetastoreResult<MetastoreTable> {
        let path = self.table_path(db, name);
        let mut t: MetastoreTable = read_json(&path)?;
        // the file location is authoritative for the key
        t.db_name = normalize_identifier(db);
        t.name = normalize_identifier(name);
        Ok(t)
    }

    fn list_functions(&self, db: &str) -> MetastoreResult<Vec<MetastoreFunction>> {
        let db_dir = self.db_dir(db);
        if !db_dir.is_dir() { return Err(MetastoreError::NotFound(normalize_identifier(db))); }
        let dir = self.functions_dir(db);
        if !dir.exists() { return Ok(Vec::new()); }
        let mut out: Vec<MetastoreFunction> = Vec::new();
        for p in Self::json_files(&dir)? {
            let mut f: MetastoreFunction = read_json(&p)?;
            f.db_name = normalize_identifier(db);
            out.push(f);
        }
        Ok(out)
    }
}
