//! Identifier normalisation and qualified names
//! -------------------------------------------
//! Single source of truth for how database, table and function names are keyed
//! inside the catalog. Names compare case-insensitively; the stored key is the
//! lower-cased form.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const DEFAULT_DB: &str = "default";

/// Normalize an identifier to its catalog key:
/// - Surrounding double-quotes or backticks are stripped
/// - The result is lower-cased (catalog names are case-insensitive)
pub fn normalize_identifier(ident: &str) -> String {
    let trimmed = ident.trim();
    let unquoted = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"')) || (trimmed.starts_with('`') && trimmed.ends_with('`')))
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    unquoted.to_lowercase()
}

/// Normalize and reject names that cannot be used as catalog keys.
pub fn validate_identifier(kind: &str, ident: &str) -> AppResult<String> {
    let key = normalize_identifier(ident);
    if key.is_empty() {
        return Err(AppError::user("invalid_identifier".to_string(), format!("{} name must not be empty", kind)));
    }
    if key.contains(['.', '/', '\\']) || key.chars().any(|c| c.is_control()) {
        return Err(AppError::user("invalid_identifier".to_string(), format!("Invalid {} name: '{}'", kind, ident)));
    }
    Ok(key)
}

/// A (database, table) pair in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    pub db_name: String,
    pub table_name: String,
}

impl TableName {
    pub fn new(db: &str, table: &str) -> Self {
        Self { db_name: normalize_identifier(db), table_name: normalize_identifier(table) }
    }

    /// Parse `db.table`, or a bare `table` qualified with `default_db`.
    pub fn parse(input: &str, default_db: &str) -> AppResult<Self> {
        let s = input.trim();
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [t] => Ok(Self { db_name: validate_identifier("database", default_db)?, table_name: validate_identifier("table", t)? }),
            [d, t] => Ok(Self { db_name: validate_identifier("database", d)?, table_name: validate_identifier("table", t)? }),
            _ => Err(AppError::user("invalid_identifier".to_string(), format!("Invalid table name: '{}'", input))),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db_name, self.table_name)
    }
}

/// Join catalog names under `root`, dropping empty and relative segments.
pub fn to_local_path(root: &Path, segments: &[&str]) -> PathBuf {
    let mut out = root.to_path_buf();
    for part in segments {
        let p = part.trim();
        if p.is_empty() || p == "." || p == ".." || p.contains(['/', '\\']) { continue; }
        out = out.join(p);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_quotes() {
        assert_eq!(normalize_identifier("  Sales "), "sales");
        assert_eq!(normalize_identifier("\"MixedCase\""), "mixedcase");
        assert_eq!(normalize_identifier("`Quoted`"), "quoted");
    }

    #[test]
    fn rejects_bad_names() {
        assert!(validate_identifier("table", "").is_err());
        assert!(validate_identifier("table", "a.b").is_err());
        assert!(validate_identifier("table", "../etc").is_err());
        assert_eq!(validate_identifier("table", "T1").unwrap(), "t1");
    }

    #[test]
    fn parses_table_names() {
        let t = TableName::parse("Analytics.Events", DEFAULT_DB).unwrap();
        assert_eq!(t.to_string(), "analytics.events");
        let t = TableName::parse("events", DEFAULT_DB).unwrap();
        assert_eq!(t.db_name, "default");
        assert!(TableName::parse("a.b.c", DEFAULT_DB).is_err());
    }

    #[test]
    fn local_paths_skip_traversal() {
        let p = to_local_path(Path::new("/root"), &["db", "..", "tables", "t.json"]);
        assert_eq!(p, PathBuf::from("/root/db/tables/t.json"));
    }
}
