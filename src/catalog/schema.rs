use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::metastore::{MetastoreColumn, MetastoreError, MetastorePartition};

/// Logical column types understood by the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    String,
    Timestamp,
    Binary,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::TinyInt => "tinyint",
            ColumnType::SmallInt => "smallint",
            ColumnType::Int => "int",
            ColumnType::BigInt => "bigint",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::String => "string",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Binary => "binary",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ColumnType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "tinyint" => Ok(ColumnType::TinyInt),
            "smallint" => Ok(ColumnType::SmallInt),
            "int" | "integer" => Ok(ColumnType::Int),
            "bigint" => Ok(ColumnType::BigInt),
            "float" => Ok(ColumnType::Float),
            "double" => Ok(ColumnType::Double),
            "string" | "varchar" => Ok(ColumnType::String),
            "timestamp" => Ok(ColumnType::Timestamp),
            "binary" => Ok(ColumnType::Binary),
            other => Err(AppError::user("unknown_type".to_string(), format!("Unsupported column type '{}'", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub col_type: ColumnType,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Column {
    pub fn new(name: &str, col_type: ColumnType) -> Self {
        Self { name: crate::ident::normalize_identifier(name), col_type, comment: None }
    }

    pub(crate) fn from_metastore(c: &MetastoreColumn) -> Result<Self, MetastoreError> {
        let col_type = c.type_name.parse::<ColumnType>()
            .map_err(|_| MetastoreError::Schema(format!("column '{}' has unsupported type '{}'", c.name, c.type_name)))?;
        Ok(Self { name: crate::ident::normalize_identifier(&c.name), col_type, comment: c.comment.clone() })
    }
}

/// Column layout of a table: regular columns followed by partition keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<Column>,
    #[serde(default)]
    pub partition_keys: Vec<Column>,
}

impl TableSchema {
    pub fn new(columns: Vec<Column>, partition_keys: Vec<Column>) -> AppResult<Self> {
        let s = Self { columns, partition_keys };
        s.validate()?;
        Ok(s)
    }

    pub fn column_count(&self) -> usize { self.columns.len() + self.partition_keys.len() }

    pub fn find(&self, name: &str) -> Option<&Column> {
        let key = crate::ident::normalize_identifier(name);
        self.columns.iter().chain(self.partition_keys.iter()).find(|c| c.name == key)
    }

    /// Column names are unique across regular and partition columns.
    pub fn validate(&self) -> AppResult<()> {
        let mut seen = std::collections::HashSet::new();
        for c in self.columns.iter().chain(self.partition_keys.iter()) {
            if c.name.is_empty() {
                return Err(AppError::user("invalid_identifier", "column name must not be empty"));
            }
            if !seen.insert(c.name.as_str()) {
                return Err(AppError::conflict("duplicate_column".to_string(), format!("Duplicate column '{}'", c.name)));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub values: Vec<String>,
    pub location: String,
}

impl From<&MetastorePartition> for Partition {
    fn from(p: &MetastorePartition) -> Self { Self { values: p.values.clone(), location: p.location.clone() } }
}
