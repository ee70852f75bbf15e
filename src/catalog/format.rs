//! Storage-format capabilities for tables.
//!
//! A table does not know which concrete format it is stored in; it holds a
//! `TableFormat` handler that contributes the format-specific part of the wire
//! descriptor and, when supported, builds write sinks. Handlers are looked up
//! by capability (the input format class they recognise) rather than by a
//! closed list, so new formats are added with `FormatRegistry::register`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::catalog::table::HdfsTable;
use crate::error::{AppError, AppResult};
use crate::ident::TableName;
use crate::wire::FormatWire;

pub const TEXT_INPUT_FORMAT: &str = "org.apache.hadoop.mapred.TextInputFormat";
pub const RCFILE_INPUT_FORMAT: &str = "org.apache.hadoop.hive.ql.io.RCFileInputFormat";

/// Descriptor of a write target handed to the planner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSink {
    pub table_id: u32,
    pub table: TableName,
    pub table_type: String,
    pub partition_key_exprs: Vec<String>,
    pub overwrite: bool,
}

pub trait TableFormat: Send + Sync + fmt::Debug {
    /// Wire discriminant, e.g. `HDFS_TEXT_TABLE`.
    fn table_type(&self) -> &'static str;

    /// Input format class this handler is selected by.
    fn input_format(&self) -> &'static str;

    fn matches(&self, input_format: &str) -> bool { input_format.trim() == self.input_format() }

    fn to_wire(&self, _table: &HdfsTable) -> AppResult<FormatWire> {
        Ok(FormatWire { table_type: self.table_type().to_string(), input_format: self.input_format().to_string(), attributes: BTreeMap::new() })
    }

    fn create_write_sink(&self, _table: &HdfsTable, _partition_key_exprs: &[String], _overwrite: bool) -> AppResult<TableSink> {
        Err(AppError::user("sink_unsupported".to_string(), format!("{} output sink not implemented", self.table_type())))
    }
}

fn check_partition_exprs(table: &HdfsTable, exprs: &[String]) -> AppResult<()> {
    let want = table.schema.partition_keys.len();
    if exprs.len() != want {
        return Err(AppError::user(
            "partition_mismatch".to_string(),
            format!("Table {}.{} has {} partition key(s) but {} expression(s) were given", table.db_name, table.name, want, exprs.len()),
        ));
    }
    Ok(())
}

/// Delimited text files.
#[derive(Debug, Default)]
pub struct TextFormat;

impl TableFormat for TextFormat {
    fn table_type(&self) -> &'static str { "HDFS_TEXT_TABLE" }
    fn input_format(&self) -> &'static str { TEXT_INPUT_FORMAT }

    fn to_wire(&self, table: &HdfsTable) -> AppResult<FormatWire> {
        let mut attributes = BTreeMap::new();
        let field = table.properties.get("field.delim").cloned().unwrap_or_else(|| "\u{1}".to_string());
        let line = table.properties.get("line.delim").cloned().unwrap_or_else(|| "\n".to_string());
        attributes.insert("field_delim".to_string(), field);
        attributes.insert("line_delim".to_string(), line);
        Ok(FormatWire { table_type: self.table_type().to_string(), input_format: self.input_format().to_string(), attributes })
    }

    fn create_write_sink(&self, table: &HdfsTable, partition_key_exprs: &[String], overwrite: bool) -> AppResult<TableSink> {
        check_partition_exprs(table, partition_key_exprs)?;
        Ok(TableSink {
            table_id: table.id,
            table: TableName::new(&table.db_name, &table.name),
            table_type: self.table_type().to_string(),
            partition_key_exprs: partition_key_exprs.to_vec(),
            overwrite,
        })
    }
}

/// Record-columnar files; read-only.
#[derive(Debug, Default)]
pub struct RcFileFormat;

impl TableFormat for RcFileFormat {
    fn table_type(&self) -> &'static str { "HDFS_RCFILE_TABLE" }
    fn input_format(&self) -> &'static str { RCFILE_INPUT_FORMAT }

    fn to_wire(&self, _table: &HdfsTable) -> AppResult<FormatWire> {
        let mut attributes = BTreeMap::new();
        attributes.insert("serde_lib".to_string(), "org.apache.hadoop.hive.serde2.columnar.ColumnarSerDe".to_string());
        Ok(FormatWire { table_type: self.table_type().to_string(), input_format: self.input_format().to_string(), attributes })
    }
}

static BUILTIN_FORMATS: Lazy<Vec<Arc<dyn TableFormat>>> = Lazy::new(|| vec![Arc::new(TextFormat), Arc::new(RcFileFormat)]);

/// Set of format handlers available to one catalog.
#[derive(Clone, Debug)]
pub struct FormatRegistry {
    handlers: Vec<Arc<dyn TableFormat>>,
}

impl Default for FormatRegistry {
    fn default() -> Self { Self { handlers: BUILTIN_FORMATS.clone() } }
}

impl FormatRegistry {
    pub fn empty() -> Self { Self { handlers: Vec::new() } }

    /// Add a handler; one with the same table type is replaced.
    pub fn register(&mut self, handler: Arc<dyn TableFormat>) {
        self.handlers.retain(|h| h.table_type() != handler.table_type());
        self.handlers.push(handler);
    }

    pub fn resolve(&self, input_format: &str) -> Option<Arc<dyn TableFormat>> {
        self.handlers.iter().find(|h| h.matches(input_format)).cloned()
    }

    pub fn by_table_type(&self, table_type: &str) -> Option<Arc<dyn TableFormat>> {
        self.handlers.iter().find(|h| h.table_type().eq_ignore_ascii_case(table_type)).cloned()
    }

    pub fn table_types(&self) -> Vec<&'static str> { self.handlers.iter().map(|h| h.table_type()).collect() }
}
