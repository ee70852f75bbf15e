use serde::{Deserialize, Serialize};

use crate::catalog::schema::ColumnType;
use crate::error::{AppError, AppResult};
use crate::ident::validate_identifier;
use crate::metastore::{MetastoreError, MetastoreFunction};
use crate::wire::{CatalogObjectKind, FunctionWire, WireObject, WirePayload};

/// A user-defined function. Functions are keyed by signature so overloads
/// coexist in one database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub db_name: String,
    pub name: String,
    pub arg_types: Vec<ColumnType>,
    pub return_type: ColumnType,
    pub has_var_args: bool,
    pub location: String,
    pub symbol: String,
    pub version: u64,
}

/// Function definition accepted by `CREATE FUNCTION`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub arg_types: Vec<ColumnType>,
    pub return_type: ColumnType,
    #[serde(default)]
    pub has_var_args: bool,
    pub location: String,
    #[serde(default)]
    pub symbol: String,
}

/// Canonical signature: `name(t1,t2)`, with `...` appended for var-args.
pub fn signature_of(name: &str, arg_types: &[ColumnType], has_var_args: bool) -> String {
    let args: Vec<&str> = arg_types.iter().map(|t| t.as_str()).collect();
    format!("{}({}{})", name.to_lowercase(), args.join(","), if has_var_args { "..." } else { "" })
}

/// Validate and normalise a function name. Parentheses are rejected on top of
/// the identifier rules since they delimit the argument list of a signature.
pub fn validate_function_name(name: &str) -> AppResult<String> {
    let key = validate_identifier("function", name)?;
    if key.contains(['(', ')']) {
        return Err(AppError::user("invalid_identifier".to_string(), format!("Invalid function name: '{}'", name)));
    }
    Ok(key)
}

/// Normalise a caller-supplied signature string to the canonical key.
pub fn normalize_signature(sig: &str) -> AppResult<String> {
    let s = sig.trim();
    let (name, rest) = s.split_once('(')
        .ok_or_else(|| AppError::user("invalid_signature".to_string(), format!("Invalid function signature: '{}'", sig)))?;
    let inner = rest.strip_suffix(')')
        .ok_or_else(|| AppError::user("invalid_signature".to_string(), format!("Invalid function signature: '{}'", sig)))?;
    let name = validate_function_name(name)?;
    let (inner, var_args) = match inner.trim().strip_suffix("...") {
        Some(head) => (head, true),
        None => (inner, false),
    };
    let mut types = Vec::new();
    for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        types.push(part.parse::<ColumnType>()?);
    }
    Ok(signature_of(&name, &types, var_args))
}

impl Function {
    pub fn signature(&self) -> String { signature_of(&self.name, &self.arg_types, self.has_var_args) }

    pub(crate) fn from_def(db_name: &str, def: &FunctionDef, version: u64) -> AppResult<Self> {
        if def.location.trim().is_empty() {
            return Err(AppError::user("invalid_function", "function location must not be empty"));
        }
        Ok(Self {
            db_name: db_name.to_string(),
            name: validate_function_name(&def.name)?,
            arg_types: def.arg_types.clone(),
            return_type: def.return_type,
            has_var_args: def.has_var_args,
            location: def.location.clone(),
            symbol: def.symbol.clone(),
            version,
        })
    }

    pub(crate) fn from_metastore(f: &MetastoreFunction, version: u64) -> Result<Self, MetastoreError> {
        let parse = |t: &str| t.parse::<ColumnType>()
            .map_err(|_| MetastoreError::Schema(format!("function '{}' uses unsupported type '{}'", f.name, t)));
        let name = validate_function_name(&f.name)
            .map_err(|e| MetastoreError::Schema(format!("function name '{}' is not addressable: {}", f.name, e.message())))?;
        let arg_types = f.arg_types.iter().map(|t| parse(t.as_str())).collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            db_name: crate::ident::normalize_identifier(&f.db_name),
            name,
            arg_types,
            return_type: parse(f.return_type.as_str())?,
            has_var_args: f.has_var_args,
            location: f.location.clone(),
            symbol: f.symbol.clone(),
            version,
        })
    }

    pub fn to_wire(&self) -> WireObject {
        WireObject {
            kind: CatalogObjectKind::Function,
            catalog_version: self.version,
            payload: WirePayload::Function(FunctionWire {
                db_name: self.db_name.clone(),
                name: self.name.clone(),
                signature: self.signature(),
                arg_types: self.arg_types.clone(),
                return_type: self.return_type,
                has_var_args: self.has_var_args,
                location: self.location.clone(),
                symbol: self.symbol.clone(),
            }),
        }
    }
}
