//! Query-related data models.
//!
//! This module defines bind parameters, the retry switch, and the row cursor
//! handed to row mappers.

use crate::error::{DbError, DbResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A positional parameter for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(serialize_with = "base64_bytes::serialize", skip_deserializing)]
    Bytes(Vec<u8>),
    /// Arrays and objects, bound as a JSON document
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }

    /// Parse a command-line literal: JSON when it parses, raw text otherwise.
    pub fn parse_literal(raw: &str) -> Self {
        serde_json::from_str::<QueryParam>(raw).unwrap_or_else(|_| Self::String(raw.to_string()))
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for QueryParam {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<JsonValue> for QueryParam {
    fn from(v: JsonValue) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Serialize, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }
}

/// Whether a failed statement may be re-run once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retry {
    /// Re-run the whole statement once after the first failure.
    #[default]
    Once,
    Never,
}

impl Retry {
    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_after(self, attempt: u32) -> bool {
        matches!(self, Self::Once) && attempt == 1
    }
}

/// Forward-only cursor over a fetched result.
///
/// Starts before the first row; call [`ResultSet::next`] to advance.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<JsonValue>>,
    position: Option<usize>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<JsonValue>>) -> Self {
        Self {
            columns,
            rows,
            position: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Move to the next row. Returns false once the rows are exhausted.
    pub fn next(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p + 1);
        if next < self.rows.len() {
            self.position = Some(next);
            true
        } else {
            self.position = Some(self.rows.len());
            false
        }
    }

    fn current(&self) -> DbResult<&[JsonValue]> {
        self.position
            .and_then(|p| self.rows.get(p))
            .map(Vec::as_slice)
            .ok_or_else(|| DbError::mapping("Cursor is not positioned on a row"))
    }

    /// Raw value of `column` in the current row.
    pub fn get(&self, column: &str) -> DbResult<&JsonValue> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| DbError::mapping(format!("Column not found: {}", column)))?;
        self.get_at(idx)
    }

    /// Raw value at zero-based `index` in the current row.
    pub fn get_at(&self, index: usize) -> DbResult<&JsonValue> {
        let row = self.current()?;
        row.get(index).ok_or_else(|| {
            DbError::mapping(format!(
                "Column index {} out of bounds (len: {})",
                index,
                row.len()
            ))
        })
    }

    /// Decode `column` of the current row. Use `Option<T>` for nullable columns.
    pub fn try_get<T: DeserializeOwned>(&self, column: &str) -> DbResult<T> {
        let value = self.get(column)?;
        serde_json::from_value(value.clone())
            .map_err(|e| DbError::mapping(format!("Column '{}': {}", column, e)))
    }

    /// Every row as a column-name map, independent of the cursor.
    pub fn to_json_rows(&self) -> Vec<serde_json::Map<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}
