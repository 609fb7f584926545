//! Shared data models for shadow statement processing.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A rewritten SQL text paired with its final ordered parameter list.
///
/// One `SqlUnit` per physical execution. Immutable once produced: the
/// executor only ever replays it, never edits it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SqlUnit {
    sql: String,
    parameters: Vec<JsonValue>,
}

impl SqlUnit {
    pub fn new(sql: String, parameters: Vec<JsonValue>) -> Self {
        Self { sql, parameters }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[JsonValue] {
        &self.parameters
    }
}

/// The shadow routing rule supplied by the configuration layer.
///
/// `column` names the logical marker column: a statement whose marker value
/// is truthy routes to the shadow data source. The marker column exists only
/// in application SQL; the rewrite strips it before physical execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShadowRule {
    pub column: String,
}

impl ShadowRule {
    pub fn new<S: Into<String>>(column: S) -> Self {
        Self { column: column.into() }
    }

    /// Truthiness of a bound or literal marker value.
    ///
    /// Drivers frequently bind booleans as strings or numbers, so `true`,
    /// `1`, `"true"` and `"1"` all count. Anything else (including null and
    /// missing values) is not shadow — the deterministic default is the
    /// actual target.
    pub fn is_shadow_value(&self, value: &JsonValue) -> bool {
        match value {
            JsonValue::Bool(b) => *b,
            JsonValue::Number(n) => n.as_i64() == Some(1),
            JsonValue::String(s) => s.eq_ignore_ascii_case("true") || s == "1",
            _ => false,
        }
    }
}
