//! Shared attribute value model for `blackboard_attributes`,
//! `tsk_os_account_attributes` and `tsk_file_attributes` (§4.5/§4.7,
//! cross-cut). Grounded on the teacher's tagged `MediaMetadata`-style enums
//! generalized to the five-column value-type dispatch the case database
//! uses instead of one JSON blob per row.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttributeValue {
    Int32(i32),
    Int64(i64),
    DateTime(i64),
    String(String),
    Json(serde_json::Value),
    Byte(Vec<u8>),
    Double(f64),
}

impl AttributeValue {
    pub fn value_type_code(&self) -> i32 {
        match self {
            AttributeValue::Int32(_) => 1,
            AttributeValue::Int64(_) => 2,
            AttributeValue::String(_) => 3,
            AttributeValue::Byte(_) => 4,
            AttributeValue::Double(_) => 5,
            AttributeValue::DateTime(_) => 6,
            AttributeValue::Json(_) => 7,
        }
    }

    /// The five value columns as `(byte, text, int32, int64, double)`,
    /// exactly one populated — JSON and string share `value_text`,
    /// date-time and long share `value_int64` (§4.5).
    pub fn columns(&self) -> (Option<Vec<u8>>, Option<String>, Option<i32>, Option<i64>, Option<f64>) {
        match self {
            AttributeValue::Int32(v) => (None, None, Some(*v), None, None),
            AttributeValue::Int64(v) => (None, None, None, Some(*v), None),
            AttributeValue::DateTime(v) => (None, None, None, Some(*v), None),
            AttributeValue::String(v) => (None, Some(v.clone()), None, None, None),
            AttributeValue::Json(v) => (None, Some(v.to_string()), None, None, None),
            AttributeValue::Byte(v) => (Some(v.clone()), None, None, None, None),
            AttributeValue::Double(v) => (None, None, None, None, Some(*v)),
        }
    }

    /// Byte-compared for byte values, column-compared otherwise (§4.7).
    pub fn matches(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Byte(a), AttributeValue::Byte(b)) => a == b,
            (AttributeValue::Int32(a), AttributeValue::Int32(b)) => a == b,
            (AttributeValue::Int64(a), AttributeValue::Int64(b)) => a == b,
            (AttributeValue::DateTime(a), AttributeValue::DateTime(b)) => a == b,
            (AttributeValue::String(a), AttributeValue::String(b)) => a == b,
            (AttributeValue::Json(a), AttributeValue::Json(b)) => a == b,
            (AttributeValue::Double(a), AttributeValue::Double(b)) => a == b,
            _ => false,
        }
    }
}

/// Merge a new `source` into an existing comma-separated source list,
/// appending only if not already present (§4.7).
pub fn merge_source(existing: Option<&str>, new_source: &str) -> String {
    match existing {
        None => new_source.to_string(),
        Some("") => new_source.to_string(),
        Some(existing) => {
            if existing.split(',').any(|s| s == new_source) {
                existing.to_string()
            } else {
                format!("{existing},{new_source}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_source_dedupes() {
        assert_eq!(merge_source(Some("A"), "B"), "A,B");
        assert_eq!(merge_source(Some("A,B"), "A"), "A,B");
        assert_eq!(merge_source(None, "A"), "A");
    }

    #[test]
    fn byte_values_compare_by_bytes() {
        let a = AttributeValue::Byte(vec![1, 2, 3]);
        let b = AttributeValue::Byte(vec![1, 2, 3]);
        let c = AttributeValue::Byte(vec![1, 2, 4]);
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }
}
