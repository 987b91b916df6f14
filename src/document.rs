//! Structured documents stored in chunks.
//!
//! A document is an opaque JSON tree produced by the simulation engine.  The
//! container never interprets it; callers that need to reach into one (node
//! IDs, per-individual records, habitat tables) go through [`DocumentExt`],
//! whose accessors fail with a typed [`DocumentError`] naming the path that
//! was being followed instead of panicking on a missing key.

use serde_json::{Map, Value};
use thiserror::Error;

/// Decoded simulation or node payload.
pub type Document = Value;

/// Map node inside a [`Document`].
pub type DocumentMap = Map<String, Value>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Field '{0}' not found")]
    FieldNotFound(String),
    #[error("Type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        path:     String,
        expected: &'static str,
        found:    &'static str,
    },
    #[error("Index {index} out of range at '{path}' (length {len})")]
    IndexOutOfRange { path: String, index: usize, len: usize },
}

/// Short name of a value's variant, for diagnostics.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null      => "null",
        Value::Bool(_)   => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_)  => "array",
        Value::Object(_) => "map",
    }
}

fn mismatch(path: &str, expected: &'static str, found: &Value) -> DocumentError {
    DocumentError::TypeMismatch {
        path: path.to_owned(),
        expected,
        found: kind_of(found),
    }
}

/// Typed, failure-reporting accessors over a [`Document`].
pub trait DocumentExt {
    /// Member `key` of a map.
    fn field(&self, key: &str) -> Result<&Value, DocumentError>;
    /// Element `index` of a sequence.
    fn element(&self, index: usize) -> Result<&Value, DocumentError>;
    /// Follow a `/`-separated path; numeric segments index sequences.
    ///
    /// `"m_larval_habitats/0/value/0/m_max_larval_capacity"`
    fn at(&self, path: &str) -> Result<&Value, DocumentError>;

    fn as_map(&self) -> Result<&DocumentMap, DocumentError>;
    fn as_seq(&self) -> Result<&Vec<Value>, DocumentError>;
    fn as_int(&self) -> Result<i64, DocumentError>;
    fn as_float(&self) -> Result<f64, DocumentError>;
    fn as_text(&self) -> Result<&str, DocumentError>;
    fn as_flag(&self) -> Result<bool, DocumentError>;
}

impl DocumentExt for Value {
    fn field(&self, key: &str) -> Result<&Value, DocumentError> {
        self.as_map()?
            .get(key)
            .ok_or_else(|| DocumentError::FieldNotFound(key.to_owned()))
    }

    fn element(&self, index: usize) -> Result<&Value, DocumentError> {
        let seq = self.as_seq()?;
        seq.get(index).ok_or(DocumentError::IndexOutOfRange {
            path: String::new(),
            index,
            len: seq.len(),
        })
    }

    fn at(&self, path: &str) -> Result<&Value, DocumentError> {
        let mut current = self;
        let mut walked = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !walked.is_empty() {
                walked.push('/');
            }
            walked.push_str(segment);
            current = match current {
                Value::Object(map) => map
                    .get(segment)
                    .ok_or_else(|| DocumentError::FieldNotFound(walked.clone()))?,
                Value::Array(seq) => {
                    let index: usize = segment
                        .parse()
                        .map_err(|_| mismatch(&walked, "map", current))?;
                    seq.get(index).ok_or(DocumentError::IndexOutOfRange {
                        path: walked.clone(),
                        index,
                        len: seq.len(),
                    })?
                }
                other => return Err(mismatch(&walked, "map or array", other)),
            };
        }
        Ok(current)
    }

    fn as_map(&self) -> Result<&DocumentMap, DocumentError> {
        self.as_object().ok_or_else(|| mismatch("", "map", self))
    }

    fn as_seq(&self) -> Result<&Vec<Value>, DocumentError> {
        self.as_array().ok_or_else(|| mismatch("", "array", self))
    }

    fn as_int(&self) -> Result<i64, DocumentError> {
        self.as_i64().ok_or_else(|| mismatch("", "integer", self))
    }

    fn as_float(&self) -> Result<f64, DocumentError> {
        self.as_f64().ok_or_else(|| mismatch("", "number", self))
    }

    fn as_text(&self) -> Result<&str, DocumentError> {
        self.as_str().ok_or_else(|| mismatch("", "string", self))
    }

    fn as_flag(&self) -> Result<bool, DocumentError> {
        self.as_bool().ok_or_else(|| mismatch("", "bool", self))
    }
}

/// Engine-level identifier of a node document.
///
/// Nodes carry `externalId`; older payloads only have `suid.id`, and minimal
/// ones a bare `id`.  Checked in that order.
pub fn node_id(node: &Value) -> Option<i64> {
    node.get("externalId")
        .and_then(Value::as_i64)
        .or_else(|| node.get("suid").and_then(|s| s.get("id")).and_then(Value::as_i64))
        .or_else(|| node.get("id").and_then(Value::as_i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node() -> Document {
        json!({
            "externalId": 7,
            "m_larval_habitats": [
                {"key": "ARABIENSIS", "value": [{"m_max_larval_capacity": 246}]},
                {"key": "FUNESTUS",   "value": [{"m_max_larval_capacity": 912}]},
            ],
            "individualHumans": [{"suid": {"id": 3}, "m_age": 2457.41, "m_is_infected": true}],
        })
    }

    #[test]
    fn test_path_lookup() {
        let n = node();
        assert_eq!(n.at("m_larval_habitats/1/value/0/m_max_larval_capacity").unwrap().as_int().unwrap(), 912);
        assert_eq!(n.at("individualHumans/0/suid/id").unwrap().as_int().unwrap(), 3);
        assert_eq!(n.at("individualHumans/0/m_age").unwrap().as_float().unwrap(), 2457.41);
        assert!(n.at("individualHumans/0/m_is_infected").unwrap().as_flag().unwrap());
    }

    #[test]
    fn test_missing_field_names_the_path() {
        let err = node().at("individualHumans/0/infections").unwrap_err();
        assert_eq!(err, DocumentError::FieldNotFound("individualHumans/0/infections".into()));
    }

    #[test]
    fn test_type_mismatch_is_typed() {
        let n = node();
        let err = n.field("externalId").unwrap().as_text().unwrap_err();
        assert!(matches!(err, DocumentError::TypeMismatch { expected: "string", found: "number", .. }));
        let err = n.at("externalId/0").unwrap_err();
        assert!(matches!(err, DocumentError::TypeMismatch { .. }));
    }

    #[test]
    fn test_index_out_of_range() {
        let err = node().at("m_larval_habitats/5").unwrap_err();
        assert!(matches!(err, DocumentError::IndexOutOfRange { index: 5, len: 2, .. }));
        let habitats = node().field("m_larval_habitats").unwrap().clone();
        assert!(habitats.element(2).is_err());
    }

    #[test]
    fn test_node_id_fallbacks() {
        assert_eq!(node_id(&node()), Some(7));
        assert_eq!(node_id(&json!({"suid": {"id": 12}})), Some(12));
        assert_eq!(node_id(&json!({"id": 3})), Some(3));
        assert_eq!(node_id(&json!({"id": 3, "suid": {"id": 12}})), Some(12));
        assert_eq!(node_id(&json!({"id": 3, "externalId": 4})), Some(4));
        assert_eq!(node_id(&json!({"name": "no id"})), None);
    }
}
