//! Metadata (`where`) and content (`where_document`) selectors.
//!
//! Selectors are parsed from JSON-shaped values into typed trees up front, so
//! a malformed selector fails with `InvalidSelector` before any document is
//! read or written.
//!
//! `where` grammar:
//! - `{"key": scalar}` equality shorthand
//! - `{"key": {"$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte": scalar}}`
//! - `{"key": {"$in" | "$nin": [scalar, ...]}}`
//! - `{"$and": [...]}`, `{"$or": [...]}`
//! - several keys in one object are AND-ed
//!
//! `where_document` grammar: `{"$contains": str}`, `{"$not_contains": str}`,
//! `{"$and": [...]}`, `{"$or": [...]}`.

use ragstore_common::{RagStoreError, Result};
use serde_json::Value;

use crate::types::{Metadata, MetadataValue};

/// Comparison applied to one metadata key
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Eq(MetadataValue),
    Ne(MetadataValue),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    In(Vec<MetadataValue>),
    Nin(Vec<MetadataValue>),
}

/// Metadata selector
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    Field { key: String, op: FieldOp },
    And(Vec<Where>),
    Or(Vec<Where>),
}

/// Document content selector
#[derive(Debug, Clone, PartialEq)]
pub enum WhereDocument {
    Contains(String),
    NotContains(String),
    And(Vec<WhereDocument>),
    Or(Vec<WhereDocument>),
}

impl Where {
    /// `key == value`
    pub fn eq(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::Field {
            key: key.into(),
            op: FieldOp::Eq(value.into()),
        }
    }

    /// Parse a JSON selector
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| RagStoreError::invalid_selector(format!("where must be an object, got {}", value)))?;

        if map.is_empty() {
            return Err(RagStoreError::invalid_selector("where cannot be empty"));
        }

        let mut clauses = Vec::with_capacity(map.len());
        for (key, operand) in map {
            let clause = match key.as_str() {
                "$and" => Self::And(parse_list(operand, "$and", Self::from_json)?),
                "$or" => Self::Or(parse_list(operand, "$or", Self::from_json)?),
                k if k.starts_with('$') => {
                    return Err(RagStoreError::invalid_selector(format!("Unknown logical operator {}", k)))
                }
                k => Self::Field {
                    key: k.to_string(),
                    op: parse_field_op(k, operand)?,
                },
            };
            clauses.push(clause);
        }

        if clauses.len() == 1 {
            Ok(clauses.remove(0))
        } else {
            Ok(Self::And(clauses))
        }
    }

    /// Check whether a document's metadata matches
    pub fn matches(&self, metadata: Option<&Metadata>) -> bool {
        match self {
            Self::And(clauses) => clauses.iter().all(|c| c.matches(metadata)),
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(metadata)),
            Self::Field { key, op } => {
                let value = metadata.and_then(|m| m.get(key));
                evaluate(op, value)
            }
        }
    }
}

impl TryFrom<Value> for Where {
    type Error = RagStoreError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_json(&value)
    }
}

impl WhereDocument {
    /// Text contains `needle`
    pub fn contains(needle: impl Into<String>) -> Self {
        Self::Contains(needle.into())
    }

    /// Parse a JSON selector
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            RagStoreError::invalid_selector(format!("where_document must be an object, got {}", value))
        })?;

        if map.len() != 1 {
            return Err(RagStoreError::invalid_selector(
                "where_document must have exactly one operator",
            ));
        }

        let (op, operand) = map
            .iter()
            .next()
            .ok_or_else(|| RagStoreError::invalid_selector("where_document cannot be empty"))?;

        match op.as_str() {
            "$contains" => Ok(Self::Contains(parse_needle(op, operand)?)),
            "$not_contains" => Ok(Self::NotContains(parse_needle(op, operand)?)),
            "$and" => Ok(Self::And(parse_list(operand, "$and", Self::from_json)?)),
            "$or" => Ok(Self::Or(parse_list(operand, "$or", Self::from_json)?)),
            other => Err(RagStoreError::invalid_selector(format!(
                "Unknown where_document operator {}",
                other
            ))),
        }
    }

    /// Check whether a document's text matches; documents without text only match `$not_contains`
    pub fn matches(&self, text: Option<&str>) -> bool {
        match self {
            Self::Contains(needle) => text.is_some_and(|t| t.contains(needle.as_str())),
            Self::NotContains(needle) => !text.is_some_and(|t| t.contains(needle.as_str())),
            Self::And(clauses) => clauses.iter().all(|c| c.matches(text)),
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(text)),
        }
    }
}

impl TryFrom<Value> for WhereDocument {
    type Error = RagStoreError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_json(&value)
    }
}

fn parse_list<T>(operand: &Value, op: &str, parse: fn(&Value) -> Result<T>) -> Result<Vec<T>> {
    let items = operand
        .as_array()
        .ok_or_else(|| RagStoreError::invalid_selector(format!("{} expects a list", op)))?;
    if items.is_empty() {
        return Err(RagStoreError::invalid_selector(format!("{} list cannot be empty", op)));
    }
    items.iter().map(parse).collect()
}

fn parse_needle(op: &str, operand: &Value) -> Result<String> {
    operand
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RagStoreError::invalid_selector(format!("{} expects a string", op)))
}

fn parse_scalar(key: &str, value: &Value) -> Result<MetadataValue> {
    MetadataValue::from_json(value).ok_or_else(|| {
        RagStoreError::invalid_selector(format!("Value for {} must be a string, number or boolean", key))
    })
}

fn parse_number(key: &str, op: &str, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| RagStoreError::invalid_selector(format!("{} on {} expects a number", op, key)))
}

fn parse_field_op(key: &str, operand: &Value) -> Result<FieldOp> {
    let map = match operand {
        Value::Object(map) => map,
        scalar => return Ok(FieldOp::Eq(parse_scalar(key, scalar)?)),
    };

    if map.len() != 1 {
        return Err(RagStoreError::invalid_selector(format!(
            "Condition on {} must have exactly one operator",
            key
        )));
    }
    let (op, value) = map
        .iter()
        .next()
        .ok_or_else(|| RagStoreError::invalid_selector(format!("Empty condition on {}", key)))?;

    let parse_values = |value: &Value| -> Result<Vec<MetadataValue>> {
        let items = value
            .as_array()
            .ok_or_else(|| RagStoreError::invalid_selector(format!("{} on {} expects a list", op, key)))?;
        if items.is_empty() {
            return Err(RagStoreError::invalid_selector(format!("{} on {} cannot be empty", op, key)));
        }
        items.iter().map(|v| parse_scalar(key, v)).collect()
    };

    match op.as_str() {
        "$eq" => Ok(FieldOp::Eq(parse_scalar(key, value)?)),
        "$ne" => Ok(FieldOp::Ne(parse_scalar(key, value)?)),
        "$gt" => Ok(FieldOp::Gt(parse_number(key, op, value)?)),
        "$gte" => Ok(FieldOp::Gte(parse_number(key, op, value)?)),
        "$lt" => Ok(FieldOp::Lt(parse_number(key, op, value)?)),
        "$lte" => Ok(FieldOp::Lte(parse_number(key, op, value)?)),
        "$in" => Ok(FieldOp::In(parse_values(value)?)),
        "$nin" => Ok(FieldOp::Nin(parse_values(value)?)),
        other => Err(RagStoreError::invalid_selector(format!(
            "Unknown operator {} on {}",
            other, key
        ))),
    }
}

fn evaluate(op: &FieldOp, value: Option<&MetadataValue>) -> bool {
    let Some(value) = value else {
        // missing key only satisfies negative conditions
        return matches!(op, FieldOp::Ne(_) | FieldOp::Nin(_));
    };

    match op {
        FieldOp::Eq(expected) => value.loosely_equals(expected),
        FieldOp::Ne(expected) => !value.loosely_equals(expected),
        FieldOp::Gt(bound) => value.as_f64().is_some_and(|v| v > *bound),
        FieldOp::Gte(bound) => value.as_f64().is_some_and(|v| v >= *bound),
        FieldOp::Lt(bound) => value.as_f64().is_some_and(|v| v < *bound),
        FieldOp::Lte(bound) => value.as_f64().is_some_and(|v| v <= *bound),
        FieldOp::In(options) => options.iter().any(|o| value.loosely_equals(o)),
        FieldOp::Nin(options) => !options.iter().any(|o| value.loosely_equals(o)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::metadata;
    use serde_json::json;

    fn meta() -> Metadata {
        metadata([
            ("categorie", MetadataValue::from("IA")),
            ("annee", MetadataValue::Int(2024)),
            ("score", MetadataValue::Float(0.75)),
        ])
    }

    #[test]
    fn test_equality_shorthand() {
        let w = Where::from_json(&json!({"categorie": "IA"})).unwrap();
        assert_eq!(w, Where::eq("categorie", "IA"));
        assert!(w.matches(Some(&meta())));
        assert!(!w.matches(None));
    }

    #[test]
    fn test_no_trimming() {
        let w = Where::from_json(&json!({"categorie": "IA     "})).unwrap();
        assert!(!w.matches(Some(&meta())));
    }

    #[test]
    fn test_numeric_operators() {
        let m = meta();
        assert!(Where::from_json(&json!({"annee": {"$gte": 2024}})).unwrap().matches(Some(&m)));
        assert!(!Where::from_json(&json!({"annee": {"$gt": 2024}})).unwrap().matches(Some(&m)));
        assert!(Where::from_json(&json!({"score": {"$lt": 1}})).unwrap().matches(Some(&m)));
        assert!(Where::from_json(&json!({"annee": {"$eq": 2024.0}})).unwrap().matches(Some(&m)));
        // ordering on a string field never matches
        assert!(!Where::from_json(&json!({"categorie": {"$gt": 1}})).unwrap().matches(Some(&m)));
    }

    #[test]
    fn test_in_nin_and_missing_keys() {
        let m = meta();
        assert!(Where::from_json(&json!({"categorie": {"$in": ["ML", "IA"]}})).unwrap().matches(Some(&m)));
        assert!(!Where::from_json(&json!({"categorie": {"$nin": ["IA"]}})).unwrap().matches(Some(&m)));
        assert!(Where::from_json(&json!({"source": {"$nin": ["x"]}})).unwrap().matches(Some(&m)));
        assert!(Where::from_json(&json!({"source": {"$ne": "x"}})).unwrap().matches(Some(&m)));
        assert!(!Where::from_json(&json!({"source": "x"})).unwrap().matches(Some(&m)));
    }

    #[test]
    fn test_logical_operators() {
        let m = meta();
        let and = Where::from_json(&json!({"$and": [{"categorie": "IA"}, {"annee": 2023}]})).unwrap();
        assert!(!and.matches(Some(&m)));
        let or = Where::from_json(&json!({"$or": [{"categorie": "ML"}, {"annee": 2024}]})).unwrap();
        assert!(or.matches(Some(&m)));
        let implicit = Where::from_json(&json!({"categorie": "IA", "annee": 2024})).unwrap();
        assert!(matches!(implicit, Where::And(ref c) if c.len() == 2));
        assert!(implicit.matches(Some(&m)));
    }

    #[test]
    fn test_malformed_where() {
        for bad in [
            json!("IA"),
            json!({}),
            json!({"$xor": []}),
            json!({"$and": []}),
            json!({"$and": {"a": 1}}),
            json!({"k": null}),
            json!({"k": {"$regex": "x"}}),
            json!({"k": {"$gt": "a"}}),
            json!({"k": {"$in": []}}),
            json!({"k": {"$eq": 1, "$ne": 2}}),
        ] {
            let err = Where::from_json(&bad).unwrap_err();
            assert_eq!(err.code(), "InvalidSelector", "{}", bad);
        }
    }

    #[test]
    fn test_where_document() {
        let text = Some("Python est un langage de programmation populaire");
        assert!(WhereDocument::from_json(&json!({"$contains": "langage"})).unwrap().matches(text));
        assert!(!WhereDocument::from_json(&json!({"$contains": "Langage"})).unwrap().matches(text));
        assert!(WhereDocument::from_json(&json!({"$not_contains": "obsolète"})).unwrap().matches(text));
        let or = WhereDocument::from_json(&json!({"$or": [{"$contains": "Java"}, {"$contains": "Python"}]})).unwrap();
        assert!(or.matches(text));
        assert!(!WhereDocument::contains("x").matches(None));
        assert!(WhereDocument::NotContains("x".into()).matches(None));
    }

    #[test]
    fn test_malformed_where_document() {
        for bad in [json!({}), json!({"$contains": 3}), json!({"$like": "a"}), json!({"$contains": "a", "$or": []})] {
            assert_eq!(WhereDocument::from_json(&bad).unwrap_err().code(), "InvalidSelector");
        }
    }
}
