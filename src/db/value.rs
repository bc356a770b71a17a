// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Raw document representation: references, field values and field bags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::AppError;

/// Field bag of a raw document, keyed by field name.
pub type Fields = BTreeMap<String, FieldValue>;

/// Pointer to a document, stored as a slash-separated path relative to the
/// database root (e.g. `clubs/c1/sessions/s1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentRef(String);

impl DocumentRef {
    /// Parse a document path. Accepts relative paths and full Firestore
    /// resource names (`projects/p/databases/d/documents/...`).
    pub fn parse(path: &str) -> Result<Self, AppError> {
        let relative = match path.find("/documents/") {
            Some(idx) if path.starts_with("projects/") => &path[idx + "/documents/".len()..],
            _ => path,
        };
        let relative = relative.trim_matches('/');
        let segments: Vec<&str> = relative.split('/').collect();

        if relative.is_empty() || segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty())
        {
            return Err(AppError::InvalidQuery(format!(
                "not a document path: {path}"
            )));
        }
        Ok(Self(relative.to_string()))
    }

    /// Reference to `{collection}/{id}` at the database root.
    pub fn root(collection: &str, id: &str) -> Self {
        Self(format!("{collection}/{id}"))
    }

    /// Reference to a document inside a subcollection of this document.
    pub fn child(&self, collection: &str, id: &str) -> Self {
        Self(format!("{}/{collection}/{id}", self.0))
    }

    /// Path of a subcollection under this document.
    pub fn collection(&self, name: &str) -> String {
        format!("{}/{name}", self.0)
    }

    /// Document id (last path segment).
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Path of the collection holding this document.
    pub fn parent(&self) -> &str {
        self.0.rsplit_once('/').map(|(parent, _)| parent).unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentRef {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentRef> for String {
    fn from(value: DocumentRef) -> Self {
        value.0
    }
}

/// Geographic point as stored by the database.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A single field value inside a raw document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    Timestamp(DateTime<Utc>),
    String(String),
    Bytes(Vec<u8>),
    Reference(DocumentRef),
    GeoPoint(GeoPoint),
    Array(Vec<FieldValue>),
    Map(Fields),
}

impl FieldValue {
    /// Human-readable type name used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Integer(_) | FieldValue::Double(_) => "number",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::String(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Reference(_) => "reference",
            FieldValue::GeoPoint(_) => "geopoint",
            FieldValue::Array(_) => "array",
            FieldValue::Map(_) => "map",
        }
    }

    // Firestore sorts values of different types in this order.
    fn type_rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Integer(_) | FieldValue::Double(_) => 2,
            FieldValue::Timestamp(_) => 3,
            FieldValue::String(_) => 4,
            FieldValue::Bytes(_) => 5,
            FieldValue::Reference(_) => 6,
            FieldValue::GeoPoint(_) => 7,
            FieldValue::Array(_) => 8,
            FieldValue::Map(_) => 9,
        }
    }

    /// Total ordering across all value types, matching the database's query ordering.
    pub fn total_cmp(&self, other: &FieldValue) -> Ordering {
        use FieldValue::*;

        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Integer(a), Double(b)) => (*a as f64).total_cmp(b),
            (Double(a), Integer(b)) => a.total_cmp(&(*b as f64)),
            (Double(a), Double(b)) => a.total_cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            (Reference(a), Reference(b)) => a.cmp(b),
            (GeoPoint(a), GeoPoint(b)) => a
                .latitude
                .total_cmp(&b.latitude)
                .then(a.longitude.total_cmp(&b.longitude)),
            (Array(a), Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Map(a), Map(b)) => a
                .iter()
                .zip(b.iter())
                .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| va.total_cmp(vb)))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    /// Convert a JSON seed value. Objects with a single `$ref`, `$timestamp`
    /// or `$geopoint` key encode the non-JSON value types.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, AppError> {
        use serde_json::Value;

        Ok(match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Double(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Array(items) => FieldValue::Array(
                items
                    .iter()
                    .map(FieldValue::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => {
                if let Some(Value::String(path)) = map.get("$ref") {
                    FieldValue::Reference(DocumentRef::parse(path)?)
                } else if let Some(Value::String(ts)) = map.get("$timestamp") {
                    let parsed = DateTime::parse_from_rfc3339(ts).map_err(|e| {
                        AppError::InvalidQuery(format!("invalid timestamp {ts}: {e}"))
                    })?;
                    FieldValue::Timestamp(parsed.with_timezone(&Utc))
                } else if let Some(point) = map.get("$geopoint") {
                    let point: GeoPoint = serde_json::from_value(point.clone())
                        .map_err(|e| AppError::InvalidQuery(format!("invalid geopoint: {e}")))?;
                    FieldValue::GeoPoint(point)
                } else {
                    FieldValue::Map(fields_from_json(map)?)
                }
            }
        })
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<DocumentRef> for FieldValue {
    fn from(value: DocumentRef) -> Self {
        FieldValue::Reference(value)
    }
}

/// Convert a JSON object into a field bag.
pub fn fields_from_json(
    map: &serde_json::Map<String, serde_json::Value>,
) -> Result<Fields, AppError> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), FieldValue::from_json(v)?)))
        .collect()
}

/// One raw document as delivered by the database: its reference plus its field bag.
///
/// The document id lives in the reference, never inside `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub reference: DocumentRef,
    pub fields: Fields,
}

impl RawDocument {
    pub fn new(reference: DocumentRef, fields: Fields) -> Self {
        Self { reference, fields }
    }

    pub fn id(&self) -> &str {
        self.reference.id()
    }

    /// Value at a dotted field path (`category.name`).
    pub fn field(&self, path: &str) -> Option<&FieldValue> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            match current {
                FieldValue::Map(inner) => current = inner.get(part)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_ref_parsing() {
        let r = DocumentRef::parse("clubs/c1/sessions/s1").unwrap();
        assert_eq!(r.id(), "s1");
        assert_eq!(r.parent(), "clubs/c1/sessions");

        let full =
            DocumentRef::parse("projects/p/databases/(default)/documents/users/u1").unwrap();
        assert_eq!(full.path(), "users/u1");

        assert!(DocumentRef::parse("clubs").is_err());
        assert!(DocumentRef::parse("clubs//x").is_err());
        assert!(DocumentRef::parse("").is_err());
    }

    #[test]
    fn test_child_and_collection_paths() {
        let club = DocumentRef::root("clubs", "c1");
        assert_eq!(club.child("classes", "k1").path(), "clubs/c1/classes/k1");
        assert_eq!(club.collection("sessions"), "clubs/c1/sessions");
    }

    #[test]
    fn test_cross_type_ordering() {
        let null = FieldValue::Null;
        let num = FieldValue::Integer(5);
        let text = FieldValue::from("a");
        assert!(null.total_cmp(&num).is_lt());
        assert!(num.total_cmp(&text).is_lt());
        assert!(FieldValue::Integer(2).total_cmp(&FieldValue::Double(2.5)).is_lt());
    }

    #[test]
    fn test_json_seed_encodings() {
        let value = json!({
            "user": { "$ref": "users/u1" },
            "date": { "$timestamp": "2024-03-01T10:00:00Z" },
            "nested": { "count": 3 }
        });
        let fields = fields_from_json(value.as_object().unwrap()).unwrap();

        assert_eq!(
            fields["user"],
            FieldValue::Reference(DocumentRef::root("users", "u1"))
        );
        assert!(matches!(fields["date"], FieldValue::Timestamp(_)));

        let doc = RawDocument::new(DocumentRef::root("x", "1"), fields);
        assert_eq!(doc.field("nested.count"), Some(&FieldValue::Integer(3)));
    }
}
