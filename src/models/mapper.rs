// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entity mapper: raw document → typed, validated entity.
//!
//! Mapping happens in two passes. A [`FieldReader`] pulls each field out of
//! the raw bag and records shape violations (missing field, wrong type)
//! without stopping at the first one. Entities then run their `validator`
//! rules, whose failures are appended to the same list. Both passes name
//! fields the way the stored document does (`contactEmail`, `photoURL`).

use chrono::{DateTime, Utc};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::db::{DocumentRef, FieldValue, Fields, GeoPoint, RawDocument};
use crate::error::{FieldViolation, SchemaValidationError};

/// An entity that can be read from a raw document.
pub trait FromDocument: Sized + Validate {
    /// Entity name used in error reports.
    const ENTITY: &'static str;

    /// Read every field, recording violations on the reader. Returns `None`
    /// if a required field could not be read.
    fn read(reader: &mut FieldReader<'_>) -> Option<Self>;
}

/// Map a raw document into a typed entity.
///
/// The document id is taken from the reference, never from the field bag.
pub fn map_document<T: FromDocument>(doc: &RawDocument) -> Result<T, SchemaValidationError> {
    let mut reader = FieldReader::new(doc.id(), &doc.fields);
    let entity = T::read(&mut reader);
    let mut violations = reader.violations;

    let entity = match entity {
        Some(entity) if violations.is_empty() => entity,
        _ => {
            return Err(SchemaValidationError {
                entity: T::ENTITY,
                id: doc.id().to_string(),
                violations,
            })
        }
    };

    if let Err(errors) = entity.validate() {
        flatten_errors("", &errors, &mut violations);
        return Err(SchemaValidationError {
            entity: T::ENTITY,
            id: doc.id().to_string(),
            violations,
        });
    }

    Ok(entity)
}

fn flatten_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldViolation>) {
    for (field, kind) in errors.errors() {
        let field = wire_name(field);
        let path = if prefix.is_empty() {
            field
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for err in field_errors {
                    out.push(FieldViolation {
                        field: path.clone(),
                        message: err
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("failed `{}` check", err.code)),
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    flatten_errors(&format!("{path}[{idx}]"), inner, out);
                }
            }
        }
    }
}

/// Stored name of a Rust field: camelCase, with a `_url` segment spelled `URL`.
/// Matches the entities' serde names.
fn wire_name(field: &str) -> String {
    let mut segments = field.split('_');
    let mut name = segments.next().unwrap_or_default().to_string();
    for segment in segments {
        if segment == "url" {
            name.push_str("URL");
            continue;
        }
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    name
}

/// Reads typed fields out of a raw field bag, collecting violations.
pub struct FieldReader<'a> {
    id: &'a str,
    fields: &'a Fields,
    prefix: String,
    violations: Vec<FieldViolation>,
}

impl<'a> FieldReader<'a> {
    pub fn new(id: &'a str, fields: &'a Fields) -> Self {
        Self {
            id,
            fields,
            prefix: String::new(),
            violations: Vec::new(),
        }
    }

    pub fn id(&self) -> String {
        self.id.to_string()
    }

    fn path(&self, field: &str) -> String {
        if self.prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", self.prefix, field)
        }
    }

    fn violation(&mut self, field: &str, message: String) {
        let field = self.path(field);
        self.violations.push(FieldViolation { field, message });
    }

    fn required(&mut self, field: &str) -> Option<&'a FieldValue> {
        match self.fields.get(field) {
            Some(value) => Some(value),
            None => {
                self.violation(field, "required field is missing".to_string());
                None
            }
        }
    }

    // Absent and explicit null both count as "not set" for optional fields.
    fn optional(&self, field: &str) -> Option<&'a FieldValue> {
        match self.fields.get(field) {
            None | Some(FieldValue::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn convert<T>(
        &mut self,
        field: &str,
        value: &'a FieldValue,
        expected: &str,
        f: impl FnOnce(&'a FieldValue) -> Option<T>,
    ) -> Option<T> {
        let converted = f(value);
        if converted.is_none() {
            self.violation(
                field,
                format!("expected {}, found {}", expected, value.type_name()),
            );
        }
        converted
    }

    pub fn string(&mut self, field: &str) -> Option<String> {
        let value = self.required(field)?;
        self.convert(field, value, "string", as_string)
    }

    pub fn opt_string(&mut self, field: &str) -> Option<String> {
        let value = self.optional(field)?;
        self.convert(field, value, "string", as_string)
    }

    pub fn bool(&mut self, field: &str) -> Option<bool> {
        let value = self.required(field)?;
        self.convert(field, value, "boolean", as_bool)
    }

    pub fn opt_bool(&mut self, field: &str) -> Option<bool> {
        let value = self.optional(field)?;
        self.convert(field, value, "boolean", as_bool)
    }

    pub fn number(&mut self, field: &str) -> Option<f64> {
        let value = self.required(field)?;
        self.convert(field, value, "number", as_number)
    }

    pub fn opt_number(&mut self, field: &str) -> Option<f64> {
        let value = self.optional(field)?;
        self.convert(field, value, "number", as_number)
    }

    pub fn integer(&mut self, field: &str) -> Option<i64> {
        let value = self.required(field)?;
        self.convert(field, value, "integer", as_integer)
    }

    /// Integer stored either as a number or as a numeric string.
    pub fn lenient_integer(&mut self, field: &str) -> Option<i64> {
        let value = self.required(field)?;
        self.convert(field, value, "number or numeric string", |v| match v {
            FieldValue::String(s) => s.trim().parse::<i64>().ok(),
            other => as_integer(other),
        })
    }

    pub fn timestamp(&mut self, field: &str) -> Option<DateTime<Utc>> {
        let value = self.required(field)?;
        self.convert(field, value, "timestamp", as_timestamp)
    }

    pub fn opt_timestamp(&mut self, field: &str) -> Option<DateTime<Utc>> {
        let value = self.optional(field)?;
        self.convert(field, value, "timestamp", as_timestamp)
    }

    pub fn reference(&mut self, field: &str) -> Option<DocumentRef> {
        let value = self.required(field)?;
        self.convert(field, value, "reference", as_reference)
    }

    pub fn opt_reference(&mut self, field: &str) -> Option<DocumentRef> {
        let value = self.optional(field)?;
        self.convert(field, value, "reference", as_reference)
    }

    pub fn opt_geopoint(&mut self, field: &str) -> Option<GeoPoint> {
        let value = self.optional(field)?;
        self.convert(field, value, "geopoint", |v| match v {
            FieldValue::GeoPoint(p) => Some(*p),
            _ => None,
        })
    }

    pub fn string_array(&mut self, field: &str) -> Option<Vec<String>> {
        self.array(field, "string", as_string)
    }

    pub fn reference_array(&mut self, field: &str) -> Option<Vec<DocumentRef>> {
        self.array(field, "reference", as_reference)
    }

    fn array<T>(
        &mut self,
        field: &str,
        expected: &str,
        f: impl Fn(&'a FieldValue) -> Option<T>,
    ) -> Option<Vec<T>> {
        let value = self.required(field)?;
        let FieldValue::Array(items) = value else {
            self.violation(field, format!("expected array, found {}", value.type_name()));
            return None;
        };

        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (idx, item) in items.iter().enumerate() {
            match f(item) {
                Some(v) => out.push(v),
                None => {
                    ok = false;
                    self.violation(
                        &format!("{field}[{idx}]"),
                        format!("expected {}, found {}", expected, item.type_name()),
                    );
                }
            }
        }
        ok.then_some(out)
    }

    /// Read an enum-like string field.
    pub fn parse<T: std::str::FromStr>(&mut self, field: &str, allowed: &str) -> Option<T> {
        let raw = self.string(field)?;
        self.parse_value(field, &raw, allowed)
    }

    pub fn opt_parse<T: std::str::FromStr>(&mut self, field: &str, allowed: &str) -> Option<T> {
        let raw = self.opt_string(field)?;
        self.parse_value(field, &raw, allowed)
    }

    fn parse_value<T: std::str::FromStr>(
        &mut self,
        field: &str,
        raw: &str,
        allowed: &str,
    ) -> Option<T> {
        let parsed = raw.parse::<T>().ok();
        if parsed.is_none() {
            self.violation(field, format!("expected one of {allowed}, found \"{raw}\""));
        }
        parsed
    }

    /// Read a nested map field with `read`, reporting violations under `field.`.
    pub fn nested<T>(
        &mut self,
        field: &str,
        read: impl FnOnce(&mut FieldReader<'a>) -> Option<T>,
    ) -> Option<T> {
        let value = self.required(field)?;
        self.read_map(field, value, read)
    }

    pub fn opt_nested<T>(
        &mut self,
        field: &str,
        read: impl FnOnce(&mut FieldReader<'a>) -> Option<T>,
    ) -> Option<T> {
        let value = self.optional(field)?;
        self.read_map(field, value, read)
    }

    /// Read an array of maps, one `read` call per element.
    pub fn nested_array<T>(
        &mut self,
        field: &str,
        read: impl Fn(&mut FieldReader<'a>) -> Option<T>,
    ) -> Option<Vec<T>> {
        let value = self.required(field)?;
        let FieldValue::Array(items) = value else {
            self.violation(field, format!("expected array, found {}", value.type_name()));
            return None;
        };

        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (idx, item) in items.iter().enumerate() {
            match self.read_map(&format!("{field}[{idx}]"), item, &read) {
                Some(v) => out.push(v),
                None => ok = false,
            }
        }
        ok.then_some(out)
    }

    fn read_map<T>(
        &mut self,
        field: &str,
        value: &'a FieldValue,
        read: impl FnOnce(&mut FieldReader<'a>) -> Option<T>,
    ) -> Option<T> {
        let FieldValue::Map(inner) = value else {
            self.violation(field, format!("expected map, found {}", value.type_name()));
            return None;
        };

        // Nested maps carry no document id of their own.
        let inner_id = match inner.get("id") {
            Some(FieldValue::String(id)) => id.as_str(),
            _ => "",
        };
        let mut child = FieldReader {
            id: inner_id,
            fields: inner,
            prefix: self.path(field),
            violations: Vec::new(),
        };
        let result = read(&mut child);
        let failed = !child.violations.is_empty();
        self.violations.append(&mut child.violations);
        if failed {
            None
        } else {
            result
        }
    }
}

fn as_string(v: &FieldValue) -> Option<String> {
    match v {
        FieldValue::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn as_bool(v: &FieldValue) -> Option<bool> {
    match v {
        FieldValue::Bool(b) => Some(*b),
        _ => None,
    }
}

fn as_number(v: &FieldValue) -> Option<f64> {
    match v {
        FieldValue::Integer(i) => Some(*i as f64),
        FieldValue::Double(d) => Some(*d),
        _ => None,
    }
}

fn as_integer(v: &FieldValue) -> Option<i64> {
    match v {
        FieldValue::Integer(i) => Some(*i),
        FieldValue::Double(d) if d.fract() == 0.0 => Some(*d as i64),
        _ => None,
    }
}

fn as_timestamp(v: &FieldValue) -> Option<DateTime<Utc>> {
    match v {
        FieldValue::Timestamp(t) => Some(*t),
        _ => None,
    }
}

fn as_reference(v: &FieldValue) -> Option<DocumentRef> {
    match v {
        FieldValue::Reference(r) => Some(r.clone()),
        _ => None,
    }
}
