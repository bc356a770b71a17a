// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types shared by the mapper, the subscribers and the hooks.

use std::fmt;

/// Application error type delivered through `on_error` callbacks and hook state.
///
/// Errors are `Clone` because one failure may be fanned out to several consumers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    SchemaValidation(#[from] SchemaValidationError),

    #[error("Subscription to {path} failed: {message}")]
    Subscription { path: String, message: String },

    #[error("Referenced document not found: {0}")]
    NotFound(String),

    #[error("Failed to resolve {link}: {source}")]
    Nested {
        link: &'static str,
        #[source]
        source: Box<AppError>,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl AppError {
    pub fn subscription(path: impl Into<String>, message: impl fmt::Display) -> Self {
        AppError::Subscription {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Wrap an error raised while resolving a join link.
    pub fn nested(link: &'static str, source: AppError) -> Self {
        AppError::Nested {
            link,
            source: Box::new(source),
        }
    }

    /// True when the failure came from a first- or second-order join link
    /// rather than from the top-level query.
    pub fn is_nested(&self) -> bool {
        matches!(self, AppError::Nested { .. })
    }
}

/// A single field that did not match the entity schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Raw document did not conform to the expected entity shape.
///
/// Carries every violation found, not just the first one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} document {id} failed validation: {}", join_violations(.violations))]
pub struct SchemaValidationError {
    pub entity: &'static str,
    pub id: String,
    pub violations: Vec<FieldViolation>,
}

impl SchemaValidationError {
    /// Whether a violation was recorded for `field`.
    pub fn has_violation(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;
