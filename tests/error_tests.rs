// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use club_dashboard::error::{AppError, FieldViolation, SchemaValidationError};
use std::error::Error;

fn violation(field: &str, message: &str) -> FieldViolation {
    FieldViolation {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[test]
fn test_schema_error_lists_every_violation() {
    let err = SchemaValidationError {
        entity: "ClubSession",
        id: "s1".to_string(),
        violations: vec![
            violation("date", "expected timestamp, got string"),
            violation("user", "missing"),
        ],
    };

    assert_eq!(
        err.to_string(),
        "ClubSession document s1 failed validation: date: expected timestamp, got string; user: missing"
    );
    assert!(err.has_violation("user"));
    assert!(!err.has_violation("club"));

    // Wrapping is transparent.
    let app: AppError = err.clone().into();
    assert_eq!(app.to_string(), err.to_string());
}

#[test]
fn test_is_nested_matches() {
    let err = AppError::nested("user", AppError::NotFound("users/u9".into()));
    assert!(err.is_nested());
    assert_eq!(
        err.to_string(),
        "Failed to resolve user: Referenced document not found: users/u9"
    );
    assert!(err.source().is_some());
}

#[test]
fn test_is_nested_no_match() {
    assert!(!AppError::subscription("clubs", "permission denied").is_nested());
    assert!(!AppError::NotFound("users/u9".into()).is_nested());
    assert!(!AppError::InvalidQuery("page size must be positive".into()).is_nested());
    assert!(!AppError::Database("offline".into()).is_nested());
}

#[test]
fn test_subscription_error_names_path() {
    let err = AppError::subscription("clubs/c1/sessions", "deadline exceeded");
    assert_eq!(
        err.to_string(),
        "Subscription to clubs/c1/sessions failed: deadline exceeded"
    );
}
