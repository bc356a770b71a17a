// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use club_dashboard::db::{DocumentRef, FieldValue, RawDocument};
use club_dashboard::error::AppError;
use club_dashboard::models::Club;
use club_dashboard::services::subscribe_to_clubs_for_user;

mod common;
use common::{club_fields, Recorder, ScriptedSource};

fn club(id: &str, name: &str) -> RawDocument {
    RawDocument::new(DocumentRef::root("clubs", id), club_fields(name, "u1"))
}

#[test]
fn test_each_snapshot_yields_one_full_delivery() {
    let source = ScriptedSource::new();
    let clubs = Recorder::<Vec<Club>>::new();
    let errors = Recorder::<AppError>::new();
    let _sub = subscribe_to_clubs_for_user(&source, "u1", clubs.callback(), errors.callback());

    let listener = source.latest("clubs").expect("clubs listener");
    listener.fire_query(vec![club("a", "Salsa")]);
    listener.fire_query(vec![club("a", "Salsa"), club("b", "Tango")]);
    listener.fire_query(vec![club("b", "Tango")]);

    let sizes: Vec<usize> = clubs.values().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![1, 2, 1]);
    assert_eq!(clubs.last().unwrap()[0].name, "Tango");
    assert!(errors.values().is_empty());
}

#[test]
fn test_nothing_delivered_after_unsubscribe() {
    let source = ScriptedSource::new();
    let clubs = Recorder::<Vec<Club>>::new();
    let errors = Recorder::<AppError>::new();
    let sub = subscribe_to_clubs_for_user(&source, "u1", clubs.callback(), errors.callback());
    let listener = source.latest("clubs").unwrap();

    sub.unsubscribe();
    sub.unsubscribe();
    assert!(!listener.is_active());

    listener.fire_query(vec![club("a", "Salsa")]);
    listener.fail(AppError::subscription("clubs", "late"));

    assert_eq!(clubs.len(), 0);
    assert_eq!(errors.len(), 0);
}

#[test]
fn test_underlying_error_reported_once() {
    let source = ScriptedSource::new();
    let clubs = Recorder::<Vec<Club>>::new();
    let errors = Recorder::<AppError>::new();
    let _sub = subscribe_to_clubs_for_user(&source, "u1", clubs.callback(), errors.callback());

    source
        .latest("clubs")
        .unwrap()
        .fail(AppError::subscription("clubs", "permission denied"));

    assert_eq!(
        errors.values(),
        vec![AppError::subscription("clubs", "permission denied")]
    );
}

#[test]
fn test_query_filters_on_admin() {
    let source = ScriptedSource::new();
    let clubs = Recorder::<Vec<Club>>::new();
    let errors = Recorder::<AppError>::new();
    let _sub = subscribe_to_clubs_for_user(&source, "u42", clubs.callback(), errors.callback());

    match &source.latest("clubs").unwrap().target {
        common::ScriptedTarget::Query(q) => {
            assert_eq!(q.filters[0].field, "admins");
            assert_eq!(q.filters[0].value, FieldValue::from("u42"));
        }
        other => panic!("expected query, got {other:?}"),
    }
}
