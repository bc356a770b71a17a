// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session paging and date-range filtering against the in-memory store.

use chrono::{Duration, Local, TimeZone, Utc};
use club_dashboard::db::MemoryDb;
use club_dashboard::models::SessionPage;
use club_dashboard::services::{
    subscribe_to_sessions_for_club, SessionPageParams, SessionPager, SharedSource,
};
use club_dashboard::time_utils::{end_of_day, start_of_day};
use std::collections::HashSet;
use std::sync::Arc;

mod common;
use common::{doc_ref, eventually, seeded_memory_db, session_fields, settle, Recorder};

/// Open a page, take its first emission and close it again.
async fn first_emission(source: SharedSource, params: &SessionPageParams) -> SessionPage {
    let pages = Recorder::new();
    let errors = Recorder::<club_dashboard::error::AppError>::new();
    let sub = subscribe_to_sessions_for_club(source, params, pages.callback(), errors.callback());
    pages.wait_for_len(1).await;
    sub.unsubscribe();
    assert!(errors.values().is_empty(), "{:?}", errors.values());
    pages.values().remove(0)
}

fn ids(page: &SessionPage) -> Vec<String> {
    page.sessions.iter().map(|s| s.base.id.clone()).collect()
}

#[tokio::test]
async fn test_pages_are_disjoint_and_cover_everything() {
    let db = seeded_memory_db(25);
    let source: SharedSource = Arc::new(db);
    let mut pager = SessionPager::new("c1", 10);

    let mut pages = Vec::new();
    loop {
        let page = first_emission(source.clone(), &pager.params()).await;
        pages.push(ids(&page));
        if !pager.next(&page) {
            break;
        }
    }

    assert_eq!(
        pages.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![10, 10, 5]
    );
    // Newest first.
    assert_eq!(pages[0][0], "s024");
    assert_eq!(pages[2][4], "s000");

    let all: Vec<&String> = pages.iter().flatten().collect();
    let unique: HashSet<&String> = all.iter().copied().collect();
    assert_eq!(all.len(), 25);
    assert_eq!(unique.len(), 25);
}

#[tokio::test]
async fn test_previous_reopens_the_same_page() {
    let source: SharedSource = Arc::new(seeded_memory_db(12));
    let mut pager = SessionPager::new("c1", 5);

    let first = first_emission(source.clone(), &pager.params()).await;
    assert!(pager.next(&first));
    let second = first_emission(source.clone(), &pager.params()).await;
    assert!(pager.previous());
    let again = first_emission(source.clone(), &pager.params()).await;

    assert_eq!(ids(&first), ids(&again));
    assert!(ids(&second).iter().all(|id| !ids(&first).contains(id)));
}

#[tokio::test]
async fn test_date_range_includes_exact_day_bounds() {
    let db = MemoryDb::new();
    let day = Local.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap().with_timezone(&Utc);
    let start = start_of_day(day, &Local);
    let end = end_of_day(day, &Local);

    for (id, date) in [
        ("before", start - Duration::milliseconds(1)),
        ("first", start),
        ("last", end),
        ("after", end + Duration::milliseconds(1)),
    ] {
        db.set(
            doc_ref(&format!("clubs/c1/sessions/{id}")),
            session_fields(date, "u1", "m1"),
        );
    }

    let source: SharedSource = Arc::new(db);
    let params = SessionPageParams::new("c1", 10).with_date_range(Some(day), Some(day));
    let page = first_emission(source, &params).await;

    assert_eq!(ids(&page), vec!["last".to_string(), "first".to_string()]);
}

#[tokio::test]
async fn test_sessions_resolve_against_live_store() {
    let db = seeded_memory_db(3);
    let source: SharedSource = Arc::new(db.clone());
    let pages = Recorder::<SessionPage>::new();
    let errors = Recorder::<club_dashboard::error::AppError>::new();
    let _sub = subscribe_to_sessions_for_club(
        source,
        &SessionPageParams::new("c1", 10),
        pages.callback(),
        errors.callback(),
    );

    eventually(|| {
        pages.last().is_some_and(|p| {
            p.sessions.len() == 3 && p.sessions.iter().all(|s| s.club_membership_data.is_some())
        })
    })
    .await;
    let page = pages.last().unwrap();
    for session in &page.sessions {
        assert_eq!(session.user_data.as_ref().unwrap().name, "Ana");
        assert_eq!(session.user_membership_data.as_ref().unwrap().id, "m2");
        assert_eq!(session.club_membership_data.as_ref().unwrap().name, "Monthly");
    }

    // A write to a referenced document flows into the page.
    db.set(doc_ref("users/u1"), common::user_fields("Ana Maria"));
    eventually(|| {
        pages.last().is_some_and(|p| {
            p.sessions
                .iter()
                .all(|s| s.user_data.as_ref().is_some_and(|u| u.name == "Ana Maria"))
        })
    })
    .await;
    assert!(errors.values().is_empty());
}

#[tokio::test]
async fn test_zero_page_size_reports_invalid_query() {
    let source: SharedSource = Arc::new(MemoryDb::new());
    let pages = Recorder::<SessionPage>::new();
    let errors = Recorder::new();
    let sub = subscribe_to_sessions_for_club(
        source,
        &SessionPageParams::new("c1", 0),
        pages.callback(),
        errors.callback(),
    );

    assert!(!sub.is_active());
    assert!(matches!(
        errors.values().as_slice(),
        [club_dashboard::error::AppError::InvalidQuery(_)]
    ));
}

#[tokio::test]
async fn test_unsubscribed_page_releases_store_listeners() {
    let db = seeded_memory_db(2);
    let source: SharedSource = Arc::new(db.clone());
    let pages = Recorder::<SessionPage>::new();
    let errors = Recorder::<club_dashboard::error::AppError>::new();
    let sub = subscribe_to_sessions_for_club(
        source,
        &SessionPageParams::new("c1", 10),
        pages.callback(),
        errors.callback(),
    );
    settle().await;
    assert!(db.listener_count() > 1);

    sub.unsubscribe();
    assert_eq!(db.listener_count(), 0);

    let delivered = pages.len();
    db.set(doc_ref("users/u1"), common::user_fields("Nobody"));
    settle().await;
    assert_eq!(pages.len(), delivered);
}
