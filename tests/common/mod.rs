// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use club_dashboard::db::{
    DocumentCallback, DocumentRef, DocumentSource, ErrorCallback, FieldValue, Fields, FirestoreDb,
    MemoryDb, Query, QueryCallback, RawDocument, Subscription,
};
use club_dashboard::error::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

// ═══════════════════════════════════════════════════════════════════════════
// SCRIPTED SOURCE
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedTarget {
    Query(Query),
    Document(DocumentRef),
}

/// One listener opened against a [`ScriptedSource`].
#[derive(Clone)]
pub struct ScriptedListener {
    pub target: ScriptedTarget,
    on_query: Option<QueryCallback>,
    on_document: Option<DocumentCallback>,
    on_error: ErrorCallback,
    active: Arc<AtomicBool>,
}

impl ScriptedListener {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> String {
        match &self.target {
            ScriptedTarget::Query(q) => q.collection.clone(),
            ScriptedTarget::Document(r) => r.path().to_string(),
        }
    }

    /// Deliver a query snapshot, even if the listener was cancelled.
    pub fn fire_query(&self, docs: Vec<RawDocument>) {
        let cb = self.on_query.as_ref().expect("not a query listener");
        cb(docs);
    }

    /// Deliver a document snapshot, even if the listener was cancelled.
    pub fn fire_document(&self, doc: Option<RawDocument>) {
        let cb = self.on_document.as_ref().expect("not a document listener");
        cb(doc);
    }

    pub fn fail(&self, error: AppError) {
        (self.on_error)(error);
    }
}

/// Database double that records every listener and delivers nothing on its
/// own; tests fire snapshots by hand.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    listeners: Arc<Mutex<Vec<ScriptedListener>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listeners(&self) -> Vec<ScriptedListener> {
        self.listeners.lock().unwrap().clone()
    }

    pub fn active(&self) -> Vec<ScriptedListener> {
        self.listeners()
            .into_iter()
            .filter(|l| l.is_active())
            .collect()
    }

    /// Most recent listener on `path` (collection or document path).
    pub fn latest(&self, path: &str) -> Option<ScriptedListener> {
        self.listeners().into_iter().rev().find(|l| l.path() == path)
    }

    /// Most recent *active* listener on `path`.
    pub fn active_on(&self, path: &str) -> Option<ScriptedListener> {
        self.active().into_iter().rev().find(|l| l.path() == path)
    }

    fn record(
        &self,
        target: ScriptedTarget,
        on_query: Option<QueryCallback>,
        on_document: Option<DocumentCallback>,
        on_error: ErrorCallback,
    ) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        self.listeners.lock().unwrap().push(ScriptedListener {
            target,
            on_query,
            on_document,
            on_error,
            active: active.clone(),
        });
        Subscription::new(move || active.store(false, Ordering::SeqCst))
    }
}

impl DocumentSource for ScriptedSource {
    fn listen_query(
        &self,
        query: Query,
        on_next: QueryCallback,
        on_error: ErrorCallback,
    ) -> Subscription {
        self.record(ScriptedTarget::Query(query), Some(on_next), None, on_error)
    }

    fn listen_document(
        &self,
        reference: DocumentRef,
        on_next: DocumentCallback,
        on_error: ErrorCallback,
    ) -> Subscription {
        self.record(ScriptedTarget::Document(reference), None, Some(on_next), on_error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CALLBACK RECORDERS
// ═══════════════════════════════════════════════════════════════════════════

/// Collects every value passed to a callback.
pub struct Recorder<T> {
    values: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn callback(&self) -> Arc<dyn Fn(T) + Send + Sync> {
        let values = self.values.clone();
        Arc::new(move |v: T| values.lock().unwrap().push(v))
    }

    pub fn values(&self) -> Vec<T> {
        self.values.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<T> {
        self.values.lock().unwrap().last().cloned()
    }

    /// Wait (up to one second) until at least `n` values were recorded.
    pub async fn wait_for_len(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while self.len() < n {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {n} values, got {}",
                self.len()
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

/// Wait (up to one second) until `cond` holds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within one second"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Give spawned engine tasks time to drain their queues.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

// ═══════════════════════════════════════════════════════════════════════════
// FIXTURES
// ═══════════════════════════════════════════════════════════════════════════

pub fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC3339")
        .with_timezone(&Utc)
}

pub fn doc_ref(path: &str) -> DocumentRef {
    DocumentRef::parse(path).expect("valid document path")
}

pub fn fields(pairs: Vec<(&str, FieldValue)>) -> Fields {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub fn user_fields(name: &str) -> Fields {
    fields(vec![
        ("name", FieldValue::from(name)),
        (
            "contactEmail",
            FieldValue::from(format!("{}@example.com", name.to_lowercase())),
        ),
    ])
}

pub fn user_doc(id: &str, name: &str) -> RawDocument {
    RawDocument::new(DocumentRef::root("users", id), user_fields(name))
}

pub fn session_fields(date: DateTime<Utc>, user_id: &str, membership_id: &str) -> Fields {
    fields(vec![
        ("date", FieldValue::from(date)),
        ("user", FieldValue::from(DocumentRef::root("users", user_id))),
        (
            "membership",
            FieldValue::from(doc_ref(&format!("users/{user_id}/memberships/{membership_id}"))),
        ),
    ])
}

pub fn session_doc(
    club_id: &str,
    id: &str,
    date: DateTime<Utc>,
    user_id: &str,
    membership_id: &str,
) -> RawDocument {
    RawDocument::new(
        doc_ref(&format!("clubs/{club_id}/sessions/{id}")),
        session_fields(date, user_id, membership_id),
    )
}

pub fn user_membership_fields(club_id: &str, plan_id: &str, start: DateTime<Utc>) -> Fields {
    fields(vec![
        ("club", FieldValue::from(DocumentRef::root("clubs", club_id))),
        (
            "membership",
            FieldValue::from(doc_ref(&format!("clubs/{club_id}/memberships/{plan_id}"))),
        ),
        ("startDate", FieldValue::from(start)),
        ("expiration", FieldValue::from(start + chrono::Duration::days(30))),
        ("amountReceived", FieldValue::from(45.0)),
    ])
}

pub fn user_membership_doc(user_id: &str, id: &str, club_id: &str, plan_id: &str) -> RawDocument {
    RawDocument::new(
        doc_ref(&format!("users/{user_id}/memberships/{id}")),
        user_membership_fields(club_id, plan_id, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
    )
}

pub fn plan_fields(name: &str) -> Fields {
    let category = fields(vec![
        ("id", FieldValue::from("adults")),
        ("name", FieldValue::from("Adults")),
        ("ageGroup", FieldValue::from("adults")),
    ]);
    fields(vec![
        ("name", FieldValue::from(name)),
        ("classesNo", FieldValue::from(8_i64)),
        ("price", FieldValue::from(45.0)),
        ("orderNo", FieldValue::from(1_i64)),
        ("duration", FieldValue::from(30_i64)),
        ("category", FieldValue::Map(category)),
    ])
}

pub fn plan_doc(club_id: &str, id: &str, name: &str) -> RawDocument {
    RawDocument::new(
        doc_ref(&format!("clubs/{club_id}/memberships/{id}")),
        plan_fields(name),
    )
}

pub fn member_fields(user_id: &str, club_id: &str, class_id: &str) -> Fields {
    fields(vec![
        ("user", FieldValue::from(DocumentRef::root("users", user_id))),
        (
            "classes",
            FieldValue::Array(vec![FieldValue::from(doc_ref(&format!(
                "clubs/{club_id}/classes/{class_id}"
            )))]),
        ),
        (
            "created",
            FieldValue::from(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        ),
    ])
}

pub fn club_fields(name: &str, admin: &str) -> Fields {
    fields(vec![
        ("name", FieldValue::from(name)),
        ("city", FieldValue::from("Lisbon")),
        ("address", FieldValue::from("Rua Augusta 1")),
        ("admins", FieldValue::Array(vec![FieldValue::from(admin)])),
    ])
}

/// Memory store with one club `c1` administered by `u1`, one member with
/// two purchased memberships, and `count` sessions one day apart.
pub fn seeded_memory_db(count: usize) -> MemoryDb {
    let db = MemoryDb::new();
    db.set(DocumentRef::root("clubs", "c1"), club_fields("Salsa Lisboa", "u1"));
    db.set(DocumentRef::root("users", "u1"), user_fields("Ana"));
    db.set(doc_ref("clubs/c1/memberships/p1"), plan_fields("Monthly"));
    db.set(
        doc_ref("users/u1/memberships/m1"),
        user_membership_fields("c1", "p1", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
    );
    db.set(
        doc_ref("users/u1/memberships/m2"),
        user_membership_fields("c1", "p1", Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
    );
    db.set(doc_ref("clubs/c1/members/mem1"), member_fields("u1", "c1", "k1"));

    let base = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
    for i in 0..count {
        db.set(
            doc_ref(&format!("clubs/c1/sessions/s{i:03}")),
            session_fields(base + chrono::Duration::days(i as i64), "u1", "m2"),
        );
    }
    db
}
