// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process live document store.
//!
//! Behaves like a (very small) Firestore: every listener gets the current
//! result immediately and is re-notified with the full result whenever a
//! write changes it. Used for offline runs, tests and benchmarks.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use super::query::Query;
use super::source::{DocumentCallback, DocumentSource, ErrorCallback, QueryCallback, Subscription};
use super::value::{fields_from_json, DocumentRef, Fields, RawDocument};
use crate::error::AppError;

/// In-memory document source.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    documents: RwLock<BTreeMap<DocumentRef, Fields>>,
    listeners: DashMap<u64, Arc<Listener>>,
    /// Paths whose listeners fail, with the error message to report.
    failures: DashMap<String, String>,
    next_id: AtomicU64,
}

enum Target {
    Query(Query, QueryCallback),
    Document(DocumentRef, DocumentCallback),
}

#[derive(Clone, PartialEq)]
enum Snapshot {
    Query(Vec<RawDocument>),
    Document(Option<RawDocument>),
}

struct Listener {
    target: Target,
    on_error: ErrorCallback,
    active: AtomicBool,
    last: Mutex<Option<Snapshot>>,
}

impl Listener {
    fn path(&self) -> &str {
        match &self.target {
            Target::Query(q, _) => &q.collection,
            Target::Document(r, _) => r.path(),
        }
    }
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load documents from a JSON seed file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let json_data = fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Database(format!(
                "Failed to read seed file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::load_from_json(&json_data)
    }

    /// Load documents from a JSON object mapping document paths to field objects.
    ///
    /// References, timestamps and geopoints use `{"$ref": ..}`, `{"$timestamp": ..}`
    /// and `{"$geopoint": {..}}`.
    pub fn load_from_json(json_data: &str) -> Result<Self, AppError> {
        let root: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json_data)
            .map_err(|e| AppError::Database(format!("Invalid seed JSON: {}", e)))?;

        let db = Self::new();
        for (path, value) in &root {
            let reference = DocumentRef::parse(path)?;
            let fields = match value {
                serde_json::Value::Object(map) => fields_from_json(map)?,
                other => {
                    return Err(AppError::Database(format!(
                        "Seed document {path} is not an object: {other}"
                    )))
                }
            };
            db.write_documents().insert(reference, fields);
        }

        tracing::info!(count = root.len(), "Loaded seed documents");
        Ok(db)
    }

    /// Create or replace a document and notify affected listeners.
    pub fn set(&self, reference: DocumentRef, fields: Fields) {
        self.write_documents().insert(reference, fields);
        self.notify_all();
    }

    /// Delete a document and notify affected listeners.
    pub fn delete(&self, reference: &DocumentRef) {
        let removed = self.write_documents().remove(reference).is_some();
        if removed {
            self.notify_all();
        }
    }

    pub fn get(&self, reference: &DocumentRef) -> Option<RawDocument> {
        self.read_documents()
            .get(reference)
            .map(|fields| RawDocument::new(reference.clone(), fields.clone()))
    }

    /// Make every listener on `path` (a document path or a query's collection
    /// path) fail, now and for future listens, until [`MemoryDb::clear_failure`].
    pub fn fail_path(&self, path: &str, message: &str) {
        self.inner
            .failures
            .insert(path.to_string(), message.to_string());

        let failing: Vec<(u64, Arc<Listener>)> = self
            .inner
            .listeners
            .iter()
            .filter(|entry| entry.value().path() == path)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (id, listener) in failing {
            self.inner.listeners.remove(&id);
            if listener.active.swap(false, Ordering::SeqCst) {
                (listener.on_error)(AppError::subscription(path, message));
            }
        }
    }

    pub fn clear_failure(&self, path: &str) {
        self.inner.failures.remove(path);
    }

    /// Number of listeners currently registered.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn register(&self, target: Target, on_error: ErrorCallback) -> Subscription {
        let listener = Arc::new(Listener {
            target,
            on_error,
            active: AtomicBool::new(true),
            last: Mutex::new(None),
        });

        if let Some(message) = self.inner.failures.get(listener.path()).map(|m| m.clone()) {
            (listener.on_error)(AppError::subscription(listener.path(), message));
            return Subscription::noop();
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.listeners.insert(id, listener.clone());
        tracing::debug!(listener_id = id, path = listener.path(), "Listener registered");

        self.deliver(&listener);

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            listener.active.store(false, Ordering::SeqCst);
            if let Some(inner) = inner.upgrade() {
                inner.listeners.remove(&id);
            }
        })
    }

    fn notify_all(&self) {
        // Snapshot the registry so no shard lock is held while callbacks run.
        let listeners: Vec<Arc<Listener>> = self
            .inner
            .listeners
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for listener in listeners {
            self.deliver(&listener);
        }
    }

    fn deliver(&self, listener: &Listener) {
        let snapshot = {
            let documents = self.read_documents();
            match &listener.target {
                Target::Query(query, _) => {
                    let all: Vec<RawDocument> = documents
                        .iter()
                        .map(|(r, f)| RawDocument::new(r.clone(), f.clone()))
                        .collect();
                    Snapshot::Query(query.evaluate(&all))
                }
                Target::Document(reference, _) => Snapshot::Document(
                    documents
                        .get(reference)
                        .map(|f| RawDocument::new(reference.clone(), f.clone())),
                ),
            }
        };

        {
            let mut last = match listener.last.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if last.as_ref() == Some(&snapshot) {
                return;
            }
            *last = Some(snapshot.clone());
        }

        if !listener.active.load(Ordering::SeqCst) {
            return;
        }
        match (&listener.target, snapshot) {
            (Target::Query(_, on_next), Snapshot::Query(docs)) => on_next(docs),
            (Target::Document(_, on_next), Snapshot::Document(doc)) => on_next(doc),
            _ => {}
        }
    }

    fn read_documents(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<DocumentRef, Fields>> {
        match self.inner.documents.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_documents(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<DocumentRef, Fields>> {
        match self.inner.documents.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl DocumentSource for MemoryDb {
    fn listen_query(
        &self,
        query: Query,
        on_next: QueryCallback,
        on_error: ErrorCallback,
    ) -> Subscription {
        self.register(Target::Query(query, on_next), on_error)
    }

    fn listen_document(
        &self,
        reference: DocumentRef,
        on_next: DocumentCallback,
        on_error: ErrorCallback,
    ) -> Subscription {
        self.register(Target::Document(reference, on_next), on_error)
    }
}
