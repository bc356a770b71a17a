// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed document source using live listeners.
//!
//! Each subscription opens its own listener stream. Document changes are
//! accumulated per target and delivered as a full, ordered snapshot each time
//! the server marks the target consistent.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use firestore::{
    FirestoreListenEvent, FirestoreListenerTarget, FirestoreMemListenStateStorage,
    FirestoreQueryCursor, FirestoreQueryDirection, FirestoreValue,
};
use gcloud_sdk::google::firestore::v1::target_change::TargetChangeType;
use gcloud_sdk::google::firestore::v1::{
    value::ValueType, write, ArrayValue, CommitRequest, Document, MapValue, Value, Write,
};

use super::query::{Direction, FilterOp, Query};
use super::source::{DocumentCallback, DocumentSource, ErrorCallback, QueryCallback, Subscription};
use super::value::{DocumentRef, FieldValue, Fields, GeoPoint, RawDocument};
use crate::error::AppError;

// One target per listener stream.
const TARGET_ID: i32 = 1;

fn listener_target() -> FirestoreListenerTarget {
    FirestoreListenerTarget::new(TARGET_ID as u32)
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    runtime: Option<tokio::runtime::Handle>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            runtime: Some(tokio::runtime::Handle::current()),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            runtime: Some(tokio::runtime::Handle::current()),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// Every listener fails immediately.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            runtime: None,
        }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<(&firestore::FirestoreDb, &tokio::runtime::Handle), AppError> {
        match (&self.client, &self.runtime) {
            (Some(client), Some(runtime)) => Ok((client, runtime)),
            _ => Err(AppError::Database(
                "Database not connected (offline mode)".to_string(),
            )),
        }
    }

    // ─── Writes (seeding and tests) ─────────────────────────────

    /// Create or replace a document.
    pub async fn set_document(&self, reference: &DocumentRef, fields: &Fields) -> Result<(), AppError> {
        let (client, _) = self.get_client()?;
        let documents_path = client.get_documents_path();
        let document = Document {
            name: format!("{}/{}", documents_path, reference.path()),
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), to_value(v, documents_path)))
                .collect(),
            ..Default::default()
        };
        self.commit(client, write::Operation::Update(document)).await
    }

    /// Delete a document. Deleting a missing document is not an error.
    pub async fn delete_document(&self, reference: &DocumentRef) -> Result<(), AppError> {
        let (client, _) = self.get_client()?;
        let name = format!("{}/{}", client.get_documents_path(), reference.path());
        self.commit(client, write::Operation::Delete(name)).await
    }

    async fn commit(
        &self,
        client: &firestore::FirestoreDb,
        operation: write::Operation,
    ) -> Result<(), AppError> {
        let request = CommitRequest {
            database: client.get_database_path().to_string(),
            writes: vec![Write {
                operation: Some(operation),
                ..Default::default()
            }],
            ..Default::default()
        };
        client
            .client()
            .get()
            .commit(request)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Split a collection path into the full parent resource name and the collection id.
    fn split_collection(client: &firestore::FirestoreDb, path: &str) -> (String, String) {
        let documents_path = client.get_documents_path();
        match path.rsplit_once('/') {
            Some((parent, collection_id)) => (
                format!("{}/{}", documents_path, parent),
                collection_id.to_string(),
            ),
            None => (documents_path.to_string(), path.to_string()),
        }
    }

    fn spawn_listener(
        &self,
        path: String,
        target: ListenTarget,
        on_snapshot: Arc<dyn Fn(Vec<RawDocument>) + Send + Sync>,
        on_error: ErrorCallback,
    ) -> Subscription {
        let (client, runtime) = match self.get_client() {
            Ok(pair) => pair,
            Err(e) => {
                on_error(e);
                return Subscription::noop();
            }
        };
        let client = client.clone();
        let active = Arc::new(AtomicBool::new(true));
        let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();

        let task_active = active.clone();
        runtime.spawn(async move {
            let state = Arc::new(ListenState {
                path: path.clone(),
                target,
                documents: Mutex::new(BTreeMap::new()),
                current: AtomicBool::new(false),
                active: task_active.clone(),
                on_snapshot,
                on_error: on_error.clone(),
            });

            if let Err(e) = run_listener(&client, state, cancel_rx).await {
                tracing::error!(path = %path, error = %e, "Firestore listener failed");
                if task_active.load(Ordering::SeqCst) {
                    on_error(e);
                }
            }
        });

        Subscription::new(move || {
            active.store(false, Ordering::SeqCst);
            let _ = cancel_tx.send(());
        })
    }
}

enum ListenTarget {
    Query(Query),
    Document(DocumentRef),
}

struct ListenState {
    path: String,
    target: ListenTarget,
    documents: Mutex<BTreeMap<String, Document>>,
    current: AtomicBool,
    active: Arc<AtomicBool>,
    on_snapshot: Arc<dyn Fn(Vec<RawDocument>) + Send + Sync>,
    on_error: ErrorCallback,
}

impl ListenState {
    fn handle(&self, event: FirestoreListenEvent) {
        let target_id = TARGET_ID;
        match event {
            FirestoreListenEvent::DocumentChange(change) => {
                if let Some(doc) = change.document {
                    let mut docs = self.lock_documents();
                    if change.removed_target_ids.contains(&target_id) {
                        docs.remove(&doc.name);
                    } else if change.target_ids.contains(&target_id) {
                        docs.insert(doc.name.clone(), doc);
                    }
                }
            }
            FirestoreListenEvent::DocumentDelete(delete) => {
                self.lock_documents().remove(&delete.document);
            }
            FirestoreListenEvent::DocumentRemove(remove) => {
                self.lock_documents().remove(&remove.document);
            }
            FirestoreListenEvent::TargetChange(change) => {
                let kind = change.target_change_type;
                if kind == TargetChangeType::Remove as i32 {
                    let message = change
                        .cause
                        .map(|status| status.message)
                        .unwrap_or_else(|| "target removed".to_string());
                    self.report(AppError::subscription(&self.path, message));
                } else if kind == TargetChangeType::Reset as i32 {
                    self.lock_documents().clear();
                } else if kind == TargetChangeType::Current as i32 {
                    self.current.store(true, Ordering::SeqCst);
                    self.emit();
                } else if kind == TargetChangeType::NoChange as i32
                    && change.target_ids.is_empty()
                    && self.current.load(Ordering::SeqCst)
                {
                    self.emit();
                }
            }
            _ => {}
        }
    }

    fn emit(&self) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let mut docs: Vec<RawDocument> = self
            .lock_documents()
            .values()
            .filter_map(|doc| match raw_document(doc) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    tracing::warn!(name = %doc.name, error = %e, "Skipping unreadable document");
                    None
                }
            })
            .collect();

        if let ListenTarget::Query(query) = &self.target {
            docs.sort_by(|a, b| query.compare(a, b));
            if let Some(limit) = query.limit {
                docs.truncate(limit as usize);
            }
        }
        (self.on_snapshot)(docs);
    }

    fn report(&self, err: AppError) {
        if self.active.load(Ordering::SeqCst) {
            (self.on_error)(err);
        }
    }

    fn lock_documents(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Document>> {
        match self.documents.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

async fn run_listener(
    client: &firestore::FirestoreDb,
    state: Arc<ListenState>,
    cancel_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), AppError> {
    let mut listener = client
        .create_listener(FirestoreMemListenStateStorage::new())
        .await
        .map_err(|e| AppError::subscription(&state.path, e))?;

    match &state.target {
        ListenTarget::Query(query) => {
            let (parent, collection_id) = FirestoreDb::split_collection(client, &query.collection);
            let documents_path = client.get_documents_path().to_string();

            let builder = client
                .fluent()
                .select()
                .from(collection_id.as_str())
                .parent(parent);

            let builder = if query.filters.is_empty() {
                builder
            } else {
                let filters = query.filters.clone();
                let documents_path = documents_path.clone();
                builder.filter(move |q| {
                    let clauses: Vec<_> = filters
                        .iter()
                        .map(|f| {
                            let field = q.field(f.field.as_str());
                            let value = to_firestore_value(&f.value, &documents_path);
                            match f.op {
                                FilterOp::Equal => field.eq(value),
                                FilterOp::ArrayContains => field.array_contains(value),
                                FilterOp::LessThan => field.less_than(value),
                                FilterOp::LessThanOrEqual => field.less_than_or_equal(value),
                                FilterOp::GreaterThan => field.greater_than(value),
                                FilterOp::GreaterThanOrEqual => {
                                    field.greater_than_or_equal(value)
                                }
                            }
                        })
                        .collect();
                    q.for_all(clauses)
                })
            };

            // A cursor needs the document key as the final ordering so that
            // documents tying on every explicit field are not skipped.
            let order = match &query.start_after {
                Some(_) => query.keyed_order(),
                None => query.order_by.clone(),
            };

            let builder = if order.is_empty() {
                builder
            } else {
                builder.order_by(order.iter().map(|o| {
                    let direction = match o.direction {
                        Direction::Ascending => FirestoreQueryDirection::Ascending,
                        Direction::Descending => FirestoreQueryDirection::Descending,
                    };
                    (o.field.clone(), direction)
                }))
            };

            let builder = match &query.start_after {
                Some(cursor) => builder.start_at(FirestoreQueryCursor::AfterValue(
                    cursor
                        .values_for(&order)
                        .iter()
                        .map(|v| to_firestore_value(v, &documents_path))
                        .collect(),
                )),
                None => builder,
            };

            let builder = match query.limit {
                Some(limit) => builder.limit(limit),
                None => builder,
            };

            builder
                .listen()
                .add_target(listener_target(), &mut listener)
                .map_err(|e| AppError::subscription(&state.path, e))?;
        }
        ListenTarget::Document(reference) => {
            let (parent, collection_id) = FirestoreDb::split_collection(client, reference.parent());
            client
                .fluent()
                .select()
                .by_id_in(collection_id.as_str())
                .parent(parent)
                .batch_listen([reference.id().to_string()])
                .add_target(listener_target(), &mut listener)
                .map_err(|e| AppError::subscription(&state.path, e))?;
        }
    }

    let handler_state = state.clone();
    listener
        .start(move |event| {
            let state = handler_state.clone();
            async move {
                state.handle(event);
                Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
            }
        })
        .await
        .map_err(|e| AppError::subscription(&state.path, e))?;

    tracing::debug!(path = %state.path, "Firestore listener started");

    // Sender dropped or fired: either way the subscription is over.
    let _ = cancel_rx.await;

    listener
        .shutdown()
        .await
        .map_err(|e| AppError::subscription(&state.path, e))?;
    tracing::debug!(path = %state.path, "Firestore listener stopped");
    Ok(())
}

impl DocumentSource for FirestoreDb {
    fn listen_query(
        &self,
        query: Query,
        on_next: QueryCallback,
        on_error: ErrorCallback,
    ) -> Subscription {
        let path = query.collection.clone();
        self.spawn_listener(path, ListenTarget::Query(query), on_next, on_error)
    }

    fn listen_document(
        &self,
        reference: DocumentRef,
        on_next: DocumentCallback,
        on_error: ErrorCallback,
    ) -> Subscription {
        let path = reference.path().to_string();
        let on_snapshot: Arc<dyn Fn(Vec<RawDocument>) + Send + Sync> =
            Arc::new(move |docs: Vec<RawDocument>| on_next(docs.into_iter().next()));
        self.spawn_listener(path, ListenTarget::Document(reference), on_snapshot, on_error)
    }
}

// ─── Value Conversion ────────────────────────────────────────────

fn raw_document(doc: &Document) -> Result<RawDocument, AppError> {
    let reference = DocumentRef::parse(&doc.name)?;
    let fields = doc
        .fields
        .iter()
        .map(|(name, value)| (name.clone(), from_firestore_value(value)))
        .collect();
    Ok(RawDocument::new(reference, fields))
}

fn from_firestore_value(value: &Value) -> FieldValue {
    match &value.value_type {
        None | Some(ValueType::NullValue(_)) => FieldValue::Null,
        Some(ValueType::BooleanValue(b)) => FieldValue::Bool(*b),
        Some(ValueType::IntegerValue(i)) => FieldValue::Integer(*i),
        Some(ValueType::DoubleValue(d)) => FieldValue::Double(*d),
        Some(ValueType::TimestampValue(ts)) => {
            match DateTime::<Utc>::from_timestamp(ts.seconds, ts.nanos.max(0) as u32) {
                Some(dt) => FieldValue::Timestamp(dt),
                None => FieldValue::Null,
            }
        }
        Some(ValueType::StringValue(s)) => FieldValue::String(s.clone()),
        Some(ValueType::BytesValue(b)) => FieldValue::Bytes(b.to_vec()),
        Some(ValueType::ReferenceValue(r)) => match DocumentRef::parse(r) {
            Ok(reference) => FieldValue::Reference(reference),
            Err(_) => FieldValue::String(r.clone()),
        },
        Some(ValueType::GeoPointValue(p)) => FieldValue::GeoPoint(GeoPoint {
            latitude: p.latitude,
            longitude: p.longitude,
        }),
        Some(ValueType::ArrayValue(a)) => {
            FieldValue::Array(a.values.iter().map(from_firestore_value).collect())
        }
        Some(ValueType::MapValue(m)) => FieldValue::Map(
            m.fields
                .iter()
                .map(|(k, v)| (k.clone(), from_firestore_value(v)))
                .collect::<Fields>(),
        ),
    }
}

fn to_firestore_value(value: &FieldValue, documents_path: &str) -> FirestoreValue {
    FirestoreValue::from(to_value(value, documents_path))
}

fn to_value(value: &FieldValue, documents_path: &str) -> Value {
    let value_type = match value {
        FieldValue::Null => ValueType::NullValue(0),
        FieldValue::Bool(b) => ValueType::BooleanValue(*b),
        FieldValue::Integer(i) => ValueType::IntegerValue(*i),
        FieldValue::Double(d) => ValueType::DoubleValue(*d),
        FieldValue::Timestamp(dt) => ValueType::TimestampValue(gcloud_sdk::prost_types::Timestamp {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos() as i32,
        }),
        FieldValue::String(s) => ValueType::StringValue(s.clone()),
        FieldValue::Bytes(b) => ValueType::BytesValue(b.clone().into()),
        FieldValue::Reference(r) => {
            ValueType::ReferenceValue(format!("{}/{}", documents_path, r.path()))
        }
        FieldValue::GeoPoint(p) => ValueType::GeoPointValue(gcloud_sdk::google::r#type::LatLng {
            latitude: p.latitude,
            longitude: p.longitude,
        }),
        FieldValue::Array(items) => ValueType::ArrayValue(ArrayValue {
            values: items.iter().map(|v| to_value(v, documents_path)).collect(),
        }),
        FieldValue::Map(fields) => ValueType::MapValue(MapValue {
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), to_value(v, documents_path)))
                .collect(),
        }),
    };
    Value {
        value_type: Some(value_type),
    }
}
