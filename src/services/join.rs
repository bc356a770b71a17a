// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Joined-entity subscriptions.
//!
//! A joined subscription listens to a top-level query and, for every row,
//! opens nested listeners that resolve the row's references. All state is
//! owned by a single tokio task; listener callbacks only push events onto
//! its channel, so nothing is ever mutated from two places at once.
//!
//! Each top-level snapshot starts a new *generation*: every nested listener
//! of the previous generation is torn down, the rows are rebuilt with all
//! resolved fields unset and delivered immediately, then nested listeners
//! are reopened. Nested events carry the generation and link id they were
//! opened with; events for a superseded generation or a replaced link are
//! dropped without reaching the consumer.
//!
//! The live flag and the open nested listeners sit behind one mutex shared
//! with the subscription handle. Deliveries happen while holding it, so
//! `unsubscribe()` waits for an in-flight callback, then releases every
//! listener before returning. Callbacks must not cancel their own
//! subscription synchronously.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::db::{
    Cursor, DocumentRef, DocumentSource, ErrorCallback, Query, RawDocument, Subscription,
};
use crate::error::AppError;
use crate::models::{map_document, FromDocument};

/// Shared handle to the database capability.
pub type SharedSource = Arc<dyn DocumentSource>;

/// Name of a reference field being resolved (`"user"`, `"membership"`, ...).
pub type LinkKey = &'static str;

/// What a nested listener watches.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    Document(DocumentRef),
    Query(Query),
}

/// A nested listener to open for one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub key: LinkKey,
    pub target: LinkTarget,
}

impl Link {
    pub fn document(key: LinkKey, reference: DocumentRef) -> Self {
        Self {
            key,
            target: LinkTarget::Document(reference),
        }
    }

    pub fn query(key: LinkKey, query: Query) -> Self {
        Self {
            key,
            target: LinkTarget::Query(query),
        }
    }
}

/// Data delivered by a nested listener.
#[derive(Debug, Clone)]
pub enum Resolved {
    Document(Option<RawDocument>),
    Query(Vec<RawDocument>),
}

impl Resolved {
    /// Map a single-document snapshot, treating a missing document as an error.
    pub fn entity<T: FromDocument>(self, reference_hint: &str) -> Result<T, AppError> {
        match self {
            Resolved::Document(Some(doc)) => Ok(map_document::<T>(&doc)?),
            Resolved::Document(None) => Err(AppError::NotFound(reference_hint.to_string())),
            Resolved::Query(_) => Err(AppError::InvalidQuery(format!(
                "expected a document for {reference_hint}, got a query result"
            ))),
        }
    }

    /// Map every document of a query snapshot.
    pub fn entities<T: FromDocument>(self) -> Result<Vec<T>, AppError> {
        match self {
            Resolved::Query(docs) => docs
                .iter()
                .map(|doc| map_document::<T>(doc).map_err(AppError::from))
                .collect(),
            Resolved::Document(doc) => Ok(doc
                .iter()
                .map(map_document::<T>)
                .collect::<Result<_, _>>()?),
        }
    }
}

/// An extended ("joined") row: a base entity plus fields filled in by nested listeners.
pub trait JoinRow: Clone + Send + 'static {
    type Base: FromDocument + Send;
    /// Context shared by every row of one subscription (e.g. the club reference).
    type Context: Send + Sync + 'static;

    /// Fresh row with every resolved field unset.
    fn from_base(base: Self::Base) -> Self;

    /// First-order links for this row.
    fn links(&self, ctx: &Self::Context) -> Vec<Link>;

    /// Store a nested snapshot for `key`. Returns the links to open beneath
    /// it; those are replaced every time `key` resolves again. On error the
    /// row must be left unchanged.
    fn resolve(
        &mut self,
        key: LinkKey,
        resolved: Resolved,
        ctx: &Self::Context,
    ) -> Result<Vec<Link>, AppError>;
}

/// Full state delivered on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedSnapshot<R> {
    pub rows: Vec<R>,
    /// Last raw document of the top-level result (`None` if empty)
    pub last_visible: Option<Cursor>,
}

pub type JoinedCallback<R> = Arc<dyn Fn(JoinedSnapshot<R>) + Send + Sync>;

enum Event {
    Top(Vec<RawDocument>),
    TopError(AppError),
    Nested {
        generation: u64,
        link_id: u64,
        resolved: Resolved,
    },
    NestedError {
        generation: u64,
        link_id: u64,
        error: AppError,
    },
    Shutdown,
}

struct LiveLink {
    row: usize,
    key: LinkKey,
    parent: Option<u64>,
    subscription: Subscription,
}

/// State shared between the engine task and the subscription handle.
struct Shared {
    live: bool,
    links: HashMap<u64, LiveLink>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Engine<R: JoinRow> {
    label: &'static str,
    source: SharedSource,
    ctx: R::Context,
    tx: mpsc::UnboundedSender<Event>,
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    next_link_id: u64,
    rows: Vec<R>,
    last_visible: Option<Cursor>,
    on_data: JoinedCallback<R>,
    on_error: ErrorCallback,
}

/// Subscribe to `query`, resolving each row's references through nested listeners.
///
/// Must be called from within a tokio runtime. Unsubscribing stops the
/// top-level listener and every nested listener before it returns, and
/// nothing is delivered afterwards.
pub fn subscribe_joined<R: JoinRow>(
    label: &'static str,
    source: SharedSource,
    query: Query,
    ctx: R::Context,
    on_data: JoinedCallback<R>,
    on_error: ErrorCallback,
) -> Subscription {
    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(e) => {
            on_error(AppError::Database(format!(
                "joined subscription requires a tokio runtime: {e}"
            )));
            return Subscription::noop();
        }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Mutex::new(Shared {
        live: true,
        links: HashMap::new(),
    }));
    let path = query.collection.clone();

    let top_tx = tx.clone();
    let err_tx = tx.clone();
    let top = source.listen_query(
        query,
        Arc::new(move |docs| {
            let _ = top_tx.send(Event::Top(docs));
        }),
        Arc::new(move |error| {
            let _ = err_tx.send(Event::TopError(error));
        }),
    );

    let engine = Engine::<R> {
        label,
        source,
        ctx,
        tx: tx.clone(),
        shared: shared.clone(),
        generation: 0,
        next_link_id: 0,
        rows: Vec::new(),
        last_visible: None,
        on_data,
        on_error,
    };
    runtime.spawn(engine.run(rx));

    tracing::debug!(subscription = label, path = %path, "Joined subscription started");

    Subscription::new(move || {
        let released = {
            let mut state = lock(&shared);
            state.live = false;
            std::mem::take(&mut state.links)
        };
        top.unsubscribe();
        // Dropping a LiveLink unsubscribes it.
        drop(released);
        let _ = tx.send(Event::Shutdown);
    })
}

impl<R: JoinRow> Engine<R> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = rx.recv().await {
            if !lock(&self.shared).live {
                break;
            }
            match event {
                Event::Top(docs) => self.on_top(docs),
                Event::TopError(error) => {
                    tracing::error!(subscription = self.label, error = %error, "Top-level subscription failed");
                    self.report(error);
                }
                Event::Nested {
                    generation,
                    link_id,
                    resolved,
                } => self.on_nested(generation, link_id, resolved),
                Event::NestedError {
                    generation,
                    link_id,
                    error,
                } => self.on_nested_error(generation, link_id, error),
                Event::Shutdown => break,
            }
        }

        let released = std::mem::take(&mut lock(&self.shared).links);
        tracing::debug!(
            subscription = self.label,
            released = released.len(),
            "Joined subscription stopped"
        );
    }

    fn on_top(&mut self, docs: Vec<RawDocument>) {
        self.generation += 1;
        let released = {
            let mut shared = lock(&self.shared);
            if !shared.live {
                return;
            }
            // Dropping a LiveLink unsubscribes it.
            let released = shared.links.len();
            shared.links.clear();
            released
        };

        let bases: Result<Vec<R::Base>, _> = docs.iter().map(map_document::<R::Base>).collect();
        let bases = match bases {
            Ok(bases) => bases,
            Err(e) => {
                tracing::error!(subscription = self.label, error = %e, "Failed to map top-level document");
                self.rows.clear();
                self.last_visible = None;
                self.report(e.into());
                return;
            }
        };

        self.rows = bases.into_iter().map(R::from_base).collect();
        self.last_visible = docs.last().cloned().map(Cursor::new);

        tracing::debug!(
            subscription = self.label,
            generation = self.generation,
            rows = self.rows.len(),
            released,
            "Top-level snapshot"
        );

        self.emit();

        for row in 0..self.rows.len() {
            for link in self.rows[row].links(&self.ctx) {
                self.open(row, link, None);
            }
        }
    }

    fn on_nested(&mut self, generation: u64, link_id: u64, resolved: Resolved) {
        let Some((row, key)) = self.current_link(generation, link_id) else {
            return;
        };

        self.close_children(link_id);

        match self.rows[row].resolve(key, resolved, &self.ctx) {
            Ok(children) => {
                self.emit();
                for child in children {
                    self.open(row, child, Some(link_id));
                }
            }
            Err(e) => {
                tracing::warn!(subscription = self.label, link = key, row, error = %e, "Failed to resolve nested data");
                self.report(AppError::nested(key, e));
            }
        }
    }

    fn on_nested_error(&mut self, generation: u64, link_id: u64, error: AppError) {
        let Some((row, key)) = self.current_link(generation, link_id) else {
            return;
        };
        tracing::warn!(subscription = self.label, link = key, row, error = %error, "Nested subscription failed");
        self.report(AppError::nested(key, error));
    }

    /// Row and key of a live link, or `None` if the event is stale.
    fn current_link(&self, generation: u64, link_id: u64) -> Option<(usize, LinkKey)> {
        if generation != self.generation {
            tracing::debug!(
                subscription = self.label,
                stale = generation,
                current = self.generation,
                "Dropping nested event from superseded generation"
            );
            return None;
        }
        match lock(&self.shared).links.get(&link_id) {
            Some(link) => Some((link.row, link.key)),
            None => {
                tracing::debug!(subscription = self.label, link_id, "Dropping event for replaced link");
                None
            }
        }
    }

    /// Open a nested listener. The lock is held across the `listen_*` call
    /// so a concurrent teardown either sees the new link or prevents it.
    fn open(&mut self, row: usize, link: Link, parent: Option<u64>) {
        let link_id = self.next_link_id;
        self.next_link_id += 1;
        let generation = self.generation;

        let tx = self.tx.clone();
        let err_tx = self.tx.clone();
        let on_error: ErrorCallback = Arc::new(move |error| {
            let _ = err_tx.send(Event::NestedError {
                generation,
                link_id,
                error,
            });
        });

        let mut shared = lock(&self.shared);
        if !shared.live {
            return;
        }
        let subscription = match link.target {
            LinkTarget::Document(reference) => self.source.listen_document(
                reference,
                Arc::new(move |doc| {
                    let _ = tx.send(Event::Nested {
                        generation,
                        link_id,
                        resolved: Resolved::Document(doc),
                    });
                }),
                on_error,
            ),
            LinkTarget::Query(query) => self.source.listen_query(
                query,
                Arc::new(move |docs| {
                    let _ = tx.send(Event::Nested {
                        generation,
                        link_id,
                        resolved: Resolved::Query(docs),
                    });
                }),
                on_error,
            ),
        };

        shared.links.insert(
            link_id,
            LiveLink {
                row,
                key: link.key,
                parent,
                subscription,
            },
        );
    }

    /// Close every descendant of `link_id`, leaving the link itself open.
    fn close_children(&self, link_id: u64) {
        let mut shared = lock(&self.shared);
        let mut parents = vec![link_id];
        while let Some(parent) = parents.pop() {
            let children: Vec<u64> = shared
                .links
                .iter()
                .filter(|(_, link)| link.parent == Some(parent))
                .map(|(id, _)| *id)
                .collect();
            for child in children {
                if let Some(link) = shared.links.remove(&child) {
                    link.subscription.unsubscribe();
                }
                parents.push(child);
            }
        }
    }

    fn emit(&self) {
        let shared = lock(&self.shared);
        if !shared.live {
            return;
        }
        (self.on_data)(JoinedSnapshot {
            rows: self.rows.clone(),
            last_visible: self.last_visible.clone(),
        });
    }

    fn report(&self, error: AppError) {
        let shared = lock(&self.shared);
        if shared.live {
            (self.on_error)(error);
        }
    }
}
