// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The live-query capability every subscriber is written against.

use std::fmt;
use std::sync::{Arc, Mutex};

use super::query::Query;
use super::value::{DocumentRef, RawDocument};
use crate::error::AppError;

/// Called with the full, ordered result of a query on every change.
pub type QueryCallback = Arc<dyn Fn(Vec<RawDocument>) + Send + Sync>;
/// Called with the current state of one document (`None` if it does not exist).
pub type DocumentCallback = Arc<dyn Fn(Option<RawDocument>) + Send + Sync>;
/// Called when a listener fails.
pub type ErrorCallback = Arc<dyn Fn(AppError) + Send + Sync>;

/// A database that can push live snapshots.
///
/// Implementations deliver the initial state as the first snapshot and may
/// invoke callbacks from any thread, including synchronously from within
/// `listen_*` itself.
pub trait DocumentSource: Send + Sync + 'static {
    fn listen_query(
        &self,
        query: Query,
        on_next: QueryCallback,
        on_error: ErrorCallback,
    ) -> Subscription;

    fn listen_document(
        &self,
        reference: DocumentRef,
        on_next: DocumentCallback,
        on_error: ErrorCallback,
    ) -> Subscription;
}

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle to a live listener. Dropping it unsubscribes.
pub struct Subscription {
    teardown: Mutex<Option<Teardown>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self {
            teardown: Mutex::new(None),
        }
    }

    /// Stop the listener. Safe to call more than once.
    pub fn unsubscribe(&self) {
        let teardown = match self.teardown.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    pub fn is_active(&self) -> bool {
        match self.teardown.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
