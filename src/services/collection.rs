//! Single-collection subscriptions: one query, mapped rows, no joins.

use std::sync::{Arc, Mutex, PoisonError};

use crate::db::{collections, DocumentRef, DocumentSource, FieldValue, FilterOp, Query, Subscription};
use crate::error::AppError;
use crate::models::{map_document, Club, ClubClass, ClubEvent, FromDocument};

/// Receives the full, current list of entities on every change.
pub type ListCallback<T> = Arc<dyn Fn(Vec<T>) + Send + Sync>;

/// Subscribe to `query`, delivering every snapshot as a freshly mapped list.
///
/// A snapshot containing a document that fails validation is reported via
/// `on_error` instead of being delivered. Callbacks run under a gate that
/// `unsubscribe()` also takes, so once it returns nothing more is delivered.
/// Callbacks must not cancel their own subscription synchronously.
pub fn subscribe_collection<T>(
    source: &dyn DocumentSource,
    query: Query,
    on_data: ListCallback<T>,
    on_error: crate::db::ErrorCallback,
) -> Subscription
where
    T: FromDocument + 'static,
{
    // `true` once cancelled.
    let closed = Arc::new(Mutex::new(false));
    let path = query.collection.clone();

    let next_closed = closed.clone();
    let next_error = on_error.clone();
    let entity = T::ENTITY;
    let on_next = Arc::new(move |docs: Vec<crate::db::RawDocument>| {
        let closed = next_closed.lock().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return;
        }
        let mapped: Result<Vec<T>, _> = docs.iter().map(map_document::<T>).collect();
        match mapped {
            Ok(items) => on_data(items),
            Err(e) => {
                tracing::error!(entity, error = %e, "Dropping snapshot with invalid document");
                next_error(e.into());
            }
        }
    });

    let error_closed = closed.clone();
    let error_path = path.clone();
    let on_source_error = Arc::new(move |error: AppError| {
        let closed = error_closed.lock().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return;
        }
        tracing::error!(path = %error_path, error = %error, "Collection subscription failed");
        on_error(error);
    });

    tracing::debug!(entity, path = %path, "Collection subscription started");
    let inner = source.listen_query(query, on_next, on_source_error);

    Subscription::new(move || {
        *closed.lock().unwrap_or_else(PoisonError::into_inner) = true;
        inner.unsubscribe();
    })
}

/// Clubs administered by `user_id`.
pub fn clubs_for_user_query(user_id: &str) -> Query {
    Query::collection(collections::CLUBS).filter(
        "admins",
        FilterOp::ArrayContains,
        FieldValue::from(user_id),
    )
}

/// Classes of a club.
pub fn classes_for_club_query(club_id: &str) -> Query {
    Query::collection(DocumentRef::root(collections::CLUBS, club_id).collection(collections::CLASSES))
}

/// Events whose `club` reference points at `club_id`.
pub fn events_for_club_query(club_id: &str) -> Query {
    Query::collection(collections::EVENTS).filter(
        "club",
        FilterOp::Equal,
        FieldValue::Reference(DocumentRef::root(collections::CLUBS, club_id)),
    )
}

pub fn subscribe_to_clubs_for_user(
    source: &dyn DocumentSource,
    user_id: &str,
    on_data: ListCallback<Club>,
    on_error: crate::db::ErrorCallback,
) -> Subscription {
    subscribe_collection(source, clubs_for_user_query(user_id), on_data, on_error)
}

pub fn subscribe_to_classes_for_club(
    source: &dyn DocumentSource,
    club_id: &str,
    on_data: ListCallback<ClubClass>,
    on_error: crate::db::ErrorCallback,
) -> Subscription {
    subscribe_collection(source, classes_for_club_query(club_id), on_data, on_error)
}

pub fn subscribe_to_events_for_club(
    source: &dyn DocumentSource,
    club_id: &str,
    on_data: ListCallback<ClubEvent>,
    on_error: crate::db::ErrorCallback,
) -> Subscription {
    subscribe_collection(source, events_for_club_query(club_id), on_data, on_error)
}
