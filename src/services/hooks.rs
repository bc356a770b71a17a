// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reactive state holders over the live subscribers.
//!
//! A [`LiveHook`] owns at most one subscription, keyed by its parameters.
//! Changing the parameters tears the old subscription down and opens a new
//! one; callbacks that arrive late from the old subscription are ignored.
//! Consumers read the current [`HookState`] or await changes through a
//! `tokio::sync::watch` receiver.
//!
//! The generation counter is only bumped while holding the watch lock, and
//! feeds check it under that same lock, so a late write from an old
//! subscription can never land after the reset for new parameters.

use futures_util::stream::{self, Stream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::collection::{
    subscribe_to_classes_for_club, subscribe_to_clubs_for_user, subscribe_to_events_for_club,
};
use super::join::SharedSource;
use super::members::subscribe_to_members_for_class;
use super::sessions::{subscribe_to_sessions_for_club, SessionPageParams};
use super::teachers::subscribe_to_teachers_for_class;
use crate::db::{ErrorCallback, Subscription};
use crate::error::AppError;
use crate::models::{
    Club, ClubClass, ClubEvent, ExtendedClubMember, ExtendedClubTeacher, SessionPage,
};

/// What a consumer sees.
#[derive(Debug, Clone, PartialEq)]
pub struct HookState<T> {
    pub data: T,
    /// First top-level failure; stays set until the parameters change
    pub error: Option<AppError>,
    /// True until the first data or error arrives
    pub loading: bool,
}

impl<T: Default> HookState<T> {
    fn reset(loading: bool) -> Self {
        Self {
            data: T::default(),
            error: None,
            loading,
        }
    }
}

/// Callbacks handed to a subscriber, bound to one hook generation.
pub struct Feed<T> {
    state: Arc<watch::Sender<HookState<T>>>,
    current: Arc<AtomicU64>,
    generation: u64,
    label: &'static str,
}

impl<T: Send + Sync + 'static> Feed<T> {
    pub fn data(&self) -> Arc<dyn Fn(T) + Send + Sync> {
        let state = self.state.clone();
        let current = self.current.clone();
        let generation = self.generation;
        Arc::new(move |data| {
            state.send_if_modified(|s| {
                if current.load(Ordering::SeqCst) != generation {
                    return false;
                }
                s.data = data;
                s.loading = false;
                true
            });
        })
    }

    pub fn error(&self) -> ErrorCallback {
        let state = self.state.clone();
        let current = self.current.clone();
        let generation = self.generation;
        let label = self.label;
        Arc::new(move |error: AppError| {
            state.send_if_modified(|s| {
                if current.load(Ordering::SeqCst) != generation {
                    return false;
                }
                if error.is_nested() {
                    // Rows stay usable; the unresolved field just stays empty.
                    tracing::warn!(hook = label, error = %error, "Nested data unavailable");
                    return false;
                }
                tracing::error!(hook = label, error = %error, "Live query failed");
                if s.error.is_none() {
                    s.error = Some(error);
                }
                s.loading = false;
                true
            });
        })
    }
}

type SubscribeFn<P, T> = Box<dyn Fn(&P, Feed<T>) -> Subscription + Send + Sync>;

/// Live data for parameters `P`.
pub struct LiveHook<P, T> {
    label: &'static str,
    state: Arc<watch::Sender<HookState<T>>>,
    generation: Arc<AtomicU64>,
    subscribe: SubscribeFn<P, T>,
    params: Option<P>,
    subscription: Option<Subscription>,
}

impl<P, T> LiveHook<P, T>
where
    P: Clone + PartialEq,
    T: Clone + Default + Send + Sync + 'static,
{
    pub fn new(label: &'static str, subscribe: SubscribeFn<P, T>, params: Option<P>) -> Self {
        let (state, _) = watch::channel(HookState::reset(false));
        let mut hook = Self {
            label,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            subscribe,
            params: None,
            subscription: None,
        };
        hook.set_params(params);
        hook
    }

    /// Switch to new parameters. Equal parameters keep the current subscription.
    /// `None` clears the data and leaves nothing subscribed.
    pub fn set_params(&mut self, params: Option<P>) {
        if params.is_some() && params == self.params {
            return;
        }

        let mut generation = 0;
        let counter = &self.generation;
        let loading = params.is_some();
        self.state.send_modify(|s| {
            generation = counter.fetch_add(1, Ordering::SeqCst) + 1;
            *s = HookState::reset(loading);
        });
        if let Some(old) = self.subscription.take() {
            old.unsubscribe();
        }
        self.params = params;

        if let Some(params) = &self.params {
            tracing::debug!(hook = self.label, generation, "Subscribing");
            let feed = Feed {
                state: self.state.clone(),
                current: self.generation.clone(),
                generation,
                label: self.label,
            };
            self.subscription = Some((self.subscribe)(params, feed));
        }
    }

    pub fn clear(&mut self) {
        self.set_params(None);
    }

    pub fn params(&self) -> Option<&P> {
        self.params.as_ref()
    }

    /// Current state.
    pub fn state(&self) -> HookState<T> {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<HookState<T>> {
        self.state.subscribe()
    }

    /// Every state change from now on.
    pub fn updates(&self) -> impl Stream<Item = HookState<T>> {
        stream::unfold(self.state.subscribe(), |mut rx| async move {
            rx.changed().await.ok()?;
            let state = rx.borrow_and_update().clone();
            Some((state, rx))
        })
    }

    /// Wait until the state satisfies `ready` and return it.
    pub async fn wait_for(&self, ready: impl FnMut(&HookState<T>) -> bool) -> HookState<T> {
        let mut rx = self.state.subscribe();
        if let Ok(state) = rx.wait_for(ready).await {
            return state.clone();
        }
        // The sender lives as long as `self`.
        self.state()
    }
}

impl<P, T> Drop for LiveHook<P, T> {
    fn drop(&mut self) {
        let counter = &self.generation;
        self.state.send_if_modified(|_| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

pub type ClubsHook = LiveHook<String, Vec<Club>>;
pub type ClassesHook = LiveHook<String, Vec<ClubClass>>;
pub type EventsHook = LiveHook<String, Vec<ClubEvent>>;
/// Parameters: (club id, class id)
pub type MembersHook = LiveHook<(String, String), Vec<ExtendedClubMember>>;
pub type TeachersHook = LiveHook<(String, String), Vec<ExtendedClubTeacher>>;
pub type SessionsHook = LiveHook<SessionPageParams, SessionPage>;

/// Clubs administered by the user.
pub fn use_clubs_for_user(source: SharedSource, user_id: Option<String>) -> ClubsHook {
    LiveHook::new(
        "clubs",
        Box::new(move |user_id: &String, feed: Feed<Vec<Club>>| {
            subscribe_to_clubs_for_user(source.as_ref(), user_id, feed.data(), feed.error())
        }),
        user_id,
    )
}

pub fn use_classes_for_club(source: SharedSource, club_id: Option<String>) -> ClassesHook {
    LiveHook::new(
        "classes",
        Box::new(move |club_id: &String, feed: Feed<Vec<ClubClass>>| {
            subscribe_to_classes_for_club(source.as_ref(), club_id, feed.data(), feed.error())
        }),
        club_id,
    )
}

pub fn use_events_for_club(source: SharedSource, club_id: Option<String>) -> EventsHook {
    LiveHook::new(
        "events",
        Box::new(move |club_id: &String, feed: Feed<Vec<ClubEvent>>| {
            subscribe_to_events_for_club(source.as_ref(), club_id, feed.data(), feed.error())
        }),
        club_id,
    )
}

pub fn use_members_for_class(
    source: SharedSource,
    class: Option<(String, String)>,
) -> MembersHook {
    LiveHook::new(
        "members",
        Box::new(
            move |(club_id, class_id): &(String, String), feed: Feed<Vec<ExtendedClubMember>>| {
                subscribe_to_members_for_class(
                    source.clone(),
                    club_id,
                    class_id,
                    feed.data(),
                    feed.error(),
                )
            },
        ),
        class,
    )
}

pub fn use_teachers_for_class(
    source: SharedSource,
    class: Option<(String, String)>,
) -> TeachersHook {
    LiveHook::new(
        "teachers",
        Box::new(
            move |(club_id, class_id): &(String, String), feed: Feed<Vec<ExtendedClubTeacher>>| {
                subscribe_to_teachers_for_class(
                    source.clone(),
                    club_id,
                    class_id,
                    feed.data(),
                    feed.error(),
                )
            },
        ),
        class,
    )
}

/// One live page of sessions; pass new params (e.g. from a `SessionPager`) to page.
pub fn use_sessions_for_club(
    source: SharedSource,
    params: Option<SessionPageParams>,
) -> SessionsHook {
    LiveHook::new(
        "sessions",
        Box::new(move |params: &SessionPageParams, feed: Feed<SessionPage>| {
            subscribe_to_sessions_for_club(source.clone(), params, feed.data(), feed.error())
        }),
        params,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Hook over a fake subscriber that hands its feed back to the test.
    fn manual_hook() -> (LiveHook<u32, Vec<u32>>, Arc<Mutex<Vec<Feed<Vec<u32>>>>>) {
        let feeds = Arc::new(Mutex::new(Vec::new()));
        let sink = feeds.clone();
        let hook = LiveHook::new(
            "test",
            Box::new(move |_: &u32, feed: Feed<Vec<u32>>| {
                sink.lock().unwrap().push(feed);
                Subscription::noop()
            }),
            None,
        );
        (hook, feeds)
    }

    #[test]
    fn test_no_params_means_idle() {
        let (hook, feeds) = manual_hook();
        let state = hook.state();

        assert!(!state.loading);
        assert!(state.data.is_empty());
        assert!(feeds.lock().unwrap().is_empty());
    }

    #[test]
    fn test_loading_until_first_data() {
        let (mut hook, feeds) = manual_hook();
        hook.set_params(Some(1));
        assert!(hook.state().loading);

        let on_data = feeds.lock().unwrap()[0].data();
        on_data(vec![7, 8]);

        let state = hook.state();
        assert!(!state.loading);
        assert_eq!(state.data, vec![7, 8]);
    }

    #[test]
    fn test_same_params_do_not_resubscribe() {
        let (mut hook, feeds) = manual_hook();
        hook.set_params(Some(1));
        hook.set_params(Some(1));
        assert_eq!(feeds.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_late_callbacks_from_old_params_are_ignored() {
        let (mut hook, feeds) = manual_hook();
        hook.set_params(Some(1));
        hook.set_params(Some(2));

        let (old_data, old_error) = {
            let feeds = feeds.lock().unwrap();
            (feeds[0].data(), feeds[0].error())
        };
        old_data(vec![1]);
        old_error(AppError::Database("stale".into()));

        let state = hook.state();
        assert!(state.loading);
        assert!(state.data.is_empty());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_set_params_wins_over_concurrent_old_data() {
        use std::sync::atomic::AtomicBool;

        let (mut hook, feeds) = manual_hook();
        for round in 0..50u32 {
            hook.set_params(Some(round));
            let old_data = feeds.lock().unwrap().last().unwrap().data();
            let stop = Arc::new(AtomicBool::new(false));
            let flag = stop.clone();
            let (started_tx, started_rx) = std::sync::mpsc::channel();
            let writer = std::thread::spawn(move || {
                old_data(vec![round]);
                let _ = started_tx.send(());
                while !flag.load(Ordering::SeqCst) {
                    old_data(vec![round]);
                }
            });

            started_rx.recv().unwrap();
            hook.set_params(Some(round + 1000));
            let state = hook.state();
            stop.store(true, Ordering::SeqCst);
            writer.join().unwrap();

            assert!(state.loading, "round {round}");
            assert!(state.data.is_empty(), "round {round}");
            assert_eq!(hook.state(), state, "round {round}");
        }
    }

    #[tokio::test]
    async fn test_wait_for_returns_matching_state() {
        let (mut hook, feeds) = manual_hook();
        hook.set_params(Some(1));
        let on_data = feeds.lock().unwrap()[0].data();

        let waiter = hook.wait_for(|s| !s.loading);
        on_data(vec![4]);
        let state = waiter.await;
        assert_eq!(state.data, vec![4]);
    }

    #[test]
    fn test_error_is_sticky_and_nested_errors_are_not_fatal() {
        let (mut hook, feeds) = manual_hook();
        hook.set_params(Some(1));
        let (on_data, on_error) = {
            let feeds = feeds.lock().unwrap();
            (feeds[0].data(), feeds[0].error())
        };

        on_error(AppError::nested("user", AppError::NotFound("users/x".into())));
        assert!(hook.state().error.is_none());

        on_error(AppError::subscription("clubs", "permission denied"));
        on_data(vec![3]);

        let state = hook.state();
        assert_eq!(state.data, vec![3]);
        assert!(matches!(state.error, Some(AppError::Subscription { .. })));

        hook.clear();
        assert!(hook.state().error.is_none());
    }
}
