// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - live subscriptions and the state built on them.

pub mod auth;
pub mod collection;
pub mod hooks;
pub mod join;
pub mod members;
pub mod selection;
pub mod sessions;
pub mod teachers;

pub use auth::{AuthProvider, AuthState, StaticAuth};
pub use collection::{
    subscribe_collection, subscribe_to_classes_for_club, subscribe_to_clubs_for_user,
    subscribe_to_events_for_club, ListCallback,
};
pub use hooks::{
    use_classes_for_club, use_clubs_for_user, use_events_for_club, use_members_for_class,
    use_sessions_for_club, use_teachers_for_class, HookState, LiveHook,
};
pub use join::{subscribe_joined, JoinRow, JoinedSnapshot, Link, LinkTarget, Resolved, SharedSource};
pub use members::subscribe_to_members_for_class;
pub use selection::{
    selection_key, ClubSelection, FileSelectionStore, MemorySelectionStore, SelectionStore,
    StoreError,
};
pub use sessions::{
    page_size_for_viewport, subscribe_to_sessions_for_club, SessionPageParams, SessionPager,
};
pub use teachers::subscribe_to_teachers_for_class;
