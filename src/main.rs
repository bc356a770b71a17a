// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Club-Dashboard console
//!
//! Follows the signed-in user's clubs and logs live classes, events and
//! session check-ins for the selected club until interrupted.

use anyhow::Context;
use chrono::{Local, NaiveDate, Utc};
use club_dashboard::{
    config::Config,
    models::classes_on,
    services::{
        page_size_for_viewport, use_classes_for_club, use_clubs_for_user, use_events_for_club,
        use_sessions_for_club, ClubSelection, SessionPager,
    },
    time_utils::instant_on,
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Height of one session table row in pixels.
const SESSION_ROW_HEIGHT: u32 = 53;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        source = ?config.data_source,
        user_id = %config.dashboard_user_id,
        "Starting Club-Dashboard"
    );

    let state = AppState::from_config(config)
        .await
        .context("Failed to initialize data source")?;

    let auth = state.auth.current_user();
    let mut selection = ClubSelection::new(
        auth.user_id.clone().unwrap_or_default(),
        state.selection_store.clone(),
    );

    let page_size = state
        .config
        .viewport_height
        .map(|h| page_size_for_viewport(h, SESSION_ROW_HEIGHT))
        .unwrap_or(state.config.sessions_page_size);
    let date_range = (
        state.config.sessions_start_date.map(to_instant),
        state.config.sessions_end_date.map(to_instant),
    );

    let clubs = use_clubs_for_user(state.source.clone(), auth.user_id.clone());
    let mut classes = use_classes_for_club(state.source.clone(), None);
    let mut events = use_events_for_club(state.source.clone(), None);
    let mut sessions = use_sessions_for_club(state.source.clone(), None);
    let mut pager: Option<SessionPager> = None;

    let mut clubs_rx = clubs.watch();
    let mut classes_rx = classes.watch();
    let mut events_rx = events.watch();
    let mut sessions_rx = sessions.watch();
    // An in-memory source may already have delivered the club list.
    clubs_rx.mark_changed();

    loop {
        tokio::select! {
            Ok(()) = clubs_rx.changed() => {
                let clubs_state = clubs_rx.borrow_and_update().clone();
                if let Some(error) = &clubs_state.error {
                    tracing::error!(error = %error, "Club list unavailable");
                }
                if clubs_state.loading {
                    continue;
                }
                let selected = selection.reconcile(&clubs_state.data).map(str::to_string);
                tracing::info!(clubs = clubs_state.data.len(), selected = ?selected, "Clubs updated");

                classes.set_params(selected.clone());
                events.set_params(selected.clone());
                match &selected {
                    Some(club_id) => {
                        // Keep the current page unless the club changed.
                        if pager.as_ref().map(|p| p.params().club_id).as_ref() != Some(club_id) {
                            let mut fresh = SessionPager::new(club_id.clone(), page_size);
                            fresh.set_date_range(date_range.0, date_range.1);
                            pager = Some(fresh);
                        }
                        sessions.set_params(pager.as_ref().map(SessionPager::params));
                    }
                    None => {
                        pager = None;
                        sessions.clear();
                    }
                }
            }
            Ok(()) = classes_rx.changed() => {
                let classes_state = classes_rx.borrow_and_update().clone();
                if !classes_state.loading {
                    let today = Local::now().date_naive();
                    let todays: Vec<_> = classes_on(&classes_state.data, today)
                        .into_iter()
                        .map(|(class, slot)| format!("{:02}:{:02} {}", slot.hour, slot.minute, class.name))
                        .collect();
                    tracing::info!(classes = classes_state.data.len(), today = ?todays, error = ?classes_state.error, "Classes updated");
                }
            }
            Ok(()) = events_rx.changed() => {
                let events_state = events_rx.borrow_and_update().clone();
                if !events_state.loading {
                    let now = Utc::now();
                    let upcoming = events_state.data.iter().filter(|e| e.end_date > now).count();
                    tracing::info!(events = events_state.data.len(), upcoming, error = ?events_state.error, "Events updated");
                }
            }
            Ok(()) = sessions_rx.changed() => {
                let page = sessions_rx.borrow_and_update().clone();
                if !page.loading {
                    let resolved = page
                        .data
                        .sessions
                        .iter()
                        .filter(|s| s.user_data.is_some() && s.club_membership_data.is_some())
                        .count();
                    tracing::info!(
                        page = pager.as_ref().map(|p| p.page_index()),
                        sessions = page.data.sessions.len(),
                        resolved,
                        has_next = pager.as_ref().is_some_and(|p| p.has_next(&page.data)),
                        error = ?page.error,
                        "Sessions updated"
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn to_instant(date: NaiveDate) -> chrono::DateTime<Utc> {
    instant_on(date, &Local)
}

/// Initialize structured JSON logging (GCP-compliant), or human-readable
/// output when `LOG_FORMAT=pretty`.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,club_dashboard=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").as_deref() == Ok("pretty") {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .init();
    }
}
