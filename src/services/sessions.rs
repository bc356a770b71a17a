// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Paginated session (check-in) history.
//!
//! Sessions are read newest first, one page at a time. Each page is a live
//! joined subscription: every session is extended with its user, the user
//! membership it was charged to and, through that membership, the plan that
//! was bought. Paging forward uses the last raw document of the current page
//! as a `start_after` cursor; [`SessionPager`] keeps the trail of cursors so
//! the previous page can be reopened.

use chrono::{DateTime, Local, TimeZone, Utc};
use std::sync::Arc;

use super::join::{subscribe_joined, JoinRow, JoinedCallback, Link, LinkKey, Resolved, SharedSource};
use crate::db::{
    collections, Cursor, Direction, DocumentRef, ErrorCallback, FilterOp, Query, Subscription,
};
use crate::error::AppError;
use crate::models::{ClubMembership, ClubSession, ExtendedClubSession, SessionPage, UserMembership};
use crate::time_utils::{end_of_day, start_of_day};

const USER: LinkKey = "user";
const MEMBERSHIP: LinkKey = "membership";
const PLAN: LinkKey = "plan";

/// Vertical space taken by everything except the table rows.
const VIEWPORT_CHROME_PX: u32 = 200;

/// Parameters of one page of sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPageParams {
    pub club_id: String,
    pub page_size: usize,
    /// Cursor of the previous page (`None` for the first page)
    pub start_after: Option<Cursor>,
    /// Only sessions on or after the local day containing this instant
    pub start_date: Option<DateTime<Utc>>,
    /// Only sessions on or before the local day containing this instant
    pub end_date: Option<DateTime<Utc>>,
}

impl SessionPageParams {
    pub fn new(club_id: impl Into<String>, page_size: usize) -> Self {
        Self {
            club_id: club_id.into(),
            page_size,
            start_after: None,
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_date_range(
        mut self,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_date = start_date;
        self.end_date = end_date;
        self
    }

    pub fn starting_after(mut self, cursor: Option<Cursor>) -> Self {
        self.start_after = cursor;
        self
    }

    /// Build the page query with day boundaries in the local time zone.
    pub fn query(&self) -> Result<Query, AppError> {
        self.query_in(&Local)
    }

    /// Build the page query with day boundaries in `tz`.
    pub fn query_in<Tz: TimeZone>(&self, tz: &Tz) -> Result<Query, AppError> {
        if self.page_size == 0 {
            return Err(AppError::InvalidQuery("page size must be positive".into()));
        }
        let limit = u32::try_from(self.page_size)
            .map_err(|_| AppError::InvalidQuery(format!("page size {} too large", self.page_size)))?;

        let club = DocumentRef::root(collections::CLUBS, &self.club_id);
        let mut query = Query::collection(club.collection(collections::SESSIONS));

        if let Some(start) = self.start_date {
            query = query.filter(
                "date",
                FilterOp::GreaterThanOrEqual,
                start_of_day(start, tz),
            );
        }
        if let Some(end) = self.end_date {
            query = query.filter("date", FilterOp::LessThanOrEqual, end_of_day(end, tz));
        }

        query = query.order_by("date", Direction::Descending);
        if let Some(cursor) = &self.start_after {
            query = query.start_after(cursor.clone());
        }
        Ok(query.limit(limit))
    }
}

impl JoinRow for ExtendedClubSession {
    type Base = ClubSession;
    type Context = ();

    fn from_base(base: ClubSession) -> Self {
        base.into()
    }

    fn links(&self, _: &()) -> Vec<Link> {
        vec![
            Link::document(USER, self.base.user.clone()),
            Link::document(MEMBERSHIP, self.base.membership.clone()),
        ]
    }

    fn resolve(&mut self, key: LinkKey, resolved: Resolved, _: &()) -> Result<Vec<Link>, AppError> {
        match key {
            USER => {
                self.user_data = Some(resolved.entity(self.base.user.path())?);
                Ok(Vec::new())
            }
            MEMBERSHIP => {
                let membership: UserMembership = resolved.entity(self.base.membership.path())?;
                let plan = membership.membership.clone();
                self.user_membership_data = Some(membership);
                Ok(plan
                    .map(|plan| vec![Link::document(PLAN, plan)])
                    .unwrap_or_default())
            }
            PLAN => {
                let hint = self
                    .user_membership_data
                    .as_ref()
                    .and_then(|m| m.membership.as_ref())
                    .map(|r| r.path().to_string())
                    .unwrap_or_default();
                let plan: ClubMembership = resolved.entity(&hint)?;
                self.club_membership_data = Some(plan);
                Ok(Vec::new())
            }
            other => Err(AppError::InvalidQuery(format!("unknown session link {other}"))),
        }
    }
}

/// Live page of sessions. Every change re-delivers the whole page.
///
/// Invalid parameters are reported once through `on_error` and yield an
/// inactive subscription.
pub fn subscribe_to_sessions_for_club(
    source: SharedSource,
    params: &SessionPageParams,
    on_data: Arc<dyn Fn(SessionPage) + Send + Sync>,
    on_error: ErrorCallback,
) -> Subscription {
    let query = match params.query() {
        Ok(query) => query,
        Err(e) => {
            tracing::warn!(club = %params.club_id, error = %e, "Rejected session page parameters");
            on_error(e);
            return Subscription::noop();
        }
    };

    let on_rows: JoinedCallback<ExtendedClubSession> = Arc::new(move |snapshot| {
        on_data(SessionPage {
            sessions: snapshot.rows,
            last_visible: snapshot.last_visible,
        })
    });
    subscribe_joined("sessions", source, query, (), on_rows, on_error)
}

/// Rows that fit in a viewport of `height` pixels; never less than one.
pub fn page_size_for_viewport(height: u32, row_height: u32) -> usize {
    if row_height == 0 {
        return 1;
    }
    let rows = height.saturating_sub(VIEWPORT_CHROME_PX) / row_height;
    rows.max(1) as usize
}

/// Navigation state for paging through sessions.
#[derive(Debug, Clone)]
pub struct SessionPager {
    club_id: String,
    page_size: usize,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    /// `start_after` cursor of every page after the first
    trail: Vec<Cursor>,
}

impl SessionPager {
    pub fn new(club_id: impl Into<String>, page_size: usize) -> Self {
        Self {
            club_id: club_id.into(),
            page_size,
            start_date: None,
            end_date: None,
            trail: Vec::new(),
        }
    }

    /// Parameters of the current page.
    pub fn params(&self) -> SessionPageParams {
        SessionPageParams::new(self.club_id.clone(), self.page_size)
            .with_date_range(self.start_date, self.end_date)
            .starting_after(self.trail.last().cloned())
    }

    /// Zero-based index of the current page.
    pub fn page_index(&self) -> usize {
        self.trail.len()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// A further page can only exist when `page` came back full.
    pub fn has_next(&self, page: &SessionPage) -> bool {
        page.sessions.len() == self.page_size && page.last_visible.is_some()
    }

    pub fn has_previous(&self) -> bool {
        !self.trail.is_empty()
    }

    /// Move past `page`. Returns false (and stays put) if there is no next page.
    pub fn next(&mut self, page: &SessionPage) -> bool {
        if !self.has_next(page) {
            return false;
        }
        match &page.last_visible {
            Some(cursor) => {
                self.trail.push(cursor.clone());
                true
            }
            None => false,
        }
    }

    pub fn previous(&mut self) -> bool {
        self.trail.pop().is_some()
    }

    /// Change the page size; restarts from the first page if it changed.
    pub fn set_page_size(&mut self, page_size: usize) {
        if page_size != self.page_size {
            self.page_size = page_size;
            self.trail.clear();
        }
    }

    /// Change the date filter; always restarts from the first page.
    pub fn set_date_range(
        &mut self,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) {
        self.start_date = start_date;
        self.end_date = end_date;
        self.trail.clear();
    }

    pub fn set_club(&mut self, club_id: impl Into<String>) {
        let club_id = club_id.into();
        if club_id != self.club_id {
            self.club_id = club_id;
            self.start_date = None;
            self.end_date = None;
            self.trail.clear();
        }
    }
}
