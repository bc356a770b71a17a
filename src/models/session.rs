// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session (check-in) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::mapper::{FieldReader, FromDocument};
use super::membership::{ClubMembership, UserMembership};
use super::user::User;
use crate::db::{Cursor, DocumentRef};

/// A single check-in (`clubs/{id}/sessions`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClubSession {
    pub id: String,
    /// Check-in time
    pub date: DateTime<Utc>,
    pub user: DocumentRef,
    /// The user membership the session was charged to
    pub membership: DocumentRef,
}

impl FromDocument for ClubSession {
    const ENTITY: &'static str = "ClubSession";

    fn read(r: &mut FieldReader<'_>) -> Option<Self> {
        let date = r.timestamp("date");
        let user = r.reference("user");
        let membership = r.reference("membership");

        Some(Self {
            id: r.id(),
            date: date?,
            user: user?,
            membership: membership?,
        })
    }
}

/// Session plus resolved user, user membership and (through the latter) plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedClubSession {
    #[serde(flatten)]
    pub base: ClubSession,
    pub user_data: Option<User>,
    pub user_membership_data: Option<UserMembership>,
    pub club_membership_data: Option<ClubMembership>,
}

impl From<ClubSession> for ExtendedClubSession {
    fn from(base: ClubSession) -> Self {
        Self {
            base,
            user_data: None,
            user_membership_data: None,
            club_membership_data: None,
        }
    }
}

impl ExtendedClubSession {
    /// Whether the membership used for this check-in is still valid.
    /// `None` until the membership has loaded, or if it has no expiration.
    pub fn membership_active(&self, now: DateTime<Utc>) -> Option<bool> {
        self.user_membership_data.as_ref()?.is_active(now)
    }
}

/// One page of sessions plus the cursor for the next page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionPage {
    pub sessions: Vec<ExtendedClubSession>,
    /// Last raw document of this page; `None` when the page is empty
    pub last_visible: Option<Cursor>,
}
