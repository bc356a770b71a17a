//! Club members and the joined view assembled for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::mapper::{FieldReader, FromDocument};
use super::membership::UserMembership;
use super::user::User;
use crate::db::DocumentRef;

/// Member document (`clubs/{id}/members`) holding references only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClubMember {
    pub id: String,
    pub user: DocumentRef,
    /// Classes the member is enrolled in
    pub classes: Vec<DocumentRef>,
    pub created: DateTime<Utc>,
}

impl FromDocument for ClubMember {
    const ENTITY: &'static str = "ClubMember";

    fn read(r: &mut FieldReader<'_>) -> Option<Self> {
        let user = r.reference("user");
        let classes = r.reference_array("classes");
        let created = r.timestamp("created");

        Some(Self {
            id: r.id(),
            user: user?,
            classes: classes?,
            created: created?,
        })
    }
}

/// Member plus resolved references. `None` means "not loaded yet".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedClubMember {
    #[serde(flatten)]
    pub base: ClubMember,
    pub user_data: Option<User>,
    /// Most recent membership the user bought at this club
    pub user_membership_data: Option<UserMembership>,
    /// Older memberships at this club, newest first
    pub membership_history: Option<Vec<UserMembership>>,
}

impl From<ClubMember> for ExtendedClubMember {
    fn from(base: ClubMember) -> Self {
        Self {
            base,
            user_data: None,
            user_membership_data: None,
            membership_history: None,
        }
    }
}
