//! Club teachers.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::mapper::{FieldReader, FromDocument};
use super::user::User;
use crate::db::DocumentRef;

/// Teacher document (`clubs/{id}/teachers`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClubTeacher {
    pub id: String,
    pub user: DocumentRef,
    pub classes: Vec<DocumentRef>,
}

impl FromDocument for ClubTeacher {
    const ENTITY: &'static str = "ClubTeacher";

    fn read(r: &mut FieldReader<'_>) -> Option<Self> {
        let user = r.reference("user");
        let classes = r.reference_array("classes");

        Some(Self {
            id: r.id(),
            user: user?,
            classes: classes?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedClubTeacher {
    #[serde(flatten)]
    pub base: ClubTeacher,
    pub user_data: Option<User>,
}

impl From<ClubTeacher> for ExtendedClubTeacher {
    fn from(base: ClubTeacher) -> Self {
        Self {
            base,
            user_data: None,
        }
    }
}
