//! Dashboard user profile.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use super::mapper::{FieldReader, FromDocument};

/// Dance level a user describes themselves with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserLevel {
    Beginner,
    Intermediate,
    Advanced,
    Pro,
}

impl FromStr for UserLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(UserLevel::Beginner),
            "intermediate" => Ok(UserLevel::Intermediate),
            "advanced" => Ok(UserLevel::Advanced),
            "pro" => Ok(UserLevel::Pro),
            _ => Err(()),
        }
    }
}

/// User profile stored in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Document ID
    pub id: String,
    /// Display name
    #[validate(length(min = 1))]
    pub name: String,
    /// Address shown to club admins
    #[validate(email)]
    pub contact_email: String,
    /// Sign-in email (may be None if not shared)
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub description: Option<String>,
    /// Profile picture URL
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub level: Option<UserLevel>,
}

impl FromDocument for User {
    const ENTITY: &'static str = "User";

    fn read(r: &mut FieldReader<'_>) -> Option<Self> {
        let name = r.string("name");
        let contact_email = r.string("contactEmail");
        let email = r.opt_string("email");
        let nickname = r.opt_string("nickname");
        let description = r.opt_string("description");
        let photo_url = r.opt_string("photoURL");
        let level = r.opt_parse("level", "beginner|intermediate|advanced|pro");

        Some(Self {
            id: r.id(),
            name: name?,
            contact_email: contact_email?,
            email,
            nickname,
            description,
            photo_url,
            level,
        })
    }
}

impl User {
    /// Name to show in lists: nickname if set, otherwise the full name.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.name)
    }
}
