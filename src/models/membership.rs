//! Membership plans offered by a club and memberships purchased by users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use super::mapper::{FieldReader, FromDocument};
use crate::db::DocumentRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    Children,
    Adults,
    Seniors,
}

impl FromStr for AgeGroup {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "children" => Ok(AgeGroup::Children),
            "adults" => Ok(AgeGroup::Adults),
            "seniors" => Ok(AgeGroup::Seniors),
            _ => Err(()),
        }
    }
}

/// Category a plan or class belongs to (embedded map, not a document).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClubCategory {
    pub id: String,
    pub name: String,
    pub age_group: AgeGroup,
}

impl ClubCategory {
    pub(crate) fn read_embedded(r: &mut FieldReader<'_>) -> Option<Self> {
        let id = r.string("id");
        let name = r.string("name");
        let age_group = r.parse("ageGroup", "children|adults|seniors");
        Some(Self {
            id: id?,
            name: name?,
            age_group: age_group?,
        })
    }
}

/// Membership plan ("10 classes / month", "unlimited") offered by a club.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClubMembership {
    pub id: String,
    pub name: String,
    /// Sessions included in the plan
    #[validate(range(min = 0))]
    pub classes_no: i64,
    pub unlimited_classes: Option<bool>,
    #[validate(range(min = 0.0))]
    pub price: f64,
    pub price_extra_session: Option<f64>,
    pub order_no: i64,
    /// Validity in days
    #[validate(range(min = 0))]
    pub duration: i64,
    pub loyalty_discount: Option<f64>,
    pub category: ClubCategory,
}

impl FromDocument for ClubMembership {
    const ENTITY: &'static str = "ClubMembership";

    fn read(r: &mut FieldReader<'_>) -> Option<Self> {
        let name = r.string("name");
        let classes_no = r.integer("classesNo");
        let unlimited_classes = r.opt_bool("unlimitedClasses");
        let price = r.number("price");
        let price_extra_session = r.opt_number("priceExtraSession");
        let order_no = r.integer("orderNo");
        let duration = r.integer("duration");
        let loyalty_discount = r.opt_number("loyaltyDiscount");
        let category = r.nested("category", ClubCategory::read_embedded);

        Some(Self {
            id: r.id(),
            name: name?,
            classes_no: classes_no?,
            unlimited_classes,
            price: price?,
            price_extra_session,
            order_no: order_no?,
            duration: duration?,
            loyalty_discount,
            category: category?,
        })
    }
}

impl ClubMembership {
    pub fn is_unlimited(&self) -> bool {
        self.unlimited_classes.unwrap_or(false)
    }
}

/// A membership purchased by a user, stored under `users/{uid}/memberships`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserMembership {
    pub id: String,
    #[validate(range(min = 0.0))]
    pub amount_received: Option<f64>,
    pub expiration: Option<DateTime<Utc>>,
    pub purchased: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    /// Club the membership was bought at
    pub club: Option<DocumentRef>,
    /// Plan that was bought
    pub membership: Option<DocumentRef>,
}

impl FromDocument for UserMembership {
    const ENTITY: &'static str = "UserMembership";

    fn read(r: &mut FieldReader<'_>) -> Option<Self> {
        Some(Self {
            id: r.id(),
            amount_received: r.opt_number("amountReceived"),
            expiration: r.opt_timestamp("expiration"),
            purchased: r.opt_timestamp("purchased"),
            start_date: r.opt_timestamp("startDate"),
            club: r.opt_reference("club"),
            membership: r.opt_reference("membership"),
        })
    }
}

impl UserMembership {
    /// Whether the membership is still valid at `now`. Unknown without an expiration.
    pub fn is_active(&self, now: DateTime<Utc>) -> Option<bool> {
        self.expiration.map(|exp| exp > now)
    }

    /// Instant used to order a user's memberships, newest first.
    pub fn effective_start(&self) -> Option<DateTime<Utc>> {
        self.start_date.or(self.purchased)
    }
}
