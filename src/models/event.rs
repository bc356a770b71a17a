//! Club events (top-level `events` collection).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::mapper::{FieldReader, FromDocument};
use crate::db::{DocumentRef, GeoPoint};

/// One-off event organised by a club.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClubEvent {
    pub id: String,
    #[validate(length(min = 1))]
    pub name: String,
    /// Back-reference to the owning club document
    pub club: DocumentRef,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub address: String,
    pub location: Option<String>,
    pub description: String,
    #[serde(rename = "backgroundURL")]
    pub background_url: Option<String>,
    pub max_participants: i64,
    pub allow_registration: bool,
    pub admins: Vec<String>,
    pub coordinates: Option<GeoPoint>,
}

impl FromDocument for ClubEvent {
    const ENTITY: &'static str = "ClubEvent";

    fn read(r: &mut FieldReader<'_>) -> Option<Self> {
        let name = r.string("name");
        let club = r.reference("club");
        let start_date = r.timestamp("startDate");
        let end_date = r.timestamp("endDate");
        let address = r.string("address");
        let location = r.opt_string("location");
        let description = r.string("description");
        let background_url = r.opt_string("backgroundURL");
        let max_participants = r.lenient_integer("maxParticipants");
        let allow_registration = r.bool("allowRegistration");
        let admins = r.string_array("admins");
        let coordinates = r.opt_geopoint("coordinates");

        Some(Self {
            id: r.id(),
            name: name?,
            club: club?,
            start_date: start_date?,
            end_date: end_date?,
            address: address?,
            location,
            description: description?,
            background_url,
            max_participants: max_participants?,
            allow_registration: allow_registration?,
            admins: admins?,
            coordinates,
        })
    }
}

impl ClubEvent {
    /// Whether the event overlaps the half-open interval `[from, to)`.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start_date < to && self.end_date >= from
    }
}
