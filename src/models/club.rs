//! Club model: the root aggregate every other collection hangs off.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::mapper::{FieldReader, FromDocument};
use crate::db::{collections, DocumentRef, GeoPoint};

/// A dance club. Users only see clubs that list them in `admins`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: String,
    #[validate(length(min = 1))]
    pub name: String,
    pub city: String,
    pub address: String,
    /// User IDs allowed to administer the club
    pub admins: Vec<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "logoURL")]
    pub logo_url: Option<String>,
    #[serde(rename = "backgroundURL")]
    pub background_url: Option<String>,
    pub allow_registration: Option<bool>,
    pub coordinates: Option<GeoPoint>,
}

impl FromDocument for Club {
    const ENTITY: &'static str = "Club";

    fn read(r: &mut FieldReader<'_>) -> Option<Self> {
        let name = r.string("name");
        let city = r.string("city");
        let address = r.string("address");
        let admins = r.string_array("admins");
        let website = r.opt_string("website");
        let phone = r.opt_string("phone");
        let email = r.opt_string("email");
        let description = r.opt_string("description");
        let logo_url = r.opt_string("logoURL");
        let background_url = r.opt_string("backgroundURL");
        let allow_registration = r.opt_bool("allowRegistration");
        let coordinates = r.opt_geopoint("coordinates");

        Some(Self {
            id: r.id(),
            name: name?,
            city: city?,
            address: address?,
            admins: admins?,
            website,
            phone,
            email,
            description,
            logo_url,
            background_url,
            allow_registration,
            coordinates,
        })
    }
}

impl Club {
    pub fn reference(&self) -> DocumentRef {
        DocumentRef::root(collections::CLUBS, &self.id)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|a| a == user_id)
    }
}
