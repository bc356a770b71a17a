//! Club classes and their weekly schedule.

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use super::mapper::{FieldReader, FromDocument};
use super::membership::ClubCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassLevel {
    Beginner,
    Intermediate,
    Pro,
}

impl FromStr for ClassLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(ClassLevel::Beginner),
            "intermediate" => Ok(ClassLevel::Intermediate),
            "pro" => Ok(ClassLevel::Pro),
            _ => Err(()),
        }
    }
}

/// One weekly slot. `day` counts from Sunday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    #[validate(range(min = 0, max = 6))]
    pub day: u8,
    #[validate(range(min = 0, max = 23))]
    pub hour: u8,
    #[validate(range(min = 0, max = 59))]
    pub minute: u8,
}

impl ScheduleSlot {
    fn read_embedded(r: &mut FieldReader<'_>) -> Option<Self> {
        let day = r.integer("day");
        let hour = r.integer("hour");
        let minute = r.integer("minute");
        // Out-of-range values are caught by the range rules after clamping to u8.
        Some(Self {
            day: clamp_u8(day?),
            hour: clamp_u8(hour?),
            minute: clamp_u8(minute?),
        })
    }

    pub fn time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour.into(), self.minute.into(), 0)
    }
}

fn clamp_u8(v: i64) -> u8 {
    v.clamp(0, u8::MAX as i64) as u8
}

/// A recurring class (subcollection `clubs/{id}/classes`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClubClass {
    pub id: String,
    #[validate(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub level: ClassLevel,
    pub category: Option<ClubCategory>,
    /// Length of one class in minutes
    #[validate(range(min = 1))]
    pub duration: i64,
    /// Capacity
    #[validate(range(min = 0))]
    pub max_participants: i64,
    pub order_no: i64,
    #[validate(nested)]
    pub schedule: Vec<ScheduleSlot>,
}

impl FromDocument for ClubClass {
    const ENTITY: &'static str = "ClubClass";

    fn read(r: &mut FieldReader<'_>) -> Option<Self> {
        let name = r.string("name");
        let description = r.opt_string("description");
        let photo_url = r.opt_string("photoURL");
        let level = r.parse("level", "beginner|intermediate|pro");
        let category = r.opt_nested("category", ClubCategory::read_embedded);
        let duration = r.lenient_integer("duration");
        let max_participants = r.lenient_integer("maxParticipants");
        let order_no = r.lenient_integer("orderNo");
        let schedule = r.nested_array("schedule", ScheduleSlot::read_embedded);

        Some(Self {
            id: r.id(),
            name: name?,
            description,
            photo_url,
            level: level?,
            category,
            duration: duration?,
            max_participants: max_participants?,
            order_no: order_no?,
            schedule: schedule?,
        })
    }
}

impl ClubClass {
    /// Slots of this class that fall on `date`, in schedule order.
    pub fn slots_on(&self, date: NaiveDate) -> Vec<ScheduleSlot> {
        let weekday = date.weekday().num_days_from_sunday() as u8;
        self.schedule
            .iter()
            .filter(|slot| slot.day == weekday)
            .copied()
            .collect()
    }
}

/// Classes occurring on `date`, paired with their slot and ordered by start time.
pub fn classes_on(classes: &[ClubClass], date: NaiveDate) -> Vec<(&ClubClass, ScheduleSlot)> {
    let mut out: Vec<_> = classes
        .iter()
        .flat_map(|class| class.slots_on(date).into_iter().map(move |slot| (class, slot)))
        .collect();
    out.sort_by_key(|(class, slot)| (slot.hour, slot.minute, class.order_no));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DocumentRef, FieldValue, Fields, RawDocument};
    use crate::models::mapper::map_document;

    fn slot(day: i64, hour: i64, minute: i64) -> FieldValue {
        let mut f = Fields::new();
        f.insert("day".into(), FieldValue::Integer(day));
        f.insert("hour".into(), FieldValue::Integer(hour));
        f.insert("minute".into(), FieldValue::Integer(minute));
        FieldValue::Map(f)
    }

    fn class_doc(schedule: Vec<FieldValue>) -> RawDocument {
        let mut f = Fields::new();
        f.insert("name".into(), FieldValue::from("Bachata I"));
        f.insert("level".into(), FieldValue::from("beginner"));
        f.insert("duration".into(), FieldValue::from("60"));
        f.insert("maxParticipants".into(), FieldValue::Integer(20));
        f.insert("orderNo".into(), FieldValue::Integer(1));
        f.insert("schedule".into(), FieldValue::Array(schedule));
        RawDocument::new(DocumentRef::parse("clubs/c1/classes/k1").unwrap(), f)
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let class: ClubClass = map_document(&class_doc(vec![slot(1, 19, 30)])).unwrap();
        assert_eq!(class.duration, 60);
        assert_eq!(class.schedule[0].time(), NaiveTime::from_hms_opt(19, 30, 0));
    }

    #[test]
    fn test_schedule_ranges_validated() {
        let err = map_document::<ClubClass>(&class_doc(vec![slot(7, 25, 0)])).unwrap_err();
        assert!(err.has_violation("schedule[0].day"));
        assert!(err.has_violation("schedule[0].hour"));
    }

    #[test]
    fn test_classes_on_date() {
        let class: ClubClass =
            map_document(&class_doc(vec![slot(1, 20, 0), slot(3, 19, 0)])).unwrap();
        // 2024-03-04 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        let classes = [class];
        assert_eq!(classes_on(&classes, monday).len(), 1);
        assert!(classes_on(&classes, tuesday).is_empty());
    }
}
