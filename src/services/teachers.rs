//! Club teachers joined with their user profile.

use std::sync::Arc;

use super::join::{subscribe_joined, JoinRow, JoinedCallback, Link, LinkKey, Resolved, SharedSource};
use crate::db::{collections, DocumentRef, ErrorCallback, FieldValue, FilterOp, Query, Subscription};
use crate::error::AppError;
use crate::models::{ClubTeacher, ExtendedClubTeacher};

const USER: LinkKey = "user";

/// Teachers of `club_id` assigned to class `class_id`.
pub fn teachers_query(club_id: &str, class_id: &str) -> Query {
    let club = DocumentRef::root(collections::CLUBS, club_id);
    Query::collection(club.collection(collections::TEACHERS)).filter(
        "classes",
        FilterOp::ArrayContains,
        FieldValue::Reference(club.child(collections::CLASSES, class_id)),
    )
}

impl JoinRow for ExtendedClubTeacher {
    type Base = ClubTeacher;
    type Context = ();

    fn from_base(base: ClubTeacher) -> Self {
        base.into()
    }

    fn links(&self, _: &()) -> Vec<Link> {
        vec![Link::document(USER, self.base.user.clone())]
    }

    fn resolve(&mut self, key: LinkKey, resolved: Resolved, _: &()) -> Result<Vec<Link>, AppError> {
        if key != USER {
            return Err(AppError::InvalidQuery(format!("unknown teacher link {key}")));
        }
        self.user_data = Some(resolved.entity(self.base.user.path())?);
        Ok(Vec::new())
    }
}

pub fn subscribe_to_teachers_for_class(
    source: SharedSource,
    club_id: &str,
    class_id: &str,
    on_data: Arc<dyn Fn(Vec<ExtendedClubTeacher>) + Send + Sync>,
    on_error: ErrorCallback,
) -> Subscription {
    let on_rows: JoinedCallback<ExtendedClubTeacher> =
        Arc::new(move |snapshot| on_data(snapshot.rows));
    subscribe_joined(
        "teachers",
        source,
        teachers_query(club_id, class_id),
        (),
        on_rows,
        on_error,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::members::members_query;

    #[test]
    fn test_teachers_query_mirrors_members_filter() {
        let teachers = teachers_query("c1", "k1");
        let members = members_query("c1", "k1");

        assert_eq!(teachers.collection, "clubs/c1/teachers");
        assert_eq!(teachers.filters, members.filters);
    }
}
