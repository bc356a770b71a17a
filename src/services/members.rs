//! Club members joined with their user profile and membership history.

use std::sync::Arc;

use super::join::{subscribe_joined, JoinRow, JoinedCallback, Link, LinkKey, Resolved, SharedSource};
use crate::db::{collections, DocumentRef, ErrorCallback, FieldValue, FilterOp, Query, Subscription};
use crate::error::AppError;
use crate::models::{ClubMember, ExtendedClubMember, User, UserMembership};

const USER: LinkKey = "user";
const MEMBERSHIPS: LinkKey = "memberships";

/// Members of `club_id` enrolled in class `class_id`.
pub fn members_query(club_id: &str, class_id: &str) -> Query {
    let club = DocumentRef::root(collections::CLUBS, club_id);
    Query::collection(club.collection(collections::MEMBERS)).filter(
        "classes",
        FilterOp::ArrayContains,
        FieldValue::Reference(club.child(collections::CLASSES, class_id)),
    )
}

/// Memberships `user` bought at `club`.
pub fn user_memberships_query(user: &DocumentRef, club: &DocumentRef) -> Query {
    Query::collection(user.collection(collections::USER_MEMBERSHIPS)).filter(
        "club",
        FilterOp::Equal,
        FieldValue::Reference(club.clone()),
    )
}

impl JoinRow for ExtendedClubMember {
    type Base = ClubMember;
    /// The club whose memberships count
    type Context = DocumentRef;

    fn from_base(base: ClubMember) -> Self {
        base.into()
    }

    fn links(&self, _club: &DocumentRef) -> Vec<Link> {
        vec![Link::document(USER, self.base.user.clone())]
    }

    fn resolve(
        &mut self,
        key: LinkKey,
        resolved: Resolved,
        club: &DocumentRef,
    ) -> Result<Vec<Link>, AppError> {
        match key {
            USER => {
                let user: User = resolved.entity(self.base.user.path())?;
                self.user_data = Some(user);
                Ok(vec![Link::query(
                    MEMBERSHIPS,
                    user_memberships_query(&self.base.user, club),
                )])
            }
            MEMBERSHIPS => {
                let mut memberships: Vec<UserMembership> = resolved.entities()?;
                // Newest first; undated memberships sort last.
                memberships.sort_by(|a, b| b.effective_start().cmp(&a.effective_start()));
                let mut memberships = memberships.into_iter();
                self.user_membership_data = memberships.next();
                self.membership_history = Some(memberships.collect());
                Ok(Vec::new())
            }
            other => Err(AppError::InvalidQuery(format!("unknown member link {other}"))),
        }
    }
}

/// Live members of a class with their user and memberships resolved.
pub fn subscribe_to_members_for_class(
    source: SharedSource,
    club_id: &str,
    class_id: &str,
    on_data: Arc<dyn Fn(Vec<ExtendedClubMember>) + Send + Sync>,
    on_error: ErrorCallback,
) -> Subscription {
    let on_rows: JoinedCallback<ExtendedClubMember> = Arc::new(move |snapshot| on_data(snapshot.rows));
    subscribe_joined(
        "members",
        source,
        members_query(club_id, class_id),
        DocumentRef::root(collections::CLUBS, club_id),
        on_rows,
        on_error,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Fields, RawDocument};
    use chrono::{TimeZone, Utc};

    fn member() -> ExtendedClubMember {
        ClubMember {
            id: "m1".into(),
            user: DocumentRef::root("users", "u1"),
            classes: vec![],
            created: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
        .into()
    }

    fn membership(id: &str, month: u32) -> RawDocument {
        let mut f = Fields::new();
        f.insert(
            "startDate".into(),
            FieldValue::from(Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap()),
        );
        f.insert("club".into(), FieldValue::from(DocumentRef::root("clubs", "c1")));
        RawDocument::new(DocumentRef::parse(&format!("users/u1/memberships/{id}")).unwrap(), f)
    }

    #[test]
    fn test_members_query_matches_class_reference() {
        let query = members_query("c1", "k1");
        assert_eq!(query.collection, "clubs/c1/members");
        assert_eq!(query.filters[0].op, FilterOp::ArrayContains);
        assert_eq!(
            query.filters[0].value,
            FieldValue::Reference(DocumentRef::parse("clubs/c1/classes/k1").unwrap())
        );
    }

    #[test]
    fn test_newest_membership_is_current() {
        let club = DocumentRef::root("clubs", "c1");
        let mut row = member();
        let links = row
            .resolve(
                MEMBERSHIPS,
                Resolved::Query(vec![membership("a", 1), membership("c", 3), membership("b", 2)]),
                &club,
            )
            .unwrap();

        assert!(links.is_empty());
        assert_eq!(row.user_membership_data.as_ref().unwrap().id, "c");
        let history: Vec<_> = row
            .membership_history
            .as_ref()
            .unwrap()
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(history, vec!["b", "a"]);
    }

    #[test]
    fn test_missing_user_leaves_row_untouched() {
        let club = DocumentRef::root("clubs", "c1");
        let mut row = member();
        let err = row.resolve(USER, Resolved::Document(None), &club).unwrap_err();

        assert_eq!(err, AppError::NotFound("users/u1".into()));
        assert_eq!(row, member());
    }
}
