//! Database layer: the live-query capability and its implementations.

pub mod firestore;
pub mod memory;
pub mod query;
pub mod source;
pub mod value;

pub use self::firestore::FirestoreDb;
pub use memory::MemoryDb;
pub use query::{Cursor, Direction, Filter, FilterOp, OrderBy, Query, DOCUMENT_KEY};
pub use source::{DocumentCallback, DocumentSource, ErrorCallback, QueryCallback, Subscription};
pub use value::{DocumentRef, FieldValue, Fields, GeoPoint, RawDocument};

/// Collection names as constants.
pub mod collections {
    pub const CLUBS: &str = "clubs";
    pub const USERS: &str = "users";
    /// Top-level; each event points back at its club.
    pub const EVENTS: &str = "events";
    /// Subcollections of a club document.
    pub const CLASSES: &str = "classes";
    pub const MEMBERS: &str = "members";
    pub const TEACHERS: &str = "teachers";
    pub const SESSIONS: &str = "sessions";
    /// Subcollection of a club holding membership plans.
    pub const MEMBERSHIPS: &str = "memberships";
    /// Subcollection of a user holding purchased memberships.
    pub const USER_MEMBERSHIPS: &str = "memberships";
}
