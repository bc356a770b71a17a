// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod class;
pub mod club;
pub mod event;
pub mod mapper;
pub mod member;
pub mod membership;
pub mod session;
pub mod teacher;
pub mod user;

pub use class::{classes_on, ClassLevel, ClubClass, ScheduleSlot};
pub use club::Club;
pub use event::ClubEvent;
pub use mapper::{map_document, FieldReader, FromDocument};
pub use member::{ClubMember, ExtendedClubMember};
pub use membership::{AgeGroup, ClubCategory, ClubMembership, UserMembership};
pub use session::{ClubSession, ExtendedClubSession, SessionPage};
pub use teacher::{ClubTeacher, ExtendedClubTeacher};
pub use user::{User, UserLevel};
