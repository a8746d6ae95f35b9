//! Membership domain: registration, profile edits and join rules.

pub mod invite;
pub mod rules;

pub use invite::{generate_invite_code, INVITE_CODE_LEN};
pub use rules::{check_join, check_leave, NewGroup, ProfileUpdate, Registration};
