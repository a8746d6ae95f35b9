//! # Membership (cl-06)
//!
//! Users and groups outside of scoring.
//!
//! ```text
//!   register / update_profile ──► UserDirectory ──► UserReader (cache + guard)
//!
//!   create / join / leave / delete ──► GroupDirectory
//!        1. edit Group.members   (version-checked)
//!        2. edit User.groups     (version-checked)
//!        2 fails ──► revert 1, return the error
//! ```
//!
//! `User.groups` is what contest eligibility reads, so it is never left
//! claiming a membership the group does not list.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    check_join, check_leave, generate_invite_code, NewGroup, ProfileUpdate, Registration,
    INVITE_CODE_LEN,
};
pub use ports::{GroupApi, UserApi};
pub use service::{GroupDirectory, UserDirectory, INVITE_CODE_ATTEMPTS};
