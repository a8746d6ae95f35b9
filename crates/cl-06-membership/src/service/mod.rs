//! Membership services.
//!
//! - `users`: registration and profiles
//! - `groups`: group create / join / leave / delete

pub mod groups;
pub mod users;

pub use groups::{GroupDirectory, INVITE_CODE_ATTEMPTS};
pub use users::UserDirectory;
