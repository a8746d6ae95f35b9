//! Request payloads and the membership rules applied to them.

use cl_01_store::Mutation;
use serde::{Deserialize, Serialize};
use shared_types::{Group, PlatformError, PlatformResult, User, UserId};

/// New account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub college: String,
    pub department: String,
    pub year: Option<u8>,
}

impl Registration {
    /// Trimmed, lowercased form. Rejects blank required fields.
    pub fn normalized(self) -> PlatformResult<Self> {
        let name = self.name.trim().to_string();
        let email = self.email.trim().to_lowercase();
        let college = self.college.trim().to_string();
        if name.is_empty() {
            return Err(PlatformError::bad_request("name is required"));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(PlatformError::bad_request("a valid email is required"));
        }
        if college.is_empty() {
            return Err(PlatformError::bad_request("college is required"));
        }
        Ok(Self {
            name,
            email,
            college,
            department: self.department.trim().to_string(),
            year: self.year,
        })
    }
}

/// Partial profile edit; `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub college: Option<String>,
    pub department: Option<String>,
    pub year: Option<u8>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
}

impl ProfileUpdate {
    /// Apply to `user`, reporting whether anything changed.
    pub fn apply(&self, user: &mut User) -> Mutation {
        let mut changed = false;
        if let Some(name) = &self.name {
            changed |= replace(&mut user.name, name.trim().to_string());
        }
        if let Some(college) = &self.college {
            changed |= replace(&mut user.college, college.trim().to_string());
        }
        if let Some(department) = &self.department {
            changed |= replace(&mut user.department, department.trim().to_string());
        }
        if let Some(year) = self.year {
            changed |= replace(&mut user.year, Some(year));
        }
        if let Some(bio) = &self.bio {
            changed |= replace(&mut user.bio, bio.clone());
        }
        if let Some(skills) = &self.skills {
            changed |= replace(&mut user.skills, skills.clone());
        }
        if changed {
            Mutation::Changed
        } else {
            Mutation::Unchanged
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// New group request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub creator: UserId,
    pub allowed_emails: Vec<String>,
    pub is_private: bool,
}

impl NewGroup {
    pub fn validate(&self) -> PlatformResult<()> {
        if self.name.trim().is_empty() {
            return Err(PlatformError::bad_request("group name is required"));
        }
        Ok(())
    }
}

/// Whether `user` may join `group` with the offered invite code.
///
/// Checked in order: existing membership, invite code (private groups only),
/// email allowlist.
pub fn check_join(group: &Group, user: &User, invite_code: Option<&str>) -> PlatformResult<()> {
    if group.has_member(&user.id) {
        return Err(PlatformError::bad_request("Already a member of this group"));
    }
    if group.is_private && invite_code != Some(group.invite_code.as_str()) {
        return Err(PlatformError::bad_request("Invalid invite code"));
    }
    if !group.admits_email(&user.email) {
        return Err(PlatformError::bad_request(
            "Your email is not allowed to join this group",
        ));
    }
    Ok(())
}

/// Whether `user` may leave `group`. The creator has to delete it instead.
pub fn check_leave(group: &Group, user: &UserId) -> PlatformResult<()> {
    if &group.creator == user {
        return Err(PlatformError::bad_request(
            "Creator cannot leave the group. Delete it instead.",
        ));
    }
    if !group.has_member(user) {
        return Err(PlatformError::bad_request("Not a member of this group"));
    }
    Ok(())
}
