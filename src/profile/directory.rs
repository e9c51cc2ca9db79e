//! In-memory view of all profiles plus the current-user pointer

use super::model::UserProfile;

/// Loaded profile directory
///
/// Each store operation loads one of these, mutates it, and writes it back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directory {
    /// All profiles, in creation order
    pub users: Vec<UserProfile>,
    /// ID of the active profile, which may be stale
    pub current_user_id: Option<String>,
}

impl Directory {
    pub fn new(users: Vec<UserProfile>, current_user_id: Option<String>) -> Self {
        Self { users, current_user_id }
    }

    /// Find a profile by ID
    pub fn find(&self, id: &str) -> Option<&UserProfile> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Find a mutable profile by ID
    pub fn find_mut(&mut self, id: &str) -> Option<&mut UserProfile> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    /// Find a profile by username, ignoring case
    pub fn find_by_username(&self, username: &str) -> Option<&UserProfile> {
        let wanted = username.to_lowercase();
        self.users.iter().find(|u| u.username.to_lowercase() == wanted)
    }

    /// True if some profile other than `except_id` uses `username`
    pub fn username_taken(&self, username: &str, except_id: Option<&str>) -> bool {
        self.find_by_username(username).is_some_and(|u| Some(u.id.as_str()) != except_id)
    }

    /// The profile the pointer refers to, if it still exists
    pub fn current(&self) -> Option<&UserProfile> {
        self.current_user_id.as_deref().and_then(|id| self.find(id))
    }

    /// Replace the profile with the same ID, or append it
    pub fn upsert(&mut self, user: UserProfile) {
        if let Some(existing) = self.find_mut(&user.id) {
            *existing = user;
        } else {
            self.users.push(user);
        }
    }

    /// Remove a profile by ID, clearing the pointer if it was current
    pub fn remove(&mut self, id: &str) -> bool {
        let len_before = self.users.len();
        self.users.retain(|u| u.id != id);
        if self.current_user_id.as_deref() == Some(id) {
            self.current_user_id = None;
        }
        self.users.len() < len_before
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
