//! Error types for profile management

use thiserror::Error;

/// Errors returned by [`UserStore`](super::UserStore) operations
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Another profile already uses this name (compared ignoring case)
    #[error("Username '{0}' is already taken")]
    DuplicateUsername(String),

    /// Username was empty or whitespace
    #[error("Username cannot be empty")]
    EmptyUsername,

    /// No profile with this ID exists
    #[error("User '{0}' not found")]
    UserNotFound(String),

    /// Import payload is not a usable profile export
    #[error("Invalid import file: {0}")]
    InvalidImport(String),
}

impl ProfileError {
    /// Check if this error is caused by user input and should be shown to them
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ProfileError::DuplicateUsername(_)
                | ProfileError::EmptyUsername
                | ProfileError::InvalidImport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = ProfileError::DuplicateUsername("bob".into());
        assert_eq!(err.to_string(), "Username 'bob' is already taken");
    }

    #[test]
    fn not_found_is_not_user_facing() {
        assert!(!ProfileError::UserNotFound("x".into()).is_user_facing());
        assert!(ProfileError::EmptyUsername.is_user_facing());
    }
}
