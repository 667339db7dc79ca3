//! User-directory collaborator boundary.
//!
//! Resolves email addresses to user ids and hydrates user records by id.
//! A user only appears here after signing in at least once, which is why
//! member addition by email can legitimately miss.

use async_trait::async_trait;
use thiserror::Error;

use crate::id::UserId;
use crate::types::User;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectoryError {
    #[error("user directory transport failure: {0}")]
    Transport(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve an email to a user id; `None` when no such user has signed
    /// in yet.
    async fn resolve(&self, email: &str) -> Result<Option<UserId>, DirectoryError>;

    /// Batch-resolve user records by id. Unknown ids are silently omitted
    /// from the result.
    async fn lookup(&self, ids: &[UserId]) -> Result<Vec<User>, DirectoryError>;
}
