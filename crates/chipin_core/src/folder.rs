//! Folder-service collaborator boundary.
//!
//! The external storage service owns folders, files, and their ACL entries.
//! The engine talks to it through [`FolderApi`], always under an explicit
//! [`Session`] obtained from a [`SessionProvider`] at call time. There is no
//! hidden process-wide signed-in account, and the engine never initiates an
//! auth flow of its own.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::{FileId, FolderId};

/// An already-authenticated session with the folder service.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The acting account's email address
    pub account_email: String,
    /// Opaque bearer credential for the service
    pub access_token: String,
}

/// Source of the current session. Implementations re-read whatever the
/// application's auth layer currently holds, so a mid-session
/// re-authentication is picked up on the next call without a restart.
pub trait SessionProvider: Send + Sync + Debug {
    fn current_session(&self) -> Option<Session>;
}

/// Role granted to a folder principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderRole {
    Reader,
    Writer,
}

impl Default for FolderRole {
    fn default() -> Self {
        FolderRole::Writer
    }
}

/// Errors surfaced by the folder-service collaborator.
///
/// `AlreadyGranted` and `GranteeNotFound` exist so the raw API can report
/// exact service behavior; the [`crate::acl::FolderClient`] normalizes both
/// to success per the idempotence contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AclError {
    #[error("no authenticated session")]
    NotAuthenticated,

    #[error("{email} already has access")]
    AlreadyGranted { email: String },

    #[error("{email} has no grant to revoke")]
    GranteeNotFound { email: String },

    #[error("no such resource: {0}")]
    NotFound(String),

    #[error("folder service transport failure: {0}")]
    Transport(String),
}

/// Raw surface of the external folder service.
#[async_trait]
pub trait FolderApi: Send + Sync + Debug {
    /// Create a folder; returns the service-assigned id.
    async fn create_folder(&self, session: &Session, name: &str) -> Result<FolderId, AclError>;

    /// Delete a folder and everything in it.
    async fn delete_folder(&self, session: &Session, folder: &FolderId) -> Result<(), AclError>;

    /// Upload a file into a folder; returns the service-assigned id.
    async fn upload_file(
        &self,
        session: &Session,
        folder: &FolderId,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<FileId, AclError>;

    /// Delete a single file.
    async fn delete_file(&self, session: &Session, file: &FileId) -> Result<(), AclError>;

    /// Shareable URL for a file.
    async fn file_url(&self, session: &Session, file: &FileId) -> Result<String, AclError>;

    /// Grant `email` access to a folder with the given role.
    async fn grant_access(
        &self,
        session: &Session,
        folder: &FolderId,
        email: &str,
        role: FolderRole,
    ) -> Result<(), AclError>;

    /// Revoke `email`'s access to a folder.
    async fn revoke_access(
        &self,
        session: &Session,
        folder: &FolderId,
        email: &str,
    ) -> Result<(), AclError>;
}
