//! Resource ACL client: the engine's view of the folder service.
//!
//! [`FolderClient`] is a stateless wrapper over the raw [`FolderApi`]. Every
//! call re-derives the acting identity from the [`SessionProvider`] rather
//! than caching a credential, and the idempotence contract is normalized
//! here: granting to an existing grantee and revoking an absent one are both
//! success, as is deleting a resource that is already gone. Callers can
//! therefore retry any single call blindly.

use std::sync::Arc;

use tracing::debug;

use crate::folder::{AclError, FolderApi, FolderRole, Session, SessionProvider};
use crate::id::{FileId, FolderId};

#[derive(Clone)]
pub struct FolderClient {
    api: Arc<dyn FolderApi>,
    sessions: Arc<dyn SessionProvider>,
}

impl std::fmt::Debug for FolderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderClient").finish()
    }
}

impl FolderClient {
    pub fn new(api: Arc<dyn FolderApi>, sessions: Arc<dyn SessionProvider>) -> Self {
        Self { api, sessions }
    }

    fn session(&self) -> Result<Session, AclError> {
        self.sessions
            .current_session()
            .ok_or(AclError::NotAuthenticated)
    }

    pub async fn create_folder(&self, name: &str) -> Result<FolderId, AclError> {
        let session = self.session()?;
        let folder = self.api.create_folder(&session, name).await?;
        debug!(folder = %folder, name, "created shared folder");
        Ok(folder)
    }

    /// Delete a folder. Deleting one that no longer exists is success.
    pub async fn delete_folder(&self, folder: &FolderId) -> Result<(), AclError> {
        let session = self.session()?;
        match self.api.delete_folder(&session, folder).await {
            Err(AclError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    pub async fn upload_file(
        &self,
        folder: &FolderId,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<FileId, AclError> {
        let session = self.session()?;
        self.api.upload_file(&session, folder, name, bytes).await
    }

    /// Delete a file. Deleting one that no longer exists is success.
    pub async fn delete_file(&self, file: &FileId) -> Result<(), AclError> {
        let session = self.session()?;
        match self.api.delete_file(&session, file).await {
            Err(AclError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    pub async fn file_url(&self, file: &FileId) -> Result<String, AclError> {
        let session = self.session()?;
        self.api.file_url(&session, file).await
    }

    /// Grant `email` access. Granting to an existing grantee is success.
    pub async fn grant_access(
        &self,
        folder: &FolderId,
        email: &str,
        role: FolderRole,
    ) -> Result<(), AclError> {
        let session = self.session()?;
        match self.api.grant_access(&session, folder, email, role).await {
            Err(AclError::AlreadyGranted { email }) => {
                debug!(folder = %folder, email, "grant already present");
                Ok(())
            }
            other => other,
        }
    }

    /// Revoke `email`'s access. Revoking an absent grantee is success.
    pub async fn revoke_access(&self, folder: &FolderId, email: &str) -> Result<(), AclError> {
        let session = self.session()?;
        match self.api.revoke_access(&session, folder, email).await {
            Err(AclError::GranteeNotFound { email }) => {
                debug!(folder = %folder, email, "no grant to revoke");
                Ok(())
            }
            other => other,
        }
    }
}
