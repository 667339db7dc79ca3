//! Membership reconciler: drives the document store and the folder service
//! toward agreement.
//!
//! No shared transaction spans the two backends, so every lifecycle
//! operation is an ordered protocol: steps run in an order chosen so that a
//! failure leaves either nothing committed or an over-permissive (never
//! under-permissive) intermediate, plus one-shot best-effort compensation.
//! Every individual step is idempotent, so retrying a failed call converges
//! instead of double-applying. No step is retried internally; retries are
//! the caller's job.
//!
//! Commands and read state are decoupled: success here means "writes
//! accepted"; the projector converges the read view asynchronously.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::acl::FolderClient;
use crate::config::EngineConfig;
use crate::directory::UserDirectory;
use crate::document::DocumentStore;
use crate::error::{CoreError, Result};
use crate::folder::AclError;
use crate::id::{FileId, GroupId, UserId};
use crate::types::{
    Group, GroupCreation, GroupDetails, MemberFailure, MemberSubject, MembershipChange,
    MembershipChangeKind, NewGroup, ReconciliationOutcome, StepId,
};

pub struct Reconciler {
    docs: Arc<dyn DocumentStore>,
    folders: FolderClient,
    directory: Arc<dyn UserDirectory>,
    config: EngineConfig,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish()
    }
}

impl Reconciler {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        folders: FolderClient,
        directory: Arc<dyn UserDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            docs,
            folders,
            directory,
            config,
        }
    }

    /// Create a group with a provisioned shared folder and onboard the
    /// requested members.
    ///
    /// Protocol: (1) create the folder; on failure nothing was committed.
    /// (2) persist the group document with the folder attached; on failure
    /// the folder is deleted again. (3) onboard each requested member
    /// concurrently and independently. Per-member failures never roll back
    /// (1)–(2): a smaller group is a valid terminal state, and the report
    /// tells the caller exactly which members to retry.
    pub async fn create_group(
        &self,
        name: &str,
        description: &str,
        icon: Option<String>,
        creator: UserId,
        member_emails: &[String],
    ) -> Result<GroupCreation> {
        let folder = self
            .folders
            .create_folder(&self.config.folder_name(name))
            .await
            .map_err(|e| match e {
                AclError::NotAuthenticated => CoreError::NotAuthenticated {
                    service: "folder service".to_string(),
                },
                other => CoreError::ResourceProvisioningFailed {
                    group_name: name.to_string(),
                    cause: other.to_string(),
                },
            })?;

        let new_group = NewGroup {
            name: name.to_string(),
            description: description.to_string(),
            icon,
            resource_folder_id: Some(folder.clone()),
            members: vec![creator.clone()],
            created_by: creator,
        };
        let group = match self.docs.create_group(new_group).await {
            Ok(group) => group,
            Err(e) => {
                warn!(group_name = name, error = %e, "group persist failed; deleting provisioned folder");
                if let Err(revert) = self.folders.delete_folder(&folder).await {
                    warn!(folder = %folder, error = %revert, "compensating folder delete failed; orphan folder remains");
                }
                return Err(CoreError::GroupPersistFailed {
                    group_name: name.to_string(),
                    cause: e.to_string(),
                });
            }
        };

        let onboardings = member_emails
            .iter()
            .map(|email| self.onboard_member(&group.id, email));
        let mut onboarded = Vec::new();
        let mut failures = Vec::new();
        for result in join_all(onboardings).await {
            match result {
                Ok(user_id) => onboarded.push(user_id),
                Err(failure) => failures.push(failure),
            }
        }

        info!(
            group = %group.id,
            onboarded = onboarded.len(),
            failed = failures.len(),
            "group created"
        );

        // Best-effort refresh so the report reflects the post-fan-out member
        // set; the snapshot feed is the authoritative read path regardless.
        let group = match self.docs.get_group(&group.id).await {
            Ok(Some(refreshed)) => refreshed,
            _ => group,
        };

        Ok(GroupCreation {
            group,
            onboarded,
            failures,
        })
    }

    /// Onboard one member during group creation: resolve the email, then
    /// grant folder access and add membership concurrently. The two halves
    /// are independent; a half-onboarded member is reported as failed and is
    /// safe to retry through `add_member`.
    async fn onboard_member(
        &self,
        group_id: &GroupId,
        email: &str,
    ) -> std::result::Result<UserId, MemberFailure> {
        let user_id = match self.directory.resolve(email).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Err(MemberFailure {
                    email: email.to_string(),
                    step: StepId::DirectoryResolve,
                    reason: CoreError::user_not_found(email).to_string(),
                });
            }
            Err(e) => {
                return Err(MemberFailure {
                    email: email.to_string(),
                    step: StepId::DirectoryResolve,
                    reason: e.to_string(),
                });
            }
        };

        let group = match self.docs.get_group(group_id).await {
            Ok(Some(group)) => group,
            _ => {
                return Err(MemberFailure {
                    email: email.to_string(),
                    step: StepId::MembershipAdd,
                    reason: "group disappeared during onboarding".to_string(),
                });
            }
        };

        let grant = async {
            match &group.resource_folder_id {
                Some(folder) => {
                    self.folders
                        .grant_access(folder, email, self.config.member_role)
                        .await
                }
                None => Ok(()),
            }
        };
        let add = self.docs.add_group_member(group_id, &user_id);
        let (grant, add) = futures::join!(grant, add);

        match (grant, add) {
            (Ok(()), Ok(())) => Ok(user_id),
            (Err(e), _) => Err(MemberFailure {
                email: email.to_string(),
                step: StepId::AclGrant,
                reason: e.to_string(),
            }),
            (_, Err(e)) => Err(MemberFailure {
                email: email.to_string(),
                step: StepId::MembershipAdd,
                reason: e.to_string(),
            }),
        }
    }

    /// Apply one membership command. Additions arrive with an email (the
    /// subject may not have resolved to a user yet); removals usually carry
    /// an already-known id. The other two pairings are bridged through the
    /// directory.
    pub async fn apply_change(&self, change: MembershipChange) -> Result<()> {
        match (change.kind, change.subject) {
            (MembershipChangeKind::Add, MemberSubject::Email(email)) => {
                self.add_member(&change.group_id, &email).await
            }
            (MembershipChangeKind::Add, MemberSubject::Id(user)) => {
                let email = self
                    .directory
                    .lookup(std::slice::from_ref(&user))
                    .await
                    .map_err(|e| CoreError::transport("apply_change", e))?
                    .into_iter()
                    .next()
                    .map(|u| u.email)
                    .ok_or_else(|| CoreError::user_not_found(user.to_string()))?;
                self.add_member(&change.group_id, &email).await
            }
            (MembershipChangeKind::Remove, MemberSubject::Id(user)) => {
                self.remove_member(&change.group_id, &user).await
            }
            (MembershipChangeKind::Remove, MemberSubject::Email(email)) => {
                let user = self
                    .directory
                    .resolve(&email)
                    .await
                    .map_err(|e| CoreError::transport("apply_change", e))?
                    .ok_or_else(|| CoreError::user_not_found(&email))?;
                self.remove_member(&change.group_id, &user).await
            }
        }
    }

    /// Add a member to an existing group by email.
    ///
    /// Grant folder access before touching membership: a failed grant
    /// commits nothing, while a grant followed by a failed membership write
    /// merely over-permits, which the compensation below tries to undo.
    pub async fn add_member(&self, group_id: &GroupId, email: &str) -> Result<()> {
        let group = self.require_group(group_id).await?;
        let user_id = self
            .directory
            .resolve(email)
            .await
            .map_err(|e| CoreError::transport("resolve_member", e))?
            .ok_or_else(|| CoreError::user_not_found(email))?;

        let mut outcome = ReconciliationOutcome::committed(StepId::DirectoryResolve);

        if let Some(folder) = &group.resource_folder_id {
            self.folders
                .grant_access(folder, email, self.config.member_role)
                .await
                .map_err(|e| CoreError::from_acl("grant_access", e))?;
            outcome.record(StepId::AclGrant);
        } else {
            debug!(group = %group_id, "group has no provisioned folder; skipping grant");
        }

        if let Err(e) = self.docs.add_group_member(group_id, &user_id).await {
            warn!(group = %group_id, email, error = %e, "membership add failed after grant; revoking");
            outcome.failed = Some(StepId::MembershipAdd);
            if let Some(folder) = &group.resource_folder_id {
                match self.folders.revoke_access(folder, email).await {
                    Ok(()) => outcome.compensated = true,
                    Err(revoke) => {
                        warn!(group = %group_id, email, error = %revoke, "compensating revoke failed; stale grant remains");
                    }
                }
            }
            return Err(CoreError::partial("add_member", outcome));
        }

        info!(group = %group_id, member = %user_id, "member added");
        Ok(())
    }

    /// Remove a member. The creator cannot be removed (the
    /// creator-is-a-member invariant holds for the group's whole lifetime);
    /// deleting the group is the only way out for them. Membership is the
    /// security-relevant gate, so it is removed first; revoking folder
    /// access afterwards is secondary cleanup whose failure leaves
    /// retryable debt, not an error.
    pub async fn remove_member(&self, group_id: &GroupId, user: &UserId) -> Result<()> {
        let group = self.require_group(group_id).await?;
        if group.created_by == *user {
            return Err(CoreError::permission_denied(
                user,
                "be removed from a group they created",
            ));
        }
        self.docs
            .remove_group_member(group_id, user)
            .await
            .map_err(|e| CoreError::from_doc("remove_member", e))?;
        self.revoke_folder_access(&group, user).await;
        info!(group = %group_id, member = %user, "member removed");
        Ok(())
    }

    /// Self-removal. The creator cannot leave their own group, which keeps
    /// the creator-is-a-member invariant; they delete the group instead.
    pub async fn leave_group(&self, group_id: &GroupId, user: &UserId) -> Result<()> {
        let group = self.require_group(group_id).await?;
        if group.created_by == *user {
            return Err(CoreError::permission_denied(user, "leave a group they created"));
        }
        self.docs
            .remove_group_member(group_id, user)
            .await
            .map_err(|e| CoreError::from_doc("leave_group", e))?;
        self.revoke_folder_access(&group, user).await;
        info!(group = %group_id, member = %user, "member left group");
        Ok(())
    }

    /// Delete a group. Creator-only. The document is deleted first; folder
    /// deletion afterwards is best effort: an orphaned folder is
    /// acceptable, a surviving document is not.
    pub async fn delete_group(&self, group_id: &GroupId, caller: &UserId) -> Result<()> {
        let group = self.require_group(group_id).await?;
        if group.created_by != *caller {
            return Err(CoreError::permission_denied(caller, "delete this group"));
        }

        self.docs
            .delete_group(group_id)
            .await
            .map_err(|e| CoreError::from_doc("delete_group", e))?;

        if let Some(folder) = &group.resource_folder_id {
            if let Err(e) = self.folders.delete_folder(folder).await {
                warn!(group = %group_id, folder = %folder, error = %e, "folder delete failed; orphan folder remains");
            }
        }

        info!(group = %group_id, "group deleted");
        Ok(())
    }

    /// Update a group's descriptive fields. The write is field-scoped, so
    /// membership and the folder binding stay untouched and a concurrent
    /// member add or remove cannot be lost to it.
    pub async fn update_group(&self, group_id: &GroupId, details: GroupDetails) -> Result<Group> {
        self.docs
            .update_group_details(group_id, &details)
            .await
            .map_err(|e| CoreError::from_doc("update_group", e))?;
        self.require_group(group_id).await
    }

    /// Upload a receipt image into the group's shared folder.
    pub async fn upload_receipt(
        &self,
        group_id: &GroupId,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<FileId> {
        let group = self.require_group(group_id).await?;
        let folder = group.resource_folder_id.as_ref().ok_or_else(|| {
            CoreError::ResourceProvisioningFailed {
                group_name: group.name.clone(),
                cause: "group has no shared folder".to_string(),
            }
        })?;
        self.folders
            .upload_file(folder, file_name, bytes)
            .await
            .map_err(|e| CoreError::from_acl("upload_file", e))
    }

    pub async fn delete_receipt(&self, file: &FileId) -> Result<()> {
        self.folders
            .delete_file(file)
            .await
            .map_err(|e| CoreError::from_acl("delete_file", e))
    }

    pub async fn receipt_url(&self, file: &FileId) -> Result<String> {
        self.folders
            .file_url(file)
            .await
            .map_err(|e| CoreError::from_acl("file_url", e))
    }

    async fn require_group(&self, id: &GroupId) -> Result<Group> {
        self.docs
            .get_group(id)
            .await
            .map_err(|e| CoreError::from_doc("get_group", e))?
            .ok_or_else(|| CoreError::group_not_found(id))
    }

    /// Best-effort revoke after a membership removal. Any miss here is
    /// cleanup debt: the grant is stale but harmless to the membership
    /// gate, and a later revoke of the same grantee is idempotent.
    async fn revoke_folder_access(&self, group: &Group, user: &UserId) {
        let Some(folder) = &group.resource_folder_id else {
            return;
        };
        let email = match self.directory.lookup(std::slice::from_ref(user)).await {
            Ok(users) => users.into_iter().next().map(|u| u.email),
            Err(e) => {
                warn!(user = %user, error = %e, "could not resolve email for revoke; stale grant remains");
                return;
            }
        };
        let Some(email) = email else {
            warn!(user = %user, "user record gone; skipping revoke");
            return;
        };
        if let Err(e) = self.folders.revoke_access(folder, &email).await {
            warn!(group = %group.id, email, error = %e, "revoke failed after membership removal; stale grant remains");
        }
    }
}
