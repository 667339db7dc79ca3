//! Core value records shared across the engine.
//!
//! All records here are immutable values; mutation means replacing the
//! record through a reconciler operation. The document store owns the
//! canonical `Group`; the folder service's ACL is derived state that the
//! reconciler keeps converged to `Group::members`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{FolderId, GroupId, UserId};

/// A collaborative expense group.
///
/// Invariants: `created_by` is always present in `members`;
/// `resource_folder_id` is `None` until folder provisioning succeeds and is
/// never left pointing at a deleted folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier, assigned by the document store on creation
    pub id: GroupId,
    /// Human-readable name
    pub name: String,
    /// Description of this group's purpose
    pub description: String,
    /// Optional icon reference
    pub icon: Option<String>,
    /// Shared folder in the external storage service, once provisioned
    pub resource_folder_id: Option<FolderId>,
    /// Member user IDs in join order, duplicate-free
    pub members: Vec<UserId>,
    /// The user who created this group
    pub created_by: UserId,
    /// When this group was created
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Whether `user` is currently a member.
    pub fn has_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }
}

/// The descriptive fields a group edit may change. Membership and the
/// folder binding are owned by the lifecycle operations and have no place
/// here, so an edit can never race a concurrent membership write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDetails {
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
}

/// Fields the caller supplies when creating a group; everything else is
/// assigned by the engine or the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub resource_folder_id: Option<FolderId>,
    pub members: Vec<UserId>,
    pub created_by: UserId,
}

/// A signed-up user, as recorded in the document store's user directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

/// The subject of a membership change: either an already-resolved user id
/// (removal path) or an email still to be resolved through the directory
/// (addition path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberSubject {
    Id(UserId),
    Email(String),
}

/// The unit of work one reconciliation attempt processes. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipChange {
    pub group_id: GroupId,
    pub kind: MembershipChangeKind,
    pub subject: MemberSubject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipChangeKind {
    Add,
    Remove,
}

/// One snapshot delivered by a change feed.
///
/// `version` is the server-assigned ordering token and the only safe
/// de-duplication key: feeds deliver at-least-once and may re-deliver a
/// logical version after a reconnect. `data` is `None` when the watched
/// record does not (or no longer does) exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub data: Option<T>,
    pub version: u64,
}

impl<T> Snapshot<T> {
    pub fn new(data: Option<T>, version: u64) -> Self {
        Self { data, version }
    }
}

/// The merged read view a consumer observes for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupState {
    pub group: Group,
    /// Resolved member records, in the group's join order where resolvable
    pub members: Vec<User>,
    /// The snapshot version this state was derived from
    pub last_applied_version: u64,
}

/// One step of the member-addition protocol, the only protocol whose
/// partial completion is reported step by step. The other lifecycle
/// operations either commit nothing before failing or treat their trailing
/// cleanup as non-reportable debt, so no step id exists for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepId {
    DirectoryResolve,
    AclGrant,
    MembershipAdd,
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StepId::DirectoryResolve => "directory_resolve",
            StepId::AclGrant => "acl_grant",
            StepId::MembershipAdd => "membership_add",
        };
        write!(f, "{}", name)
    }
}

/// How far a multi-step operation got before stopping, and whether
/// compensation ran. Returned for error reporting and targeted retries,
/// never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    /// Steps that completed, in execution order
    pub committed: Vec<StepId>,
    /// The step that failed, if any
    pub failed: Option<StepId>,
    /// Whether a compensating action was issued for the committed steps
    pub compensated: bool,
}

impl ReconciliationOutcome {
    pub fn committed(step: StepId) -> Self {
        Self {
            committed: vec![step],
            failed: None,
            compensated: false,
        }
    }

    pub fn record(&mut self, step: StepId) {
        self.committed.push(step);
    }
}

impl std::fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let committed: Vec<String> = self.committed.iter().map(|s| s.to_string()).collect();
        write!(f, "committed=[{}]", committed.join(", "))?;
        if let Some(failed) = &self.failed {
            write!(f, " failed={}", failed)?;
        }
        write!(f, " compensated={}", self.compensated)
    }
}

/// Why one requested member could not be fully onboarded during group
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberFailure {
    /// The email as requested by the caller
    pub email: String,
    /// The step that failed for this member
    pub step: StepId,
    /// Human-readable cause
    pub reason: String,
}

/// Result of `CreateGroup`: the group exists (steps 1 and 2 committed), and
/// per-member onboarding results are reported individually. A group with
/// fewer members than requested is a valid terminal state; the caller can
/// retry exactly the failed members via `add_member`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCreation {
    pub group: Group,
    /// Members fully onboarded (membership added and folder access granted)
    pub onboarded: Vec<UserId>,
    /// Requested members that failed at some step
    pub failures: Vec<MemberFailure>,
}
