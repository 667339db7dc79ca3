//! Document-store collaborator boundary.
//!
//! The document store is the authority for group and user records. Beyond
//! CRUD it offers two primitives the engine depends on:
//!
//! - atomic array-add/array-remove on the `members` field, used instead of
//!   read-modify-write so concurrent membership edits cannot lose updates
//! - push-style snapshot listeners on a single group and on the set of
//!   groups containing a member, each delivering a version-tagged
//!   [`Snapshot`] on every change
//!
//! Listeners are registered with a [`SnapshotSink`] callback and detached
//! through the returned [`ListenerGuard`]; the [`crate::feed::ChangeFeed`]
//! adapter turns this push interface into a pull sequence.

use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::id::{GroupId, UserId};
use crate::types::{Group, GroupDetails, NewGroup, Snapshot};

/// Errors surfaced by the document-store collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocError {
    #[error("no such document: {0}")]
    NotFound(String),

    #[error("document store transport failure: {0}")]
    Transport(String),
}

/// Push callback receiving snapshots for a single subscription.
///
/// Must not block: implementations of [`DocumentStore`] may invoke it from
/// their own delivery path.
pub type SnapshotSink<T> = Box<dyn Fn(Snapshot<T>) + Send + Sync>;

/// Handle detaching a snapshot listener.
///
/// Detachment is synchronous with respect to [`ListenerGuard::detach`] (or
/// drop): once it returns, the sink is never invoked again.
pub struct ListenerGuard {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerGuard {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Guard for a subscription that was never established.
    pub fn noop() -> Self {
        Self { detach: None }
    }

    /// Detach the listener now rather than at drop.
    pub fn detach(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// Authoritative record database for groups and users.
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    /// Persist a new group; the store assigns id and timestamps.
    async fn create_group(&self, group: NewGroup) -> Result<Group, DocError>;

    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, DocError>;

    /// Field-scoped write of the descriptive fields only. Like the member
    /// array primitives below, this exists instead of a whole-record
    /// replace so it cannot lose a concurrent membership write.
    async fn update_group_details(
        &self,
        id: &GroupId,
        details: &GroupDetails,
    ) -> Result<(), DocError>;

    async fn delete_group(&self, id: &GroupId) -> Result<(), DocError>;

    /// Atomic array-union of `user` into the group's member set. Adding an
    /// existing member is a no-op success.
    async fn add_group_member(&self, id: &GroupId, user: &UserId) -> Result<(), DocError>;

    /// Atomic array-remove of `user` from the group's member set. Removing
    /// an absent member is a no-op success.
    async fn remove_group_member(&self, id: &GroupId, user: &UserId) -> Result<(), DocError>;

    /// Subscribe to snapshots of a single group. Delivers the current state
    /// immediately, then on every change; `data: None` when the document
    /// does not exist.
    fn listen_group(&self, id: &GroupId, sink: SnapshotSink<Group>) -> ListenerGuard;

    /// Subscribe to snapshots of all groups containing `user` as a member.
    fn listen_user_groups(&self, user: &UserId, sink: SnapshotSink<Vec<Group>>) -> ListenerGuard;
}
