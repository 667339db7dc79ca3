//! Consumer-facing store over live projections.
//!
//! Holds one projection per group (and per watched user-groups list),
//! hands out cheap watch receivers carrying the last-known state, and
//! tears projections down when callers release them. Receivers stay valid
//! after a release (they simply stop updating), so unsubscribing is safe
//! from anywhere in the control flow.

use dashmap::DashMap;
use tokio::sync::watch;

use crate::id::{GroupId, UserId};
use crate::projector::{GroupProjector, ProjectionHandle, UserGroupsHandle};
use crate::types::{Group, GroupState};

#[derive(Debug)]
pub struct GroupStore {
    projector: GroupProjector,
    groups: DashMap<GroupId, ProjectionHandle>,
    user_groups: DashMap<UserId, UserGroupsHandle>,
}

impl GroupStore {
    pub fn new(projector: GroupProjector) -> Self {
        Self {
            projector,
            groups: DashMap::new(),
            user_groups: DashMap::new(),
        }
    }

    /// Watch one group's projected state, starting the projection on first
    /// interest. Subsequent watchers share the same projection.
    pub fn watch_group(&self, id: &GroupId) -> watch::Receiver<Option<GroupState>> {
        self.groups
            .entry(id.clone())
            .or_insert_with(|| self.projector.project_group(id))
            .subscribe()
    }

    /// Watch the list of groups containing `user`.
    pub fn watch_user_groups(&self, user: &UserId) -> watch::Receiver<Vec<Group>> {
        self.user_groups
            .entry(user.clone())
            .or_insert_with(|| self.projector.project_user_groups(user))
            .subscribe()
    }

    /// Stop projecting a group. Existing receivers keep their last value.
    pub fn release_group(&self, id: &GroupId) {
        self.groups.remove(id);
    }

    /// Stop projecting a user's group list.
    pub fn release_user_groups(&self, user: &UserId) {
        self.user_groups.remove(user);
    }

    /// Stop all projections.
    pub fn clear(&self) {
        self.groups.clear();
        self.user_groups.clear();
    }
}
