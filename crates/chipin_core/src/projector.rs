//! Group state projector: merges change-feed snapshots into a coherent,
//! version-ordered read view.
//!
//! Each projected group runs one task that owns all projection state
//! (single writer). The task drains the group's change feed, discards any
//! snapshot at or below the highest version already seen (reconnects and
//! concurrent listeners re-deliver), and kicks off a membership resolution
//! for each newer snapshot without blocking the feed. Resolutions complete
//! out of order; a completion only applies if its version still exceeds the
//! last applied version, so a slow resolution for an old snapshot can never
//! overwrite state derived from a newer one.

use std::sync::Arc;

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::directory::UserDirectory;
use crate::document::DocumentStore;
use crate::feed::ChangeFeed;
use crate::id::{GroupId, UserId};
use crate::types::{Group, GroupState};

#[derive(Clone)]
pub struct GroupProjector {
    docs: Arc<dyn DocumentStore>,
    directory: Arc<dyn UserDirectory>,
    feed_capacity: usize,
}

impl std::fmt::Debug for GroupProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupProjector")
            .field("feed_capacity", &self.feed_capacity)
            .finish()
    }
}

/// Live projection of one group. Dropping the handle stops the projection
/// task, which releases the underlying document-store listener.
#[derive(Debug)]
pub struct ProjectionHandle {
    rx: watch::Receiver<Option<GroupState>>,
    task: JoinHandle<()>,
}

impl ProjectionHandle {
    /// Observe the projected state. `None` until the first snapshot
    /// resolves, and again once the group is deleted.
    pub fn subscribe(&self) -> watch::Receiver<Option<GroupState>> {
        self.rx.clone()
    }
}

impl Drop for ProjectionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Live projection of the set of groups containing one user.
#[derive(Debug)]
pub struct UserGroupsHandle {
    rx: watch::Receiver<Vec<Group>>,
    task: JoinHandle<()>,
}

impl UserGroupsHandle {
    pub fn subscribe(&self) -> watch::Receiver<Vec<Group>> {
        self.rx.clone()
    }
}

impl Drop for UserGroupsHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl GroupProjector {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        directory: Arc<dyn UserDirectory>,
        feed_capacity: usize,
    ) -> Self {
        Self {
            docs,
            directory,
            feed_capacity,
        }
    }

    /// Start projecting one group.
    pub fn project_group(&self, id: &GroupId) -> ProjectionHandle {
        let mut feed: ChangeFeed<Group> = ChangeFeed::attach(self.feed_capacity, |sink| {
            self.docs.listen_group(id, sink)
        });
        let (tx, rx) = watch::channel(None);
        let directory = self.directory.clone();
        let group_id = id.clone();

        let task = tokio::spawn(async move {
            let mut highest_seen: u64 = 0;
            let mut applied: u64 = 0;
            // In-flight membership resolutions, tagged with the version of
            // the snapshot they derive from. None = resolution failed.
            let mut resolutions: FuturesUnordered<BoxFuture<'static, (u64, Option<GroupState>)>> =
                FuturesUnordered::new();

            loop {
                tokio::select! {
                    snapshot = feed.recv() => {
                        let Some(snapshot) = snapshot else { break };
                        if snapshot.version <= highest_seen {
                            debug!(group = %group_id, version = snapshot.version, "discarding stale snapshot");
                            continue;
                        }
                        highest_seen = snapshot.version;

                        match snapshot.data {
                            // Absent/deleted: nothing to resolve, applies
                            // directly under the same version gate.
                            None => {
                                if snapshot.version > applied {
                                    applied = snapshot.version;
                                    let _ = tx.send(None);
                                }
                            }
                            Some(group) => {
                                let directory = directory.clone();
                                let version = snapshot.version;
                                resolutions.push(Box::pin(async move {
                                    (version, resolve_members(&directory, group, version).await)
                                }));
                            }
                        }
                    }
                    Some((version, state)) = resolutions.next(), if !resolutions.is_empty() => {
                        match state {
                            Some(state) if version > applied => {
                                applied = version;
                                let _ = tx.send(Some(state));
                            }
                            Some(_) => {
                                debug!(group = %group_id, version, "discarding resolution superseded by newer version");
                            }
                            // Failed resolution: keep the last good state;
                            // the next snapshot re-resolves.
                            None => {}
                        }
                    }
                }
            }
        });

        ProjectionHandle { rx, task }
    }

    /// Start projecting the groups-containing-user list. No membership
    /// resolution is involved; only version gating applies.
    pub fn project_user_groups(&self, user: &UserId) -> UserGroupsHandle {
        let mut feed: ChangeFeed<Vec<Group>> = ChangeFeed::attach(self.feed_capacity, |sink| {
            self.docs.listen_user_groups(user, sink)
        });
        let (tx, rx) = watch::channel(Vec::new());
        let user = user.clone();

        let task = tokio::spawn(async move {
            let mut applied: u64 = 0;
            while let Some(snapshot) = feed.recv().await {
                if snapshot.version <= applied {
                    debug!(user = %user, version = snapshot.version, "discarding stale snapshot");
                    continue;
                }
                applied = snapshot.version;
                let _ = tx.send(snapshot.data.unwrap_or_default());
            }
        });

        UserGroupsHandle { rx, task }
    }
}

async fn resolve_members(
    directory: &Arc<dyn UserDirectory>,
    group: Group,
    version: u64,
) -> Option<GroupState> {
    match directory.lookup(&group.members).await {
        Ok(members) => Some(GroupState {
            group,
            members,
            last_applied_version: version,
        }),
        Err(e) => {
            warn!(group = %group.id, version, error = %e, "membership resolution failed; keeping previous state");
            None
        }
    }
}
