//! Chipin Core - Group Membership and Shared-Resource Consistency Engine
//!
//! This crate keeps two systems of record coherent for a collaborative
//! expense tracker: the document store that owns group membership, and the
//! external folder service whose ACLs must track it. The [`reconciler`]
//! drives multi-step membership protocols with compensation on partial
//! failure, the [`projector`] folds versioned change feeds into ordered
//! read state, and the [`store`] hands consumers shared live views.

pub mod acl;
pub mod config;
pub mod directory;
pub mod document;
pub mod error;
pub mod feed;
pub mod folder;
pub mod id;
pub mod projector;
pub mod reconciler;
pub mod store;
pub mod types;

#[cfg(test)]
pub mod test_helpers;

// Macros are automatically available at crate root due to #[macro_export]

pub use acl::FolderClient;
pub use config::EngineConfig;
pub use directory::UserDirectory;
pub use document::{DocumentStore, ListenerGuard, SnapshotSink};
pub use error::{CoreError, Result};
pub use feed::ChangeFeed;
pub use folder::{FolderApi, FolderRole, Session, SessionProvider};
pub use id::{FileId, FolderId, GroupId, IdType, UserId};
pub use projector::GroupProjector;
pub use reconciler::Reconciler;
pub use store::GroupStore;
pub use types::{
    Group, GroupCreation, GroupDetails, GroupState, MemberFailure, MemberSubject,
    MembershipChange, MembershipChangeKind, NewGroup, ReconciliationOutcome, Snapshot, StepId,
    User,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        ChangeFeed, CoreError, DocumentStore, EngineConfig, FolderApi, FolderClient, FolderRole,
        Group, GroupCreation, GroupId, GroupProjector, GroupState, GroupStore, IdType, NewGroup,
        Reconciler, ReconciliationOutcome, Result, Session, SessionProvider, Snapshot, StepId,
        User, UserDirectory, UserId,
    };
}
