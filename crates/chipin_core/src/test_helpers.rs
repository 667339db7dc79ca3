#![cfg(test)]

//! Configurable in-memory fakes for the collaborator traits.
//!
//! The fakes model the behaviors the engine depends on: the document store
//! assigns ids and monotonically increasing snapshot versions and pushes
//! snapshots to registered listeners; the folder service reports
//! `AlreadyGranted`/`GranteeNotFound` exactly so tests can prove the ACL
//! client normalizes them. Failure injection flags trip exactly once.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::directory::{DirectoryError, UserDirectory};
use crate::document::{DocError, DocumentStore, ListenerGuard, SnapshotSink};
use crate::folder::{AclError, FolderApi, FolderRole, Session, SessionProvider};
use crate::id::{FileId, FolderId, GroupId, UserId};
use crate::types::{Group, GroupDetails, NewGroup, Snapshot, User};

pub fn sample_user(email: &str) -> User {
    User {
        id: UserId::generate(),
        email: email.to_string(),
        display_name: email.split('@').next().unwrap_or(email).to_string(),
        photo_url: None,
    }
}

// ==================== Document store ====================

struct DocInner {
    groups: DashMap<GroupId, Group>,
    version: AtomicU64,
    listener_seq: AtomicU64,
    group_listeners: DashMap<GroupId, Vec<(u64, SnapshotSink<Group>)>>,
    user_group_listeners: DashMap<u64, (UserId, SnapshotSink<Vec<Group>>)>,
    fail_create_group: AtomicBool,
    fail_add_member: AtomicBool,
}

pub struct MemoryDocumentStore {
    inner: Arc<DocInner>,
}

impl std::fmt::Debug for MemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDocumentStore")
            .field("groups", &self.inner.groups.len())
            .finish()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DocInner {
                groups: DashMap::new(),
                version: AtomicU64::new(0),
                listener_seq: AtomicU64::new(0),
                group_listeners: DashMap::new(),
                user_group_listeners: DashMap::new(),
                fail_create_group: AtomicBool::new(false),
                fail_add_member: AtomicBool::new(false),
            }),
        }
    }

    /// Insert a group directly, bypassing the reconciler.
    pub fn seed_group(
        &self,
        name: &str,
        creator: UserId,
        folder: Option<FolderId>,
    ) -> Group {
        let now = Utc::now();
        let group = Group {
            id: GroupId::generate(),
            name: name.to_string(),
            description: String::new(),
            icon: None,
            resource_folder_id: folder,
            members: vec![creator.clone()],
            created_by: creator,
            created_at: now,
            updated_at: now,
        };
        self.inner.groups.insert(group.id.clone(), group.clone());
        self.notify(&group.id);
        group
    }

    pub fn group(&self, id: &GroupId) -> Option<Group> {
        self.inner.groups.get(id).map(|g| g.clone())
    }

    pub fn group_count(&self) -> usize {
        self.inner.groups.len()
    }

    pub fn group_listener_count(&self, id: &GroupId) -> usize {
        self.inner
            .group_listeners
            .get(id)
            .map(|sinks| sinks.len())
            .unwrap_or(0)
    }

    pub fn fail_next_create_group(&self) {
        self.inner.fail_create_group.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_add_member(&self) {
        self.inner.fail_add_member.store(true, Ordering::SeqCst);
    }

    fn groups_for(&self, user: &UserId) -> Vec<Group> {
        let mut groups: Vec<Group> = self
            .inner
            .groups
            .iter()
            .filter(|entry| entry.has_member(user))
            .map(|entry| entry.clone())
            .collect();
        groups.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        groups
    }

    /// Bump the version and deliver fresh snapshots to every listener
    /// affected by a change to `id`.
    fn notify(&self, id: &GroupId) {
        let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
        let data = self.group(id);
        if let Some(sinks) = self.inner.group_listeners.get(id) {
            for (_, sink) in sinks.iter() {
                sink(Snapshot::new(data.clone(), version));
            }
        }
        for entry in self.inner.user_group_listeners.iter() {
            let (user, sink) = entry.value();
            sink(Snapshot::new(Some(self.groups_for(user)), version));
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create_group(&self, group: NewGroup) -> Result<Group, DocError> {
        if self.inner.fail_create_group.swap(false, Ordering::SeqCst) {
            return Err(DocError::Transport("injected create failure".to_string()));
        }
        let now = Utc::now();
        let mut members = Vec::new();
        for member in group.members {
            if !members.contains(&member) {
                members.push(member);
            }
        }
        let stored = Group {
            id: GroupId::generate(),
            name: group.name,
            description: group.description,
            icon: group.icon,
            resource_folder_id: group.resource_folder_id,
            members,
            created_by: group.created_by,
            created_at: now,
            updated_at: now,
        };
        self.inner.groups.insert(stored.id.clone(), stored.clone());
        self.notify(&stored.id);
        Ok(stored)
    }

    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, DocError> {
        Ok(self.group(id))
    }

    async fn update_group_details(
        &self,
        id: &GroupId,
        details: &GroupDetails,
    ) -> Result<(), DocError> {
        {
            let mut group = self
                .inner
                .groups
                .get_mut(id)
                .ok_or_else(|| DocError::NotFound(id.to_string()))?;
            group.name = details.name.clone();
            group.description = details.description.clone();
            group.icon = details.icon.clone();
            group.updated_at = Utc::now();
        }
        self.notify(id);
        Ok(())
    }

    async fn delete_group(&self, id: &GroupId) -> Result<(), DocError> {
        self.inner.groups.remove(id);
        self.notify(id);
        Ok(())
    }

    async fn add_group_member(&self, id: &GroupId, user: &UserId) -> Result<(), DocError> {
        if self.inner.fail_add_member.swap(false, Ordering::SeqCst) {
            return Err(DocError::Transport("injected add failure".to_string()));
        }
        {
            let mut group = self
                .inner
                .groups
                .get_mut(id)
                .ok_or_else(|| DocError::NotFound(id.to_string()))?;
            if !group.members.contains(user) {
                group.members.push(user.clone());
                group.updated_at = Utc::now();
            }
        }
        self.notify(id);
        Ok(())
    }

    async fn remove_group_member(&self, id: &GroupId, user: &UserId) -> Result<(), DocError> {
        {
            let mut group = self
                .inner
                .groups
                .get_mut(id)
                .ok_or_else(|| DocError::NotFound(id.to_string()))?;
            if group.members.contains(user) {
                group.members.retain(|m| m != user);
                group.updated_at = Utc::now();
            }
        }
        self.notify(id);
        Ok(())
    }

    fn listen_group(&self, id: &GroupId, sink: SnapshotSink<Group>) -> ListenerGuard {
        let listener_id = self.inner.listener_seq.fetch_add(1, Ordering::SeqCst);
        let version = self.inner.version.load(Ordering::SeqCst);
        sink(Snapshot::new(self.group(id), version));
        self.inner
            .group_listeners
            .entry(id.clone())
            .or_default()
            .push((listener_id, sink));

        let inner = self.inner.clone();
        let group_id = id.clone();
        ListenerGuard::new(move || {
            if let Some(mut sinks) = inner.group_listeners.get_mut(&group_id) {
                sinks.retain(|(lid, _)| *lid != listener_id);
            }
        })
    }

    fn listen_user_groups(&self, user: &UserId, sink: SnapshotSink<Vec<Group>>) -> ListenerGuard {
        let listener_id = self.inner.listener_seq.fetch_add(1, Ordering::SeqCst);
        let version = self.inner.version.load(Ordering::SeqCst);
        sink(Snapshot::new(Some(self.groups_for(user)), version));
        self.inner
            .user_group_listeners
            .insert(listener_id, (user.clone(), sink));

        let inner = self.inner.clone();
        ListenerGuard::new(move || {
            inner.user_group_listeners.remove(&listener_id);
        })
    }
}

// ==================== Folder service ====================

#[derive(Debug)]
struct FolderRecord {
    name: String,
    grants: HashSet<String>,
}

#[derive(Debug)]
struct FileRecord {
    folder: FolderId,
    name: String,
    bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct MemoryFolderApi {
    folders: DashMap<FolderId, FolderRecord>,
    files: DashMap<FileId, FileRecord>,
    seq: AtomicU64,
    fail_create_folder: AtomicBool,
    fail_grant: AtomicBool,
    fail_revoke: AtomicBool,
}

impl MemoryFolderApi {
    pub fn new() -> Self {
        Self {
            folders: DashMap::new(),
            files: DashMap::new(),
            seq: AtomicU64::new(0),
            fail_create_folder: AtomicBool::new(false),
            fail_grant: AtomicBool::new(false),
            fail_revoke: AtomicBool::new(false),
        }
    }

    pub fn grants(&self, folder: &FolderId) -> HashSet<String> {
        self.folders
            .get(folder)
            .map(|record| record.grants.clone())
            .unwrap_or_default()
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    pub fn folder_name(&self, folder: &FolderId) -> Option<String> {
        self.folders.get(folder).map(|record| record.name.clone())
    }

    pub fn fail_next_create_folder(&self) {
        self.fail_create_folder.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_grant(&self) {
        self.fail_grant.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_revoke(&self) {
        self.fail_revoke.store(true, Ordering::SeqCst);
    }

    fn next_id(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl FolderApi for MemoryFolderApi {
    async fn create_folder(&self, _session: &Session, name: &str) -> Result<FolderId, AclError> {
        if self.fail_create_folder.swap(false, Ordering::SeqCst) {
            return Err(AclError::Transport(
                "injected folder create failure".to_string(),
            ));
        }
        let folder = FolderId::new(format!("folder-{}", self.next_id()));
        self.folders.insert(
            folder.clone(),
            FolderRecord {
                name: name.to_string(),
                grants: HashSet::new(),
            },
        );
        Ok(folder)
    }

    async fn delete_folder(&self, _session: &Session, folder: &FolderId) -> Result<(), AclError> {
        if self.folders.remove(folder).is_none() {
            return Err(AclError::NotFound(folder.to_string()));
        }
        self.files.retain(|_, record| record.folder != *folder);
        Ok(())
    }

    async fn upload_file(
        &self,
        _session: &Session,
        folder: &FolderId,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<FileId, AclError> {
        if !self.folders.contains_key(folder) {
            return Err(AclError::NotFound(folder.to_string()));
        }
        let file = FileId::new(format!("file-{}", self.next_id()));
        self.files.insert(
            file.clone(),
            FileRecord {
                folder: folder.clone(),
                name: name.to_string(),
                bytes,
            },
        );
        Ok(file)
    }

    async fn delete_file(&self, _session: &Session, file: &FileId) -> Result<(), AclError> {
        if self.files.remove(file).is_none() {
            return Err(AclError::NotFound(file.to_string()));
        }
        Ok(())
    }

    async fn file_url(&self, _session: &Session, file: &FileId) -> Result<String, AclError> {
        if !self.files.contains_key(file) {
            return Err(AclError::NotFound(file.to_string()));
        }
        Ok(format!("https://files.example/{}", file))
    }

    async fn grant_access(
        &self,
        _session: &Session,
        folder: &FolderId,
        email: &str,
        _role: FolderRole,
    ) -> Result<(), AclError> {
        if self.fail_grant.swap(false, Ordering::SeqCst) {
            return Err(AclError::Transport("injected grant failure".to_string()));
        }
        let mut record = self
            .folders
            .get_mut(folder)
            .ok_or_else(|| AclError::NotFound(folder.to_string()))?;
        if !record.grants.insert(email.to_string()) {
            return Err(AclError::AlreadyGranted {
                email: email.to_string(),
            });
        }
        Ok(())
    }

    async fn revoke_access(
        &self,
        _session: &Session,
        folder: &FolderId,
        email: &str,
    ) -> Result<(), AclError> {
        if self.fail_revoke.swap(false, Ordering::SeqCst) {
            return Err(AclError::Transport("injected revoke failure".to_string()));
        }
        let mut record = self
            .folders
            .get_mut(folder)
            .ok_or_else(|| AclError::NotFound(folder.to_string()))?;
        if !record.grants.remove(email) {
            return Err(AclError::GranteeNotFound {
                email: email.to_string(),
            });
        }
        Ok(())
    }
}

// ==================== Session & directory ====================

#[derive(Debug)]
pub struct StaticSession {
    session: Mutex<Option<Session>>,
}

impl StaticSession {
    pub fn signed_in(email: &str) -> Self {
        Self {
            session: Mutex::new(Some(Session {
                account_email: email.to_string(),
                access_token: "test-token".to_string(),
            })),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }

    pub fn sign_in(&self, email: &str) {
        *self.session.lock().unwrap() = Some(Session {
            account_email: email.to_string(),
            access_token: "test-token".to_string(),
        });
    }

    pub fn sign_out(&self) {
        *self.session.lock().unwrap() = None;
    }
}

impl SessionProvider for StaticSession {
    fn current_session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }
}

#[derive(Debug)]
pub struct StaticDirectory {
    users: Vec<User>,
}

impl StaticDirectory {
    pub fn with_users(users: Vec<User>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn resolve(&self, email: &str) -> Result<Option<UserId>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.id.clone()))
    }

    async fn lookup(&self, ids: &[UserId]) -> Result<Vec<User>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }
}
