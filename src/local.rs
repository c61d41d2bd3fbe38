// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Embedded local directory backed by a JSON file
//!
//! Every write rewrites the store file. The backend is single-threaded:
//! views share the store through `Rc<RefCell<..>>`.

use crate::config::TargetConfig;
use crate::entry::{
    DepartmentDraft, DepartmentEntry, DepartmentRole, DepartmentWriter, Entry, Linkable,
    MembershipOptions, NewUser, UserEntry, UserRecord,
};
use crate::error::{DirectoryError, Result};
use crate::identity::{EntryType, ExternalIdentity, LinkSet, TargetKey};
use crate::registry::{PlatformContext, PlatformFactory};
use crate::target::{
    Capabilities, Capability, EntryCenter, FuzzyUserLookup, Target, UserLister, UserWriter,
};
use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Root department id used when the configuration names none
pub const DEFAULT_ROOT_ID: Uuid = Uuid::NAMESPACE_DNS;

/// Factory for the `local` platform
///
/// Options: `path` (store file, relative to the data dir; default
/// `<slug>.json`) and `root_id` (UUID of the root department).
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPlatform;

impl LocalPlatform {
    /// Platform name used in configuration and tokens
    pub const NAME: &'static str = "local";
}

impl PlatformFactory for LocalPlatform {
    fn build(&self, config: &TargetConfig, context: &PlatformContext) -> Result<Box<dyn Target>> {
        let path = config
            .option_str("path")
            .map_or_else(|| PathBuf::from(format!("{}.json", config.slug)), PathBuf::from);
        let path = if path.is_absolute() {
            path
        } else {
            context.data_dir.join(path)
        };
        let root_id = match config.option_str("root_id") {
            Some(raw) => Uuid::parse_str(raw).map_err(|e| {
                DirectoryError::Config(format!("target '{}': bad root_id: {e}", config.name))
            })?,
            None => DEFAULT_ROOT_ID,
        };
        let key = TargetKey::new(config.platform.as_str(), config.slug.as_str());
        Ok(Box::new(LocalTarget::open(key, path, root_id)?))
    }
}

// =========================================================================
// Persisted records
// =========================================================================

/// A user row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    /// Primary key
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Primary e-mail
    #[serde(default)]
    pub email: String,
    /// Primary phone
    #[serde(default)]
    pub phone: String,
    /// All known names
    #[serde(default)]
    pub names: BTreeSet<String>,
    /// All known e-mails
    #[serde(default)]
    pub emails: BTreeSet<String>,
    /// All known phones
    #[serde(default)]
    pub phones: BTreeSet<String>,
    /// Linked identities
    #[serde(default)]
    pub links: LinkSet,
    /// Department memberships
    #[serde(default)]
    pub departments: BTreeMap<Uuid, DepartmentRole>,
    /// When the row was created
    pub created_at: DateTime<Utc>,
    /// Last write
    pub updated_at: DateTime<Utc>,
}

/// A department row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDepartment {
    /// Primary key
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Parent department; `None` only for the root
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    /// Linked identities
    #[serde(default)]
    pub links: LinkSet,
    /// When the row was created
    pub created_at: DateTime<Utc>,
}

/// Whole contents of one store file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalStore {
    /// All users
    #[serde(default)]
    pub users: Vec<StoredUser>,
    /// All departments
    #[serde(default)]
    pub departments: Vec<StoredDepartment>,
}

impl LocalStore {
    /// Load a store file; a missing file is an empty store
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the store file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject stores whose parent links form a cycle
    pub fn check_hierarchy(&self) -> Result<()> {
        let mut graph: DiGraph<Uuid, ()> = DiGraph::new();
        let mut nodes: HashMap<Uuid, NodeIndex> = HashMap::new();
        for dept in &self.departments {
            nodes.insert(dept.id, graph.add_node(dept.id));
        }
        for dept in &self.departments {
            let Some(parent) = dept.parent_id else { continue };
            match nodes.get(&parent) {
                Some(&from) => {
                    graph.add_edge(from, nodes[&dept.id], ());
                }
                None => warn!("department {} has unknown parent {}", dept.id, parent),
            }
        }
        petgraph::algo::toposort(&graph, None)
            .map(|_| ())
            .map_err(|cycle| DirectoryError::CycleDetected {
                department: graph[cycle.node_id()].to_string(),
            })
    }

    fn user(&self, id: Uuid) -> Option<&StoredUser> {
        self.users.iter().find(|u| u.id == id)
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut StoredUser> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    fn department(&self, id: Uuid) -> Option<&StoredDepartment> {
        self.departments.iter().find(|d| d.id == id)
    }

    fn department_mut(&mut self, id: Uuid) -> Option<&mut StoredDepartment> {
        self.departments.iter_mut().find(|d| d.id == id)
    }
}

// =========================================================================
// Target
// =========================================================================

struct LocalState {
    key: TargetKey,
    path: PathBuf,
    root_id: Uuid,
    store: RefCell<LocalStore>,
}

impl LocalState {
    fn persist(&self) -> Result<()> {
        self.store.borrow().save(&self.path)
    }

    /// Apply `change` to a copy of the store, save it, then swap it in
    ///
    /// A failed change or save leaves the in-memory store untouched.
    fn commit<T>(&self, change: impl FnOnce(&mut LocalStore) -> Result<T>) -> Result<T> {
        let mut next = self.store.borrow().clone();
        let value = change(&mut next)?;
        next.save(&self.path)?;
        *self.store.borrow_mut() = next;
        Ok(value)
    }

    fn user_record(&self, user: &StoredUser) -> UserRecord {
        let mut record = UserRecord::new(self.key.clone(), user.id.to_string(), user.name.clone())
            .with_email(user.email.clone())
            .with_phone(user.phone.clone());
        record.names.extend(user.names.iter().cloned());
        record.emails.extend(user.emails.iter().cloned());
        record.phones.extend(user.phones.iter().cloned());
        record.links = user.links.clone();
        record
    }

    fn identity(&self, entry_type: EntryType, id: Uuid) -> Result<ExternalIdentity> {
        ExternalIdentity::new(
            entry_type,
            id.to_string(),
            self.key.tenant_slug(),
            self.key.platform(),
        )
    }
}

fn parse_id(what: &'static str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| DirectoryError::not_found(what, raw))
}

/// A tenant of the local platform
pub struct LocalTarget {
    state: Rc<LocalState>,
}

impl LocalTarget {
    /// Open (or create) the store at `path`, ensuring the root department exists
    pub fn open(key: TargetKey, path: PathBuf, root_id: Uuid) -> Result<Self> {
        let mut store = LocalStore::load(&path)?;
        store.check_hierarchy()?;

        let created_root = store.department(root_id).is_none();
        if created_root {
            store.departments.push(StoredDepartment {
                id: root_id,
                name: "root".into(),
                description: String::new(),
                parent_id: None,
                links: LinkSet::new(),
                created_at: Utc::now(),
            });
        }

        let target = Self {
            state: Rc::new(LocalState {
                key,
                path,
                root_id,
                store: RefCell::new(store),
            }),
        };
        if created_root {
            info!("Created root department for {}", target.state.key);
            target.state.persist()?;
        }
        debug!(
            "Opened local store {} for {}",
            target.state.path.display(),
            target.state.key
        );
        Ok(target)
    }

    /// Path of the backing store file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.state.path
    }

    fn department_view(&self, id: Uuid) -> Result<Box<dyn DepartmentEntry>> {
        department_view(&self.state, id)
    }
}

fn department_view(state: &Rc<LocalState>, id: Uuid) -> Result<Box<dyn DepartmentEntry>> {
    let record = state
        .store
        .borrow()
        .department(id)
        .cloned()
        .ok_or_else(|| DirectoryError::not_found("department", id.to_string()))?;
    Ok(Box::new(LocalDepartment {
        state: Rc::clone(state),
        id: record.id.to_string(),
        record,
    }))
}

impl Target for LocalTarget {
    fn key(&self) -> &TargetKey {
        &self.state.key
    }

    fn root_department(&self) -> Result<Box<dyn DepartmentEntry>> {
        self.department_view(self.state.root_id)
    }

    fn lookup_user(&self, id: &str) -> Result<Box<dyn UserEntry>> {
        let uuid = parse_id("user", id)?;
        let store = self.state.store.borrow();
        let user = store
            .user(uuid)
            .ok_or_else(|| DirectoryError::not_found("user", id))?;
        Ok(Box::new(self.state.user_record(user)))
    }

    fn lookup_department(&self, id: &str) -> Result<Box<dyn DepartmentEntry>> {
        self.department_view(parse_id("department", id)?)
    }

    fn capabilities(&self) -> Capabilities {
        Capability::ALL.into_iter().collect()
    }

    fn as_user_lister(&self) -> Option<&dyn UserLister> {
        Some(self)
    }

    fn as_user_writer(&self) -> Option<&dyn UserWriter> {
        Some(self)
    }

    fn as_fuzzy_lookup(&self) -> Option<&dyn FuzzyUserLookup> {
        Some(self)
    }

    fn as_entry_center(&self) -> Option<&dyn EntryCenter> {
        Some(self)
    }
}

impl UserLister for LocalTarget {
    fn all_users(&self) -> Result<Vec<Box<dyn UserEntry>>> {
        let store = self.state.store.borrow();
        Ok(store
            .users
            .iter()
            .map(|u| Box::new(self.state.user_record(u)) as Box<dyn UserEntry>)
            .collect())
    }
}

impl UserWriter for LocalTarget {
    fn create_user(&self, user: &NewUser) -> Result<UserRecord> {
        if user.name.is_empty() {
            return Err(DirectoryError::Config("user name is required".into()));
        }
        let now = Utc::now();
        let stored = StoredUser {
            id: Uuid::new_v4(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            names: union_nonempty(&user.names, &user.name),
            emails: union_nonempty(&user.emails, &user.email),
            phones: union_nonempty(&user.phones, &user.phone),
            links: user.links.clone(),
            departments: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        };
        let record = self.state.user_record(&stored);
        self.state.commit(|store| {
            store.users.push(stored);
            Ok(())
        })?;
        debug!("Created user {} on {}", record.id, self.state.key);
        Ok(record)
    }

    fn update_user(&self, user: &UserRecord) -> Result<()> {
        if user.target != self.state.key {
            return Err(DirectoryError::not_found("user", user.id.clone()));
        }
        let uuid = parse_id("user", &user.id)?;
        self.state.commit(|store| {
            let stored = store
                .user_mut(uuid)
                .ok_or_else(|| DirectoryError::not_found("user", user.id.clone()))?;
            stored.name = user.name.clone();
            stored.email = user.email.clone();
            stored.phone = user.phone.clone();
            stored.names = union_nonempty(&user.names, &user.name);
            stored.emails = union_nonempty(&user.emails, &user.email);
            stored.phones = union_nonempty(&user.phones, &user.phone);
            stored.links = user.links.clone();
            stored.updated_at = Utc::now();
            Ok(())
        })
    }
}

fn union_nonempty(values: &BTreeSet<String>, primary: &str) -> BTreeSet<String> {
    values
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(primary))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

impl FuzzyUserLookup for LocalTarget {
    fn lookup_user_fuzzy(&self, candidate: &dyn UserEntry) -> Result<Vec<UserRecord>> {
        let names = candidate.names();
        let emails = candidate.emails();
        let phones = candidate.phones();
        let store = self.state.store.borrow();
        Ok(store
            .users
            .iter()
            .filter(|u| {
                !u.names.is_disjoint(&names)
                    || !u.emails.is_disjoint(&emails)
                    || !u.phones.is_disjoint(&phones)
            })
            .map(|u| self.state.user_record(u))
            .collect())
    }
}

impl EntryCenter for LocalTarget {
    fn find_linked(&self, foreign: &ExternalIdentity) -> Result<Option<ExternalIdentity>> {
        let store = self.state.store.borrow();
        let (entry_type, holders): (EntryType, Vec<Uuid>) = match foreign.entry_type() {
            EntryType::User => (
                EntryType::User,
                store
                    .users
                    .iter()
                    .filter(|u| u.links.contains(foreign))
                    .map(|u| u.id)
                    .collect(),
            ),
            EntryType::Department => (
                EntryType::Department,
                store
                    .departments
                    .iter()
                    .filter(|d| d.links.contains(foreign))
                    .map(|d| d.id)
                    .collect(),
            ),
            EntryType::Project => return Ok(None),
        };
        match holders.as_slice() {
            [] => Ok(None),
            [id] => self.state.identity(entry_type, *id).map(Some),
            many => Err(DirectoryError::AmbiguousMatch {
                candidate: foreign.to_string(),
                target: self.state.key.clone(),
                matches: many.len(),
            }),
        }
    }

    fn link_handle(&self, local: &ExternalIdentity) -> Result<Box<dyn Linkable>> {
        if !local.is_internal_to(&self.state.key) {
            return Err(DirectoryError::not_found("entry", local.to_string()));
        }
        let store = self.state.store.borrow();
        match local.entry_type() {
            EntryType::User => {
                let id = parse_id("user", local.internal_id())?;
                store
                    .user(id)
                    .ok_or_else(|| DirectoryError::not_found("user", local.to_string()))?;
                Ok(Box::new(LocalLinks {
                    state: Rc::clone(&self.state),
                    owner: LinkOwner::User(id),
                }))
            }
            EntryType::Department => {
                let id = parse_id("department", local.internal_id())?;
                store
                    .department(id)
                    .ok_or_else(|| DirectoryError::not_found("department", local.to_string()))?;
                Ok(Box::new(LocalLinks {
                    state: Rc::clone(&self.state),
                    owner: LinkOwner::Department(id),
                }))
            }
            EntryType::Project => Err(DirectoryError::not_found("entry", local.to_string())),
        }
    }
}

// =========================================================================
// Links
// =========================================================================

#[derive(Debug, Clone, Copy)]
enum LinkOwner {
    User(Uuid),
    Department(Uuid),
}

struct LocalLinks {
    state: Rc<LocalState>,
    owner: LinkOwner,
}

fn read_links(state: &LocalState, owner: LinkOwner) -> Result<LinkSet> {
    let store = state.store.borrow();
    match owner {
        LinkOwner::User(id) => store
            .user(id)
            .map(|u| u.links.clone())
            .ok_or_else(|| DirectoryError::not_found("user", id.to_string())),
        LinkOwner::Department(id) => store
            .department(id)
            .map(|d| d.links.clone())
            .ok_or_else(|| DirectoryError::not_found("department", id.to_string())),
    }
}

fn write_links(state: &LocalState, owner: LinkOwner, links: &LinkSet) -> Result<()> {
    state.commit(|store| {
        match owner {
            LinkOwner::User(id) => {
                let user = store
                    .user_mut(id)
                    .ok_or_else(|| DirectoryError::not_found("user", id.to_string()))?;
                user.links = links.clone();
                user.updated_at = Utc::now();
            }
            LinkOwner::Department(id) => {
                store
                    .department_mut(id)
                    .ok_or_else(|| DirectoryError::not_found("department", id.to_string()))?
                    .links = links.clone();
            }
        }
        Ok(())
    })
}

impl Linkable for LocalLinks {
    fn link_set(&self) -> Result<LinkSet> {
        read_links(&self.state, self.owner)
    }

    fn set_link_set(&self, links: &LinkSet) -> Result<()> {
        write_links(&self.state, self.owner, links)
    }
}

// =========================================================================
// Departments
// =========================================================================

/// Department view over the local store
struct LocalDepartment {
    state: Rc<LocalState>,
    id: String,
    record: StoredDepartment,
}

impl Entry for LocalDepartment {
    fn id(&self) -> &str {
        &self.id
    }

    fn target_key(&self) -> &TargetKey {
        &self.state.key
    }
}

impl DepartmentEntry for LocalDepartment {
    fn name(&self) -> &str {
        &self.record.name
    }

    fn description(&self) -> &str {
        &self.record.description
    }

    fn children(&self) -> Result<Vec<Box<dyn DepartmentEntry>>> {
        let ids: Vec<Uuid> = self
            .state
            .store
            .borrow()
            .departments
            .iter()
            .filter(|d| d.parent_id == Some(self.record.id))
            .map(|d| d.id)
            .collect();
        ids.into_iter()
            .map(|id| department_view(&self.state, id))
            .collect()
    }

    fn users(&self) -> Result<Vec<Box<dyn UserEntry>>> {
        let store = self.state.store.borrow();
        Ok(store
            .users
            .iter()
            .filter(|u| u.departments.contains_key(&self.record.id))
            .map(|u| Box::new(self.state.user_record(u)) as Box<dyn UserEntry>)
            .collect())
    }

    fn as_writer(&self) -> Option<&dyn DepartmentWriter> {
        Some(self)
    }

    fn as_linkable(&self) -> Option<&dyn Linkable> {
        Some(self)
    }
}

impl DepartmentWriter for LocalDepartment {
    fn create_child(&self, draft: &DepartmentDraft) -> Result<Box<dyn DepartmentEntry>> {
        if draft.name.is_empty() {
            return Err(DirectoryError::Config("department name is required".into()));
        }
        let child = StoredDepartment {
            id: Uuid::new_v4(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            parent_id: Some(self.record.id),
            links: LinkSet::new(),
            created_at: Utc::now(),
        };
        let id = child.id;
        self.state.commit(|store| {
            store.departments.push(child);
            Ok(())
        })?;
        debug!("Created department {} under {}", id, self.record.id);
        department_view(&self.state, id)
    }

    fn add_user(&self, options: MembershipOptions, user: &ExternalIdentity) -> Result<()> {
        let id = self.member_id(user)?;
        self.state.commit(|store| {
            let stored = store
                .user_mut(id)
                .ok_or_else(|| DirectoryError::not_found("user", user.to_string()))?;
            stored.departments.insert(self.record.id, options.role);
            stored.updated_at = Utc::now();
            Ok(())
        })
    }

    fn remove_user(&self, _options: MembershipOptions, user: &ExternalIdentity) -> Result<()> {
        let id = self.member_id(user)?;
        self.state.commit(|store| {
            let stored = store
                .user_mut(id)
                .ok_or_else(|| DirectoryError::not_found("user", user.to_string()))?;
            if stored.departments.remove(&self.record.id).is_none() {
                return Err(DirectoryError::not_found(
                    "membership",
                    format!("{} in {}", user, self.record.name),
                ));
            }
            stored.updated_at = Utc::now();
            Ok(())
        })
    }
}

impl LocalDepartment {
    fn member_id(&self, user: &ExternalIdentity) -> Result<Uuid> {
        if user.entry_type() != EntryType::User || !user.is_internal_to(&self.state.key) {
            return Err(DirectoryError::not_found("user", user.to_string()));
        }
        parse_id("user", user.internal_id())
    }
}

impl Linkable for LocalDepartment {
    fn link_set(&self) -> Result<LinkSet> {
        read_links(&self.state, LinkOwner::Department(self.record.id))
    }

    fn set_link_set(&self, links: &LinkSet) -> Result<()> {
        write_links(&self.state, LinkOwner::Department(self.record.id), links)
    }
}
