// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! In-memory backend shared by the integration tests
//!
//! Departments and users are declared up front with [`MemBuilder`]. Any
//! department can be told to fail when its members are enumerated.

#![allow(dead_code)]

use org_manager::prelude::*;
use org_manager::target::Capabilities;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

struct MemDeptData {
    name: String,
    members: Vec<String>,
    children: Vec<String>,
    fail_users: bool,
}

struct MemData {
    key: TargetKey,
    root: String,
    departments: BTreeMap<String, MemDeptData>,
    users: RefCell<Vec<UserRecord>>,
}

impl MemData {
    fn user(&self, id: &str) -> Option<UserRecord> {
        self.users.borrow().iter().find(|u| u.id == id).cloned()
    }
}

/// Declarative construction of a [`MemTarget`]
pub struct MemBuilder {
    key: TargetKey,
    departments: BTreeMap<String, MemDeptData>,
    users: Vec<UserRecord>,
    listing: bool,
    writable: bool,
}

impl MemBuilder {
    /// Target `<slug>.<platform>` with an empty department `root`
    pub fn new(platform: &str, slug: &str) -> Self {
        let mut departments = BTreeMap::new();
        departments.insert(
            "root".to_string(),
            MemDeptData {
                name: "root".into(),
                members: Vec::new(),
                children: Vec::new(),
                fail_users: false,
            },
        );
        Self {
            key: TargetKey::new(platform, slug),
            departments,
            users: Vec::new(),
            listing: false,
            writable: false,
        }
    }

    /// Add department `id` below `parent`
    pub fn dept(mut self, parent: &str, id: &str) -> Self {
        self.departments.insert(
            id.to_string(),
            MemDeptData {
                name: id.to_string(),
                members: Vec::new(),
                children: Vec::new(),
                fail_users: false,
            },
        );
        if let Some(parent) = self.departments.get_mut(parent) {
            parent.children.push(id.to_string());
        }
        self
    }

    /// Make `child` appear below `parent` as well (cycles, shared subtrees)
    pub fn extra_edge(mut self, parent: &str, child: &str) -> Self {
        if let Some(parent) = self.departments.get_mut(parent) {
            parent.children.push(child.to_string());
        }
        self
    }

    /// Add a user record and make it a member of `dept`
    pub fn member(mut self, dept: &str, user: UserRecord) -> Self {
        if let Some(d) = self.departments.get_mut(dept) {
            d.members.push(user.id.clone());
        }
        if !self.users.iter().any(|u| u.id == user.id) {
            self.users.push(user);
        }
        self
    }

    /// Add a user with only a name, a member of `dept`
    pub fn user(self, dept: &str, id: &str, name: &str) -> Self {
        let record = UserRecord::new(self.key.clone(), id, name);
        self.member(dept, record)
    }

    /// Department `dept` fails on member enumeration
    pub fn failing(mut self, dept: &str) -> Self {
        if let Some(d) = self.departments.get_mut(dept) {
            d.fail_users = true;
        }
        self
    }

    /// Offer `UserLister`
    pub fn listing(mut self) -> Self {
        self.listing = true;
        self
    }

    /// Offer `UserWriter` and `FuzzyUserLookup`
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    pub fn build(self) -> MemTarget {
        MemTarget {
            data: Rc::new(MemData {
                root: "root".into(),
                key: self.key,
                departments: self.departments,
                users: RefCell::new(self.users),
            }),
            listing: self.listing,
            writable: self.writable,
        }
    }
}

/// In-memory target
pub struct MemTarget {
    data: Rc<MemData>,
    listing: bool,
    writable: bool,
}

impl MemTarget {
    /// Snapshot of every stored user record
    pub fn users(&self) -> Vec<UserRecord> {
        self.data.users.borrow().clone()
    }

    /// Concrete root view, for passing to the walker
    pub fn root(&self) -> MemDepartment {
        MemDepartment {
            data: Rc::clone(&self.data),
            id: self.data.root.clone(),
        }
    }
}

pub struct MemDepartment {
    data: Rc<MemData>,
    id: String,
}

impl MemDepartment {
    fn record(&self) -> &MemDeptData {
        &self.data.departments[&self.id]
    }
}

impl Entry for MemDepartment {
    fn id(&self) -> &str {
        &self.id
    }

    fn target_key(&self) -> &TargetKey {
        &self.data.key
    }
}

impl DepartmentEntry for MemDepartment {
    fn name(&self) -> &str {
        &self.record().name
    }

    fn children(&self) -> Result<Vec<Box<dyn DepartmentEntry>>> {
        Ok(self
            .record()
            .children
            .iter()
            .map(|id| {
                Box::new(MemDepartment {
                    data: Rc::clone(&self.data),
                    id: id.clone(),
                }) as Box<dyn DepartmentEntry>
            })
            .collect())
    }

    fn users(&self) -> Result<Vec<Box<dyn UserEntry>>> {
        let record = self.record();
        if record.fail_users {
            return Err(DirectoryError::backend(
                &self.data.key,
                format!("listing members of {} failed", self.id),
            ));
        }
        Ok(record
            .members
            .iter()
            .filter_map(|id| self.data.user(id))
            .map(|u| Box::new(u) as Box<dyn UserEntry>)
            .collect())
    }
}

impl Target for MemTarget {
    fn key(&self) -> &TargetKey {
        &self.data.key
    }

    fn root_department(&self) -> Result<Box<dyn DepartmentEntry>> {
        Ok(Box::new(self.root()))
    }

    fn lookup_user(&self, id: &str) -> Result<Box<dyn UserEntry>> {
        self.data
            .user(id)
            .map(|u| Box::new(u) as Box<dyn UserEntry>)
            .ok_or_else(|| DirectoryError::not_found("user", id))
    }

    fn lookup_department(&self, id: &str) -> Result<Box<dyn DepartmentEntry>> {
        if !self.data.departments.contains_key(id) {
            return Err(DirectoryError::not_found("department", id));
        }
        Ok(Box::new(MemDepartment {
            data: Rc::clone(&self.data),
            id: id.to_string(),
        }))
    }

    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::new();
        if self.listing {
            caps.insert(Capability::ListUsers);
        }
        if self.writable {
            caps.insert(Capability::CreateUser);
            caps.insert(Capability::FuzzyLookup);
        }
        caps
    }

    fn as_user_lister(&self) -> Option<&dyn UserLister> {
        self.listing.then_some(self as &dyn UserLister)
    }

    fn as_user_writer(&self) -> Option<&dyn UserWriter> {
        self.writable.then_some(self as &dyn UserWriter)
    }

    fn as_fuzzy_lookup(&self) -> Option<&dyn FuzzyUserLookup> {
        self.writable.then_some(self as &dyn FuzzyUserLookup)
    }
}

impl UserLister for MemTarget {
    fn all_users(&self) -> Result<Vec<Box<dyn UserEntry>>> {
        Ok(self
            .users()
            .into_iter()
            .map(|u| Box::new(u) as Box<dyn UserEntry>)
            .collect())
    }
}

impl UserWriter for MemTarget {
    fn create_user(&self, user: &NewUser) -> Result<UserRecord> {
        let mut users = self.data.users.borrow_mut();
        let id = format!("n{}", users.len());
        let mut record = UserRecord::new(self.data.key.clone(), id, &user.name)
            .with_email(user.email.clone())
            .with_phone(user.phone.clone());
        record.names.extend(user.names.iter().cloned());
        record.emails.extend(user.emails.iter().cloned());
        record.phones.extend(user.phones.iter().cloned());
        record.links = user.links.clone();
        users.push(record.clone());
        Ok(record)
    }

    fn update_user(&self, user: &UserRecord) -> Result<()> {
        let mut users = self.data.users.borrow_mut();
        let slot = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| DirectoryError::not_found("user", user.id.clone()))?;
        *slot = user.clone();
        Ok(())
    }
}

impl FuzzyUserLookup for MemTarget {
    fn lookup_user_fuzzy(&self, candidate: &dyn UserEntry) -> Result<Vec<UserRecord>> {
        let (names, emails, phones) = (candidate.names(), candidate.emails(), candidate.phones());
        Ok(self
            .users()
            .into_iter()
            .filter(|u| {
                !u.names.is_disjoint(&names)
                    || !u.emails.is_disjoint(&emails)
                    || !u.phones.is_disjoint(&phones)
            })
            .collect())
    }
}

/// User record on `key` with e-mail
pub fn person(key: &TargetKey, id: &str, name: &str, email: &str) -> UserRecord {
    UserRecord::new(key.clone(), id, name).with_email(email)
}
