// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Department hierarchy traversal
//!
//! Both walks are pre-order and keep the order the backend returns. Any
//! backend error aborts the walk. A department that is its own ancestor
//! aborts it with [`DirectoryError::CycleDetected`]; one reached again
//! through a second parent aborts it with
//! [`DirectoryError::RepeatedDepartment`].

use crate::entry::{DepartmentEntry, UserEntry};
use crate::error::{DirectoryError, Result};
use crate::identity::{ExternalIdentity, TargetKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::debug;

type DepartmentKey = (TargetKey, String);

/// Departments seen so far, plus the ancestors of the current one
#[derive(Default)]
struct Visited {
    seen: HashSet<DepartmentKey>,
    path: Vec<DepartmentKey>,
}

impl Visited {
    fn enter(&mut self, department: &dyn DepartmentEntry) -> Result<()> {
        let key = (department.target_key().clone(), department.id().to_string());
        if self.seen.insert(key.clone()) {
            self.path.push(key);
            return Ok(());
        }
        let name = ExternalIdentity::of_department(department.target_key(), department)
            .map_or_else(|_| department.id().to_string(), |id| id.to_string());
        if self.path.contains(&key) {
            Err(DirectoryError::CycleDetected { department: name })
        } else {
            Err(DirectoryError::RepeatedDepartment { department: name })
        }
    }

    fn leave(&mut self) {
        self.path.pop();
    }
}

/// Every user reachable from `root`: direct members first, then each child subtree
pub fn collect_all_users(root: &dyn DepartmentEntry) -> Result<Vec<Box<dyn UserEntry>>> {
    let mut users = Vec::new();
    let mut visited = Visited::default();
    collect_into(root, &mut visited, &mut users)?;
    Ok(users)
}

fn collect_into(
    department: &dyn DepartmentEntry,
    visited: &mut Visited,
    out: &mut Vec<Box<dyn UserEntry>>,
) -> Result<()> {
    visited.enter(department)?;
    let members = department.users()?;
    debug!(
        "Department {} ({}): {} direct member(s)",
        department.name(),
        department.id(),
        members.len()
    );
    out.extend(members);
    for child in department.children()? {
        collect_into(child.as_ref(), visited, out)?;
    }
    visited.leave();
    Ok(())
}

/// What a snapshot materializes besides the root itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// Copy direct members of every department
    pub include_users: bool,
    /// Descend into child departments
    pub include_children: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            include_users: true,
            include_children: true,
        }
    }
}

/// Detached copy of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    /// Canonical identity
    pub identity: ExternalIdentity,
    /// Backend-local id
    pub id: String,
    /// Display name
    pub name: String,
    /// Primary e-mail
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    /// Primary phone
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone: String,
}

/// Detached copy of a department subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentSnapshot {
    /// Canonical identity
    pub identity: ExternalIdentity,
    /// Backend-local id
    pub id: String,
    /// Display name
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Direct members
    #[serde(default)]
    pub users: Vec<UserSnapshot>,
    /// Child departments
    #[serde(default)]
    pub children: Vec<DepartmentSnapshot>,
}

/// Materialize the subtree under `root`
pub fn snapshot(
    root: &dyn DepartmentEntry,
    options: SnapshotOptions,
) -> Result<DepartmentSnapshot> {
    let mut visited = Visited::default();
    snapshot_department(root, options, &mut visited)
}

fn snapshot_department(
    department: &dyn DepartmentEntry,
    options: SnapshotOptions,
    visited: &mut Visited,
) -> Result<DepartmentSnapshot> {
    visited.enter(department)?;
    let key = department.target_key();

    let users = if options.include_users {
        department
            .users()?
            .iter()
            .map(|user| -> Result<UserSnapshot> {
                Ok(UserSnapshot {
                    identity: ExternalIdentity::of_user(key, user.as_ref())?,
                    id: user.id().to_string(),
                    name: user.name().to_string(),
                    email: user.email().to_string(),
                    phone: user.phone().to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        Vec::new()
    };

    let children = if options.include_children {
        department
            .children()?
            .iter()
            .map(|child| snapshot_department(child.as_ref(), options, visited))
            .collect::<Result<Vec<_>>>()?
    } else {
        Vec::new()
    };
    visited.leave();

    debug!(
        "Snapshot of {}: {} user(s), {} child department(s)",
        department.id(),
        users.len(),
        children.len()
    );

    Ok(DepartmentSnapshot {
        identity: ExternalIdentity::of_department(key, department)?,
        id: department.id().to_string(),
        name: department.name().to_string(),
        description: department.description().to_string(),
        users,
        children,
    })
}

impl DepartmentSnapshot {
    /// Users in the whole subtree (a user in two departments counts twice)
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len() + self.children.iter().map(Self::user_count).sum::<usize>()
    }

    /// Departments in the subtree, this one included
    #[must_use]
    pub fn department_count(&self) -> usize {
        1 + self.children.iter().map(Self::department_count).sum::<usize>()
    }

    /// Pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// SHA-256 of the compact JSON form, hex encoded
    pub fn fingerprint(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(self)?);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Export to DOT format for Graphviz
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph departments {\n");
        dot.push_str("  rankdir=TB;\n");
        dot.push_str("  node [shape=box, style=rounded];\n\n");
        self.write_dot(&mut dot);
        dot.push_str("}\n");
        dot
    }

    fn write_dot(&self, dot: &mut String) {
        dot.push_str(&format!(
            "  \"{}\" [label=\"{}\"];\n",
            self.identity,
            escape(&self.name)
        ));
        for user in &self.users {
            dot.push_str(&format!(
                "  \"{}\" [label=\"{}\", shape=ellipse];\n",
                user.identity,
                escape(&user.name)
            ));
            dot.push_str(&format!("  \"{}\" -> \"{}\";\n", self.identity, user.identity));
        }
        for child in &self.children {
            dot.push_str(&format!("  \"{}\" -> \"{}\";\n", self.identity, child.identity));
            child.write_dot(dot);
        }
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
