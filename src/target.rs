// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Backend surface: the required `Target` trait plus optional capabilities

use crate::entry::{DepartmentEntry, Linkable, NewUser, UserEntry, UserRecord};
use crate::error::Result;
use crate::identity::{ExternalIdentity, TargetKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Optional capabilities a target can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Enumerate every user of the tenant
    ListUsers,
    /// Create and update users
    CreateUser,
    /// Find users by overlapping name, e-mail or phone
    FuzzyLookup,
    /// Reverse lookup from a foreign token to a linking local entry
    EntryCenter,
}

impl Capability {
    /// Every capability, in declaration order
    pub const ALL: [Capability; 4] = [
        Self::ListUsers,
        Self::CreateUser,
        Self::FuzzyLookup,
        Self::EntryCenter,
    ];

    /// Stable name for messages
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListUsers => "list-users",
            Self::CreateUser => "create-user",
            Self::FuzzyLookup => "fuzzy-lookup",
            Self::EntryCenter => "entry-center",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared capability set of a target
pub type Capabilities = BTreeSet<Capability>;

/// One configured connection to a directory platform
pub trait Target {
    /// (platform, tenant slug) of this connection
    fn key(&self) -> &TargetKey;

    /// Top of the department hierarchy
    fn root_department(&self) -> Result<Box<dyn DepartmentEntry>>;

    /// Fetch a user by backend-local id
    fn lookup_user(&self, id: &str) -> Result<Box<dyn UserEntry>>;

    /// Fetch a department by backend-local id
    fn lookup_department(&self, id: &str) -> Result<Box<dyn DepartmentEntry>>;

    /// Capabilities this target claims; checked against the `as_*` accessors at registration
    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
    }

    /// See [`Capability::ListUsers`]
    fn as_user_lister(&self) -> Option<&dyn UserLister> {
        None
    }

    /// See [`Capability::CreateUser`]
    fn as_user_writer(&self) -> Option<&dyn UserWriter> {
        None
    }

    /// See [`Capability::FuzzyLookup`]
    fn as_fuzzy_lookup(&self) -> Option<&dyn FuzzyUserLookup> {
        None
    }

    /// See [`Capability::EntryCenter`]
    fn as_entry_center(&self) -> Option<&dyn EntryCenter> {
        None
    }

    /// Release resources; called once by registry teardown
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Capabilities actually reachable through the `as_*` accessors
pub fn probe_capabilities(target: &dyn Target) -> Capabilities {
    Capability::ALL
        .into_iter()
        .filter(|cap| match cap {
            Capability::ListUsers => target.as_user_lister().is_some(),
            Capability::CreateUser => target.as_user_writer().is_some(),
            Capability::FuzzyLookup => target.as_fuzzy_lookup().is_some(),
            Capability::EntryCenter => target.as_entry_center().is_some(),
        })
        .collect()
}

/// Enumerate every user of a tenant, paging internally as needed
pub trait UserLister {
    /// All users, in backend order
    fn all_users(&self) -> Result<Vec<Box<dyn UserEntry>>>;
}

/// Create and persist users
pub trait UserWriter {
    /// Create a user; not idempotent
    fn create_user(&self, user: &NewUser) -> Result<UserRecord>;

    /// Persist a modified record (names, e-mails, phones, links)
    fn update_user(&self, user: &UserRecord) -> Result<()>;
}

/// Find existing users resembling a candidate
pub trait FuzzyUserLookup {
    /// Every local user sharing a name, e-mail or phone with `candidate`
    fn lookup_user_fuzzy(&self, candidate: &dyn UserEntry) -> Result<Vec<UserRecord>>;
}

/// Reverse lookup for targets that store links for other targets
pub trait EntryCenter {
    /// Local entry whose link set contains `foreign`, if any
    fn find_linked(&self, foreign: &ExternalIdentity) -> Result<Option<ExternalIdentity>>;

    /// Link storage of a local entry
    fn link_handle(&self, local: &ExternalIdentity) -> Result<Box<dyn Linkable>>;
}
