// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Users and departments as seen through any backend
//!
//! Entries are short-lived views built from a backend query. Nothing here
//! caches them; asking the backend again always re-fetches.

use crate::error::{DirectoryError, Result};
use crate::identity::{ExternalIdentity, LinkSet, TargetKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Anything with a backend-local id that belongs to exactly one target
pub trait Entry {
    /// Backend-local primary key
    fn id(&self) -> &str;

    /// Target that owns this entry
    fn target_key(&self) -> &TargetKey;
}

impl<T: Entry + ?Sized> Entry for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn target_key(&self) -> &TargetKey {
        (**self).target_key()
    }
}

/// A person
pub trait UserEntry: Entry {
    /// Display name
    fn name(&self) -> &str;

    /// Primary e-mail, empty if unknown
    fn email(&self) -> &str;

    /// Primary phone, empty if unknown
    fn phone(&self) -> &str;

    /// Other names this person is known by
    fn alternate_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Other e-mail addresses
    fn alternate_emails(&self) -> Vec<String> {
        Vec::new()
    }

    /// Other phone numbers
    fn alternate_phones(&self) -> Vec<String> {
        Vec::new()
    }

    /// Primary name plus alternates, empties removed
    fn names(&self) -> BTreeSet<String> {
        value_set(self.name(), self.alternate_names())
    }

    /// Primary e-mail plus alternates, empties removed
    fn emails(&self) -> BTreeSet<String> {
        value_set(self.email(), self.alternate_emails())
    }

    /// Primary phone plus alternates, empties removed
    fn phones(&self) -> BTreeSet<String> {
        value_set(self.phone(), self.alternate_phones())
    }
}

fn value_set(primary: &str, rest: Vec<String>) -> BTreeSet<String> {
    std::iter::once(primary.to_string())
        .chain(rest)
        .filter(|v| !v.is_empty())
        .collect()
}

/// A department, group or team
pub trait DepartmentEntry: Entry {
    /// Display name
    fn name(&self) -> &str;

    /// Free-form description
    fn description(&self) -> &str {
        ""
    }

    /// Direct child departments, in backend order
    fn children(&self) -> Result<Vec<Box<dyn DepartmentEntry>>>;

    /// Direct members, in backend order
    fn users(&self) -> Result<Vec<Box<dyn UserEntry>>>;

    /// Write access, when the backend offers it
    fn as_writer(&self) -> Option<&dyn DepartmentWriter> {
        None
    }

    /// Link-set storage, when the backend offers it
    fn as_linkable(&self) -> Option<&dyn Linkable> {
        None
    }
}

/// Fields for a new child department
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentDraft {
    /// Display name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
}

/// Role a user holds inside a department
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepartmentRole {
    /// Plain member
    #[default]
    Member,
    /// Department administrator
    Admin,
}

impl fmt::Display for DepartmentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member => f.write_str("member"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

impl FromStr for DepartmentRole {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            other => Err(DirectoryError::Config(format!(
                "unknown role: {other}. Valid: member, admin"
            ))),
        }
    }
}

/// Options for membership changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MembershipOptions {
    /// Role granted (or revoked)
    pub role: DepartmentRole,
}

/// Write capability of a department
pub trait DepartmentWriter {
    /// Create a department directly below this one
    fn create_child(&self, draft: &DepartmentDraft) -> Result<Box<dyn DepartmentEntry>>;

    /// Add a user of the same target as a member
    fn add_user(&self, options: MembershipOptions, user: &ExternalIdentity) -> Result<()>;

    /// Remove a member
    fn remove_user(&self, options: MembershipOptions, user: &ExternalIdentity) -> Result<()>;
}

/// Storage for the "also known as" tokens of one entry
///
/// Updates are read-modify-write: fetch, change, replace. Two writers racing
/// on the same entry can lose an update.
pub trait Linkable {
    /// Current link set
    fn link_set(&self) -> Result<LinkSet>;

    /// Replace the stored link set
    fn set_link_set(&self, links: &LinkSet) -> Result<()>;
}

/// Detached user view, used for creation results, fuzzy matches and merges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Backend-local id
    pub id: String,
    /// Owning target
    pub target: TargetKey,
    /// Display name
    pub name: String,
    /// Primary e-mail
    #[serde(default)]
    pub email: String,
    /// Primary phone
    #[serde(default)]
    pub phone: String,
    /// Every known name, primary included
    #[serde(default)]
    pub names: BTreeSet<String>,
    /// Every known e-mail, primary included
    #[serde(default)]
    pub emails: BTreeSet<String>,
    /// Every known phone, primary included
    #[serde(default)]
    pub phones: BTreeSet<String>,
    /// Linked identities on other targets
    #[serde(default)]
    pub links: LinkSet,
}

impl UserRecord {
    /// Minimal record with only a name
    pub fn new(target: TargetKey, id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            target,
            names: value_set(&name, Vec::new()),
            name,
            email: String::new(),
            phone: String::new(),
            emails: BTreeSet::new(),
            phones: BTreeSet::new(),
            links: LinkSet::new(),
        }
    }

    /// Set the primary e-mail
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        if !self.email.is_empty() {
            self.emails.insert(self.email.clone());
        }
        self
    }

    /// Set the primary phone
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        if !self.phone.is_empty() {
            self.phones.insert(self.phone.clone());
        }
        self
    }

    /// Copy any user view into a detached record (links start empty)
    pub fn from_entry(user: &dyn UserEntry) -> Self {
        Self {
            id: user.id().to_string(),
            target: user.target_key().clone(),
            name: user.name().to_string(),
            email: user.email().to_string(),
            phone: user.phone().to_string(),
            names: user.names(),
            emails: user.emails(),
            phones: user.phones(),
            links: LinkSet::new(),
        }
    }
}

impl Entry for UserRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn target_key(&self) -> &TargetKey {
        &self.target
    }
}

impl UserEntry for UserRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn phone(&self) -> &str {
        &self.phone
    }

    fn alternate_names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    fn alternate_emails(&self) -> Vec<String> {
        self.emails.iter().cloned().collect()
    }

    fn alternate_phones(&self) -> Vec<String> {
        self.phones.iter().cloned().collect()
    }
}

/// Input for creating a user on a writeable target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Display name
    pub name: String,
    /// Primary e-mail
    #[serde(default)]
    pub email: String,
    /// Primary phone
    #[serde(default)]
    pub phone: String,
    /// Extra names
    #[serde(default)]
    pub names: BTreeSet<String>,
    /// Extra e-mails
    #[serde(default)]
    pub emails: BTreeSet<String>,
    /// Extra phones
    #[serde(default)]
    pub phones: BTreeSet<String>,
    /// Identities to link the new user to
    #[serde(default)]
    pub links: LinkSet,
}

impl NewUser {
    /// Draft with primary fields only
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        let (name, email, phone) = (name.into(), email.into(), phone.into());
        Self {
            names: value_set(&name, Vec::new()),
            emails: value_set(&email, Vec::new()),
            phones: value_set(&phone, Vec::new()),
            name,
            email,
            phone,
            links: LinkSet::new(),
        }
    }

    /// Draft copying an existing user, pre-linked to that user's identity
    pub fn from_entry(user: &dyn UserEntry) -> Result<Self> {
        let mut links = LinkSet::new();
        links.insert(ExternalIdentity::of_user(user.target_key(), user)?);
        Ok(Self {
            name: user.name().to_string(),
            email: user.email().to_string(),
            phone: user.phone().to_string(),
            names: user.names(),
            emails: user.emails(),
            phones: user.phones(),
            links,
        })
    }
}
