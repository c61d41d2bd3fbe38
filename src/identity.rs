// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! External identity tokens and link sets
//!
//! An external identity names one entry on one configured backend:
//!
//! ```text
//! ei.<entry_type>.<internal_id>@<tenant_slug>.<platform>
//! ```
//!
//! The wire form looks like a mail address so it survives backends that only
//! offer e-mail typed fields. Internally the token is always held parsed;
//! the string is rebuilt by [`fmt::Display`].

use crate::entry::{DepartmentEntry, Entry, UserEntry};
use crate::error::{DirectoryError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Literal first segment of every token
pub const PREFIX: &str = "ei";

/// Kind of entry a token points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryType {
    /// A person
    #[serde(rename = "user")]
    User,
    /// A department, group or team
    #[serde(rename = "dept")]
    Department,
    /// Reserved; no backend mints project tokens yet
    #[serde(rename = "project")]
    Project,
}

impl EntryType {
    /// Wire tag used in segment 1 of a token
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Department => "dept",
            Self::Project => "project",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for EntryType {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "dept" => Ok(Self::Department),
            "project" => Ok(Self::Project),
            other => Err(DirectoryError::MalformedToken {
                raw: other.to_string(),
                reason: "unknown entry type",
            }),
        }
    }
}

/// The (platform, tenant slug) pair identifying one configured backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetKey {
    platform: String,
    tenant_slug: String,
}

impl TargetKey {
    /// Build a key from its two halves
    pub fn new(platform: impl Into<String>, tenant_slug: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            tenant_slug: tenant_slug.into(),
        }
    }

    /// Backend kind, e.g. `local`
    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Tenant within the platform
    #[must_use]
    pub fn tenant_slug(&self) -> &str {
        &self.tenant_slug
    }
}

/// Rendered as `<slug>.<platform>`, the suffix every token of this backend carries
impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.tenant_slug, self.platform)
    }
}

/// Parsed cross-platform reference to a user or department
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalIdentity {
    entry_type: EntryType,
    internal_id: String,
    tenant_slug: String,
    platform: String,
}

impl ExternalIdentity {
    /// Build an identity from components, rejecting any that would break the grammar
    pub fn new(
        entry_type: EntryType,
        internal_id: impl Into<String>,
        tenant_slug: impl Into<String>,
        platform: impl Into<String>,
    ) -> Result<Self> {
        let internal_id = internal_id.into();
        let tenant_slug = tenant_slug.into();
        let platform = platform.into();
        check_component("internal_id", &internal_id)?;
        check_component("tenant_slug", &tenant_slug)?;
        check_component("platform", &platform)?;
        Ok(Self {
            entry_type,
            internal_id,
            tenant_slug,
            platform,
        })
    }

    /// Parse a wire token. Either the whole token is valid or it is rejected.
    ///
    /// Stricter than the bare `ei.<type>.<id>@<slug>.<platform>` shape: the
    /// type must be `user`, `dept` or `project`, and none of id, slug or
    /// platform may be empty. `ei.group.1@acme.local` and `ei.user.@acme.local`
    /// are both [`DirectoryError::MalformedToken`].
    pub fn parse(raw: &str) -> Result<Self> {
        let malformed = |reason| DirectoryError::MalformedToken {
            raw: raw.to_string(),
            reason,
        };

        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() != 4 {
            return Err(malformed("expected 4 dot-separated segments"));
        }
        if segments[0] != PREFIX {
            return Err(malformed("missing 'ei' prefix"));
        }
        let pair: Vec<&str> = segments[2].split('@').collect();
        if pair.len() != 2 {
            return Err(malformed("expected exactly one '@' in the id segment"));
        }
        let entry_type = segments[1]
            .parse::<EntryType>()
            .map_err(|_| malformed("unknown entry type"))?;
        if pair[0].is_empty() || pair[1].is_empty() || segments[3].is_empty() {
            return Err(malformed("empty component"));
        }

        Ok(Self {
            entry_type,
            internal_id: pair[0].to_string(),
            tenant_slug: pair[1].to_string(),
            platform: segments[3].to_string(),
        })
    }

    /// Canonical identity of a user owned by `target`
    pub fn of_user(target: &TargetKey, user: &dyn UserEntry) -> Result<Self> {
        Self::new(
            EntryType::User,
            user.id(),
            target.tenant_slug(),
            target.platform(),
        )
    }

    /// Canonical identity of a department owned by `target`
    pub fn of_department(target: &TargetKey, department: &dyn DepartmentEntry) -> Result<Self> {
        Self::new(
            EntryType::Department,
            department.id(),
            target.tenant_slug(),
            target.platform(),
        )
    }

    /// Canonical identity of any entry, using the target the entry reports
    pub fn of_entry(entry: &dyn Entry, entry_type: EntryType) -> Result<Self> {
        let key = entry.target_key();
        Self::new(entry_type, entry.id(), key.tenant_slug(), key.platform())
    }

    /// Kind of entry referenced
    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    /// Backend-local primary key
    #[must_use]
    pub fn internal_id(&self) -> &str {
        &self.internal_id
    }

    /// Tenant the entry lives in
    #[must_use]
    pub fn tenant_slug(&self) -> &str {
        &self.tenant_slug
    }

    /// Backend kind the entry lives on
    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Key of the backend that owns the entry
    #[must_use]
    pub fn target_key(&self) -> TargetKey {
        TargetKey::new(self.platform.clone(), self.tenant_slug.clone())
    }

    /// True when `target` can serve this token by local id
    #[must_use]
    pub fn is_internal_to(&self, target: &TargetKey) -> bool {
        self.platform == target.platform() && self.tenant_slug == target.tenant_slug()
    }
}

impl fmt::Display for ExternalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}.{}.{}@{}.{}",
            self.entry_type, self.internal_id, self.tenant_slug, self.platform
        )
    }
}

impl FromStr for ExternalIdentity {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ExternalIdentity {
    type Error = DirectoryError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ExternalIdentity> for String {
    fn from(value: ExternalIdentity) -> Self {
        value.to_string()
    }
}

/// Render a wire token from loose components
pub fn format(
    entry_type: EntryType,
    internal_id: &str,
    tenant_slug: &str,
    platform: &str,
) -> Result<String> {
    ExternalIdentity::new(entry_type, internal_id, tenant_slug, platform).map(|id| id.to_string())
}

fn check_component(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains(|c| c == '.' || c == '@') {
        return Err(DirectoryError::InvalidComponent {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Tokens an entry is "also known as"
///
/// Order carries no meaning; the set iterates sorted so that persisted
/// output is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LinkSet(BTreeSet<ExternalIdentity>);

impl LinkSet {
    /// Empty link set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode persisted strings, skipping any that are not valid tokens
    pub fn from_strings<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for item in raw {
            match ExternalIdentity::parse(item.as_ref()) {
                Ok(id) => {
                    set.insert(id);
                }
                Err(err) => tracing::warn!("dropping stored link: {}", err),
            }
        }
        Self(set)
    }

    /// Wire strings, sorted
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    /// Add a token; returns false if it was already present
    pub fn insert(&mut self, id: ExternalIdentity) -> bool {
        self.0.insert(id)
    }

    /// Remove a token; returns false if it was absent
    pub fn remove(&mut self, id: &ExternalIdentity) -> bool {
        self.0.remove(id)
    }

    /// Membership test
    #[must_use]
    pub fn contains(&self, id: &ExternalIdentity) -> bool {
        self.0.contains(id)
    }

    /// Add every token of `other`; returns true if the set grew
    pub fn union_with(&mut self, other: &LinkSet) -> bool {
        let before = self.0.len();
        self.0.extend(other.0.iter().cloned());
        self.0.len() > before
    }

    /// Number of tokens
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no links are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate tokens in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &ExternalIdentity> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for LinkSet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<String>::deserialize(deserializer)?;
        Ok(Self::from_strings(raw))
    }
}

impl FromIterator<ExternalIdentity> for LinkSet {
    fn from_iter<T: IntoIterator<Item = ExternalIdentity>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<ExternalIdentity> for LinkSet {
    fn extend<T: IntoIterator<Item = ExternalIdentity>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a LinkSet {
    type Item = &'a ExternalIdentity;
    type IntoIter = std::collections::btree_set::Iter<'a, ExternalIdentity>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
