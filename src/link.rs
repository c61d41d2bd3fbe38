// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Declaring and inspecting "same real-world entity" links
//!
//! Links are stored on entries of an entry-center target. Linking appends to
//! the stored set with a read-modify-write; two concurrent linkers of the
//! same entry can lose one update.

use crate::error::{DirectoryError, Result};
use crate::identity::{EntryType, ExternalIdentity};
use crate::registry::{expect_type, Registry};
use crate::target::{Capability, EntryCenter, Target};
use serde::Serialize;
use tracing::{debug, info};

/// Result of [`link_entries`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The link was stored
    Linked,
    /// The entry center already has an entry carrying this link
    AlreadyLinked {
        /// Entry holding the existing link
        holder: ExternalIdentity,
    },
}

/// A linked identity with its display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedEntry {
    /// Token of the linked entry
    pub identity: ExternalIdentity,
    /// Display name on its own target
    pub name: String,
}

/// Everything `info` shows about one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    /// Canonical token
    pub identity: ExternalIdentity,
    /// Display name
    pub name: String,
    /// Primary e-mail (users)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    /// Primary phone (users)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phone: String,
    /// Description (departments)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Entries this one is linked to, when its target stores links
    pub links: Vec<LinkedEntry>,
    /// Entries on other targets whose link sets name this one
    pub linked_from: Vec<LinkedEntry>,
}

fn entry_center<'a>(target: &'a dyn Target) -> Result<&'a dyn EntryCenter> {
    target
        .as_entry_center()
        .ok_or_else(|| DirectoryError::unsupported(target.key(), Capability::EntryCenter.name()))
}

fn check_linkable(id: &ExternalIdentity) -> Result<()> {
    match id.entry_type() {
        EntryType::User | EntryType::Department => Ok(()),
        EntryType::Project => Err(DirectoryError::WrongEntryType {
            expected: EntryType::User,
            found: id.to_string(),
        }),
    }
}

/// Display name of the entry a token points at
pub fn display_name(registry: &Registry, id: &ExternalIdentity) -> Result<String> {
    match id.entry_type() {
        EntryType::User => Ok(registry.lookup_user(id)?.name().to_string()),
        EntryType::Department => Ok(registry.lookup_department(id)?.name().to_string()),
        EntryType::Project => Err(DirectoryError::not_found("entry", id.to_string())),
    }
}

/// Record that `from` is the same entity as `to`
///
/// `to` must live on an entry-center target; the link is stored in its link
/// set. `from` must exist on its own target.
pub fn link_entries(
    registry: &Registry,
    from: &ExternalIdentity,
    to: &ExternalIdentity,
) -> Result<LinkOutcome> {
    check_linkable(from)?;
    expect_type(to, from.entry_type())?;
    display_name(registry, from)?;

    let center_target = registry.resolve_identity(to)?;
    let center = entry_center(center_target)?;

    if let Some(holder) = center.find_linked(from)? {
        debug!("{} already linked by {}", from, holder);
        return Ok(LinkOutcome::AlreadyLinked { holder });
    }

    let handle = center.link_handle(to)?;
    let mut links = handle.link_set()?;
    links.insert(from.clone());
    handle.set_link_set(&links)?;
    info!("Linked {} to {}", from, to);
    Ok(LinkOutcome::Linked)
}

/// Resolve every token stored in the link set of `id`
pub fn linked_entries(registry: &Registry, id: &ExternalIdentity) -> Result<Vec<LinkedEntry>> {
    let center = entry_center(registry.resolve_identity(id)?)?;
    let links = center.link_handle(id)?.link_set()?;
    links
        .iter()
        .map(|linked| -> Result<LinkedEntry> {
            Ok(LinkedEntry {
                identity: linked.clone(),
                name: display_name(registry, linked)?,
            })
        })
        .collect()
}

/// Entries on other entry-center targets that link to `id`
pub fn linked_from(registry: &Registry, id: &ExternalIdentity) -> Result<Vec<LinkedEntry>> {
    let mut holders = Vec::new();
    for (name, target) in registry.targets() {
        if id.is_internal_to(target.key()) {
            continue;
        }
        let Some(center) = target.as_entry_center() else {
            continue;
        };
        if let Some(holder) = center.find_linked(id)? {
            debug!("{} is linked from target '{}'", id, name);
            holders.push(LinkedEntry {
                name: display_name(registry, &holder)?,
                identity: holder,
            });
        }
    }
    Ok(holders)
}

/// Details and links of one user or department
pub fn describe(registry: &Registry, id: &ExternalIdentity) -> Result<EntrySummary> {
    let target = registry.resolve_identity(id)?;
    let mut summary = match id.entry_type() {
        EntryType::User => {
            let user = target.lookup_user(id.internal_id())?;
            EntrySummary {
                identity: ExternalIdentity::of_user(target.key(), user.as_ref())?,
                name: user.name().to_string(),
                email: user.email().to_string(),
                phone: user.phone().to_string(),
                description: String::new(),
                links: Vec::new(),
                linked_from: Vec::new(),
            }
        }
        EntryType::Department => {
            let dept = target.lookup_department(id.internal_id())?;
            EntrySummary {
                identity: ExternalIdentity::of_department(target.key(), dept.as_ref())?,
                name: dept.name().to_string(),
                email: String::new(),
                phone: String::new(),
                description: dept.description().to_string(),
                links: Vec::new(),
                linked_from: Vec::new(),
            }
        }
        EntryType::Project => return Err(DirectoryError::not_found("entry", id.to_string())),
    };

    if target.as_entry_center().is_some() {
        summary.links = linked_entries(registry, id)?;
    }
    summary.linked_from = linked_from(registry, id)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::NewUser;
    use crate::identity::TargetKey;
    use crate::local::{LocalTarget, DEFAULT_ROOT_ID};
    use crate::registry::{PlatformContext, RegistryBuilder};
    use crate::target::UserWriter;
    use tempfile::TempDir;

    fn local(dir: &TempDir, slug: &str) -> LocalTarget {
        LocalTarget::open(
            TargetKey::new("local", slug),
            dir.path().join(format!("{slug}.json")),
            DEFAULT_ROOT_ID,
        )
        .unwrap()
    }

    fn user_on(target: &LocalTarget, name: &str) -> ExternalIdentity {
        let record = target.create_user(&NewUser::new(name, "", "")).unwrap();
        ExternalIdentity::of_user(target.key(), &record).unwrap()
    }

    #[test]
    fn test_link_then_already_linked() {
        let dir = TempDir::new().unwrap();
        let hr = local(&dir, "hr");
        let chat = local(&dir, "chat");
        let from = user_on(&chat, "Ada (chat)");
        let to = user_on(&hr, "Ada");

        let mut builder = RegistryBuilder::new(PlatformContext::default());
        builder.with_target("hr", Box::new(hr)).with_target("chat", Box::new(chat));
        let registry = builder.init(&[]).unwrap();

        assert_eq!(link_entries(&registry, &from, &to).unwrap(), LinkOutcome::Linked);
        assert_eq!(
            link_entries(&registry, &from, &to).unwrap(),
            LinkOutcome::AlreadyLinked { holder: to.clone() }
        );

        let linked = linked_entries(&registry, &to).unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].name, "Ada (chat)");

        let summary = describe(&registry, &from).unwrap();
        assert_eq!(summary.linked_from.len(), 1);
        assert_eq!(summary.linked_from[0].identity, to);
    }

    #[test]
    fn test_link_rejects_mixed_types_and_missing_source() {
        let dir = TempDir::new().unwrap();
        let hr = local(&dir, "hr");
        let to = user_on(&hr, "Ada");
        let mut builder = RegistryBuilder::new(PlatformContext::default());
        builder.with_target("hr", Box::new(hr));
        let registry = builder.init(&[]).unwrap();

        let dept = ExternalIdentity::new(
            EntryType::Department,
            DEFAULT_ROOT_ID.to_string(),
            "hr",
            "local",
        )
        .unwrap();
        assert!(matches!(
            link_entries(&registry, &dept, &to),
            Err(DirectoryError::WrongEntryType { .. })
        ));

        let ghost = ExternalIdentity::parse("ei.user.nobody@hr.local").unwrap();
        assert!(link_entries(&registry, &ghost, &to).is_err());
    }
}
