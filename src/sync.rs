// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Cross-target user reconciliation

use crate::entry::{Entry, NewUser, UserEntry, UserRecord};
use crate::error::{DirectoryError, Result};
use crate::identity::ExternalIdentity;
use crate::target::{Capability, Target};
use crate::tree::collect_all_users;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Collapse entries sharing a local id
///
/// One entry survives per id: the value of its last occurrence, kept at the
/// position of its first occurrence.
pub fn deduplicate<T: Entry>(entries: Vec<T>) -> Vec<T> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(entries.len());
    let mut out: Vec<T> = Vec::with_capacity(entries.len());
    for entry in entries {
        match slots.get(entry.id()).copied() {
            Some(slot) => out[slot] = entry,
            None => {
                slots.insert(entry.id().to_string(), out.len());
                out.push(entry);
            }
        }
    }
    out
}

fn absorb(into: &mut BTreeSet<String>, values: BTreeSet<String>) -> bool {
    let before = into.len();
    into.extend(values);
    into.len() > before
}

/// Fold `candidate` into `existing`; returns true if anything was added
///
/// Names, e-mails and phones are unioned and the candidate's canonical
/// identity joins the link set. Repeating a merge changes nothing.
pub fn merge(existing: &mut UserRecord, candidate: &dyn UserEntry) -> Result<bool> {
    let identity = ExternalIdentity::of_user(candidate.target_key(), candidate)?;
    let mut changed = absorb(&mut existing.names, candidate.names());
    changed |= absorb(&mut existing.emails, candidate.emails());
    changed |= absorb(&mut existing.phones, candidate.phones());
    changed |= existing.links.insert(identity);
    Ok(changed)
}

/// Knobs for [`sync_users`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Look up matches but write nothing
    pub dry_run: bool,
}

/// Outcome of one sync run
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Users read from the source
    pub total: usize,
    /// Users left after deduplication
    pub unique: usize,
    /// Users created on the destination (or that would be, in a dry run)
    pub created: usize,
    /// Existing destination users that gained data
    pub merged: usize,
    /// Existing destination users that already had everything
    pub unchanged: usize,
    /// Source users skipped because several destination users matched
    pub ambiguous: Vec<DirectoryError>,
}

fn source_users(source: &dyn Target) -> Result<Vec<Box<dyn UserEntry>>> {
    match source.as_user_lister() {
        Some(lister) => lister.all_users(),
        None => {
            debug!("{} cannot list users; walking its hierarchy", source.key());
            collect_all_users(source.root_department()?.as_ref())
        }
    }
}

/// Copy every user of `source` into `destination`, merging into look-alikes
///
/// The destination must offer user creation and fuzzy lookup. Any backend
/// error aborts the run; ambiguous matches are reported and skipped.
pub fn sync_users(
    source: &dyn Target,
    destination: &dyn Target,
    options: SyncOptions,
) -> Result<SyncReport> {
    if source.key() == destination.key() {
        return Err(DirectoryError::SameTarget(source.key().clone()));
    }
    let writer = destination.as_user_writer().ok_or_else(|| {
        DirectoryError::unsupported(destination.key(), Capability::CreateUser.name())
    })?;
    let lookup = destination.as_fuzzy_lookup().ok_or_else(|| {
        DirectoryError::unsupported(destination.key(), Capability::FuzzyLookup.name())
    })?;

    let users = source_users(source)?;
    let total = users.len();
    let users = deduplicate(users);
    let mut report = SyncReport {
        total,
        unique: users.len(),
        ..SyncReport::default()
    };
    info!(
        "Syncing {} user(s) ({} unique) from {} to {}",
        report.total,
        report.unique,
        source.key(),
        destination.key()
    );

    for user in &users {
        let user = user.as_ref();
        let mut matches = lookup.lookup_user_fuzzy(user)?;
        match matches.len() {
            0 => {
                debug!("create {} ({})", user.name(), user.id());
                if !options.dry_run {
                    writer.create_user(&NewUser::from_entry(user)?)?;
                }
                report.created += 1;
            }
            1 => {
                let mut existing = matches.remove(0);
                if merge(&mut existing, user)? {
                    debug!("merge {} into {}", user.name(), existing.name);
                    if !options.dry_run {
                        writer.update_user(&existing)?;
                    }
                    report.merged += 1;
                } else {
                    report.unchanged += 1;
                }
            }
            n => {
                let err = DirectoryError::AmbiguousMatch {
                    candidate: ExternalIdentity::of_user(source.key(), user)?.to_string(),
                    target: destination.key().clone(),
                    matches: n,
                };
                warn!("{}", err);
                report.ambiguous.push(err);
            }
        }
    }

    info!(
        "Sync done: {} created, {} merged, {} unchanged, {} ambiguous{}",
        report.created,
        report.merged,
        report.unchanged,
        report.ambiguous.len(),
        if options.dry_run { " (dry run)" } else { "" }
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::TargetKey;

    fn user(id: &str, name: &str) -> UserRecord {
        UserRecord::new(TargetKey::new("local", "src"), id, name)
    }

    #[test]
    fn test_deduplicate_last_value_first_position() {
        let out = deduplicate(vec![user("1", "a"), user("2", "b"), user("1", "c")]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "1");
        assert_eq!(out[0].name, "c");
        assert_eq!(out[1].name, "b");
    }

    #[test]
    fn test_deduplicate_empty() {
        assert!(deduplicate(Vec::<UserRecord>::new()).is_empty());
    }

    #[test]
    fn test_merge_unions_and_links() {
        let mut existing = UserRecord::new(TargetKey::new("local", "dst"), "9", "Ada Lovelace")
            .with_email("ada@old.example");
        let candidate = user("1", "Ada").with_email("ada@new.example").with_phone("555");

        assert!(merge(&mut existing, &candidate).unwrap());
        assert_eq!(existing.names.len(), 2);
        assert_eq!(existing.emails.len(), 2);
        assert!(existing.phones.contains("555"));
        assert_eq!(existing.links.to_strings(), vec!["ei.user.1@src.local".to_string()]);

        let once = existing.clone();
        assert!(!merge(&mut existing, &candidate).unwrap());
        assert_eq!(existing, once);
    }

    #[test]
    fn test_merge_keeps_primary_fields() {
        let mut existing = UserRecord::new(TargetKey::new("local", "dst"), "9", "Ada");
        merge(&mut existing, &user("1", "Countess")).unwrap();
        assert_eq!(existing.name, "Ada");
    }
}
