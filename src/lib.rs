// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Org-manager library - one directory view over many organisation platforms
//!
//! Users and departments from any configured backend ("target") are handled
//! through the same traits. Entries on different targets are tied together
//! with external identity tokens of the form
//! `ei.<entry_type>.<internal_id>@<tenant_slug>.<platform>`.
//!
//! Layers, leaves first: [`identity`] → [`entry`]/[`target`] → [`tree`] →
//! [`sync`] and [`link`]. The [`registry`] turns configuration into live
//! targets; [`local`] is the built-in JSON-file backend.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod commands;
pub mod config;
pub mod entry;
pub mod error;
pub mod identity;
pub mod link;
pub mod local;
pub mod registry;
pub mod sync;
pub mod target;
pub mod tree;

/// Commonly used items
pub mod prelude {
    pub use crate::entry::{
        DepartmentDraft, DepartmentEntry, DepartmentRole, DepartmentWriter, Entry, Linkable,
        MembershipOptions, NewUser, UserEntry, UserRecord,
    };
    pub use crate::error::{DirectoryError, Result};
    pub use crate::identity::{EntryType, ExternalIdentity, LinkSet, TargetKey};
    pub use crate::registry::{PlatformContext, PlatformFactory, Registry, RegistryBuilder};
    pub use crate::sync::{deduplicate, merge, sync_users, SyncOptions, SyncReport};
    pub use crate::target::{
        Capability, EntryCenter, FuzzyUserLookup, Target, UserLister, UserWriter,
    };
    pub use crate::tree::{collect_all_users, snapshot, DepartmentSnapshot, SnapshotOptions};
}
