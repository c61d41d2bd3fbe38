// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Error taxonomy shared by the codec, registry, walker and sync code

use crate::identity::{EntryType, TargetKey};
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Errors raised by the directory core and its backends
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// An identity string does not follow `ei.<type>.<id>@<slug>.<platform>`
    #[error("malformed external identity '{raw}': {reason}")]
    MalformedToken {
        /// The rejected input
        raw: String,
        /// Which rule was violated
        reason: &'static str,
    },

    /// A component cannot be embedded in an identity token
    #[error("invalid {field} '{value}': must be non-empty and free of '.' and '@'")]
    InvalidComponent {
        /// Component name (internal_id, tenant_slug, platform)
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// Zero or several matches where exactly one was required
    #[error("{what} not found: {key}")]
    NotFound {
        /// Kind of object looked up (target, user, department)
        what: &'static str,
        /// Lookup key as shown to the user
        key: String,
    },

    /// A token names a different kind of entry than the operation needs
    #[error("{found} is not a {expected} identity")]
    WrongEntryType {
        /// Entry type the operation works on
        expected: EntryType,
        /// Offending token
        found: String,
    },

    /// Opaque failure from the underlying platform call
    #[error("backend error on {target}: {source}")]
    Backend {
        /// Backend that failed
        target: String,
        /// Vendor error, propagated unchanged
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Optional operation requested on a backend that does not offer it
    #[error("{target} does not support {capability}")]
    UnsupportedCapability {
        /// Backend that lacks the capability
        target: TargetKey,
        /// Capability name
        capability: &'static str,
    },

    /// Fuzzy lookup matched more than one destination record
    #[error("{candidate} matched {matches} records on {target}")]
    AmbiguousMatch {
        /// Identity of the source record
        candidate: String,
        /// Destination searched
        target: TargetKey,
        /// Number of matches
        matches: usize,
    },

    /// A department turned out to be its own ancestor
    #[error("department {department} is its own ancestor; hierarchy contains a cycle")]
    CycleDetected {
        /// Wire identity (or local id) of the revisited department
        department: String,
    },

    /// A department was reached through more than one parent
    #[error("department {department} was reached twice; it has more than one parent")]
    RepeatedDepartment {
        /// Wire identity (or local id) of the revisited department
        department: String,
    },

    /// Sync source and destination are the same backend
    #[error("sync source and destination are both {0}")]
    SameTarget(TargetKey),

    /// Registry or target configuration problem
    #[error("configuration error: {0}")]
    Config(String),

    /// Local store I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Local store (de)serialization failure
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DirectoryError {
    /// Wrap a vendor error raised while talking to `target`
    pub fn backend<E>(target: &TargetKey, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Backend {
            target: target.to_string(),
            source: source.into(),
        }
    }

    /// Shorthand for [`DirectoryError::NotFound`]
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            key: key.into(),
        }
    }

    /// Shorthand for [`DirectoryError::UnsupportedCapability`]
    #[must_use]
    pub fn unsupported(target: &TargetKey, capability: &'static str) -> Self {
        Self::UnsupportedCapability {
            target: target.clone(),
            capability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_keeps_source() {
        let key = TargetKey::new("local", "acme");
        let err = DirectoryError::backend(&key, "socket closed");

        assert_eq!(err.to_string(), "backend error on acme.local: socket closed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_unsupported_names_capability() {
        let key = TargetKey::new("msdir", "acme");
        let err = DirectoryError::unsupported(&key, "create-user");

        assert!(err.to_string().contains("create-user"));
        assert!(err.to_string().contains("acme.msdir"));
    }
}
