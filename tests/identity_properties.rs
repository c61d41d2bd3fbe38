// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Property tests for the identity codec, deduplication and merge

use org_manager::identity::format;
use org_manager::prelude::*;
use proptest::prelude::*;

fn component() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,24}"
}

fn entry_type() -> impl Strategy<Value = EntryType> {
    prop_oneof![
        Just(EntryType::User),
        Just(EntryType::Department),
        Just(EntryType::Project),
    ]
}

fn wire_token() -> impl Strategy<Value = String> {
    "ei\\.(user|dept|project)\\.[a-z0-9]{1,8}@[a-z0-9]{1,8}\\.[a-z0-9]{1,8}"
}

fn user_list() -> impl Strategy<Value = Vec<UserRecord>> {
    prop::collection::vec(("[a-e]", "[A-Z][a-z]{0,6}"), 0..24).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(id, name)| UserRecord::new(TargetKey::new("p", "s"), id, name))
            .collect()
    })
}

proptest! {
    #[test]
    fn format_then_parse_round_trips(
        kind in entry_type(),
        id in component(),
        slug in component(),
        platform in component(),
    ) {
        let token = format(kind, &id, &slug, &platform).unwrap();
        let parsed = ExternalIdentity::parse(&token).unwrap();

        prop_assert_eq!(parsed.entry_type(), kind);
        prop_assert_eq!(parsed.internal_id(), id.as_str());
        prop_assert_eq!(parsed.tenant_slug(), slug.as_str());
        prop_assert_eq!(parsed.platform(), platform.as_str());
        prop_assert_eq!(parsed.to_string(), token);
    }

    #[test]
    fn delimiters_never_format(
        id in component(),
        bad in "[A-Za-z0-9]{0,4}[.@][A-Za-z0-9]{0,4}",
    ) {
        prop_assert!(format(EntryType::User, &bad, &id, "p").is_err());
        prop_assert!(format(EntryType::User, &id, &bad, "p").is_err());
        prop_assert!(format(EntryType::User, &id, "s", &bad).is_err());
    }

    #[test]
    fn parse_never_panics(raw in "\\PC{0,64}") {
        let _ = ExternalIdentity::parse(&raw);
    }

    #[test]
    fn parsed_tokens_render_back_verbatim(raw in wire_token()) {
        let parsed = ExternalIdentity::parse(&raw).unwrap();
        prop_assert_eq!(parsed.to_string(), raw);
    }

    #[test]
    fn deduplicate_is_idempotent(users in user_list()) {
        let once = deduplicate(users.clone());
        let twice = deduplicate(once.clone());

        prop_assert_eq!(&once, &twice);
        prop_assert!(once.len() <= users.len());

        let mut ids: Vec<&str> = once.iter().map(|u| u.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), once.len());
    }

    #[test]
    fn deduplicate_keeps_last_value(users in user_list()) {
        let once = deduplicate(users.clone());
        for survivor in &once {
            let last = users.iter().rev().find(|u| u.id == survivor.id).unwrap();
            prop_assert_eq!(&survivor.name, &last.name);
        }
    }

    #[test]
    fn merge_twice_equals_merge_once(
        name in "[A-Z][a-z]{1,8}",
        email in "[a-z]{1,8}@example\\.org",
        phone in "[0-9]{3,10}",
        id in component(),
    ) {
        let candidate = UserRecord::new(TargetKey::new("chat", "acme"), id, name)
            .with_email(email)
            .with_phone(phone);
        let mut existing = UserRecord::new(TargetKey::new("hr", "acme"), "1", "Someone");

        merge(&mut existing, &candidate).unwrap();
        let once = existing.clone();
        let changed = merge(&mut existing, &candidate).unwrap();

        prop_assert!(!changed);
        prop_assert_eq!(existing, once);
    }
}
