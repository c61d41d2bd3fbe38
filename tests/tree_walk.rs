// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Traversal tests for the department walker
//!
//! These tests verify:
//! 1. Completeness and pre-order of `collect_all_users`
//! 2. Fail-fast error propagation from deep departments
//! 3. Termination on cyclic and shared-subtree hierarchies
//! 4. Snapshots mirror the live structure

mod common;

use common::MemBuilder;
use org_manager::prelude::*;

// =============================================================================
// Test Helpers
// =============================================================================

/// root(r1, r2) -> eng(e1) -> backend(b1, b2); root -> ops(o1)
fn three_levels() -> MemBuilder {
    MemBuilder::new("mem", "acme")
        .user("root", "r1", "Root One")
        .user("root", "r2", "Root Two")
        .dept("root", "eng")
        .user("eng", "e1", "Eng One")
        .dept("eng", "backend")
        .user("backend", "b1", "Backend One")
        .user("backend", "b2", "Backend Two")
        .dept("root", "ops")
        .user("ops", "o1", "Ops One")
}

fn ids(users: &[Box<dyn UserEntry>]) -> Vec<String> {
    users.iter().map(|u| u.id().to_string()).collect()
}

// =============================================================================
// collect_all_users
// =============================================================================

#[test]
fn test_collects_every_level_in_pre_order() {
    let target = three_levels().build();
    let users = collect_all_users(&target.root()).unwrap();

    assert_eq!(ids(&users), vec!["r1", "r2", "e1", "b1", "b2", "o1"]);
}

#[test]
fn test_each_user_appears_once_per_membership() {
    let target = three_levels().build();
    let users = collect_all_users(&target.root()).unwrap();

    let mut seen = ids(&users);
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), users.len());
}

#[test]
fn test_empty_root_gives_empty_list() {
    let target = MemBuilder::new("mem", "empty").build();
    assert!(collect_all_users(&target.root()).unwrap().is_empty());
}

#[test]
fn test_error_two_levels_deep_aborts_walk() {
    let target = three_levels().failing("backend").build();
    let err = collect_all_users(&target.root()).err().unwrap();

    assert!(matches!(err, DirectoryError::Backend { .. }));
    assert!(err.to_string().contains("backend"));
}

#[test]
fn test_error_at_root_aborts_walk() {
    let target = three_levels().failing("root").build();
    assert!(collect_all_users(&target.root()).is_err());
}

#[test]
fn test_cycle_is_reported_not_looped() {
    let target = three_levels().extra_edge("backend", "eng").build();
    let err = collect_all_users(&target.root()).err().unwrap();

    match err {
        DirectoryError::CycleDetected { department } => {
            assert_eq!(department, "ei.dept.eng@acme.mem");
        }
        other => panic!("expected a cycle, got {other}"),
    }
}

#[test]
fn test_department_with_two_parents_is_reported_as_repeated() {
    let target = three_levels().extra_edge("ops", "eng").build();
    let err = collect_all_users(&target.root()).err().unwrap();

    match err {
        DirectoryError::RepeatedDepartment { department } => {
            assert_eq!(department, "ei.dept.eng@acme.mem");
        }
        other => panic!("expected a repeated department, got {other}"),
    }
}

// =============================================================================
// snapshot
// =============================================================================

#[test]
fn test_snapshot_mirrors_structure() {
    let target = three_levels().build();
    let snap = snapshot(&target.root(), SnapshotOptions::default()).unwrap();

    assert_eq!(snap.name, "root");
    assert_eq!(snap.department_count(), 4);
    assert_eq!(snap.user_count(), 6);
    let children: Vec<&str> = snap.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(children, vec!["eng", "ops"]);
    assert_eq!(snap.children[0].children[0].users.len(), 2);
    assert_eq!(
        snap.children[0].children[0].users[1].identity.to_string(),
        "ei.user.b2@acme.mem"
    );
}

#[test]
fn test_snapshot_without_users_skips_member_calls() {
    // A failing member listing is never reached when users are excluded
    let target = three_levels().failing("backend").build();
    let snap = snapshot(
        &target.root(),
        SnapshotOptions {
            include_users: false,
            include_children: true,
        },
    )
    .unwrap();

    assert_eq!(snap.department_count(), 4);
    assert_eq!(snap.user_count(), 0);
}

#[test]
fn test_snapshot_propagates_errors() {
    let target = three_levels().failing("ops").build();
    assert!(snapshot(&target.root(), SnapshotOptions::default()).is_err());
}

#[test]
fn test_snapshot_is_detached() {
    let target = three_levels().build();
    let snap = snapshot(&target.root(), SnapshotOptions::default()).unwrap();
    drop(target);

    let json = snap.to_json().unwrap();
    assert!(json.contains("Backend Two"));
}
