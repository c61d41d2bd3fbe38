// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Department commands - inspect, link, list, draw and edit departments

use super::user::{link_tokens, print_summary};
use super::{parse_token, Globals};
use crate::entry::{
    DepartmentDraft, DepartmentEntry, DepartmentRole, DepartmentWriter, MembershipOptions,
};
use crate::error::DirectoryError;
use crate::identity::{EntryType, ExternalIdentity};
use crate::link;
use crate::registry::{expect_type, Registry};
use crate::tree::{snapshot, DepartmentSnapshot, SnapshotOptions};
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde::Serialize;
use serde_json::json;

/// `dept` subcommands
#[derive(Debug, Subcommand)]
pub enum DeptCommand {
    /// Show a department and the entries linked to it
    Info {
        /// Department identity token
        token: String,
    },

    /// Record that FROM is the same department as TO (TO's target stores the link)
    Link {
        /// Identity to link
        from: String,
        /// Identity on an entry-center target
        to: String,
    },

    /// List every department of a target
    List {
        /// Target name or <platform>/<slug>
        #[arg(short, long)]
        target: String,
    },

    /// Print the hierarchy below a department
    Tree {
        /// Target name or <platform>/<slug> (starts at its root)
        #[arg(short, long, conflicts_with = "department")]
        target: Option<String>,

        /// Department token to start from
        #[arg(short, long)]
        department: Option<String>,

        /// Leave members out
        #[arg(long)]
        no_users: bool,

        /// Graphviz DOT output
        #[arg(long)]
        dot: bool,
    },

    /// Create a department
    Create {
        /// Display name
        name: String,

        /// Parent department token (defaults to the target's root)
        #[arg(long, conflicts_with = "target")]
        parent: Option<String>,

        /// Target name or <platform>/<slug>
        #[arg(short, long)]
        target: Option<String>,

        /// Description
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Add a user to a department
    AddUser {
        /// Department token
        department: String,
        /// User token (same target as the department)
        user: String,
        /// Role: member or admin
        #[arg(long, default_value = "member")]
        role: DepartmentRole,
    },

    /// Remove a user from a department
    RemoveUser {
        /// Department token
        department: String,
        /// User token
        user: String,
    },
}

/// Run dept command
pub fn run(globals: &Globals, command: DeptCommand) -> Result<()> {
    match command {
        DeptCommand::Info { token } => info(globals, &token),
        DeptCommand::Link { from, to } => link_tokens(globals, &from, &to),
        DeptCommand::List { target } => list(globals, &target),
        DeptCommand::Tree {
            target,
            department,
            no_users,
            dot,
        } => tree(
            globals,
            target.as_deref(),
            department.as_deref(),
            SnapshotOptions {
                include_users: !no_users,
                include_children: true,
            },
            dot,
        ),
        DeptCommand::Create {
            name,
            parent,
            target,
            description,
        } => create(
            globals,
            parent.as_deref(),
            target.as_deref(),
            &DepartmentDraft { name, description },
        ),
        DeptCommand::AddUser {
            department,
            user,
            role,
        } => membership(globals, &department, &user, Some(role)),
        DeptCommand::RemoveUser { department, user } => {
            membership(globals, &department, &user, None)
        }
    }
}

fn info(globals: &Globals, token: &str) -> Result<()> {
    let id = parse_token(token)?;
    expect_type(&id, EntryType::Department)?;
    globals.with_registry(|registry| {
        let summary = link::describe(registry, &id)?;
        if globals.json {
            return globals.print_json(&summary);
        }
        print_summary(globals, &summary);
        Ok(())
    })
}

/// Start department: an explicit token, or the root of a selected target
fn start_department(
    registry: &Registry,
    target: Option<&str>,
    department: Option<&str>,
) -> Result<Box<dyn DepartmentEntry>> {
    match (department, target) {
        (Some(token), _) => Ok(registry.lookup_department(&parse_token(token)?)?),
        (None, Some(selector)) => Ok(registry.select(selector)?.root_department()?),
        (None, None) => bail!("Either --target or a department token is required"),
    }
}

#[derive(Serialize)]
struct DeptRow {
    depth: usize,
    identity: ExternalIdentity,
    name: String,
}

fn flatten(snap: &DepartmentSnapshot, depth: usize, out: &mut Vec<DeptRow>) {
    out.push(DeptRow {
        depth,
        identity: snap.identity.clone(),
        name: snap.name.clone(),
    });
    for child in &snap.children {
        flatten(child, depth + 1, out);
    }
}

fn list(globals: &Globals, selector: &str) -> Result<()> {
    globals.with_registry(|registry| {
        let root = registry.select(selector)?.root_department()?;
        let snap = snapshot(
            root.as_ref(),
            SnapshotOptions {
                include_users: false,
                include_children: true,
            },
        )?;
        let mut rows = Vec::new();
        flatten(&snap, 0, &mut rows);

        if globals.json {
            return globals.print_json(&rows);
        }
        for row in &rows {
            println!("{} {}", row.name, globals.token(&row.identity));
        }
        println!("{} department(s)", rows.len());
        Ok(())
    })
}

fn print_tree(globals: &Globals, snap: &DepartmentSnapshot, depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{}{} {}",
        indent,
        globals.heading(&snap.name),
        globals.token(&snap.identity)
    );
    for user in &snap.users {
        println!("{}  - {} {}", indent, user.name, globals.token(&user.identity));
    }
    for child in &snap.children {
        print_tree(globals, child, depth + 1);
    }
}

fn tree(
    globals: &Globals,
    target: Option<&str>,
    department: Option<&str>,
    options: SnapshotOptions,
    dot: bool,
) -> Result<()> {
    globals.with_registry(|registry| {
        let start = start_department(registry, target, department)?;
        let snap = snapshot(start.as_ref(), options)?;

        if dot {
            print!("{}", snap.to_dot());
        } else if globals.json {
            println!("{}", snap.to_json()?);
        } else {
            print_tree(globals, &snap, 0);
            println!(
                "{} department(s), {} membership(s), fingerprint {}",
                snap.department_count(),
                snap.user_count(),
                &snap.fingerprint()?[..12]
            );
        }
        Ok(())
    })
}

fn writer_of(department: &dyn DepartmentEntry) -> Result<&dyn DepartmentWriter> {
    department.as_writer().ok_or_else(|| {
        anyhow::Error::from(DirectoryError::unsupported(
            department.target_key(),
            "department-write",
        ))
    })
}

fn create(
    globals: &Globals,
    parent: Option<&str>,
    target: Option<&str>,
    draft: &DepartmentDraft,
) -> Result<()> {
    globals.with_registry(|registry| {
        let parent = start_department(registry, target, parent)?;
        let child = writer_of(parent.as_ref())?
            .create_child(draft)
            .with_context(|| format!("Failed to create department under {}", parent.name()))?;
        let id = ExternalIdentity::of_department(child.target_key(), child.as_ref())?;

        if globals.json {
            return globals.print_json(&json!({ "identity": id, "name": child.name() }));
        }
        println!("Created department: {} {}", child.name(), globals.token(&id));
        Ok(())
    })
}

/// `Some(role)` adds the user, `None` removes it
fn membership(
    globals: &Globals,
    department: &str,
    user: &str,
    role: Option<DepartmentRole>,
) -> Result<()> {
    let dept_id = parse_token(department)?;
    let user_id = parse_token(user)?;
    expect_type(&user_id, EntryType::User)?;
    if dept_id.target_key() != user_id.target_key() {
        bail!("{user_id} and {dept_id} live on different targets");
    }

    globals.with_registry(|registry| {
        let dept = registry.lookup_department(&dept_id)?;
        registry.lookup_user(&user_id)?;
        let writer = writer_of(dept.as_ref())?;
        match role {
            Some(role) => writer.add_user(MembershipOptions { role }, &user_id)?,
            None => writer.remove_user(MembershipOptions::default(), &user_id)?,
        }

        if globals.json {
            return globals.print_json(&json!({
                "action": if role.is_some() { "added" } else { "removed" },
                "department": dept_id,
                "user": user_id,
                "role": role.map(|r| r.to_string()),
            }));
        }
        match role {
            Some(role) => println!("Added {} to {} as {}", user_id, dept.name(), role),
            None => println!("Removed {} from {}", user_id, dept.name()),
        }
        Ok(())
    })
}
