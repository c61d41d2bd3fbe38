// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! User commands - inspect, link, list, create and sync users

use super::{parse_token, Globals};
use crate::entry::{NewUser, UserEntry};
use crate::error::DirectoryError;
use crate::identity::{EntryType, ExternalIdentity};
use crate::link::{self, EntrySummary, LinkOutcome};
use crate::registry::expect_type;
use crate::sync::{sync_users, SyncOptions};
use crate::target::{Capability, Target};
use crate::tree::collect_all_users;
use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use serde_json::json;

/// `user` subcommands
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Show a user and the entries linked to it
    Info {
        /// User identity token
        token: String,
    },

    /// Record that FROM is the same person as TO (TO's target stores the link)
    Link {
        /// Identity to link
        from: String,
        /// Identity on an entry-center target
        to: String,
    },

    /// List every user of a target
    List {
        /// Target name or <platform>/<slug>
        #[arg(short, long)]
        target: String,
    },

    /// Create a user
    Create {
        /// Target name or <platform>/<slug>
        #[arg(short, long)]
        target: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Primary e-mail
        #[arg(long, default_value = "")]
        email: String,

        /// Primary phone
        #[arg(long, default_value = "")]
        phone: String,
    },

    /// Copy users from one target into another, merging look-alikes
    Sync {
        /// Source target
        #[arg(long)]
        from: String,

        /// Destination target (must support user creation and fuzzy lookup)
        #[arg(long)]
        to: String,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
}

/// Run user command
pub fn run(globals: &Globals, command: UserCommand) -> Result<()> {
    match command {
        UserCommand::Info { token } => info(globals, &token),
        UserCommand::Link { from, to } => link_tokens(globals, &from, &to),
        UserCommand::List { target } => list(globals, &target),
        UserCommand::Create {
            target,
            name,
            email,
            phone,
        } => create(globals, &target, NewUser::new(name, email, phone)),
        UserCommand::Sync { from, to, dry_run } => sync(globals, &from, &to, dry_run),
    }
}

fn info(globals: &Globals, token: &str) -> Result<()> {
    let id = parse_token(token)?;
    expect_type(&id, EntryType::User)?;
    globals.with_registry(|registry| {
        let summary = link::describe(registry, &id)?;
        if globals.json {
            return globals.print_json(&summary);
        }
        print_summary(globals, &summary);
        Ok(())
    })
}

/// Text rendering shared by `user info` and `dept info`
pub(crate) fn print_summary(globals: &Globals, summary: &EntrySummary) {
    println!("{} {}", globals.heading(&summary.name), globals.token(&summary.identity));
    for (label, value) in [
        ("email", &summary.email),
        ("phone", &summary.phone),
        ("description", &summary.description),
    ] {
        if !value.is_empty() {
            println!("  {label}: {value}");
        }
    }
    if !summary.links.is_empty() {
        println!("  linked to:");
        for linked in &summary.links {
            println!("    {} {}", linked.name, globals.token(&linked.identity));
        }
    }
    if !summary.linked_from.is_empty() {
        println!("  linked from:");
        for holder in &summary.linked_from {
            println!("    {} {}", holder.name, globals.token(&holder.identity));
        }
    }
}

/// Shared by `user link` and `dept link`
pub(crate) fn link_tokens(globals: &Globals, from: &str, to: &str) -> Result<()> {
    let from = parse_token(from)?;
    let to = parse_token(to)?;
    globals.with_registry(|registry| {
        let outcome = link::link_entries(registry, &from, &to)?;
        if globals.json {
            let holder = match &outcome {
                LinkOutcome::Linked => None,
                LinkOutcome::AlreadyLinked { holder } => Some(holder),
            };
            return globals.print_json(&json!({
                "from": from,
                "to": to,
                "linked": outcome == LinkOutcome::Linked,
                "holder": holder,
            }));
        }
        match outcome {
            LinkOutcome::Linked => {
                println!("Linked {} -> {}", globals.token(&from), globals.token(&to));
            }
            LinkOutcome::AlreadyLinked { holder } => println!(
                "{} {} is already linked by {}",
                globals.warning("already linked:"),
                from,
                globals.token(&holder)
            ),
        }
        Ok(())
    })
}

#[derive(Serialize)]
struct UserRow {
    identity: ExternalIdentity,
    name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    email: String,
}

fn all_users(target: &dyn Target) -> Result<Vec<Box<dyn UserEntry>>> {
    let users = match target.as_user_lister() {
        Some(lister) => lister.all_users()?,
        None => collect_all_users(target.root_department()?.as_ref())?,
    };
    Ok(users)
}

fn list(globals: &Globals, selector: &str) -> Result<()> {
    globals.with_registry(|registry| {
        let target = registry.select(selector)?;
        let rows = all_users(target)?
            .iter()
            .map(|user| -> Result<UserRow> {
                Ok(UserRow {
                    identity: ExternalIdentity::of_user(target.key(), user.as_ref())?,
                    name: user.name().to_string(),
                    email: user.email().to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if globals.json {
            return globals.print_json(&rows);
        }
        for row in &rows {
            if row.email.is_empty() {
                println!("{} {}", row.name, globals.token(&row.identity));
            } else {
                println!("{} <{}> {}", row.name, row.email, globals.token(&row.identity));
            }
        }
        println!("{} user(s)", rows.len());
        Ok(())
    })
}

fn create(globals: &Globals, selector: &str, draft: NewUser) -> Result<()> {
    globals.with_registry(|registry| {
        let target = registry.select(selector)?;
        let writer = target.as_user_writer().ok_or_else(|| {
            DirectoryError::unsupported(target.key(), Capability::CreateUser.name())
        })?;
        let user = writer
            .create_user(&draft)
            .with_context(|| format!("Failed to create user on {}", target.key()))?;
        let id = ExternalIdentity::of_user(target.key(), &user)?;

        if globals.json {
            return globals.print_json(&json!({ "identity": id, "user": user }));
        }
        println!("Created user: {} {}", user.name, globals.token(&id));
        Ok(())
    })
}

fn sync(globals: &Globals, from: &str, to: &str, dry_run: bool) -> Result<()> {
    globals.with_registry(|registry| {
        let source = registry.select(from)?;
        let destination = registry.select(to)?;
        let report = sync_users(source, destination, SyncOptions { dry_run })?;
        let ambiguous: Vec<String> = report.ambiguous.iter().map(ToString::to_string).collect();

        if globals.json {
            return globals.print_json(&json!({
                "total": report.total,
                "unique": report.unique,
                "created": report.created,
                "merged": report.merged,
                "unchanged": report.unchanged,
                "ambiguous": ambiguous,
                "dry_run": dry_run,
            }));
        }

        println!("Total:     {}", report.total);
        println!("Unique:    {}", report.unique);
        println!("Created:   {}", report.created);
        println!("Merged:    {}", report.merged);
        println!("Unchanged: {}", report.unchanged);
        for message in &ambiguous {
            println!("{} {}", globals.warning("skipped:"), message);
        }
        if dry_run {
            println!("(dry run, nothing written)");
        }
        Ok(())
    })
}
