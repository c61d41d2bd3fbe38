// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! List configured targets

use super::Globals;
use crate::target::Capability;
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
struct TargetRow<'a> {
    name: &'a str,
    platform: &'a str,
    slug: &'a str,
    capabilities: Vec<Capability>,
}

/// Run targets command
pub fn run(globals: &Globals) -> Result<()> {
    globals.with_registry(|registry| {
        let rows: Vec<TargetRow<'_>> = registry
            .targets()
            .map(|(name, target)| TargetRow {
                name,
                platform: target.key().platform(),
                slug: target.key().tenant_slug(),
                capabilities: target.capabilities().into_iter().collect(),
            })
            .collect();

        if globals.json {
            return globals.print_json(&rows);
        }
        if rows.is_empty() {
            println!("No targets configured");
            return Ok(());
        }

        println!("{}", globals.heading("Targets"));
        for row in &rows {
            let caps: Vec<&str> = row.capabilities.iter().map(Capability::name).collect();
            println!(
                "  {:<16} {}/{}  [{}]",
                row.name,
                row.platform,
                row.slug,
                caps.join(", ")
            );
        }
        Ok(())
    })
}
