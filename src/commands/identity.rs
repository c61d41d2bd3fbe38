// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Decode an external identity token

use super::{parse_token, Globals};
use anyhow::Result;
use serde_json::json;

/// Run identity command
pub fn run(globals: &Globals, token: &str) -> Result<()> {
    let id = parse_token(token)?;

    if globals.json {
        return globals.print_json(&json!({
            "identity": id,
            "entry_type": id.entry_type(),
            "internal_id": id.internal_id(),
            "tenant_slug": id.tenant_slug(),
            "platform": id.platform(),
        }));
    }

    println!("{}", globals.token(&id));
    println!("  entry type:  {}", id.entry_type());
    println!("  internal id: {}", id.internal_id());
    println!("  tenant slug: {}", id.tenant_slug());
    println!("  platform:    {}", id.platform());
    Ok(())
}
