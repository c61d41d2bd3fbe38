// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod completions;
pub mod dept;
pub mod identity;
pub mod targets;
pub mod user;

use crate::config::{self, Config};
use crate::identity::ExternalIdentity;
use crate::registry::{PlatformContext, Registry, RegistryBuilder};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::fmt::Display;
use std::path::PathBuf;

/// Flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct Globals {
    /// Explicit configuration file
    pub config: Option<PathBuf>,
    /// Data directory override
    pub data_dir: Option<PathBuf>,
    /// Print JSON instead of text
    pub json: bool,
    /// Colored text output
    pub color: bool,
}

impl Globals {
    /// Configuration with command-line overrides applied
    pub fn load_config(&self) -> Result<Config> {
        let mut config = config::load(self.config.as_deref())?;
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        Ok(config)
    }

    /// Build the registry, run `f`, then tear the registry down
    ///
    /// Teardown runs even when `f` fails; the error of `f` wins.
    pub fn with_registry<T>(&self, f: impl FnOnce(&Registry) -> Result<T>) -> Result<T> {
        let config = self.load_config()?;
        let context = PlatformContext {
            data_dir: config.data_dir.clone(),
        };
        let registry = RegistryBuilder::with_builtin_platforms(context)
            .init(&config.target_configs())
            .context("Failed to initialise targets")?;

        let result = f(&registry);
        let closed = registry.teardown().context("Failed to close targets");
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Print a value as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("Failed to serialize output")?
        );
        Ok(())
    }

    /// Render a token for terminal output
    #[must_use]
    pub fn token(&self, id: &impl Display) -> String {
        if self.color {
            id.cyan().to_string()
        } else {
            id.to_string()
        }
    }

    /// Render a heading for terminal output
    #[must_use]
    pub fn heading(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// Render a warning for terminal output
    #[must_use]
    pub fn warning(&self, text: &str) -> String {
        if self.color {
            text.yellow().to_string()
        } else {
            text.to_string()
        }
    }
}

/// Parse a command-line token argument
pub fn parse_token(raw: &str) -> Result<ExternalIdentity> {
    ExternalIdentity::parse(raw).with_context(|| format!("Invalid identity argument: {raw}"))
}
