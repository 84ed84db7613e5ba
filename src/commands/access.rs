use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use acdata::access::{Role, can_access, scope_for};

use crate::commands::open_context;

#[derive(Subcommand)]
pub enum AccessCommands {
    /// Point-check whether a role may touch a constituency
    Check(CheckArgs),
}

#[derive(Args)]
pub struct CheckArgs {
    /// Caller role (unknown roles are treated as having no scope)
    #[arg(long)]
    pub role: String,

    /// The caller's assigned constituency (key or name), if any
    #[arg(long)]
    pub assigned: Option<String>,

    /// The constituency being requested (key or name)
    #[arg(long)]
    pub ac: String,
}

pub fn execute(config_path: Option<PathBuf>, command: AccessCommands) -> Result<()> {
    let AccessCommands::Check(args) = command;
    let ctx = open_context(config_path)?;

    let role = Role::parse(&args.role);
    let assigned = match &args.assigned {
        Some(identifier) => {
            let Some(key) = ctx.registry.resolve_str(identifier) else {
                bail!("'{identifier}' does not resolve to a constituency");
            };
            Some(key)
        }
        None => None,
    };
    let Some(requested) = ctx.registry.resolve_str(&args.ac) else {
        bail!("'{}' does not resolve to a constituency", args.ac);
    };

    let allowed = can_access(role, assigned, requested);
    println!(
        "{} (role={}, scope={:?}, requested={})",
        if allowed { "allow" } else { "deny" },
        role.map(Role::as_str).unwrap_or("<unknown>"),
        scope_for(role, assigned),
        requested
    );
    Ok(())
}
