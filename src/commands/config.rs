// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use super::required;
use crate::config::{Config, DEFAULT_TIMEOUT_SECS, GatewayConfig};

/// `effective` is the configuration after env and flag overrides; the
/// `set-*` subcommands only ever rewrite what is stored at `path`.
pub fn handle(path: &Path, effective: &Config, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("show", _)) | None => {
            println!("# {}", path.display());
            println!("{}", serde_json::to_string_pretty(effective)?);
        }
        Some(("set-user", sub)) => {
            let id = required(sub, "id")?;
            let mut stored = Config::load_from(path)?;
            stored.user_id = Some(id.to_string());
            stored.save_to(path)?;
            println!("User set to {}", id);
        }
        Some(("set-gateway", sub)) => {
            let mut stored = Config::load_from(path)?;
            stored.gateway = gateway_from_args(sub)?;
            stored.save_to(path)?;
            println!("Gateway set to {:?}", stored.gateway);
        }
        _ => {}
    }
    Ok(())
}

pub fn gateway_from_args(sub: &clap::ArgMatches) -> Result<GatewayConfig> {
    if let Some(url) = sub.get_one::<String>("url") {
        return Ok(GatewayConfig::Http {
            url: url.clone(),
            timeout_secs: sub
                .get_one::<u64>("timeout")
                .copied()
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        });
    }
    if let Some(path) = sub.get_one::<PathBuf>("path") {
        return Ok(GatewayConfig::Local {
            path: Some(path.clone()),
        });
    }
    bail!("Pass either --url or --path")
}
