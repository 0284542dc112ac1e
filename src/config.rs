// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::db::{self, APP, SqliteGateway};
use crate::gateway::{Gateway, HttpGateway};
use crate::models::AuthUser;

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GatewayConfig {
    Http {
        url: String,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
    Local {
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig::Local { path: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
            .context("Could not determine platform-specific config dir")?;
        Ok(proj.config_dir().join("config.json"))
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Invalid config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e).with_context(|| format!("Read config {}", path.display())),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config dir")?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Write config {}", path.display()))?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|k| std::env::var(k).ok());
    }

    /// `SPENDSYNC_USER`, `SPENDSYNC_GATEWAY_URL` and `SPENDSYNC_DB`, looked up
    /// through `get`. The URL wins over the database path when both are set.
    pub fn apply_env_with<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(user) = get("SPENDSYNC_USER").filter(|v| !v.is_empty()) {
            self.user_id = Some(user);
        }
        if let Some(path) = get("SPENDSYNC_DB").filter(|v| !v.is_empty()) {
            self.gateway = GatewayConfig::Local {
                path: Some(PathBuf::from(path)),
            };
        }
        if let Some(url) = get("SPENDSYNC_GATEWAY_URL").filter(|v| !v.is_empty()) {
            self.set_url(url);
        }
    }

    /// Global `--user`, `--gateway-url` and `--db` flags.
    pub fn apply_overrides(&mut self, matches: &clap::ArgMatches) {
        if let Some(user) = matches.get_one::<String>("user") {
            self.user_id = Some(user.clone());
        }
        if let Some(path) = matches.get_one::<PathBuf>("db") {
            self.gateway = GatewayConfig::Local {
                path: Some(path.clone()),
            };
        }
        if let Some(url) = matches.get_one::<String>("gateway-url") {
            self.set_url(url.clone());
        }
    }

    fn set_url(&mut self, url: String) {
        let timeout_secs = match &self.gateway {
            GatewayConfig::Http { timeout_secs, .. } => *timeout_secs,
            GatewayConfig::Local { .. } => DEFAULT_TIMEOUT_SECS,
        };
        self.gateway = GatewayConfig::Http { url, timeout_secs };
    }

    pub fn require_user(&self) -> Result<AuthUser> {
        self.user_id
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .map(AuthUser::new)
            .ok_or_else(|| {
                anyhow!("No user configured; run `spendsync config set-user <id>` or pass --user")
            })
    }

    pub fn open_gateway(&self) -> Result<Box<dyn Gateway>> {
        match &self.gateway {
            GatewayConfig::Http { url, timeout_secs } => {
                let gw = HttpGateway::new(url, Duration::from_secs(*timeout_secs))?;
                Ok(Box::new(gw))
            }
            GatewayConfig::Local { path } => {
                let path = match path {
                    Some(p) => p.clone(),
                    None => db::db_path()?,
                };
                Ok(Box::new(SqliteGateway::open(&path)?))
            }
        }
    }
}
