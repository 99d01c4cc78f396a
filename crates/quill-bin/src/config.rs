// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! Loading order:
//!
//! 1. The file at the given path, YAML or TOML chosen by extension.
//!    A missing file yields the defaults.
//! 2. Environment overrides with the `QUILL_` prefix.
//! 3. [`ApiConfig::prepare`]: secret policy plus validation.

use std::env;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use anyhow::Context;
use tracing::{debug, info};

use quill_api::{ApiConfig, Environment};

use crate::error::{BinError, BinResult};

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "QUILL";

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> BinResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some(other) => Err(BinError::ConfigFile(format!(
                "unsupported configuration format '.{}' (use .yaml, .yml or .toml)",
                other
            ))),
            None => Err(BinError::ConfigFile(format!(
                "cannot infer configuration format of {} (no extension)",
                path.display()
            ))),
        }
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads [`ApiConfig`] from a file and the environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            env_prefix: ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }
}

impl ConfigLoader {
    /// Creates a loader with the default `QUILL` prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Reads the file and applies environment overrides. Does not validate.
    pub fn load_raw(&self, path: impl AsRef<Path>) -> BinResult<ApiConfig> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            info!(path = %path.display(), "Loading configuration");
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            parse_str(&content, ConfigFormat::from_path(path)?)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            info!(path = %path.display(), "Configuration file not found; using defaults");
            ApiConfig::default()
        };

        if self.resolve_env_vars {
            self.apply_env_overrides_with(&mut config, |key| env::var(key).ok())?;
        }

        Ok(config)
    }

    /// Loads, overrides and prepares the configuration.
    pub fn load(&self, path: impl AsRef<Path>) -> BinResult<ApiConfig> {
        let config = self.load_raw(path)?.prepare()?;
        debug!(
            environment = %config.environment,
            addr = %config.socket_addr(),
            rate_limit = config.rate_limit.enabled,
            "Configuration prepared"
        );
        Ok(config)
    }

    /// Applies overrides looked up through `lookup`.
    pub fn apply_env_overrides_with<F>(&self, config: &mut ApiConfig, lookup: F) -> BinResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| format!("{}_{}", self.env_prefix, name);

        if let Some(value) = lookup(&var("ENV")) {
            config.environment = value.parse::<Environment>()?;
        }
        if let Some(value) = lookup(&var("JWT_SECRET")) {
            config.jwt.secret = value;
        }
        if let Some(value) = lookup(&var("API_HOST")) {
            config.host = parse_env::<IpAddr>(&var("API_HOST"), &value, "expected an IP address")?;
        }
        if let Some(value) = lookup(&var("API_PORT")) {
            config.port = parse_env(&var("API_PORT"), &value, "expected a valid port number")?;
        }
        if let Some(value) = lookup(&var("ACCESS_TTL_SECS")) {
            config.jwt.access_ttl_secs =
                parse_env(&var("ACCESS_TTL_SECS"), &value, "expected seconds")?;
        }
        if let Some(value) = lookup(&var("REFRESH_TTL_SECS")) {
            config.jwt.refresh_ttl_secs =
                parse_env(&var("REFRESH_TTL_SECS"), &value, "expected seconds")?;
        }
        if let Some(value) = lookup(&var("RATE_LIMIT_ENABLED")) {
            config.rate_limit.enabled = parse_bool(&value);
        }

        Ok(())
    }
}

/// Loads a prepared configuration with the default loader.
pub fn load_config(path: impl AsRef<Path>) -> BinResult<ApiConfig> {
    ConfigLoader::new().load(path)
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str(content: &str, format: ConfigFormat) -> anyhow::Result<ApiConfig> {
    Ok(match format {
        ConfigFormat::Yaml => ::config::Config::builder()
            .add_source(::config::File::from_str(content, ::config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?,
        ConfigFormat::Toml => toml::from_str(content)?,
    })
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str, expected: &str) -> BinResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BinError::setting(format!("{}='{}': {}", name, value, expected)))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

// =============================================================================
// Tests
// =============================================================================
