// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use serde::Serialize;

use quill_api::ApiConfig;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{BinError, BinResult};

/// Summary printed by `quill validate`.
#[derive(Debug, Serialize)]
struct ValidationReport<'a> {
    valid: bool,
    config_path: String,
    environment: String,
    listen: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    rate_limit_enabled: bool,
    warnings: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a ApiConfig>,
}

/// Loads the configuration and reports whether the server would start.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    let raw = ConfigLoader::new().load_raw(config_path)?;
    let warnings = collect_warnings(&raw);
    let config = raw.prepare()?;

    let report = ValidationReport {
        valid: true,
        config_path: config_path.display().to_string(),
        environment: config.environment.to_string(),
        listen: config.socket_addr().to_string(),
        access_ttl_secs: config.jwt.access_ttl_secs,
        refresh_ttl_secs: config.jwt.refresh_ttl_secs,
        rate_limit_enabled: config.rate_limit.enabled,
        warnings: &warnings,
        config: args.show_config.then_some(&config),
    };

    match args.format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .map_err(|e| BinError::output(e.to_string()))?
        ),
        OutputFormat::Yaml => print!(
            "{}",
            serde_yaml::to_string(&report)
                .map_err(|e| BinError::output(e.to_string()))?
        ),
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::StrictWarnings(warnings.len()));
    }

    Ok(())
}

/// Settings that start fine but are probably a mistake.
fn collect_warnings(config: &ApiConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let dev = config.environment.is_development();

    if dev && config.jwt.secret.is_empty() {
        warnings.push("No JWT secret configured; tokens will not survive a restart".to_string());
    } else if dev && config.jwt.secret.len() < config.jwt.min_secret_len {
        warnings.push(format!(
            "JWT secret is shorter than {} bytes",
            config.jwt.min_secret_len
        ));
    }
    if !config.rate_limit.enabled {
        warnings.push("Rate limiting is disabled".to_string());
    }
    if config.rate_limit.trust_proxy_headers {
        warnings.push(
            "Client addresses are taken from X-Forwarded-For; only enable behind a trusted proxy"
                .to_string(),
        );
    }
    if !dev && config.cors.allows_any_origin() {
        warnings.push(format!(
            "CORS allows any origin in {}",
            config.environment
        ));
    }

    warnings
}

fn print_text(report: &ValidationReport<'_>) {
    println!("✓ Configuration is valid: {}", report.config_path);
    println!();
    println!("Summary:");
    println!("  Environment:  {}", report.environment);
    println!("  Listen:       {}", report.listen);
    println!("  Access TTL:   {}s", report.access_ttl_secs);
    println!("  Refresh TTL:  {}s", report.refresh_ttl_secs);
    println!(
        "  Rate limit:   {}",
        if report.rate_limit_enabled { "enabled" } else { "disabled" }
    );

    if !report.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in report.warnings {
            println!("  ⚠ {}", warning);
        }
    }

    if let Some(config) = report.config {
        println!();
        println!("Effective configuration:");
        match serde_yaml::to_string(config) {
            Ok(yaml) => print!("{}", yaml),
            Err(_) => println!("(serialization error)"),
        }
    }
}
