// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tokio::task::JoinError;
use tracing::{info, warn};

use quill_api::{ApiConfig, ApiServer, ServeError};

use crate::cli::{Cli, RunArgs};
use crate::config::ConfigLoader;
use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

/// Starts the server and blocks until shutdown completes.
///
/// After a termination signal, in-flight requests get `shutdown_timeout`
/// to finish before the server task is aborted.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let config = apply_run_args(ConfigLoader::new().load_raw(&cli.config)?, &args)?.prepare()?;
    let grace = config.shutdown_timeout;

    let server = ApiServer::from_config(config)?;
    info!(
        addr = %server.addr(),
        version = quill_api::VERSION,
        "Starting Quill"
    );

    let coordinator = ShutdownCoordinator::new();
    let mut server_task = tokio::spawn(server.run_with_shutdown(coordinator.shutdown_signal()));

    tokio::select! {
        joined = &mut server_task => return flatten(joined),
        _ = coordinator.wait_for_shutdown() => {}
    }

    match tokio::time::timeout(grace, &mut server_task).await {
        Ok(joined) => flatten(joined),
        Err(_) => {
            warn!(
                timeout_secs = grace.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
            server_task.abort();
            Ok(())
        }
    }
}

/// Applies command-line overrides on top of the loaded configuration.
fn apply_run_args(mut config: ApiConfig, args: &RunArgs) -> BinResult<ApiConfig> {
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.no_rate_limit {
        if !config.environment.is_development() {
            return Err(BinError::setting(format!(
                "--no-rate-limit is not allowed in {}",
                config.environment
            )));
        }
        warn!("Rate limiting disabled from the command line");
        config.rate_limit.enabled = false;
    }
    Ok(config)
}

fn flatten(joined: Result<Result<(), ServeError>, JoinError>) -> BinResult<()> {
    Ok(joined??)
}
