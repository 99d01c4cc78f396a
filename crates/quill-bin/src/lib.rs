// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # quill-bin
//!
//! The `quill` binary.
//!
//! - CLI argument parsing with clap
//! - Configuration loading (YAML/TOML plus `QUILL_*` overrides)
//! - Logging initialization
//! - Graceful shutdown handling
//! - Command implementations (run, validate, gen-secret, version)
//!
//! ## Usage
//!
//! ```bash
//! # Start the server (default command)
//! quill
//!
//! # Start with a custom config
//! quill -c /etc/quill/quill.yaml
//!
//! # Validate configuration
//! quill validate --strict
//!
//! # Generate a signing secret
//! quill gen-secret -f base64
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod shutdown;

pub use cli::{Cli, Commands};
pub use config::{ConfigLoader, load_config};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
