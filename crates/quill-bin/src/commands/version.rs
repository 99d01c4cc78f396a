// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Prints component versions and build information.
pub fn version(cli: &Cli) -> BinResult<()> {
    if cli.quiet {
        println!("{}", crate::VERSION);
        return Ok(());
    }

    println!("Quill - authentication and session service");
    println!();
    println!("Version Information:");
    println!("  quill-bin:   {}", crate::VERSION);
    println!("  quill-api:   {}", quill_api::VERSION);
    println!("  quill-core:  {}", quill_core::VERSION);
    println!();
    println!("Build Information:");
    println!("  Rust Edition: 2024");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
