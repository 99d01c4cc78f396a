// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `gen-secret` command.

use base64::{Engine, engine::general_purpose::STANDARD};

use quill_api::JwtConfig;
use quill_api::auth::random_bytes;

use crate::cli::{Cli, GenSecretArgs, SecretFormat};
use crate::error::{BinError, BinResult};

/// Prints a random signing secret suitable for `jwt.secret` / `QUILL_JWT_SECRET`.
pub fn gen_secret(cli: &Cli, args: GenSecretArgs) -> BinResult<()> {
    let secret = generate_secret(args.format, args.bytes)?;

    if cli.quiet {
        print!("{}", secret);
    } else {
        println!("{}", secret);
    }
    Ok(())
}

/// Encodes `bytes` random bytes from the OS source.
///
/// Rejects lengths that would produce a secret below the production minimum.
pub fn generate_secret(format: SecretFormat, bytes: usize) -> BinResult<String> {
    let minimum = JwtConfig::default().min_secret_len;
    if bytes < minimum {
        return Err(BinError::setting(format!(
            "secret must be at least {} bytes, got {}",
            minimum, bytes
        )));
    }

    let raw = random_bytes(bytes);
    Ok(match format {
        SecretFormat::Hex => hex::encode(raw),
        SecretFormat::Base64 => STANDARD.encode(raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_secret() {
        let secret = generate_secret(SecretFormat::Hex, 32).unwrap();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_base64_secret() {
        let secret = generate_secret(SecretFormat::Base64, 48).unwrap();
        assert_eq!(STANDARD.decode(&secret).unwrap().len(), 48);
    }

    #[test]
    fn test_secrets_differ() {
        let a = generate_secret(SecretFormat::Hex, 32).unwrap();
        let b = generate_secret(SecretFormat::Hex, 32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(generate_secret(SecretFormat::Hex, 16).is_err());
    }
}
