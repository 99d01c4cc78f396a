// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Password hashing and verification.
//!
//! Hashes are argon2id PHC strings. Both hashing and verification are
//! deliberately slow, so every job runs on tokio's blocking pool behind a
//! semaphore that caps how many run at once.

use std::fmt;
use std::sync::Arc;

use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tokio::sync::{OnceCell, Semaphore};
use tracing::warn;

use crate::error::PasswordError;

const SALT_LEN: usize = 16;
const DUMMY_PASSWORD: &str = "quill-timing-equaliser";

// =============================================================================
// PasswordConfig
// =============================================================================

/// Argon2 cost parameters and worker limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
    /// Maximum hash jobs running at once.
    pub max_concurrent: usize,
    /// Minimum accepted password length.
    pub min_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
            max_concurrent: 4,
            min_length: 8,
        }
    }
}

impl PasswordConfig {
    /// The cheapest valid parameters. Only for tests and local tooling.
    pub fn minimal_cost() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST.max(64),
            iterations: 1,
            parallelism: 1,
            ..Self::default()
        }
    }

    /// Sets the worker limit.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), PasswordError> {
        if self.max_concurrent == 0 {
            return Err(PasswordError::InvalidParams(
                "max_concurrent must be at least 1".into(),
            ));
        }
        if self.min_length == 0 {
            return Err(PasswordError::InvalidParams(
                "min_length must be at least 1".into(),
            ));
        }
        self.params().map(|_| ())
    }

    fn params(&self) -> Result<Params, PasswordError> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))
    }
}

// =============================================================================
// PasswordHasher
// =============================================================================

/// Bounded argon2id hasher. Cheap to clone.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    permits: Arc<Semaphore>,
    dummy_hash: Arc<OnceCell<String>>,
    config: Arc<PasswordConfig>,
}

impl PasswordHasher {
    /// Creates a hasher from the given configuration.
    pub fn new(config: PasswordConfig) -> Result<Self, PasswordError> {
        config.validate()?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, config.params()?);

        Ok(Self {
            argon2,
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            dummy_hash: Arc::new(OnceCell::new()),
            config: Arc::new(config),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PasswordConfig {
        &self.config
    }

    /// Returns the minimum accepted password length.
    pub fn min_length(&self) -> usize {
        self.config.min_length
    }

    /// Number of hash jobs that could start right now.
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Produces a salted argon2id hash of `plain`.
    pub async fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        let argon2 = self.argon2.clone();
        let plain = plain.to_owned();
        self.run_blocking(move || hash_blocking(&argon2, &plain))
            .await?
    }

    /// Verifies `plain` against a stored hash.
    ///
    /// Returns `Ok(false)` on mismatch and on a hash that cannot be parsed.
    pub async fn verify(&self, plain: &str, hash: &str) -> Result<bool, PasswordError> {
        let argon2 = self.argon2.clone();
        let plain = plain.to_owned();
        let hash = hash.to_owned();
        self.run_blocking(move || verify_blocking(&argon2, &plain, &hash))
            .await
    }

    /// Burns one verification against a fixed hash.
    ///
    /// Called when the account does not exist so the response takes as
    /// long as a real mismatch.
    pub async fn verify_dummy(&self, plain: &str) -> Result<(), PasswordError> {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD))
            .await?;
        self.verify(plain, dummy).await.map(|_| ())
    }

    async fn run_blocking<T, F>(&self, job: F) -> Result<T, PasswordError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        // The permit travels into the job so it is held until the hash
        // finishes, even if the awaiting request is dropped.
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PasswordError::WorkerUnavailable(e.to_string()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| PasswordError::WorkerUnavailable(e.to_string()))
    }
}

impl fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("config", &self.config)
            .field("available_workers", &self.available_workers())
            .finish()
    }
}

fn hash_blocking(argon2: &Argon2<'_>, plain: &str) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| PasswordError::Hashing(e.to_string()))?;

    argon2
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

fn verify_blocking(argon2: &Argon2<'_>, plain: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => argon2.verify_password(plain.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored password hash could not be parsed");
            false
        }
    }
}
