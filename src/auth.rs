//! User accounts
//!
//! Stores one credential record per email in the `users` tree of the shared
//! database. Passwords are kept as a random salt plus an iterated SHA-256
//! digest, both base64-encoded.

use crate::error::{Result, StudySyncError};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sled::{Db, Tree};

const USERS_TREE: &str = "users";
const SALT_LEN: usize = 16;
const HASH_ROUNDS: u32 = 10_000;

/// Stored credential record
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    email: String,
    salt: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Account email
    pub email: String,
    /// When the account was registered
    pub created_at: DateTime<Utc>,
}

/// Registers and authenticates users
#[derive(Clone)]
pub struct CredentialStore {
    users: Tree,
}

impl CredentialStore {
    /// Open the credential store on an already opened database
    pub fn from_db(db: &Db) -> Result<Self> {
        let users = db.open_tree(USERS_TREE).map_err(|e| {
            StudySyncError::StorageUnavailable(format!("Failed to open users tree: {}", e))
        })?;
        Ok(Self { users })
    }

    /// Create an account
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` when the email is already registered.
    /// - `InvalidCredentials` for an empty email or password.
    pub fn register(&self, email: &str, password: &str) -> Result<Identity> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(StudySyncError::InvalidCredentials.into());
        }

        let salt = random_salt();
        let record = UserRecord {
            email: email.to_string(),
            password_hash: hash_password(password, &salt),
            salt: base64::engine::general_purpose::STANDARD.encode(salt),
            created_at: Utc::now(),
        };
        let value = serde_json::to_vec(&record)?;

        let swapped = self
            .users
            .compare_and_swap(email.as_bytes(), None as Option<&[u8]>, Some(value))
            .map_err(|e| StudySyncError::StorageUnavailable(format!("Insert failed: {}", e)))?;
        if swapped.is_err() {
            return Err(StudySyncError::AlreadyExists(email.to_string()).into());
        }
        self.users
            .flush()
            .map_err(|e| StudySyncError::StorageUnavailable(format!("Flush failed: {}", e)))?;

        tracing::info!(email = %email, "User registered");
        Ok(Identity {
            email: record.email,
            created_at: record.created_at,
        })
    }

    /// Check an email/password pair
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown email or a wrong
    /// password; the two cases are indistinguishable to the caller.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Identity> {
        let email = email.trim();
        let bytes = self
            .users
            .get(email.as_bytes())
            .map_err(|e| StudySyncError::StorageUnavailable(format!("Get failed: {}", e)))?
            .ok_or(StudySyncError::InvalidCredentials)?;
        let record: UserRecord = serde_json::from_slice(&bytes)?;

        let salt = base64::engine::general_purpose::STANDARD
            .decode(&record.salt)
            .map_err(|e| StudySyncError::StorageUnavailable(format!("Corrupt salt: {}", e)))?;
        let candidate = hash_password(password, &salt);

        if !constant_time_eq(candidate.as_bytes(), record.password_hash.as_bytes()) {
            tracing::debug!(email = %email, "Authentication failed");
            return Err(StudySyncError::InvalidCredentials.into());
        }

        Ok(Identity {
            email: record.email,
            created_at: record.created_at,
        })
    }

    /// Whether an account exists for `email`
    pub fn exists(&self, email: &str) -> Result<bool> {
        let found = self
            .users
            .contains_key(email.trim().as_bytes())
            .map_err(|e| StudySyncError::StorageUnavailable(format!("Get failed: {}", e)))?;
        Ok(found)
    }
}

fn random_salt() -> [u8; SALT_LEN] {
    use rand::RngCore as _;

    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

fn hash_password(password: &str, salt: &[u8]) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..HASH_ROUNDS {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt)
            .finalize();
    }
    base64::engine::general_purpose::STANDARD.encode(digest)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
