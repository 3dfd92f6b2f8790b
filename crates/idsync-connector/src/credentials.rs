//! Account creation inputs and credential generation.

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ConnectorError, ConnectorResult};
use crate::profile::Profile;
use crate::resource::Resource;

/// Upper bound for generated password length.
pub const MAX_RANDOM_PASSWORD_LENGTH: usize = 8;

/// Shortest password the generator will produce.
pub const MIN_RANDOM_PASSWORD_LENGTH: usize = 8;

const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()-_=+";

/// How credentials are handled for a newly created account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialOptions {
    /// The account is created without a password.
    NoPassword,
    /// A password is generated and returned to the caller.
    RandomPassword { length: usize },
}

impl CredentialOptions {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialOptions::NoPassword => "no_password",
            CredentialOptions::RandomPassword { .. } => "random_password",
        }
    }
}

/// Credential options a connector supports for account creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDetails {
    pub supported: Vec<String>,
    pub preferred: String,
}

/// Caller-supplied account data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub profile: Profile,
}

impl AccountInfo {
    pub fn new(profile: Profile) -> Self {
        Self { profile }
    }
}

/// Secret material generated during provisioning.
///
/// The value is never printed through `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct PlaintextSecret {
    pub name: String,
    value: String,
}

impl PlaintextSecret {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Reveal the secret value.
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for PlaintextSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaintextSecret")
            .field("name", &self.name)
            .field("value", &"***")
            .finish()
    }
}

/// Outcome of a successful account creation.
#[derive(Debug, Clone)]
pub struct CreateAccountResult {
    pub resource: Resource,
    pub secrets: Vec<PlaintextSecret>,
}

/// Generate a password of `min(MAX_RANDOM_PASSWORD_LENGTH, length)` characters.
///
/// # Errors
///
/// Returns `Validation` if `length` is below [`MIN_RANDOM_PASSWORD_LENGTH`].
pub fn generate_random_password(length: usize) -> ConnectorResult<String> {
    if length < MIN_RANDOM_PASSWORD_LENGTH {
        return Err(ConnectorError::validation(format!(
            "random password length must be at least {MIN_RANDOM_PASSWORD_LENGTH}, got {length}"
        )));
    }

    let length = length.min(MAX_RANDOM_PASSWORD_LENGTH);
    Ok((0..length)
        .map(|_| {
            let idx = OsRng.gen_range(0..PASSWORD_ALPHABET.len());
            char::from(PASSWORD_ALPHABET[idx])
        })
        .collect())
}
