//! This file defines types that handle password validation and hashing.
//! `ValidatedPassword` wraps a string and ensures it satisfies the password policy.
//! `PasswordHash` converts a `ValidatedPassword` into a salted and hashed password,
//! and verifies raw passwords against stored hashes, including the older
//! formats found in existing databases.

use std::fmt::Display;

use bcrypt::{hash, verify};
use hmac::{Hmac, Mac};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zxcvbn::{Score, feedback::Feedback, zxcvbn};

use crate::{Error, system_config};

/// The global salt appended to passwords by the oldest hash format.
const LEGACY_SALT: &str = "finance_system_salt";

type HmacSha256 = Hmac<Sha256>;

/// The rules a new password must follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// The minimum number of characters.
    pub min_length: usize,
    /// Whether the password must also score well on a guessability estimate.
    pub require_strong: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_strong: false,
        }
    }
}

impl PasswordPolicy {
    /// Read the policy from the system configuration table, falling back to
    /// the defaults for missing keys.
    ///
    /// # Errors
    /// Returns an error if a stored value has the wrong type or there is an SQL error.
    pub fn from_system_config(connection: &Connection) -> Result<Self, Error> {
        let defaults = Self::default();
        let min_length = system_config::get_integer_or(
            "security.password_min_length",
            defaults.min_length as i64,
            connection,
        )?;
        let require_strong = system_config::get_bool_or(
            "security.require_strong_password",
            defaults.require_strong,
            connection,
        )?;

        Ok(Self {
            min_length: min_length.max(1) as usize,
            require_strong,
        })
    }
}

/// A password that has been validated, but not yet hashed.
///
/// This struct can be used to construct a [PasswordHash].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Create and validate a new password from a string.
    ///
    /// # Errors
    ///
    /// Returns [Error::EmptyPassword] for an empty string, or [Error::TooWeak]
    /// if the password is shorter than the policy allows or, when the policy
    /// asks for strong passwords, is too easy to guess. The message explains
    /// how to make it stronger.
    pub fn new(raw_password_string: &str, policy: &PasswordPolicy) -> Result<Self, Error> {
        if raw_password_string.is_empty() {
            return Err(Error::EmptyPassword);
        }

        if raw_password_string.chars().count() < policy.min_length {
            return Err(Error::TooWeak(format!(
                "use at least {} characters",
                policy.min_length
            )));
        }

        if policy.require_strong {
            let password_analysis = zxcvbn(raw_password_string, &[]);

            match password_analysis.score() {
                Score::Three | Score::Four => {}
                _ => {
                    return Err(Error::TooWeak(
                        password_analysis
                            .feedback()
                            .unwrap_or(&Feedback::default())
                            .to_string(),
                    ));
                }
            }
        }

        Ok(Self(raw_password_string.to_owned()))
    }

    /// Create a new `ValidatedPassword` without any validation.
    ///
    /// The caller should ensure that `raw_password_string` is a valid and secure password.
    pub fn new_unchecked(raw_password_string: &str) -> Self {
        Self(raw_password_string.to_owned())
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", str::repeat("*", 8))
    }
}

/// The formats a stored password hash can take.
#[derive(Debug, PartialEq)]
enum HashScheme {
    Bcrypt,
    /// Hex encoded SHA-256 of the password followed by [LEGACY_SALT].
    LegacySha256,
    /// `iterations$salt_hex$hash_hex`, PBKDF2-HMAC-SHA256.
    Pbkdf2 {
        iterations: u32,
        salt: Vec<u8>,
        hash: Vec<u8>,
    },
}

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// An alias for the default encryption cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Create a hashed password from a validated password with the specified `cost`.
    ///
    /// `cost` increases the rounds of hashing and therefore the time needed to verify a password.
    /// Pass in [PasswordHash::DEFAULT_COST] to use the recommended cost.
    ///
    /// # Errors
    ///
    /// This function will return an error if the password could not be hashed.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        match hash(&password.0, cost) {
            Ok(password_hash) => Ok(Self(password_hash)),
            Err(e) => Err(Error::HashingError(e.to_string())),
        }
    }

    /// Create a new `PasswordHash` without any validation.
    ///
    /// The caller should ensure that `raw_password_hash` is a valid password hash.
    pub fn new_unchecked(raw_password_hash: &str) -> Self {
        Self(raw_password_hash.to_owned())
    }

    /// Validate `raw_password` against `policy` and hash it.
    pub fn from_raw_password(
        raw_password: &str,
        policy: &PasswordPolicy,
        cost: u32,
    ) -> Result<Self, Error> {
        let validated_password = ValidatedPassword::new(raw_password, policy)?;
        PasswordHash::new(validated_password, cost)
    }

    /// Check that `raw_password` matches the stored password.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if the stored hash is not in a recognised
    /// format or the hashing library fails.
    pub fn verify(&self, raw_password: &str) -> Result<bool, Error> {
        match self.scheme()? {
            HashScheme::Bcrypt => verify(raw_password, &self.0)
                .map_err(|error| Error::HashingError(error.to_string())),
            HashScheme::LegacySha256 => {
                let stored =
                    hex::decode(&self.0).map_err(|error| Error::HashingError(error.to_string()))?;

                Ok(legacy_hash(raw_password).as_slice().ct_eq(&stored).into())
            }
            HashScheme::Pbkdf2 {
                iterations,
                salt,
                hash,
            } => {
                let computed = pbkdf2_sha256(raw_password.as_bytes(), &salt, iterations)?;

                Ok(computed.as_slice().ct_eq(&hash).into())
            }
        }
    }

    /// Whether the hash uses one of the older formats and should be replaced
    /// with a bcrypt hash the next time the raw password is known.
    pub fn needs_rehash(&self) -> bool {
        !self.is_bcrypt()
    }

    fn is_bcrypt(&self) -> bool {
        ["$2a$", "$2b$", "$2x$", "$2y$"]
            .iter()
            .any(|prefix| self.0.starts_with(prefix))
    }

    fn scheme(&self) -> Result<HashScheme, Error> {
        if self.is_bcrypt() {
            return Ok(HashScheme::Bcrypt);
        }

        if self.0.len() == 64 && !self.0.contains('$') {
            return Ok(HashScheme::LegacySha256);
        }

        let parts: Vec<&str> = self.0.split('$').collect();
        let [iterations, salt, hash] = parts.as_slice() else {
            return Err(Error::HashingError(
                "unrecognised password hash format".to_owned(),
            ));
        };

        let iterations = iterations
            .parse()
            .map_err(|_| Error::HashingError(format!("invalid iteration count {iterations:?}")))?;
        let salt = hex::decode(salt).map_err(|error| Error::HashingError(error.to_string()))?;
        let hash = hex::decode(hash).map_err(|error| Error::HashingError(error.to_string()))?;

        Ok(HashScheme::Pbkdf2 {
            iterations,
            salt,
            hash,
        })
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn legacy_hash(raw_password: &str) -> [u8; 32] {
    Sha256::digest(format!("{raw_password}{LEGACY_SALT}")).into()
}

/// PBKDF2-HMAC-SHA256 with a single 32 byte output block.
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> Result<[u8; 32], Error> {
    if iterations == 0 {
        return Err(Error::HashingError(
            "PBKDF2 iteration count must be positive".to_owned(),
        ));
    }

    let prf = HmacSha256::new_from_slice(password)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());

    let mut block = [0u8; 32];
    block.copy_from_slice(&mac.finalize().into_bytes());
    let mut output = block;

    for _ in 1..iterations {
        let mut mac = prf.clone();
        mac.update(&block);
        block.copy_from_slice(&mac.finalize().into_bytes());

        output
            .iter_mut()
            .zip(block.iter())
            .for_each(|(out, byte)| *out ^= byte);
    }

    Ok(output)
}

#[cfg(test)]
mod validated_password_tests {
    use crate::{Error, PasswordPolicy, ValidatedPassword};

    #[test]
    fn new_fails_on_empty() {
        let result = ValidatedPassword::new("", &PasswordPolicy::default());

        assert_eq!(result, Err(Error::EmptyPassword));
    }

    #[test]
    fn new_fails_on_short_password() {
        let result = ValidatedPassword::new("short", &PasswordPolicy::default());

        assert!(matches!(result, Err(Error::TooWeak(_))));
    }

    #[test]
    fn new_counts_characters_not_bytes() {
        let policy = PasswordPolicy {
            min_length: 4,
            require_strong: false,
        };

        // Three characters, nine bytes.
        let result = ValidatedPassword::new("密码密", &policy);

        assert!(matches!(result, Err(Error::TooWeak(_))));
    }

    #[test]
    fn new_accepts_long_enough_password_without_strength_check() {
        let result = ValidatedPassword::new("password", &PasswordPolicy::default());

        assert!(result.is_ok());
    }

    #[test]
    fn new_rejects_guessable_password_when_strong_required() {
        let policy = PasswordPolicy {
            min_length: 8,
            require_strong: true,
        };

        let result = ValidatedPassword::new("password1234", &policy);

        assert!(matches!(result, Err(Error::TooWeak(_))));
    }

    #[test]
    fn new_accepts_strong_password_when_strong_required() {
        let policy = PasswordPolicy {
            min_length: 8,
            require_strong: true,
        };

        let result = ValidatedPassword::new("asomewhatlongpassword1", &policy);

        assert!(result.is_ok());
    }

    #[test]
    fn display_is_masked() {
        let password = ValidatedPassword::new_unchecked("hunter2");

        assert_eq!(password.to_string(), "********");
    }
}
