use anyhow::Context;

use crate::error::AuthError;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;
/// bcrypt truncates input past this many bytes
pub const MAX_PASSWORD_LENGTH: usize = 72;

/// Hashes and verifies passwords with bcrypt
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordHasher {
    /// Creates a hasher with a custom bcrypt cost. Clamped to bcrypt's accepted range.
    pub fn with_cost(cost: u32) -> Self {
        Self {
            cost: cost.clamp(4, 31),
        }
    }

    /// Hashes a plain text password
    #[tracing::instrument(skip_all, err)]
    pub fn hash_password(&self, plain: &str) -> anyhow::Result<String> {
        bcrypt::hash(plain, self.cost).context("unable to hash password")
    }

    /// Checks a plain text password against a stored hash
    #[tracing::instrument(skip_all, err)]
    pub fn verify_password(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        bcrypt::verify(plain, hash).context("unable to verify password")
    }

    /// Like [Self::verify_password], but without a stored hash the password is hashed anyway at
    /// this hasher's cost and the check fails
    #[tracing::instrument(skip_all, err)]
    pub fn verify_password_or_dummy(&self, plain: &str, hash: Option<&str>) -> anyhow::Result<bool> {
        match hash {
            Some(hash) => self.verify_password(plain, hash),
            None => {
                self.hash_password(plain)?;
                Ok(false)
            }
        }
    }
}

/// Rejects passwords that are too short, too long, or lack a letter or a digit
pub fn validate_password_strength(plain: &str) -> Result<(), AuthError> {
    if plain.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword {
            reason: "must be at least 8 characters",
        });
    }
    if plain.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword {
            reason: "must be at most 72 bytes",
        });
    }
    if !plain.chars().any(|c| c.is_alphabetic()) {
        return Err(AuthError::WeakPassword {
            reason: "must contain a letter",
        });
    }
    if !plain.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakPassword {
            reason: "must contain a digit",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() -> anyhow::Result<()> {
        let hasher = PasswordHasher::with_cost(4);
        let hash = hasher.hash_password("correct horse 1")?;

        assert_ne!(hash, "correct horse 1");
        assert!(hasher.verify_password("correct horse 1", &hash)?);
        assert!(!hasher.verify_password("wrong horse 1", &hash)?);
        Ok(())
    }

    #[test]
    fn test_verify_without_hash_does_the_same_work() -> anyhow::Result<()> {
        let hasher = PasswordHasher::with_cost(8);
        let hash = hasher.hash_password("correct horse 1")?;

        assert!(hasher.verify_password_or_dummy("correct horse 1", Some(&hash))?);
        assert!(!hasher.verify_password_or_dummy("correct horse 1", None)?);

        let fastest = |hash: Option<&str>| -> anyhow::Result<std::time::Duration> {
            let mut best = std::time::Duration::MAX;
            for _ in 0..3 {
                let started = std::time::Instant::now();
                hasher.verify_password_or_dummy("correct horse 1", hash)?;
                best = best.min(started.elapsed());
            }
            Ok(best)
        };
        let known = fastest(Some(&hash))?;
        let unknown = fastest(None)?;
        assert!(unknown * 4 >= known, "unknown={unknown:?} known={known:?}");
        Ok(())
    }

    #[test]
    fn test_verify_garbage_hash_errors() {
        let hasher = PasswordHasher::with_cost(4);
        assert!(hasher.verify_password("whatever1", "not-a-hash").is_err());
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("abc123").is_err());
        assert!(validate_password_strength("abcdefghij").is_err());
        assert!(validate_password_strength("1234567890").is_err());
        assert!(validate_password_strength(&"a1".repeat(40)).is_err());
        assert!(validate_password_strength("hunter22").is_ok());

        let err = validate_password_strength("short1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "password does not meet requirements: must be at least 8 characters"
        );
    }
}
