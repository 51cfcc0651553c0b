use std::sync::{Arc, OnceLock};

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use crate::error::{ConfigError, HashError};

/// WorkFactor
///
/// Argon2id cost parameters. Read once at startup and shared read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkFactor {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for WorkFactor {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// CredentialHasher
///
/// One-way password hashing. Digests are PHC strings carrying their own salt
/// and parameters, so a digest produced under an older work factor still verifies.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    decoy: Arc<OnceLock<String>>,
}

impl CredentialHasher {
    pub fn new(work: WorkFactor) -> Result<Self, ConfigError> {
        let params = Params::new(work.memory_kib, work.iterations, work.parallelism, None)
            .map_err(|e| ConfigError::Invalid {
                key: "PASSWORD_WORK_FACTOR",
                reason: e.to_string(),
            })?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            decoy: Arc::new(OnceLock::new()),
        })
    }

    /// Hashes with a fresh random salt; the same input never yields the same digest twice.
    pub fn hash(&self, plain: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError(e.to_string()))
    }

    /// Returns `false` for a wrong password and for any digest that does not parse.
    pub fn verify(&self, plain: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => self
                .argon2
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Spends one verification against a throwaway digest. Used when a login
    /// names an unknown email so that path costs the same as a wrong password.
    pub fn verify_decoy(&self, plain: &str) -> bool {
        let decoy = self
            .decoy
            .get_or_init(|| self.hash("decoy-credential").unwrap_or_default());
        let _ = self.verify(plain, decoy);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(WorkFactor {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn verifies_its_own_digest() {
        let h = hasher();
        let digest = h.hash("correct horse battery").unwrap();
        assert!(h.verify("correct horse battery", &digest));
        assert!(digest.starts_with("$argon2id$"));
    }

    #[test]
    fn rejects_other_password() {
        let h = hasher();
        let digest = h.hash("password-one").unwrap();
        assert!(!h.verify("password-two", &digest));
    }

    #[test]
    fn salts_every_digest() {
        let h = hasher();
        assert_ne!(h.hash("same").unwrap(), h.hash("same").unwrap());
    }

    #[test]
    fn malformed_digest_is_false_not_error() {
        let h = hasher();
        assert!(!h.verify("anything", ""));
        assert!(!h.verify("anything", "not-a-phc-string"));
        assert!(!h.verify("anything", "$argon2id$v=19$m=broken"));
    }

    #[test]
    fn digest_from_different_work_factor_still_verifies() {
        let digest = hasher().hash("portable").unwrap();
        let stronger = CredentialHasher::new(WorkFactor {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(stronger.verify("portable", &digest));
    }

    #[test]
    fn decoy_never_matches() {
        assert!(!hasher().verify_decoy("decoy-credential"));
    }

    #[test]
    fn invalid_work_factor_is_config_error() {
        let err = CredentialHasher::new(WorkFactor {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }
}
