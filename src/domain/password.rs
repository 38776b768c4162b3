//! Password hashing
//!
//! Argon2id with default parameters, stored as a PHC string.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use super::DomainError;

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, DomainError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::InvalidRequest(format!("password could not be hashed: {e}")))
}

/// Check a password against a stored PHC hash. A malformed hash never
/// verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("hunter42").unwrap();
        assert!(verify_password("hunter42", &stored));
        assert!(!verify_password("hunter43", &stored));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same1").unwrap(), hash_password("same1").unwrap());
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("x", "no-separator"));
        assert!(!verify_password("x", ""));
        assert!(!verify_password("abc123", "2478aa$b3c0ff"));
    }

    #[test]
    fn test_stored_as_argon2id_phc_string() {
        let stored = hash_password("abc123").unwrap();
        let parsed = PasswordHash::new(&stored).unwrap();

        assert!(stored.starts_with("$argon2id$"));
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        assert!(parsed.salt.is_some());
        assert!(!stored.contains("abc123"));
    }
}
