use argon2::{
    Argon2,
    PasswordHasher,
};
use sha2::{Digest, Sha256};

use argon2::password_hash::{SaltString, rand_core::OsRng};

/// Hash a new password using Argon2id with a random salt.
/// Store the returned string in auth_user.password_hash.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| format!("argon2 hash error: {e}"))
}

/// Session tokens are issued by the auth provider; only their SHA-256 hex
/// digest is stored in session_token.
pub fn hash_access_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{PasswordHash, PasswordVerifier};

    #[test]
    fn token_digest_is_stable_hex() {
        let a = hash_access_token("token-123");
        assert_eq!(a, hash_access_token("token-123"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_access_token("token-124"));
    }

    #[test]
    fn password_hash_verifies() {
        let phc = hash_password("s3cret!").unwrap();
        let parsed = PasswordHash::new(&phc).unwrap();
        assert!(Argon2::default().verify_password(b"s3cret!", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }
}
