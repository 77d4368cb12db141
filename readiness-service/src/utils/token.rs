use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Random bytes per recovery token.
pub const RECOVERY_TOKEN_BYTES: usize = 32;

/// Plaintext recovery token. Handed to the client once and never stored.
#[derive(Clone)]
pub struct RecoveryToken(String);

impl RecoveryToken {
    pub fn new(token: String) -> Self {
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for RecoveryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RecoveryToken(..)")
    }
}

/// Hex SHA-256 digest of a recovery token, the only form that is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryTokenHash(String);

impl RecoveryTokenHash {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Generate a fresh token from the OS RNG along with its digest.
pub fn issue_recovery_token() -> (RecoveryToken, RecoveryTokenHash) {
    let mut bytes = [0u8; RECOVERY_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);

    let token = RecoveryToken::new(hex::encode(bytes));
    let hash = hash_recovery_token(token.as_str());
    (token, hash)
}

pub fn hash_recovery_token(token: &str) -> RecoveryTokenHash {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    RecoveryTokenHash::new(hex::encode(hasher.finalize()))
}

/// Compare a presented token against a stored digest in constant time.
pub fn verify_recovery_token(token: &str, stored_hash: &str) -> bool {
    let presented = hash_recovery_token(token);
    presented
        .as_str()
        .as_bytes()
        .ct_eq(stored_hash.as_bytes())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_is_64_hex_chars() {
        let (token, hash) = issue_recovery_token();
        assert_eq!(token.as_str().len(), RECOVERY_TOKEN_BYTES * 2);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash.as_str().len(), 64);
        assert_ne!(token.as_str(), hash.as_str());
    }

    #[test]
    fn hash_matches_sha256_of_plaintext() {
        let (token, hash) = issue_recovery_token();
        let expected = hex::encode(Sha256::digest(token.as_str().as_bytes()));
        assert_eq!(hash.as_str(), expected);
    }

    #[test]
    fn tokens_are_unique() {
        let (a, _) = issue_recovery_token();
        let (b, _) = issue_recovery_token();
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn verify_accepts_only_the_issued_token() {
        let (token, hash) = issue_recovery_token();
        assert!(verify_recovery_token(token.as_str(), hash.as_str()));

        let (other, _) = issue_recovery_token();
        assert!(!verify_recovery_token(other.as_str(), hash.as_str()));
        assert!(!verify_recovery_token("", hash.as_str()));
    }

    #[test]
    fn debug_does_not_leak_plaintext() {
        let (token, _) = issue_recovery_token();
        assert!(!format!("{:?}", token).contains(token.as_str()));
    }
}
