//! Password hashing.
//!
//! Salted, iterated SHA-256. The encoded form is `hex(salt)$hex(digest)`
//! so a record carries everything needed for verification.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of SHA-256 rounds applied to the salted password.
const ITERATIONS: u32 = 50_000;

/// Salt length in bytes.
const SALT_LEN: usize = 16;

fn stretch(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut digest = {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize()
    };
    for _ in 1..ITERATIONS {
        let mut hasher = Sha256::new();
        hasher.update(digest);
        digest = hasher.finalize();
    }
    digest.into()
}

/// Hash a password with a fresh random salt.
pub fn hash(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = stretch(password, &salt);
    format!("{}${}", hex::encode(salt), hex::encode(digest))
}

/// Verify a candidate password against an encoded hash.
///
/// Returns false for malformed encodings instead of erroring; a corrupt
/// hash should never let anyone in.
pub fn verify(password: &str, encoded: &str) -> bool {
    let Some((salt_hex, digest_hex)) = encoded.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };
    let actual = stretch(password, &salt);
    actual.as_slice() == expected.as_slice()
}
