// backend/src/auth/password.rs

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::store::AuthError;

const HASH_PREFIX: &str = "pbkdf2_sha256";
pub const DEFAULT_ITERATIONS: u32 = 200_000;
const SALT_BYTES: usize = 16;
const DERIVED_BYTES: usize = 32;

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    hash_password_with_iterations(password, DEFAULT_ITERATIONS)
}

/// Encodes as `pbkdf2_sha256$<iterations>$<salt>$<hash>`.
pub fn hash_password_with_iterations(password: &str, iterations: u32) -> Result<String, AuthError> {
    if password.trim().is_empty() {
        return Err(AuthError::BlankPassword);
    }

    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    let derived = derive(password.as_bytes(), &salt, iterations);

    Ok(format!(
        "{}${}${}${}",
        HASH_PREFIX,
        iterations,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(derived)
    ))
}

/// Malformed or foreign hashes never verify.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    if password.trim().is_empty() {
        return false;
    }

    let mut parts = password_hash.splitn(4, '$');
    let (Some(prefix), Some(iterations), Some(salt_b64), Some(hash_b64)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if prefix != HASH_PREFIX {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (
        STANDARD_NO_PAD.decode(salt_b64),
        STANDARD_NO_PAD.decode(hash_b64),
    ) else {
        return false;
    };

    let derived = derive(password.as_bytes(), &salt, iterations);
    derived.ct_eq(expected.as_slice()).into()
}

/// A well-formed hash that no password matches. Login checks unknown
/// usernames against it so they cost the same derivation as known ones.
pub fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| {
        format!(
            "{}${}${}${}",
            HASH_PREFIX,
            DEFAULT_ITERATIONS,
            STANDARD_NO_PAD.encode([0u8; SALT_BYTES]),
            STANDARD_NO_PAD.encode([0u8; DERIVED_BYTES])
        )
    })
}

fn derive(password: &[u8], salt: &[u8], iterations: u32) -> [u8; DERIVED_BYTES] {
    let mut out = [0u8; DERIVED_BYTES];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}
