//! Random codes and PBKDF2 secret hashes.
//!
//! Hashes are stored as standard base64 of `salt || derived key`, with a
//! 16 byte salt, a 32 byte HMAC-SHA256 key and 100 000 iterations.

use std::num::NonZeroU32;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::Error;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const ITERATIONS: u32 = 100_000;

fn iterations() -> NonZeroU32 {
    NonZeroU32::new(ITERATIONS).unwrap_or(NonZeroU32::MIN)
}

fn fill(rng: &SystemRandom, buf: &mut [u8]) -> Result<(), Error> {
    rng.fill(buf).map_err(|_| Error::Rng)
}

/// Generates an opaque code carrying `entropy_bytes` bytes from the system
/// CSPRNG, encoded as unpadded URL-safe base64.
///
/// The encoded form is returned whole, so a 32 byte code is 43 characters.
pub fn random_code(entropy_bytes: usize) -> Result<String, Error> {
    if entropy_bytes == 0 {
        return Err(Error::InvalidLength);
    }
    let rng = SystemRandom::new();
    let mut buf = vec![0u8; entropy_bytes];
    fill(&rng, &mut buf)?;
    Ok(URL_SAFE_NO_PAD.encode(&buf))
}

/// Hashes `secret` with a fresh random salt.
pub fn hash_secret(secret: &str) -> Result<String, Error> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    fill(&rng, &mut salt)?;

    let mut key = [0u8; KEY_LEN];
    pbkdf2::derive(PBKDF2_ALG, iterations(), &salt, secret.as_bytes(), &mut key);

    let mut out = Vec::with_capacity(SALT_LEN + KEY_LEN);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&key);
    Ok(STANDARD.encode(out))
}

/// Checks `secret` against a hash produced by [`hash_secret`].
///
/// The key comparison runs in constant time. A hash that cannot be decoded
/// yields [`Error::InvalidHash`]; a wrong secret yields `Ok(false)`.
pub fn verify_secret(secret: &str, stored: &str) -> Result<bool, Error> {
    let raw = STANDARD.decode(stored).map_err(|_| Error::InvalidHash)?;
    if raw.len() != SALT_LEN + KEY_LEN {
        return Err(Error::InvalidHash);
    }
    let (salt, key) = raw.split_at(SALT_LEN);
    Ok(pbkdf2::verify(PBKDF2_ALG, iterations(), salt, secret.as_bytes(), key).is_ok())
}
