//! Referral codes
//!
//! A code is a prefix of the uppercase blake3 hex digest of the user id.
//! Collisions are resolved by the caller with a longer prefix.

use finova_common::UserId;

/// Default code length
pub const CODE_LEN: usize = 8;

/// Code of `len` characters (clamped to the digest length)
pub fn derive_code(user_id: &UserId, len: usize) -> String {
    let hex = blake3::hash(user_id.as_str().as_bytes()).to_hex();
    let len = len.clamp(1, hex.len());
    hex[..len].to_ascii_uppercase()
}

/// Candidate codes from shortest to longest
pub fn candidates(user_id: &UserId) -> impl Iterator<Item = String> + '_ {
    (CODE_LEN..=64).step_by(4).map(move |len| derive_code(user_id, len))
}

/// Normalize user input before lookup
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
