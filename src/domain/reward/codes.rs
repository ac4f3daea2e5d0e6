//! Random code generation for discount codes and claim tokens.

use rand::Rng;

/// Upper-case letters and digits without the easily confused `0 O 1 I L`.
pub const DISCOUNT_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

pub const DIGITS: &[u8] = b"0123456789";

/// Draws `len` characters uniformly from `alphabet`.
pub fn random_code(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

pub fn discount_code(len: usize) -> String {
    random_code(DISCOUNT_ALPHABET, len)
}

/// Numeric token shown to staff when a physical item is collected.
pub fn claim_token(len: usize) -> String {
    random_code(DIGITS, len)
}
