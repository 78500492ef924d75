//! Initial secret generation.
//!
//! Policy: at least [`MIN_SECRET_LENGTH`] characters, with at least one
//! upper-case letter, lower-case letter, digit and symbol.

use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng};

use idforge_core::SecretString;

pub const MIN_SECRET_LENGTH: usize = 12;
pub const DEFAULT_SECRET_LENGTH: usize = 16;
/// Longest password the directory accepts.
pub const MAX_SECRET_LENGTH: usize = 256;

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
pub const SYMBOLS: &[u8] = b"!@#$%^&*";

/// Generate a secret with the thread-local CSPRNG.
pub fn generate_secret(length: usize) -> SecretString {
    generate_secret_with(&mut rand::thread_rng(), length)
}

/// Generate a secret of `length` characters, clamped to
/// `MIN_SECRET_LENGTH..=MAX_SECRET_LENGTH`.
pub fn generate_secret_with<R>(rng: &mut R, length: usize) -> SecretString
where
    R: Rng + CryptoRng + ?Sized,
{
    let length = length.clamp(MIN_SECRET_LENGTH, MAX_SECRET_LENGTH);
    let classes = [UPPER, LOWER, DIGITS, SYMBOLS];

    let mut chars: Vec<u8> = Vec::with_capacity(length);
    for class in classes {
        chars.push(pick(rng, class));
    }
    while chars.len() < length {
        let class = classes[rng.gen_range(0..classes.len())];
        chars.push(pick(rng, class));
    }
    chars.shuffle(rng);

    SecretString::new(chars.into_iter().map(char::from).collect())
}

fn pick<R: Rng + ?Sized>(rng: &mut R, set: &[u8]) -> u8 {
    set[rng.gen_range(0..set.len())]
}

/// Whether `candidate` satisfies the secret policy.
pub fn meets_policy(candidate: &str) -> bool {
    candidate.chars().count() >= MIN_SECRET_LENGTH
        && candidate.chars().any(|c| c.is_ascii_uppercase())
        && candidate.chars().any(|c| c.is_ascii_lowercase())
        && candidate.chars().any(|c| c.is_ascii_digit())
        && candidate.bytes().any(|b| SYMBOLS.contains(&b))
}
