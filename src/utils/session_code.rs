// src/utils/session_code.rs

use rand::Rng;

/// How many codes to try before giving up on finding a free one.
pub const MAX_CODE_ATTEMPTS: usize = 100;

/// Longest join code the join endpoint and the `session_code` column accept.
pub const MAX_SESSION_CODE_LENGTH: usize = 10;

/// Generates a random numeric join code of `length` digits.
pub fn generate_session_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}
