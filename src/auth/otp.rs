// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-time passcode generation and comparison.

use ring::rand::{SecureRandom, SystemRandom};
use subtle::ConstantTimeEq;

use super::error::AuthError;

/// Number of decimal digits in a passcode.
pub const OTP_DIGITS: usize = 6;

const OTP_SPACE: u32 = 1_000_000;
// Largest multiple of OTP_SPACE representable in a u32; draws at or above it
// are rejected so every code is equally likely.
const REJECTION_BOUND: u32 = u32::MAX - (u32::MAX % OTP_SPACE);

/// Generate a uniformly distributed six digit code from the system CSPRNG.
pub fn generate_code(rng: &SystemRandom) -> Result<String, AuthError> {
    loop {
        let mut buf = [0u8; 4];
        rng.fill(&mut buf)
            .map_err(|_| AuthError::InternalError("system randomness unavailable".into()))?;
        let draw = u32::from_be_bytes(buf);
        if draw < REJECTION_BOUND {
            return Ok(format!("{:0width$}", draw % OTP_SPACE, width = OTP_DIGITS));
        }
    }
}

/// Compare two codes in constant time.
pub fn codes_match(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        let rng = SystemRandom::new();
        for _ in 0..200 {
            let code = generate_code(&rng).unwrap();
            assert_eq!(code.len(), OTP_DIGITS);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn codes_vary() {
        let rng = SystemRandom::new();
        let codes: std::collections::HashSet<String> =
            (0..50).map(|_| generate_code(&rng).unwrap()).collect();
        assert!(codes.len() > 1);
    }

    #[test]
    fn comparison() {
        assert!(codes_match("123456", "123456"));
        assert!(!codes_match("123456", "000000"));
        assert!(!codes_match("123456", "12345"));
        assert!(!codes_match("123456", ""));
    }
}
