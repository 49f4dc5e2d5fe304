//! Group invite codes
//!
//! Codes are five uppercase ASCII letters, generated client-side. They are
//! not unique by construction; storage enforces uniqueness and group creation
//! retries on collision.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of letters in an invite code
pub const INVITE_CODE_LEN: usize = 5;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A normalized (uppercase) invite code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InviteCode(String);

impl InviteCode {
    /// Generate a random code
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Generate a code from the given RNG (for deterministic tests)
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..INVITE_CODE_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Parse user input; case-insensitive, surrounding whitespace ignored
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.len() != INVITE_CODE_LEN {
            return Err(Error::Invitation(format!(
                "Invite code must be {} letters",
                INVITE_CODE_LEN
            )));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::Invitation(
                "Invite code may only contain letters".into(),
            ));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InviteCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for InviteCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<InviteCode> for String {
    fn from(code: InviteCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..100 {
            let code = InviteCode::generate();
            assert_eq!(code.as_str().len(), INVITE_CODE_LEN);
            assert!(code.as_str().chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let a = InviteCode::generate_with(&mut StdRng::seed_from_u64(7));
        let b = InviteCode::generate_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_normalizes_case() {
        let code = InviteCode::parse("  abQdE ").unwrap();
        assert_eq!(code.as_str(), "ABQDE");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(InviteCode::parse("ABCD").is_err());
        assert!(InviteCode::parse("ABCDEF").is_err());
        assert!(InviteCode::parse("AB1DE").is_err());
        assert!(InviteCode::parse("").is_err());
    }
}
