//! Organization codes: the shareable strings binding User accounts to an
//! Admin's organization. Generation is local and random; validation is a
//! query against the `users` collection (a code is valid iff some account
//! currently carries it).

use crate::backend::CredentialBackend;
use crate::errors::AuthError;
use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

const CODE_PREFIX: &str = "TDS-";
const CODE_SUFFIX_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Outcome of validating a submitted organization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub reason: Option<AuthError>,
}

impl Validation {
    pub(crate) fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub(crate) fn rejected(reason: AuthError) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

/// Produces a fresh `TDS-XXXXXX` code (6 random base-36 uppercase
/// characters). Unpredictable enough to deter guessing; uniqueness is not
/// enforced here.
#[must_use]
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CODE_SUFFIX_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    format!("{CODE_PREFIX}{suffix}")
}

/// Lexical shape check, without touching the backend. A well-formed code is
/// not necessarily a known one.
#[must_use]
pub fn is_well_formed(code: &str) -> bool {
    static FORMAT: OnceLock<Regex> = OnceLock::new();
    FORMAT
        .get_or_init(|| Regex::new(r"^TDS-[0-9A-Z]{6}$").expect("static pattern"))
        .is_match(code)
}

/// Validates a submitted code against stored records: empty input is
/// rejected outright, otherwise the code is valid iff at least one account
/// currently carries it. Backend failures surface as a rejection carrying
/// the mapped error.
pub async fn validate(backend: &dyn CredentialBackend, code: &str) -> Validation {
    if code.trim().is_empty() {
        return Validation::rejected(AuthError::OrganizationCodeRequired);
    }

    match backend.any_account_has_org_code(code).await {
        Ok(true) => Validation::ok(),
        Ok(false) => Validation::rejected(AuthError::InvalidOrganizationCode),
        Err(err) => Validation::rejected(err),
    }
}
