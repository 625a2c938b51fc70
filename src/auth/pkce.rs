//! PKCE (RFC 7636) and anti-CSRF state tokens

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes behind a state token (43 URL-safe characters)
const STATE_BYTES: usize = 32;

/// Random bytes behind a code verifier (64 URL-safe characters)
const VERIFIER_BYTES: usize = 48;

pub const CHALLENGE_METHOD: &str = "S256";

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Opaque single-use state token for one authorization attempt
pub fn generate_state() -> String {
    random_token(STATE_BYTES)
}

/// Verifier plus its S256 challenge
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        let verifier = random_token(VERIFIER_BYTES);
        let challenge = code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// BASE64URL(SHA256(verifier)) without padding
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
