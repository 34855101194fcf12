//! Proof Key for Code Exchange (RFC 7636) and `state` generation for the
//! redirect login.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let verifier = {
            let mut bytes = [0u8; 32];
            rand::thread_rng().fill(&mut bytes);
            URL_SAFE_NO_PAD.encode(bytes)
        };
        let challenge = challenge_for(&verifier);

        Self {
            verifier,
            challenge,
        }
    }
}

/// S256 code challenge for a verifier.
pub fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

pub fn generate_state() -> String {
    uuid::Uuid::new_v4().to_string()
}
