//! Deterministic cache keys and validators.
//!
//! A fingerprint is a SHA-256 over the semantic inputs of a generation
//! request. Each field is length-prefixed so that moving bytes between
//! adjacent fields cannot produce the same digest.

use sha2::{Digest, Sha256};

use crate::upstream::GenerationParams;

/// Hex-encoded SHA-256 identifying a cacheable request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint of `(content, variant, params)`.
    pub fn compute(content: &str, variant: &str, params: &GenerationParams) -> Self {
        let mut hasher = Sha256::new();
        update_field(&mut hasher, content.as_bytes());
        update_field(&mut hasher, variant.as_bytes());
        update_field(&mut hasher, &params.temperature.to_bits().to_be_bytes());
        update_field(&mut hasher, &params.top_k.to_be_bytes());
        update_field(&mut hasher, &params.top_p.to_bits().to_be_bytes());
        update_field(&mut hasher, &params.max_output_tokens.to_be_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Validator token for a payload: the first 128 bits of its SHA-256, in hex.
pub fn validator_for(payload: &str) -> String {
    let digest = Sha256::digest(payload.as_bytes());
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}
