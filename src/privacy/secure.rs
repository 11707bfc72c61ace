//! Secure computation seam
//!
//! Homomorphic encryption and federated aggregation are pluggable behind
//! [`SecureComputation`]. The only implementation shipped here,
//! [`PassthroughSecureComputation`], is a mock: it detects tampering but
//! provides NO confidentiality.

use serde::{Deserialize, Serialize};

use super::error::{PrivacyError, PrivacyResult};

/// An opaque value produced by a secure computation backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    /// Backend that produced the value
    pub scheme: String,
    pub ciphertext: Vec<u8>,
}

/// Operations a secure computation backend must support
pub trait SecureComputation: Send + Sync {
    /// Backend identifier
    fn scheme(&self) -> &'static str;
    
    /// Whether sealed values are actually confidential
    fn provides_confidentiality(&self) -> bool;
    
    fn seal(&self, value: f64) -> SealedValue;
    
    fn open(&self, sealed: &SealedValue) -> PrivacyResult<f64>;
    
    /// Add two sealed values without opening them (in a real scheme)
    fn add(&self, a: &SealedValue, b: &SealedValue) -> PrivacyResult<SealedValue>;
}

/// Mock backend: plaintext plus an integrity tag, no confidentiality
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSecureComputation;

const PASSTHROUGH_SCHEME: &str = "passthrough-mock";
const TAG_LEN: usize = 16;

impl PassthroughSecureComputation {
    fn tag(payload: &[u8]) -> [u8; TAG_LEN] {
        let digest = blake3::hash(payload);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&digest.as_bytes()[..TAG_LEN]);
        tag
    }
}

impl SecureComputation for PassthroughSecureComputation {
    fn scheme(&self) -> &'static str {
        PASSTHROUGH_SCHEME
    }
    
    fn provides_confidentiality(&self) -> bool {
        false
    }
    
    fn seal(&self, value: f64) -> SealedValue {
        let payload = value.to_le_bytes();
        let mut ciphertext = payload.to_vec();
        ciphertext.extend_from_slice(&Self::tag(&payload));
        SealedValue {
            scheme: PASSTHROUGH_SCHEME.to_string(),
            ciphertext,
        }
    }
    
    fn open(&self, sealed: &SealedValue) -> PrivacyResult<f64> {
        if sealed.scheme != PASSTHROUGH_SCHEME || sealed.ciphertext.len() != 8 + TAG_LEN {
            return Err(PrivacyError::SealedValueCorrupted);
        }
        let (payload, tag) = sealed.ciphertext.split_at(8);
        if tag != Self::tag(payload).as_slice() {
            return Err(PrivacyError::SealedValueCorrupted);
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(payload);
        Ok(f64::from_le_bytes(bytes))
    }
    
    fn add(&self, a: &SealedValue, b: &SealedValue) -> PrivacyResult<SealedValue> {
        Ok(self.seal(self.open(a)? + self.open(b)?))
    }
}
