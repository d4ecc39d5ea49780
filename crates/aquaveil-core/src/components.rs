//! Development-grade implementations of the core capability traits.
//!
//! These back unit tests, examples and the demo pipeline. The plain-word
//! algebra hides nothing: a "ciphertext" is one little-endian `u64`. Real
//! deployments plug an FHE-backed algebra in behind the same trait.

use crate::hash::{sha256_domain, CT_HANDLE_DOMAIN_V1};
use crate::protocol::DecryptionOracle;
use crate::{Ciphertext, CiphertextAlgebra, CtHandle, Error, RequestId, Result};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

// =============================================================================
// PlainWordAlgebra
// =============================================================================

/// Word-per-ciphertext algebra over plain little-endian `u64` bytes.
///
/// Semantics owned by this implementation: `add`/`mul` saturate at
/// `u64::MAX`, `sub` saturates at zero, `div` truncates toward zero and
/// fails on a zero divisor.
pub struct PlainWordAlgebra;

impl PlainWordAlgebra {
    /// Decode the single word of a plain ciphertext.
    pub fn word(ct: &Ciphertext) -> Result<u64> {
        let bytes: [u8; 8] = ct.0.as_slice().try_into().map_err(|_| {
            Error::Algebra(format!("expected 8 ciphertext bytes, got {}", ct.0.len()))
        })?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Encode a word as a plain ciphertext.
    pub fn seal(value: u64) -> Ciphertext {
        Ciphertext(value.to_le_bytes().to_vec())
    }
}

impl CiphertextAlgebra for PlainWordAlgebra {
    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        Ok(Self::seal(Self::word(a)?.saturating_add(Self::word(b)?)))
    }

    fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        Ok(Self::seal(Self::word(a)?.saturating_sub(Self::word(b)?)))
    }

    fn mul(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        Ok(Self::seal(Self::word(a)?.saturating_mul(Self::word(b)?)))
    }

    fn div(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let divisor = Self::word(b)?;
        if divisor == 0 {
            return Err(Error::Algebra("division by zero".into()));
        }
        Ok(Self::seal(Self::word(a)? / divisor))
    }

    fn encode_constant(&self, value: u64) -> Result<Ciphertext> {
        Ok(Self::seal(value))
    }

    fn handle(&self, ct: &Ciphertext) -> CtHandle {
        CtHandle(sha256_domain(CT_HANDLE_DOMAIN_V1, &ct.0))
    }
}

// =============================================================================
// RecordingOracle
// =============================================================================

/// Oracle endpoint that issues sequential request ids and records every
/// submitted handle list for later assertions.
pub struct RecordingOracle {
    next_id: Mutex<u64>,
    issued: RwLock<HashMap<RequestId, Vec<CtHandle>>>,
}

impl RecordingOracle {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            issued: RwLock::new(HashMap::new()),
        }
    }

    /// Handle list submitted under `request_id`, if any.
    pub fn issued_handles(&self, request_id: RequestId) -> Option<Vec<CtHandle>> {
        let issued = self.issued.read().ok()?;
        issued.get(&request_id).cloned()
    }

    pub fn issued_count(&self) -> usize {
        match self.issued.read() {
            Ok(issued) => issued.len(),
            Err(_) => 0,
        }
    }
}

impl Default for RecordingOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl DecryptionOracle for RecordingOracle {
    fn submit_request(&self, handles: &[CtHandle]) -> Result<RequestId> {
        let mut next = self
            .next_id
            .lock()
            .map_err(|_| Error::Oracle("oracle id lock poisoned".into()))?;
        let request_id = RequestId(*next);
        *next += 1;

        self.issued
            .write()
            .map_err(|_| Error::Oracle("oracle table lock poisoned".into()))?
            .insert(request_id, handles.to_vec());
        Ok(request_id)
    }
}
