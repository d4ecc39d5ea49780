//! Sealed-word ciphertext algebra.
//!
//! A "ciphertext" is one little-endian `u64` word XOR-masked with a
//! keystream derived from `SHA-256(domain || key || nonce)`, prefixed by
//! the 8-byte nonce. The implementation holds the sealing key, so it can
//! unseal operands, compute in the clear and reseal the result; it stands
//! in for an FHE scheme without providing one.
//!
//! Arithmetic semantics owned by this adapter: `add` and `mul` saturate at
//! `u64::MAX`, `sub` saturates at zero, `div` truncates toward zero and
//! fails on a zero divisor.

use aquaveil_core::hash::{sha256_domain, CT_HANDLE_DOMAIN_V1};
use aquaveil_core::{Ciphertext, CiphertextAlgebra, CtHandle, Error, Result};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Domain separation tag for the sealing keystream.
const SEAL_MASK_DOMAIN_V1: &[u8] = b"AQUAVEIL_SEAL_MASK_V1";

/// Sealed ciphertext layout: nonce (8 bytes) || masked word (8 bytes).
const SEALED_LEN: usize = 16;

/// Shared mapping from ciphertext handles to ciphertext bytes.
///
/// The algebra registers every ciphertext it hands a handle for; the local
/// oracle resolves handles back through the same table, mirroring how a
/// real oracle resolves handles out-of-band.
pub struct HandleTable {
    entries: RwLock<HashMap<CtHandle, Ciphertext>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, handle: CtHandle, ct: Ciphertext) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(handle, ct);
        }
    }

    pub fn resolve(&self, handle: CtHandle) -> Option<Ciphertext> {
        let entries = self.entries.read().ok()?;
        entries.get(&handle).cloned()
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyed sealed-word algebra.
pub struct SealedWordAlgebra {
    key: [u8; 32],
    next_nonce: AtomicU64,
    handles: Arc<HandleTable>,
}

impl SealedWordAlgebra {
    /// Create an algebra sealing under `key`.
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key,
            next_nonce: AtomicU64::new(1),
            handles: Arc::new(HandleTable::new()),
        }
    }

    /// Create an algebra with a fresh random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self::new(key)
    }

    /// The handle table shared with the local oracle.
    pub fn handles(&self) -> Arc<HandleTable> {
        Arc::clone(&self.handles)
    }

    fn mask(&self, nonce: u64) -> u64 {
        let mut material = Vec::with_capacity(40);
        material.extend_from_slice(&self.key);
        material.extend_from_slice(&nonce.to_le_bytes());
        let digest = sha256_domain(SEAL_MASK_DOMAIN_V1, &material);
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(word)
    }

    /// Seal a plaintext word under a fresh nonce.
    pub fn seal(&self, value: u64) -> Ciphertext {
        let nonce = self.next_nonce.fetch_add(1, Ordering::Relaxed);
        let masked = value ^ self.mask(nonce);
        let mut bytes = Vec::with_capacity(SEALED_LEN);
        bytes.extend_from_slice(&nonce.to_le_bytes());
        bytes.extend_from_slice(&masked.to_le_bytes());
        Ciphertext(bytes)
    }

    /// Unseal a ciphertext produced by this algebra's key.
    pub fn unseal(&self, ct: &Ciphertext) -> Result<u64> {
        if ct.0.len() != SEALED_LEN {
            return Err(Error::Algebra(format!(
                "expected {SEALED_LEN} sealed bytes, got {}",
                ct.0.len()
            )));
        }
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&ct.0[..8]);
        let mut masked = [0u8; 8];
        masked.copy_from_slice(&ct.0[8..]);
        Ok(u64::from_le_bytes(masked) ^ self.mask(u64::from_le_bytes(nonce)))
    }

    fn binary_op(
        &self,
        a: &Ciphertext,
        b: &Ciphertext,
        op: impl FnOnce(u64, u64) -> Result<u64>,
    ) -> Result<Ciphertext> {
        let lhs = self.unseal(a)?;
        let rhs = self.unseal(b)?;
        Ok(self.seal(op(lhs, rhs)?))
    }
}

impl CiphertextAlgebra for SealedWordAlgebra {
    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.binary_op(a, b, |x, y| Ok(x.saturating_add(y)))
    }

    fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.binary_op(a, b, |x, y| Ok(x.saturating_sub(y)))
    }

    fn mul(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.binary_op(a, b, |x, y| Ok(x.saturating_mul(y)))
    }

    fn div(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.binary_op(a, b, |x, y| {
            if y == 0 {
                return Err(Error::Algebra("division by zero".into()));
            }
            Ok(x / y)
        })
    }

    fn encode_constant(&self, value: u64) -> Result<Ciphertext> {
        Ok(self.seal(value))
    }

    fn handle(&self, ct: &Ciphertext) -> CtHandle {
        let handle = CtHandle(sha256_domain(CT_HANDLE_DOMAIN_V1, &ct.0));
        self.handles.insert(handle, ct.clone());
        handle
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_unseal_roundtrip() {
        let algebra = SealedWordAlgebra::generate();
        for value in [0u64, 1, 42, u64::MAX] {
            let ct = algebra.seal(value);
            assert_eq!(algebra.unseal(&ct).unwrap(), value);
        }
    }

    #[test]
    fn sealing_is_nonce_randomized() {
        let algebra = SealedWordAlgebra::generate();
        let a = algebra.seal(7);
        let b = algebra.seal(7);
        assert_ne!(a, b);
        assert_eq!(algebra.unseal(&a).unwrap(), algebra.unseal(&b).unwrap());
    }

    #[test]
    fn wrong_key_garbles_word() {
        let a = SealedWordAlgebra::new([1u8; 32]);
        let b = SealedWordAlgebra::new([2u8; 32]);
        let ct = a.seal(1234);
        assert_ne!(b.unseal(&ct).unwrap(), 1234);
    }

    #[test]
    fn arithmetic_matches_plain_semantics() {
        let algebra = SealedWordAlgebra::generate();
        let x = algebra.seal(30);
        let y = algebra.seal(7);

        assert_eq!(algebra.unseal(&algebra.add(&x, &y).unwrap()).unwrap(), 37);
        assert_eq!(algebra.unseal(&algebra.sub(&y, &x).unwrap()).unwrap(), 0);
        assert_eq!(algebra.unseal(&algebra.mul(&x, &y).unwrap()).unwrap(), 210);
        assert_eq!(algebra.unseal(&algebra.div(&x, &y).unwrap()).unwrap(), 4);
    }

    #[test]
    fn division_by_zero_fails() {
        let algebra = SealedWordAlgebra::generate();
        let x = algebra.seal(1);
        let zero = algebra.seal(0);
        assert!(matches!(
            algebra.div(&x, &zero),
            Err(Error::Algebra(_))
        ));
    }

    #[test]
    fn truncated_ciphertext_rejected() {
        let algebra = SealedWordAlgebra::generate();
        let result = algebra.unseal(&Ciphertext(vec![1, 2, 3]));
        assert!(matches!(result, Err(Error::Algebra(_))));
    }

    #[test]
    fn handle_registers_ciphertext_for_resolution() {
        let algebra = SealedWordAlgebra::generate();
        let ct = algebra.seal(99);
        let handle = algebra.handle(&ct);

        let resolved = algebra.handles().resolve(handle).unwrap();
        assert_eq!(resolved, ct);
        assert_eq!(algebra.unseal(&resolved).unwrap(), 99);
    }
}
