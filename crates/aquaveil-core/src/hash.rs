use sha2::{Digest, Sha256};

/// Compute a deterministic SHA-256 hash of a byte slice.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    bytes
}

/// Compute a domain-separated SHA-256 hash: `H(domain || data)`.
pub fn sha256_domain(domain: &[u8], data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    bytes
}

// =============================================================================
// Domain separation (v1)
// =============================================================================

/// Domain separation tag for ciphertext handle derivation.
pub const CT_HANDLE_DOMAIN_V1: &[u8] = b"AQUAVEIL_CT_HANDLE_V1";

/// Domain separation tag for fulfillment signing bytes.
pub const FULFILLMENT_DOMAIN_V1: &[u8] = b"AQUAVEIL_FULFILLMENT_V1";
