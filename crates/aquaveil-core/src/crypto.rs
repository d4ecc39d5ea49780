//! Fulfillment-proof cryptography.
//!
//! The decryption oracle proves correct decryption by signing a canonical,
//! domain-separated binding of `(request_id, cleartexts)` with ed25519.
//! The core verifies that binding before any reveal is applied.
//!
//! # Security
//!
//! - Keys should be loaded from secure storage; never log or expose seeds.
//! - Seed bytes passing through hex parsing are zeroized after use.

use crate::hash::FULFILLMENT_DOMAIN_V1;
use crate::{Error, RequestId, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use tracing::debug;
use zeroize::Zeroize;

/// 64-byte ed25519 signature.
pub type ProofBytes = [u8; 64];

/// 32-byte ed25519 public key.
pub type PublicKeyBytes = [u8; 32];

/// 32-byte ed25519 private key seed.
pub type PrivateKeySeed = [u8; 32];

/// Canonical signing bytes for a fulfillment:
/// `DOMAIN || request_id_le || count_le || cleartext_le ...`
pub fn fulfillment_signing_bytes(request_id: RequestId, cleartexts: &[u64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(FULFILLMENT_DOMAIN_V1.len() + 12 + cleartexts.len() * 8);
    bytes.extend_from_slice(FULFILLMENT_DOMAIN_V1);
    bytes.extend_from_slice(&request_id.0.to_le_bytes());
    bytes.extend_from_slice(&(cleartexts.len() as u32).to_le_bytes());
    for value in cleartexts {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Keypair the oracle uses to sign fulfillments.
#[derive(Clone)]
pub struct OracleSigningKey {
    signing_key: SigningKey,
}

impl OracleSigningKey {
    /// Generate a new random keypair from the OS CSPRNG.
    ///
    /// Suitable for testing, development and ephemeral deployments; real
    /// oracles load their key from secure storage instead.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Load keypair from seed bytes.
    pub fn from_seed(seed: &PrivateKeySeed) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Load keypair from a hex-encoded seed. Intermediate buffers are
    /// zeroized.
    pub fn from_hex(hex_seed: &str) -> Result<Self> {
        let mut bytes =
            hex::decode(hex_seed).map_err(|e| Error::Config(format!("invalid hex seed: {e}")))?;

        if bytes.len() != 32 {
            bytes.zeroize();
            return Err(Error::Config("seed must be exactly 32 bytes".into()));
        }

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        bytes.zeroize();

        let key = Self::from_seed(&seed);
        seed.zeroize();
        Ok(key)
    }

    /// Get the public verifying key.
    pub fn verifying_key(&self) -> OracleVerifyingKey {
        OracleVerifyingKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Sign the canonical binding of a fulfillment.
    pub fn sign_fulfillment(&self, request_id: RequestId, cleartexts: &[u64]) -> ProofBytes {
        let message = fulfillment_signing_bytes(request_id, cleartexts);
        self.signing_key.sign(&message).to_bytes()
    }
}

/// Public key for verifying fulfillment proofs.
#[derive(Clone)]
pub struct OracleVerifyingKey {
    verifying_key: VerifyingKey,
}

impl OracleVerifyingKey {
    pub fn from_bytes(bytes: &PublicKeyBytes) -> Result<Self> {
        let verifying_key = VerifyingKey::from_bytes(bytes)
            .map_err(|e| Error::Config(format!("invalid public key: {e}")))?;
        Ok(Self { verifying_key })
    }

    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes =
            hex::decode(hex_key).map_err(|e| Error::Config(format!("invalid hex key: {e}")))?;

        if bytes.len() != 32 {
            return Err(Error::Config("public key must be exactly 32 bytes".into()));
        }

        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&bytes);
        Self::from_bytes(&key_bytes)
    }

    pub fn to_bytes(&self) -> PublicKeyBytes {
        self.verifying_key.to_bytes()
    }

    /// Verify a fulfillment proof against the canonical binding.
    pub fn verify_fulfillment(
        &self,
        request_id: RequestId,
        cleartexts: &[u64],
        proof: &[u8],
    ) -> Result<()> {
        let signature = Signature::from_slice(proof)
            .map_err(|e| Error::ProofVerificationFailed(format!("malformed signature: {e}")))?;
        let message = fulfillment_signing_bytes(request_id, cleartexts);
        self.verifying_key
            .verify(&message, &signature)
            .map_err(|e| Error::ProofVerificationFailed(format!("signature invalid: {e}")))?;
        debug!(%request_id, "fulfillment proof verified");
        Ok(())
    }
}

/// Verification outcome for fulfillment proofs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationStatus {
    Success,
    Failure(String),
}

/// Verifies the oracle's proof over `(request_id, cleartexts)`.
pub trait FulfillmentVerifier: Send + Sync {
    fn verify(
        &self,
        request_id: RequestId,
        cleartexts: &[u64],
        proof: &[u8],
    ) -> VerificationStatus;
}

/// Production verifier backed by the oracle's ed25519 public key.
pub struct Ed25519FulfillmentVerifier {
    key: OracleVerifyingKey,
}

impl Ed25519FulfillmentVerifier {
    pub fn new(key: OracleVerifyingKey) -> Self {
        Self { key }
    }
}

impl FulfillmentVerifier for Ed25519FulfillmentVerifier {
    fn verify(
        &self,
        request_id: RequestId,
        cleartexts: &[u64],
        proof: &[u8],
    ) -> VerificationStatus {
        match self.key.verify_fulfillment(request_id, cleartexts, proof) {
            Ok(()) => VerificationStatus::Success,
            Err(e) => VerificationStatus::Failure(e.to_string()),
        }
    }
}

/// Stub verifier for tests: accepts or rejects everything.
pub struct StubFulfillmentVerifier {
    accept: bool,
}

impl StubFulfillmentVerifier {
    pub fn accept_all() -> Self {
        Self { accept: true }
    }

    pub fn reject_all() -> Self {
        Self { accept: false }
    }
}

impl FulfillmentVerifier for StubFulfillmentVerifier {
    fn verify(&self, _: RequestId, _: &[u64], _: &[u8]) -> VerificationStatus {
        if self.accept {
            VerificationStatus::Success
        } else {
            VerificationStatus::Failure("rejected by stub".into())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
