use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub mod algebra;
pub mod auth;
pub mod components;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod events;
pub mod hash;
pub mod protocol;
pub mod registry;

pub use algebra::CiphertextAlgebra;
pub use config::AquaveilConfig;
pub use crypto::{FulfillmentVerifier, OracleSigningKey, OracleVerifyingKey, VerificationStatus};
pub use engine::OptimizationEngine;
pub use events::{DomainEvent, EventSink};
pub use protocol::{
    DecryptionOracle, DecryptionProtocol, FulfillmentOutcome, PendingDecryptionRequest,
    PendingRequestStore,
};
pub use registry::{PlantRecordStore, PlantRegistry};

/// Identifier of a registered plant.
///
/// Assigned monotonically by the record store, starting at 1. Zero is the
/// reserved "invalid/not found" sentinel and is never allocated.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct PlantId(pub u64);

impl PlantId {
    /// The reserved sentinel; never refers to a live record.
    pub const INVALID: PlantId = PlantId(0);
}

impl std::fmt::Display for PlantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "plant-{}", self.0)
    }
}

/// Opaque caller identity, supplied by the external identity/wallet layer.
///
/// The core only ever compares these for equality; it does not authenticate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId(pub [u8; 32]);

impl std::fmt::Display for OperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Oracle-issued identifier of an outstanding decryption request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Opaque ciphertext bytes.
///
/// The core never interprets these; all arithmetic goes through a
/// [`CiphertextAlgebra`] implementation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext(pub Vec<u8>);

/// Opaque 32-byte reference to a ciphertext, exchanged with the decryption
/// oracle in place of the ciphertext itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CtHandle(pub [u8; 32]);

impl std::fmt::Display for CtHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Number of ciphertext fields in a telemetry submission.
pub const TELEMETRY_FIELDS: usize = 4;

/// Number of derived ciphertext fields in an optimization result.
pub const OPTIMIZATION_FIELDS: usize = 3;

/// The four encrypted telemetry readings of one plant, in canonical order.
///
/// Immutable once submitted; there is no update-in-place operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedTelemetry {
    pub inflow_rate: Ciphertext,
    pub chemical_levels: Ciphertext,
    pub turbidity: Ciphertext,
    pub bacterial_count: Ciphertext,
}

impl EncryptedTelemetry {
    /// Fields in the canonical order used for decryption requests:
    /// inflow rate, chemical levels, turbidity, bacterial count.
    pub fn fields(&self) -> [&Ciphertext; TELEMETRY_FIELDS] {
        [
            &self.inflow_rate,
            &self.chemical_levels,
            &self.turbidity,
            &self.bacterial_count,
        ]
    }
}

/// Plaintext mirror of [`EncryptedTelemetry`], populated exactly once by a
/// verified decryption fulfillment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedTelemetry {
    pub inflow_rate: u64,
    pub chemical_levels: u64,
    pub turbidity: u64,
    pub bacterial_count: u64,
}

/// One registered plant: its operator, submission time, ciphertext readings
/// and (after a verified reveal) their plaintext mirror.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantRecord {
    pub plant_id: PlantId,
    /// Identity that owns decryption rights; set at submission, immutable.
    pub operator: OperatorId,
    pub submitted_at_ms: i64,
    pub telemetry: EncryptedTelemetry,
    pub revealed: Option<RevealedTelemetry>,
}

impl PlantRecord {
    /// Monotone false→true; flips on the first verified decrypt callback.
    pub fn is_revealed(&self) -> bool {
        self.revealed.is_some()
    }
}

/// The three derived optimization ciphertexts, in canonical order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub chemical_dosage: Ciphertext,
    pub flow_adjustment: Ciphertext,
    pub efficiency_score: Ciphertext,
}

impl OptimizationResult {
    /// Fields in the canonical order used for decryption requests:
    /// chemical dosage, flow adjustment, efficiency score.
    pub fn fields(&self) -> [&Ciphertext; OPTIMIZATION_FIELDS] {
        [
            &self.chemical_dosage,
            &self.flow_adjustment,
            &self.efficiency_score,
        ]
    }
}

/// Plaintext optimization triple surfaced at fulfillment time.
///
/// Not persisted: optimization reveals are one-shot reveal-and-forget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedOptimization {
    pub chemical_dosage: u64,
    pub flow_adjustment: u64,
    pub efficiency_score: u64,
}

/// What a decryption request targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    Telemetry,
    Optimization,
}

impl RequestKind {
    /// Expected cleartext arity for a fulfillment of this kind.
    pub fn arity(&self) -> usize {
        match self {
            RequestKind::Telemetry => TELEMETRY_FIELDS,
            RequestKind::Optimization => OPTIMIZATION_FIELDS,
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::Telemetry => write!(f, "telemetry"),
            RequestKind::Optimization => write!(f, "optimization"),
        }
    }
}

/// Unified error type for aquaveil core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller is not the record's registered operator. Never partially
    /// applied: no state mutation occurs on this path.
    #[error("caller is not the operator of {plant_id}")]
    Unauthorized { plant_id: PlantId },

    /// Duplicate reveal attempt on a terminal record.
    #[error("{plant_id} is already revealed")]
    AlreadyRevealed { plant_id: PlantId },

    /// Unknown, already-consumed, or forged request identifier. These are
    /// deliberately indistinguishable to the caller.
    #[error("unknown or consumed decryption request {request_id}")]
    InvalidRequest { request_id: RequestId },

    /// The oracle's proof did not verify. Never partially applied.
    #[error("fulfillment proof rejected: {0}")]
    ProofVerificationFailed(String),

    /// Cleartext arity/shape mismatch after successful proof verification.
    #[error("malformed cleartext: expected {expected} values, got {got}")]
    MalformedCleartext { expected: usize, got: usize },

    #[error("no record for {plant_id}")]
    NotFound { plant_id: PlantId },

    /// Identifier space exhausted. Unreachable in practice.
    #[error("plant identifier space exhausted")]
    IdSpaceExhausted,

    /// Configurable per-operator bound on outstanding decryption requests.
    #[error("operator {operator} has {pending} pending requests (limit {limit})")]
    PendingLimitReached {
        operator: OperatorId,
        pending: usize,
        limit: usize,
    },

    /// Failure inside the ciphertext algebra, propagated verbatim.
    #[error("ciphertext algebra error: {0}")]
    Algebra(String),

    /// Failure reported by the external decryption oracle.
    #[error("decryption oracle error: {0}")]
    Oracle(String),

    /// Storage-layer failure (poisoned lock, duplicate key, I/O).
    #[error("store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Milliseconds since the Unix epoch, as an `i64`.
pub fn now_ms() -> Result<i64> {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| Error::Store("system clock error".into()))?
        .as_millis();
    i64::try_from(ms).map_err(|_| Error::Store("system clock overflow".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plant_id_zero_is_sentinel() {
        assert_eq!(PlantId::INVALID, PlantId(0));
        assert_eq!(PlantId::default(), PlantId::INVALID);
    }

    #[test]
    fn request_kind_arity_matches_field_lists() {
        assert_eq!(RequestKind::Telemetry.arity(), TELEMETRY_FIELDS);
        assert_eq!(RequestKind::Optimization.arity(), OPTIMIZATION_FIELDS);
    }

    #[test]
    fn telemetry_field_order_is_canonical() {
        let ct = |b: u8| Ciphertext(vec![b]);
        let telemetry = EncryptedTelemetry {
            inflow_rate: ct(1),
            chemical_levels: ct(2),
            turbidity: ct(3),
            bacterial_count: ct(4),
        };
        let order: Vec<u8> = telemetry.fields().iter().map(|c| c.0[0]).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn record_starts_unrevealed() {
        let ct = |b: u8| Ciphertext(vec![b]);
        let record = PlantRecord {
            plant_id: PlantId(1),
            operator: OperatorId([7u8; 32]),
            submitted_at_ms: 0,
            telemetry: EncryptedTelemetry {
                inflow_rate: ct(1),
                chemical_levels: ct(2),
                turbidity: ct(3),
                bacterial_count: ct(4),
            },
            revealed: None,
        };
        assert!(!record.is_revealed());
    }
}
