//! Decryption-oracle protocol.
//!
//! Manages outstanding decryption requests, maps oracle-issued identifiers
//! back to domain records, verifies the oracle's proof and applies the
//! one-time reveal. The pending-request table is the consume-once token:
//! under concurrent duplicate callbacks only the first verified caller
//! succeeds and every other observes `InvalidRequest`.
//!
//! State machine per plant × request kind:
//!
//! ```text
//! Idle --request_decryption--> Pending --verified fulfill--> Revealed
//! ```
//!
//! `Revealed` is terminal for telemetry; optimization reveals are one-shot
//! reveal-and-forget. Pending requests never expire and cannot be
//! cancelled; the per-operator bound in `LimitsConfig` is the only guard
//! against abandoned-request buildup.

use crate::auth::require_operator;
use crate::config::LimitsConfig;
use crate::events::{DomainEvent, EventSink};
use crate::registry::PlantRecordStore;
use crate::{
    now_ms, CiphertextAlgebra, CtHandle, Error, FulfillmentVerifier, OperatorId, PlantId,
    RequestId, RequestKind, Result, RevealedOptimization, RevealedTelemetry, VerificationStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Outbound interface to the external decryption oracle.
///
/// `submit_request` forwards an ordered handle list and returns the
/// oracle-issued request identifier. It must not block on fulfillment:
/// completion arrives later through [`DecryptionProtocol::fulfill`].
pub trait DecryptionOracle: Send + Sync {
    fn submit_request(&self, handles: &[CtHandle]) -> Result<RequestId>;
}

/// One outstanding decryption request, keyed by its oracle-issued id.
///
/// Consumed exactly once; a second callback for the same identifier fails
/// instead of double-applying.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDecryptionRequest {
    pub request_id: RequestId,
    pub plant_id: PlantId,
    pub kind: RequestKind,
    pub operator: OperatorId,
    /// Handles in the exact order submitted to the oracle; fulfillment
    /// cleartexts must match this order and arity.
    pub handles: Vec<CtHandle>,
    pub issued_at_ms: i64,
}

/// Consume-once table of outstanding requests.
pub trait PendingRequestStore: Send + Sync {
    /// Register a fresh request. Rejects duplicate identifiers.
    fn insert(&self, request: PendingDecryptionRequest) -> Result<()>;

    /// Non-consuming lookup.
    fn get(&self, request_id: RequestId) -> Option<PendingDecryptionRequest>;

    /// Atomically remove and return the request. The first caller wins;
    /// everyone else sees `None`.
    fn take(&self, request_id: RequestId) -> Option<PendingDecryptionRequest>;

    /// Outstanding requests held by `operator`.
    fn pending_for(&self, operator: OperatorId) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory pending-request table.
pub struct InMemoryPendingStore {
    requests: RwLock<HashMap<RequestId, PendingDecryptionRequest>>,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPendingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequestStore for InMemoryPendingStore {
    fn insert(&self, request: PendingDecryptionRequest) -> Result<()> {
        let mut requests = self
            .requests
            .write()
            .map_err(|_| Error::Store("pending store lock poisoned".into()))?;

        if requests.contains_key(&request.request_id) {
            return Err(Error::Store(format!(
                "duplicate pending request {}",
                request.request_id
            )));
        }
        requests.insert(request.request_id, request);
        Ok(())
    }

    fn get(&self, request_id: RequestId) -> Option<PendingDecryptionRequest> {
        let requests = self.requests.read().ok()?;
        requests.get(&request_id).cloned()
    }

    fn take(&self, request_id: RequestId) -> Option<PendingDecryptionRequest> {
        let mut requests = self.requests.write().ok()?;
        requests.remove(&request_id)
    }

    fn pending_for(&self, operator: OperatorId) -> usize {
        match self.requests.read() {
            Ok(requests) => requests.values().filter(|r| r.operator == operator).count(),
            Err(_) => 0,
        }
    }

    fn len(&self) -> usize {
        match self.requests.read() {
            Ok(requests) => requests.len(),
            Err(_) => 0,
        }
    }
}

/// What a verified fulfillment produced.
///
/// Telemetry reveals are persisted into the record's plaintext mirror;
/// optimization reveals are surfaced here and nowhere else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    Telemetry {
        plant_id: PlantId,
        revealed: RevealedTelemetry,
    },
    Optimization {
        plant_id: PlantId,
        revealed: RevealedOptimization,
    },
}

/// Two-phase decryption protocol: issue a request, later apply its
/// verified fulfillment exactly once.
pub struct DecryptionProtocol {
    records: Arc<dyn PlantRecordStore>,
    pending: Arc<dyn PendingRequestStore>,
    oracle: Arc<dyn DecryptionOracle>,
    verifier: Arc<dyn FulfillmentVerifier>,
    algebra: Arc<dyn CiphertextAlgebra>,
    events: Arc<dyn EventSink>,
    limits: LimitsConfig,
}

impl DecryptionProtocol {
    pub fn new(
        records: Arc<dyn PlantRecordStore>,
        pending: Arc<dyn PendingRequestStore>,
        oracle: Arc<dyn DecryptionOracle>,
        verifier: Arc<dyn FulfillmentVerifier>,
        algebra: Arc<dyn CiphertextAlgebra>,
        events: Arc<dyn EventSink>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            records,
            pending,
            oracle,
            verifier,
            algebra,
            events,
            limits,
        }
    }

    /// Ask the oracle to decrypt a record's telemetry or optimization
    /// ciphertexts.
    ///
    /// Preconditions, checked in order with no mutation on failure:
    /// - the record exists;
    /// - the caller is the record's operator;
    /// - for telemetry, the record is not yet revealed;
    /// - the caller is under the configured pending bound.
    ///
    /// On success the ordered handle list is forwarded to the oracle and
    /// the request is registered under the oracle-issued identifier. The
    /// call returns before fulfillment: completion is asynchronous.
    pub fn request_decryption(
        &self,
        caller: OperatorId,
        plant_id: PlantId,
        kind: RequestKind,
    ) -> Result<RequestId> {
        let record = self
            .records
            .record(plant_id)
            .ok_or(Error::NotFound { plant_id })?;

        require_operator(&record, caller)?;

        if kind == RequestKind::Telemetry && record.is_revealed() {
            return Err(Error::AlreadyRevealed { plant_id });
        }

        if self.limits.max_pending_per_operator > 0 {
            let pending = self.pending.pending_for(caller);
            if pending >= self.limits.max_pending_per_operator {
                return Err(Error::PendingLimitReached {
                    operator: caller,
                    pending,
                    limit: self.limits.max_pending_per_operator,
                });
            }
        }

        let handles = self.collect_handles(&record.telemetry, plant_id, kind)?;
        let request_id = self.oracle.submit_request(&handles)?;

        self.pending.insert(PendingDecryptionRequest {
            request_id,
            plant_id,
            kind,
            operator: caller,
            handles,
            issued_at_ms: now_ms()?,
        })?;

        info!(%request_id, %plant_id, %kind, "decryption requested");
        self.events.emit(&DomainEvent::DecryptionRequested {
            request_id,
            plant_id,
            kind,
        });
        Ok(request_id)
    }

    /// Apply an oracle fulfillment.
    ///
    /// Order of checks:
    /// 1. lookup — unknown, consumed and forged identifiers are
    ///    indistinguishable (`InvalidRequest`);
    /// 2. proof verification — failure leaves the pending entry untouched
    ///    so a legitimate retry stays possible;
    /// 3. arity decode — a verified-but-malformed response consumes the
    ///    entry, so a compromised oracle cannot replay its signature with
    ///    crafted shapes;
    /// 4. consume-once `take` — the serialization point for duplicate
    ///    callbacks;
    /// 5. apply the reveal and emit `PlantDataDecrypted`.
    pub fn fulfill(
        &self,
        request_id: RequestId,
        cleartexts: &[u64],
        proof: &[u8],
    ) -> Result<FulfillmentOutcome> {
        let entry = self
            .pending
            .get(request_id)
            .ok_or(Error::InvalidRequest { request_id })?;

        if let VerificationStatus::Failure(reason) =
            self.verifier.verify(request_id, cleartexts, proof)
        {
            warn!(%request_id, %reason, "fulfillment proof rejected");
            return Err(Error::ProofVerificationFailed(reason));
        }

        let expected = entry.kind.arity();
        if cleartexts.len() != expected {
            let _ = self.pending.take(request_id);
            warn!(%request_id, expected, got = cleartexts.len(), "malformed fulfillment consumed");
            return Err(Error::MalformedCleartext {
                expected,
                got: cleartexts.len(),
            });
        }

        let entry = self
            .pending
            .take(request_id)
            .ok_or(Error::InvalidRequest { request_id })?;

        let outcome = match entry.kind {
            RequestKind::Telemetry => {
                let revealed = RevealedTelemetry {
                    inflow_rate: cleartexts[0],
                    chemical_levels: cleartexts[1],
                    turbidity: cleartexts[2],
                    bacterial_count: cleartexts[3],
                };
                self.records.apply_reveal(entry.plant_id, revealed)?;
                FulfillmentOutcome::Telemetry {
                    plant_id: entry.plant_id,
                    revealed,
                }
            }
            RequestKind::Optimization => FulfillmentOutcome::Optimization {
                plant_id: entry.plant_id,
                revealed: RevealedOptimization {
                    chemical_dosage: cleartexts[0],
                    flow_adjustment: cleartexts[1],
                    efficiency_score: cleartexts[2],
                },
            },
        };

        info!(%request_id, plant_id = %entry.plant_id, kind = %entry.kind, "decryption fulfilled");
        self.events.emit(&DomainEvent::PlantDataDecrypted {
            plant_id: entry.plant_id,
        });
        Ok(outcome)
    }

    /// Outstanding requests across all operators.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn collect_handles(
        &self,
        telemetry: &crate::EncryptedTelemetry,
        plant_id: PlantId,
        kind: RequestKind,
    ) -> Result<Vec<CtHandle>> {
        let handles = match kind {
            RequestKind::Telemetry => telemetry
                .fields()
                .iter()
                .map(|ct| self.algebra.handle(ct))
                .collect(),
            RequestKind::Optimization => {
                let optimization = self.records.optimization(plant_id).ok_or_else(|| {
                    Error::Store(format!("{plant_id} has a record but no optimization result"))
                })?;
                optimization
                    .fields()
                    .iter()
                    .map(|ct| self.algebra.handle(ct))
                    .collect()
            }
        };
        Ok(handles)
    }
}

// =============================================================================
// Tests
// =============================================================================
