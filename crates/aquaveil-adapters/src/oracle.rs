//! Local decryption oracle.
//!
//! Plays the external oracle in-process: accepts handle lists, issues
//! sequential request identifiers, and produces signed fulfillments by
//! resolving handles through the shared table and unsealing with the
//! algebra's key. Tests and the CLI feed its fulfillments back into
//! `DecryptionProtocol::fulfill`, closing the asynchronous loop that a
//! real deployment crosses over the network.

use crate::algebra::{HandleTable, SealedWordAlgebra};
use aquaveil_core::crypto::OracleSigningKey;
use aquaveil_core::protocol::DecryptionOracle;
use aquaveil_core::{CtHandle, Error, OracleVerifyingKey, RequestId, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

pub struct LocalOracle {
    algebra: Arc<SealedWordAlgebra>,
    handles: Arc<HandleTable>,
    signing_key: OracleSigningKey,
    next_id: Mutex<u64>,
    issued: RwLock<HashMap<RequestId, Vec<CtHandle>>>,
}

impl LocalOracle {
    pub fn new(algebra: Arc<SealedWordAlgebra>, signing_key: OracleSigningKey) -> Self {
        let handles = algebra.handles();
        Self {
            algebra,
            handles,
            signing_key,
            next_id: Mutex::new(1),
            issued: RwLock::new(HashMap::new()),
        }
    }

    /// The key callers should verify fulfillments against.
    pub fn verifying_key(&self) -> OracleVerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Produce the `(cleartexts, proof)` fulfillment for an issued request.
    ///
    /// This is the simulated external service side: resolve every handle,
    /// unseal in submission order, sign the canonical binding.
    pub fn fulfillment_for(&self, request_id: RequestId) -> Result<(Vec<u64>, Vec<u8>)> {
        let handles = {
            let issued = self
                .issued
                .read()
                .map_err(|_| Error::Oracle("oracle table lock poisoned".into()))?;
            issued
                .get(&request_id)
                .cloned()
                .ok_or(Error::InvalidRequest { request_id })?
        };

        let mut cleartexts = Vec::with_capacity(handles.len());
        for handle in &handles {
            let ct = self
                .handles
                .resolve(*handle)
                .ok_or_else(|| Error::Oracle(format!("unresolvable handle {handle}")))?;
            cleartexts.push(self.algebra.unseal(&ct)?);
        }

        let proof = self
            .signing_key
            .sign_fulfillment(request_id, &cleartexts)
            .to_vec();
        Ok((cleartexts, proof))
    }
}

impl DecryptionOracle for LocalOracle {
    fn submit_request(&self, handles: &[CtHandle]) -> Result<RequestId> {
        for handle in handles {
            if self.handles.resolve(*handle).is_none() {
                return Err(Error::Oracle(format!("unknown handle {handle}")));
            }
        }

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

        debug!(%request_id, count = handles.len(), "decryption request accepted");
        Ok(request_id)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use aquaveil_core::CiphertextAlgebra;

    fn oracle_with_algebra() -> (Arc<SealedWordAlgebra>, LocalOracle) {
        let algebra = Arc::new(SealedWordAlgebra::generate());
        let oracle = LocalOracle::new(algebra.clone(), OracleSigningKey::generate());
        (algebra, oracle)
    }

    #[test]
    fn issues_sequential_ids() {
        let (algebra, oracle) = oracle_with_algebra();
        let h = algebra.handle(&algebra.seal(1));

        assert_eq!(oracle.submit_request(&[h]).unwrap(), RequestId(1));
        assert_eq!(oracle.submit_request(&[h]).unwrap(), RequestId(2));
    }

    #[test]
    fn rejects_unknown_handles() {
        let (_, oracle) = oracle_with_algebra();
        let result = oracle.submit_request(&[CtHandle([0xEE; 32])]);
        assert!(matches!(result, Err(Error::Oracle(_))));
    }

    #[test]
    fn fulfillment_unseals_in_submission_order() {
        let (algebra, oracle) = oracle_with_algebra();
        let handles: Vec<CtHandle> = [20u64, 30, 10, 50]
            .iter()
            .map(|v| algebra.handle(&algebra.seal(*v)))
            .collect();

        let request_id = oracle.submit_request(&handles).unwrap();
        let (cleartexts, proof) = oracle.fulfillment_for(request_id).unwrap();

        assert_eq!(cleartexts, vec![20, 30, 10, 50]);
        assert!(oracle
            .verifying_key()
            .verify_fulfillment(request_id, &cleartexts, &proof)
            .is_ok());
    }

    #[test]
    fn fulfillment_for_unknown_request_fails() {
        let (_, oracle) = oracle_with_algebra();
        let result = oracle.fulfillment_for(RequestId(77));
        assert!(matches!(result, Err(Error::InvalidRequest { .. })));
    }
}
