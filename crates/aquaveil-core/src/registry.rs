//! Plant record store and registration facade.
//!
//! Maintains the mapping from `PlantId` to encrypted and (eventually)
//! revealed state, enforcing two invariants:
//! - identifiers are strictly monotonic and never reused;
//! - a record and its optimization result become visible in one atomic
//!   step, so no reader observes ciphertexts without derived results.

use crate::engine::OptimizationEngine;
use crate::events::{DomainEvent, EventSink};
use crate::{
    now_ms, CiphertextAlgebra, EncryptedTelemetry, Error, OperatorId, OptimizationResult, PlantId,
    PlantRecord, Result, RevealedTelemetry,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Durable keyed store for plant records and their optimization results.
///
/// Implementations must ensure:
/// - `allocate_id` returns strictly increasing, never-reused identifiers;
/// - `insert` stores the record and optimization atomically;
/// - `apply_reveal` performs its read-check-write without another writer
///   interleaving on the same key.
pub trait PlantRecordStore: Send + Sync {
    /// Allocate the next plant identifier.
    ///
    /// Fails only with [`Error::IdSpaceExhausted`]; treated as unreachable
    /// in practice.
    fn allocate_id(&self) -> Result<PlantId>;

    /// Store a record together with its optimization result.
    ///
    /// Rejects duplicate identifiers: records are write-once.
    fn insert(&self, record: PlantRecord, optimization: OptimizationResult) -> Result<()>;

    /// Lookup a record by id. Returns `None` if not found.
    fn record(&self, plant_id: PlantId) -> Option<PlantRecord>;

    /// Lookup a record's optimization result.
    fn optimization(&self, plant_id: PlantId) -> Option<OptimizationResult>;

    /// Write the plaintext mirror exactly once.
    ///
    /// Fails with [`Error::NotFound`] for unknown ids and
    /// [`Error::AlreadyRevealed`] if the mirror is already populated. The
    /// check and the write happen under one guard.
    fn apply_reveal(&self, plant_id: PlantId, revealed: RevealedTelemetry) -> Result<()>;

    /// Number of registered plants.
    fn plant_count(&self) -> u64;
}

struct PlantTables {
    next_id: u64,
    records: HashMap<PlantId, PlantRecord>,
    optimizations: HashMap<PlantId, OptimizationResult>,
}

/// In-memory plant store for development and testing.
///
/// A single `RwLock` over the counter and both tables gives the serialized
/// single-writer discipline the protocol expects.
pub struct InMemoryPlantStore {
    tables: RwLock<PlantTables>,
}

impl InMemoryPlantStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(PlantTables {
                next_id: 1,
                records: HashMap::new(),
                optimizations: HashMap::new(),
            }),
        }
    }
}

impl Default for InMemoryPlantStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlantRecordStore for InMemoryPlantStore {
    fn allocate_id(&self) -> Result<PlantId> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| Error::Store("plant store lock poisoned".into()))?;

        if tables.next_id == u64::MAX {
            return Err(Error::IdSpaceExhausted);
        }
        let id = PlantId(tables.next_id);
        tables.next_id += 1;
        Ok(id)
    }

    fn insert(&self, record: PlantRecord, optimization: OptimizationResult) -> Result<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| Error::Store("plant store lock poisoned".into()))?;

        let plant_id = record.plant_id;
        if tables.records.contains_key(&plant_id) {
            return Err(Error::Store(format!("duplicate record for {plant_id}")));
        }
        tables.records.insert(plant_id, record);
        tables.optimizations.insert(plant_id, optimization);
        Ok(())
    }

    fn record(&self, plant_id: PlantId) -> Option<PlantRecord> {
        let tables = self.tables.read().ok()?;
        tables.records.get(&plant_id).cloned()
    }

    fn optimization(&self, plant_id: PlantId) -> Option<OptimizationResult> {
        let tables = self.tables.read().ok()?;
        tables.optimizations.get(&plant_id).cloned()
    }

    fn apply_reveal(&self, plant_id: PlantId, revealed: RevealedTelemetry) -> Result<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| Error::Store("plant store lock poisoned".into()))?;

        let record = tables
            .records
            .get_mut(&plant_id)
            .ok_or(Error::NotFound { plant_id })?;

        if record.revealed.is_some() {
            return Err(Error::AlreadyRevealed { plant_id });
        }
        record.revealed = Some(revealed);
        Ok(())
    }

    fn plant_count(&self) -> u64 {
        match self.tables.read() {
            Ok(tables) => tables.records.len() as u64,
            Err(_) => 0,
        }
    }
}

/// Registration facade: wires the store, the algebra, the optimization
/// engine and the event sink into the submission pipeline.
pub struct PlantRegistry {
    store: Arc<dyn PlantRecordStore>,
    engine: OptimizationEngine,
    events: Arc<dyn EventSink>,
}

impl PlantRegistry {
    pub fn new(
        store: Arc<dyn PlantRecordStore>,
        algebra: Arc<dyn CiphertextAlgebra>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            engine: OptimizationEngine::new(algebra),
            events,
        }
    }

    /// Allocate the next plant identifier for `operator`.
    ///
    /// No side effects beyond the counter increment.
    pub fn register(&self, operator: OperatorId) -> Result<PlantId> {
        let plant_id = self.store.allocate_id()?;
        debug!(%plant_id, %operator, "allocated plant id");
        Ok(plant_id)
    }

    /// Submit four ciphertext readings and derive their optimization.
    ///
    /// Derivation runs synchronously before anything is stored: submission
    /// and derivation succeed or fail together, and no reader can observe
    /// a record without its optimization result.
    pub fn submit(&self, operator: OperatorId, telemetry: EncryptedTelemetry) -> Result<PlantId> {
        let optimization = self.engine.derive(&telemetry)?;

        let plant_id = self.register(operator)?;
        let submitted_at_ms = now_ms()?;
        let record = PlantRecord {
            plant_id,
            operator,
            submitted_at_ms,
            telemetry,
            revealed: None,
        };
        self.store.insert(record, optimization)?;

        info!(%plant_id, %operator, "telemetry submitted and optimization derived");
        self.events.emit(&DomainEvent::PlantDataSubmitted {
            plant_id,
            operator,
            submitted_at_ms,
        });
        self.events
            .emit(&DomainEvent::OptimizationCalculated { plant_id });
        Ok(plant_id)
    }

    /// Fetch a record, mapping a miss to [`Error::NotFound`].
    pub fn record(&self, plant_id: PlantId) -> Result<PlantRecord> {
        self.store
            .record(plant_id)
            .ok_or(Error::NotFound { plant_id })
    }

    pub fn plant_count(&self) -> u64 {
        self.store.plant_count()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::PlainWordAlgebra;
    use crate::events::InMemoryEventLog;
    use crate::{Ciphertext, CtHandle};

    /// Algebra whose every operation fails; used to test submit atomicity.
    struct BrokenAlgebra;

    impl CiphertextAlgebra for BrokenAlgebra {
        fn add(&self, _: &Ciphertext, _: &Ciphertext) -> Result<Ciphertext> {
            Err(Error::Algebra("broken".into()))
        }
        fn sub(&self, _: &Ciphertext, _: &Ciphertext) -> Result<Ciphertext> {
            Err(Error::Algebra("broken".into()))
        }
        fn mul(&self, _: &Ciphertext, _: &Ciphertext) -> Result<Ciphertext> {
            Err(Error::Algebra("broken".into()))
        }
        fn div(&self, _: &Ciphertext, _: &Ciphertext) -> Result<Ciphertext> {
            Err(Error::Algebra("broken".into()))
        }
        fn encode_constant(&self, _: u64) -> Result<Ciphertext> {
            Err(Error::Algebra("broken".into()))
        }
        fn handle(&self, ct: &Ciphertext) -> CtHandle {
            CtHandle(crate::hash::sha256(&ct.0))
        }
    }

    fn sample_telemetry() -> EncryptedTelemetry {
        let seal = |v: u64| Ciphertext(v.to_le_bytes().to_vec());
        EncryptedTelemetry {
            inflow_rate: seal(20),
            chemical_levels: seal(30),
            turbidity: seal(10),
            bacterial_count: seal(50),
        }
    }

    fn registry_with(algebra: Arc<dyn CiphertextAlgebra>) -> (PlantRegistry, Arc<InMemoryPlantStore>) {
        let store = Arc::new(InMemoryPlantStore::new());
        let registry = PlantRegistry::new(
            store.clone(),
            algebra,
            Arc::new(InMemoryEventLog::new()),
        );
        (registry, store)
    }

    #[test]
    fn ids_are_strictly_increasing_and_nonzero() {
        let store = InMemoryPlantStore::new();
        let mut last = 0u64;
        for _ in 0..100 {
            let PlantId(id) = store.allocate_id().unwrap();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn register_and_submit_interleave_without_reuse() {
        let (registry, _) = registry_with(Arc::new(PlainWordAlgebra));
        let operator = OperatorId([1u8; 32]);

        let a = registry.register(operator).unwrap();
        let b = registry.submit(operator, sample_telemetry()).unwrap();
        let c = registry.register(operator).unwrap();

        assert!(a < b && b < c);
    }

    #[test]
    fn submit_stores_record_and_optimization_together() {
        let (registry, store) = registry_with(Arc::new(PlainWordAlgebra));
        let operator = OperatorId([1u8; 32]);

        let plant_id = registry.submit(operator, sample_telemetry()).unwrap();

        let record = store.record(plant_id).expect("record should exist");
        assert_eq!(record.operator, operator);
        assert!(!record.is_revealed());
        assert!(store.optimization(plant_id).is_some());
        assert_eq!(registry.plant_count(), 1);
    }

    #[test]
    fn failed_derivation_stores_nothing() {
        let (registry, store) = registry_with(Arc::new(BrokenAlgebra));
        let operator = OperatorId([1u8; 32]);

        let result = registry.submit(operator, sample_telemetry());
        assert!(matches!(result, Err(Error::Algebra(_))));
        assert_eq!(store.plant_count(), 0);
        assert!(store.record(PlantId(1)).is_none());
        assert!(store.optimization(PlantId(1)).is_none());
    }

    #[test]
    fn duplicate_insert_rejected() {
        let store = InMemoryPlantStore::new();
        let plant_id = store.allocate_id().unwrap();
        let seal = |v: u64| Ciphertext(v.to_le_bytes().to_vec());
        let record = PlantRecord {
            plant_id,
            operator: OperatorId([2u8; 32]),
            submitted_at_ms: 0,
            telemetry: sample_telemetry(),
            revealed: None,
        };
        let optimization = OptimizationResult {
            chemical_dosage: seal(0),
            flow_adjustment: seal(0),
            efficiency_score: seal(0),
        };

        store.insert(record.clone(), optimization.clone()).unwrap();
        let result = store.insert(record, optimization);
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[test]
    fn reveal_is_one_time() {
        let (registry, store) = registry_with(Arc::new(PlainWordAlgebra));
        let plant_id = registry
            .submit(OperatorId([1u8; 32]), sample_telemetry())
            .unwrap();

        let revealed = RevealedTelemetry {
            inflow_rate: 20,
            chemical_levels: 30,
            turbidity: 10,
            bacterial_count: 50,
        };
        store.apply_reveal(plant_id, revealed).unwrap();
        assert!(store.record(plant_id).unwrap().is_revealed());

        let second = store.apply_reveal(plant_id, revealed);
        assert!(matches!(second, Err(Error::AlreadyRevealed { .. })));
    }

    #[test]
    fn reveal_unknown_plant_fails() {
        let store = InMemoryPlantStore::new();
        let revealed = RevealedTelemetry {
            inflow_rate: 0,
            chemical_levels: 0,
            turbidity: 0,
            bacterial_count: 0,
        };
        let result = store.apply_reveal(PlantId(42), revealed);
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn submit_emits_submission_and_optimization_events() {
        let store = Arc::new(InMemoryPlantStore::new());
        let events = Arc::new(InMemoryEventLog::new());
        let registry = PlantRegistry::new(store, Arc::new(PlainWordAlgebra), events.clone());

        let plant_id = registry
            .submit(OperatorId([3u8; 32]), sample_telemetry())
            .unwrap();

        let log = events.snapshot();
        assert_eq!(log.len(), 2);
        assert!(matches!(
            log[0],
            DomainEvent::PlantDataSubmitted { plant_id: p, .. } if p == plant_id
        ));
        assert!(matches!(
            log[1],
            DomainEvent::OptimizationCalculated { plant_id: p } if p == plant_id
        ));
    }
}
