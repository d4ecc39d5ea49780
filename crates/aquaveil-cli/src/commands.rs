//! CLI command implementations.

use anyhow::{anyhow, Context, Result};
use aquaveil_adapters::{LocalOracle, SealedWordAlgebra};
use aquaveil_core::config::LimitsConfig;
use aquaveil_core::crypto::Ed25519FulfillmentVerifier;
use aquaveil_core::events::InMemoryEventLog;
use aquaveil_core::hash::sha256;
use aquaveil_core::protocol::InMemoryPendingStore;
use aquaveil_core::registry::InMemoryPlantStore;
use aquaveil_core::{
    DecryptionProtocol, EncryptedTelemetry, FulfillmentOutcome, OperatorId, OracleSigningKey,
    PlantRegistry, RequestKind,
};
use rand::RngCore;
use std::sync::Arc;

/// Run the full pipeline against an in-process oracle.
pub fn demo(
    inflow: u64,
    chemicals: u64,
    turbidity: u64,
    bacteria: u64,
    operator_name: &str,
    format: &str,
) -> Result<()> {
    let operator = OperatorId(sha256(operator_name.as_bytes()));

    let algebra = Arc::new(SealedWordAlgebra::generate());
    let oracle_key = OracleSigningKey::generate();
    let oracle = Arc::new(LocalOracle::new(algebra.clone(), oracle_key.clone()));
    let verifier = Arc::new(Ed25519FulfillmentVerifier::new(oracle_key.verifying_key()));

    let records = Arc::new(InMemoryPlantStore::new());
    let events = Arc::new(InMemoryEventLog::new());
    let registry = PlantRegistry::new(records.clone(), algebra.clone(), events.clone());
    let protocol = DecryptionProtocol::new(
        records,
        Arc::new(InMemoryPendingStore::new()),
        oracle.clone(),
        verifier,
        algebra.clone(),
        events.clone(),
        LimitsConfig::default(),
    );

    let telemetry = EncryptedTelemetry {
        inflow_rate: algebra.seal(inflow),
        chemical_levels: algebra.seal(chemicals),
        turbidity: algebra.seal(turbidity),
        bacterial_count: algebra.seal(bacteria),
    };
    let plant_id = registry
        .submit(operator, telemetry)
        .context("telemetry submission failed")?;

    let opt_request = protocol
        .request_decryption(operator, plant_id, RequestKind::Optimization)
        .context("optimization decryption request failed")?;
    let (cleartexts, proof) = oracle.fulfillment_for(opt_request)?;
    let optimization = match protocol.fulfill(opt_request, &cleartexts, &proof)? {
        FulfillmentOutcome::Optimization { revealed, .. } => revealed,
        other => return Err(anyhow!("unexpected fulfillment outcome: {other:?}")),
    };

    let tel_request = protocol
        .request_decryption(operator, plant_id, RequestKind::Telemetry)
        .context("telemetry decryption request failed")?;
    let (cleartexts, proof) = oracle.fulfillment_for(tel_request)?;
    let revealed = match protocol.fulfill(tel_request, &cleartexts, &proof)? {
        FulfillmentOutcome::Telemetry { revealed, .. } => revealed,
        other => return Err(anyhow!("unexpected fulfillment outcome: {other:?}")),
    };

    match format {
        "json" => {
            let out = serde_json::json!({
                "plant_id": plant_id.0,
                "operator": hex::encode(operator.0),
                "telemetry": {
                    "inflow_rate": revealed.inflow_rate,
                    "chemical_levels": revealed.chemical_levels,
                    "turbidity": revealed.turbidity,
                    "bacterial_count": revealed.bacterial_count,
                },
                "optimization": {
                    "chemical_dosage": optimization.chemical_dosage,
                    "flow_adjustment": optimization.flow_adjustment,
                    "efficiency_score": optimization.efficiency_score,
                },
                "events": events.len(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        "human" => {
            println!("{plant_id} registered by {operator} ({operator_name})");
            println!(
                "telemetry revealed: inflow={} chemicals={} turbidity={} bacteria={}",
                revealed.inflow_rate,
                revealed.chemical_levels,
                revealed.turbidity,
                revealed.bacterial_count
            );
            println!(
                "optimization revealed: dosage={} flow={} score={}",
                optimization.chemical_dosage,
                optimization.flow_adjustment,
                optimization.efficiency_score
            );
            println!("{} events emitted", events.len());
        }
        other => return Err(anyhow!("unknown output format: {other}")),
    }

    Ok(())
}

/// Generate a fresh oracle keypair and print it as hex.
pub fn keygen() -> Result<()> {
    let mut seed = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut seed);
    let key = OracleSigningKey::from_seed(&seed);

    println!("seed:          {}", hex::encode(seed));
    println!(
        "verifying key: {}",
        hex::encode(key.verifying_key().to_bytes())
    );
    Ok(())
}
