//! Operator authorization guard.
//!
//! Every mutating operation on a record runs this predicate first: one
//! static owner per record for the lifetime of the record. No roles, no
//! delegation, no multi-operator support.

use crate::{Error, OperatorId, PlantRecord, Result};

/// Fail with [`Error::Unauthorized`] unless `caller` is the record's
/// registered operator. Performs no mutation on either path.
pub fn require_operator(record: &PlantRecord, caller: OperatorId) -> Result<()> {
    if record.operator != caller {
        return Err(Error::Unauthorized {
            plant_id: record.plant_id,
        });
    }
    Ok(())
}
