//! Optimization derivation over encrypted telemetry.
//!
//! Pure composition of algebra calls, executed once at submission time.
//! The engine's contract is purely about *which* operations compose in
//! *which* order; operand order is preserved exactly, since the algebra
//! trait does not promise commutativity or associativity. Division and
//! saturation semantics belong to the algebra, not to this module.

use crate::{CiphertextAlgebra, EncryptedTelemetry, OptimizationResult, Result};
use std::sync::Arc;

/// Derives the three optimization ciphertexts from a record's four
/// telemetry ciphertexts:
///
/// - `chemical_dosage   = (chemical_levels * 2) + (bacterial_count / 10)`
/// - `flow_adjustment   = 100 - (inflow_rate / 5)`
/// - `efficiency_score  = ((100 - turbidity) + chemical_levels) / 2`
///
/// All constants are plaintext-encoded into the ciphertext domain before
/// use. The only failure path is the algebra itself, propagated.
pub struct OptimizationEngine {
    algebra: Arc<dyn CiphertextAlgebra>,
}

impl OptimizationEngine {
    pub fn new(algebra: Arc<dyn CiphertextAlgebra>) -> Self {
        Self { algebra }
    }

    pub fn derive(&self, telemetry: &EncryptedTelemetry) -> Result<OptimizationResult> {
        let a = self.algebra.as_ref();

        let two = a.encode_constant(2)?;
        let five = a.encode_constant(5)?;
        let ten = a.encode_constant(10)?;
        let hundred = a.encode_constant(100)?;

        let dosage_base = a.mul(&telemetry.chemical_levels, &two)?;
        let dosage_adjust = a.div(&telemetry.bacterial_count, &ten)?;
        let chemical_dosage = a.add(&dosage_base, &dosage_adjust)?;

        let inflow_fraction = a.div(&telemetry.inflow_rate, &five)?;
        let flow_adjustment = a.sub(&hundred, &inflow_fraction)?;

        let clarity = a.sub(&hundred, &telemetry.turbidity)?;
        let score_sum = a.add(&clarity, &telemetry.chemical_levels)?;
        let efficiency_score = a.div(&score_sum, &two)?;

        Ok(OptimizationResult {
            chemical_dosage,
            flow_adjustment,
            efficiency_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ciphertext, CtHandle, Error};

    /// Plain little-endian words standing in for ciphertexts, with the
    /// operation log recorded so ordering can be asserted.
    struct TracingAlgebra {
        ops: std::sync::Mutex<Vec<String>>,
    }

    impl TracingAlgebra {
        fn new() -> Self {
            Self {
                ops: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn word(ct: &Ciphertext) -> u64 {
            let bytes: [u8; 8] = ct.0.as_slice().try_into().expect("8-byte test ciphertext");
            u64::from_le_bytes(bytes)
        }

        fn seal(value: u64) -> Ciphertext {
            Ciphertext(value.to_le_bytes().to_vec())
        }

        fn log(&self, op: &str, a: &Ciphertext, b: &Ciphertext) {
            self.ops.lock().unwrap().push(format!(
                "{op}({},{})",
                Self::word(a),
                Self::word(b)
            ));
        }
    }

    impl CiphertextAlgebra for TracingAlgebra {
        fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
            self.log("add", a, b);
            Ok(Self::seal(Self::word(a).saturating_add(Self::word(b))))
        }

        fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
            self.log("sub", a, b);
            Ok(Self::seal(Self::word(a).saturating_sub(Self::word(b))))
        }

        fn mul(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
            self.log("mul", a, b);
            Ok(Self::seal(Self::word(a).saturating_mul(Self::word(b))))
        }

        fn div(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
            self.log("div", a, b);
            let divisor = Self::word(b);
            if divisor == 0 {
                return Err(Error::Algebra("division by zero".into()));
            }
            Ok(Self::seal(Self::word(a) / divisor))
        }

        fn encode_constant(&self, value: u64) -> Result<Ciphertext> {
            Ok(Self::seal(value))
        }

        fn handle(&self, ct: &Ciphertext) -> CtHandle {
            CtHandle(crate::hash::sha256(&ct.0))
        }
    }

    fn telemetry(inflow: u64, chemicals: u64, turbidity: u64, bacteria: u64) -> EncryptedTelemetry {
        EncryptedTelemetry {
            inflow_rate: TracingAlgebra::seal(inflow),
            chemical_levels: TracingAlgebra::seal(chemicals),
            turbidity: TracingAlgebra::seal(turbidity),
            bacterial_count: TracingAlgebra::seal(bacteria),
        }
    }

    #[test]
    fn derives_reference_values() {
        let engine = OptimizationEngine::new(Arc::new(TracingAlgebra::new()));
        let result = engine.derive(&telemetry(20, 30, 10, 50)).unwrap();

        // 30*2 + 50/10, 100 - 20/5, ((100-10)+30)/2
        assert_eq!(TracingAlgebra::word(&result.chemical_dosage), 65);
        assert_eq!(TracingAlgebra::word(&result.flow_adjustment), 96);
        assert_eq!(TracingAlgebra::word(&result.efficiency_score), 60);
    }

    #[test]
    fn operand_order_is_fixed() {
        let algebra = Arc::new(TracingAlgebra::new());
        let engine = OptimizationEngine::new(algebra.clone());
        engine.derive(&telemetry(20, 30, 10, 50)).unwrap();

        let ops = algebra.ops.lock().unwrap().clone();
        assert_eq!(
            ops,
            vec![
                "mul(30,2)",
                "div(50,10)",
                "add(60,5)",
                "div(20,5)",
                "sub(100,4)",
                "sub(100,10)",
                "add(90,30)",
                "div(120,2)",
            ]
        );
    }

    #[test]
    fn flow_adjustment_saturates_on_large_inflow() {
        // 100 - 5000/5 clamps at zero under this algebra's sub semantics.
        let engine = OptimizationEngine::new(Arc::new(TracingAlgebra::new()));
        let result = engine.derive(&telemetry(5000, 1, 1, 1)).unwrap();
        assert_eq!(TracingAlgebra::word(&result.flow_adjustment), 0);
    }

    #[test]
    fn algebra_failure_propagates() {
        struct ZeroDivAlgebra(TracingAlgebra);

        impl CiphertextAlgebra for ZeroDivAlgebra {
            fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
                self.0.add(a, b)
            }
            fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
                self.0.sub(a, b)
            }
            fn mul(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
                self.0.mul(a, b)
            }
            fn div(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
                self.0.div(a, b)
            }
            fn encode_constant(&self, value: u64) -> Result<Ciphertext> {
                // Encode every constant as zero to force a zero divisor.
                let _ = value;
                self.0.encode_constant(0)
            }
            fn handle(&self, ct: &Ciphertext) -> CtHandle {
                self.0.handle(ct)
            }
        }

        let engine = OptimizationEngine::new(Arc::new(ZeroDivAlgebra(TracingAlgebra::new())));
        let result = engine.derive(&telemetry(20, 30, 10, 50));
        assert!(matches!(result, Err(Error::Algebra(_))));
    }
}
