//! Aquaveil reference adapters.
//!
//! Development-grade implementations of the external capabilities the core
//! consumes:
//!
//! - [`SealedWordAlgebra`]: a ciphertext algebra sealing one `u64` word per
//!   ciphertext under a keyed mask. Not semantically secure homomorphic
//!   encryption; it exists so the full pipeline can run end-to-end without
//!   an FHE backend.
//! - [`LocalOracle`]: an in-process decryption oracle that resolves
//!   handles, unseals words and signs fulfillments with ed25519.
//!
//! Both sit behind the core traits and are swappable for real backends.

pub mod algebra;
pub mod oracle;

pub use algebra::{HandleTable, SealedWordAlgebra};
pub use oracle::LocalOracle;
