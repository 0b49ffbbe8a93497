//! Key derivation.
//!
//! Normalizes caller-supplied key material of any length into the fixed-size
//! key that protects the persisted generator state.

pub mod derive;

pub use derive::{derive_key, DerivedKey, KEY_SIZE};
