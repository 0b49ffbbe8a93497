//! Fixed-size key derivation from arbitrary-length key material.
//!
//! Short material (fewer than [`KEY_SIZE`] bytes) is hashed with BLAKE3 so the
//! key is always full width. Material of [`KEY_SIZE`] bytes or more is taken
//! verbatim and truncated to [`KEY_SIZE`]; bytes past that point do not
//! contribute to the key.

use core::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a derived key; equal to the BLAKE3 digest size.
pub const KEY_SIZE: usize = 32;

/// Key used to encrypt and decrypt the generator state file.
///
/// Wiped from memory when dropped. `Debug` never prints the key bytes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    /// Borrows the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Derives a [`DerivedKey`] from caller key material.
///
/// Pure function of `material`; the material itself is not retained.
pub fn derive_key(material: &[u8]) -> DerivedKey {
    let mut key = [0u8; KEY_SIZE];
    if material.len() < KEY_SIZE {
        key.copy_from_slice(blake3::hash(material).as_bytes());
    } else {
        key.copy_from_slice(&material[..KEY_SIZE]);
    }
    DerivedKey(key)
}
