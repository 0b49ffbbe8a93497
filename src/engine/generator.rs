#![forbid(unsafe_code)]

use zeroize::{Zeroize, Zeroizing};

// Generator produces output from a 32-byte key using BLAKE3 in keyed XOF mode.
// Every block binds the counter; after each block the key is ratcheted forward
// so captured state cannot reproduce earlier output.
// Serialized state is `key || counter` (40 bytes).

pub const STATE_LEN: usize = 40;

const BLOCK_DOMAIN: &[u8] = b"seedkeep/block";
const RATCHET_DOMAIN: &[u8] = b"seedkeep/ratchet";
const RESEED_DOMAIN: &[u8] = b"seedkeep/reseed";

#[derive(Debug, PartialEq, Eq)]
pub enum GeneratorError {
    BadStateLength(usize),
}

pub struct Generator {
    key: Zeroizing<[u8; 32]>,
    ctr: u64,
}

impl Generator {
    // Seed a fresh generator; counter starts at 0.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Generator { key: Zeroizing::new(*seed), ctr: 0 }
    }

    // Restore from `to_bytes` output.
    pub fn from_bytes(state: &[u8]) -> Result<Self, GeneratorError> {
        if state.len() != STATE_LEN {
            return Err(GeneratorError::BadStateLength(state.len()));
        }
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&state[..32]);
        let mut ctr = [0u8; 8];
        ctr.copy_from_slice(&state[32..]);
        Ok(Generator { key, ctr: u64::from_le_bytes(ctr) })
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; STATE_LEN]> {
        let mut out = Zeroizing::new([0u8; STATE_LEN]);
        out[..32].copy_from_slice(&self.key[..]);
        out[32..].copy_from_slice(&self.ctr.to_le_bytes());
        out
    }

    // Blocks produced so far.
    #[cfg(test)]
    fn counter(&self) -> u64 {
        self.ctr
    }

    // Mix extra input into the key without resetting the counter.
    pub fn reseed(&mut self, input: &[u8]) {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(RESEED_DOMAIN);
        hasher.update(input);
        self.key.copy_from_slice(hasher.finalize().as_bytes());
    }

    pub fn fill(&mut self, out: &mut [u8]) {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(BLOCK_DOMAIN);
        hasher.update(&self.ctr.to_le_bytes());
        hasher.update(&(out.len() as u64).to_le_bytes());
        hasher.finalize_xof().fill(out);
        self.ratchet();
    }

    fn ratchet(&mut self) {
        self.ctr = self.ctr.wrapping_add(1);
        let mut next = blake3::Hasher::new_keyed(&self.key)
            .update(RATCHET_DOMAIN)
            .update(&self.ctr.to_le_bytes())
            .finalize()
            .as_bytes()
            .to_owned();
        self.key.copy_from_slice(&next);
        next.zeroize();
    }
}
