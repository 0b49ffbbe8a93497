//! Encrypted generator state file.
//!
//! Layout (all integers little endian):
//!
//! ```text
//! "SKST" | version u8 | log_n u8 | r u32 | p u32 | salt[32] | nonce[12] | ciphertext+tag
//! ```
//!
//! The file key is `scrypt(DerivedKey, salt)` and the header up to the salt is
//! authenticated as associated data, so cost parameters cannot be swapped.

use std::path::{Path, PathBuf};

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use super::raw_files::{read_file, write_atomic};
use super::StorageError;
use crate::config::KdfConfig;
use crate::keys::DerivedKey;

const MAGIC: &[u8; 4] = b"SKST";
const VERSION: u8 = 1;
const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = MAGIC.len() + 1 + 1 + 4 + 4 + SALT_LEN;

/// Maps a file identifier to the state file path.
///
/// Identifiers ending in a path separator, or naming an existing directory,
/// get `state_file_name` appended. Anything else is the file itself.
pub fn resolve_path(file_id: &str, state_file_name: &str) -> PathBuf {
    let path = Path::new(file_id);
    let dir_like = file_id.ends_with('/') || file_id.ends_with(std::path::MAIN_SEPARATOR) || path.is_dir();
    if dir_like {
        path.join(state_file_name)
    } else {
        path.to_path_buf()
    }
}

/// Stretched file key together with the salt and cost it was derived with.
///
/// Kept by the engine for as long as a state file is bound so that repeated
/// saves skip the scrypt step.
pub struct SealingKey {
    kdf: KdfConfig,
    salt: [u8; SALT_LEN],
    key: Zeroizing<[u8; 32]>,
}

impl SealingKey {
    /// Derives a file key under a fresh random salt.
    pub fn derive(secret: &DerivedKey, kdf: KdfConfig) -> Result<Self, StorageError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.try_fill_bytes(&mut salt).map_err(|_| StorageError::CryptoError)?;
        Self::derive_with_salt(secret, kdf, salt)
    }

    fn derive_with_salt(secret: &DerivedKey, kdf: KdfConfig, salt: [u8; SALT_LEN]) -> Result<Self, StorageError> {
        let params = kdf.params().map_err(|_| StorageError::CryptoError)?;
        let mut key = Zeroizing::new([0u8; 32]);
        scrypt::scrypt(secret.as_bytes(), &salt, &params, &mut key[..]).map_err(|_| StorageError::CryptoError)?;
        Ok(Self { kdf, salt, key })
    }

    #[cfg(test)]
    fn kdf(&self) -> KdfConfig {
        self.kdf
    }

    fn header(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(MAGIC);
        header[4] = VERSION;
        header[5] = self.kdf.log_n;
        header[6..10].copy_from_slice(&self.kdf.r.to_le_bytes());
        header[10..14].copy_from_slice(&self.kdf.p.to_le_bytes());
        header[14..].copy_from_slice(&self.salt);
        header
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.key[..]))
    }
}

fn parse_header(bytes: &[u8]) -> Result<(KdfConfig, [u8; SALT_LEN]), StorageError> {
    if bytes.len() < HEADER_LEN + NONCE_LEN + TAG_LEN || &bytes[..4] != MAGIC || bytes[4] != VERSION {
        return Err(StorageError::Corruption);
    }

    let mut r = [0u8; 4];
    r.copy_from_slice(&bytes[6..10]);
    let mut p = [0u8; 4];
    p.copy_from_slice(&bytes[10..14]);
    let kdf = KdfConfig { log_n: bytes[5], r: u32::from_le_bytes(r), p: u32::from_le_bytes(p) };
    // Cost bounds are enforced here, before scrypt allocates anything.
    if kdf.validate().is_err() {
        return Err(StorageError::Corruption);
    }

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&bytes[14..HEADER_LEN]);
    Ok((kdf, salt))
}

/// Encrypts `plaintext` into a complete state file image.
pub fn seal(plaintext: &[u8], key: &SealingKey) -> Result<Vec<u8>, StorageError> {
    let header = key.header();
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.try_fill_bytes(&mut nonce).map_err(|_| StorageError::CryptoError)?;

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad: &header })
        .map_err(|_| StorageError::CryptoError)?;

    let mut out = Vec::with_capacity(HEADER_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts a state file image.
///
/// Returns the plaintext and the sealing key re-derived from the file header,
/// ready to seal the next save of the same file.
pub fn open(bytes: &[u8], secret: &DerivedKey) -> Result<(Zeroizing<Vec<u8>>, SealingKey), StorageError> {
    let (kdf, salt) = parse_header(bytes)?;
    let key = SealingKey::derive_with_salt(secret, kdf, salt)?;

    let header = &bytes[..HEADER_LEN];
    let nonce = &bytes[HEADER_LEN..HEADER_LEN + NONCE_LEN];
    let ciphertext = &bytes[HEADER_LEN + NONCE_LEN..];

    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad: header })
        .map_err(|_| StorageError::CryptoError)?;
    Ok((Zeroizing::new(plaintext), key))
}

/// Seals `plaintext` and atomically replaces the file at `path`.
pub fn save(path: &Path, plaintext: &[u8], key: &SealingKey) -> Result<(), StorageError> {
    write_atomic(path, &seal(plaintext, key)?)
}

/// Reads and decrypts the file at `path`.
pub fn load(path: &Path, secret: &DerivedKey) -> Result<(Zeroizing<Vec<u8>>, SealingKey), StorageError> {
    open(&read_file(path)?, secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAX_KDF_LOG_N, MAX_KDF_P};
    use crate::keys::derive_key;

    const FAST: KdfConfig = KdfConfig { log_n: 4, r: 8, p: 1 };

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("./", "rng.state"), PathBuf::from("./rng.state"));
        assert_eq!(resolve_path("/tmp/app/", "rng.state"), PathBuf::from("/tmp/app/rng.state"));
        assert_eq!(resolve_path("custom.bin", "rng.state"), PathBuf::from("custom.bin"));

        let dir = std::env::temp_dir();
        let dir_id = dir.to_string_lossy().trim_end_matches(std::path::MAIN_SEPARATOR).to_string();
        assert_eq!(resolve_path(&dir_id, "rng.state"), dir.join("rng.state"));
    }

    #[test]
    fn test_seal_open() {
        let secret = derive_key(b"passphrase");
        let key = SealingKey::derive(&secret, FAST).unwrap();
        let image = seal(b"generator state", &key).unwrap();
        assert_eq!(&image[..4], MAGIC);

        let (plaintext, reopened) = open(&image, &secret).unwrap();
        assert_eq!(&plaintext[..], b"generator state");
        assert_eq!(reopened.kdf(), FAST);

        // The re-derived key seals files the original key can read.
        let again = seal(b"next", &reopened).unwrap();
        assert_eq!(&open(&again, &secret).unwrap().0[..], b"next");
    }

    #[test]
    fn test_wrong_key_is_crypto_error() {
        let key = SealingKey::derive(&derive_key(b"right"), FAST).unwrap();
        let image = seal(b"state", &key).unwrap();
        assert!(matches!(open(&image, &derive_key(b"wrong")), Err(StorageError::CryptoError)));
    }

    #[test]
    fn test_tampered_header_is_rejected() {
        let secret = derive_key(b"k");
        let key = SealingKey::derive(&secret, FAST).unwrap();
        let mut image = seal(b"state", &key).unwrap();

        // Flipping a salt byte changes the derived key.
        image[20] ^= 0x01;
        assert!(matches!(open(&image, &secret), Err(StorageError::CryptoError)));

        image[20] ^= 0x01;
        image[0] = b'X';
        assert!(matches!(open(&image, &secret), Err(StorageError::Corruption)));
    }

    #[test]
    fn test_truncated_and_expensive_files_are_corrupt() {
        let secret = derive_key(b"k");
        assert!(matches!(open(b"SKST", &secret), Err(StorageError::Corruption)));

        let key = SealingKey::derive(&secret, FAST).unwrap();
        let mut image = seal(b"state", &key).unwrap();
        image[5] = MAX_KDF_LOG_N + 1;
        assert!(matches!(open(&image, &secret), Err(StorageError::Corruption)));
    }

    #[test]
    fn test_header_memory_and_parallelism_are_bounded() {
        let secret = derive_key(b"k");
        let key = SealingKey::derive(&secret, FAST).unwrap();
        let image = seal(b"state", &key).unwrap();

        // log_n = 20, r = 4096 would need 512 GiB.
        let mut huge_memory = image.clone();
        huge_memory[5] = 20;
        huge_memory[6..10].copy_from_slice(&4096u32.to_le_bytes());
        assert!(matches!(parse_header(&huge_memory), Err(StorageError::Corruption)));
        assert!(matches!(open(&huge_memory, &secret), Err(StorageError::Corruption)));

        let mut huge_p = image;
        huge_p[10..14].copy_from_slice(&(MAX_KDF_P + 1).to_le_bytes());
        assert!(matches!(parse_header(&huge_p), Err(StorageError::Corruption)));
    }

    #[test]
    fn test_save_load_file() {
        let dir = std::env::temp_dir().join(format!("seedkeep_state_file_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = resolve_path(&format!("{}/", dir.display()), "rng.state");

        let secret = derive_key(b"file key");
        let key = SealingKey::derive(&secret, FAST).unwrap();
        save(&path, b"persisted", &key).unwrap();
        assert_eq!(&load(&path, &secret).unwrap().0[..], b"persisted");
        assert!(matches!(load(&dir.join("missing"), &secret), Err(StorageError::NotFound)));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
