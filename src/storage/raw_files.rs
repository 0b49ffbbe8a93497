//! Raw File Storage.
//!
//! Basic file system operations used by the state file.
//!
//! # Security
//! - Files are replaced atomically (write, sync, rename) so a crash never
//!   leaves a half-written state file behind.
//! - New files are created owner-only on Unix.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::StorageError;

/// Largest file `read_file` accepts.
pub const MAX_FILE_LEN: u64 = 1024 * 1024;

fn temp_path_for(path: &Path) -> Result<PathBuf, StorageError> {
    let filename = path.file_name().ok_or(StorageError::InvalidPath)?;
    Ok(path.with_file_name(format!(".{}.tmp", filename.to_string_lossy())))
}

fn create_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Writes data to a file atomically.
pub fn write_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), StorageError> {
    let path = path.as_ref();
    let temp_path = temp_path_for(path)?;

    let result = (|| -> std::io::Result<()> {
        let mut file = create_private(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        // Rename is atomic on POSIX.
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Reads a whole file, refusing anything larger than [`MAX_FILE_LEN`].
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, StorageError> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if len > MAX_FILE_LEN {
        return Err(StorageError::Corruption);
    }

    let mut buffer = Vec::with_capacity(len as usize);
    file.take(MAX_FILE_LEN + 1).read_to_end(&mut buffer)?;
    if buffer.len() as u64 > MAX_FILE_LEN {
        return Err(StorageError::Corruption);
    }
    Ok(buffer)
}
