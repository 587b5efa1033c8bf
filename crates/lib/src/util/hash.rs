//! Source checksums for the build cache.
//!
//! The cache identifies a compiled artifact by the Adler-32 checksum of its
//! source, rendered as 8 uppercase hex digits. Files are read in fixed
//! blocks; the rolling checksum makes the result independent of the block
//! size.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use adler2::Adler32;

/// Block size for reading sources.
const BLOCK_SIZE: usize = 8192;

/// Checksum of one source file, e.g. `"11E60398"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceHash(pub String);

impl std::fmt::Display for SourceHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl SourceHash {
  fn from_checksum(checksum: u32) -> Self {
    Self(format!("{checksum:08X}"))
  }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to read file {}: {source}", path.display())]
pub struct HashError {
  pub path: PathBuf,
  pub source: std::io::Error,
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<SourceHash, HashError> {
  let read_error = |source| HashError {
    path: path.to_path_buf(),
    source,
  };
  let mut file = fs::File::open(path).map_err(read_error)?;

  let mut adler = Adler32::new();
  let mut buffer = [0u8; BLOCK_SIZE];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_error)?;
    if bytes_read == 0 {
      break;
    }
    adler.write_slice(&buffer[..bytes_read]);
  }

  Ok(SourceHash::from_checksum(adler.checksum()))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> SourceHash {
  let mut adler = Adler32::new();
  adler.write_slice(data);
  SourceHash::from_checksum(adler.checksum())
}
