//! GL-040: BLAKE3 content hashing for recipe files.

use crate::core::error::{Error, Result};
use std::io::Read;
use std::path::Path;

const STREAM_BUF_SIZE: usize = 65536;
pub const HASH_PREFIX: &str = "blake3:";

/// Hash a file's contents. Returns `"blake3:{hex}"`.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; STREAM_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex()))
}

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("{}{}", HASH_PREFIX, blake3::hash(s.as_bytes()).to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gl040_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.yaml");
        std::fs::write(&path, "name: x").unwrap();
        let h = hash_file(&path).unwrap();
        assert!(h.starts_with(HASH_PREFIX));
        assert_eq!(h.len(), 7 + 64);
    }

    #[test]
    fn test_gl040_file_matches_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.yaml");
        std::fs::write(&path, "same bytes").unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_string("same bytes"));
    }

    #[test]
    fn test_gl040_large_file_streams() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.yaml");
        let content = "x".repeat(STREAM_BUF_SIZE * 3 + 17);
        std::fs::write(&path, &content).unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_string(&content));
    }

    #[test]
    fn test_gl040_hash_string() {
        assert_eq!(hash_string("hello"), hash_string("hello"));
        assert_ne!(hash_string("hello"), hash_string("world"));
    }

    #[test]
    fn test_gl040_hash_file_not_found() {
        let err = hash_file(Path::new("/nonexistent/file.yaml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
