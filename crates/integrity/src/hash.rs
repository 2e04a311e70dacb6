use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes read per iteration while hashing.
pub const CHUNK_SIZE: usize = 4096;

/// Hex-encoded BLAKE3 digest of a file's contents.
pub fn hash_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = File::open(path).or_raise(|| ErrorKind::Unreadable(path.to_path_buf()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).or_raise(|| ErrorKind::Unreadable(path.to_path_buf()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_one_shot_digest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("big.bin");
        // Spans several chunks and ends mid-chunk.
        let data: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        assert_eq!(hash_file(&path).unwrap(), blake3::hash(&data).to_hex().to_string());
    }

    #[test]
    fn test_empty_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(hash_file(&path).unwrap(), blake3::hash(b"").to_hex().to_string());
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = hash_file(temp_dir.path().join("nope")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unreadable(_)));
    }
}
