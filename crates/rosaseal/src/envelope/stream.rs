//! Streaming per-file encryption.
//!
//! AES-256 in full-block CFB mode with PKCS#5 padding, matching the
//! inherited wire format byte for byte: the plaintext tail is padded to a
//! whole block (a full block of padding when the length is already aligned)
//! before the final cipher call, so the ciphertext length is always a
//! multiple of the block size.
//!
//! Files are streamed through the cipher in fixed-size chunks; nothing
//! requires the whole file in memory. The plaintext source is never modified
//! or deleted here. On failure the `.enc` destination may be left partially
//! written and must be treated as invalid by the caller.

use std::fs::File;
use std::io::{BufWriter, Read as _, Write as _};
use std::path::{Path, PathBuf};

use aes::Aes256;
use cfb_mode::BufEncryptor;
use cfb_mode::cipher::KeyIvInit as _;

use super::error::EncryptionError;
use super::iv::IV_LEN;
use super::session::{EncryptionSession, SYMMETRIC_KEY_LEN};

/// AES block size; PKCS#5 pads the plaintext tail up to this.
const BLOCK_LEN: usize = 16;

/// Read granularity for streaming a source file through the cipher.
const CHUNK_LEN: usize = 4096;

/// Suffix appended to every encrypted artifact's file name.
pub(crate) const ENCRYPTED_SUFFIX: &str = ".enc";

/// Ciphertext length for a plaintext of `len` bytes: padded to the next
/// whole block, a full extra block when already aligned.
pub(crate) fn padded_len(len: u64) -> u64 {
    len + (BLOCK_LEN as u64 - len % BLOCK_LEN as u64)
}

/// Destination path for a source file's ciphertext: the same path with
/// `.enc` appended to the full file name.
pub fn encrypted_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(ENCRYPTED_SUFFIX);
    PathBuf::from(name)
}

/// Encrypt one file end-to-end under the session key, writing
/// `<source>.enc` beside it.
///
/// Returns the destination path. The IV must come from the session's IV
/// sequence ([`EncryptionSession::next_iv`]), drawn immediately before this
/// call.
///
/// # Errors
///
/// [`EncryptionError::Io`] on any read or write failure; the destination is
/// then invalid and a retried session must start over with a fresh key.
pub fn encrypt_file(
    session: &EncryptionSession,
    iv: &[u8; IV_LEN],
    source: &Path,
) -> Result<PathBuf, EncryptionError> {
    encrypt_file_with_key(session.key_bytes(), iv, source)
}

/// Cipher core, split from [`encrypt_file`] so the streaming and padding
/// behavior is testable without an RSA-backed session.
pub(crate) fn encrypt_file_with_key(
    key: &[u8; SYMMETRIC_KEY_LEN],
    iv: &[u8; IV_LEN],
    source: &Path,
) -> Result<PathBuf, EncryptionError> {
    let destination = encrypted_path(source);

    let mut reader = File::open(source).map_err(|e| EncryptionError::io(source, e))?;
    let mut writer = BufWriter::new(
        File::create(&destination).map_err(|e| EncryptionError::io(&destination, e))?,
    );

    let mut cipher = BufEncryptor::<Aes256>::new(key.into(), iv.into());
    let mut chunk = [0u8; CHUNK_LEN];
    let mut plaintext_len: u64 = 0;

    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EncryptionError::io(source, e)),
        };
        plaintext_len += read as u64;
        cipher.encrypt(&mut chunk[..read]);
        writer.write_all(&chunk[..read]).map_err(|e| EncryptionError::io(&destination, e))?;
    }

    // PKCS#5 tail: always at least one byte, a whole block when aligned.
    let pad = (BLOCK_LEN - (plaintext_len as usize % BLOCK_LEN)) as u8;
    let mut tail = [pad; BLOCK_LEN];
    cipher.encrypt(&mut tail[..pad as usize]);
    writer.write_all(&tail[..pad as usize]).map_err(|e| EncryptionError::io(&destination, e))?;

    writer.flush().map_err(|e| EncryptionError::io(&destination, e))?;
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    use cfb_mode::BufDecryptor;
    use proptest::prelude::*;

    fn decrypt(key: &[u8; SYMMETRIC_KEY_LEN], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Vec<u8> {
        let mut buf = ciphertext.to_vec();
        BufDecryptor::<Aes256>::new(key.into(), iv.into()).decrypt(&mut buf);
        let pad = *buf.last().unwrap() as usize;
        assert!((1..=BLOCK_LEN).contains(&pad), "padding byte out of range: {pad}");
        buf.truncate(buf.len() - pad);
        buf
    }

    fn encrypt_bytes(contents: &[u8]) -> (PathBuf, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("payload.bin");
        std::fs::write(&source, contents).unwrap();
        let dest = encrypt_file_with_key(&[0x42; SYMMETRIC_KEY_LEN], &[0x24; IV_LEN], &source).unwrap();
        (dest, dir)
    }

    #[test]
    fn encrypted_path_appends_to_the_full_name() {
        assert_eq!(
            encrypted_path(Path::new("/tmp/sub/photo.jpg")),
            PathBuf::from("/tmp/sub/photo.jpg.enc")
        );
    }

    #[test]
    fn roundtrip_small_file() {
        let (dest, _dir) = encrypt_bytes(b"X");
        let ciphertext = std::fs::read(dest).unwrap();
        assert_eq!(ciphertext.len(), BLOCK_LEN, "one byte pads to one block");
        assert_eq!(decrypt(&[0x42; 32], &[0x24; 16], &ciphertext), b"X");
    }

    #[test]
    fn empty_file_encrypts_to_one_padding_block() {
        let (dest, _dir) = encrypt_bytes(b"");
        let ciphertext = std::fs::read(dest).unwrap();
        assert_eq!(ciphertext.len(), BLOCK_LEN);
        assert_eq!(decrypt(&[0x42; 32], &[0x24; 16], &ciphertext), b"");
    }

    #[test]
    fn block_aligned_file_gains_a_full_padding_block() {
        let contents = [7u8; BLOCK_LEN * 3];
        let (dest, _dir) = encrypt_bytes(&contents);
        let ciphertext = std::fs::read(dest).unwrap();
        assert_eq!(ciphertext.len(), BLOCK_LEN * 4);
        assert_eq!(decrypt(&[0x42; 32], &[0x24; 16], &ciphertext), contents);
    }

    #[test]
    fn file_larger_than_one_chunk_roundtrips() {
        let contents: Vec<u8> = (0..(CHUNK_LEN * 2 + 37)).map(|i| (i % 251) as u8).collect();
        let (dest, _dir) = encrypt_bytes(&contents);
        assert_eq!(decrypt(&[0x42; 32], &[0x24; 16], &std::fs::read(dest).unwrap()), contents);
    }

    #[test]
    fn padded_len_matches_written_ciphertext() {
        for len in [0usize, 1, 15, 16, 17, CHUNK_LEN] {
            let contents = vec![9u8; len];
            let (dest, _dir) = encrypt_bytes(&contents);
            assert_eq!(
                std::fs::read(dest).unwrap().len() as u64,
                padded_len(len as u64),
                "ciphertext length mismatch for {len} plaintext bytes"
            );
        }
    }

    #[test]
    fn plaintext_source_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("photo.jpg");
        std::fs::write(&source, b"pixels").unwrap();

        encrypt_file_with_key(&[0u8; SYMMETRIC_KEY_LEN], &[0u8; IV_LEN], &source).unwrap();

        assert_eq!(std::fs::read(&source).unwrap(), b"pixels");
    }

    #[test]
    fn missing_source_is_an_io_error_without_orphan_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("absent.jpg");

        let err = encrypt_file_with_key(&[0u8; SYMMETRIC_KEY_LEN], &[0u8; IV_LEN], &source).unwrap_err();
        assert!(matches!(err, EncryptionError::Io { .. }));
        assert!(!encrypted_path(&source).exists(), "no .enc file for an unreadable source");
    }

    proptest! {
        // Keep the case count moderate: every case touches the filesystem.
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn roundtrip_arbitrary_contents(contents in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let (dest, _dir) = encrypt_bytes(&contents);
            let ciphertext = std::fs::read(dest).unwrap();
            prop_assert_eq!(ciphertext.len() % BLOCK_LEN, 0);
            prop_assert_eq!(decrypt(&[0x42; 32], &[0x24; 16], &ciphertext), contents);
        }
    }
}
