//! Canonical submission signature.
//!
//! The signature source is a newline-delimited text: the session's fixed
//! header lines (form id, optional version, wrapped key, instance id)
//! followed by one `"<filename>::<md5hex>"` line per file, appended in
//! processing order with the submission XML last. Finalizing MD5-digests the
//! whole text and RSA-OAEP(SHA-256)-encrypts the raw digest under the form's
//! public key; the result never touches the symmetric cipher.
//!
//! File entries hash the **plaintext** contents, so [`append_file_entry`]
//! must run before the file is encrypted.
//!
//! Determinism: two sessions with identical header lines, file set and file
//! contents produce identical signature sources. Pinning the RNG (and with
//! it the symmetric key and the OAEP randomness) makes the whole signature
//! reproducible in tests.

use std::fs::File;
use std::io::Read as _;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use md5::{Digest as _, Md5};
use rand::{CryptoRng, RngCore};
use rsa::Oaep;
use sha2::Sha256;

use super::error::EncryptionError;
use super::file_name;
use super::session::EncryptionSession;

/// Separator between file name and content hash in a signature entry.
const ENTRY_SEPARATOR: &str = "::";

/// Append the signature entry for `path`: `"<filename>::<md5hex>"`.
///
/// Hashes the plaintext contents (streamed, lowercase hex), so this must be
/// called before the file is encrypted, once per file, in processing order.
///
/// # Errors
///
/// [`EncryptionError::Io`] when the file cannot be read.
pub fn append_file_entry(
    session: &mut EncryptionSession,
    path: &Path,
) -> Result<(), EncryptionError> {
    let name = file_name(path)?;
    let digest = md5_of_file(path)?;
    session.push_signature_line(format!("{name}{ENTRY_SEPARATOR}{digest}"));
    Ok(())
}

/// Close the signature: MD5 the source text, RSA-OAEP encrypt the raw
/// digest, return it base64-encoded.
///
/// # Errors
///
/// [`EncryptionError::Crypto`] when the RSA encryption fails.
pub fn finalize_signature<R: CryptoRng + RngCore>(
    session: &EncryptionSession,
    rng: &mut R,
) -> Result<String, EncryptionError> {
    let digest = Md5::digest(session.signature_source_text().as_bytes());
    let encrypted = session
        .public_key()
        .encrypt(rng, Oaep::new::<Sha256>(), &digest)
        .map_err(|e| EncryptionError::crypto(Path::new("<signature>"), e.to_string()))?;
    Ok(BASE64.encode(encrypted))
}

/// Lowercase hex MD5 of a file's contents, streamed in chunks.
fn md5_of_file(path: &Path) -> Result<String, EncryptionError> {
    let mut reader = File::open(path).map_err(|e| EncryptionError::io(path, e))?;
    let mut hasher = Md5::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EncryptionError::io(path, e)),
        };
        hasher.update(&chunk[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
