//! The submission envelope pipeline.
//!
//! One [`EncryptionSession`] per submission attempt. The pipeline is linear:
//! open the session, then for each file (media first, submission XML last)
//! append its signature entry, draw the next IV and encrypt it; finally the
//! manifest is written over the plaintext submission XML.
//!
//! The per-file steps are exposed individually so callers that do not work
//! from a submission directory can drive the pipeline themselves. Ordering
//! matters: [`append_file_entry`] must precede [`EncryptionSession::next_iv`]
//! and [`encrypt_file`] for the same file, and files must be processed in the
//! order their signature entries are appended.

mod error;
mod iv;
mod manifest;
mod session;
mod signature;
mod stream;

pub use error::EncryptionError;
pub use iv::{IV_LEN, derive_iv};
pub use manifest::write_manifest;
pub use session::EncryptionSession;
pub use signature::{append_file_entry, finalize_signature};
pub use stream::{encrypt_file, encrypted_path};

pub(crate) use stream::{ENCRYPTED_SUFFIX, padded_len};

use std::io;
use std::path::Path;

/// UTF-8 file name component of `path`.
///
/// Signature entries and manifest references carry file names only, never
/// full paths.
pub(crate) fn file_name(path: &Path) -> Result<&str, EncryptionError> {
    path.file_name().and_then(|name| name.to_str()).ok_or_else(|| {
        EncryptionError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "file name is not valid UTF-8"),
        )
    })
}
