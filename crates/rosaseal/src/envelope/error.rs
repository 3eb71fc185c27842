//! Error types for the envelope pipeline.
//!
//! A small closed taxonomy propagated as explicit results. Only
//! [`EncryptionError::KeyMaterial`] is recoverable in the business sense
//! (the caller may decide to submit plaintext); every other variant is fatal
//! to the whole session, which must be discarded and restarted from a fresh
//! symmetric key.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while sealing a submission.
#[derive(Error, Debug)]
pub enum EncryptionError {
    /// Key material was absent or malformed.
    ///
    /// Raised before any file is touched. Callers may treat this as a
    /// business decision and fall back to an unencrypted submission.
    #[error("key material rejected: {reason}")]
    KeyMaterial {
        /// Why the key material was rejected
        reason: String,
    },

    /// A required cryptographic algorithm is unavailable in the runtime.
    ///
    /// With statically linked primitives this cannot occur in practice; the
    /// variant exists so the taxonomy stays closed for callers that match on
    /// it.
    #[error("required algorithm unavailable: {algorithm}")]
    CryptoUnavailable {
        /// Name of the missing algorithm
        algorithm: &'static str,
    },

    /// Key, IV or cipher failure while processing a single file.
    ///
    /// Fatal to the session; partial `.enc` output must be treated as
    /// invalid.
    #[error("cipher failure on {}: {reason}", path.display())]
    Crypto {
        /// File being processed when the failure occurred
        path: PathBuf,
        /// Underlying cipher or key error
        reason: String,
    },

    /// Read or write failure on a submission file or the manifest.
    #[error("i/o failure on {}", path.display())]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying i/o error
        #[source]
        source: io::Error,
    },
}

impl EncryptionError {
    pub(crate) fn key_material(reason: impl Into<String>) -> Self {
        Self::KeyMaterial { reason: reason.into() }
    }

    pub(crate) fn crypto(path: &Path, reason: impl Into<String>) -> Self {
        Self::Crypto { path: path.to_path_buf(), reason: reason.into() }
    }

    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}
