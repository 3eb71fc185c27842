//! Rosaseal - Envelope Encryption for Form Submissions
//!
//! Converts a completed plaintext form submission (an XML document plus zero
//! or more attached media files) into a confidentiality- and
//! integrity-protected bundle addressed to a form-specific RSA public key.
//! Callers provide random bytes for deterministic testing.
//!
//! # Session Lifecycle
//!
//! Each submission attempt owns one [`EncryptionSession`]. The session holds
//! the per-submission symmetric key, the IV seed and the canonical signature
//! source; nothing is shared between sessions.
//!
//! ```text
//! Key Material (form id, version, instance id, RSA public key)
//!        │
//!        ▼
//! EncryptionSession::open → AES-256 key, IV seed, RSA-OAEP wrapped key
//!        │
//!        ▼
//! per file (media first, submission XML last):
//!     signature entry → next IV → AES-256-CFB ciphertext (<name>.enc)
//!        │
//!        ▼
//! Manifest XML (wrapped key, file list, RSA-OAEP encrypted signature digest)
//! ```
//!
//! # Security
//!
//! Confidentiality:
//! - Each submission gets a fresh random 256-bit AES key
//! - The key leaves the session only wrapped under RSA-OAEP(SHA-256)
//! - Key bytes are zeroized when the session is dropped
//!
//! Integrity:
//! - A canonical newline-delimited text records ids, the wrapped key and the
//!   MD5 of every plaintext file in processing order
//! - The MD5 digest of that text is RSA-OAEP encrypted into the manifest
//!
//! Compatibility caveats (inherited wire format, preserved bit-for-bit):
//! - IVs are derived by byte-incrementing a shared seed; sessions with more
//!   than 16 files reuse seed positions
//! - MD5 is the mandated digest for both content hashes and the signature
//!   pre-image
//!
//! # Failure Model
//!
//! Any per-file or manifest error aborts the whole attempt. `.enc` files from
//! a partial session are left behind and must be discarded by the caller; the
//! manifest write is not atomic with per-file encryption.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod key_material;
pub mod submission;

pub use envelope::{
    EncryptionError, EncryptionSession, append_file_entry, derive_iv, encrypt_file,
    finalize_signature, write_manifest,
};
pub use key_material::{KeyMaterial, KeyMaterialProvider};
pub use submission::{
    EncryptedSubmission, encrypt_submission, encrypt_submission_with_provider, list_media_files,
};
