//! Per-submission encryption session.
//!
//! A session is opened once per submission attempt and owns every piece of
//! mutable crypto state: the random AES-256 key, the IV seed and counter, and
//! the append-only signature source. If any later step fails the session is
//! abandoned wholesale; there is no partial reuse.
//!
//! # Security
//!
//! - The symmetric key comes from a caller-supplied CSPRNG and is zeroized
//!   when the session drops
//! - The key leaves the session only wrapped under RSA-OAEP(SHA-256), via
//!   [`EncryptionSession::encrypted_symmetric_key`], which is computed once
//!   at open and constant for the session's life
//! - Sessions share no state, so concurrent submissions need no locking

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use md5::{Digest as _, Md5};
use rand::{CryptoRng, RngCore};
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroize as _;

use super::error::EncryptionError;
use super::iv::{IV_LEN, derive_iv};
use crate::key_material::KeyMaterial;

/// Size of the per-submission AES key (256 bits).
pub(crate) const SYMMETRIC_KEY_LEN: usize = 32;

/// Per-submission AES-256 key, zeroized on drop.
struct SymmetricKey([u8; SYMMETRIC_KEY_LEN]);

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// All state for one submission attempt.
///
/// Created by [`EncryptionSession::open`], destroyed after the manifest is
/// written (or the attempt fails).
pub struct EncryptionSession {
    form_id: String,
    form_version: Option<String>,
    instance_id: String,
    public_key: RsaPublicKey,
    symmetric_key: SymmetricKey,
    iv_seed: [u8; IV_LEN],
    iv_counter: u32,
    encrypted_symmetric_key: String,
    signature_source: Vec<String>,
}

impl EncryptionSession {
    /// Open a session for one submission attempt.
    ///
    /// Generates the 256-bit symmetric key from `rng`, derives the IV seed as
    /// `MD5(instance_id || key)`, wraps the key under RSA-OAEP(SHA-256) and
    /// seeds the signature source with the fixed header lines: form id, form
    /// version (omitted entirely when absent), wrapped key, instance id.
    ///
    /// # Errors
    ///
    /// [`EncryptionError::KeyMaterial`] when the instance id is missing, the
    /// public key does not parse, or the key is too small to wrap a 256-bit
    /// payload under OAEP. All of these are raised before any file is
    /// touched.
    pub fn open<R: CryptoRng + RngCore>(
        material: &KeyMaterial,
        rng: &mut R,
    ) -> Result<Self, EncryptionError> {
        let instance_id = material
            .instance_id
            .clone()
            .ok_or_else(|| EncryptionError::key_material("submission has no instance id"))?;
        let public_key = material.rsa_public_key()?;

        let mut key_bytes = [0u8; SYMMETRIC_KEY_LEN];
        rng.fill_bytes(&mut key_bytes);

        let iv_seed = derive_iv_seed(&instance_id, &key_bytes);

        let wrapped = public_key
            .encrypt(rng, Oaep::new::<Sha256>(), &key_bytes)
            .map_err(|e| EncryptionError::key_material(format!("cannot wrap session key: {e}")))?;
        let encrypted_symmetric_key = BASE64.encode(wrapped);

        let mut signature_source = Vec::with_capacity(4);
        signature_source.push(material.form_id.clone());
        if let Some(version) = &material.form_version {
            signature_source.push(version.clone());
        }
        signature_source.push(encrypted_symmetric_key.clone());
        signature_source.push(instance_id.clone());

        Ok(Self {
            form_id: material.form_id.clone(),
            form_version: material.form_version.clone(),
            instance_id,
            public_key,
            symmetric_key: SymmetricKey(key_bytes),
            iv_seed,
            iv_counter: 0,
            encrypted_symmetric_key,
            signature_source,
        })
    }

    /// IV for the file about to be encrypted.
    ///
    /// Must be called exactly once per file, immediately before encrypting
    /// it, in the same order signature entries are appended.
    pub fn next_iv(&mut self) -> [u8; IV_LEN] {
        let (next_seed, iv) = derive_iv(self.iv_seed, self.iv_counter);
        self.iv_seed = next_seed;
        self.iv_counter = self.iv_counter.wrapping_add(1);
        iv
    }

    /// Form identifier.
    pub fn form_id(&self) -> &str {
        &self.form_id
    }

    /// Form version, when the form carries one.
    pub fn form_version(&self) -> Option<&str> {
        self.form_version.as_deref()
    }

    /// OpenRosa instance id of this submission.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Base64 RSA-OAEP ciphertext of the session key.
    ///
    /// Computed once at open; constant for the session's life.
    pub fn encrypted_symmetric_key(&self) -> &str {
        &self.encrypted_symmetric_key
    }

    /// Number of files encrypted so far.
    pub fn files_encrypted(&self) -> u32 {
        self.iv_counter
    }

    pub(crate) fn key_bytes(&self) -> &[u8; SYMMETRIC_KEY_LEN] {
        &self.symmetric_key.0
    }

    pub(crate) fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub(crate) fn push_signature_line(&mut self, line: String) {
        self.signature_source.push(line);
    }

    /// Canonical signature pre-image: every line newline-terminated, in
    /// append order.
    pub(crate) fn signature_source_text(&self) -> String {
        let mut text = String::new();
        for line in &self.signature_source {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// Seed for the IV sequence: `MD5(instance_id_utf8 || key_bytes)`.
///
/// MD5 yields exactly 16 bytes, but the fill is defined for any digest
/// length: shorter digests repeat cyclically, longer ones truncate.
fn derive_iv_seed(instance_id: &str, key_bytes: &[u8; SYMMETRIC_KEY_LEN]) -> [u8; IV_LEN] {
    let mut hasher = Md5::new();
    hasher.update(instance_id.as_bytes());
    hasher.update(key_bytes);
    let digest = hasher.finalize();

    let mut seed = [0u8; IV_LEN];
    for (i, byte) in seed.iter_mut().enumerate() {
        *byte = digest[i % digest.len()];
    }
    seed
}
