//! Key material for a form and its provider abstraction.
//!
//! The crypto core never talks to storage. Whatever holds form definitions
//! (a database, a directory of forms, a test fixture) implements
//! [`KeyMaterialProvider`] and hands over one [`KeyMaterial`] record, or
//! `None` when the form has no encryption configured. A `None` is the
//! caller's cue to submit plaintext; it is not an error here.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::RsaPublicKey;
use rsa::pkcs8::DecodePublicKey;

use crate::envelope::EncryptionError;

/// Everything the envelope pipeline needs to know about one form instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Form identifier, copied verbatim into the manifest and signature.
    pub form_id: String,
    /// Form version; omitted from manifest and signature when absent.
    pub form_version: Option<String>,
    /// OpenRosa instance id. Required: a session cannot open without it.
    pub instance_id: Option<String>,
    /// Base64-encoded X.509 `SubjectPublicKeyInfo` of the form's RSA key.
    pub public_key_base64: String,
}

impl KeyMaterial {
    /// Parse the form's RSA public key.
    ///
    /// # Errors
    ///
    /// [`EncryptionError::KeyMaterial`] when the base64 or the DER inside it
    /// is malformed, or the key is not RSA.
    pub fn rsa_public_key(&self) -> Result<RsaPublicKey, EncryptionError> {
        let der = BASE64
            .decode(self.public_key_base64.trim())
            .map_err(|e| EncryptionError::key_material(format!("public key base64: {e}")))?;
        RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| EncryptionError::key_material(format!("public key SPKI: {e}")))
    }
}

/// Narrow seam between the crypto core and whatever stores form definitions.
pub trait KeyMaterialProvider {
    /// Key material for the submission at hand, or `None` when the form is
    /// not configured for encryption.
    fn key_material(&self) -> Option<KeyMaterial>;
}
