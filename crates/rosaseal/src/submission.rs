//! Whole-submission orchestration.
//!
//! Drives the envelope pipeline over one submission directory: scan for
//! media files, then for each file (media first, submission XML last) append
//! its signature entry, draw the next IV and encrypt it; finally replace the
//! plaintext submission XML with the manifest.
//!
//! The pipeline runs to completion or fails outright. On failure, `.enc`
//! files already written are left beside the untouched plaintext; the caller
//! must discard them and retry the whole submission with a fresh session
//! rather than resume.

use std::io;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;

use crate::envelope::{
    ENCRYPTED_SUFFIX, EncryptionError, EncryptionSession, append_file_entry, encrypt_file,
    padded_len, write_manifest,
};
use crate::key_material::{KeyMaterial, KeyMaterialProvider};

/// Artifacts produced by a completed encryption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSubmission {
    /// Ciphertext of each media file, in processing order.
    pub media_files: Vec<PathBuf>,
    /// Ciphertext of the submission XML.
    pub submission_file: PathBuf,
    /// The manifest, written over the plaintext submission XML path.
    pub manifest: PathBuf,
}

/// Encrypt one submission directory end to end.
///
/// `submission_name` is the file name of the plaintext submission XML inside
/// `dir`; `instance_name`, when the instance XML is a separate file, names it
/// so the media scan does not treat it as an attachment. Every other regular
/// file in `dir` is a media file, processed in lexicographic name order
/// (callers needing a different order drive the pipeline through
/// [`EncryptionSession`] directly).
///
/// # Errors
///
/// [`EncryptionError::KeyMaterial`] before any file is touched when the key
/// material is unusable; [`EncryptionError::Io`] /
/// [`EncryptionError::Crypto`] on any later failure, which aborts the whole
/// attempt.
pub fn encrypt_submission(
    material: &KeyMaterial,
    dir: &Path,
    instance_name: Option<&str>,
    submission_name: &str,
) -> Result<EncryptedSubmission, EncryptionError> {
    let mut rng = OsRng;
    let mut session = EncryptionSession::open(material, &mut rng)?;

    let mut excluded = vec![submission_name];
    if let Some(name) = instance_name {
        excluded.push(name);
    }
    let media = list_media_files(dir, &excluded)?;

    tracing::info!(
        form_id = %session.form_id(),
        instance_id = %session.instance_id(),
        media_count = media.len(),
        "opened encryption session"
    );

    let mut media_files = Vec::with_capacity(media.len());
    let mut media_names = Vec::with_capacity(media.len());
    for path in &media {
        media_files.push(seal_one(&mut session, path)?);
        media_names.push(crate::envelope::file_name(path)?.to_owned());
    }

    let submission_path = dir.join(submission_name);
    let submission_file = seal_one(&mut session, &submission_path)?;

    write_manifest(&session, &media_names, submission_name, &mut rng, &submission_path)?;

    tracing::info!(
        form_id = %session.form_id(),
        files = session.files_encrypted(),
        manifest = %submission_path.display(),
        "submission sealed"
    );

    Ok(EncryptedSubmission { media_files, submission_file, manifest: submission_path })
}

/// Encrypt a submission directory when its form is configured for it.
///
/// Asks `provider` for key material; `Ok(None)` means the form has no
/// encryption key and the caller should submit plaintext. Everything else is
/// [`encrypt_submission`].
///
/// # Errors
///
/// Same as [`encrypt_submission`]; a provider without key material is not an
/// error.
pub fn encrypt_submission_with_provider<P: KeyMaterialProvider>(
    provider: &P,
    dir: &Path,
    instance_name: Option<&str>,
    submission_name: &str,
) -> Result<Option<EncryptedSubmission>, EncryptionError> {
    let Some(material) = provider.key_material() else {
        tracing::info!(dir = %dir.display(), "form has no encryption key, leaving plaintext");
        return Ok(None);
    };
    encrypt_submission(&material, dir, instance_name, submission_name).map(Some)
}

/// Signature entry, then IV, then ciphertext, for one file.
///
/// The entry hashes plaintext, so it must precede encryption; the IV draw
/// sits between the two so the IV sequence and the signature order agree.
fn seal_one(
    session: &mut EncryptionSession,
    path: &Path,
) -> Result<PathBuf, EncryptionError> {
    let plaintext_bytes =
        std::fs::metadata(path).map_err(|e| EncryptionError::io(path, e))?.len();
    append_file_entry(session, path)?;
    let iv = session.next_iv();
    let destination = encrypt_file(session, &iv, path)?;
    tracing::debug!(
        file = %path.display(),
        plaintext_bytes,
        ciphertext_bytes = padded_len(plaintext_bytes),
        "encrypted submission file"
    );
    Ok(destination)
}

/// Media files of a submission directory, in lexicographic name order.
///
/// Only regular files count: directories are skipped, as are names listed in
/// `excluded` (the submission and instance XML) and stale `.enc` artifacts
/// left behind by a previously failed attempt.
///
/// A media file whose name is not valid UTF-8 cannot appear in the manifest
/// or the signature; it is rejected here so the attachment is never silently
/// left plaintext.
pub fn list_media_files(dir: &Path, excluded: &[&str]) -> Result<Vec<PathBuf>, EncryptionError> {
    let entries = std::fs::read_dir(dir).map_err(|e| EncryptionError::io(dir, e))?;

    let mut media = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EncryptionError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| EncryptionError::io(&entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            return Err(EncryptionError::io(
                &entry.path(),
                io::Error::new(io::ErrorKind::InvalidInput, "file name is not valid UTF-8"),
            ));
        };
        if excluded.contains(&name) || name.ends_with(ENCRYPTED_SUFFIX) {
            continue;
        }
        media.push(entry.path());
    }
    media.sort();
    Ok(media)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_scan_is_sorted_and_skips_non_media() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"b").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(dir.path().join("submission.xml"), b"<data/>").unwrap();
        std::fs::write(dir.path().join("instance.xml"), b"<data/>").unwrap();
        std::fs::write(dir.path().join("stale.jpg.enc"), b"old ciphertext").unwrap();
        std::fs::create_dir(dir.path().join("thumbnails")).unwrap();
        std::fs::write(dir.path().join("thumbnails").join("t.jpg"), b"t").unwrap();

        let media =
            list_media_files(dir.path(), &["submission.xml", "instance.xml"]).unwrap();

        let names: Vec<String> = media
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn media_scan_of_empty_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_media_files(dir.path(), &["submission.xml"]).unwrap().is_empty());
    }

    #[test]
    fn media_scan_of_missing_directory_is_an_io_error() {
        let err = list_media_files(Path::new("/nonexistent/submission"), &[]).unwrap_err();
        assert!(matches!(err, EncryptionError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn media_scan_rejects_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt as _;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"ph\xFFoto.jpg")), b"pixels").unwrap();
        std::fs::write(dir.path().join("submission.xml"), b"<data/>").unwrap();

        // A name the manifest cannot carry must abort the scan, not be
        // skipped and left plaintext.
        let err = list_media_files(dir.path(), &["submission.xml"]).unwrap_err();
        assert!(matches!(err, EncryptionError::Io { .. }));
    }

    struct FixedProvider(Option<KeyMaterial>);

    impl KeyMaterialProvider for FixedProvider {
        fn key_material(&self) -> Option<KeyMaterial> {
            self.0.clone()
        }
    }

    #[test]
    fn provider_without_key_material_leaves_the_directory_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("photo.jpg"), b"pixels").unwrap();
        std::fs::write(dir.path().join("submission.xml"), b"<data/>").unwrap();

        let result = encrypt_submission_with_provider(
            &FixedProvider(None),
            dir.path(),
            None,
            "submission.xml",
        )
        .unwrap();

        assert!(result.is_none(), "no key material means no encryption attempt");
        assert!(!dir.path().join("photo.jpg.enc").exists());
        assert_eq!(std::fs::read(dir.path().join("submission.xml")).unwrap(), b"<data/>");
    }
}
