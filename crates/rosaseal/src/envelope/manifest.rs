//! The plaintext manifest that replaces the submission XML.
//!
//! Element names, namespaces and ordering are fixed by the wire format and
//! must not change: existing decryptors locate children positionally.
//!
//! ```text
//! <data xmlns="http://www.opendatakit.org/xforms/encrypted"
//!       id=... [version=...] encrypted="yes">
//!   <base64EncryptedKey>...</base64EncryptedKey>
//!   <orx:meta xmlns:orx="http://openrosa.org/xforms">
//!     <orx:instanceID>...</orx:instanceID>
//!   </orx:meta>
//!   <media><file>NAME.enc</file></media>   (one per media file, in order)
//!   <encryptedXmlFile>SUBMISSION.enc</encryptedXmlFile>
//!   <base64EncryptedElementSignature>...</base64EncryptedElementSignature>
//! </data>
//! ```
//!
//! Writing the manifest is the last step of a session and is not atomic with
//! the per-file encryption; a crash in between leaves `.enc` files with no
//! manifest (inherited failure model, preserved).

use std::io;
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rand::{CryptoRng, RngCore};

use super::error::EncryptionError;
use super::session::EncryptionSession;
use super::signature::finalize_signature;
use super::stream::ENCRYPTED_SUFFIX;

/// Namespace of the manifest root.
const ENCRYPTED_NS: &str = "http://www.opendatakit.org/xforms/encrypted";

/// OpenRosa metadata namespace, bound to the `orx` prefix.
const OPENROSA_NS: &str = "http://openrosa.org/xforms";

/// Finalize the signature and write the manifest over the submission XML.
///
/// `media_names` are the plaintext media file names in processing order;
/// `submission_name` is the plaintext submission XML file name. The manifest
/// references each as `"<name>.enc"`. `out_path` is normally the plaintext
/// submission XML path, which the manifest replaces in place.
///
/// # Errors
///
/// [`EncryptionError::Crypto`] when closing the signature fails,
/// [`EncryptionError::Io`] on any serialization or write failure. Either is
/// fatal to the whole encryption attempt.
pub fn write_manifest<R: CryptoRng + RngCore>(
    session: &EncryptionSession,
    media_names: &[String],
    submission_name: &str,
    rng: &mut R,
    out_path: &Path,
) -> Result<(), EncryptionError> {
    let signature = finalize_signature(session, rng)?;
    let document = render_manifest(session, media_names, submission_name, &signature, out_path)?;
    std::fs::write(out_path, document).map_err(|e| EncryptionError::io(out_path, e))
}

/// Serialize the manifest document to bytes.
///
/// Split from [`write_manifest`] so the document can be inspected without
/// touching the filesystem. `path` is used only for error attribution.
pub(crate) fn render_manifest(
    session: &EncryptionSession,
    media_names: &[String],
    submission_name: &str,
    signature_base64: &str,
    path: &Path,
) -> Result<Vec<u8>, EncryptionError> {
    let mut writer = Writer::new(Vec::new());

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(|e| manifest_io(path, e))?;

    let mut root = BytesStart::new("data");
    root.push_attribute(("xmlns", ENCRYPTED_NS));
    root.push_attribute(("id", session.form_id()));
    if let Some(version) = session.form_version() {
        root.push_attribute(("version", version));
    }
    root.push_attribute(("encrypted", "yes"));
    writer.write_event(Event::Start(root)).map_err(|e| manifest_io(path, e))?;

    write_text_element(
        &mut writer,
        path,
        "base64EncryptedKey",
        session.encrypted_symmetric_key(),
    )?;

    let mut meta = BytesStart::new("orx:meta");
    meta.push_attribute(("xmlns:orx", OPENROSA_NS));
    writer.write_event(Event::Start(meta)).map_err(|e| manifest_io(path, e))?;
    write_text_element(&mut writer, path, "orx:instanceID", session.instance_id())?;
    writer.write_event(Event::End(BytesEnd::new("orx:meta"))).map_err(|e| manifest_io(path, e))?;

    for name in media_names {
        writer.write_event(Event::Start(BytesStart::new("media")))
            .map_err(|e| manifest_io(path, e))?;
        write_text_element(&mut writer, path, "file", &format!("{name}{ENCRYPTED_SUFFIX}"))?;
        writer.write_event(Event::End(BytesEnd::new("media")))
            .map_err(|e| manifest_io(path, e))?;
    }

    write_text_element(
        &mut writer,
        path,
        "encryptedXmlFile",
        &format!("{submission_name}{ENCRYPTED_SUFFIX}"),
    )?;
    write_text_element(&mut writer, path, "base64EncryptedElementSignature", signature_base64)?;

    writer.write_event(Event::End(BytesEnd::new("data"))).map_err(|e| manifest_io(path, e))?;

    Ok(writer.into_inner())
}

fn write_text_element<W: io::Write>(
    writer: &mut Writer<W>,
    path: &Path,
    name: &str,
    text: &str,
) -> Result<(), EncryptionError> {
    writer.write_event(Event::Start(BytesStart::new(name))).map_err(|e| manifest_io(path, e))?;
    writer.write_event(Event::Text(BytesText::new(text))).map_err(|e| manifest_io(path, e))?;
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(|e| manifest_io(path, e))?;
    Ok(())
}

/// Serialization failures surface as i/o errors on the manifest path.
fn manifest_io(path: &Path, err: impl std::fmt::Display) -> EncryptionError {
    EncryptionError::io(path, io::Error::other(err.to_string()))
}
