//! Content-addressed attachments.
//!
//! Blob identity is the SHA-256 digest of its bytes, so a payload submitted
//! any number of times is stored exactly once. Filename and content type are
//! per-observable metadata kept next to the digest, not part of the blob.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result, store::BlobStore};

// ─── ContentHash ─────────────────────────────────────────────────────────────

/// Lower-case hex SHA-256 digest of a blob; doubles as its storage key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
  pub fn of(bytes: &[u8]) -> Self { Self(hex::encode(Sha256::digest(bytes))) }

  /// Accept an externally supplied digest (e.g. from a URL path). Returns
  /// `None` unless it is 64 hex characters.
  pub fn parse(s: &str) -> Option<Self> {
    let valid = s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit());
    valid.then(|| Self(s.to_ascii_lowercase()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ContentHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Attachment ──────────────────────────────────────────────────────────────

/// The attachment side of an observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
  pub hash:         ContentHash,
  pub filename:     String,
  pub content_type: String,
  pub size:         u64,
}

/// A decoded `filename;contentType;base64Value` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPayload {
  pub filename:     String,
  pub content_type: String,
  pub bytes:        Vec<u8>,
}

impl AttachmentPayload {
  /// Parse the inline attachment form. Anything other than exactly three
  /// `;`-separated fields is [`Error::InvalidFormat`] carrying `raw`; a bad
  /// third field is [`Error::DecodeError`].
  pub fn parse(raw: &str) -> Result<Self> {
    let fields: Vec<&str> = raw.split(';').collect();
    let [filename, content_type, encoded] = fields.as_slice() else {
      return Err(Error::InvalidFormat(raw.to_owned()));
    };
    let bytes = B64.decode(encoded.trim())?;
    Ok(Self {
      filename: (*filename).to_owned(),
      content_type: (*content_type).to_owned(),
      bytes,
    })
  }
}

// ─── AttachmentStore ─────────────────────────────────────────────────────────

/// Deduplicating front of a [`BlobStore`].
pub struct AttachmentStore<'a, B: BlobStore + ?Sized> {
  blobs: &'a mut B,
}

impl<'a, B: BlobStore + ?Sized> AttachmentStore<'a, B> {
  pub fn new(blobs: &'a mut B) -> Self { Self { blobs } }

  /// Persist `bytes` unless a blob with the same digest exists. Either way
  /// the digest of the single stored copy is returned.
  pub fn store(&mut self, bytes: &[u8]) -> Result<ContentHash> {
    let hash = ContentHash::of(bytes);
    if self.blobs.put_blob_if_absent(&hash, bytes)? {
      tracing::debug!(%hash, size = bytes.len(), "stored new attachment blob");
    } else {
      tracing::debug!(%hash, "attachment blob already present");
    }
    Ok(hash)
  }

  pub fn load(&mut self, hash: &ContentHash) -> Result<Vec<u8>> {
    self
      .blobs
      .get_blob(hash)?
      .ok_or_else(|| Error::not_found("attachment", hash))
  }

  /// Delete the blob if no observable references it any more. Returns
  /// whether it was deleted.
  pub fn release(&mut self, hash: &ContentHash) -> Result<bool> {
    if self.blobs.blob_references(hash)? > 0 {
      return Ok(false);
    }
    self.blobs.delete_blob(hash)?;
    Ok(true)
  }
}
