//! Turning observable submissions into observables.
//!
//! Ingestion is all-or-nothing for a batch: [`ingest_all`] stops at the first
//! failing submission and the enclosing transaction is expected to roll back.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  attachment::{Attachment, AttachmentPayload, AttachmentStore},
  observable::{Observable, ObservableData, ObservableOwner, ObservableSubmission},
  store::{BlobStore, Catalog},
};

/// Converts submissions for one owner. Positions are assigned in submission
/// order, counting only submissions that produce an observable.
pub struct ObservableIngestor<'a, S: Catalog + BlobStore + ?Sized> {
  store:         &'a mut S,
  owner:         ObservableOwner,
  actor:         &'a str,
  now:           DateTime<Utc>,
  next_position: u32,
}

impl<'a, S: Catalog + BlobStore + ?Sized> ObservableIngestor<'a, S> {
  pub fn new(store: &'a mut S, owner: ObservableOwner, actor: &'a str) -> Self {
    Self { store, owner, actor, now: Utc::now(), next_position: 0 }
  }

  /// Ingest one submission. Returns `None` when a plain-typed submission has
  /// no value, which is a skip and not an error.
  pub fn ingest(&mut self, submission: ObservableSubmission) -> Result<Option<Observable>> {
    let data_type = self
      .store
      .observable_type(&submission.data_type)?
      .ok_or_else(|| Error::not_found("observable type", &submission.data_type))?;

    let data = if data_type.is_attachment {
      let raw = submission.data.as_deref().unwrap_or_default();
      let payload = AttachmentPayload::parse(raw)?;
      let hash = AttachmentStore::new(&mut *self.store).store(&payload.bytes)?;
      ObservableData::Attachment(Attachment {
        hash,
        filename: payload.filename,
        content_type: payload.content_type,
        size: payload.bytes.len() as u64,
      })
    } else {
      match submission.data {
        Some(value) => ObservableData::Value(value),
        None => {
          tracing::debug!(data_type = %data_type.name, "skipping observable without data");
          return Ok(None);
        }
      }
    };

    let observable = Observable {
      observable_id: Uuid::new_v4(),
      owner: self.owner,
      data_type: data_type.name,
      data,
      message: submission.message,
      tags: submission.tags,
      ioc: submission.ioc,
      sighted: submission.sighted,
      tlp: submission.tlp.unwrap_or_default(),
      position: self.next_position,
      created_by: self.actor.to_owned(),
      created_at: self.now,
    };
    self.next_position += 1;
    Ok(Some(observable))
  }
}

/// Ingest a whole batch, preserving submission order. The first failure is
/// returned wrapped in [`Error::AggregateFailure`].
pub fn ingest_all<S: Catalog + BlobStore + ?Sized>(
  store: &mut S,
  owner: ObservableOwner,
  actor: &str,
  submissions: Vec<ObservableSubmission>,
) -> Result<Vec<Observable>> {
  let mut ingestor = ObservableIngestor::new(store, owner, actor);
  let mut observables = Vec::with_capacity(submissions.len());
  for submission in submissions {
    match ingestor.ingest(submission) {
      Ok(Some(observable)) => observables.push(observable),
      Ok(None) => {}
      Err(e) => return Err(Error::AggregateFailure(Box::new(e))),
    }
  }
  Ok(observables)
}
