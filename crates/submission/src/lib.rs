//! Submission Pipeline (component D): orchestrates the Blob Store, Hasher,
//! and Meta Extractor over one ingested byte stream.
//!
//! A [`Submission`] moves through `Open -> Ended -> Filed -> Stored` with
//! one-way transitions. `write` is only valid in `Open`; `end` consumes
//! `Open` and produces `Ended`; `add_file` consumes `Ended` and produces
//! `Filed`. There is no explicit `Stored` transition here — that happens
//! when the Index Writer (component E) commits a batch containing this
//! submission's data; `Stored` here just marks a submission that has been
//! consumed (by `add_file` failing to find a phase, or by an external
//! caller choosing not to reuse it further).

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;

use efs_core::{meta_type, ContentUri, EfsError, Result};
use extractor::MetaExtractor;
use hasher::Hasher;
use serde_json::{Map, Value};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use blob_store::BlobStore;

fn blob_err(e: blob_store::Error) -> EfsError {
    match e {
        blob_store::Error::Io(io_err) => EfsError::Io(io_err),
    }
}

enum Phase {
    Open { file: File, temp_path: PathBuf, hasher: Hasher, extractor: MetaExtractor, written: u64 },
    Ended {
        temp_path: PathBuf,
        size: u64,
        uris: Vec<ContentUri>,
        internal_hash: String,
        meta_fields: Option<Map<String, Value>>,
    },
    Filed {
        size: u64,
        uris: Vec<ContentUri>,
        internal_hash: String,
        meta_fields: Option<Map<String, Value>>,
    },
    Stored,
}

/// One ingest: a byte stream fanned out to a temp file, a hasher, and a
/// meta extractor, then committed to the blob store.
pub struct Submission {
    user_id: u64,
    declared_type: String,
    phase: Phase,
}

impl Submission {
    /// Allocate a temp file (component A), a hasher (component B), and an
    /// extractor (component C) for a submission of `declared_type` owned by
    /// `user_id`.
    pub async fn begin(blobs: &BlobStore, user_id: u64, declared_type: impl Into<String>) -> Result<Self> {
        let declared_type = declared_type.into();
        let (temp_path, file) = blobs.new_temp().await.map_err(blob_err)?;
        Ok(Self {
            user_id,
            declared_type: declared_type.clone(),
            phase: Phase::Open {
                file,
                temp_path,
                hasher: Hasher::new(&declared_type),
                extractor: MetaExtractor::for_type(&declared_type),
                written: 0,
            },
        })
    }

    /// Append bytes to the temp file and fan them out to the hasher and
    /// extractor. Only valid in `Open`.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.phase {
            Phase::Open { file, hasher, extractor, written, .. } => {
                file.write_all(bytes).await.map_err(EfsError::Io)?;
                hasher.write(bytes).map_err(|_| EfsError::InvalidState("hasher already ended"))?;
                extractor.write(bytes);
                *written += bytes.len() as u64;
                Ok(())
            }
            _ => Err(EfsError::InvalidState("write is only valid in Open")),
        }
    }

    /// Finalize the hasher and extractor, then fsync and close the temp
    /// file. `supplied_title`, if given, is carried into the extractor's
    /// output. Only valid in `Open`; transitions to `Ended`.
    pub async fn end(&mut self, blobs: &BlobStore, supplied_title: Option<&str>) -> Result<()> {
        if !matches!(self.phase, Phase::Open { .. }) {
            return Err(EfsError::InvalidState("end is only valid in Open"));
        }
        let Phase::Open { file, temp_path, mut hasher, extractor, written } =
            std::mem::replace(&mut self.phase, Phase::Stored)
        else {
            unreachable!("checked above")
        };

        blobs.sync_and_close(file).await.map_err(blob_err)?;
        let (uris, internal_hash) =
            hasher.end().map_err(|_| EfsError::InvalidState("hasher already ended"))?;
        let meta_fields = extractor.end(supplied_title);

        self.phase = Phase::Ended { temp_path, size: written, uris, internal_hash, meta_fields };
        Ok(())
    }

    /// Hard-link the temp blob into its canonical path (component A
    /// commit). Only valid in `Ended`; transitions to `Filed`.
    pub async fn add_file(&mut self, blobs: &BlobStore) -> Result<()> {
        if !matches!(self.phase, Phase::Ended { .. }) {
            return Err(EfsError::InvalidState("add_file is only valid in Ended"));
        }
        let Phase::Ended { temp_path, size, uris, internal_hash, meta_fields } =
            std::mem::replace(&mut self.phase, Phase::Stored)
        else {
            unreachable!("checked above")
        };

        blobs.link(&temp_path, &internal_hash, size).await.map_err(blob_err)?;
        self.phase = Phase::Filed { size, uris, internal_hash, meta_fields };
        Ok(())
    }

    /// Pull loop: read from `reader` in chunks and `write` them until
    /// end-of-stream, then automatically call `end`. Only valid in `Open`.
    pub async fn write_from<R: AsyncRead + Unpin>(
        &mut self,
        blobs: &BlobStore,
        mut reader: R,
        supplied_title: Option<&str>,
    ) -> Result<()> {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).await.map_err(EfsError::Io)?;
            if n == 0 {
                break;
            }
            self.write(&buf[..n]).await?;
        }
        self.end(blobs, supplied_title).await
    }

    /// Unlink the temp file if one is still outstanding (`Open`/`Ended`)
    /// and release all buffers. A no-op once the blob has been linked into
    /// place (`Filed`/`Stored`): the blob is content-addressed garbage at
    /// worst, never a dangling reference.
    pub async fn abort(self, blobs: &BlobStore) {
        match self.phase {
            Phase::Open { temp_path, .. } | Phase::Ended { temp_path, .. } => {
                blobs.abort(&temp_path).await;
            }
            Phase::Filed { .. } | Phase::Stored => {}
        }
    }

    /// The user that owns this submission.
    #[must_use]
    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// The declared MIME type this submission was opened with.
    #[must_use]
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    /// The primary (element 0) content URI, once `end` has run.
    #[must_use]
    pub fn primary_uri(&self) -> Option<&ContentUri> {
        self.uris().and_then(|u| u.first())
    }

    /// The full content URI list, once `end` has run.
    #[must_use]
    pub fn uris(&self) -> Option<&[ContentUri]> {
        match &self.phase {
            Phase::Ended { uris, .. } | Phase::Filed { uris, .. } => Some(uris),
            _ => None,
        }
    }

    /// The internal hash, once `end` has run.
    #[must_use]
    pub fn internal_hash(&self) -> Option<&str> {
        match &self.phase {
            Phase::Ended { internal_hash, .. } | Phase::Filed { internal_hash, .. } => Some(internal_hash),
            _ => None,
        }
    }

    /// The number of bytes written, once `end` has run.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        match &self.phase {
            Phase::Ended { size, .. } | Phase::Filed { size, .. } => Some(*size),
            _ => None,
        }
    }

    /// True once `add_file` has committed this submission's blob.
    #[must_use]
    pub fn is_filed(&self) -> bool {
        matches!(self.phase, Phase::Filed { .. })
    }

    /// Take the extracted meta fields (if the declared type was supported),
    /// consuming them. Only meaningful once `add_file` has run.
    pub fn take_meta_fields(&mut self) -> Option<Map<String, Value>> {
        match &mut self.phase {
            Phase::Filed { meta_fields, .. } => meta_fields.take(),
            _ => None,
        }
    }
}

/// Render a meta-file body: the target URI, a blank line, then the
/// pretty-printed JSON field map.
fn build_meta_body(target_uri: &ContentUri, fields: &Map<String, Value>) -> Result<Vec<u8>> {
    let json = serde_json::to_string_pretty(&Value::Object(fields.clone()))
        .map_err(|e| EfsError::InvalidArgument(format!("meta json: {e}")))?;
    Ok(format!("{target_uri}\r\n\r\n{json}").into_bytes())
}

/// Stream `reader` through a primary submission and, if the declared type
/// produced meta fields, submit a second meta-file submission referencing
/// the primary's URI. The two submissions are independent objects
/// coordinated by this function rather than sharing mutable state; either
/// may fail independently, in which case all partial state for both is
/// cleaned up before the error is returned.
pub async fn quick_pair<R: AsyncRead + Unpin>(
    blobs: &BlobStore,
    user_id: u64,
    declared_type: impl Into<String>,
    reader: R,
    title: Option<&str>,
) -> Result<(Submission, Option<Submission>)> {
    let mut primary = Submission::begin(blobs, user_id, declared_type).await?;
    if let Err(e) = primary.write_from(blobs, reader, title).await {
        primary.abort(blobs).await;
        return Err(e);
    }
    if let Err(e) = primary.add_file(blobs).await {
        primary.abort(blobs).await;
        return Err(e);
    }

    let Some(fields) = primary.take_meta_fields() else {
        return Ok((primary, None));
    };

    let primary_uri = primary.primary_uri().expect("filed submission has a primary uri").clone();
    let body = build_meta_body(&primary_uri, &fields)?;

    let mut meta = Submission::begin(blobs, user_id, meta_type::META_TYPE).await?;
    if let Err(e) = meta.write(&body).await {
        meta.abort(blobs).await;
        return Err(e);
    }
    if let Err(e) = meta.end(blobs, None).await {
        meta.abort(blobs).await;
        return Err(e);
    }
    if let Err(e) = meta.add_file(blobs).await {
        meta.abort(blobs).await;
        return Err(e);
    }

    Ok((primary, Some(meta)))
}
