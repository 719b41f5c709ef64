// crates/transfer-mesh-core/src/runtime/executor.rs
// ============================================================================
// Module: Transfer Mesh Executor
// Description: Per-job transfer state machine with bounded retries.
// Purpose: Resolve, fetch, verify, store, and commit files between agents.
// Dependencies: crate::{core, interfaces, runtime}, async-trait, rand, tokio
// ============================================================================

//! ## Overview
//! [`TransferExecutor`] runs one dispatcher job. When the destination is this
//! agent it pulls: resolve the source alias, list the source's matching
//! records, then for each file fetch fixed-size chunks into a staging file,
//! verify the digest, rename into place, and commit to the local catalog.
//! When the source is this agent and the destination is remote it pushes the
//! local files to the destination's upload endpoint instead.
//!
//! Per-file retries use exponential backoff with jitter. Permanent failures
//! (unknown alias, no source entries, malformed request, 4xx answers) stop
//! immediately; transient ones (timeouts, 5xx, digest mismatch) are retried
//! up to the attempt ceiling.
//!
//! A cataloged row is never rewritten: when this agent already holds a file
//! under the same `(dataset, block, lfn)` with a different digest, pull and
//! upload ingestion both fail with [`TransferError::CatalogConflict`] and
//! leave the stored file untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::CatalogEntry;
use crate::core::ChunkRequest;
use crate::core::ContentHasher;
use crate::core::FileKey;
use crate::core::TransferRequest;
use crate::core::UploadAck;
use crate::core::UploadChunk;
use crate::interfaces::AgentClient;
use crate::interfaces::CatalogError;
use crate::interfaces::ClientError;
use crate::runtime::catalog::SharedCatalog;
use crate::runtime::catalog::add_blocking;
use crate::runtime::catalog::records_blocking;
use crate::runtime::mesh::Mesh;
use crate::runtime::mesh::MeshError;
use crate::runtime::storage::CHUNK_SIZE_BYTES;
use crate::runtime::storage::LocalStorage;
use crate::runtime::storage::StorageError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Transfer failures, classified as transient or permanent.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Request is malformed or routes nowhere.
    #[error("invalid transfer request: {0}")]
    InvalidRequest(String),
    /// Alias is not in the membership table.
    #[error("unknown agent alias: {0}")]
    UnknownAgent(String),
    /// Source holds no entries matching the filter.
    #[error("no source entries match {0}")]
    NoSourceEntries(String),
    /// Remote agent call failed.
    #[error(transparent)]
    Remote(#[from] ClientError),
    /// Received content does not match the advertised digest.
    #[error("hash mismatch for {lfn}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Logical file name.
        lfn: String,
        /// Advertised digest.
        expected: String,
        /// Computed digest.
        actual: String,
    },
    /// Received content size does not match the advertised size.
    #[error("size mismatch for {lfn}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Logical file name.
        lfn: String,
        /// Advertised size.
        expected: u64,
        /// Received size.
        actual: u64,
    },
    /// Local catalog already holds the file with a different digest.
    #[error("catalog already holds {lfn} with digest {held}; refusing digest {offered}")]
    CatalogConflict {
        /// Logical file name.
        lfn: String,
        /// Digest of the cataloged copy.
        held: String,
        /// Digest of the incoming copy.
        offered: String,
    },
    /// Destination did not confirm a completed upload.
    #[error("upload of {0} was not confirmed by the destination")]
    Unconfirmed(String),
    /// Local storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Local catalog failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl TransferError {
    /// Returns true when the failure may clear on retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::InvalidRequest(_)
            | Self::UnknownAgent(_)
            | Self::NoSourceEntries(_)
            | Self::CatalogConflict { .. } => false,
            Self::Remote(err) => err.is_transient(),
            Self::HashMismatch { .. } | Self::SizeMismatch { .. } | Self::Unconfirmed(_) => true,
            Self::Storage(err) => matches!(err, StorageError::Io(_)),
            Self::Catalog(err) => matches!(err, CatalogError::Db(_) | CatalogError::Io(_)),
        }
    }
}

impl From<MeshError> for TransferError {
    fn from(err: MeshError) -> Self {
        match err {
            MeshError::UnknownAlias(alias) => Self::UnknownAgent(alias),
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// What the local catalog holds for one incoming file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LocalCopy {
    /// No row for the file.
    Absent,
    /// A row with the incoming digest.
    Same,
    /// A row with another digest.
    Conflict(String),
}

impl LocalCopy {
    /// Returns true when the file is already held, or a conflict error for
    /// `lfn` offered with digest `offered`.
    fn into_held(self, lfn: &str, offered: &str) -> Result<bool, TransferError> {
        match self {
            Self::Absent => Ok(false),
            Self::Same => Ok(true),
            Self::Conflict(held) => Err(TransferError::CatalogConflict {
                lfn: lfn.to_string(),
                held,
                offered: offered.to_string(),
            }),
        }
    }
}

/// Summary of a successful job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Files transferred.
    pub files: u64,
    /// Files skipped because the destination already held them.
    pub skipped: u64,
    /// Bytes transferred.
    pub bytes: u64,
    /// Attempts consumed by the last file.
    pub attempts: u32,
}

/// Failed job with the progress made before the failure.
#[derive(Debug, Error)]
#[error("{error} (after {attempts} attempts)")]
pub struct TransferFailure {
    /// Final error.
    pub error: TransferError,
    /// Attempts consumed by the failing step.
    pub attempts: u32,
    /// Progress made before the failure.
    pub partial: TransferReport,
}

/// Strategy executed by dispatcher workers.
#[async_trait]
pub trait TransferHandler: Send + Sync {
    /// Executes one transfer request to completion.
    ///
    /// # Errors
    ///
    /// Returns [`TransferFailure`] on permanent failure or exhausted retries.
    async fn execute(&self, request: &TransferRequest) -> Result<TransferReport, TransferFailure>;
}

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt ceiling, including the first attempt.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub backoff_base: Duration,
    /// Upper bound for any delay.
    pub backoff_max: Duration,
    /// Adds up to 25% random jitter when true.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Returns the un-jittered delay after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1_u32 << exponent;
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }

    /// Returns the delay after `attempt`, with jitter when enabled.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let ceiling = u64::try_from(base.as_millis() / 4).unwrap_or(u64::MAX);
        let extra = rand::thread_rng().gen_range(0..=ceiling);
        base.saturating_add(Duration::from_millis(extra))
    }

    /// Runs `op` until it succeeds, fails permanently, or exhausts attempts.
    ///
    /// Returns the value with the attempts consumed, or the last error with
    /// the attempts consumed.
    ///
    /// # Errors
    ///
    /// Returns the final [`TransferError`] and the attempt count.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        mut op: F,
    ) -> Result<(T, u32), (TransferError, u32)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransferError>>,
    {
        let ceiling = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(err) if err.is_transient() && attempt < ceiling => {
                    let delay = self.delay(attempt);
                    warn!(
                        step = label,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient transfer failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err((err, attempt)),
            }
        }
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Transfer executor bound to one agent's mesh, catalog, and storage.
#[derive(Clone)]
pub struct TransferExecutor {
    /// Membership table for alias resolution.
    mesh: Arc<Mesh>,
    /// Local catalog.
    catalog: SharedCatalog,
    /// Client for remote agents.
    client: Arc<dyn AgentClient>,
    /// Local storage root.
    storage: LocalStorage,
    /// Retry policy applied per file.
    policy: RetryPolicy,
}

impl TransferExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(
        mesh: Arc<Mesh>,
        catalog: SharedCatalog,
        client: Arc<dyn AgentClient>,
        storage: LocalStorage,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            mesh,
            catalog,
            client,
            storage,
            policy,
        }
    }

    /// Returns the local storage handle.
    #[must_use]
    pub const fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Pulls matching files from `src` into this agent.
    async fn pull(&self, request: &TransferRequest) -> Result<TransferReport, TransferFailure> {
        let mut report = TransferReport::default();
        let source_url =
            self.mesh.resolve(&request.src).map_err(|err| failure(err.into(), 1, &report))?;
        let filter = request.catalog_filter();
        let client = self.client.as_ref();
        let source = source_url.as_str();
        let filter_ref = &filter;
        let (entries, _) = self
            .policy
            .run("list-source", move |_| async move {
                Ok(client.records(source, filter_ref).await?)
            })
            .await
            .map_err(|(err, attempts)| failure(err, attempts, &report))?;
        if entries.is_empty() {
            return Err(failure(
                TransferError::NoSourceEntries(filter.to_string()),
                1,
                &report,
            ));
        }

        for entry in entries {
            let held = self
                .local_copy(&entry.key(), &entry.hash)
                .await
                .and_then(|copy| copy.into_held(&entry.lfn, &entry.hash))
                .map_err(|err| failure(err, 1, &report))?;
            if held {
                debug!(lfn = %entry.lfn, "file already held locally; skipping");
                report.skipped += 1;
                continue;
            }
            let entry_ref = &entry;
            let (bytes, attempts) = self
                .policy
                .run("pull-file", move |attempt| self.pull_file(source, entry_ref, attempt))
                .await
                .map_err(|(err, attempts)| failure(err, attempts, &report))?;
            report.files += 1;
            report.bytes += bytes;
            report.attempts = attempts;
        }
        Ok(report)
    }

    /// Looks up the local catalog row for `key` against the digest `hash`.
    async fn local_copy(&self, key: &FileKey, hash: &str) -> Result<LocalCopy, TransferError> {
        let local = records_blocking(&self.catalog, key.as_filter()).await?;
        if local.iter().any(|held| held.hash == hash) {
            return Ok(LocalCopy::Same);
        }
        Ok(local
            .into_iter()
            .next()
            .map_or(LocalCopy::Absent, |held| LocalCopy::Conflict(held.hash)))
    }

    /// Fetches, verifies, stores, and commits one file.
    async fn pull_file(
        &self,
        source_url: &str,
        entry: &CatalogEntry,
        attempt: u32,
    ) -> Result<u64, TransferError> {
        let key = entry.key();
        let expected = u64::try_from(entry.bytes)
            .map_err(|_| {
                TransferError::InvalidRequest(format!("negative size for {}", entry.lfn))
            })?;
        let target = self.storage.final_path(&key)?;
        let (staging, mut file) = self.storage.create_staging(&key, "pull").await?;
        debug!(lfn = %entry.lfn, attempt, bytes = expected, "fetching file");

        let fetched: Result<(), TransferError> = async {
            let mut hasher = ContentHasher::new();
            let mut offset = 0_u64;
            while offset < expected {
                let length = CHUNK_SIZE_BYTES.min(expected - offset);
                let request = ChunkRequest::new(&key, offset, length);
                let chunk = self.client.fetch_chunk(source_url, &request).await?;
                if chunk.is_empty() {
                    return Err(TransferError::SizeMismatch {
                        lfn: entry.lfn.clone(),
                        expected,
                        actual: offset,
                    });
                }
                hasher.update(&chunk);
                file.write_all(&chunk).await.map_err(StorageError::from)?;
                offset += chunk.len() as u64;
            }
            file.flush().await.map_err(StorageError::from)?;
            if offset != expected {
                return Err(TransferError::SizeMismatch {
                    lfn: entry.lfn.clone(),
                    expected,
                    actual: offset,
                });
            }
            let actual = hasher.finalize();
            if actual != entry.hash {
                return Err(TransferError::HashMismatch {
                    lfn: entry.lfn.clone(),
                    expected: entry.hash.clone(),
                    actual,
                });
            }
            Ok(())
        }
        .await;
        drop(file);
        if let Err(err) = fetched {
            LocalStorage::discard(&staging).await;
            return Err(err);
        }

        let held = self
            .local_copy(&key, &entry.hash)
            .await
            .and_then(|copy| copy.into_held(&entry.lfn, &entry.hash));
        match held {
            Ok(false) => {}
            Ok(true) => {
                LocalStorage::discard(&staging).await;
                debug!(lfn = %entry.lfn, "file cataloged during fetch; keeping stored copy");
                return Ok(expected);
            }
            Err(err) => {
                LocalStorage::discard(&staging).await;
                return Err(err);
            }
        }
        if let Err(err) = LocalStorage::commit(&staging, &target).await {
            LocalStorage::discard(&staging).await;
            return Err(err.into());
        }
        let local = CatalogEntry {
            pfn: target.to_string_lossy().into_owned(),
            ..entry.clone()
        };
        add_blocking(&self.catalog, local).await?;
        info!(lfn = %entry.lfn, dataset = %entry.dataset, bytes = expected, "file transferred");
        Ok(expected)
    }

    /// Pushes matching local files to the remote `dst`.
    async fn push(&self, request: &TransferRequest) -> Result<TransferReport, TransferFailure> {
        let mut report = TransferReport::default();
        let dest_url =
            self.mesh.resolve(&request.dst).map_err(|err| failure(err.into(), 1, &report))?;
        let filter = request.catalog_filter();
        let entries = records_blocking(&self.catalog, filter.clone())
            .await
            .map_err(|err| failure(err.into(), 1, &report))?;
        if entries.is_empty() {
            return Err(failure(
                TransferError::NoSourceEntries(filter.to_string()),
                1,
                &report,
            ));
        }
        for entry in entries {
            let entry_ref = &entry;
            let dest = dest_url.as_str();
            let (bytes, attempts) = self
                .policy
                .run("push-file", move |_| self.push_file(dest, entry_ref))
                .await
                .map_err(|(err, attempts)| failure(err, attempts, &report))?;
            report.files += 1;
            report.bytes += bytes;
            report.attempts = attempts;
        }
        Ok(report)
    }

    /// Uploads one local file in fixed-size chunks.
    async fn push_file(&self, dest_url: &str, entry: &CatalogEntry) -> Result<u64, TransferError> {
        let total = u64::try_from(entry.bytes)
            .map_err(|_| {
                TransferError::InvalidRequest(format!("negative size for {}", entry.lfn))
            })?;
        let path = self.storage.confine(&entry.pfn).await?;
        let sender = &self.mesh.local().alias;
        let mut offset = 0_u64;
        loop {
            let length = CHUNK_SIZE_BYTES.min(total - offset);
            let body = LocalStorage::read_chunk(&path, offset, length).await?;
            if (body.len() as u64) != length {
                return Err(TransferError::SizeMismatch {
                    lfn: entry.lfn.clone(),
                    expected: total,
                    actual: offset + body.len() as u64,
                });
            }
            let chunk = UploadChunk::for_entry(entry, offset).with_sender(sender);
            let ack = self.client.upload_chunk(dest_url, &chunk, Bytes::from(body)).await?;
            offset += length;
            if ack.complete {
                info!(lfn = %entry.lfn, bytes = total, "file pushed");
                return Ok(total);
            }
            if offset >= total {
                return Err(TransferError::Unconfirmed(entry.lfn.clone()));
            }
        }
    }

    /// Stages one uploaded chunk; verifies, stores, and commits on the last.
    ///
    /// A file already cataloged with the same digest is acknowledged as
    /// complete without staging the body.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::HashMismatch`] or
    /// [`TransferError::SizeMismatch`] when the completed file fails
    /// verification, [`TransferError::CatalogConflict`] when the file is
    /// already cataloged with another digest, and
    /// [`TransferError::InvalidRequest`] for ranges outside the advertised
    /// size.
    pub async fn receive_chunk(
        &self,
        chunk: &UploadChunk,
        body: &[u8],
    ) -> Result<UploadAck, TransferError> {
        let end = chunk.offset.saturating_add(body.len() as u64);
        if end > chunk.bytes {
            return Err(TransferError::InvalidRequest(format!(
                "chunk ending at {end} exceeds advertised size {}",
                chunk.bytes
            )));
        }
        let key = chunk.key();
        let target = self.storage.final_path(&key)?;
        let staging = self.storage.upload_staging_path(&key, &chunk.sender, &chunk.hash);
        if chunk.offset == 0 || end == chunk.bytes {
            let copy = self.local_copy(&key, &chunk.hash).await?;
            let held = match copy.into_held(&chunk.lfn, &chunk.hash) {
                Ok(held) => held,
                Err(err) => {
                    LocalStorage::discard(&staging).await;
                    warn!(lfn = %chunk.lfn, sender = %chunk.sender, error = %err, "upload refused");
                    return Err(err);
                }
            };
            if held {
                LocalStorage::discard(&staging).await;
                debug!(lfn = %chunk.lfn, sender = %chunk.sender, "upload already held");
                return Ok(UploadAck {
                    received: chunk.bytes,
                    complete: true,
                });
            }
        }
        LocalStorage::write_at(&staging, chunk.offset, body).await?;
        if end < chunk.bytes {
            return Ok(UploadAck {
                received: end,
                complete: false,
            });
        }

        let (actual, bytes) = LocalStorage::hash_file(&staging).await?;
        if bytes != chunk.bytes {
            LocalStorage::discard(&staging).await;
            return Err(TransferError::SizeMismatch {
                lfn: chunk.lfn.clone(),
                expected: chunk.bytes,
                actual: bytes,
            });
        }
        if actual != chunk.hash {
            LocalStorage::discard(&staging).await;
            warn!(lfn = %chunk.lfn, "uploaded file failed verification");
            return Err(TransferError::HashMismatch {
                lfn: chunk.lfn.clone(),
                expected: chunk.hash.clone(),
                actual,
            });
        }
        LocalStorage::commit(&staging, &target).await?;
        let entry = CatalogEntry {
            lfn: chunk.lfn.clone(),
            pfn: target.to_string_lossy().into_owned(),
            dataset: chunk.dataset.clone(),
            block: chunk.block.clone(),
            bytes: i64::try_from(chunk.bytes)
                .map_err(|_| TransferError::InvalidRequest("file too large".to_string()))?,
            hash: actual,
        };
        add_blocking(&self.catalog, entry).await?;
        info!(lfn = %chunk.lfn, bytes = chunk.bytes, "uploaded file committed");
        Ok(UploadAck {
            received: end,
            complete: true,
        })
    }
}

#[async_trait]
impl TransferHandler for TransferExecutor {
    async fn execute(&self, request: &TransferRequest) -> Result<TransferReport, TransferFailure> {
        let src_local = self.mesh.is_local(&request.src);
        let dst_local = request.dst.is_empty() || self.mesh.is_local(&request.dst);
        match (src_local, dst_local) {
            (false, true) => self.pull(request).await,
            (true, false) => self.push(request).await,
            (true, true) => Err(failure(
                TransferError::InvalidRequest(
                    "source and destination are both this agent".to_string(),
                ),
                1,
                &TransferReport::default(),
            )),
            (false, false) => Err(failure(
                TransferError::InvalidRequest("source and destination are both remote".to_string()),
                1,
                &TransferReport::default(),
            )),
        }
    }
}

/// Wraps an error with the attempts consumed and progress so far.
fn failure(error: TransferError, attempts: u32, partial: &TransferReport) -> TransferFailure {
    TransferFailure {
        error,
        attempts,
        partial: partial.clone(),
    }
}
