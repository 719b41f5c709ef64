// crates/transfer-mesh-core/src/runtime/storage.rs
// ============================================================================
// Module: Transfer Mesh Local Storage
// Description: Staging files, final placement, and chunked file access.
// Purpose: Keep received bytes out of the catalog until they are verified.
// Dependencies: crate::core, tokio
// ============================================================================

//! ## Overview
//! Incoming content is written to a staging file under
//! `<storage_dir>/.staging` and only renamed into
//! `<storage_dir>/<block key>/<lfn path>` after its digest matches. The block
//! key is a short digest of the dataset and block names so arbitrary names
//! map to one safe directory component. Logical file names containing `..`
//! are rejected.
//!
//! Physical file names read back out of the catalog are served only after
//! [`LocalStorage::confine`] resolves them to a regular file under the root,
//! outside the staging directory. Upload staging files are keyed by sender and
//! digest so concurrent pushes of one file do not share a staging file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::SeekFrom;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tokio::fs::File;
use tokio::fs::OpenOptions;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncSeekExt;
use tokio::io::AsyncWriteExt;

use crate::core::ContentHasher;
use crate::core::FileKey;
use crate::core::hash_bytes;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed chunk size for downloads and uploads.
pub const CHUNK_SIZE_BYTES: u64 = 1024 * 1024;

/// Directory holding staging files, relative to the storage root.
const STAGING_DIR: &str = ".staging";

/// Hex digits of the block digest used as the block directory name.
const BLOCK_KEY_LEN: usize = 16;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Local storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Logical file name cannot be mapped to a safe path.
    #[error("invalid storage path: {0}")]
    InvalidPath(String),
    /// Physical file name resolves outside the storage root.
    #[error("path is outside local storage: {0}")]
    OutsideRoot(String),
    /// Physical file name does not exist.
    #[error("file not found: {0}")]
    NotFound(String),
    /// Filesystem operation failed.
    #[error("storage io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// ============================================================================
// SECTION: Local Storage
// ============================================================================

/// Storage root for files held by this agent.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    /// Root directory.
    root: PathBuf,
}

impl LocalStorage {
    /// Opens storage at `root`, creating the root and staging directories.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the directories cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(root.join(STAGING_DIR))?;
        Ok(Self { root })
    }

    /// Returns the storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory name used for a dataset/block pair.
    #[must_use]
    pub fn block_key(dataset: &str, block: &str) -> String {
        let digest = hash_bytes(format!("{dataset}\u{0}{block}").as_bytes());
        digest.chars().take(BLOCK_KEY_LEN).collect()
    }

    /// Returns the final location for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidPath`] when the lfn escapes its block
    /// directory or has no usable components.
    pub fn final_path(&self, key: &FileKey) -> Result<PathBuf, StorageError> {
        let mut path = self.root.join(Self::block_key(&key.dataset, &key.block));
        let mut pushed = false;
        for component in Path::new(&key.lfn).components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    pushed = true;
                }
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidPath(key.lfn.clone()));
                }
            }
        }
        if !pushed {
            return Err(StorageError::InvalidPath(key.lfn.clone()));
        }
        Ok(path)
    }

    /// Resolves a cataloged physical file name to a regular file under the
    /// storage root.
    ///
    /// Symlinks and `..` components are resolved before the containment check,
    /// and files inside the staging directory are refused.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] when `pfn` does not exist,
    /// [`StorageError::OutsideRoot`] when it resolves outside the root or into
    /// staging, and [`StorageError::Io`] for other filesystem failures.
    pub async fn confine(&self, pfn: &str) -> Result<PathBuf, StorageError> {
        let root = tokio::fs::canonicalize(&self.root).await?;
        let resolved = match tokio::fs::canonicalize(pfn).await {
            Ok(path) => path,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(pfn.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        if !resolved.starts_with(&root) || resolved.starts_with(root.join(STAGING_DIR)) {
            return Err(StorageError::OutsideRoot(pfn.to_string()));
        }
        if !tokio::fs::metadata(&resolved).await?.is_file() {
            return Err(StorageError::OutsideRoot(pfn.to_string()));
        }
        Ok(resolved)
    }

    /// Returns the staging file used for `key` by the transfer role `role`.
    #[must_use]
    pub fn staging_path(&self, key: &FileKey, role: &str) -> PathBuf {
        let name = hash_bytes(
            format!("{}\u{0}{}\u{0}{}\u{0}{role}", key.dataset, key.block, key.lfn).as_bytes(),
        );
        self.root.join(STAGING_DIR).join(format!("{name}.part"))
    }

    /// Returns the staging file for an upload of `key` from `sender` carrying
    /// the complete-file digest `hash`.
    #[must_use]
    pub fn upload_staging_path(&self, key: &FileKey, sender: &str, hash: &str) -> PathBuf {
        self.staging_path(key, &format!("upload\u{0}{sender}\u{0}{hash}"))
    }

    /// Creates (or truncates) a staging file and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the file cannot be created.
    pub async fn create_staging(
        &self,
        key: &FileKey,
        role: &str,
    ) -> Result<(PathBuf, File), StorageError> {
        let path = self.staging_path(key, role);
        let file = File::create(&path).await?;
        Ok((path, file))
    }

    /// Writes `data` at `offset` of the file at `path`.
    ///
    /// Writing at offset zero truncates any previous content.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the write fails.
    pub async fn write_at(path: &Path, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(offset == 0)
            .open(path)
            .await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    /// Reads at most `length` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the file cannot be read.
    pub async fn read_chunk(
        path: &Path,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, StorageError> {
        let mut file = File::open(path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buffer = Vec::new();
        file.take(length).read_to_end(&mut buffer).await?;
        Ok(buffer)
    }

    /// Hashes the file at `path`, returning `(digest, bytes)`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the file cannot be read.
    pub async fn hash_file(path: &Path) -> Result<(String, u64), StorageError> {
        let mut file = File::open(path).await?;
        let mut hasher = ContentHasher::new();
        let mut buffer = vec![0_u8; 64 * 1024];
        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        let bytes = hasher.bytes();
        Ok((hasher.finalize(), bytes))
    }

    /// Moves a verified staging file to `target`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the rename fails.
    pub async fn commit(staging: &Path, target: &Path) -> Result<(), StorageError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(staging, target).await?;
        Ok(())
    }

    /// Removes a staging file, ignoring files that no longer exist.
    pub async fn discard(staging: &Path) {
        if let Err(err) = tokio::fs::remove_file(staging).await
            && err.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                path = %staging.display(),
                error = %err,
                "failed to remove staging file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Unit tests unwrap known-good values.")]

    use super::LocalStorage;
    use super::StorageError;
    use crate::core::FileKey;

    fn key(lfn: &str) -> FileKey {
        FileKey {
            dataset: "/a/b/c".to_string(),
            block: "/a/b/c#1".to_string(),
            lfn: lfn.to_string(),
        }
    }

    #[test]
    fn final_path_nests_lfn_under_block_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path()).unwrap();
        let path = storage.final_path(&key("/store/file.root")).unwrap();
        let block = LocalStorage::block_key("/a/b/c", "/a/b/c#1");
        assert_eq!(block.len(), 16);
        assert_eq!(path, dir.path().join(block).join("store").join("file.root"));
    }

    #[tokio::test]
    async fn confine_accepts_only_files_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path().join("store")).unwrap();
        let inside = storage.root().join("held.root");
        std::fs::write(&inside, b"held").unwrap();
        let secret = dir.path().join("secret.txt");
        std::fs::write(&secret, b"secret").unwrap();

        let resolved = storage.confine(&inside.to_string_lossy()).await.unwrap();
        assert_eq!(resolved, std::fs::canonicalize(&inside).unwrap());

        let outside = storage.confine(&secret.to_string_lossy()).await.unwrap_err();
        assert!(matches!(outside, StorageError::OutsideRoot(_)));
        let dotted = storage.root().join("..").join("secret.txt");
        let dotted = storage.confine(&dotted.to_string_lossy()).await.unwrap_err();
        assert!(matches!(dotted, StorageError::OutsideRoot(_)));
        let root = storage.confine(&storage.root().to_string_lossy()).await.unwrap_err();
        assert!(matches!(root, StorageError::OutsideRoot(_)));
        let missing = storage.root().join("missing.root");
        let missing = storage.confine(&missing.to_string_lossy()).await.unwrap_err();
        assert!(matches!(missing, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn confine_refuses_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path()).unwrap();
        let staging = storage.staging_path(&key("/store/f"), "pull");
        std::fs::write(&staging, b"partial").unwrap();
        let err = storage.confine(&staging.to_string_lossy()).await.unwrap_err();
        assert!(matches!(err, StorageError::OutsideRoot(_)));
    }

    #[test]
    fn upload_staging_is_keyed_by_sender_and_digest() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path()).unwrap();
        let file = key("/store/f");
        let first = storage.upload_staging_path(&file, "site-a", "aa");
        assert_ne!(first, storage.upload_staging_path(&file, "site-b", "aa"));
        assert_ne!(first, storage.upload_staging_path(&file, "site-a", "bb"));
        assert_ne!(first, storage.staging_path(&file, "pull"));
        assert_eq!(first, storage.upload_staging_path(&file, "site-a", "aa"));
    }

    #[test]
    fn final_path_rejects_parent_components() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path()).unwrap();
        assert!(storage.final_path(&key("../etc/passwd")).is_err());
        assert!(storage.final_path(&key("/")).is_err());
    }

    #[tokio::test]
    async fn write_at_then_read_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunked");
        LocalStorage::write_at(&path, 0, b"hello ").await.unwrap();
        LocalStorage::write_at(&path, 6, b"world").await.unwrap();
        let chunk = LocalStorage::read_chunk(&path, 3, 5).await.unwrap();
        assert_eq!(chunk, b"lo wo");
        let (digest, bytes) = LocalStorage::hash_file(&path).await.unwrap();
        assert_eq!(bytes, 11);
        assert_eq!(digest, crate::core::hash_bytes(b"hello world"));
    }
}
