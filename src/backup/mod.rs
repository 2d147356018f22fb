// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backup object storage access.
//!
//! Backups live in an S3-compatible blob store addressed by key. This module
//! keeps the engine decoupled from any concrete store through the
//! [`ObjectStore`] trait and layers the backup addressing scheme
//! (`{cluster_name}/{backup_id}.tar.gz`) plus archive decoding on top via
//! [`BackupStore`]. A filesystem-rooted implementation covers development and
//! on-prem volume mounts; cloud stores plug in behind the same trait.

pub mod archive;

use crate::constants::{BACKUP_ARCHIVE_EXTENSION, BACKUP_ARCHIVE_EXTENSION_SHORT};
use crate::errors::StorageError;
use crate::types::{BackupManifest, BackupResource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Byte blob store addressed by key.
///
/// Implementations must be safe for concurrent use; one instance is shared
/// across every active restore operation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the object at `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Whether an object exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Keys under `prefix`, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Filesystem-rooted [`ObjectStore`].
///
/// Keys map to paths under the root directory. Keys containing `..` segments
/// are rejected.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsObjectStore { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        if relative
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(StorageError::Io {
                key: key.to_string(),
                reason: "key must not contain parent-directory segments".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::Io {
                    key: key.to_string(),
                    reason: "object not found".to_string(),
                }
            } else {
                StorageError::Io {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            }
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    let key = relative.to_string_lossy().replace('\\', "/");
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// A decoded backup: the manifest plus resources in archive order.
#[derive(Clone, Debug)]
pub struct BackupArchive {
    /// Parsed manifest, absent when the archive does not carry one
    pub manifest: Option<BackupManifest>,
    /// Resources in the order they appear in the archive
    pub resources: Vec<BackupResource>,
}

/// Identity of a backup discovered in storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    /// Source cluster name (first key segment)
    pub cluster_name: String,
    /// Backup identifier (file stem)
    pub backup_id: String,
    /// Full object storage key
    pub key: String,
}

/// Outcome of validating a stored backup without restoring it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupValidation {
    /// Whether the archive decoded cleanly with a usable manifest
    pub valid: bool,
    /// Problems that make the backup unusable
    pub errors: Vec<String>,
    /// Problems worth surfacing that do not block a restore
    pub warnings: Vec<String>,
    /// Number of resource documents in the archive
    pub resource_count: usize,
}

/// Backup addressing and archive decoding over an [`ObjectStore`].
pub struct BackupStore {
    store: Arc<dyn ObjectStore>,
}

impl BackupStore {
    /// Wrap an object store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        BackupStore { store }
    }

    /// Resolve the storage key for a backup, trying both archive extensions.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BackupNotFound`] when neither key exists.
    pub async fn resolve_key(
        &self,
        cluster_name: &str,
        backup_id: &str,
    ) -> Result<String, StorageError> {
        for ext in [BACKUP_ARCHIVE_EXTENSION, BACKUP_ARCHIVE_EXTENSION_SHORT] {
            let key = format!("{cluster_name}/{backup_id}.{ext}");
            if self.store.exists(&key).await? {
                return Ok(key);
            }
        }
        Err(StorageError::BackupNotFound {
            cluster_name: cluster_name.to_string(),
            backup_id: backup_id.to_string(),
        })
    }

    /// Fetch and decode a backup archive.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BackupNotFound`] when the archive is absent and
    /// [`StorageError::ArchiveCorrupt`] when it does not decode.
    pub async fn load_archive(
        &self,
        cluster_name: &str,
        backup_id: &str,
    ) -> Result<BackupArchive, StorageError> {
        let key = self.resolve_key(cluster_name, backup_id).await?;
        let bytes = self.store.get(&key).await?;
        debug!(key = %key, size = bytes.len(), "Fetched backup archive");
        archive::decode_archive(&bytes, &key)
    }

    /// Fetch only the manifest of a backup.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ManifestInvalid`] when the archive carries no
    /// parseable manifest.
    pub async fn load_manifest(
        &self,
        cluster_name: &str,
        backup_id: &str,
    ) -> Result<BackupManifest, StorageError> {
        let key = self.resolve_key(cluster_name, backup_id).await?;
        let archive = self.load_archive(cluster_name, backup_id).await?;
        archive.manifest.ok_or_else(|| StorageError::ManifestInvalid {
            key,
            reason: "archive carries no backup-manifest.yaml".to_string(),
        })
    }

    /// Whether a backup archive exists in storage.
    pub async fn backup_exists(
        &self,
        cluster_name: &str,
        backup_id: &str,
    ) -> Result<bool, StorageError> {
        Ok(self.resolve_key(cluster_name, backup_id).await.is_ok())
    }

    /// Enumerate all backups, optionally constrained to one cluster.
    pub async fn list_backups(
        &self,
        cluster_name: Option<&str>,
    ) -> Result<Vec<BackupInfo>, StorageError> {
        let prefix = cluster_name.map(|c| format!("{c}/")).unwrap_or_default();
        let keys = self.store.list(&prefix).await?;
        Ok(keys.iter().filter_map(|key| parse_backup_key(key)).collect())
    }

    /// Validate a stored backup without restoring it.
    ///
    /// Checks that the archive decodes, the manifest parses, and the resource
    /// files match the manifest's file list.
    pub async fn validate_backup(
        &self,
        cluster_name: &str,
        backup_id: &str,
    ) -> Result<BackupValidation, StorageError> {
        let archive = match self.load_archive(cluster_name, backup_id).await {
            Ok(archive) => archive,
            Err(err) => {
                return Ok(BackupValidation {
                    valid: false,
                    errors: vec![err.to_string()],
                    warnings: Vec::new(),
                    resource_count: 0,
                });
            }
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        match &archive.manifest {
            Some(manifest) => {
                let declared: u64 = manifest.resource_counts.values().sum();
                let actual = archive.resources.len() as u64;
                if declared != 0 && declared != actual {
                    warnings.push(format!(
                        "manifest declares {declared} resources, archive contains {actual}"
                    ));
                }
            }
            None => errors.push("archive carries no backup-manifest.yaml".to_string()),
        }

        if archive.resources.is_empty() {
            warnings.push("archive contains no resources".to_string());
        }

        Ok(BackupValidation {
            valid: errors.is_empty(),
            errors,
            warnings,
            resource_count: archive.resources.len(),
        })
    }
}

/// Split a storage key into backup identity; ignores non-archive keys.
fn parse_backup_key(key: &str) -> Option<BackupInfo> {
    let (cluster_name, file) = key.split_once('/')?;
    let backup_id = file
        .strip_suffix(&format!(".{BACKUP_ARCHIVE_EXTENSION}"))
        .or_else(|| file.strip_suffix(&format!(".{BACKUP_ARCHIVE_EXTENSION_SHORT}")))?;
    if cluster_name.is_empty() || backup_id.is_empty() {
        return None;
    }
    Some(BackupInfo {
        cluster_name: cluster_name.to_string(),
        backup_id: backup_id.to_string(),
        key: key.to_string(),
    })
}
