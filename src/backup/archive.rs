// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backup archive decoding.
//!
//! A backup archive is a gzip-compressed tar containing one multi-document
//! YAML stream per resource kind (`deployments.yaml`, `services.yaml`, ...)
//! plus `backup-manifest.yaml`. Every resource document must carry
//! `apiVersion`, `kind`, and `metadata.name`; `metadata.namespace` is
//! optional. Server-managed fields may appear in older archives and are
//! tolerated here - the merge layer ignores them.

use crate::constants::BACKUP_MANIFEST_FILE;
use crate::errors::StorageError;
use crate::types::{BackupManifest, BackupResource};
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use tracing::{debug, warn};

use super::BackupArchive;

/// Decode a gzip-compressed tar archive into manifest and resources.
///
/// Resources keep archive order: file order in the tar, document order within
/// each file. Backups are expected to serialize resources in a
/// dependency-respecting order (namespaces before namespaced resources, CRDs
/// before their instances), so this order is also the apply order.
///
/// # Arguments
///
/// * `bytes` - Raw archive bytes from object storage
/// * `key` - Storage key, used in error context
///
/// # Errors
///
/// Returns [`StorageError::ArchiveCorrupt`] when the archive, a resource
/// file, or a document does not decode.
pub fn decode_archive(bytes: &[u8], key: &str) -> Result<BackupArchive, StorageError> {
    let decoder = GzDecoder::new(bytes);
    let mut tar = tar::Archive::new(decoder);

    let mut manifest = None;
    let mut resources = Vec::new();

    let entries = tar.entries().map_err(|e| StorageError::ArchiveCorrupt {
        key: key.to_string(),
        reason: format!("not a gzip-compressed tar archive: {e}"),
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| StorageError::ArchiveCorrupt {
            key: key.to_string(),
            reason: format!("unreadable archive entry: {e}"),
        })?;

        let path = entry
            .path()
            .map(|p| p.to_string_lossy().into_owned())
            .map_err(|e| StorageError::ArchiveCorrupt {
                key: key.to_string(),
                reason: format!("archive entry has no path: {e}"),
            })?;

        let file_name = path.rsplit('/').next().unwrap_or(&path).to_string();
        if !file_name.ends_with(".yaml") && !file_name.ends_with(".yml") {
            debug!(key = %key, file = %path, "Skipping non-YAML archive entry");
            continue;
        }

        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|e| StorageError::ArchiveCorrupt {
                key: key.to_string(),
                reason: format!("entry '{path}' is not valid UTF-8: {e}"),
            })?;

        if file_name == BACKUP_MANIFEST_FILE {
            manifest = Some(parse_manifest(&text, key)?);
        } else {
            decode_documents(&text, &path, key, &mut resources)?;
        }
    }

    if manifest.is_none() {
        warn!(key = %key, "Backup archive carries no manifest");
    }

    Ok(BackupArchive {
        manifest,
        resources,
    })
}

/// Parse the backup manifest document.
fn parse_manifest(text: &str, key: &str) -> Result<BackupManifest, StorageError> {
    serde_yaml::from_str(text).map_err(|e| StorageError::ManifestInvalid {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Decode one multi-document YAML stream into backup resources.
fn decode_documents(
    text: &str,
    file: &str,
    key: &str,
    out: &mut Vec<BackupResource>,
) -> Result<(), StorageError> {
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document).map_err(|e| StorageError::ArchiveCorrupt {
            key: key.to_string(),
            reason: format!("'{file}' contains a malformed document: {e}"),
        })?;

        // empty documents between separators are legal
        if value.is_null() {
            continue;
        }

        out.push(resource_from_document(value, file, key)?);
    }
    Ok(())
}

/// Lift one decoded document into a [`BackupResource`].
fn resource_from_document(
    value: Value,
    file: &str,
    key: &str,
) -> Result<BackupResource, StorageError> {
    let corrupt = |reason: String| StorageError::ArchiveCorrupt {
        key: key.to_string(),
        reason,
    };

    let api_version = value
        .get("apiVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| corrupt(format!("document in '{file}' is missing apiVersion")))?
        .to_string();
    let kind = value
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| corrupt(format!("document in '{file}' is missing kind")))?
        .to_string();
    let name = value
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .ok_or_else(|| corrupt(format!("{kind} document in '{file}' is missing metadata.name")))?
        .to_string();
    let namespace = value
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    Ok(BackupResource {
        api_version,
        kind,
        namespace,
        name,
        content: value,
        metadata: BTreeMap::new(),
    })
}

#[cfg(test)]
#[path = "archive_tests.rs"]
pub(crate) mod archive_tests;
