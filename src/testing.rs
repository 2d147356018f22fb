// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory fakes shared by unit tests.
//!
//! [`FakeCluster`] implements [`ClusterApi`] over hash maps and records every
//! write so tests can assert, for example, that a dry run issued zero writes.
//! [`MemoryObjectStore`] implements [`ObjectStore`] over a map of byte blobs.

use crate::backup::{BackupStore, ObjectStore};
use crate::cluster::{ClusterApi, NodeInfo, ResourceRef, StorageClassInfo};
use crate::errors::{ClusterError, StorageError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Identity key for live objects in the fake cluster.
pub(crate) type ObjectKey = (String, Option<String>, String);

fn object_key(resource: &ResourceRef) -> ObjectKey {
    (
        resource.kind.clone(),
        resource.namespace.clone(),
        resource.name.clone(),
    )
}

/// In-memory [`ClusterApi`] with write auditing and error injection.
pub(crate) struct FakeCluster {
    pub namespaces: Vec<String>,
    pub nodes: Vec<NodeInfo>,
    pub server_version: String,
    pub api_versions: Vec<String>,
    /// apiVersion/kind pairs the fake cluster serves
    pub available_apis: Vec<(String, String)>,
    /// (verb, resource) pairs the fake authorizer denies
    pub denied_permissions: Vec<(String, String)>,
    pub storage_classes: Vec<StorageClassInfo>,
    /// When set, every call fails as if the API server were gone
    pub unreachable: bool,
    /// Artificial latency per get, for cancellation-timing tests
    pub get_delay: Option<std::time::Duration>,
    /// Names whose create/update fails with the given HTTP code
    pub failing_writes: HashMap<String, u16>,
    /// Live objects keyed by (kind, namespace, name)
    pub objects: Mutex<HashMap<ObjectKey, Value>>,
    /// Audit log of write operations, e.g. `create Deployment shop/web`
    pub writes: Mutex<Vec<String>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        let serves = [
            ("v1", "Namespace"),
            ("v1", "Pod"),
            ("v1", "Service"),
            ("v1", "ConfigMap"),
            ("v1", "Secret"),
            ("v1", "PersistentVolumeClaim"),
            ("apps/v1", "Deployment"),
            ("networking.k8s.io/v1", "Ingress"),
            ("apiextensions.k8s.io/v1", "CustomResourceDefinition"),
        ];
        FakeCluster {
            namespaces: vec!["default".to_string(), "kube-system".to_string()],
            nodes: vec![NodeInfo {
                name: "node-1".to_string(),
                provider_id: None,
            }],
            server_version: "v1.31.0".to_string(),
            api_versions: vec!["v1".to_string(), "apps/v1".to_string()],
            available_apis: serves
                .iter()
                .map(|(v, k)| ((*v).to_string(), (*k).to_string()))
                .collect(),
            denied_permissions: Vec::new(),
            storage_classes: vec![StorageClassInfo {
                name: "standard".to_string(),
                is_default: true,
            }],
            unreachable: false,
            get_delay: None,
            failing_writes: HashMap::new(),
            objects: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Seed a live object.
    pub fn put_object(&self, kind: &str, namespace: Option<&str>, name: &str, value: Value) {
        self.objects.lock().unwrap().insert(
            (
                kind.to_string(),
                namespace.map(String::from),
                name.to_string(),
            ),
            value,
        );
    }

    /// All recorded write operations.
    pub fn recorded_writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn check_reachable(&self) -> Result<(), ClusterError> {
        if self.unreachable {
            Err(ClusterError::Unreachable {
                reason: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn check_write(&self, name: &str) -> Result<(), ClusterError> {
        if let Some(code) = self.failing_writes.get(name) {
            return Err(ClusterError::Api {
                code: *code,
                reason: format!("injected failure for '{name}'"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn server_version(&self) -> Result<String, ClusterError> {
        self.check_reachable()?;
        Ok(self.server_version.clone())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        self.check_reachable()?;
        Ok(self.namespaces.clone())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, ClusterError> {
        self.check_reachable()?;
        Ok(self.nodes.clone())
    }

    async fn preferred_api_versions(&self) -> Result<Vec<String>, ClusterError> {
        self.check_reachable()?;
        Ok(self.api_versions.clone())
    }

    async fn has_api(&self, api_version: &str, kind: &str) -> Result<bool, ClusterError> {
        self.check_reachable()?;
        Ok(self
            .available_apis
            .iter()
            .any(|(v, k)| v == api_version && k == kind))
    }

    async fn allowed(
        &self,
        verb: &str,
        resource: &str,
        _namespace: Option<&str>,
    ) -> Result<bool, ClusterError> {
        self.check_reachable()?;
        Ok(!self
            .denied_permissions
            .iter()
            .any(|(v, r)| v == verb && r == resource))
    }

    async fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>, ClusterError> {
        self.check_reachable()?;
        Ok(self.storage_classes.clone())
    }

    async fn get_resource(&self, resource: &ResourceRef) -> Result<Option<Value>, ClusterError> {
        self.check_reachable()?;
        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&object_key(resource))
            .cloned())
    }

    async fn create_resource(
        &self,
        resource: &ResourceRef,
        manifest: &Value,
    ) -> Result<(), ClusterError> {
        self.check_reachable()?;
        self.check_write(&resource.name)?;
        self.writes.lock().unwrap().push(format!(
            "create {} {}/{}",
            resource.kind,
            resource.namespace.as_deref().unwrap_or("-"),
            resource.name
        ));
        self.objects
            .lock()
            .unwrap()
            .insert(object_key(resource), manifest.clone());
        Ok(())
    }

    async fn update_resource(
        &self,
        resource: &ResourceRef,
        manifest: &Value,
    ) -> Result<(), ClusterError> {
        self.check_reachable()?;
        self.check_write(&resource.name)?;
        self.writes.lock().unwrap().push(format!(
            "update {} {}/{}",
            resource.kind,
            resource.namespace.as_deref().unwrap_or("-"),
            resource.name
        ));
        self.objects
            .lock()
            .unwrap()
            .insert(object_key(resource), manifest.clone());
        Ok(())
    }
}

/// In-memory [`ObjectStore`].
pub(crate) struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        MemoryObjectStore {
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn put(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::Io {
                key: key.to_string(),
                reason: "object not found".to_string(),
            })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Build a backup store containing one archive for `cluster/backup_id`.
pub(crate) fn backup_store_with_archive(
    cluster: &str,
    backup_id: &str,
    bytes: Vec<u8>,
) -> Arc<BackupStore> {
    let store = MemoryObjectStore::new();
    store.put(&format!("{cluster}/{backup_id}.tar.gz"), bytes);
    Arc::new(BackupStore::new(Arc::new(store)))
}

/// Build an empty backup store.
pub(crate) fn empty_backup_store() -> Arc<BackupStore> {
    Arc::new(BackupStore::new(Arc::new(MemoryObjectStore::new())))
}

/// Serialize JSON resource documents into a multi-document YAML stream.
pub(crate) fn yaml_stream(documents: &[Value]) -> String {
    documents
        .iter()
        .map(|doc| serde_yaml::to_string(doc).unwrap())
        .collect::<Vec<_>>()
        .join("---\n")
}
