// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes access layer for the restore engine.
//!
//! The engine and validator consume the cluster through the [`ClusterApi`]
//! trait: typed list operations for validation probes, dynamic get/create/
//! update for applying arbitrary backup resources, discovery for resolving
//! group-version-kind triples, and self-subject-access-review for permission
//! probing. The production implementation wraps a shared [`kube::Client`];
//! tests substitute an in-memory fake.
//!
//! Dynamic resources are resolved through discovery (`pinned_kind`) so custom
//! plurals and subresource scoping come from the API server itself; the
//! guessed plural from the group-version-kind is only a fallback for kinds
//! discovery cannot resolve.

use crate::errors::ClusterError;
use crate::retry::{call_with_retry, RetryPolicy};
use async_trait::async_trait;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use k8s_openapi::api::core::v1::{Namespace, Node};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams, PostParams};
use kube::discovery::{pinned_kind, Scope};
use kube::{Client, ResourceExt};
use serde_json::Value;
use tracing::debug;

/// Annotation marking the cluster's default storage class
const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

/// Identity of a single resource to get, create, or update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRef {
    /// API version (e.g. `apps/v1`)
    pub api_version: String,
    /// Kind (e.g. `Deployment`)
    pub kind: String,
    /// Namespace, absent for cluster-scoped resources
    pub namespace: Option<String>,
    /// Resource name
    pub name: String,
}

/// Minimal node facts used for platform detection.
#[derive(Clone, Debug, Default)]
pub struct NodeInfo {
    /// Node name
    pub name: String,
    /// Cloud provider id (e.g. `aws:///us-east-1a/i-0abc`), when set
    pub provider_id: Option<String>,
}

/// A storage class and whether it is the cluster default.
#[derive(Clone, Debug)]
pub struct StorageClassInfo {
    /// Storage class name
    pub name: String,
    /// Whether the default-class annotation is set
    pub is_default: bool,
}

/// Narrow Kubernetes interface consumed by the engine and validator.
///
/// All implementations must be safe for concurrent use; one instance is
/// shared across every active restore operation.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// The API server's version string (e.g. `v1.31.2`).
    async fn server_version(&self) -> Result<String, ClusterError>;

    /// Names of all namespaces in the cluster.
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError>;

    /// Minimal facts about all nodes.
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, ClusterError>;

    /// Preferred API group-versions served by the cluster (e.g. `apps/v1`).
    async fn preferred_api_versions(&self) -> Result<Vec<String>, ClusterError>;

    /// Whether the cluster serves the given apiVersion/kind pair.
    async fn has_api(&self, api_version: &str, kind: &str) -> Result<bool, ClusterError>;

    /// Whether the current identity may perform `verb` on `resource`.
    async fn allowed(
        &self,
        verb: &str,
        resource: &str,
        namespace: Option<&str>,
    ) -> Result<bool, ClusterError>;

    /// All storage classes with their default-class marker.
    async fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>, ClusterError>;

    /// Fetch a resource, `None` when it does not exist.
    async fn get_resource(&self, resource: &ResourceRef) -> Result<Option<Value>, ClusterError>;

    /// Create a resource from its full document.
    async fn create_resource(
        &self,
        resource: &ResourceRef,
        manifest: &Value,
    ) -> Result<(), ClusterError>;

    /// Replace a resource with its full document.
    ///
    /// The manifest must carry the live `metadata.resourceVersion`.
    async fn update_resource(
        &self,
        resource: &ResourceRef,
        manifest: &Value,
    ) -> Result<(), ClusterError>;
}

/// Production [`ClusterApi`] backed by a shared [`kube::Client`].
///
/// Every call runs under the retry policy, so transient API errors are
/// absorbed at this boundary and the engine sees each failure once.
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
    retry: RetryPolicy,
}

impl KubeClusterApi {
    /// Wrap an initialized Kubernetes client with the default retry policy.
    #[must_use]
    pub fn new(client: Client) -> Self {
        KubeClusterApi {
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Wrap an initialized Kubernetes client with an explicit retry policy.
    #[must_use]
    pub fn with_retry_policy(client: Client, retry: RetryPolicy) -> Self {
        KubeClusterApi { client, retry }
    }

    /// Resolve the dynamic Api for a resource, consulting discovery first.
    ///
    /// Falls back to the plural guessed from the group-version-kind when the
    /// kind is absent from discovery, scoping by whether the reference
    /// carries a namespace.
    async fn dynamic_api(&self, resource: &ResourceRef) -> Result<Api<DynamicObject>, ClusterError> {
        let gvk = parse_gvk(&resource.api_version, &resource.kind);

        match pinned_kind(&self.client, &gvk).await {
            Ok((ar, caps)) => {
                let api = match caps.scope {
                    Scope::Namespaced => {
                        let ns = resource.namespace.as_deref().unwrap_or("default");
                        Api::namespaced_with(self.client.clone(), ns, &ar)
                    }
                    Scope::Cluster => Api::all_with(self.client.clone(), &ar),
                };
                Ok(api)
            }
            Err(err) => {
                debug!(
                    api_version = %resource.api_version,
                    kind = %resource.kind,
                    error = %err,
                    "Discovery could not resolve kind, falling back to guessed plural"
                );
                let ar = ApiResource::from_gvk(&gvk);
                let api = match resource.namespace.as_deref() {
                    Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
                    None => Api::all_with(self.client.clone(), &ar),
                };
                Ok(api)
            }
        }
    }
}

/// Split an `apiVersion` string into a [`GroupVersionKind`].
fn parse_gvk(api_version: &str, kind: &str) -> GroupVersionKind {
    match api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, kind),
        None => GroupVersionKind::gvk("", api_version, kind),
    }
}

/// Decode a manifest into a [`DynamicObject`] for the dynamic client.
fn to_dynamic_object(manifest: &Value) -> Result<DynamicObject, ClusterError> {
    serde_json::from_value(manifest.clone()).map_err(|e| ClusterError::Api {
        code: 400,
        reason: format!("manifest does not decode as a Kubernetes object: {e}"),
    })
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn server_version(&self) -> Result<String, ClusterError> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = call_with_retry(&self.retry, "list namespaces", || async {
            api.list(&ListParams::default()).await
        })
        .await?;
        Ok(namespaces.items.iter().map(ResourceExt::name_any).collect())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = call_with_retry(&self.retry, "list nodes", || async {
            api.list(&ListParams::default()).await
        })
        .await?;
        Ok(nodes
            .items
            .into_iter()
            .map(|node| NodeInfo {
                name: node.name_any(),
                provider_id: node.spec.and_then(|spec| spec.provider_id),
            })
            .collect())
    }

    async fn preferred_api_versions(&self) -> Result<Vec<String>, ClusterError> {
        let discovery = kube::Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(ClusterError::from)?;

        let mut versions = Vec::new();
        for group in discovery.groups() {
            let version = group.preferred_version_or_latest();
            if group.name().is_empty() {
                versions.push(version.to_string());
            } else {
                versions.push(format!("{}/{version}", group.name()));
            }
        }
        versions.sort();
        Ok(versions)
    }

    async fn has_api(&self, api_version: &str, kind: &str) -> Result<bool, ClusterError> {
        let gvk = parse_gvk(api_version, kind);
        match pinned_kind(&self.client, &gvk).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
            Err(kube::Error::Discovery(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn allowed(
        &self,
        verb: &str,
        resource: &str,
        namespace: Option<&str>,
    ) -> Result<bool, ClusterError> {
        let review = SelfSubjectAccessReview {
            metadata: Default::default(),
            spec: SelfSubjectAccessReviewSpec {
                resource_attributes: Some(ResourceAttributes {
                    verb: Some(verb.to_string()),
                    resource: Some(resource.to_string()),
                    namespace: namespace.map(String::from),
                    ..Default::default()
                }),
                ..Default::default()
            },
            status: None,
        };

        let api: Api<SelfSubjectAccessReview> = Api::all(self.client.clone());
        let created = call_with_retry(&self.retry, "self subject access review", || async {
            api.create(&PostParams::default(), &review).await
        })
        .await?;
        Ok(created.status.is_some_and(|status| status.allowed))
    }

    async fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>, ClusterError> {
        let api: Api<StorageClass> = Api::all(self.client.clone());
        let classes = call_with_retry(&self.retry, "list storage classes", || async {
            api.list(&ListParams::default()).await
        })
        .await?;
        Ok(classes
            .items
            .iter()
            .map(|class| StorageClassInfo {
                name: class.name_any(),
                is_default: class
                    .annotations()
                    .get(DEFAULT_CLASS_ANNOTATION)
                    .is_some_and(|v| v == "true"),
            })
            .collect())
    }

    async fn get_resource(&self, resource: &ResourceRef) -> Result<Option<Value>, ClusterError> {
        let api = self.dynamic_api(resource).await?;
        let object = call_with_retry(&self.retry, "get resource", || async {
            api.get_opt(&resource.name).await
        })
        .await?;
        match object {
            Some(object) => {
                let value = serde_json::to_value(&object).map_err(|e| ClusterError::Api {
                    code: 500,
                    reason: format!("live object does not serialize: {e}"),
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn create_resource(
        &self,
        resource: &ResourceRef,
        manifest: &Value,
    ) -> Result<(), ClusterError> {
        let api = self.dynamic_api(resource).await?;
        let object = to_dynamic_object(manifest)?;
        call_with_retry(&self.retry, "create resource", || async {
            api.create(&PostParams::default(), &object).await
        })
        .await?;
        Ok(())
    }

    async fn update_resource(
        &self,
        resource: &ResourceRef,
        manifest: &Value,
    ) -> Result<(), ClusterError> {
        let api = self.dynamic_api(resource).await?;
        let object = to_dynamic_object(manifest)?;
        call_with_retry(&self.retry, "update resource", || async {
            api.replace(&resource.name, &PostParams::default(), &object)
                .await
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod cluster_tests;
