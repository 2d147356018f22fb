// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end engine tests over the in-memory fakes.

use super::{EngineConfig, RestoreEngine, SecurityPolicy};
use crate::backup::archive::archive_tests::build_archive;
use crate::backup::BackupStore;
use crate::errors::{EngineError, SecurityError};
use crate::merge::ConflictResolver;
use crate::testing::{backup_store_with_archive, yaml_stream, FakeCluster};
use crate::types::{
    ConflictStrategy, RestoreMode, RestoreRequest, RestoreStatus, ValidationMode,
};
use crate::validation::Validator;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const CLUSTER: &str = "prod-east";
const BACKUP: &str = "daily-1";

fn web_stack_archive() -> Vec<u8> {
    let deployments = yaml_stream(&[json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": "web", "namespace": "shop"},
        "spec": {"replicas": 1}
    })]);
    let services = yaml_stream(&[json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": "web", "namespace": "shop"},
        "spec": {"ports": [{"port": 80, "protocol": "TCP"}]}
    })]);
    let configmaps = yaml_stream(&[json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": "cfg", "namespace": "shop"},
        "data": {"key": "value"}
    })]);
    build_archive(&[
        (
            "backup-manifest.yaml",
            "clusterName: prod-east\nresourceCounts:\n  Deployment: 1\n  Service: 1\n  ConfigMap: 1\n",
        ),
        ("deployments.yaml", deployments.as_str()),
        ("services.yaml", services.as_str()),
        ("configmaps.yaml", configmaps.as_str()),
    ])
}

fn engine_with(cluster: Arc<FakeCluster>, backups: Arc<BackupStore>) -> Arc<RestoreEngine> {
    let validator = Arc::new(Validator::new(
        Arc::clone(&cluster) as Arc<dyn crate::cluster::ClusterApi>,
        Arc::clone(&backups),
    ));
    RestoreEngine::new(cluster, backups, validator)
}

fn request(strategy: ConflictStrategy) -> RestoreRequest {
    RestoreRequest {
        restore_id: "r-1".to_string(),
        backup_id: BACKUP.to_string(),
        cluster_name: CLUSTER.to_string(),
        conflict_strategy: strategy,
        validation_mode: ValidationMode::Skip,
        ..RestoreRequest::default()
    }
}

/// Wait until the operation leaves the registry and shows up in history.
async fn wait_finished(engine: &Arc<RestoreEngine>, restore_id: &str) -> crate::types::RestoreRecord {
    for _ in 0..200 {
        if let Some(record) = engine
            .history(Some(100))
            .await
            .into_iter()
            .find(|r| r.restore_id == restore_id)
        {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("operation '{restore_id}' never reached history");
}

#[tokio::test]
async fn test_clean_create_into_empty_namespace() {
    let cluster = Arc::new(FakeCluster::new());
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let engine = engine_with(Arc::clone(&cluster), backups);

    let view = engine
        .start_restore(request(ConflictStrategy::Overwrite))
        .await
        .unwrap();
    assert_eq!(view.status, RestoreStatus::Pending);

    let record = wait_finished(&engine, "r-1").await;
    assert_eq!(record.status, RestoreStatus::Completed);
    assert_eq!(record.summary.processed, 3);
    assert_eq!(record.summary.successful, 3);
    assert!((record.summary.success_rate - 100.0).abs() < 1e-9);

    let writes = cluster.recorded_writes();
    assert_eq!(writes.len(), 3);
    assert!(writes.iter().all(|w| w.starts_with("create ")));

    // terminal operations leave the active registry
    assert!(engine.restore_status("r-1").await.is_err());
    assert!(engine.list_active().await.is_empty());
}

#[tokio::test]
async fn test_dry_run_issues_no_writes() {
    let cluster = Arc::new(FakeCluster::new());
    // one resource already exists so update paths are exercised too
    cluster.put_object(
        "ConfigMap",
        Some("shop"),
        "cfg",
        json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cfg"}, "data": {}}),
    );
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let engine = engine_with(Arc::clone(&cluster), backups);

    let mut req = request(ConflictStrategy::Overwrite);
    req.dry_run = true;
    engine.start_restore(req).await.unwrap();

    let record = wait_finished(&engine, "r-1").await;
    assert_eq!(record.status, RestoreStatus::Completed);
    assert_eq!(record.summary.successful, 3);
    assert!(
        cluster.recorded_writes().is_empty(),
        "dry run must not write: {:?}",
        cluster.recorded_writes()
    );
}

#[tokio::test]
async fn test_skip_strategy_skips_every_conflict() {
    let cluster = Arc::new(FakeCluster::new());
    for (kind, name) in [("Deployment", "web"), ("Service", "web"), ("ConfigMap", "cfg")] {
        cluster.put_object(
            kind,
            Some("shop"),
            name,
            json!({"apiVersion": "v1", "kind": kind, "metadata": {"name": name}}),
        );
    }
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let engine = engine_with(Arc::clone(&cluster), backups);

    engine
        .start_restore(request(ConflictStrategy::Skip))
        .await
        .unwrap();

    let record = wait_finished(&engine, "r-1").await;
    assert_eq!(record.status, RestoreStatus::Completed);
    assert_eq!(record.summary.skipped, 3);
    assert_eq!(record.summary.successful, 0);
    assert!(cluster.recorded_writes().is_empty());
}

#[tokio::test]
async fn test_fail_strategy_stops_at_first_conflict() {
    let cluster = Arc::new(FakeCluster::new());
    cluster.put_object(
        "Deployment",
        Some("shop"),
        "web",
        json!({"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "web"}}),
    );
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let engine = engine_with(Arc::clone(&cluster), backups);

    engine
        .start_restore(request(ConflictStrategy::Fail))
        .await
        .unwrap();

    let record = wait_finished(&engine, "r-1").await;
    assert_eq!(record.status, RestoreStatus::Failed);
    // the deployment is first in backup order, so nothing else was processed
    assert_eq!(record.summary.processed, 1);
}

#[tokio::test]
async fn test_merge_preserves_live_replica_count() {
    let cluster = Arc::new(FakeCluster::new());
    cluster.put_object(
        "Deployment",
        Some("shop"),
        "web",
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "namespace": "shop"},
            "spec": {"replicas": 5}
        }),
    );
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let engine = engine_with(Arc::clone(&cluster), backups);

    engine
        .start_restore(request(ConflictStrategy::Merge))
        .await
        .unwrap();

    let record = wait_finished(&engine, "r-1").await;
    assert_eq!(record.status, RestoreStatus::Completed);

    let live = cluster
        .objects
        .lock()
        .unwrap()
        .get(&(
            "Deployment".to_string(),
            Some("shop".to_string()),
            "web".to_string(),
        ))
        .cloned()
        .unwrap();
    assert_eq!(live.pointer("/spec/replicas"), Some(&json!(5)));
}

#[tokio::test]
async fn test_immutable_pvc_merge_is_recorded_as_failed() {
    let cluster = Arc::new(FakeCluster::new());
    cluster.put_object(
        "PersistentVolumeClaim",
        Some("shop"),
        "data",
        json!({
            "apiVersion": "v1",
            "kind": "PersistentVolumeClaim",
            "metadata": {"name": "data", "namespace": "shop"},
            "spec": {"storageClassName": "fast"}
        }),
    );
    let pvcs = yaml_stream(&[json!({
        "apiVersion": "v1",
        "kind": "PersistentVolumeClaim",
        "metadata": {"name": "data", "namespace": "shop"},
        "spec": {"storageClassName": "slow"}
    })]);
    let bytes = build_archive(&[("pvcs.yaml", pvcs.as_str())]);
    let backups = backup_store_with_archive(CLUSTER, BACKUP, bytes);
    let engine = engine_with(Arc::clone(&cluster), backups);

    engine
        .start_restore(request(ConflictStrategy::Merge))
        .await
        .unwrap();

    let handle = engine.operation("r-1").await;
    if let Some(op) = handle {
        op.wait_terminal().await;
    }
    let record = wait_finished(&engine, "r-1").await;
    assert_eq!(record.status, RestoreStatus::Completed);
    assert_eq!(record.summary.failed, 1);
    assert!(cluster.recorded_writes().is_empty());
}

#[tokio::test]
async fn test_empty_backup_completes_with_full_success_rate() {
    let cluster = Arc::new(FakeCluster::new());
    let bytes = build_archive(&[(
        "backup-manifest.yaml",
        "clusterName: prod-east\nresourceCounts: {}\n",
    )]);
    let backups = backup_store_with_archive(CLUSTER, BACKUP, bytes);
    let engine = engine_with(cluster, backups);

    engine
        .start_restore(request(ConflictStrategy::Overwrite))
        .await
        .unwrap();

    let record = wait_finished(&engine, "r-1").await;
    assert_eq!(record.status, RestoreStatus::Completed);
    assert_eq!(record.summary.processed, 0);
    assert!((record.summary.success_rate - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_strict_validation_refuses_removed_api() {
    let cluster = Arc::new(FakeCluster::new());
    let ingresses = yaml_stream(&[json!({
        "apiVersion": "extensions/v1beta1",
        "kind": "Ingress",
        "metadata": {"name": "web", "namespace": "shop"},
        "spec": {}
    })]);
    let bytes = build_archive(&[
        (
            "backup-manifest.yaml",
            "clusterName: prod-east\nresourceCounts:\n  Ingress: 1\n",
        ),
        ("ingresses.yaml", ingresses.as_str()),
    ]);
    let backups = backup_store_with_archive(CLUSTER, BACKUP, bytes);
    let engine = engine_with(Arc::clone(&cluster), backups);

    let mut req = request(ConflictStrategy::Overwrite);
    req.validation_mode = ValidationMode::Strict;
    engine.start_restore(req).await.unwrap();

    let record = wait_finished(&engine, "r-1").await;
    assert_eq!(record.status, RestoreStatus::Failed);
    // execution never started
    assert_eq!(record.summary.processed, 0);
    assert!(cluster.recorded_writes().is_empty());
}

#[tokio::test]
async fn test_validation_mode_runs_no_execution() {
    let cluster = Arc::new(FakeCluster::new());
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let engine = engine_with(Arc::clone(&cluster), backups);

    let mut req = request(ConflictStrategy::Overwrite);
    req.validation_mode = ValidationMode::Permissive;
    req.restore_mode = RestoreMode::Validation;
    engine.start_restore(req).await.unwrap();

    let record = wait_finished(&engine, "r-1").await;
    assert_eq!(record.status, RestoreStatus::Completed);
    assert_eq!(record.summary.processed, 0);
    assert!(cluster.recorded_writes().is_empty());
}

#[tokio::test]
async fn test_cancellation_mid_run() {
    let mut fake = FakeCluster::new();
    fake.get_delay = Some(Duration::from_millis(10));
    let cluster = Arc::new(fake);

    // a backup with many resources so cancellation lands mid-run
    let docs: Vec<serde_json::Value> = (0..100)
        .map(|i| {
            json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": {"name": format!("cfg-{i}"), "namespace": "shop"},
                "data": {}
            })
        })
        .collect();
    let configmaps = yaml_stream(&docs);
    let bytes = build_archive(&[("configmaps.yaml", configmaps.as_str())]);
    let backups = backup_store_with_archive(CLUSTER, BACKUP, bytes);
    let engine = engine_with(Arc::clone(&cluster), backups);

    engine
        .start_restore(request(ConflictStrategy::Overwrite))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.cancel_restore("r-1").await.unwrap();
    // cancelling twice is fine
    let second = engine.cancel_restore("r-1").await;
    assert!(second.is_ok());

    let record = wait_finished(&engine, "r-1").await;
    assert_eq!(record.status, RestoreStatus::Cancelled);
    assert!(record.summary.processed < 100, "worker should stop early");
    assert!(engine.list_active().await.is_empty());

    // cancel after completion stays idempotent
    assert!(engine.cancel_restore("r-1").await.is_ok());
}

#[tokio::test]
async fn test_duplicate_restore_id_is_refused() {
    let mut fake = FakeCluster::new();
    fake.get_delay = Some(Duration::from_millis(20));
    let cluster = Arc::new(fake);
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let engine = engine_with(cluster, backups);

    engine
        .start_restore(request(ConflictStrategy::Overwrite))
        .await
        .unwrap();
    let err = engine
        .start_restore(request(ConflictStrategy::Overwrite))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::DuplicateRestore { .. }));
    assert_eq!(err.http_status(), 409);
}

#[tokio::test]
async fn test_restore_id_generated_when_absent() {
    let cluster = Arc::new(FakeCluster::new());
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let engine = engine_with(cluster, backups);

    let mut req = request(ConflictStrategy::Overwrite);
    req.restore_id = String::new();
    let view = engine.start_restore(req).await.unwrap();

    assert!(view.request.restore_id.starts_with("restore-"));
    wait_finished(&engine, &view.request.restore_id).await;
}

#[tokio::test]
async fn test_missing_backup_id_is_rejected() {
    let cluster = Arc::new(FakeCluster::new());
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let engine = engine_with(cluster, backups);

    let mut req = request(ConflictStrategy::Overwrite);
    req.backup_id = String::new();
    let err = engine.start_restore(req).await.unwrap_err();

    assert!(matches!(err, EngineError::Request(_)));
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn test_unknown_backup_fails_operation() {
    let cluster = Arc::new(FakeCluster::new());
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let engine = engine_with(cluster, backups);

    let mut req = request(ConflictStrategy::Overwrite);
    req.backup_id = "absent".to_string();
    engine.start_restore(req).await.unwrap();

    let record = wait_finished(&engine, "r-1").await;
    assert_eq!(record.status, RestoreStatus::Failed);
}

#[tokio::test]
async fn test_write_failures_do_not_abort_the_run() {
    let mut fake = FakeCluster::new();
    // creates named 'web' fail with a 503, the rest succeed
    fake.failing_writes.insert("web".to_string(), 503);
    let cluster = Arc::new(fake);
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let engine = engine_with(Arc::clone(&cluster), backups);

    engine
        .start_restore(request(ConflictStrategy::Overwrite))
        .await
        .unwrap();

    let record = wait_finished(&engine, "r-1").await;
    assert_eq!(record.status, RestoreStatus::Completed);
    // Deployment/web and Service/web both hit the injected failure
    assert_eq!(record.summary.failed, 2);
    assert_eq!(record.summary.successful, 1);
    assert_eq!(
        record.summary.processed,
        record.summary.successful + record.summary.failed + record.summary.skipped
    );
}

#[tokio::test]
async fn test_history_is_bounded_and_most_recent_first() {
    let cluster = Arc::new(FakeCluster::new());
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let validator = Arc::new(Validator::new(
        Arc::clone(&cluster) as Arc<dyn crate::cluster::ClusterApi>,
        Arc::clone(&backups),
    ));
    let engine = RestoreEngine::with_options(
        cluster,
        backups,
        validator,
        ConflictResolver::default(),
        Arc::new(super::AllowAllPolicy),
        EngineConfig {
            history_retention: 2,
        },
    );

    for i in 0..3 {
        let mut req = request(ConflictStrategy::Overwrite);
        req.restore_id = format!("r-{i}");
        engine.start_restore(req).await.unwrap();
        wait_finished(&engine, &format!("r-{i}")).await;
    }

    let history = engine.history(None).await;
    assert_eq!(history.len(), 2, "history must evict beyond the bound");
    assert_eq!(history[0].restore_id, "r-2", "most recent first");
    assert_eq!(history[1].restore_id, "r-1");
}

struct DenyPolicy;

#[async_trait]
impl SecurityPolicy for DenyPolicy {
    async fn authorize(&self, _request: &RestoreRequest) -> Result<(), SecurityError> {
        Err(SecurityError::Denied {
            reason: "not on the allow list".to_string(),
        })
    }
}

#[tokio::test]
async fn test_security_policy_denial() {
    let cluster = Arc::new(FakeCluster::new());
    let backups = backup_store_with_archive(CLUSTER, BACKUP, web_stack_archive());
    let validator = Arc::new(Validator::new(
        Arc::clone(&cluster) as Arc<dyn crate::cluster::ClusterApi>,
        Arc::clone(&backups),
    ));
    let engine = RestoreEngine::with_options(
        cluster,
        backups,
        validator,
        ConflictResolver::default(),
        Arc::new(DenyPolicy),
        EngineConfig::default(),
    );

    let err = engine
        .start_restore(request(ConflictStrategy::Overwrite))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Security(_)));
    assert_eq!(err.http_status(), 401);
    assert!(engine.list_active().await.is_empty());
}
