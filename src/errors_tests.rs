// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the error taxonomy.

use super::*;

#[test]
fn test_http_status_mapping() {
    let cases: Vec<(EngineError, u16)> = vec![
        (
            RequestError::MissingField {
                field: "backupId".to_string(),
            }
            .into(),
            400,
        ),
        (
            SecurityError::Denied {
                reason: "nope".to_string(),
            }
            .into(),
            401,
        ),
        (
            EngineError::DuplicateRestore {
                restore_id: "r-1".to_string(),
            },
            409,
        ),
        (
            EngineError::NotFound {
                restore_id: "r-1".to_string(),
            },
            404,
        ),
        (
            StorageError::BackupNotFound {
                cluster_name: "c".to_string(),
                backup_id: "b".to_string(),
            }
            .into(),
            404,
        ),
        (
            StorageError::ArchiveCorrupt {
                key: "c/b.tar.gz".to_string(),
                reason: "bad gzip".to_string(),
            }
            .into(),
            500,
        ),
        (EngineError::Internal("boom".to_string()), 500),
    ];

    for (err, expected) in cases {
        assert_eq!(err.http_status(), expected, "{err}");
    }
}

#[test]
fn test_error_codes_are_stable() {
    assert_eq!(
        EngineError::DuplicateRestore {
            restore_id: "r".to_string()
        }
        .error_code(),
        "conflict"
    );
    assert_eq!(
        EngineError::NotFound {
            restore_id: "r".to_string()
        }
        .error_code(),
        "not_found"
    );
    assert_eq!(
        EngineError::from(StorageError::BackupNotFound {
            cluster_name: "c".to_string(),
            backup_id: "b".to_string(),
        })
        .error_code(),
        "backup_not_found"
    );
    assert_eq!(EngineError::Cancelled.error_code(), "cancelled");
}

#[test]
fn test_cluster_error_transience() {
    assert!(ClusterError::Unreachable {
        reason: "refused".to_string()
    }
    .is_transient());
    assert!(ClusterError::Api {
        code: 503,
        reason: "unavailable".to_string()
    }
    .is_transient());
    assert!(ClusterError::Api {
        code: 429,
        reason: "throttled".to_string()
    }
    .is_transient());

    assert!(!ClusterError::Api {
        code: 403,
        reason: "forbidden".to_string()
    }
    .is_transient());
    assert!(!ClusterError::Api {
        code: 404,
        reason: "missing".to_string()
    }
    .is_transient());
    assert!(!ClusterError::DiscoveryFailed {
        api_version: "v9".to_string(),
        kind: "Widget".to_string(),
        reason: "unknown".to_string()
    }
    .is_transient());
}

#[test]
fn test_kube_error_conversion() {
    let err = kube::Error::Api(Box::new(kube::error::ErrorResponse {
        status: Some(kube::core::response::StatusSummary::Failure),
        message: "deployments.apps \"web\" not found".to_string(),
        reason: "NotFound".to_string(),
        code: 404,
        metadata: None,
        details: None,
    }));

    let converted = ClusterError::from(err);
    match converted {
        ClusterError::Api { code, ref reason } => {
            assert_eq!(code, 404);
            assert!(reason.contains("not found"));
        }
        ref other => panic!("expected Api variant, got {other:?}"),
    }
    assert!(!converted.is_transient());
}

#[test]
fn test_error_messages_carry_context() {
    let err = EngineError::from(StorageError::BackupNotFound {
        cluster_name: "prod-east".to_string(),
        backup_id: "daily-42".to_string(),
    });
    let message = err.to_string();
    assert!(message.contains("prod-east"));
    assert!(message.contains("daily-42"));
}
