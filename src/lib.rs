// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Restory - Kubernetes Backup Restore Engine
//!
//! Restory is a high-performance restore orchestration engine written in Rust
//! that reconstitutes Kubernetes cluster state from object-storage-resident
//! backup archives, with conflict resolution, pre-flight validation, and
//! disaster-recovery presets.
//!
//! ## Overview
//!
//! This library provides the core functionality for the Restory engine,
//! including:
//!
//! - Restore operation lifecycle management with cancellation and history
//! - Pre-flight validation of cluster access, RBAC, and API compatibility
//! - Per-kind three-way merging of backup resources against live state
//! - Backup archive decoding (gzip-compressed tar of multi-document YAML)
//!
//! ## Modules
//!
//! - [`engine`] - Restore operation lifecycle, registry, and workers
//! - [`validation`] - Pre-flight checks and scored reports
//! - [`merge`] - Per-kind conflict resolution
//! - [`backup`] - Object storage access and archive decoding
//! - [`api`] - HTTP surface with the uniform response envelope
//!
//! ## Example
//!
//! ```rust,no_run
//! use restory::types::{ConflictStrategy, RestoreRequest};
//!
//! // Describe a restore of one namespace with conservative merging
//! let request = RestoreRequest {
//!     backup_id: "daily-2026-07-31".to_string(),
//!     cluster_name: "prod-east".to_string(),
//!     target_namespaces: vec!["shop".to_string()],
//!     conflict_strategy: ConflictStrategy::Merge,
//!     ..RestoreRequest::default()
//! };
//! ```
//!
//! ## Features
//!
//! - **Concurrent Operations** - Each restore runs on its own worker task
//! - **Conflict Strategies** - Skip, overwrite, merge, or fail per request
//! - **Dry Run** - Full read/validate/merge pass with zero writes
//! - **Bounded History** - Finished operations retained with FIFO eviction

pub mod api;
pub mod backup;
pub mod cluster;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod merge;
pub mod metrics;
pub mod retry;
pub mod selector;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;
