//! Structured observability hooks for resolution and dataset lifecycle events.
//!
//! This module provides:
//! - Directory-scoped tracing spans via the `ResolutionSpan` RAII guard
//! - Emission functions for key events: collection, resolution start/finish,
//!   unresolved declarations, dataset assembly
//!
//! Events are emitted at `info!` level except unresolved declarations and
//! tenant ambiguity, which are `warn!`. Filter with `RUST_LOG`.

use std::path::Path;

use tracing::{info, warn};

/// RAII guard that enters a span tagged with the directory being resolved.
///
/// # Example
///
/// ```ignore
/// let _span = ResolutionSpan::enter(dir);
/// // every event below carries dir = "<path>"
/// ```
pub struct ResolutionSpan {
    _span: tracing::span::EnteredSpan,
}

impl ResolutionSpan {
    pub fn enter(dir: &Path) -> Self {
        let span = tracing::info_span!("genai_ops.resolve", dir = %dir.display());
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a directory was read and merged.
pub fn emit_directory_collected(dir: &Path, files: usize, declarations: usize, digest: &str) {
    info!(
        event = "collector.collected",
        dir = %dir.display(),
        files = files,
        declarations = declarations,
        digest = %digest,
    );
}

/// Emit event: fixpoint resolution started.
pub fn emit_resolution_started(env: &dyn std::fmt::Display, declarations: usize) {
    info!(
        event = "resolution.started",
        env = %env,
        declarations = declarations,
    );
}

/// Emit event: fixpoint resolution finished.
pub fn emit_resolution_finished(
    duration_ms: u64,
    iterations: usize,
    resolved: usize,
    unresolved: usize,
) {
    info!(
        event = "resolution.finished",
        duration_ms = duration_ms,
        iterations = iterations,
        resolved = resolved,
        unresolved = unresolved,
    );
}

/// Emit event: a declaration did not converge (warning level).
pub fn emit_declaration_unresolved(name: &str, origin: &Path, reason: &dyn std::fmt::Display) {
    warn!(
        event = "resolution.unresolved",
        name = %name,
        origin = %origin.display(),
        reason = %reason,
    );
}

/// Emit event: more than one ID of a tenant has catalog metadata (warning level).
pub fn emit_tenant_metadata_ambiguous(tenant: &str, chosen: &str, candidates: &[String]) {
    warn!(
        event = "tenants.ambiguous_metadata",
        tenant = %tenant,
        chosen = %chosen,
        candidates = ?candidates,
    );
}

/// Emit event: a dataset was assembled for an environment.
pub fn emit_dataset_loaded(
    env: &dyn std::fmt::Display,
    duration_ms: u64,
    gpu_pools: usize,
    tenants: usize,
    diagnostics: usize,
) {
    info!(
        event = "dataset.loaded",
        env = %env,
        duration_ms = duration_ms,
        gpu_pools = gpu_pools,
        tenants = tenants,
        diagnostics = diagnostics,
    );
}
