//! Structured observability hooks for deployment lifecycle events.
//!
//! This module provides:
//! - A deployment-scoped tracing span via [`DeploySpan`]
//! - Emission functions for key lifecycle events: deploy start, phase start,
//!   per-item outcome, phase finish/skip, deploy finish
//!
//! Events carry an `event` field so JSON log pipelines can filter on it.
//! For JSON output, pass `--json` (or set `DEPLOY_LOG_JSON=true`).

use tracing::{debug, info, warn, Instrument, Span};

use crate::batch::{Phase, PhaseOutcome};

/// Deployment-scoped span, tagged with the deployment id.
///
/// The span is attached to futures with [`DeploySpan::wrap`] rather
/// than entered, so it stays correct across `.await` points and is inherited
/// by spawned item tasks.
///
/// # Example
///
/// ```ignore
/// let span = DeploySpan::new("0b6f...");
/// span.wrap(async { /* every log line carries deployment_id */ }).await;
/// ```
#[derive(Debug, Clone)]
pub struct DeploySpan {
    span: Span,
}

impl DeploySpan {
    pub fn new(deployment_id: &str) -> Self {
        Self {
            span: tracing::info_span!("lambda_deploy.run", deployment_id = %deployment_id),
        }
    }

    /// Run `future` inside the deployment span.
    pub fn wrap<F>(&self, future: F) -> tracing::instrument::Instrumented<F>
    where
        F: std::future::Future,
    {
        future.instrument(self.span.clone())
    }
}

/// Emit event: deployment started.
pub fn emit_deploy_started(function_count: usize, publish: bool, alias_name: Option<&str>) {
    info!(
        event = "deploy.started",
        functions = function_count,
        publish = publish,
        alias = alias_name.unwrap_or(""),
        "Deploying {} functions",
        function_count
    );
}

/// Emit event: a phase started. Logs the `[n/3]` progress line.
pub fn emit_phase_started(phase: Phase, description: &str) {
    info!(
        event = "phase.started",
        phase = %phase,
        "[{}/3] {}",
        phase.index(),
        description
    );
}

/// Emit event: one item of a phase succeeded (debug level; the update
/// client logs the human-readable line).
pub fn emit_item_succeeded(phase: Phase, function_name: &str, detail: Option<&str>) {
    debug!(
        event = "item.succeeded",
        phase = %phase,
        function = %function_name,
        version = detail.unwrap_or(""),
    );
}

/// Emit event: one item of a phase failed (warning level).
pub fn emit_item_failed(phase: Phase, function_name: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "item.failed",
        phase = %phase,
        function = %function_name,
        error = %error,
        "✗ Failed to update {} for {}: {}",
        phase,
        function_name,
        error
    );
}

/// Emit event: a phase finished with its counts.
pub fn emit_phase_finished(outcome: &PhaseOutcome) {
    info!(
        event = "phase.finished",
        phase = %outcome.phase,
        succeeded = outcome.succeeded_count(),
        failed = outcome.failed_count(),
        total = outcome.total(),
    );
}

/// Emit event: a phase was skipped.
pub fn emit_phase_skipped(phase: Phase, reason: &str) {
    info!(
        event = "phase.skipped",
        phase = %phase,
        "[{}/3] Skipping {} update ({})",
        phase.index(),
        phase,
        reason
    );
}

/// Emit event: deployment finished with duration and success status.
pub fn emit_deploy_finished(duration_ms: u64, success: bool, failure: Option<&str>) {
    if success {
        info!(
            event = "deploy.finished",
            duration_ms = duration_ms,
            success = true,
            "✓ Deployment completed successfully"
        );
    } else {
        tracing::error!(
            event = "deploy.finished",
            duration_ms = duration_ms,
            success = false,
            "✗ Deployment failed: {}",
            failure.unwrap_or("unknown error")
        );
    }
}
