//! Per-phase batch orchestration.
//!
//! [`run_batch`] applies one operation to every function spec concurrently
//! and always yields exactly one [`UpdateResult`] per spec: failures and
//! panicking tasks are recorded, never propagated out of the pool. The
//! all-fail-aborts / some-fail-continues decision is made afterwards by
//! [`PhaseOutcome::check_policy`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{error, warn, Instrument};

use crate::error::{DeployError, DeployResult};
use crate::function_spec::FunctionSpec;
use crate::obs;

/// The three ordered deployment phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Configuration,
    Code,
    Alias,
}

impl Phase {
    /// 1-based position, as shown in `[n/3]` progress lines.
    pub fn index(self) -> usize {
        match self {
            Phase::Configuration => 1,
            Phase::Code => 2,
            Phase::Alias => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Configuration => "configuration",
            Phase::Code => "code",
            Phase::Alias => "alias",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one operation against one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub function_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Version produced or targeted by the operation, when it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl UpdateResult {
    pub fn succeeded(function_name: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            function_name: function_name.into(),
            success: true,
            error: None,
            detail,
        }
    }

    pub fn failed(function_name: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            function_name: function_name.into(),
            success: false,
            error: Some(error.to_string()),
            detail: None,
        }
    }
}

/// Every item result of one phase, collected after the barrier.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub results: Vec<UpdateResult>,
}

impl PhaseOutcome {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.total() - self.succeeded_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UpdateResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// At least one success and at least one failure.
    pub fn is_partial(&self) -> bool {
        self.failed_count() > 0 && self.succeeded_count() > 0
    }

    /// Non-empty phase in which nothing succeeded.
    pub fn all_failed(&self) -> bool {
        self.total() > 0 && self.succeeded_count() == 0
    }

    pub fn result_for(&self, function_name: &str) -> Option<&UpdateResult> {
        self.results.iter().find(|r| r.function_name == function_name)
    }

    /// Log failures and decide whether the run may continue.
    ///
    /// Returns [`DeployError::PhaseFailed`] only when every item failed.
    pub fn check_policy(&self) -> DeployResult<()> {
        if self.failed_count() == 0 {
            return Ok(());
        }

        warn!(
            phase = %self.phase,
            succeeded = self.succeeded_count(),
            total = self.total(),
            "{} update: {}/{} successful",
            capitalize(self.phase.label()),
            self.succeeded_count(),
            self.total()
        );
        for failure in self.failures() {
            warn!(
                phase = %self.phase,
                function = %failure.function_name,
                "  ✗ {}: {}",
                failure.function_name,
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }

        if self.all_failed() {
            return Err(DeployError::PhaseFailed {
                phase: self.phase,
                total: self.total(),
            });
        }
        Ok(())
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Run `operation` over `specs` on an unordered pool at most
/// `max_concurrency` wide and wait for every item.
///
/// `operation` returns an optional detail string (a version) on success.
/// Results come back in input order; completion order is unspecified.
pub async fn run_batch<F, Fut>(
    phase: Phase,
    specs: &[Arc<FunctionSpec>],
    max_concurrency: usize,
    operation: F,
) -> PhaseOutcome
where
    F: Fn(Arc<FunctionSpec>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DeployResult<Option<String>>> + Send + 'static,
{
    let operation = Arc::new(operation);
    let permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = Vec::with_capacity(specs.len());

    for spec in specs {
        let spec = Arc::clone(spec);
        let operation = Arc::clone(&operation);
        let permits = Arc::clone(&permits);
        let function_name = spec.name.clone();

        let task = tokio::spawn(
            async move {
                let _permit = permits.acquire_owned().await.ok();
                let function_name = spec.name.clone();
                match operation(spec).await {
                    Ok(detail) => {
                        obs::emit_item_succeeded(phase, &function_name, detail.as_deref());
                        UpdateResult::succeeded(function_name, detail)
                    }
                    Err(err) => {
                        obs::emit_item_failed(phase, &function_name, &err);
                        UpdateResult::failed(function_name, err)
                    }
                }
            }
            .in_current_span(),
        );

        tasks.push((function_name, task));
    }

    let mut results = Vec::with_capacity(tasks.len());
    for (function_name, task) in tasks {
        let result = match task.await {
            Ok(result) => result,
            Err(join_err) => {
                error!(
                    phase = %phase,
                    function = %function_name,
                    error = %join_err,
                    "Item task failed for {}: {}",
                    function_name,
                    join_err
                );
                UpdateResult::failed(function_name, format!("task failed: {join_err}"))
            }
        };
        results.push(result);
    }

    PhaseOutcome { phase, results }
}
