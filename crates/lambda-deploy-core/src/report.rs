use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::batch::{Phase, PhaseOutcome, UpdateResult};

/// Version tag of the persisted report layout.
pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// How a phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Succeeded,
    PartiallySucceeded,
    Failed,
    Skipped,
}

/// One phase in the deployment report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<UpdateResult>,
}

impl PhaseReport {
    pub fn from_outcome(outcome: &PhaseOutcome) -> Self {
        let status = if outcome.all_failed() {
            PhaseStatus::Failed
        } else if outcome.is_partial() {
            PhaseStatus::PartiallySucceeded
        } else {
            PhaseStatus::Succeeded
        };
        Self {
            phase: outcome.phase,
            status,
            succeeded: outcome.succeeded_count(),
            failed: outcome.failed_count(),
            results: outcome.results.clone(),
        }
    }

    pub fn skipped(phase: Phase) -> Self {
        Self {
            phase,
            status: PhaseStatus::Skipped,
            succeeded: 0,
            failed: 0,
            results: Vec::new(),
        }
    }
}

/// Machine-readable record of one deployment run, written for CI artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub schema_version: String,
    pub deployment_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub publish: bool,
    pub alias_name: Option<String>,
    pub phases: Vec<PhaseReport>,
    pub success: bool,
    /// Reason the run aborted, if it did
    pub failure: Option<String>,
}

impl DeploymentReport {
    pub fn start(publish: bool, alias_name: Option<String>) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            deployment_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            publish,
            alias_name,
            phases: Vec::new(),
            success: false,
            failure: None,
        }
    }

    pub fn record_phase(&mut self, phase: PhaseReport) {
        self.phases.push(phase);
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// Stamp the end time and the final verdict.
    pub fn finish(&mut self, failure: Option<String>) {
        self.finished_at = Some(Utc::now());
        self.success = failure.is_none();
        self.failure = failure;
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }
}

/// Write the deployment report in pretty JSON format.
pub fn write_report_json(path: &Path, report: &DeploymentReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize deployment report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
