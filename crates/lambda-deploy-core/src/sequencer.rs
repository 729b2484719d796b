//! Three-phase deployment state machine.
//!
//! ```text
//! START → CONFIGURATION → CODE → [publish? → ALIAS] → DONE
//!              |             |                |
//!            (all failed) (all failed)   (all failed)
//!              ↓             ↓                ↓
//!            ABORT         ABORT            ABORT
//! ```
//!
//! Phases are strict barriers: every item of a phase finishes before the
//! next phase starts. Each phase runs over the full spec list, whatever the
//! per-item results of the previous phase were.

use std::sync::Arc;

use lambda_deploy_api::LambdaApi;
use crate::batch::{run_batch, Phase, PhaseOutcome};
use crate::error::{DeployError, DeployResult};
use crate::function_spec::FunctionSpec;
use crate::obs::{self, DeploySpan};
use crate::report::{DeploymentReport, PhaseReport};
use crate::settings::DeploySettings;
use crate::update_client::FunctionUpdateClient;

/// Result of a full run: the report plus the fatal error, if any.
#[derive(Debug)]
pub struct DeploymentOutcome {
    pub report: DeploymentReport,
    pub error: Option<DeployError>,
}

impl DeploymentOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Process exit status: 0 on success, otherwise the error's code.
    pub fn exit_code(&self) -> u8 {
        self.error.as_ref().map_or(0, DeployError::exit_code)
    }
}

/// Drives configuration, code and alias phases over a fixed function set.
pub struct PhaseSequencer {
    client: FunctionUpdateClient,
    settings: Arc<DeploySettings>,
}

impl PhaseSequencer {
    pub fn new(api: Arc<dyn LambdaApi>, settings: Arc<DeploySettings>) -> Self {
        Self {
            client: FunctionUpdateClient::new(api, Arc::clone(&settings)),
            settings,
        }
    }

    /// Deploy `specs`. Never panics on item failures; the outcome carries
    /// the fatal error, if the run aborted.
    pub async fn run(&self, specs: Vec<FunctionSpec>) -> DeploymentOutcome {
        let mut report =
            DeploymentReport::start(self.settings.publish, self.settings.alias_name.clone());
        let span = DeploySpan::new(&report.deployment_id.to_string());

        let error = span
            .wrap(async {
                let error = self.run_phases(specs, &mut report).await.err();
                report.finish(error.as_ref().map(ToString::to_string));
                obs::emit_deploy_finished(
                    report.duration_ms(),
                    report.success,
                    report.failure.as_deref(),
                );
                error
            })
            .await;

        DeploymentOutcome { report, error }
    }

    async fn run_phases(
        &self,
        specs: Vec<FunctionSpec>,
        report: &mut DeploymentReport,
    ) -> DeployResult<()> {
        // Fails before any remote call.
        self.settings.validate()?;

        obs::emit_deploy_started(
            specs.len(),
            self.settings.publish,
            self.settings.alias_name.as_deref(),
        );

        let specs: Vec<Arc<FunctionSpec>> = specs.into_iter().map(Arc::new).collect();
        let width = self.settings.max_concurrency;

        obs::emit_phase_started(Phase::Configuration, "Updating function configurations...");
        let client = self.client.clone();
        let outcome = run_batch(Phase::Configuration, &specs, width, move |spec| {
            let client = client.clone();
            async move { client.update_configuration(&spec).await.map(|()| None) }
        })
        .await;
        Self::finish_phase(outcome, report)?;

        obs::emit_phase_started(Phase::Code, "Updating function code...");
        let client = self.client.clone();
        let outcome = run_batch(Phase::Code, &specs, width, move |spec| {
            let client = client.clone();
            async move { client.update_code(&spec).await.map(Some) }
        })
        .await;
        Self::finish_phase(outcome, report)?;

        if !self.settings.publish {
            obs::emit_phase_skipped(Phase::Alias, "publish=false");
            report.record_phase(PhaseReport::skipped(Phase::Alias));
            return Ok(());
        }

        let alias_name = self.settings.alias_name.clone().ok_or_else(|| {
            DeployError::Validation("ALIAS_NAME is required when PUBLISH is true".to_string())
        })?;

        obs::emit_phase_started(
            Phase::Alias,
            &format!("Updating function aliases to '{alias_name}'..."),
        );
        let client = self.client.clone();
        let outcome = run_batch(Phase::Alias, &specs, width, move |spec| {
            let client = client.clone();
            let alias_name = alias_name.clone();
            async move { client.update_alias(&spec.name, &alias_name).await.map(Some) }
        })
        .await;
        Self::finish_phase(outcome, report)
    }

    fn finish_phase(outcome: PhaseOutcome, report: &mut DeploymentReport) -> DeployResult<()> {
        obs::emit_phase_finished(&outcome);
        report.record_phase(PhaseReport::from_outcome(&outcome));
        outcome.check_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use lambda_deploy_api::fakes::MemoryLambdaApi;

    use crate::report::PhaseStatus;
    use crate::settings::{AliasVersionStrategy, WaitPolicy};

    fn settings(publish: bool, alias_name: Option<&str>) -> Arc<DeploySettings> {
        Arc::new(DeploySettings {
            artifact_bucket: "ci-artifacts".to_string(),
            artifact_path: "builds/7".to_string(),
            config_file: PathBuf::from("functions.json"),
            publish,
            alias_name: alias_name.map(str::to_string),
            wait: WaitPolicy {
                delay: Duration::ZERO,
                max_attempts: 3,
            },
            alias_strategy: AliasVersionStrategy::LastListed,
            max_concurrency: 4,
        })
    }

    #[tokio::test]
    async fn test_outcome_exit_codes() {
        let api = Arc::new(MemoryLambdaApi::new().with_function("orders"));
        let sequencer = PhaseSequencer::new(api, settings(true, Some("live")));
        let outcome = sequencer
            .run(vec![FunctionSpec::new("orders", "o.zip", "python3.12", "app.handler")])
            .await;
        assert!(outcome.success());
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.report.phases.len(), 3);
    }

    #[tokio::test]
    async fn test_skipped_alias_is_reported() {
        let api = Arc::new(MemoryLambdaApi::new().with_function("orders"));
        let sequencer = PhaseSequencer::new(api, settings(false, None));
        let outcome = sequencer
            .run(vec![FunctionSpec::new("orders", "o.zip", "python3.12", "app.handler")])
            .await;
        assert!(outcome.success());
        assert_eq!(
            outcome.report.phase(Phase::Alias).map(|p| p.status),
            Some(PhaseStatus::Skipped)
        );
    }

    #[tokio::test]
    async fn test_validation_failure_is_recorded_in_report() {
        let api = Arc::new(MemoryLambdaApi::new().with_function("orders"));
        let sequencer = PhaseSequencer::new(api.clone(), settings(true, None));
        let outcome = sequencer
            .run(vec![FunctionSpec::new("orders", "o.zip", "python3.12", "app.handler")])
            .await;
        assert_eq!(outcome.exit_code(), 1);
        assert!(matches!(outcome.error, Some(DeployError::Validation(_))));
        assert!(outcome.report.phases.is_empty());
        assert!(!outcome.report.success);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_function_list_succeeds() {
        let api = Arc::new(MemoryLambdaApi::new());
        let sequencer = PhaseSequencer::new(api.clone(), settings(true, Some("live")));
        let outcome = sequencer.run(Vec::new()).await;
        assert!(outcome.success());
        assert!(api.calls().is_empty());
    }
}
