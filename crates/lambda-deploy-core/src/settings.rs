//! Run-wide deployment settings.
//!
//! [`DeploySettings`] is built once at startup from a [`SettingsInput`]
//! (filled by the CLI from flags and environment variables) and shared by
//! `Arc` with every component. Nothing reads the environment after that.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};

/// Only this literal enables publishing.
pub const PUBLISH_TRUE: &str = "true";

/// How the alias phase picks the version to point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AliasVersionStrategy {
    /// Last entry of the final listing page, as returned by the provider
    #[default]
    LastListed,
    /// Numerically highest published version, ignoring `$LATEST`
    Highest,
}

impl fmt::Display for AliasVersionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasVersionStrategy::LastListed => write!(f, "last-listed"),
            AliasVersionStrategy::Highest => write!(f, "highest"),
        }
    }
}

impl FromStr for AliasVersionStrategy {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-listed" | "last_listed" => Ok(AliasVersionStrategy::LastListed),
            "highest" => Ok(AliasVersionStrategy::Highest),
            other => Err(DeployError::Validation(format!(
                "unknown alias version strategy '{other}' (expected last-listed or highest)"
            ))),
        }
    }
}

/// Readiness polling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Fixed delay between status checks
    pub delay: Duration,
    /// Status checks before giving up
    pub max_attempts: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 300,
        }
    }
}

/// Worker pool width when none is configured: `min(32, cpus + 4)`.
pub fn default_max_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus + 4).min(32)
}

/// `PUBLISH` semantics: unset means publish; any value other than the
/// literal `true` disables it.
pub fn parse_publish_flag(value: Option<&str>) -> bool {
    value.map_or(true, |v| v == PUBLISH_TRUE)
}

/// Raw, unvalidated settings as collected from flags and environment.
#[derive(Debug, Clone, Default)]
pub struct SettingsInput {
    pub alias_name: Option<String>,
    pub artifact_bucket: Option<String>,
    pub config_file: Option<PathBuf>,
    pub artifact_path: Option<String>,
    pub publish: Option<String>,
    pub wait_delay_secs: Option<u64>,
    pub wait_max_attempts: Option<u32>,
    pub alias_strategy: Option<AliasVersionStrategy>,
    pub max_concurrency: Option<usize>,
}

/// Validated settings shared by every component of a run.
#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub artifact_bucket: String,
    /// Key prefix inside the bucket
    pub artifact_path: String,
    pub config_file: PathBuf,
    pub publish: bool,
    pub alias_name: Option<String>,
    pub wait: WaitPolicy,
    pub alias_strategy: AliasVersionStrategy,
    pub max_concurrency: usize,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl DeploySettings {
    /// Validate raw input. Every missing required value is reported at once.
    pub fn resolve(input: SettingsInput) -> DeployResult<Self> {
        let artifact_bucket = non_empty(input.artifact_bucket);
        let config_file = input
            .config_file
            .filter(|p| !p.as_os_str().is_empty());
        let artifact_path = non_empty(input.artifact_path);

        let mut missing = Vec::new();
        if artifact_bucket.is_none() {
            missing.push("ARTIFACT_BUCKET");
        }
        if config_file.is_none() {
            missing.push("LAMBDA_CONFIG_FILE");
        }
        if artifact_path.is_none() {
            missing.push("ARTIFACT_PATH");
        }

        let (Some(artifact_bucket), Some(config_file), Some(artifact_path)) =
            (artifact_bucket, config_file, artifact_path)
        else {
            return Err(DeployError::Validation(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        };

        let defaults = WaitPolicy::default();
        let settings = Self {
            artifact_bucket,
            artifact_path,
            config_file,
            publish: parse_publish_flag(input.publish.as_deref()),
            alias_name: non_empty(input.alias_name),
            wait: WaitPolicy {
                delay: input
                    .wait_delay_secs
                    .map_or(defaults.delay, Duration::from_secs),
                max_attempts: input.wait_max_attempts.unwrap_or(defaults.max_attempts),
            },
            alias_strategy: input.alias_strategy.unwrap_or_default(),
            max_concurrency: input
                .max_concurrency
                .unwrap_or_else(default_max_concurrency),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Startup preconditions that do not depend on the function list.
    pub fn validate(&self) -> DeployResult<()> {
        if self.publish && self.alias_name.as_deref().map_or(true, str::is_empty) {
            return Err(DeployError::Validation(
                "ALIAS_NAME is required when PUBLISH is true".to_string(),
            ));
        }
        if self.wait.max_attempts == 0 {
            return Err(DeployError::Validation(
                "WAIT_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(DeployError::Validation(
                "DEPLOY_MAX_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Object key of an artifact inside the bucket.
    pub fn artifact_key(&self, artifact: &str) -> String {
        format!("{}/{}", self.artifact_path, artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_input() -> SettingsInput {
        SettingsInput {
            alias_name: Some("live".to_string()),
            artifact_bucket: Some("ci-artifacts".to_string()),
            config_file: Some(PathBuf::from("functions.json")),
            artifact_path: Some("builds/1234".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_publish_defaults_to_true() {
        assert!(parse_publish_flag(None));
        assert!(parse_publish_flag(Some("true")));
        assert!(!parse_publish_flag(Some("false")));
        assert!(!parse_publish_flag(Some("True")));
        assert!(!parse_publish_flag(Some("1")));
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let settings = DeploySettings::resolve(complete_input()).unwrap();
        assert!(settings.publish);
        assert_eq!(settings.wait, WaitPolicy::default());
        assert_eq!(settings.alias_strategy, AliasVersionStrategy::LastListed);
        assert!(settings.max_concurrency >= 1 && settings.max_concurrency <= 32);
        assert_eq!(settings.artifact_key("orders.zip"), "builds/1234/orders.zip");
    }

    #[test]
    fn test_resolve_reports_all_missing_variables() {
        let err = DeploySettings::resolve(SettingsInput {
            artifact_bucket: Some("   ".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ARTIFACT_BUCKET"));
        assert!(msg.contains("LAMBDA_CONFIG_FILE"));
        assert!(msg.contains("ARTIFACT_PATH"));
    }

    #[test]
    fn test_publish_requires_alias() {
        let err = DeploySettings::resolve(SettingsInput {
            alias_name: Some(String::new()),
            ..complete_input()
        })
        .unwrap_err();
        assert!(err.to_string().contains("ALIAS_NAME"));
    }

    #[test]
    fn test_alias_not_required_without_publish() {
        let settings = DeploySettings::resolve(SettingsInput {
            alias_name: None,
            publish: Some("false".to_string()),
            ..complete_input()
        })
        .unwrap();
        assert!(!settings.publish);
        assert!(settings.alias_name.is_none());
    }

    #[test]
    fn test_zero_bounds_are_rejected() {
        assert!(DeploySettings::resolve(SettingsInput {
            wait_max_attempts: Some(0),
            ..complete_input()
        })
        .is_err());
        assert!(DeploySettings::resolve(SettingsInput {
            max_concurrency: Some(0),
            ..complete_input()
        })
        .is_err());
    }

    #[test]
    fn test_alias_strategy_parsing() {
        assert_eq!(
            "highest".parse::<AliasVersionStrategy>().unwrap(),
            AliasVersionStrategy::Highest
        );
        assert_eq!(
            "Last-Listed".parse::<AliasVersionStrategy>().unwrap(),
            AliasVersionStrategy::LastListed
        );
        assert!("newest".parse::<AliasVersionStrategy>().is_err());
        assert_eq!(AliasVersionStrategy::Highest.to_string(), "highest");
    }
}
