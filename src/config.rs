//! Configuration Management
//!
//! Handles persistent configuration storage for resynth: default accounts
//! and regions, so repeated migrations between the same pair of environments
//! do not need the full flag set every run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::aws::identity::is_account_id;

/// Environment variables consulted between the CLI flags and the config file.
const ENV_ORIGIN_ACCOUNT: &str = "RESYNTH_ORIGIN_ACCOUNT";
const ENV_TARGET_ACCOUNT: &str = "RESYNTH_TARGET_ACCOUNT";
const ENV_ORIGIN_REGION: &str = "RESYNTH_ORIGIN_REGION";
const ENV_TARGET_REGION: &str = "RESYNTH_TARGET_REGION";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default origin account
    #[serde(default)]
    pub origin_account: Option<String>,
    /// Default target account
    #[serde(default)]
    pub target_account: Option<String>,
    /// Default origin region
    #[serde(default)]
    pub origin_region: Option<String>,
    /// Default target region
    #[serde(default)]
    pub target_region: Option<String>,
}

/// Fully resolved parameters for one run. Construction fails before any
/// synthesis starts when a required value is missing.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub origin_account: String,
    pub target_account: String,
    pub origin_region: String,
    pub target_region: String,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("resynth").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Resolve the run parameters from CLI flags, environment, and stored
    /// defaults, in that precedence. Anything still missing afterwards is a
    /// configuration error, surfaced here rather than mid-synthesis.
    pub fn resolve_run(
        &self,
        origin_account: Option<&str>,
        target_account: Option<&str>,
        origin_region: Option<&str>,
        target_region: Option<&str>,
    ) -> Result<RunConfig> {
        let origin_account = pick(
            origin_account,
            env_value(ENV_ORIGIN_ACCOUNT),
            &self.origin_account,
        )
        .context("No origin account configured. Use --origin-account, RESYNTH_ORIGIN_ACCOUNT, or the config file")?;
        let target_account = pick(
            target_account,
            env_value(ENV_TARGET_ACCOUNT),
            &self.target_account,
        )
        .context("No target account configured. Use --target-account, RESYNTH_TARGET_ACCOUNT, or the config file")?;
        let origin_region = pick(
            origin_region,
            env_value(ENV_ORIGIN_REGION),
            &self.origin_region,
        )
        .context("No origin region configured. Use --origin-region, RESYNTH_ORIGIN_REGION, or the config file")?;
        let target_region = pick(
            target_region,
            env_value(ENV_TARGET_REGION),
            &self.target_region,
        )
        .context("No target region configured. Use --target-region, RESYNTH_TARGET_REGION, or the config file")?;

        for (label, account) in [("origin", &origin_account), ("target", &target_account)] {
            if !is_account_id(account) {
                anyhow::bail!("{} account `{}` is not a 12-digit account ID", label, account);
            }
        }
        if origin_account == target_account {
            anyhow::bail!(
                "Origin and target account are both `{}`; rewriting requires them to differ",
                origin_account
            );
        }

        Ok(RunConfig {
            origin_account,
            target_account,
            origin_region,
            target_region,
        })
    }

    /// Remember the resolved parameters as defaults and save.
    pub fn remember(&mut self, run: &RunConfig) -> Result<()> {
        self.origin_account = Some(run.origin_account.clone());
        self.target_account = Some(run.target_account.clone());
        self.origin_region = Some(run.origin_region.clone());
        self.target_region = Some(run.target_region.clone());
        self.save()
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// CLI flag > environment > stored default.
fn pick(flag: Option<&str>, env: Option<String>, stored: &Option<String>) -> Option<String> {
    flag.map(str::to_string).or(env).or_else(|| stored.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_beats_env_beats_stored() {
        let stored = Some("stored".to_string());
        assert_eq!(
            pick(Some("flag"), Some("env".to_string()), &stored),
            Some("flag".to_string())
        );
        assert_eq!(
            pick(None, Some("env".to_string()), &stored),
            Some("env".to_string())
        );
        assert_eq!(pick(None, None, &stored), Some("stored".to_string()));
        assert_eq!(pick(None, None, &None), None);
    }

    #[test]
    fn resolve_requires_every_parameter() {
        let config = Config::default();
        let err = config
            .resolve_run(None, Some("222222222222"), Some("us-east-1"), Some("eu-west-1"))
            .unwrap_err();
        assert!(err.to_string().contains("origin account"));
    }

    #[test]
    fn resolve_rejects_malformed_accounts() {
        let config = Config::default();
        let err = config
            .resolve_run(
                Some("not-an-account"),
                Some("222222222222"),
                Some("us-east-1"),
                Some("eu-west-1"),
            )
            .unwrap_err();
        assert!(err.to_string().contains("12-digit"));
    }

    #[test]
    fn resolve_rejects_equal_accounts() {
        let config = Config::default();
        let err = config
            .resolve_run(
                Some("111111111111"),
                Some("111111111111"),
                Some("us-east-1"),
                Some("eu-west-1"),
            )
            .unwrap_err();
        assert!(err.to_string().contains("differ"));
    }

    #[test]
    fn resolve_uses_stored_defaults() {
        let config = Config {
            origin_account: Some("111111111111".to_string()),
            target_account: Some("222222222222".to_string()),
            origin_region: Some("us-east-1".to_string()),
            target_region: Some("eu-west-1".to_string()),
        };
        let run = config.resolve_run(None, None, None, None).unwrap();
        assert_eq!(run.origin_account, "111111111111");
        assert_eq!(run.target_region, "eu-west-1");
    }
}
