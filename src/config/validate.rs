// src/config/validate.rs

use crate::config::model::{ClassifierSection, ConfigFile, RawConfigFile, ShareSection};
use crate::errors::{McpshareError, Result};
use crate::share::{ClassifierRules, ShareSettings};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = McpshareError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_share(&raw.share)?;
        validate_classifier(&raw.classifier)?;

        let startup_timeout = parse_timeout(&raw.share.startup_timeout)?;
        let rules = ClassifierRules::new(
            raw.classifier.success_tokens,
            raw.classifier.failure_tokens,
        );

        Ok(ConfigFile::new_unchecked(ShareSettings {
            program: raw.share.program,
            subcommand: raw.share.subcommand,
            env: raw.share.env,
            working_dir: raw.share.working_dir,
            startup_timeout,
            capture_limit: raw.share.capture_limit,
            rules,
        }))
    }
}

fn validate_share(share: &ShareSection) -> Result<()> {
    if share.program.trim().is_empty() {
        return Err(McpshareError::ConfigError(
            "[share].program must not be empty".to_string(),
        ));
    }

    if share.capture_limit == 0 {
        return Err(McpshareError::ConfigError(
            "[share].capture_limit must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn parse_timeout(raw: &str) -> Result<std::time::Duration> {
    let timeout = parse_duration(raw).map_err(|e| {
        McpshareError::ConfigError(format!("[share].startup_timeout: {e}"))
    })?;

    if timeout.is_zero() {
        return Err(McpshareError::ConfigError(
            "[share].startup_timeout must be greater than zero".to_string(),
        ));
    }

    Ok(timeout)
}

fn validate_classifier(classifier: &ClassifierSection) -> Result<()> {
    check_tokens("success_tokens", &classifier.success_tokens)?;
    check_tokens("failure_tokens", &classifier.failure_tokens)?;
    Ok(())
}

fn check_tokens(field: &str, tokens: &[String]) -> Result<()> {
    if tokens.is_empty() {
        return Err(McpshareError::ConfigError(format!(
            "[classifier].{field} must contain at least one token"
        )));
    }
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(McpshareError::ConfigError(format!(
            "[classifier].{field} must not contain empty tokens"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config_error(raw: RawConfigFile) -> String {
        match ConfigFile::try_from(raw) {
            Err(McpshareError::ConfigError(msg)) => msg,
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn defaults_validate_to_default_settings() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert_eq!(cfg.share(), &ShareSettings::default());
        assert_eq!(cfg.share().startup_timeout, Duration::from_secs(30));
    }

    #[test]
    fn empty_program_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.share.program = " ".to_string();
        assert!(config_error(raw).contains("program"));
    }

    #[test]
    fn bad_or_zero_timeout_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.share.startup_timeout = "soon".to_string();
        assert!(config_error(raw).contains("startup_timeout"));

        let mut raw = RawConfigFile::default();
        raw.share.startup_timeout = "0s".to_string();
        assert!(config_error(raw).contains("greater than zero"));
    }

    #[test]
    fn zero_capture_limit_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.share.capture_limit = 0;
        assert!(config_error(raw).contains("capture_limit"));
    }

    #[test]
    fn token_lists_must_be_non_empty() {
        let mut raw = RawConfigFile::default();
        raw.classifier.success_tokens.clear();
        assert!(config_error(raw).contains("success_tokens"));

        let mut raw = RawConfigFile::default();
        raw.classifier.failure_tokens = vec![String::new()];
        assert!(config_error(raw).contains("empty tokens"));
    }
}
