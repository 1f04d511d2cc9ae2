//! Orchestrator configuration, loaded from TOML

use std::{fs, path::Path, str::FromStr, time::Duration};

use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;

use crate::error::{ClientError, ClientResult};

/// Fee headroom a wallet keeps after a deposit (0.001 SOL)
pub const DEFAULT_MIN_RESERVE_LAMPORTS: u64 = 1_000_000;

fn default_min_reserve() -> u64 {
    DEFAULT_MIN_RESERVE_LAMPORTS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Base58 id of the deployed vault program
    pub program_id: String,

    #[serde(default = "default_min_reserve")]
    pub min_reserve_lamports: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backoff applied to confirmation polling and conflict retries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub initial_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(4),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Fresh backoff schedule; attempts are bounded by `max_attempts`, not
    /// by elapsed time.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Pacing between the steps of a composite transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    #[serde(with = "humantime_serde")]
    pub step_delay: Duration,
    pub max_polls: u32,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_secs(2),
            max_polls: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Defaults for the given program.
    pub fn for_program(program_id: &Pubkey) -> Self {
        Self {
            program_id: program_id.to_string(),
            min_reserve_lamports: DEFAULT_MIN_RESERVE_LAMPORTS,
            retry: RetryConfig::default(),
            confirmation: ConfirmationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn from_toml_str(input: &str) -> ClientResult<Self> {
        let config: Self = toml::from_str(input)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let input = fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&input)
    }

    pub fn program_id(&self) -> ClientResult<Pubkey> {
        Pubkey::from_str(&self.program_id)
            .map_err(|e| ClientError::Config(format!("invalid program_id {:?}: {}", self.program_id, e)))
    }

    pub fn validate(&self) -> ClientResult<()> {
        self.program_id()?;

        if self.retry.max_attempts == 0 {
            return Err(ClientError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if !(self.retry.multiplier >= 1.0) {
            return Err(ClientError::Config("retry.multiplier must be at least 1.0".to_string()));
        }
        if self.retry.initial_interval > self.retry.max_interval {
            return Err(ClientError::Config(
                "retry.initial_interval exceeds retry.max_interval".to_string(),
            ));
        }
        if self.confirmation.max_polls == 0 {
            return Err(ClientError::Config(
                "confirmation.max_polls must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoff::backoff::Backoff;

    const PROGRAM_ID: &str = "4fdAPL4LP42bum23ZbyR4ruUBGrCCourvCQzkW734aEZ";

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = OrchestratorConfig::from_toml_str(&format!("program_id = \"{}\"", PROGRAM_ID)).unwrap();

        assert_eq!(config.program_id().unwrap(), interest_vault::id());
        assert_eq!(config.min_reserve_lamports, 1_000_000);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.confirmation.step_delay, Duration::from_secs(2));
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_humantime_durations() {
        let input = format!(
            r#"
            program_id = "{}"
            min_reserve_lamports = 0

            [retry]
            max_attempts = 3
            initial_interval = "10ms"
            max_interval = "1s"

            [confirmation]
            step_delay = "500ms"
            max_polls = 4

            [logging]
            filter = "vault_orchestrator=debug"
            "#,
            PROGRAM_ID
        );
        let config = OrchestratorConfig::from_toml_str(&input).unwrap();

        assert_eq!(config.min_reserve_lamports, 0);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_interval, Duration::from_millis(10));
        assert_eq!(config.retry.multiplier, 2.0);
        assert_eq!(config.confirmation.step_delay, Duration::from_millis(500));
        assert_eq!(config.confirmation.max_polls, 4);
        assert_eq!(config.logging.filter, "vault_orchestrator=debug");
    }

    #[test]
    fn test_validation() {
        let mut config = OrchestratorConfig::for_program(&interest_vault::id());
        assert!(config.validate().is_ok());

        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));

        config.retry.max_attempts = 1;
        config.retry.multiplier = 0.5;
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));

        let bad_id = OrchestratorConfig::from_toml_str("program_id = \"not-a-key\"");
        assert!(matches!(bad_id, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_backoff_starts_at_initial_interval() {
        let mut retry = RetryConfig::default();
        retry.initial_interval = Duration::from_millis(100);
        let mut backoff = retry.backoff();

        let first = backoff.next_backoff().unwrap();
        // Default jitter is +/-50%
        assert!(first >= Duration::from_millis(50));
        assert!(first <= Duration::from_millis(150));
    }
}
