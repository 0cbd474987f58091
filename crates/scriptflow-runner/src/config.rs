//! Runner configuration.
//!
//! Pacing lives in the `[pacing]` table of `config/default.toml`.  Every
//! field has a default, so a missing file or a partial table is fine; a
//! file that exists but does not parse is an error.
//!
//! ```toml
//! [pacing]
//! first_message_delay_ms = 600
//! message_cadence_ms = 1200
//! speed = 2.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, RunnerError};

/// Slowest accepted playback speed.
pub const MIN_SPEED: f64 = 0.001;

/// Environment variable overriding [`PacingConfig::speed`].
pub const SPEED_ENV: &str = "SCRIPTFLOW_SPEED";

/// Top-level runner configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub pacing: PacingConfig,
}

/// Delays between the messages of a run, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Wait before the first system message.
    pub first_message_delay_ms: u64,
    /// Wait between consecutive system messages.
    pub message_cadence_ms: u64,
    /// How long the typing indicator shows before the agent answers.
    pub agent_response_delay_ms: u64,
    /// Wait before each final message and the confirmation.
    pub final_message_cadence_ms: u64,
    /// Spacing between the messages of a cascade.
    pub cascade_step_ms: u64,
    /// Quiet period after the last cascade message before going idle.
    pub settle_ms: u64,
    /// Playback speed multiplier; every delay is divided by it.
    pub speed: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            first_message_delay_ms: 600,
            message_cadence_ms: 1_200,
            agent_response_delay_ms: 1_500,
            final_message_cadence_ms: 1_000,
            cascade_step_ms: 1_500,
            settle_ms: 1_000,
            speed: 1.0,
        }
    }
}

impl PacingConfig {
    /// Scale a nominal delay by the playback speed.
    ///
    /// Saturates at [`Duration::MAX`] instead of overflowing.
    pub fn scale(&self, delay: Duration) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() / self.speed).unwrap_or(Duration::MAX)
    }

    fn scaled_ms(&self, ms: u64) -> Duration {
        self.scale(Duration::from_millis(ms))
    }

    pub fn first_message_delay(&self) -> Duration {
        self.scaled_ms(self.first_message_delay_ms)
    }

    pub fn message_cadence(&self) -> Duration {
        self.scaled_ms(self.message_cadence_ms)
    }

    pub fn agent_response_delay(&self) -> Duration {
        self.scaled_ms(self.agent_response_delay_ms)
    }

    pub fn final_message_cadence(&self) -> Duration {
        self.scaled_ms(self.final_message_cadence_ms)
    }

    pub fn cascade_step(&self) -> Duration {
        self.scaled_ms(self.cascade_step_ms)
    }

    pub fn settle(&self) -> Duration {
        self.scaled_ms(self.settle_ms)
    }

    /// The delay before system message `index`.
    pub fn system_message_delay(&self, index: usize) -> Duration {
        if index == 0 {
            self.first_message_delay()
        } else {
            self.message_cadence()
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || self.speed < MIN_SPEED {
            return Err(RunnerError::Config {
                reason: format!(
                    "pacing.speed must be a number of at least {MIN_SPEED}, got {}",
                    self.speed
                ),
            });
        }
        Ok(())
    }
}

impl RunnerConfig {
    /// Parse a configuration document.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let config: Self = toml::from_str(document).map_err(|e| RunnerError::Config {
            reason: e.to_string(),
        })?;
        config.pacing.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = match std::fs::read_to_string(path) {
            Ok(document) => document,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(RunnerError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config = Self::from_toml_str(&document)?;
        info!(path = %path.display(), speed = config.pacing.speed, "runner config loaded");
        Ok(config)
    }

    /// Apply `SCRIPTFLOW_SPEED` if it is set.
    pub fn apply_env(self) -> Result<Self> {
        match std::env::var(SPEED_ENV) {
            Ok(value) => self.with_speed_str(&value),
            Err(_) => Ok(self),
        }
    }

    /// Override the playback speed.
    pub fn with_speed(mut self, speed: f64) -> Result<Self> {
        self.pacing.speed = speed;
        self.pacing.validate()?;
        Ok(self)
    }

    fn with_speed_str(self, value: &str) -> Result<Self> {
        let speed: f64 = value.trim().parse().map_err(|_| RunnerError::Config {
            reason: format!("{SPEED_ENV} must be a number, got `{value}`"),
        })?;
        self.with_speed(speed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let pacing = PacingConfig::default();
        assert_eq!(pacing.first_message_delay(), Duration::from_millis(600));
        assert_eq!(pacing.system_message_delay(0), Duration::from_millis(600));
        assert_eq!(pacing.system_message_delay(3), Duration::from_millis(1_200));
        assert_eq!(pacing.settle(), Duration::from_millis(1_000));
    }

    #[test]
    fn partial_table_keeps_defaults() {
        let config = RunnerConfig::from_toml_str("[pacing]\ncascade_step_ms = 10\n").unwrap();
        assert_eq!(config.pacing.cascade_step_ms, 10);
        assert_eq!(config.pacing.message_cadence_ms, 1_200);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(RunnerConfig::from_toml_str("").unwrap(), RunnerConfig::default());
    }

    #[test]
    fn speed_divides_delays() {
        let config = RunnerConfig::default().with_speed(4.0).unwrap();
        assert_eq!(config.pacing.message_cadence(), Duration::from_millis(300));
        assert_eq!(
            config.pacing.scale(Duration::from_secs(2)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn non_positive_speed_is_rejected() {
        assert!(matches!(
            RunnerConfig::default().with_speed(0.0),
            Err(RunnerError::Config { .. })
        ));
        assert!(matches!(
            RunnerConfig::from_toml_str("[pacing]\nspeed = -1.0\n"),
            Err(RunnerError::Config { .. })
        ));
    }

    #[test]
    fn vanishing_speed_is_rejected() {
        assert!(matches!(
            RunnerConfig::from_toml_str("[pacing]\nspeed = 1e-30\n"),
            Err(RunnerError::Config { .. })
        ));
        assert!(RunnerConfig::default().with_speed_str("0.0001").is_err());
        assert!(RunnerConfig::default().with_speed(MIN_SPEED).is_ok());
    }

    #[test]
    fn scale_saturates_instead_of_panicking() {
        let pacing = PacingConfig {
            speed: MIN_SPEED,
            ..PacingConfig::default()
        };
        assert_eq!(pacing.scale(Duration::MAX), Duration::MAX);
        assert_eq!(pacing.scale(Duration::from_secs(1)), Duration::from_secs(1_000));
    }

    #[test]
    fn speed_string_must_be_numeric() {
        let result = RunnerConfig::default().with_speed_str("fast");
        assert!(matches!(result, Err(RunnerError::Config { .. })));
        let config = RunnerConfig::default().with_speed_str(" 2 ").unwrap();
        assert_eq!(config.pacing.speed, 2.0);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[pacing\nspeed = ").unwrap();
        assert!(matches!(
            RunnerConfig::load(file.path()),
            Err(RunnerError::Config { .. })
        ));
    }

    #[test]
    fn missing_file_is_default() {
        let config = RunnerConfig::load("/no/such/scriptflow.toml").unwrap();
        assert_eq!(config, RunnerConfig::default());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[pacing]\nspeed = 10.0\nsettle_ms = 50\n")
            .unwrap();
        let config = RunnerConfig::load(file.path()).unwrap();
        assert_eq!(config.pacing.speed, 10.0);
        assert_eq!(config.pacing.settle_ms, 50);
    }
}
