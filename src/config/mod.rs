//! Configuration (layered: defaults < config file < environment).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HelmError, Result};

const DEFAULT_MAX_DIRECT_ATTEMPTS: usize = 10;
const DEFAULT_MAX_PLAN_CYCLES: usize = 100;
const DEFAULT_MAX_TURNS_PER_CYCLE: usize = 30;
const DEFAULT_HISTORY_TOKEN_BUDGET: usize = 32_000;
const DEFAULT_CANCEL_GRACE_MS: u64 = 3_000;
const DEFAULT_HUMAN_INPUT_POLL_MS: u64 = 500;
const DEFAULT_HUMAN_INPUT_TIMEOUT_MS: u64 = 600_000;
const DEFAULT_STREAM_IDLE_TIMEOUT_MS: u64 = 120_000;

const MAX_DIRECT_ATTEMPTS_ENV: &str = "AUTOHELM_MAX_DIRECT_ATTEMPTS";
const MAX_PLAN_CYCLES_ENV: &str = "AUTOHELM_MAX_PLAN_CYCLES";
const MAX_TURNS_PER_CYCLE_ENV: &str = "AUTOHELM_MAX_TURNS_PER_CYCLE";
const HISTORY_TOKEN_BUDGET_ENV: &str = "AUTOHELM_HISTORY_TOKEN_BUDGET";
const CANCEL_GRACE_MS_ENV: &str = "AUTOHELM_CANCEL_GRACE_MS";
const HUMAN_INPUT_POLL_MS_ENV: &str = "AUTOHELM_HUMAN_INPUT_POLL_MS";
const HUMAN_INPUT_TIMEOUT_MS_ENV: &str = "AUTOHELM_HUMAN_INPUT_TIMEOUT_MS";
const STREAM_IDLE_TIMEOUT_MS_ENV: &str = "AUTOHELM_STREAM_IDLE_TIMEOUT_MS";

const CONFIG_FILE_NAME: &str = "autohelm.toml";

/// Loop ceilings, budgets, and intervals for one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmConfig {
    /// Turn ceiling for the direct strategy.
    pub max_direct_attempts: usize,
    /// Outer plan-execute-validate cycle ceiling.
    pub max_plan_cycles: usize,
    /// Inner execution-turn ceiling per cycle.
    pub max_turns_per_cycle: usize,
    /// Estimated-token budget for the history manager.
    pub history_token_budget: usize,
    /// How long `cancel` waits for the loop to acknowledge before forcing
    /// the aborted state.
    pub cancel_grace_ms: u64,
    /// Poll interval while waiting for human input.
    pub human_input_poll_ms: u64,
    /// Ceiling on the human-input wait; elapsing terminates the run as a
    /// cancellation.
    pub human_input_timeout_ms: u64,
    /// Maximum gap between streamed chunks before the turn fails.
    pub stream_idle_timeout_ms: u64,
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self {
            max_direct_attempts: DEFAULT_MAX_DIRECT_ATTEMPTS,
            max_plan_cycles: DEFAULT_MAX_PLAN_CYCLES,
            max_turns_per_cycle: DEFAULT_MAX_TURNS_PER_CYCLE,
            history_token_budget: DEFAULT_HISTORY_TOKEN_BUDGET,
            cancel_grace_ms: DEFAULT_CANCEL_GRACE_MS,
            human_input_poll_ms: DEFAULT_HUMAN_INPUT_POLL_MS,
            human_input_timeout_ms: DEFAULT_HUMAN_INPUT_TIMEOUT_MS,
            stream_idle_timeout_ms: DEFAULT_STREAM_IDLE_TIMEOUT_MS,
        }
    }
}

/// Partial config parsed from `autohelm.toml`. Absent keys keep the layer
/// below.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    max_direct_attempts: Option<usize>,
    max_plan_cycles: Option<usize>,
    max_turns_per_cycle: Option<usize>,
    history_token_budget: Option<usize>,
    cancel_grace_ms: Option<u64>,
    human_input_poll_ms: Option<u64>,
    human_input_timeout_ms: Option<u64>,
    stream_idle_timeout_ms: Option<u64>,
}

impl HelmConfig {
    /// Defaults plus `AUTOHELM_*` environment overrides. Loads `.env` if
    /// present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Full layered load: defaults, then the platform config file if it
    /// exists, then environment overrides.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        if let Some(path) = Self::config_file_path() {
            if path.exists() {
                config.apply_overlay(read_overlay(&path)?);
            }
        }
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus the overlay from an explicit file, then environment
    /// overrides.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_overlay(read_overlay(path.as_ref())?);
        config.apply_env();
        Ok(config)
    }

    /// Platform location of `autohelm.toml`.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "autohelm")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        apply_positive(&mut self.max_direct_attempts, overlay.max_direct_attempts);
        apply_positive(&mut self.max_plan_cycles, overlay.max_plan_cycles);
        apply_positive(&mut self.max_turns_per_cycle, overlay.max_turns_per_cycle);
        apply_positive(&mut self.history_token_budget, overlay.history_token_budget);
        apply_positive(&mut self.cancel_grace_ms, overlay.cancel_grace_ms);
        apply_positive(&mut self.human_input_poll_ms, overlay.human_input_poll_ms);
        apply_positive(
            &mut self.human_input_timeout_ms,
            overlay.human_input_timeout_ms,
        );
        apply_positive(
            &mut self.stream_idle_timeout_ms,
            overlay.stream_idle_timeout_ms,
        );
    }

    fn apply_env(&mut self) {
        apply_positive(&mut self.max_direct_attempts, env_limit(MAX_DIRECT_ATTEMPTS_ENV));
        apply_positive(&mut self.max_plan_cycles, env_limit(MAX_PLAN_CYCLES_ENV));
        apply_positive(
            &mut self.max_turns_per_cycle,
            env_limit(MAX_TURNS_PER_CYCLE_ENV),
        );
        apply_positive(
            &mut self.history_token_budget,
            env_limit(HISTORY_TOKEN_BUDGET_ENV),
        );
        apply_positive(&mut self.cancel_grace_ms, env_limit(CANCEL_GRACE_MS_ENV));
        apply_positive(
            &mut self.human_input_poll_ms,
            env_limit(HUMAN_INPUT_POLL_MS_ENV),
        );
        apply_positive(
            &mut self.human_input_timeout_ms,
            env_limit(HUMAN_INPUT_TIMEOUT_MS_ENV),
        );
        apply_positive(
            &mut self.stream_idle_timeout_ms,
            env_limit(STREAM_IDLE_TIMEOUT_MS_ENV),
        );
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    pub fn human_input_poll(&self) -> Duration {
        Duration::from_millis(self.human_input_poll_ms)
    }

    pub fn human_input_timeout(&self) -> Duration {
        Duration::from_millis(self.human_input_timeout_ms)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_idle_timeout_ms)
    }
}

fn read_overlay(path: &Path) -> Result<ConfigOverlay> {
    let raw = std::fs::read_to_string(path)?;
    toml::from_str(&raw)
        .map_err(|err| HelmError::Configuration(format!("{}: {err}", path.display())))
}

/// Overlay a value only when present and nonzero. Zero ceilings would stall
/// the loop, so they fall through to the layer below.
fn apply_positive<T: PartialEq + From<u8>>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        if value != T::from(0) {
            *slot = value;
        }
    }
}

fn env_limit<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    raw.trim().parse().ok()
}
