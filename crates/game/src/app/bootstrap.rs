use std::env;
use std::str::FromStr;

use rampage_ai::{ConfigError, Tuning};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub(crate) const SIM_SECONDS_ENV_VAR: &str = "RAMPAGE_SIM_SECONDS";
pub(crate) const SEED_ENV_VAR: &str = "RAMPAGE_SEED";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LoopConfig {
    pub(crate) target_tps: u32,
    /// Simulated run length in unscaled seconds.
    pub(crate) sim_seconds: f32,
    pub(crate) metrics_log_interval: f32,
    pub(crate) seed: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            sim_seconds: 30.0,
            metrics_log_interval: 5.0,
            seed: 1,
        }
    }
}

impl LoopConfig {
    pub(crate) fn from_env() -> Self {
        let defaults = Self::default();
        let sim_seconds = resolve_env(SIM_SECONDS_ENV_VAR, defaults.sim_seconds);
        Self {
            sim_seconds: if sim_seconds.is_finite() && sim_seconds > 0.0 {
                sim_seconds
            } else {
                warn!(
                    env_var = SIM_SECONDS_ENV_VAR,
                    value = sim_seconds,
                    "non-positive simulation length; falling back to default"
                );
                defaults.sim_seconds
            },
            seed: resolve_env(SEED_ENV_VAR, defaults.seed),
            ..defaults
        }
    }

    pub(crate) fn fixed_dt(&self) -> f32 {
        1.0 / self.target_tps.max(1) as f32
    }

    pub(crate) fn total_ticks(&self) -> u64 {
        (self.sim_seconds * self.target_tps.max(1) as f32).round().max(0.0) as u64
    }
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to serialize simulation report: {0}")]
    Report(#[source] serde_json::Error),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) tuning: Tuning,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Rampage AI Startup ===");

    let tuning = Tuning::load_from_env()?;
    let config = LoopConfig::from_env();
    info!(
        target_tps = config.target_tps,
        sim_seconds = config.sim_seconds,
        seed = config.seed,
        "loop_config_resolved"
    );

    Ok(AppWiring { config, tuning })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn resolve_env<T: FromStr + Copy>(var: &'static str, fallback: T) -> T {
    match env::var(var) {
        Ok(value) => parse_or(var, &value, fallback),
        Err(env::VarError::NotPresent) => fallback,
        Err(err) => {
            warn!(
                env_var = var,
                error = %err,
                "unable to read env var; falling back to config"
            );
            fallback
        }
    }
}

fn parse_or<T: FromStr>(var: &'static str, value: &str, fallback: T) -> T {
    match value.trim().parse::<T>() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(
                env_var = var,
                value,
                "invalid env var value; falling back to config"
            );
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_values_parse_or_fall_back() {
        assert_eq!(parse_or(SEED_ENV_VAR, " 42 ", 1u64), 42);
        assert_eq!(parse_or(SEED_ENV_VAR, "forty", 1u64), 1);
        assert_eq!(parse_or(SIM_SECONDS_ENV_VAR, "12.5", 30.0f32), 12.5);
    }

    #[test]
    fn tick_budget_follows_rate_and_length() {
        let config = LoopConfig {
            target_tps: 50,
            sim_seconds: 2.0,
            ..LoopConfig::default()
        };
        assert_eq!(config.total_ticks(), 100);
        assert!((config.fixed_dt() - 0.02).abs() < 1e-6);
    }

    #[test]
    fn zero_rate_is_treated_as_one() {
        let config = LoopConfig {
            target_tps: 0,
            sim_seconds: 3.0,
            ..LoopConfig::default()
        };
        assert_eq!(config.total_ticks(), 3);
        assert_eq!(config.fixed_dt(), 1.0);
    }
}
