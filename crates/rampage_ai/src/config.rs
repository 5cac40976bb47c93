use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::movement::SNAP_DISTANCE_SQ;
use crate::perception::FieldOfView;

pub const TUNING_PATH_ENV_VAR: &str = "RAMPAGE_TUNING_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read tuning file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse tuning file {path} at {field_path}: {message}")]
    Parse {
        path: PathBuf,
        field_path: String,
        message: String,
    },
    #[error("invalid tuning value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyTuning {
    pub speed: f32,
    pub patrol_speed: f32,
    pub fov_angle_degrees: f32,
    pub fov_distance: f32,
    pub scan_duration: f32,
    pub search_duration: f32,
    pub fire_rate: f32,
    pub first_shot_factor: f32,
    pub shuffle_distance: f32,
    pub shuffle_rate: f32,
    pub patrol_reach: f32,
    pub chase_reach: f32,
    pub snap_distance_sq: f32,
    pub patrol_retarget_interval: f32,
}

impl Default for EnemyTuning {
    fn default() -> Self {
        Self {
            speed: 1.9,
            patrol_speed: 1.9,
            fov_angle_degrees: 300.0,
            fov_distance: 15.0,
            scan_duration: 3.0,
            search_duration: 5.0,
            fire_rate: 2.5,
            first_shot_factor: 0.5,
            shuffle_distance: 0.2,
            shuffle_rate: 1.1,
            patrol_reach: 0.8,
            chase_reach: 0.5,
            snap_distance_sq: SNAP_DISTANCE_SQ,
            patrol_retarget_interval: 5.0,
        }
    }
}

impl EnemyTuning {
    pub fn field_of_view(&self) -> FieldOfView {
        FieldOfView {
            angle_degrees: self.fov_angle_degrees,
            distance: self.fov_distance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossTuning {
    pub health: i32,
    pub force_field_health: i32,
    pub vulnerable_hits: i32,
    pub invincibility_seconds: f32,
    /// Attack cooldown roll bounds in hundredths of a second.
    pub attack_cooldown_min: i64,
    pub attack_cooldown_max: i64,
    pub spawn_delay_min: i64,
    pub spawn_delay_max: i64,
    pub death_animation_seconds: f32,
    pub force_field_deactivate_seconds: f32,
}

impl Default for BossTuning {
    fn default() -> Self {
        Self {
            health: 24,
            force_field_health: 3,
            vulnerable_hits: 3,
            invincibility_seconds: 0.2,
            attack_cooldown_min: 200,
            attack_cooldown_max: 350,
            spawn_delay_min: 3,
            spawn_delay_max: 5,
            death_animation_seconds: 1.4,
            force_field_deactivate_seconds: 0.6,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub enemy: EnemyTuning,
    pub boss: BossTuning,
}

impl Tuning {
    pub fn from_json_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let tuning: Tuning =
            serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
                let field_path = error.path().to_string();
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    field_path,
                    message: error.into_inner().to_string(),
                }
            })?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let tuning = Self::from_json_str(&raw, path)?;
        info!(path = %path.display(), "tuning_loaded");
        Ok(tuning)
    }

    /// Loads the file named by `RAMPAGE_TUNING_PATH`, or defaults when unset.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        match env::var_os(TUNING_PATH_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::load_from_path(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let enemy = &self.enemy;
        let durations: [(&'static str, f32); 13] = [
            ("enemy.speed", enemy.speed),
            ("enemy.patrol_speed", enemy.patrol_speed),
            ("enemy.fov_distance", enemy.fov_distance),
            ("enemy.scan_duration", enemy.scan_duration),
            ("enemy.search_duration", enemy.search_duration),
            ("enemy.fire_rate", enemy.fire_rate),
            ("enemy.first_shot_factor", enemy.first_shot_factor),
            ("enemy.shuffle_distance", enemy.shuffle_distance),
            ("enemy.shuffle_rate", enemy.shuffle_rate),
            ("enemy.patrol_reach", enemy.patrol_reach),
            ("enemy.chase_reach", enemy.chase_reach),
            ("enemy.snap_distance_sq", enemy.snap_distance_sq),
            ("enemy.patrol_retarget_interval", enemy.patrol_retarget_interval),
        ];
        for (field, value) in durations {
            non_negative(field, value)?;
        }
        if !(enemy.fov_angle_degrees > 0.0 && enemy.fov_angle_degrees <= 360.0) {
            return Err(ConfigError::Invalid {
                field: "enemy.fov_angle_degrees",
                reason: format!("expected (0, 360], got {}", enemy.fov_angle_degrees),
            });
        }

        let boss = &self.boss;
        non_negative("boss.invincibility_seconds", boss.invincibility_seconds)?;
        non_negative("boss.death_animation_seconds", boss.death_animation_seconds)?;
        non_negative(
            "boss.force_field_deactivate_seconds",
            boss.force_field_deactivate_seconds,
        )?;
        for (field, value) in [
            ("boss.health", boss.health),
            ("boss.force_field_health", boss.force_field_health),
            ("boss.vulnerable_hits", boss.vulnerable_hits),
        ] {
            if value <= 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("expected a positive count, got {value}"),
                });
            }
        }
        ordered_range(
            "boss.attack_cooldown",
            boss.attack_cooldown_min,
            boss.attack_cooldown_max,
        )?;
        ordered_range("boss.spawn_delay", boss.spawn_delay_min, boss.spawn_delay_max)?;
        Ok(())
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("expected a finite non-negative value, got {value}"),
        })
    }
}

fn ordered_range(field: &'static str, min: i64, max: i64) -> Result<(), ConfigError> {
    if min >= 0 && min < max {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("expected 0 <= min < max, got {min}..{max}"),
        })
    }
}
