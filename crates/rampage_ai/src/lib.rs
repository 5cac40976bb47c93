//! Enemy and boss behavior scripts driven by a cooperative, time-based task scheduler.

pub mod boss;
pub mod config;
pub mod enemy;
pub mod host;
pub mod loadout;
pub mod movement;
pub mod perception;
pub mod rng;
pub mod scheduler;
pub mod session;
pub mod sim;
pub mod state;

pub use boss::{BossController, BossState};
pub use config::{BossTuning, ConfigError, EnemyTuning, Tuning, TUNING_PATH_ENV_VAR};
pub use enemy::{DeathCause, EnemyController, EnemyKind, EnemySpawn, EnemyState, RoamType};
pub use host::{DynHost, EntityId, GridCell, GridKey, Host, Transform, Vec2};
pub use loadout::{limb_texture, LimbSlot, WeaponKind};
pub use scheduler::{Routine, RoutineError, Scheduler, Sequence, Step, TaskHandle, TickReport};
pub use session::{GameSession, SessionStats};
pub use sim::SimWorld;
pub use state::{GameFlags, ScriptContext};
