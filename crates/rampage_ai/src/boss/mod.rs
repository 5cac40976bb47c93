//! Boss fight: bullet patterns, reinforcement spawns and the force-field damage model.

mod agent;
mod patterns;
mod state;

use crate::config::BossTuning;
use crate::host::{Clock, EntityId};
use crate::state::{ScriptContext, StateMachine};

pub use agent::{
    BossAgent, BossCore, HitOutcome, SharedCore, ALERT_ENEMY_PREFABS, ATTACK_TAG,
    BOSS_DEATH_CLIP, BOSS_HIT_CLIPS, BOSS_MUSIC_CLIP, FORCE_FIELD_PREFAB, FORCE_FIELD_TAG,
    GAME_CONTROLLER_TAG, INVINCIBILITY_TAG, PATTERN_TAG, SHIELD_BREAK_CLIP, SHIELD_HIT_CLIPS,
    SHIELD_REGEN_CLIP, SPAWN_TAG,
};
pub use patterns::{
    alternating, spread, spread_arc, sweep, sweep_angle, AttackPattern, Disperse,
    PatternSelector, BOSS_BULLET_PREFAB, BOSS_SHOT_CLIP, CLUSTER_BULLET_PREFAB,
};
pub use state::BossState;

pub struct BossController {
    machine: StateMachine<BossState>,
    started: bool,
}

impl BossController {
    pub fn new(entity: EntityId, tuning: BossTuning, seed: u64) -> Self {
        Self {
            machine: StateMachine::new(
                "boss",
                entity,
                BossAgent::new(entity, tuning, seed),
                BossState::Dormant,
            ),
            started: false,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.machine.entity()
    }

    pub fn state(&self) -> BossState {
        self.machine.current()
    }

    pub fn agent(&self) -> &BossAgent {
        self.machine.agent()
    }

    pub fn start(&mut self, ctx: &mut ScriptContext<'_>) {
        if self.started {
            return;
        }
        self.started = true;
        self.machine.agent_mut().capture(ctx.host);
        self.machine.set_current_state(BossState::Dormant, ctx);
    }

    /// Nothing happens until the fight is activated, nor after the boss or the player died.
    pub fn update(&mut self, ctx: &mut ScriptContext<'_>) {
        if !self.started {
            self.start(ctx);
        }
        let flags = ctx.flags;
        if flags.boss_dead() || !flags.boss_activated() || flags.player_dead() || flags.paused() {
            return;
        }
        let dt = ctx.host.delta_time();
        self.machine.do_action_update(ctx, dt);
    }

    pub fn notify_player_dead(&mut self, ctx: &mut ScriptContext<'_>) {
        self.machine.player_dead(ctx);
    }

    /// Reinforcements spawned since the last call.
    pub fn take_spawned(&self) -> Vec<EntityId> {
        self.machine.agent().take_spawned()
    }

    pub fn is_dead(&self) -> bool {
        self.state() == BossState::Dead
    }
}

impl std::fmt::Debug for BossController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BossController")
            .field("entity", &self.entity())
            .field("state", &self.state())
            .field("health", &self.agent().health())
            .finish()
    }
}
