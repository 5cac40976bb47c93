//! Enemy behavior: patrol, pursuit, ranged attack, search and death.

mod agent;
mod death;
mod state;
#[cfg(test)]
mod tests;

use tracing::{debug, info};

use crate::config::EnemyTuning;
use crate::host::{Clock, Collisions, EntityId, GridKey, Transforms};
use crate::scheduler::TaskHandle;
use crate::state::{ScriptContext, StateMachine};

pub use agent::{
    ChaseProgress, EnemyAgent, EnemyKind, PatrolSignal, RoamType, ENEMY_BULLET_PREFAB,
    ENEMY_SHOT_CLIP,
};
pub use death::{
    classify_contact, death_audio, Contact, DeathCause, DeathRoutine, BLOOD_POOL_PREFAB,
    BODY_DEATH_CLIPS, BODY_FALL_CLIPS, BODY_STAB_CLIPS, DEATH_AUDIO_TAG, DEATH_TAG,
    RANGED_DEATH_CLIP, TOP_HALF_PREFAB,
};
pub use state::EnemyState;

pub const PLAYER_TAG: &str = "Player";

/// Placement of one enemy in a level.
#[derive(Debug, Clone, PartialEq)]
pub struct EnemySpawn {
    pub entity: EntityId,
    pub kind: EnemyKind,
    pub roam: RoamType,
    pub grid: GridKey,
}

pub struct EnemyController {
    machine: StateMachine<EnemyState>,
    started: bool,
    death_cause: Option<DeathCause>,
    death_task: Option<TaskHandle>,
}

impl EnemyController {
    pub fn new(spawn: &EnemySpawn, player: EntityId, tuning: EnemyTuning, seed: u64) -> Self {
        let agent = EnemyAgent::new(
            spawn.entity,
            player,
            spawn.kind,
            spawn.roam,
            tuning,
            spawn.grid,
            seed,
        );
        Self {
            machine: StateMachine::new(
                "enemy",
                spawn.entity,
                agent,
                EnemyState::initial_for(spawn.kind),
            ),
            started: false,
            death_cause: None,
            death_task: None,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.machine.entity()
    }

    pub fn state(&self) -> EnemyState {
        self.machine.current()
    }

    pub fn agent(&self) -> &EnemyAgent {
        self.machine.agent()
    }

    pub fn is_dead(&self) -> bool {
        self.machine.agent().is_dead()
    }

    pub fn death_cause(&self) -> Option<DeathCause> {
        self.death_cause
    }

    /// Handle of the death sequence once `kill` has scheduled it.
    pub fn death_task(&self) -> Option<TaskHandle> {
        self.death_task
    }

    pub fn transitions(&self) -> u64 {
        self.machine.transitions()
    }

    /// Captures home and waypoints, then enters the kind's initial state.
    pub fn start(&mut self, ctx: &mut ScriptContext<'_>) {
        if self.started {
            return;
        }
        self.started = true;
        let agent = self.machine.agent_mut();
        agent.capture(ctx.host);
        agent.refresh_ray(ctx.host);
        let initial = EnemyState::initial_for(agent.kind);
        info!(
            entity = agent.entity.0,
            kind = ?agent.kind,
            roam = ?agent.roam,
            waypoints = agent.waypoints().len(),
            "enemy_started"
        );
        self.machine.set_current_state(initial, ctx);
    }

    /// One frame: contacts first, then the active state's update.
    pub fn update(&mut self, ctx: &mut ScriptContext<'_>) {
        if !self.started {
            self.start(ctx);
        }
        if self.is_dead() || ctx.flags.paused() {
            return;
        }
        self.handle_collisions(ctx);
        if self.is_dead() || ctx.flags.player_dead() {
            return;
        }
        let dt = ctx.host.delta_time();
        self.machine.do_action_update(ctx, dt);
    }

    pub fn handle_collisions(&mut self, ctx: &mut ScriptContext<'_>) {
        let entity = self.entity();
        for other in ctx.host.collided_entities(entity) {
            let Some(tag) = ctx.host.tag_of(other).map(str::to_owned) else {
                continue;
            };
            match classify_contact(&tag, ctx.flags.player_boosting()) {
                Contact::Lethal(cause) => {
                    self.kill(cause, ctx);
                    return;
                }
                Contact::Halt => self.machine.agent().stop(ctx.host),
                Contact::Ignore => {}
            }
        }
    }

    /// Starts the death sequence; false when the enemy was already dead.
    pub fn kill(&mut self, cause: DeathCause, ctx: &mut ScriptContext<'_>) -> bool {
        let agent = self.machine.agent_mut();
        if agent.dead {
            return false;
        }
        agent.dead = true;
        self.death_cause = Some(cause);
        let entity = agent.entity;
        let audio = death_audio(entity, agent.kind, cause, &mut agent.rng);
        let routine = DeathRoutine::new(
            entity,
            agent.player,
            agent.kind,
            cause,
            agent.rng,
            ctx.flags.clone(),
        );
        ctx.scheduler.schedule_tagged(DEATH_AUDIO_TAG, audio);
        self.machine.enemy_dead(ctx);
        self.death_task = Some(ctx.scheduler.schedule_tagged(DEATH_TAG, routine));
        info!(entity = entity.0, cause = cause.label(), "enemy_dying");
        true
    }

    pub fn notify_player_dead(&mut self, ctx: &mut ScriptContext<'_>) {
        debug!(entity = self.entity().0, "enemy_player_dead");
        self.machine.player_dead(ctx);
    }

    pub fn notify_lost_target(&mut self, ctx: &mut ScriptContext<'_>) {
        self.machine.lost_target(ctx);
    }

    pub fn transition_to(&mut self, state: EnemyState, ctx: &mut ScriptContext<'_>) {
        self.machine.set_current_state(state, ctx);
    }
}

impl std::fmt::Debug for EnemyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnemyController")
            .field("entity", &self.entity())
            .field("state", &self.state())
            .field("dead", &self.is_dead())
            .finish()
    }
}
