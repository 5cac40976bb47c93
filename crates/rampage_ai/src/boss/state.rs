use tracing::info;

use crate::state::{BehaviorState, ScriptContext};

use super::agent::BossAgent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BossState {
    /// Waiting for the fight to be activated.
    Dormant,
    Engaged,
    /// Player down; loops halted.
    Standby,
    Dying,
    Dead,
}

impl BehaviorState for BossState {
    type Agent = BossAgent;

    fn name(&self) -> &'static str {
        match self {
            Self::Dormant => "dormant",
            Self::Engaged => "engaged",
            Self::Standby => "standby",
            Self::Dying => "dying",
            Self::Dead => "dead",
        }
    }

    fn enter(&self, agent: &mut BossAgent, ctx: &mut ScriptContext<'_>) -> Option<Self> {
        match self {
            Self::Dormant => None,
            Self::Engaged => {
                agent.start_loops(ctx.scheduler);
                info!(boss = agent.entity.0, health = agent.health(), "boss_engaged");
                None
            }
            Self::Standby => {
                agent.stop_loops(ctx.scheduler);
                None
            }
            Self::Dying => {
                agent.stop_loops(ctx.scheduler);
                agent.dying_timer = agent.tuning.death_animation_seconds;
                info!(boss = agent.entity.0, "boss_dying");
                None
            }
            Self::Dead => {
                ctx.flags.set_boss_dead(true);
                agent.stop_music(ctx.host);
                info!(boss = agent.entity.0, "boss_defeated");
                None
            }
        }
    }

    fn do_action_update(
        &self,
        agent: &mut BossAgent,
        ctx: &mut ScriptContext<'_>,
        dt: f32,
    ) -> Option<Self> {
        match self {
            Self::Dormant => ctx.flags.boss_activated().then_some(Self::Engaged),
            Self::Engaged => agent.handle_collisions(ctx).then_some(Self::Dying),
            Self::Standby => (!ctx.flags.player_dead()).then_some(Self::Engaged),
            Self::Dying => {
                agent.dying_timer -= dt;
                (agent.dying_timer <= 0.0).then_some(Self::Dead)
            }
            Self::Dead => None,
        }
    }

    fn player_dead(&self, _agent: &mut BossAgent, _ctx: &mut ScriptContext<'_>) -> Option<Self> {
        (*self == Self::Engaged).then_some(Self::Standby)
    }
}
