use crate::host::Transforms;
use crate::state::{BehaviorState, ScriptContext};

use super::agent::{ChaseProgress, EnemyAgent, EnemyKind, RoamType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyState {
    Patrol,
    Chase,
    MeleeSearch,
    RangedAttack,
    RangedSearch,
    ReturnHome,
    Run,
    Scan,
    Dead,
}

impl EnemyState {
    /// Where an enemy of `kind` begins.
    pub fn initial_for(kind: EnemyKind) -> Self {
        match kind {
            EnemyKind::Helpless => Self::Patrol,
            EnemyKind::Melee | EnemyKind::Ranged => Self::Scan,
            EnemyKind::AlertMelee => Self::Chase,
            EnemyKind::AlertRanged => Self::RangedSearch,
        }
    }

    /// Reaction of `kind` on sighting the player.
    pub fn engage(kind: EnemyKind) -> Self {
        match kind {
            EnemyKind::Helpless => Self::Run,
            EnemyKind::Melee | EnemyKind::AlertMelee => Self::Chase,
            EnemyKind::Ranged | EnemyKind::AlertRanged => Self::RangedAttack,
        }
    }

    pub fn is_alive(self) -> bool {
        self != Self::Dead
    }
}

/// Where to go once a path runs out or cannot be planned.
fn lost_path_fallback(agent: &EnemyAgent) -> EnemyState {
    match agent.roam {
        RoamType::Patrolling => EnemyState::Patrol,
        RoamType::Static => EnemyState::ReturnHome,
    }
}

fn walk_to_last_known(agent: &mut EnemyAgent, ctx: &mut ScriptContext<'_>) -> Option<EnemyState> {
    match agent.follow_chase_path(ctx.host) {
        ChaseProgress::Moving => None,
        ChaseProgress::Arrived => Some(EnemyState::Scan),
        ChaseProgress::NoPath => Some(lost_path_fallback(agent)),
    }
}

fn search(
    agent: &mut EnemyAgent,
    ctx: &mut ScriptContext<'_>,
    dt: f32,
    on_sight: EnemyState,
) -> Option<EnemyState> {
    if agent.refresh_sight(ctx.host) {
        return Some(on_sight);
    }
    if let Some(next) = walk_to_last_known(agent, ctx) {
        return Some(next);
    }
    agent.search_timer -= dt;
    (agent.search_timer <= 0.0).then_some(EnemyState::Patrol)
}

impl BehaviorState for EnemyState {
    type Agent = EnemyAgent;

    fn name(&self) -> &'static str {
        match self {
            Self::Patrol => "patrol",
            Self::Chase => "chase",
            Self::MeleeSearch => "melee_search",
            Self::RangedAttack => "ranged_attack",
            Self::RangedSearch => "ranged_search",
            Self::ReturnHome => "return_home",
            Self::Run => "run",
            Self::Scan => "scan",
            Self::Dead => "dead",
        }
    }

    fn enter(&self, agent: &mut EnemyAgent, ctx: &mut ScriptContext<'_>) -> Option<Self> {
        if *self != Self::Patrol {
            agent.stop_patrol(ctx.scheduler);
        }
        match self {
            Self::Patrol => {
                if agent.roam == RoamType::Patrolling && agent.set_initial_patrol_path(ctx.host) {
                    agent.patrol_step(ctx.host, ctx.scheduler);
                }
                None
            }
            Self::MeleeSearch | Self::RangedSearch => {
                (!agent.begin_search(ctx.host)).then(|| lost_path_fallback(agent))
            }
            Self::RangedAttack => {
                agent.begin_ranged_attack(ctx.host);
                None
            }
            Self::ReturnHome => (!agent.begin_return_home(ctx.host)).then_some(Self::Patrol),
            Self::Scan => {
                agent.begin_scan(ctx.host);
                None
            }
            Self::Dead => {
                agent.stop(ctx.host);
                None
            }
            Self::Chase | Self::Run => None,
        }
    }

    fn do_action_update(
        &self,
        agent: &mut EnemyAgent,
        ctx: &mut ScriptContext<'_>,
        dt: f32,
    ) -> Option<Self> {
        match self {
            Self::Patrol => {
                if agent.refresh_sight(ctx.host) {
                    return Some(Self::engage(agent.kind));
                }
                agent.patrol_step(ctx.host, ctx.scheduler);
                None
            }
            Self::Chase => {
                if !agent.refresh_ray(ctx.host) {
                    return self.lost_target(agent, ctx);
                }
                agent.run_at_player(ctx.host);
                None
            }
            Self::MeleeSearch => search(agent, ctx, dt, Self::Chase),
            Self::RangedSearch => search(agent, ctx, dt, Self::RangedAttack),
            Self::RangedAttack => {
                agent.face_player(ctx.host);
                if !agent.refresh_sight(ctx.host) {
                    return self.lost_target(agent, ctx);
                }
                agent.ranged_attack_step(ctx.host, dt);
                None
            }
            Self::ReturnHome => {
                if agent.refresh_sight(ctx.host) {
                    return Some(Self::engage(agent.kind));
                }
                walk_to_last_known(agent, ctx)
            }
            Self::Run => {
                if !agent.refresh_ray(ctx.host) {
                    return self.lost_target(agent, ctx);
                }
                agent.run_from_player(ctx.host);
                None
            }
            Self::Scan => {
                agent.scan_time += dt;
                if agent.scan_time >= agent.tuning.scan_duration {
                    return Some(lost_path_fallback(agent));
                }
                if agent.refresh_sight(ctx.host) {
                    return Some(Self::engage(agent.kind));
                }
                ctx.host.set_rotation(agent.entity, agent.scan_rotation());
                None
            }
            Self::Dead => None,
        }
    }

    fn lost_target(&self, _agent: &mut EnemyAgent, _ctx: &mut ScriptContext<'_>) -> Option<Self> {
        match self {
            Self::Chase => Some(Self::MeleeSearch),
            Self::RangedAttack => Some(Self::RangedSearch),
            Self::Run => Some(Self::Patrol),
            _ => None,
        }
    }

    fn player_dead(&self, agent: &mut EnemyAgent, ctx: &mut ScriptContext<'_>) -> Option<Self> {
        match self {
            Self::MeleeSearch | Self::RangedSearch | Self::RangedAttack | Self::Scan => {
                Some(Self::Patrol)
            }
            Self::Chase | Self::Run => {
                agent.stop(ctx.host);
                None
            }
            _ => None,
        }
    }

    fn enemy_dead(&self, _agent: &mut EnemyAgent, _ctx: &mut ScriptContext<'_>) -> Option<Self> {
        self.is_alive().then_some(Self::Dead)
    }
}
