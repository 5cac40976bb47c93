use std::cell::Cell;
use std::fmt::Debug;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::host::{DynHost, EntityId};
use crate::scheduler::Scheduler;

/// Longest chain of entry redirects followed by one transition.
pub const MAX_ENTRY_REDIRECTS: usize = 8;

/// Cross-entity flags read by every script. Written during one tick, read on the next.
#[derive(Debug, Default)]
pub struct GameFlags {
    player_dead: Cell<bool>,
    paused: Cell<bool>,
    boss_activated: Cell<bool>,
    boss_dead: Cell<bool>,
    player_boosting: Cell<bool>,
    kill_count: Cell<u32>,
}

impl GameFlags {
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn player_dead(&self) -> bool {
        self.player_dead.get()
    }

    pub fn set_player_dead(&self, dead: bool) {
        self.player_dead.set(dead);
    }

    pub fn paused(&self) -> bool {
        self.paused.get()
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.set(paused);
    }

    pub fn boss_activated(&self) -> bool {
        self.boss_activated.get()
    }

    pub fn set_boss_activated(&self, activated: bool) {
        self.boss_activated.set(activated);
    }

    pub fn boss_dead(&self) -> bool {
        self.boss_dead.get()
    }

    pub fn set_boss_dead(&self, dead: bool) {
        self.boss_dead.set(dead);
    }

    pub fn player_boosting(&self) -> bool {
        self.player_boosting.get()
    }

    pub fn set_player_boosting(&self, boosting: bool) {
        self.player_boosting.set(boosting);
    }

    pub fn kill_count(&self) -> u32 {
        self.kill_count.get()
    }

    pub fn record_kill(&self) -> u32 {
        let count = self.kill_count.get().saturating_add(1);
        self.kill_count.set(count);
        count
    }

    pub fn reset(&self) {
        self.player_dead.set(false);
        self.paused.set(false);
        self.boss_activated.set(false);
        self.boss_dead.set(false);
        self.player_boosting.set(false);
        self.kill_count.set(0);
    }
}

/// What a behavior script may touch while handling an event.
pub struct ScriptContext<'a> {
    pub host: &'a mut DynHost,
    pub scheduler: &'a mut Scheduler<DynHost>,
    pub flags: &'a Rc<GameFlags>,
}

impl<'a> ScriptContext<'a> {
    pub fn new(
        host: &'a mut DynHost,
        scheduler: &'a mut Scheduler<DynHost>,
        flags: &'a Rc<GameFlags>,
    ) -> Self {
        Self {
            host,
            scheduler,
            flags,
        }
    }
}

/// One node of an agent's state graph.
///
/// Hooks return the state to switch to, or `None` to stay. `enter` runs when
/// the state is installed and may itself redirect when its preconditions fail.
pub trait BehaviorState: Copy + Debug + PartialEq {
    type Agent;

    fn name(&self) -> &'static str;

    fn enter(&self, _agent: &mut Self::Agent, _ctx: &mut ScriptContext<'_>) -> Option<Self> {
        None
    }

    fn do_action_update(
        &self,
        agent: &mut Self::Agent,
        ctx: &mut ScriptContext<'_>,
        dt: f32,
    ) -> Option<Self>;

    fn lost_target(&self, _agent: &mut Self::Agent, _ctx: &mut ScriptContext<'_>) -> Option<Self> {
        None
    }

    fn player_dead(&self, _agent: &mut Self::Agent, _ctx: &mut ScriptContext<'_>) -> Option<Self> {
        None
    }

    fn enemy_dead(&self, _agent: &mut Self::Agent, _ctx: &mut ScriptContext<'_>) -> Option<Self> {
        None
    }
}

/// Owns an agent and its single active state.
pub struct StateMachine<S: BehaviorState> {
    kind: &'static str,
    entity: EntityId,
    agent: S::Agent,
    current: S,
    transitions: u64,
}

impl<S: BehaviorState> StateMachine<S> {
    /// Builds the machine without entering `initial`; call [`Self::set_current_state`] to start.
    pub fn new(kind: &'static str, entity: EntityId, agent: S::Agent, initial: S) -> Self {
        Self {
            kind,
            entity,
            agent,
            current: initial,
            transitions: 0,
        }
    }

    pub fn current(&self) -> S {
        self.current
    }

    pub fn agent(&self) -> &S::Agent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut S::Agent {
        &mut self.agent
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Installs `state` and runs its entry, following redirects until one settles.
    pub fn set_current_state(&mut self, state: S, ctx: &mut ScriptContext<'_>) {
        let mut next = state;
        for _ in 0..MAX_ENTRY_REDIRECTS {
            self.install(next);
            match next.enter(&mut self.agent, ctx) {
                Some(redirect) => next = redirect,
                None => return,
            }
        }
        warn!(
            kind = self.kind,
            entity = self.entity.0,
            state = self.current.name(),
            "state_redirect_limit"
        );
    }

    fn install(&mut self, next: S) {
        debug!(
            kind = self.kind,
            entity = self.entity.0,
            from = self.current.name(),
            to = next.name(),
            "state_changed"
        );
        self.current = next;
        self.transitions += 1;
    }

    fn follow(&mut self, next: Option<S>, ctx: &mut ScriptContext<'_>) {
        if let Some(next) = next {
            self.set_current_state(next, ctx);
        }
    }

    pub fn do_action_update(&mut self, ctx: &mut ScriptContext<'_>, dt: f32) {
        let next = self.current.do_action_update(&mut self.agent, ctx, dt);
        self.follow(next, ctx);
    }

    pub fn lost_target(&mut self, ctx: &mut ScriptContext<'_>) {
        let next = self.current.lost_target(&mut self.agent, ctx);
        self.follow(next, ctx);
    }

    pub fn player_dead(&mut self, ctx: &mut ScriptContext<'_>) {
        let next = self.current.player_dead(&mut self.agent, ctx);
        self.follow(next, ctx);
    }

    pub fn enemy_dead(&mut self, ctx: &mut ScriptContext<'_>) {
        let next = self.current.enemy_dead(&mut self.agent, ctx);
        self.follow(next, ctx);
    }
}
