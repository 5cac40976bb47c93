//! Per-level driver: one scheduler, the shared flags and every scripted actor.

use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info};

use crate::boss::BossController;
use crate::config::Tuning;
use crate::enemy::{EnemyController, EnemyKind, EnemySpawn, RoamType};
use crate::host::{Clock, DynHost, EntityId, GridKey};
use crate::scheduler::{Scheduler, TickReport};
use crate::state::{GameFlags, ScriptContext};

/// Snapshot of a running session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub ticks: u64,
    pub live_tasks: usize,
    pub live_enemies: usize,
    pub kills: u32,
    pub paused: bool,
}

pub struct GameSession {
    scheduler: Scheduler<DynHost>,
    flags: Rc<GameFlags>,
    tuning: Tuning,
    player: EntityId,
    seed: u64,
    enemies: Vec<EnemyController>,
    boss: Option<BossController>,
    reinforcement_grid: GridKey,
    resume_time_scale: f32,
    ticks: u64,
}

impl GameSession {
    pub fn new(player: EntityId, tuning: Tuning, seed: u64) -> Self {
        Self {
            scheduler: Scheduler::new(),
            flags: GameFlags::shared(),
            tuning,
            player,
            seed,
            enemies: Vec::new(),
            boss: None,
            reinforcement_grid: GridKey(0),
            resume_time_scale: 1.0,
            ticks: 0,
        }
    }

    pub fn flags(&self) -> &Rc<GameFlags> {
        &self.flags
    }

    pub fn scheduler(&self) -> &Scheduler<DynHost> {
        &self.scheduler
    }

    pub fn enemies(&self) -> &[EnemyController] {
        &self.enemies
    }

    pub fn boss(&self) -> Option<&BossController> {
        self.boss.as_ref()
    }

    pub fn add_enemy(&mut self, spawn: &EnemySpawn) {
        let controller =
            EnemyController::new(spawn, self.player, self.tuning.enemy.clone(), self.seed);
        debug!(enemy = spawn.entity.0, kind = ?spawn.kind, "session_enemy_added");
        self.enemies.push(controller);
    }

    /// Installs the boss; reinforcements it spawns navigate on `grid`.
    pub fn set_boss(&mut self, entity: EntityId, grid: GridKey) {
        self.boss = Some(BossController::new(entity, self.tuning.boss.clone(), self.seed));
        self.reinforcement_grid = grid;
    }

    /// Runs one frame: due tasks first, then every actor with the host's delta time.
    pub fn tick(&mut self, host: &mut DynHost) -> TickReport {
        let now = host.game_time();
        let report = self.scheduler.tick(now, &mut *host);
        self.ticks += 1;

        let mut ctx = ScriptContext::new(host, &mut self.scheduler, &self.flags);
        for enemy in &mut self.enemies {
            enemy.update(&mut ctx);
        }
        let reinforcements = match self.boss.as_mut() {
            Some(boss) => {
                boss.update(&mut ctx);
                boss.take_spawned()
            }
            None => Vec::new(),
        };
        for entity in reinforcements {
            self.add_enemy(&EnemySpawn {
                entity,
                kind: EnemyKind::AlertMelee,
                roam: RoamType::Static,
                grid: self.reinforcement_grid,
            });
        }
        self.prune_dead();
        report
    }

    /// Drops enemies whose death sequence has left the scheduler.
    fn prune_dead(&mut self) {
        let scheduler = &self.scheduler;
        let before = self.enemies.len();
        self.enemies.retain(|enemy| {
            !enemy.is_dead()
                || enemy
                    .death_task()
                    .is_some_and(|handle| scheduler.contains(handle))
        });
        let pruned = before - self.enemies.len();
        if pruned > 0 {
            debug!(pruned, remaining = self.enemies.len(), "session_enemies_pruned");
        }
    }

    /// Freezes or thaws every task and the host clock; returns the new paused flag.
    pub fn toggle_pause(&mut self, host: &mut DynHost) -> bool {
        let now = host.game_time();
        let paused = !self.flags.paused();
        if paused {
            self.resume_time_scale = match host.time_scale() {
                scale if scale > 0.0 => scale,
                _ => 1.0,
            };
            self.scheduler.pause_all(now);
            host.set_time_scale(0.0);
        } else {
            self.scheduler.resume_all(now);
            host.set_time_scale(self.resume_time_scale);
        }
        self.flags.set_paused(paused);
        info!(paused, tasks = self.scheduler.len(), "game_pause_toggled");
        paused
    }

    /// Drops every task and actor so the level can be rebuilt from scratch.
    pub fn restart(&mut self, host: &mut DynHost) {
        let cancelled = self.scheduler.cancel_all();
        host.set_time_scale(1.0);
        self.resume_time_scale = 1.0;
        self.flags.reset();
        self.enemies.clear();
        self.boss = None;
        info!(cancelled, "game_restarted");
    }

    pub fn notify_player_dead(&mut self, host: &mut DynHost) {
        self.flags.set_player_dead(true);
        let mut ctx = ScriptContext::new(host, &mut self.scheduler, &self.flags);
        for enemy in &mut self.enemies {
            enemy.notify_player_dead(&mut ctx);
        }
        if let Some(boss) = self.boss.as_mut() {
            boss.notify_player_dead(&mut ctx);
        }
        info!(player = self.player.0, "player_dead");
    }

    pub fn live_enemies(&self) -> usize {
        self.enemies.iter().filter(|enemy| !enemy.is_dead()).count()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            ticks: self.ticks,
            live_tasks: self.scheduler.len(),
            live_enemies: self.live_enemies(),
            kills: self.flags.kill_count(),
            paused: self.flags.paused(),
        }
    }
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("player", &self.player)
            .field("enemies", &self.enemies.len())
            .field("boss", &self.boss)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boss::{BossState, ALERT_ENEMY_PREFABS};
    use crate::enemy::{EnemyState, PLAYER_TAG};
    use crate::host::{Transforms, Vec2};
    use crate::sim::SimWorld;

    const GRID: GridKey = GridKey(0);

    fn level() -> (SimWorld, GameSession) {
        let mut world = SimWorld::new();
        world.add_grid(GRID, Vec2::new(-10.0, 10.0), 20, 20);
        let player = world.spawn_body(PLAYER_TAG, Vec2::new(0.5, 5.5));
        (world, GameSession::new(player, Tuning::default(), 5))
    }

    fn add(world: &mut SimWorld, session: &mut GameSession, kind: EnemyKind) -> EntityId {
        let entity = world.spawn_body("Enemy", Vec2::new(0.5, 0.5));
        session.add_enemy(&EnemySpawn {
            entity,
            kind,
            roam: RoamType::Static,
            grid: GRID,
        });
        entity
    }

    fn run(world: &mut SimWorld, session: &mut GameSession, frames: usize) {
        for _ in 0..frames {
            world.step(0.1);
            session.tick(world);
        }
    }

    #[test]
    fn tick_drives_enemies() {
        let (mut world, mut session) = level();
        add(&mut world, &mut session, EnemyKind::Melee);
        run(&mut world, &mut session, 2);
        assert_eq!(session.enemies()[0].state(), EnemyState::Chase);
        assert_eq!(session.stats().ticks, 2);
        assert_eq!(session.live_enemies(), 1);
    }

    #[test]
    fn kills_are_counted_after_the_death_task_runs() {
        let (mut world, mut session) = level();
        let enemy = add(&mut world, &mut session, EnemyKind::Melee);
        run(&mut world, &mut session, 1);
        let bullet = world.spawn_body("PlayerBullet", Vec2::new(0.5, 0.5));

        world.step(0.1);
        world.inject_collision(enemy, bullet);
        session.tick(&mut world);
        assert_eq!(session.live_enemies(), 0);

        run(&mut world, &mut session, 4);
        assert_eq!(session.stats().kills, 1);
    }

    #[test]
    fn dead_enemies_leave_the_roster_once_their_death_task_ends() {
        let (mut world, mut session) = level();
        let doomed = add(&mut world, &mut session, EnemyKind::Melee);
        let survivor = add(&mut world, &mut session, EnemyKind::Ranged);
        run(&mut world, &mut session, 1);
        let blade = world.spawn_body("MeleeKillZoneSpawn", Vec2::new(0.5, 0.5));

        world.step(0.1);
        world.inject_collision(doomed, blade);
        session.tick(&mut world);
        assert_eq!(session.enemies().len(), 2);
        let handle = session.enemies()[0].death_task();
        assert!(handle.is_some_and(|handle| session.scheduler().contains(handle)));

        run(&mut world, &mut session, 4);
        assert_eq!(session.stats().kills, 1);
        assert_eq!(session.enemies().len(), 1);
        assert_eq!(session.enemies()[0].entity(), survivor);
        assert_eq!(session.live_enemies(), 1);
    }

    #[test]
    fn pause_freezes_tasks_and_clock() {
        let (mut world, mut session) = level();
        add(&mut world, &mut session, EnemyKind::Melee);
        run(&mut world, &mut session, 2);
        world.set_time_scale(0.5);

        assert!(session.toggle_pause(&mut world));
        assert!(session.flags().paused());
        assert_eq!(world.time_scale(), 0.0);
        let before = world.game_time();
        run(&mut world, &mut session, 3);
        assert_eq!(world.game_time(), before);

        assert!(!session.toggle_pause(&mut world));
        assert!(!session.flags().paused());
        assert_eq!(world.time_scale(), 0.5);
    }

    #[test]
    fn restart_clears_everything() {
        let (mut world, mut session) = level();
        add(&mut world, &mut session, EnemyKind::Helpless);
        run(&mut world, &mut session, 2);
        session.toggle_pause(&mut world);
        session.flags().record_kill();

        session.restart(&mut world);
        assert!(session.scheduler().is_empty());
        assert_eq!(world.time_scale(), 1.0);
        assert_eq!(session.stats().kills, 0);
        assert!(!session.flags().paused());
        assert!(session.enemies().is_empty());
    }

    #[test]
    fn player_death_reaches_every_actor() {
        let (mut world, mut session) = level();
        add(&mut world, &mut session, EnemyKind::Ranged);
        let boss = world.spawn_body("Boss", Vec2::new(0.0, 8.0));
        session.set_boss(boss, GRID);
        session.flags().set_boss_activated(true);
        run(&mut world, &mut session, 2);
        assert_eq!(session.enemies()[0].state(), EnemyState::RangedAttack);
        assert_eq!(session.boss().map(|boss| boss.state()), Some(BossState::Engaged));

        session.notify_player_dead(&mut world);
        assert!(session.flags().player_dead());
        assert_eq!(session.enemies()[0].state(), EnemyState::Patrol);
        assert_eq!(session.boss().map(|boss| boss.state()), Some(BossState::Standby));
    }

    #[test]
    fn boss_reinforcements_join_as_alert_melee() {
        let (mut world, mut session) = level();
        let boss = world.spawn_body("Boss", Vec2::new(0.0, 8.0));
        let point = world.spawn_marker("BossSpawnPoint", Vec2::new(3.0, 5.0));
        world.attach_child(boss, point);
        session.set_boss(boss, GRID);
        session.flags().set_boss_activated(true);

        run(&mut world, &mut session, 60);
        let spawned = world.spawned(ALERT_ENEMY_PREFABS[0]);
        assert!(spawned >= 1);
        assert_eq!(session.enemies().len(), spawned);
        for enemy in session.enemies() {
            assert_eq!(enemy.agent().kind, EnemyKind::AlertMelee);
            assert!(world.position(enemy.entity()).is_some());
        }
    }
}
