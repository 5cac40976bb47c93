use rampage_ai::boss::GAME_CONTROLLER_TAG;
use rampage_ai::enemy::PLAYER_TAG;
use rampage_ai::{
    EnemyKind, EnemySpawn, EntityId, GameSession, GridCell, GridKey, RoamType, SimWorld,
    Tuning, Vec2,
};
use tracing::info;

const GRID: GridKey = GridKey(0);
const GRID_ANCHOR: Vec2 = Vec2 { x: -12.0, y: 12.0 };
const GRID_SIZE: i32 = 24;

const PLAYER_START: Vec2 = Vec2 { x: 0.5, y: -8.5 };
const BOSS_START: Vec2 = Vec2 { x: 0.5, y: 9.5 };
const BOSS_SPAWN_POINTS: [Vec2; 2] = [Vec2 { x: -6.5, y: 8.5 }, Vec2 { x: 6.5, y: 8.5 }];

#[derive(Debug, Clone, Copy, PartialEq)]
enum ArenaAction {
    Shoot(usize),
    Slash(usize),
    ActivateBoss,
    ShootBoss,
    SlashBoss,
    TogglePause,
    KillPlayer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ArenaEvent {
    /// Unscaled seconds since the run started.
    at: f32,
    action: ArenaAction,
}

/// Scripted level: static geometry plus a timeline of player actions.
#[derive(Debug)]
pub(crate) struct Arena {
    enemies: Vec<EntityId>,
    boss: EntityId,
    bullet: EntityId,
    blade: EntityId,
    timeline: Vec<ArenaEvent>,
    cursor: usize,
}

impl Arena {
    pub(crate) fn build(world: &mut SimWorld, tuning: Tuning, seed: u64) -> (Self, GameSession) {
        world.add_grid(GRID, GRID_ANCHOR, GRID_SIZE, GRID_SIZE);
        for x in 8..=15 {
            world.add_wall(GRID, GridCell::new(x, 14));
        }

        let player = world.spawn_body(PLAYER_TAG, PLAYER_START);
        let mut session = GameSession::new(player, tuning, seed);

        let placements = [
            (EnemyKind::Melee, RoamType::Static, Vec2::new(-4.5, 4.5)),
            (EnemyKind::Ranged, RoamType::Static, Vec2::new(4.5, 4.5)),
            (EnemyKind::Helpless, RoamType::Patrolling, Vec2::new(0.5, 1.5)),
            (EnemyKind::AlertRanged, RoamType::Static, Vec2::new(8.5, -0.5)),
        ];
        let mut enemies = Vec::with_capacity(placements.len());
        for (kind, roam, at) in placements {
            let entity = world.spawn_body("Enemy", at);
            if roam == RoamType::Patrolling {
                for waypoint in [Vec2::new(-5.5, 1.5), Vec2::new(5.5, 1.5)] {
                    let marker = world.spawn_marker("Waypoint", waypoint);
                    world.attach_child(entity, marker);
                }
            }
            session.add_enemy(&EnemySpawn {
                entity,
                kind,
                roam,
                grid: GRID,
            });
            enemies.push(entity);
        }

        let boss = world.spawn_body("Boss", BOSS_START);
        for point in BOSS_SPAWN_POINTS {
            let marker = world.spawn_marker("BossSpawnPoint", point);
            world.attach_child(boss, marker);
        }
        session.set_boss(boss, GRID);
        world.spawn_marker(GAME_CONTROLLER_TAG, Vec2::ZERO);

        let bullet = world.spawn_body("PlayerBullet", PLAYER_START);
        let blade = world.spawn_body("MeleeKillZoneSpawn", PLAYER_START);

        info!(
            enemies = enemies.len(),
            boss = boss.0,
            entities = world.entity_count(),
            "arena_built"
        );
        let arena = Self {
            enemies,
            boss,
            bullet,
            blade,
            timeline: timeline(),
            cursor: 0,
        };
        (arena, session)
    }

    /// Applies every timeline event due by `elapsed`; call after stepping the world.
    pub(crate) fn apply_due(&mut self, elapsed: f32, world: &mut SimWorld, session: &mut GameSession) {
        while let Some(event) = self.timeline.get(self.cursor).copied() {
            if event.at > elapsed {
                break;
            }
            self.cursor += 1;
            self.apply(event.action, world, session);
        }
    }

    fn apply(&self, action: ArenaAction, world: &mut SimWorld, session: &mut GameSession) {
        match action {
            ArenaAction::Shoot(index) => {
                if let Some(enemy) = self.enemies.get(index) {
                    world.inject_collision(*enemy, self.bullet);
                }
            }
            ArenaAction::Slash(index) => {
                if let Some(enemy) = self.enemies.get(index) {
                    world.inject_collision(*enemy, self.blade);
                }
            }
            ArenaAction::ActivateBoss => session.flags().set_boss_activated(true),
            ArenaAction::ShootBoss => world.inject_collision(self.boss, self.bullet),
            ArenaAction::SlashBoss => world.inject_collision(self.boss, self.blade),
            ArenaAction::TogglePause => {
                session.toggle_pause(world);
            }
            ArenaAction::KillPlayer => session.notify_player_dead(world),
        }
        info!(action = ?action, "arena_event");
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.cursor >= self.timeline.len()
    }
}

fn event(at: f32, action: ArenaAction) -> ArenaEvent {
    ArenaEvent { at, action }
}

fn timeline() -> Vec<ArenaEvent> {
    let mut events = vec![
        event(2.0, ArenaAction::Shoot(0)),
        event(3.5, ArenaAction::Slash(2)),
        event(5.0, ArenaAction::ActivateBoss),
        event(12.2, ArenaAction::TogglePause),
        event(13.2, ArenaAction::TogglePause),
        event(15.0, ArenaAction::Shoot(1)),
        event(26.0, ArenaAction::KillPlayer),
    ];
    // Boss pressure: two shots then a slash, every half second.
    events.extend((0..40).map(|hit| {
        let action = if hit % 3 == 2 {
            ArenaAction::SlashBoss
        } else {
            ArenaAction::ShootBoss
        };
        event(6.0 + hit as f32 * 0.5, action)
    }));
    events.sort_by(|a, b| a.at.total_cmp(&b.at));
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_is_ordered() {
        let events = timeline();
        assert!(events.windows(2).all(|pair| pair[0].at <= pair[1].at));
        assert_eq!(
            events
                .iter()
                .filter(|event| event.action == ArenaAction::TogglePause)
                .count(),
            2
        );
    }

    #[test]
    fn build_registers_enemies_and_boss() {
        let mut world = SimWorld::new();
        let (arena, session) = Arena::build(&mut world, Tuning::default(), 3);
        assert_eq!(session.enemies().len(), 4);
        assert!(session.boss().is_some());
        assert_eq!(world.count_tagged("Waypoint"), 2);
        assert_eq!(world.count_tagged("BossSpawnPoint"), 2);
        assert!(!arena.is_finished());
    }

    #[test]
    fn due_events_apply_once_in_order() {
        let mut world = SimWorld::new();
        let (mut arena, mut session) = Arena::build(&mut world, Tuning::default(), 3);
        arena.apply_due(5.0, &mut world, &mut session);
        assert_eq!(arena.cursor, 3);
        assert!(session.flags().boss_activated());

        arena.apply_due(5.0, &mut world, &mut session);
        assert_eq!(arena.cursor, 3);

        arena.apply_due(100.0, &mut world, &mut session);
        assert!(arena.is_finished());
        assert!(session.flags().player_dead());
    }
}
