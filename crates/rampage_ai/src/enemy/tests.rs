use std::rc::Rc;

use super::*;
use crate::config::EnemyTuning;
use crate::host::{Clock, DynHost, EntityId, GridCell, GridKey, Transform, Transforms, Vec2};
use crate::scheduler::Scheduler;
use crate::sim::SimWorld;
use crate::state::{GameFlags, ScriptContext};

const GRID: GridKey = GridKey(0);
const OUT_OF_SIGHT: Vec2 = Vec2 { x: 40.0, y: 40.0 };

struct Arena {
    world: SimWorld,
    scheduler: Scheduler<DynHost>,
    flags: Rc<GameFlags>,
    player: EntityId,
}

fn arena(player_at: Vec2) -> Arena {
    let mut world = SimWorld::new();
    world.add_grid(GRID, Vec2::new(-10.0, 10.0), 20, 20);
    let player = world.spawn_body(PLAYER_TAG, player_at);
    Arena {
        world,
        scheduler: Scheduler::new(),
        flags: GameFlags::shared(),
        player,
    }
}

fn enemy(a: &mut Arena, kind: EnemyKind, roam: RoamType, at: Vec2) -> EnemyController {
    enemy_with(a, kind, roam, at, EnemyTuning::default())
}

fn enemy_with(
    a: &mut Arena,
    kind: EnemyKind,
    roam: RoamType,
    at: Vec2,
    tuning: EnemyTuning,
) -> EnemyController {
    let entity = a.world.spawn_body("Enemy", at);
    let spawn = EnemySpawn {
        entity,
        kind,
        roam,
        grid: GRID,
    };
    EnemyController::new(&spawn, a.player, tuning, 7)
}

fn start(a: &mut Arena, controller: &mut EnemyController) {
    let mut ctx = ScriptContext::new(&mut a.world, &mut a.scheduler, &a.flags);
    controller.start(&mut ctx);
}

/// Steps the world, runs any injected contacts through the controller, then the scheduler.
fn tick_with(a: &mut Arena, controller: &mut EnemyController, dt: f32, contact: Option<EntityId>) {
    a.world.step(dt);
    if let Some(other) = contact {
        a.world.inject_collision(controller.entity(), other);
    }
    {
        let mut ctx = ScriptContext::new(&mut a.world, &mut a.scheduler, &a.flags);
        controller.update(&mut ctx);
    }
    let now = a.world.game_time();
    a.scheduler.tick(now, &mut a.world);
}

fn tick(a: &mut Arena, controller: &mut EnemyController, dt: f32) {
    tick_with(a, controller, dt, None);
}

fn velocity(a: &Arena, controller: &EnemyController) -> Vec2 {
    a.world.velocity(controller.entity()).unwrap_or_default()
}

fn assert_close(actual: f32, expected: f32) {
    assert!((actual - expected).abs() <= 1e-3, "{actual} vs {expected}");
}

#[test]
fn patrolling_enemy_without_waypoints_stays_static() {
    let mut a = arena(OUT_OF_SIGHT);
    let mut controller =
        enemy(&mut a, EnemyKind::Helpless, RoamType::Patrolling, Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);

    assert_eq!(controller.agent().roam, RoamType::Static);
    assert_eq!(controller.state(), EnemyState::Patrol);
    assert_eq!(a.scheduler.tagged_count(&controller.agent().patrol_tag()), 0);

    tick(&mut a, &mut controller, 0.1);
    assert_eq!(velocity(&a, &controller), Vec2::ZERO);
}

#[test]
fn patrol_heads_for_first_waypoint_and_keeps_one_retarget_task() {
    let mut a = arena(OUT_OF_SIGHT);
    let mut controller =
        enemy(&mut a, EnemyKind::Helpless, RoamType::Patrolling, Vec2::new(0.5, 0.5));
    let east = a.world.spawn_marker("Waypoint", Vec2::new(4.5, 0.5));
    let west = a.world.spawn_marker("Waypoint", Vec2::new(-3.5, 0.5));
    a.world.attach_child(controller.entity(), east);
    a.world.attach_child(controller.entity(), west);

    start(&mut a, &mut controller);
    assert_eq!(controller.agent().roam, RoamType::Patrolling);
    assert_eq!(controller.agent().waypoints().len(), 2);
    let tag = controller.agent().patrol_tag();
    assert_eq!(a.scheduler.tagged_count(&tag), 1);

    for _ in 0..5 {
        tick(&mut a, &mut controller, 0.1);
    }
    assert_eq!(controller.state(), EnemyState::Patrol);
    assert!(velocity(&a, &controller).x > 0.0);
    assert_eq!(a.scheduler.tagged_count(&tag), 1);
}

#[test]
fn patroller_walks_at_tuned_speed_until_the_falloff_distance() {
    let mut a = arena(OUT_OF_SIGHT);
    let mut controller =
        enemy(&mut a, EnemyKind::Helpless, RoamType::Patrolling, Vec2::new(-8.5, 0.5));
    let far_end = a.world.spawn_marker("Waypoint", Vec2::new(9.5, 0.5));
    a.world.attach_child(controller.entity(), far_end);
    start(&mut a, &mut controller);

    let tuned = EnemyTuning::default().patrol_speed;
    let mut moving_ticks = 0;
    for _ in 0..20 {
        tick(&mut a, &mut controller, 0.1);
        let position = a.world.position(controller.entity()).unwrap_or_default();
        let speed = velocity(&a, &controller).length();
        if speed > 0.0 && position.distance_sq(Vec2::new(9.5, 0.5)) > 100.0 {
            assert_close(speed, tuned);
            moving_ticks += 1;
        }
    }
    assert!(moving_ticks >= 15, "only {moving_ticks} ticks at full speed");
    let covered = a.world.position(controller.entity()).unwrap_or_default().x + 8.5;
    assert!(covered > 3.0, "covered {covered}");
}

#[test]
fn melee_enemy_chases_visible_player() {
    let mut a = arena(Vec2::new(0.5, 5.5));
    let mut controller = enemy(&mut a, EnemyKind::Melee, RoamType::Static, Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);

    tick(&mut a, &mut controller, 0.1);
    assert_eq!(controller.state(), EnemyState::Chase);

    tick(&mut a, &mut controller, 0.1);
    let velocity = velocity(&a, &controller);
    assert_close(velocity.x, 0.0);
    assert_close(velocity.y, EnemyTuning::default().speed);
}

#[test]
fn helpless_enemy_flees_from_player() {
    let mut a = arena(Vec2::new(0.5, 5.5));
    let mut controller =
        enemy(&mut a, EnemyKind::Helpless, RoamType::Static, Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);

    tick(&mut a, &mut controller, 0.1);
    assert_eq!(controller.state(), EnemyState::Run);
    tick(&mut a, &mut controller, 0.1);
    assert!(velocity(&a, &controller).y < 0.0);
}

#[test]
fn kinds_pick_their_initial_state() {
    let mut a = arena(OUT_OF_SIGHT);
    let mut melee = enemy(&mut a, EnemyKind::Melee, RoamType::Static, Vec2::new(0.5, 0.5));
    let mut helpless =
        enemy(&mut a, EnemyKind::Helpless, RoamType::Static, Vec2::new(-2.5, 0.5));
    start(&mut a, &mut melee);
    start(&mut a, &mut helpless);
    assert_eq!(melee.state(), EnemyState::Scan);
    assert_eq!(helpless.state(), EnemyState::Patrol);
}

#[test]
fn alert_kinds_start_engaged() {
    let mut a = arena(Vec2::new(0.5, 5.5));
    let mut melee = enemy(&mut a, EnemyKind::AlertMelee, RoamType::Static, Vec2::new(0.5, 0.5));
    let mut ranged =
        enemy(&mut a, EnemyKind::AlertRanged, RoamType::Static, Vec2::new(-2.5, 0.5));
    start(&mut a, &mut melee);
    start(&mut a, &mut ranged);
    assert_eq!(melee.state(), EnemyState::Chase);
    assert_eq!(ranged.state(), EnemyState::RangedSearch);
}

#[test]
fn ranged_enemy_fires_after_half_its_fire_rate() {
    let mut a = arena(Vec2::new(0.5, 5.5));
    let mut controller = enemy(&mut a, EnemyKind::Ranged, RoamType::Static, Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);

    tick(&mut a, &mut controller, 0.25);
    assert_eq!(controller.state(), EnemyState::RangedAttack);
    for _ in 0..4 {
        tick(&mut a, &mut controller, 0.25);
    }
    assert_eq!(a.world.spawned(ENEMY_BULLET_PREFAB), 0);

    tick(&mut a, &mut controller, 0.25);
    assert_eq!(a.world.spawned(ENEMY_BULLET_PREFAB), 1);
    assert_eq!(a.world.played(ENEMY_SHOT_CLIP), 1);
    assert_eq!(controller.agent().shots_fired(), 1);
    let bullet = &a.world.spawn_log()[0];
    assert_close(bullet.position.x, 0.5);
    assert_close(bullet.position.y, 1.5);
    assert_close(bullet.rotation_degrees, 0.0);

    tick(&mut a, &mut controller, 0.25);
    let side_step = velocity(&a, &controller);
    assert!(side_step.x < 0.0, "first shuffle goes left, got {side_step:?}");
}

#[test]
fn chase_loses_sight_behind_wall_and_searches() {
    let mut tuning = EnemyTuning::default();
    tuning.search_duration = 0.05;
    let mut a = arena(Vec2::new(6.5, 2.5));
    let mut controller = enemy_with(
        &mut a,
        EnemyKind::Melee,
        RoamType::Static,
        Vec2::new(0.5, 0.5),
        tuning,
    );
    start(&mut a, &mut controller);
    tick(&mut a, &mut controller, 0.1);
    assert_eq!(controller.state(), EnemyState::Chase);

    a.world.add_wall(GRID, GridCell::new(13, 8));
    tick(&mut a, &mut controller, 0.1);
    assert_eq!(controller.state(), EnemyState::MeleeSearch);
    assert_eq!(controller.agent().last_known_target, Vec2::new(6.5, 2.5));

    tick(&mut a, &mut controller, 0.1);
    assert_eq!(controller.state(), EnemyState::Patrol);
}

#[test]
fn search_without_path_falls_back_by_roam_type() {
    let mut a = arena(OUT_OF_SIGHT);
    let mut controller = enemy(&mut a, EnemyKind::Melee, RoamType::Static, Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);

    let mut ctx = ScriptContext::new(&mut a.world, &mut a.scheduler, &a.flags);
    controller.transition_to(EnemyState::MeleeSearch, &mut ctx);
    assert_eq!(controller.state(), EnemyState::ReturnHome);
}

#[test]
fn scan_sweeps_then_static_enemy_returns_home() {
    let mut a = arena(OUT_OF_SIGHT);
    let mut controller = enemy(&mut a, EnemyKind::Melee, RoamType::Static, Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);
    {
        let mut ctx = ScriptContext::new(&mut a.world, &mut a.scheduler, &a.flags);
        controller.transition_to(EnemyState::Scan, &mut ctx);
    }

    tick(&mut a, &mut controller, 0.5);
    let rotation = a
        .world
        .transform(controller.entity())
        .map(|transform| transform.rotation_degrees)
        .unwrap_or_default();
    assert_close(rotation, -105.0);

    for _ in 0..5 {
        tick(&mut a, &mut controller, 0.5);
    }
    assert_eq!(controller.state(), EnemyState::ReturnHome);

    tick(&mut a, &mut controller, 0.5);
    assert_eq!(controller.state(), EnemyState::Scan);
}

#[test]
fn scanning_enemy_reengages_by_family() {
    let mut a = arena(OUT_OF_SIGHT);
    let mut controller =
        enemy(&mut a, EnemyKind::AlertRanged, RoamType::Static, Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);
    {
        let mut ctx = ScriptContext::new(&mut a.world, &mut a.scheduler, &a.flags);
        controller.transition_to(EnemyState::Scan, &mut ctx);
    }
    a.world.set_position(a.player, Vec2::new(0.5, 3.5));
    a.world.set_transform(
        controller.entity(),
        Transform::at(Vec2::new(0.5, 0.5)),
    );
    let mut ctx = ScriptContext::new(&mut a.world, &mut a.scheduler, &a.flags);
    controller.update(&mut ctx);
    assert_eq!(controller.state(), EnemyState::RangedAttack);
}

#[test]
fn player_death_sends_attackers_back_to_patrol() {
    let mut a = arena(Vec2::new(0.5, 5.5));
    let mut controller = enemy(&mut a, EnemyKind::Ranged, RoamType::Static, Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);
    tick(&mut a, &mut controller, 0.1);
    assert_eq!(controller.state(), EnemyState::RangedAttack);

    a.flags.set_player_dead(true);
    let mut ctx = ScriptContext::new(&mut a.world, &mut a.scheduler, &a.flags);
    controller.notify_player_dead(&mut ctx);
    assert_eq!(controller.state(), EnemyState::Patrol);
}

#[test]
fn paused_enemy_does_not_act() {
    let mut a = arena(Vec2::new(0.5, 5.5));
    let mut controller = enemy(&mut a, EnemyKind::Melee, RoamType::Static, Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);
    a.flags.set_paused(true);
    tick(&mut a, &mut controller, 0.1);
    assert_eq!(controller.state(), EnemyState::Scan);
    assert_eq!(controller.transitions(), 1);
}

#[test]
fn contact_classification_follows_tags() {
    assert_eq!(
        classify_contact("MeleeKillZoneSpawn", false),
        Contact::Lethal(DeathCause::Katana)
    );
    assert_eq!(
        classify_contact("PlayerRailgunBullet", false),
        Contact::Lethal(DeathCause::Railgun)
    );
    assert_eq!(
        classify_contact("PlayerShotgunBullet", false),
        Contact::Lethal(DeathCause::Shotgun)
    );
    assert_eq!(classify_contact("PlayerBullet", false), Contact::Lethal(DeathCause::Gun));
    assert_eq!(classify_contact("Player", true), Contact::Lethal(DeathCause::Booster));
    assert_eq!(classify_contact("Player", false), Contact::Halt);
    assert_eq!(classify_contact("Wall", true), Contact::Ignore);
}

#[test]
fn bullet_kill_plays_audio_and_leaves_blood_pool_once() {
    let mut a = arena(OUT_OF_SIGHT);
    let mut controller = enemy(&mut a, EnemyKind::Melee, RoamType::Static, Vec2::new(0.5, 0.5));
    let bullet = a.world.spawn_body("PlayerBullet", Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);

    tick_with(&mut a, &mut controller, 0.1, Some(bullet));
    assert!(controller.is_dead());
    assert_eq!(controller.state(), EnemyState::Dead);
    assert_eq!(controller.death_cause(), Some(DeathCause::Gun));
    assert_eq!(a.world.played(BODY_DEATH_CLIPS[0]), 1);
    assert!(velocity(&a, &controller).length() >= 0.05 - 1e-4);
    assert_eq!(a.world.spawned(BLOOD_POOL_PREFAB), 0);

    tick_with(&mut a, &mut controller, 0.1, Some(bullet));
    assert_eq!(a.world.spawned(BLOOD_POOL_PREFAB), 1);
    assert_eq!(a.flags.kill_count(), 1);

    for _ in 0..5 {
        tick_with(&mut a, &mut controller, 0.1, Some(bullet));
    }
    let falls: usize = BODY_FALL_CLIPS.iter().map(|clip| a.world.played(clip)).sum();
    assert_eq!(falls, 1);
    assert_eq!(a.world.spawned(BLOOD_POOL_PREFAB), 1);
    assert_eq!(a.flags.kill_count(), 1);

    let mut ctx = ScriptContext::new(&mut a.world, &mut a.scheduler, &a.flags);
    assert!(!controller.kill(DeathCause::Railgun, &mut ctx));
}

#[test]
fn katana_kill_stabs_and_splits_the_body() {
    let mut a = arena(OUT_OF_SIGHT);
    let mut controller = enemy(&mut a, EnemyKind::Melee, RoamType::Static, Vec2::new(0.5, 0.5));
    let blade = a.world.spawn_body("MeleeKillZoneSpawn", Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);

    tick_with(&mut a, &mut controller, 0.1, Some(blade));
    assert_eq!(controller.death_cause(), Some(DeathCause::Katana));
    assert_eq!(a.world.spawned(TOP_HALF_PREFAB), 1);
    let first = a
        .world
        .audio_log()
        .first()
        .map(|event| event.clip.clone())
        .unwrap_or_default();
    assert!(BODY_STAB_CLIPS.contains(&first.as_str()), "first clip {first}");
}

#[test]
fn boosting_player_kills_but_walking_player_only_halts() {
    let mut a = arena(Vec2::new(0.5, 5.5));
    let mut controller = enemy(&mut a, EnemyKind::Melee, RoamType::Static, Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);
    tick(&mut a, &mut controller, 0.1);
    tick(&mut a, &mut controller, 0.1);
    assert_eq!(controller.state(), EnemyState::Chase);

    let player = a.player;
    tick_with(&mut a, &mut controller, 0.1, Some(player));
    assert!(!controller.is_dead());

    a.flags.set_player_boosting(true);
    tick_with(&mut a, &mut controller, 0.1, Some(player));
    assert_eq!(controller.death_cause(), Some(DeathCause::Booster));
}

#[test]
fn ranged_enemy_drops_in_place() {
    let mut a = arena(OUT_OF_SIGHT);
    let mut controller = enemy(&mut a, EnemyKind::Ranged, RoamType::Static, Vec2::new(0.5, 0.5));
    let shot = a.world.spawn_body("PlayerShotgunBullet", Vec2::new(0.5, 0.5));
    start(&mut a, &mut controller);

    tick_with(&mut a, &mut controller, 0.1, Some(shot));
    assert_eq!(a.world.played(RANGED_DEATH_CLIP), 1);
    assert_eq!(velocity(&a, &controller), Vec2::ZERO);
}
