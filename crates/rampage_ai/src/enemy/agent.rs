use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use crate::config::EnemyTuning;
use crate::host::{Audio, DynHost, EntityId, GridKey, Lifecycle, Transforms, Vec2};
use crate::movement::{self, Gait, GridFrame, PathFollower, PathProgress};
use crate::perception::{self, FieldOfView};
use crate::rng::Lcg;
use crate::scheduler::{Routine, RoutineResult, Scheduler, Spawner, Step};

pub const ENEMY_BULLET_PREFAB: &str = "prefab_enemyBullet";
pub const ENEMY_SHOT_CLIP: &str = "aud_railgunShot01.wav";
/// Distance ahead of the muzzle at which bullets appear.
const MUZZLE_OFFSET: f32 = 1.0;
/// Shuffle timer at the start of a ranged attack, as a fraction of the fire rate.
const FIRST_SHUFFLE_FACTOR: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyKind {
    Helpless,
    Melee,
    Ranged,
    AlertMelee,
    AlertRanged,
}

impl EnemyKind {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(Self::Helpless),
            1 => Some(Self::Melee),
            2 => Some(Self::Ranged),
            3 => Some(Self::AlertMelee),
            4 => Some(Self::AlertRanged),
            _ => None,
        }
    }

    pub fn is_ranged(self) -> bool {
        matches!(self, Self::Ranged | Self::AlertRanged)
    }

    /// Helpless enemies fall like melee ones.
    pub fn is_melee_family(self) -> bool {
        !self.is_ranged()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoamType {
    Static,
    Patrolling,
}

impl RoamType {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(Self::Static),
            1 => Some(Self::Patrolling),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaseProgress {
    Moving,
    Arrived,
    NoPath,
}

/// Flags shared between an enemy and its background patrol task.
#[derive(Debug, Clone, Default)]
pub struct PatrolSignal {
    active: Rc<Cell<bool>>,
    repath: Rc<Cell<bool>>,
}

impl PatrolSignal {
    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

/// Periodically asks the owning enemy to re-plan towards its current waypoint.
struct PatrolRetarget {
    signal: PatrolSignal,
    interval: f32,
    armed: bool,
}

impl Routine<DynHost> for PatrolRetarget {
    fn resume(&mut self, _host: &mut DynHost, _spawner: &mut Spawner<DynHost>) -> RoutineResult<DynHost> {
        if !self.signal.active.get() {
            return Ok(Step::Done);
        }
        if self.armed {
            self.signal.repath.set(true);
        }
        self.armed = true;
        Ok(Step::delay(self.interval))
    }
}

/// Per-enemy bookkeeping shared by all enemy states.
#[derive(Debug)]
pub struct EnemyAgent {
    pub entity: EntityId,
    pub player: EntityId,
    pub kind: EnemyKind,
    pub roam: RoamType,
    pub tuning: EnemyTuning,
    pub grid_key: GridKey,
    pub home: Vec2,
    pub(crate) grid: Option<GridFrame>,
    pub(crate) waypoints: Vec<Vec2>,
    pub(crate) waypoint_index: usize,
    pub(crate) patrol_path: PathFollower,
    pub(crate) chase_path: PathFollower,
    pub(crate) last_known_target: Vec2,
    pub(crate) search_timer: f32,
    pub(crate) scan_time: f32,
    pub(crate) scan_origin: f32,
    pub(crate) fire_timer: f32,
    pub(crate) shuffle_timer: f32,
    pub(crate) shuffle_left: bool,
    pub(crate) shots_fired: u32,
    pub(crate) patrol: PatrolSignal,
    pub(crate) dead: bool,
    pub(crate) rng: Lcg,
}

impl EnemyAgent {
    pub fn new(
        entity: EntityId,
        player: EntityId,
        kind: EnemyKind,
        roam: RoamType,
        tuning: EnemyTuning,
        grid_key: GridKey,
        seed: u64,
    ) -> Self {
        Self {
            entity,
            player,
            kind,
            roam,
            tuning,
            grid_key,
            home: Vec2::ZERO,
            grid: None,
            waypoints: Vec::new(),
            waypoint_index: 0,
            patrol_path: PathFollower::default(),
            chase_path: PathFollower::default(),
            last_known_target: Vec2::ZERO,
            search_timer: 0.0,
            scan_time: 0.0,
            scan_origin: 0.0,
            fire_timer: 0.0,
            shuffle_timer: 0.0,
            shuffle_left: true,
            shots_fired: 0,
            patrol: PatrolSignal::default(),
            dead: false,
            rng: Lcg::new(seed ^ u64::from(entity.0)),
        }
    }

    pub fn waypoints(&self) -> &[Vec2] {
        &self.waypoints
    }

    pub fn shots_fired(&self) -> u32 {
        self.shots_fired
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn patrol_tag(&self) -> String {
        format!("patrol:{}", self.entity.0)
    }

    /// Records home, resolves the path grid and snapshots waypoints from the
    /// entity's children. A patrolling enemy without waypoints becomes static.
    pub fn capture(&mut self, host: &DynHost) {
        self.home = host.position(self.entity).unwrap_or(Vec2::ZERO);
        self.grid = GridFrame::resolve(host, self.grid_key);
        if self.roam != RoamType::Patrolling {
            return;
        }
        self.waypoints = host
            .children(self.entity)
            .into_iter()
            .filter_map(|child| host.position(child))
            .collect();
        if self.waypoints.is_empty() {
            debug!(entity = self.entity.0, "enemy_waypoints_missing");
            self.roam = RoamType::Static;
        }
    }

    pub fn field_of_view(&self) -> FieldOfView {
        self.tuning.field_of_view()
    }

    pub fn patrol_gait(&self) -> Gait {
        Gait {
            speed: self.tuning.patrol_speed,
            reach: self.tuning.patrol_reach,
            snap_distance_sq: self.tuning.snap_distance_sq,
        }
    }

    pub fn chase_gait(&self) -> Gait {
        Gait {
            speed: self.tuning.speed,
            reach: self.tuning.chase_reach,
            snap_distance_sq: self.tuning.snap_distance_sq,
        }
    }

    fn plan(&self, host: &DynHost, to: Vec2) -> Vec<Vec2> {
        let (Some(grid), Some(from)) = (self.grid, host.position(self.entity)) else {
            return Vec::new();
        };
        grid.plan(host, from, to)
    }

    /// Re-aims the sight ray; true when it reaches the player unobstructed.
    pub fn refresh_ray(&self, host: &mut DynHost) -> bool {
        perception::update_ray_to_target(host, self.entity, self.player);
        perception::target_within_sight(host, self.entity)
    }

    /// Re-aims the sight ray; true when the player is unobstructed and inside the cone.
    pub fn refresh_sight(&self, host: &mut DynHost) -> bool {
        perception::update_ray_to_target(host, self.entity, self.player);
        perception::can_see(host, self.entity, self.player, self.field_of_view())
    }

    pub fn face_player(&self, host: &mut DynHost) -> Option<Vec2> {
        let here = host.position(self.entity)?;
        let there = host.position(self.player)?;
        host.set_rotation(self.entity, here.to(there).heading_degrees());
        Some(here.to(there))
    }

    pub fn stop(&self, host: &mut DynHost) {
        movement::stop(host, self.entity);
    }

    /// Heads straight for the player at full speed.
    pub fn run_at_player(&self, host: &mut DynHost) {
        let Some(offset) = self.face_player(host) else {
            return;
        };
        host.set_velocity(self.entity, offset.normalized().scaled(self.tuning.speed));
    }

    /// Faces the player and flees directly away.
    pub fn run_from_player(&self, host: &mut DynHost) {
        let Some(offset) = self.face_player(host) else {
            return;
        };
        let away = offset.scaled(-1.0).normalized();
        host.set_velocity(self.entity, away.scaled(self.tuning.speed));
    }

    fn current_waypoint(&mut self) -> Option<Vec2> {
        if self.waypoints.is_empty() {
            return None;
        }
        if self.waypoint_index >= self.waypoints.len() {
            self.waypoint_index = 0;
        }
        self.waypoints.get(self.waypoint_index).copied()
    }

    /// Plans towards the current waypoint. Missing waypoints or an empty
    /// path leave the enemy static.
    pub fn set_initial_patrol_path(&mut self, host: &DynHost) -> bool {
        let Some(waypoint) = self.current_waypoint() else {
            self.roam = RoamType::Static;
            return false;
        };
        let path = self.plan(host, waypoint);
        if path.is_empty() {
            debug!(entity = self.entity.0, "enemy_patrol_path_missing");
            self.roam = RoamType::Static;
            self.patrol_path.clear();
            return false;
        }
        self.patrol_path.replace(path);
        true
    }

    fn next_patrol_leg(&mut self, host: &DynHost) {
        self.waypoint_index = (self.waypoint_index + 1) % self.waypoints.len().max(1);
        let Some(waypoint) = self.current_waypoint() else {
            return;
        };
        let path = self.plan(host, waypoint);
        self.patrol_path.replace(path);
    }

    /// One tick of waypoint patrol; also keeps the re-target task alive.
    pub fn patrol_step(&mut self, host: &mut DynHost, scheduler: &mut Scheduler<DynHost>) {
        if self.roam != RoamType::Patrolling || self.waypoints.is_empty() {
            return;
        }
        if self.patrol.repath.replace(false) {
            if let Some(waypoint) = self.current_waypoint() {
                let path = self.plan(host, waypoint);
                if !path.is_empty() {
                    self.patrol_path.replace(path);
                }
            }
        }
        if self.patrol_path.is_empty() {
            self.set_initial_patrol_path(host);
            return;
        }

        let gait = self.patrol_gait();
        let progress = movement::follow(host, self.entity, &mut self.patrol_path, gait);
        if progress == PathProgress::Finished {
            self.next_patrol_leg(host);
        }

        if !self.patrol.active.get() {
            self.patrol.active.set(true);
            scheduler.schedule_tagged(
                self.patrol_tag(),
                PatrolRetarget {
                    signal: self.patrol.clone(),
                    interval: self.tuning.patrol_retarget_interval,
                    armed: false,
                },
            );
        }
    }

    pub fn stop_patrol(&mut self, scheduler: &mut Scheduler<DynHost>) {
        if self.patrol.active.replace(false) {
            scheduler.cancel_by_tag(&self.patrol_tag());
        }
        self.patrol.repath.set(false);
    }

    /// Starts a search from the player's current position; false when no path leads there.
    pub fn begin_search(&mut self, host: &DynHost) -> bool {
        self.search_timer = self.tuning.search_duration;
        if let Some(target) = host.position(self.player) {
            self.last_known_target = target;
        }
        let path = self.plan(host, self.last_known_target);
        self.chase_path.replace(path);
        !self.chase_path.is_empty()
    }

    pub fn begin_return_home(&mut self, host: &DynHost) -> bool {
        let path = self.plan(host, self.home);
        self.chase_path.replace(path);
        !self.chase_path.is_empty()
    }

    pub fn follow_chase_path(&mut self, host: &mut DynHost) -> ChaseProgress {
        let gait = self.chase_gait();
        match movement::follow(host, self.entity, &mut self.chase_path, gait) {
            PathProgress::Moving => ChaseProgress::Moving,
            PathProgress::Finished => {
                self.chase_path.clear();
                ChaseProgress::Arrived
            }
            PathProgress::Stalled => {
                self.stop(host);
                self.chase_path.clear();
                ChaseProgress::NoPath
            }
        }
    }

    pub fn begin_ranged_attack(&mut self, host: &mut DynHost) {
        self.stop(host);
        self.fire_timer = self.tuning.fire_rate * self.tuning.first_shot_factor;
        self.shuffle_timer = self.tuning.fire_rate * FIRST_SHUFFLE_FACTOR;
    }

    /// Counts down the fire and shuffle timers, shooting and side-stepping when they lapse.
    pub fn ranged_attack_step(&mut self, host: &mut DynHost, dt: f32) {
        self.fire_timer -= dt;
        self.shuffle_timer -= dt;
        if self.fire_timer <= 0.0 {
            self.fire_timer = self.tuning.fire_rate;
            self.fire(host);
        }
        if self.shuffle_timer <= 0.0 {
            self.shuffle_timer = self.tuning.shuffle_rate;
            self.shuffle(host, self.shuffle_left);
            self.shuffle_left = !self.shuffle_left;
        }
    }

    fn fire(&mut self, host: &mut DynHost) {
        let Some(transform) = host.transform(self.entity) else {
            return;
        };
        let muzzle = transform.position.offset(
            Vec2::from_heading_degrees(transform.rotation_degrees).scaled(MUZZLE_OFFSET),
        );
        if host
            .spawn_prefab(ENEMY_BULLET_PREFAB, muzzle, transform.rotation_degrees)
            .is_some()
        {
            self.shots_fired += 1;
        }
        host.play_audio(self.entity, ENEMY_SHOT_CLIP);
    }

    fn shuffle(&self, host: &mut DynHost, left: bool) {
        let (Some(here), Some(there)) = (host.position(self.entity), host.position(self.player))
        else {
            return;
        };
        let toward = here.to(there);
        let side = if left {
            Vec2::new(-toward.y, toward.x)
        } else {
            Vec2::new(toward.y, -toward.x)
        };
        host.set_velocity(self.entity, side.scaled(self.tuning.shuffle_distance));
    }

    pub fn begin_scan(&mut self, host: &mut DynHost) {
        self.stop(host);
        self.scan_time = 0.0;
        let rotation = host
            .transform(self.entity)
            .map(|transform| transform.rotation_degrees)
            .unwrap_or(0.0);
        self.scan_origin = rotation - 180.0;
    }

    /// Sweeps the facing back and forth across the viewing arc.
    pub fn scan_rotation(&self) -> f32 {
        let half = self.tuning.fov_angle_degrees / 2.0;
        let left = self.scan_origin - half;
        let right = self.scan_origin + half;
        let duration = self.tuning.scan_duration.max(f32::EPSILON);
        let t = (self.scan_time * std::f32::consts::PI / duration).sin();
        left + (t + 1.0) / 2.0 * (right - left)
    }
}
