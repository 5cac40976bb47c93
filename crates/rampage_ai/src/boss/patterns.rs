use tracing::debug;

use crate::host::{Audio, DynHost, EntityId, Lifecycle, Transforms, Vec2};
use crate::rng::Lcg;
use crate::scheduler::{Routine, RoutineResult, Sequence, Spawner, Step};

pub const BOSS_BULLET_PREFAB: &str = "prefab_bossBullet";
pub const CLUSTER_BULLET_PREFAB: &str = "prefab_bossClusterBullet";
pub const BOSS_SHOT_CLIP: &str = "aud_bossBullet01.wav";

const SPREAD_BULLETS: usize = 8;
const SPREAD_RADIUS: f32 = 0.2;
const SPREAD_START_DEGREES: f32 = 180.0;
const SPREAD_END_DEGREES: f32 = 360.0;

const ALTERNATING_WAVES: usize = 3;
const ALTERNATING_WAVE_DELAY: f32 = 0.3;
const ALTERNATING_OFFSET_DEGREES: f32 = 10.0;

const DISPERSE_MIN_DEGREES: i64 = 240;
const DISPERSE_MAX_DEGREES: i64 = 300;
const DISPERSE_FUSE_SECONDS: f32 = 1.5;
const DISPERSE_MEDIUM_COUNT: usize = 6;
const DISPERSE_MEDIUM_FUSE_SECONDS: f32 = 1.0;
const DISPERSE_FRAGMENT_COUNT: usize = 8;
const DISPERSE_FRAGMENT_OFFSET: f32 = 0.3;

const SWEEP_BULLETS: usize = 10;
const SWEEP_RADIUS: f32 = 0.2;
const SWEEP_INTERVAL: f32 = 0.1;
const SWEEP_PASS_PAUSE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttackPattern {
    AlternatingBullet,
    BulletSpread,
    BulletDisperse,
    BulletSweep,
}

impl AttackPattern {
    pub const ALL: [AttackPattern; 4] = [
        Self::AlternatingBullet,
        Self::BulletSpread,
        Self::BulletDisperse,
        Self::BulletSweep,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::AlternatingBullet => "alternating_bullet",
            Self::BulletSpread => "bullet_spread",
            Self::BulletDisperse => "bullet_disperse",
            Self::BulletSweep => "bullet_sweep",
        }
    }
}

/// Seeded pattern choice that allows a pattern to come up at most twice in a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSelector {
    last: AttackPattern,
    repeats: u32,
}

impl Default for PatternSelector {
    fn default() -> Self {
        Self {
            last: AttackPattern::AlternatingBullet,
            repeats: 0,
        }
    }
}

impl PatternSelector {
    pub fn last(&self) -> AttackPattern {
        self.last
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }

    /// Applies one roll; `None` means the roll would repeat the last pattern
    /// a second time and must be re-rolled.
    pub fn accept_roll(&mut self, roll: usize) -> Option<AttackPattern> {
        let pattern = AttackPattern::from_index(roll % AttackPattern::ALL.len())?;
        if self.repeats >= 1 && pattern == self.last {
            return None;
        }
        if pattern == self.last {
            self.repeats += 1;
        } else {
            self.repeats = 0;
            self.last = pattern;
        }
        Some(pattern)
    }

    pub fn select(&mut self, rng: &mut Lcg) -> AttackPattern {
        loop {
            let roll = rng.index(AttackPattern::ALL.len()).unwrap_or(0);
            if let Some(pattern) = self.accept_roll(roll) {
                return pattern;
            }
        }
    }
}

/// Position and heading of each bullet in an evenly spaced arc around `center`.
pub fn spread_arc(
    center: Vec2,
    count: usize,
    radius: f32,
    start_degrees: f32,
    end_degrees: f32,
) -> Vec<(Vec2, f32)> {
    let step = if count > 1 {
        (end_degrees - start_degrees) / (count - 1) as f32
    } else {
        0.0
    };
    (0..count)
        .map(|i| {
            let angle = start_degrees + step * i as f32;
            (center.offset(Vec2::from_polar_degrees(angle, radius)), angle)
        })
        .collect()
}

/// Heading of bullet `index` in a sweep pass.
pub fn sweep_angle(index: usize) -> f32 {
    SPREAD_START_DEGREES + (180.0 / (SWEEP_BULLETS - 1) as f32) * index as f32
}

fn fire_spread(host: &mut DynHost, boss: EntityId, center: Vec2, offset_degrees: f32) {
    host.play_audio(boss, BOSS_SHOT_CLIP);
    for (position, angle) in spread_arc(
        center,
        SPREAD_BULLETS,
        SPREAD_RADIUS,
        SPREAD_START_DEGREES + offset_degrees,
        SPREAD_END_DEGREES + offset_degrees,
    ) {
        host.spawn_prefab(BOSS_BULLET_PREFAB, position, angle);
    }
}

pub fn spread(boss: EntityId, center: Vec2) -> Sequence<DynHost> {
    Sequence::new().then(move |host: &mut DynHost| {
        fire_spread(host, boss, center, 0.0);
        Ok(())
    })
}

/// Three spreads, each skewed the opposite way from the last.
pub fn alternating(boss: EntityId, center: Vec2) -> Sequence<DynHost> {
    let mut sequence = Sequence::new();
    for wave in 0..ALTERNATING_WAVES {
        let offset = if wave % 2 == 0 {
            ALTERNATING_OFFSET_DEGREES
        } else {
            -ALTERNATING_OFFSET_DEGREES
        };
        sequence = sequence
            .then(move |host: &mut DynHost| {
                host.play_audio(boss, BOSS_SHOT_CLIP);
                fire_spread(host, boss, center, offset);
                Ok(())
            })
            .delay(ALTERNATING_WAVE_DELAY);
    }
    sequence
}

/// Single bullets fanned out one at a time, left to right and back.
pub fn sweep(boss: EntityId, center: Vec2) -> Sequence<DynHost> {
    let mut sequence = Sequence::new();
    for reverse in [false, true] {
        for i in 0..SWEEP_BULLETS {
            let index = if reverse { SWEEP_BULLETS - 1 - i } else { i };
            let angle = sweep_angle(index);
            let position = center.offset(Vec2::from_polar_degrees(angle, SWEEP_RADIUS));
            sequence = sequence
                .then(move |host: &mut DynHost| {
                    host.spawn_prefab(BOSS_BULLET_PREFAB, position, angle);
                    host.play_audio(boss, BOSS_SHOT_CLIP);
                    Ok(())
                })
                .delay(SWEEP_INTERVAL);
        }
        sequence = sequence.delay(SWEEP_PASS_PAUSE);
    }
    sequence
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisperseStage {
    Launch,
    Burst,
    Fragment,
}

/// Cluster bullet that bursts into medium clusters, which in turn fragment.
#[derive(Debug)]
pub struct Disperse {
    boss: EntityId,
    origin: Vec2,
    heading: f32,
    stage: DisperseStage,
    cluster: Option<EntityId>,
    mediums: Vec<EntityId>,
}

impl Disperse {
    /// Rolls the launch heading from `rng`.
    pub fn new(boss: EntityId, origin: Vec2, rng: &mut Lcg) -> Self {
        Self {
            boss,
            origin,
            heading: rng.range(DISPERSE_MIN_DEGREES, DISPERSE_MAX_DEGREES) as f32,
            stage: DisperseStage::Launch,
            cluster: None,
            mediums: Vec::new(),
        }
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    fn launch(&mut self, host: &mut DynHost) {
        host.play_audio(self.boss, BOSS_SHOT_CLIP);
        self.cluster = host.spawn_prefab(CLUSTER_BULLET_PREFAB, self.origin, self.heading);
    }

    fn burst(&mut self, host: &mut DynHost) {
        let center = self
            .cluster
            .and_then(|cluster| host.position(cluster))
            .unwrap_or(self.origin);
        let step = 360.0 / DISPERSE_MEDIUM_COUNT as f32;
        for i in 0..DISPERSE_MEDIUM_COUNT {
            host.play_audio(self.boss, BOSS_SHOT_CLIP);
            if let Some(medium) = host.spawn_prefab(CLUSTER_BULLET_PREFAB, center, step * i as f32) {
                self.mediums.push(medium);
            }
        }
        if let Some(cluster) = self.cluster.take() {
            host.delete_entity(cluster);
        }
    }

    fn fragment(&mut self, host: &mut DynHost) {
        for medium in self.mediums.drain(..) {
            host.play_audio(self.boss, BOSS_SHOT_CLIP);
            let Some(center) = host.position(medium) else {
                debug!(medium = medium.0, "boss_cluster_missing");
                continue;
            };
            for j in 0..DISPERSE_FRAGMENT_COUNT {
                let angle = j as f32 * 60.0 - 30.0;
                let position =
                    center.offset(Vec2::from_polar_degrees(angle, DISPERSE_FRAGMENT_OFFSET));
                host.spawn_prefab(BOSS_BULLET_PREFAB, position, angle);
            }
            host.delete_entity(medium);
        }
    }
}

impl Routine<DynHost> for Disperse {
    fn resume(&mut self, host: &mut DynHost, _spawner: &mut Spawner<DynHost>) -> RoutineResult<DynHost> {
        match self.stage {
            DisperseStage::Launch => {
                self.launch(host);
                self.stage = DisperseStage::Burst;
                Ok(Step::delay(DISPERSE_FUSE_SECONDS))
            }
            DisperseStage::Burst => {
                self.burst(host);
                self.stage = DisperseStage::Fragment;
                Ok(Step::delay(DISPERSE_MEDIUM_FUSE_SECONDS))
            }
            DisperseStage::Fragment => {
                self.fragment(host);
                Ok(Step::Done)
            }
        }
    }
}

/// Schedules `pattern` fired from `center` as a follow-up task.
pub fn launch(
    pattern: AttackPattern,
    boss: EntityId,
    center: Vec2,
    rng: &mut Lcg,
    spawner: &mut Spawner<DynHost>,
    tag: &str,
) {
    match pattern {
        AttackPattern::AlternatingBullet => {
            spawner.schedule_tagged(tag, alternating(boss, center));
        }
        AttackPattern::BulletSpread => {
            spawner.schedule_tagged(tag, spread(boss, center));
        }
        AttackPattern::BulletDisperse => {
            spawner.schedule_tagged(tag, Disperse::new(boss, center, rng));
        }
        AttackPattern::BulletSweep => {
            spawner.schedule_tagged(tag, sweep(boss, center));
        }
    }
}
