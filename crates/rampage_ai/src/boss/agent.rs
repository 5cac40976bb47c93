use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};

use crate::config::BossTuning;
use crate::enemy::{classify_contact, Contact, DeathCause};
use crate::host::{Audio, Collisions, DynHost, EntityId, Lifecycle, Transforms, Vec2};
use crate::rng::Lcg;
use crate::scheduler::{Routine, RoutineError, RoutineResult, Scheduler, Sequence, Spawner, Step};
use crate::state::ScriptContext;

use super::patterns::{self, AttackPattern, PatternSelector};

pub const ATTACK_TAG: &str = "BossAttack";
pub const SPAWN_TAG: &str = "BossSpawn";
pub const PATTERN_TAG: &str = "BossPattern";
pub const FORCE_FIELD_TAG: &str = "BossForceField";
pub const INVINCIBILITY_TAG: &str = "BossInvincibility";

pub const FORCE_FIELD_PREFAB: &str = "Boss_Forcefield";
pub const ALERT_ENEMY_PREFABS: &[&str] = &["prefab_Enemy_Alert"];

pub const SHIELD_HIT_CLIPS: [&str; 2] = ["aud_railgunShot01.wav", "aud_katana01.wav"];
pub const SHIELD_BREAK_CLIP: &str = "aud_bossShieldBreak01.wav";
pub const SHIELD_REGEN_CLIP: &str = "aud_bossShieldRegen01.wav";
pub const BOSS_HIT_CLIPS: [&str; 2] = ["aud_playerDeath01.wav", "aud_bossHit01.wav"];
pub const BOSS_DEATH_CLIP: &str = "aud_bossDeath01.wav";
pub const BOSS_MUSIC_CLIP: &str = "aud_bossLevelLoop.wav";
pub const GAME_CONTROLLER_TAG: &str = "GameController";

/// Result of one damaging contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    Ignored,
    FieldRaised,
    FieldDamaged,
    FieldBroken,
    Wounded,
    FieldRegenerated,
    Killed,
}

/// Boss state shared with its background loops.
#[derive(Debug)]
pub struct BossCore {
    pub(crate) rng: Lcg,
    pub(crate) selector: PatternSelector,
    pub(crate) health: i32,
    pub(crate) invincible: bool,
    pub(crate) field_deactivating: bool,
    pub(crate) spawned: Vec<EntityId>,
    pub(crate) history: Vec<AttackPattern>,
}

pub type SharedCore = Rc<RefCell<BossCore>>;

struct AttackLoop {
    boss: EntityId,
    core: SharedCore,
    cooldown: (i64, i64),
}

impl Routine<DynHost> for AttackLoop {
    fn resume(&mut self, host: &mut DynHost, spawner: &mut Spawner<DynHost>) -> RoutineResult<DynHost> {
        let mut guard = self.core.borrow_mut();
        let core = &mut *guard;
        if core.health <= 0 {
            return Ok(Step::Done);
        }
        let center = host
            .position(self.boss)
            .ok_or(RoutineError::MissingEntity(self.boss))?;
        let pattern = core.selector.select(&mut core.rng);
        core.history.push(pattern);
        info!(boss = self.boss.0, pattern = pattern.name(), "boss_pattern_selected");
        patterns::launch(pattern, self.boss, center, &mut core.rng, spawner, PATTERN_TAG);
        let (min, max) = self.cooldown;
        Ok(Step::delay(core.rng.range(min, max) as f32 / 100.0))
    }
}

struct SpawnLoop {
    boss: EntityId,
    core: SharedCore,
    points: Vec<EntityId>,
    delay: (i64, i64),
}

impl Routine<DynHost> for SpawnLoop {
    fn resume(&mut self, host: &mut DynHost, _spawner: &mut Spawner<DynHost>) -> RoutineResult<DynHost> {
        let mut guard = self.core.borrow_mut();
        let core = &mut *guard;
        if core.health <= 0 {
            return Ok(Step::Done);
        }
        if let Some(index) = core.rng.index(self.points.len()) {
            let prefab = core
                .rng
                .index(ALERT_ENEMY_PREFABS.len())
                .and_then(|index| ALERT_ENEMY_PREFABS.get(index))
                .copied()
                .unwrap_or_default();
            let point = self.points.get(index).and_then(|point| host.position(*point));
            if let Some(position) = point {
                if let Some(enemy) = host.spawn_prefab(prefab, position, 0.0) {
                    core.spawned.push(enemy);
                    debug!(boss = self.boss.0, enemy = enemy.0, prefab, "boss_enemy_spawned");
                }
            }
        }
        let (min, max) = self.delay;
        Ok(Step::delay(core.rng.range(min, max) as f32))
    }
}

#[derive(Debug)]
pub struct BossAgent {
    pub entity: EntityId,
    pub tuning: BossTuning,
    pub(crate) core: SharedCore,
    pub(crate) spawn_points: Vec<EntityId>,
    pub(crate) force_field: Option<EntityId>,
    pub(crate) field_started: bool,
    pub(crate) field_active: bool,
    pub(crate) field_health: i32,
    pub(crate) vulnerable: i32,
    pub(crate) dying_timer: f32,
}

impl BossAgent {
    pub fn new(entity: EntityId, tuning: BossTuning, seed: u64) -> Self {
        let core = BossCore {
            rng: Lcg::new(seed),
            selector: PatternSelector::default(),
            health: tuning.health,
            invincible: false,
            field_deactivating: false,
            spawned: Vec::new(),
            history: Vec::new(),
        };
        Self {
            entity,
            core: Rc::new(RefCell::new(core)),
            spawn_points: Vec::new(),
            force_field: None,
            field_started: false,
            field_active: false,
            field_health: tuning.force_field_health,
            vulnerable: tuning.vulnerable_hits,
            dying_timer: 0.0,
            tuning,
        }
    }

    pub fn health(&self) -> i32 {
        self.core.borrow().health
    }

    pub fn field_health(&self) -> i32 {
        self.field_health
    }

    pub fn field_active(&self) -> bool {
        self.field_active
    }

    pub fn force_field(&self) -> Option<EntityId> {
        self.force_field
    }

    pub fn is_invincible(&self) -> bool {
        self.core.borrow().invincible
    }

    pub fn is_field_deactivating(&self) -> bool {
        self.core.borrow().field_deactivating
    }

    pub fn pattern_history(&self) -> Vec<AttackPattern> {
        self.core.borrow().history.clone()
    }

    pub fn take_spawned(&self) -> Vec<EntityId> {
        std::mem::take(&mut self.core.borrow_mut().spawned)
    }

    /// Child entities of the boss are its enemy spawn points.
    pub fn capture(&mut self, host: &DynHost) {
        self.spawn_points = host.children(self.entity);
        debug!(
            boss = self.entity.0,
            spawn_points = self.spawn_points.len(),
            "boss_spawn_points_captured"
        );
    }

    pub fn start_loops(&self, scheduler: &mut Scheduler<DynHost>) {
        self.stop_loops(scheduler);
        scheduler.schedule_tagged(
            ATTACK_TAG,
            AttackLoop {
                boss: self.entity,
                core: Rc::clone(&self.core),
                cooldown: (self.tuning.attack_cooldown_min, self.tuning.attack_cooldown_max),
            },
        );
        scheduler.schedule_tagged(
            SPAWN_TAG,
            SpawnLoop {
                boss: self.entity,
                core: Rc::clone(&self.core),
                points: self.spawn_points.clone(),
                delay: (self.tuning.spawn_delay_min, self.tuning.spawn_delay_max),
            },
        );
    }

    pub fn stop_loops(&self, scheduler: &mut Scheduler<DynHost>) {
        for tag in [ATTACK_TAG, SPAWN_TAG, PATTERN_TAG] {
            scheduler.cancel_by_tag(tag);
        }
    }

    fn spawn_force_field(&mut self, host: &mut DynHost) {
        let position = host.position(self.entity).unwrap_or(Vec2::ZERO);
        self.force_field = host.spawn_prefab(FORCE_FIELD_PREFAB, position, 0.0);
        self.field_active = true;
        self.field_health = self.tuning.force_field_health;
    }

    fn break_force_field(&mut self, scheduler: &mut Scheduler<DynHost>) {
        self.field_active = false;
        self.core.borrow_mut().field_deactivating = true;
        let field = self.force_field.take();
        let core = Rc::clone(&self.core);
        scheduler.schedule_tagged(
            FORCE_FIELD_TAG,
            Sequence::new()
                .delay(self.tuning.force_field_deactivate_seconds)
                .then(move |host: &mut DynHost| {
                    if let Some(field) = field {
                        host.delete_entity(field);
                    }
                    core.borrow_mut().field_deactivating = false;
                    Ok(())
                }),
        );
    }

    fn start_invincibility(&self, scheduler: &mut Scheduler<DynHost>) {
        self.core.borrow_mut().invincible = true;
        let core = Rc::clone(&self.core);
        scheduler.schedule_tagged(
            INVINCIBILITY_TAG,
            Sequence::new()
                .delay(self.tuning.invincibility_seconds)
                .then(move |_host: &mut DynHost| {
                    core.borrow_mut().invincible = false;
                    Ok(())
                }),
        );
    }

    /// Applies one damaging contact to the force field or the boss.
    pub fn apply_hit(&mut self, ctx: &mut ScriptContext<'_>, katana: bool) -> HitOutcome {
        {
            let core = self.core.borrow();
            if core.field_deactivating || core.invincible || core.health <= 0 {
                return HitOutcome::Ignored;
            }
        }
        if !self.field_started {
            self.field_started = true;
            self.spawn_force_field(ctx.host);
            return HitOutcome::FieldRaised;
        }

        if self.field_active {
            for clip in SHIELD_HIT_CLIPS {
                ctx.host.play_audio(self.entity, clip);
            }
            self.field_health -= if katana { 2 } else { 1 };
            if self.field_health <= 0 {
                ctx.host.play_audio(self.entity, SHIELD_BREAK_CLIP);
                self.break_force_field(ctx.scheduler);
                return HitOutcome::FieldBroken;
            }
            if !katana {
                self.start_invincibility(ctx.scheduler);
            }
            return HitOutcome::FieldDamaged;
        }

        for clip in BOSS_HIT_CLIPS {
            ctx.host.play_audio(self.entity, clip);
        }
        let health = {
            let mut core = self.core.borrow_mut();
            core.health -= 1;
            core.health
        };
        if health <= 0 {
            ctx.host.play_audio(self.entity, BOSS_DEATH_CLIP);
            return HitOutcome::Killed;
        }

        self.vulnerable -= 1;
        let outcome = if self.vulnerable == 0 {
            ctx.host.play_audio(self.entity, SHIELD_REGEN_CLIP);
            self.spawn_force_field(ctx.host);
            self.vulnerable = self.tuning.vulnerable_hits;
            HitOutcome::FieldRegenerated
        } else {
            HitOutcome::Wounded
        };
        if !katana {
            self.start_invincibility(ctx.scheduler);
        }
        outcome
    }

    /// Runs this tick's contacts through the damage model; true once the boss is killed.
    pub fn handle_collisions(&mut self, ctx: &mut ScriptContext<'_>) -> bool {
        for other in ctx.host.collided_entities(self.entity) {
            let Some(tag) = ctx.host.tag_of(other).map(str::to_owned) else {
                continue;
            };
            let Contact::Lethal(cause) = classify_contact(&tag, false) else {
                continue;
            };
            let outcome = self.apply_hit(ctx, cause == DeathCause::Katana);
            debug!(
                boss = self.entity.0,
                tag = %tag,
                outcome = ?outcome,
                health = self.health(),
                field_health = self.field_health,
                "boss_hit"
            );
            match outcome {
                HitOutcome::FieldRaised => return false,
                HitOutcome::Killed => return true,
                _ => {}
            }
        }
        false
    }

    /// Silences the level music once the fight is over.
    pub fn stop_music(&self, host: &mut DynHost) {
        if let Some(controller) = host.entity_with_tag(GAME_CONTROLLER_TAG) {
            host.stop_audio(controller, BOSS_MUSIC_CLIP);
        }
    }
}
