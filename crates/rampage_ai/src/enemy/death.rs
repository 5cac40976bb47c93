use std::rc::Rc;

use tracing::info;

use crate::host::{Audio, DynHost, EntityId, Lifecycle, Transforms, Vec2};
use crate::rng::Lcg;
use crate::scheduler::{Routine, RoutineError, RoutineResult, Sequence, Spawner, Step};
use crate::state::GameFlags;

use super::agent::EnemyKind;

pub const DEATH_TAG: &str = "EnemyDeath";
pub const DEATH_AUDIO_TAG: &str = "EnemyDeathAudio";
pub const BLOOD_POOL_PREFAB: &str = "prefab_enemyBloodPool";
pub const TOP_HALF_PREFAB: &str = "EnemyTopHalf";

pub const BODY_DEATH_CLIPS: &[&str] = &["aud_bodyDeath01.wav"];
pub const BODY_FALL_CLIPS: &[&str] = &[
    "aud_bodyFall01.wav",
    "aud_bodyFall02.wav",
    "aud_bodyFall03.wav",
    "aud_bodyFall04.wav",
    "aud_bodyFall05.wav",
    "aud_bodyFall06.wav",
    "aud_bodyFall07.wav",
    "aud_bodyFall08.wav",
    "aud_bodyFall09.wav",
];
pub const BODY_STAB_CLIPS: &[&str] = &["aud_bodyStab01.wav", "aud_bodyStab02.wav"];
pub const RANGED_DEATH_CLIP: &str = "aud_playerDeath01.wav";

const BASE_KNOCKBACK: f32 = 0.05;
const KATANA_SPIN_DEGREES: i64 = 75;

/// What killed an enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    Katana,
    Railgun,
    Shotgun,
    Gun,
    Booster,
}

impl DeathCause {
    pub fn label(self) -> &'static str {
        match self {
            Self::Katana => "katana",
            Self::Railgun => "railgun",
            Self::Shotgun => "shotgun",
            Self::Gun => "gun",
            Self::Booster => "booster",
        }
    }

    /// Upper bound of the random knockback added on top of the base push.
    pub fn knockback_factor(self) -> f32 {
        match self {
            Self::Gun => 0.7,
            Self::Shotgun | Self::Booster => 0.9,
            Self::Railgun | Self::Katana => 0.0,
        }
    }
}

/// How an enemy reacts to touching another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    Lethal(DeathCause),
    Halt,
    Ignore,
}

pub fn classify_contact(tag: &str, player_boosting: bool) -> Contact {
    match tag {
        "MeleeKillZoneSpawn" => Contact::Lethal(DeathCause::Katana),
        "PlayerRailgunBullet" => Contact::Lethal(DeathCause::Railgun),
        "PlayerShotgunBullet" => Contact::Lethal(DeathCause::Shotgun),
        "PlayerBullet" => Contact::Lethal(DeathCause::Gun),
        "Player" if player_boosting => Contact::Lethal(DeathCause::Booster),
        "Player" => Contact::Halt,
        _ => Contact::Ignore,
    }
}

fn pick(rng: &mut Lcg, clips: &'static [&'static str]) -> &'static str {
    rng.index(clips.len())
        .and_then(|index| clips.get(index))
        .copied()
        .unwrap_or_default()
}

fn play(entity: EntityId, clip: &'static str) -> impl FnMut(&mut DynHost) -> Result<(), RoutineError> {
    move |host: &mut DynHost| {
        host.play_audio(entity, clip);
        Ok(())
    }
}

/// Audio cue sequence for an enemy of `kind` killed by `cause`.
pub fn death_audio(
    entity: EntityId,
    kind: EnemyKind,
    cause: DeathCause,
    rng: &mut Lcg,
) -> Sequence<DynHost> {
    if kind.is_ranged() {
        return Sequence::new().then(play(entity, RANGED_DEATH_CLIP));
    }
    let death = pick(rng, BODY_DEATH_CLIPS);
    let fall = pick(rng, BODY_FALL_CLIPS);
    if cause == DeathCause::Katana {
        let stab = pick(rng, BODY_STAB_CLIPS);
        Sequence::new()
            .then(play(entity, stab))
            .delay(0.1)
            .then(play(entity, death))
            .delay(0.2)
            .then(play(entity, fall))
    } else {
        Sequence::new()
            .then(play(entity, death))
            .delay(0.1)
            .then(play(entity, fall))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeathStage {
    Impact,
    Remains,
}

/// Knocks the body back, then leaves a blood pool and counts the kill on the following tick.
pub struct DeathRoutine {
    entity: EntityId,
    player: EntityId,
    kind: EnemyKind,
    cause: DeathCause,
    rng: Lcg,
    flags: Rc<GameFlags>,
    stage: DeathStage,
}

impl DeathRoutine {
    pub fn new(
        entity: EntityId,
        player: EntityId,
        kind: EnemyKind,
        cause: DeathCause,
        rng: Lcg,
        flags: Rc<GameFlags>,
    ) -> Self {
        Self {
            entity,
            player,
            kind,
            cause,
            rng,
            flags,
            stage: DeathStage::Impact,
        }
    }

    fn impact(&mut self, host: &mut DynHost) -> Result<(), RoutineError> {
        let here = host
            .position(self.entity)
            .ok_or(RoutineError::MissingEntity(self.entity))?;
        let mut heading = match host.position(self.player) {
            Some(player) => player.to(here).heading_degrees(),
            None => host
                .transform(self.entity)
                .map(|transform| transform.rotation_degrees)
                .unwrap_or(0.0),
        };
        if self.cause == DeathCause::Katana {
            heading += self.rng.range(-KATANA_SPIN_DEGREES, KATANA_SPIN_DEGREES + 1) as f32;
            host.spawn_prefab(TOP_HALF_PREFAB, here, heading);
        }
        host.set_rotation(self.entity, heading);

        let velocity = if self.kind.is_melee_family() {
            let force = BASE_KNOCKBACK + self.rng.unit() * self.cause.knockback_factor();
            Vec2::from_heading_degrees(heading).scaled(force)
        } else {
            Vec2::ZERO
        };
        host.set_velocity(self.entity, velocity);
        Ok(())
    }

    fn remains(&mut self, host: &mut DynHost) -> Result<(), RoutineError> {
        let transform = host
            .transform(self.entity)
            .ok_or(RoutineError::MissingEntity(self.entity))?;
        host.spawn_prefab(BLOOD_POOL_PREFAB, transform.position, transform.rotation_degrees);
        let kills = self.flags.record_kill();
        info!(
            entity = self.entity.0,
            cause = self.cause.label(),
            kills,
            "enemy_killed"
        );
        Ok(())
    }
}

impl Routine<DynHost> for DeathRoutine {
    fn resume(&mut self, host: &mut DynHost, _spawner: &mut Spawner<DynHost>) -> RoutineResult<DynHost> {
        match self.stage {
            DeathStage::Impact => {
                self.impact(host)?;
                self.stage = DeathStage::Remains;
                Ok(Step::next_tick())
            }
            DeathStage::Remains => {
                self.remains(host)?;
                Ok(Step::Done)
            }
        }
    }
}
