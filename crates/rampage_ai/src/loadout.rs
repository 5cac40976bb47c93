//! Limb weapon sprites for the player loadout.

use serde::{Deserialize, Serialize};

use crate::host::{EntityId, Transforms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    Cleaver,
    Katana,
    Booster,
    Gun,
    ShotGun,
    RailGun,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 6] = [
        Self::Cleaver,
        Self::Katana,
        Self::Booster,
        Self::Gun,
        Self::ShotGun,
        Self::RailGun,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimbSlot {
    Left,
    Right,
    Back,
}

impl LimbSlot {
    pub const ALL: [LimbSlot; 3] = [Self::Left, Self::Right, Self::Back];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "LeftLimbSprite" => Some(Self::Left),
            "RightLimbSprite" => Some(Self::Right),
            "BackLimbSprite" => Some(Self::Back),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Left => "LeftLimbSprite",
            Self::Right => "RightLimbSprite",
            Self::Back => "BackLimbSprite",
        }
    }
}

/// Animation strip for `weapon` mounted on `slot`; `None` where the weapon
/// cannot be mounted there.
pub fn limb_texture(weapon: WeaponKind, slot: LimbSlot) -> Option<&'static str> {
    use LimbSlot::{Back, Left, Right};
    use WeaponKind::*;

    match (weapon, slot) {
        (Cleaver, Left) => Some("ani_cleaverLeftAnim_strip6.png"),
        (Cleaver, Right) => Some("ani_cleaverRightAnim_strip6.png"),
        (Katana, Left) => Some("ani_katanaLeftAnim_strip19.png"),
        (Katana, Right) => Some("ani_katanaRightAnim_strip19.png"),
        (Booster, Back) => Some("ani_boostersTailAnim_strip18.png"),
        (Gun, Left) => Some("ani_gunLeftAnim_strip8.png"),
        (Gun, Right) => Some("ani_gunRightAnim_strip8.png"),
        (Gun, Back) => Some("ani_gunTailAnim_strip8.png"),
        (ShotGun, Left) => Some("ani_shotGunLeftAnim_strip8.png"),
        (ShotGun, Right) => Some("ani_shotGunRightAnim_strip8.png"),
        (RailGun, Left) => Some("ani_railgunLeftAnim_strip10.png"),
        (RailGun, Right) => Some("ani_railgunRightAnim_strip10.png"),
        (Cleaver | Katana | ShotGun | RailGun, Back) | (Booster, Left | Right) => None,
    }
}

/// Resolves the limb slot from the entity's tag, then the texture for `weapon` there.
pub fn texture_for_entity(
    host: &(impl Transforms + ?Sized),
    entity: EntityId,
    weapon: WeaponKind,
) -> Option<&'static str> {
    let slot = host.tag_of(entity).and_then(LimbSlot::from_tag)?;
    limb_texture(weapon, slot)
}
