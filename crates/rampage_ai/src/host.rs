use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn to(self, other: Vec2) -> Vec2 {
        Vec2 {
            x: other.x - self.x,
            y: other.y - self.y,
        }
    }

    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn distance_sq(self, other: Vec2) -> f32 {
        self.to(other).length_sq()
    }

    pub fn scaled(self, factor: f32) -> Vec2 {
        Vec2 {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    pub fn offset(self, delta: Vec2) -> Vec2 {
        Vec2 {
            x: self.x + delta.x,
            y: self.y + delta.y,
        }
    }

    /// Unit vector, or zero when the length is zero.
    pub fn normalized(self) -> Vec2 {
        let len_sq = self.length_sq();
        if len_sq <= 0.0 {
            return Vec2::ZERO;
        }
        self.scaled(len_sq.sqrt().recip())
    }

    /// Heading in degrees, 0 along +Y and increasing clockwise.
    pub fn heading_degrees(self) -> f32 {
        self.x.atan2(self.y).to_degrees()
    }

    pub fn from_heading_degrees(degrees: f32) -> Vec2 {
        let radians = degrees.to_radians();
        Vec2 {
            x: radians.sin(),
            y: radians.cos(),
        }
    }

    /// Polar offset measured counter-clockwise from +X, the bullet convention.
    pub fn from_polar_degrees(degrees: f32, radius: f32) -> Vec2 {
        let radians = degrees.to_radians();
        Vec2 {
            x: radians.cos() * radius,
            y: radians.sin() * radius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub rotation_degrees: f32,
    pub scale: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation_degrees: 0.0,
            scale: Vec2 { x: 1.0, y: 1.0 },
        }
    }
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridKey(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

impl GridCell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

pub trait Clock {
    /// Monotonic game time in seconds, already affected by the time scale.
    fn game_time(&self) -> f32;
    /// Duration of the current tick in seconds, already affected by the time scale.
    fn delta_time(&self) -> f32;
    fn time_scale(&self) -> f32;
    fn set_time_scale(&mut self, scale: f32);
}

pub trait Transforms {
    fn transform(&self, entity: EntityId) -> Option<Transform>;
    fn set_transform(&mut self, entity: EntityId, transform: Transform);
    /// `None` when the entity has no rigid body.
    fn velocity(&self, entity: EntityId) -> Option<Vec2>;
    /// Returns `false` when the entity has no rigid body.
    fn set_velocity(&mut self, entity: EntityId, velocity: Vec2) -> bool;
    fn children(&self, entity: EntityId) -> Vec<EntityId>;
    fn tag_of(&self, entity: EntityId) -> Option<&str>;
    fn entity_with_tag(&self, tag: &str) -> Option<EntityId>;

    fn position(&self, entity: EntityId) -> Option<Vec2> {
        self.transform(entity).map(|transform| transform.position)
    }

    fn set_rotation(&mut self, entity: EntityId, rotation_degrees: f32) {
        if let Some(mut transform) = self.transform(entity) {
            transform.rotation_degrees = rotation_degrees;
            self.set_transform(entity, transform);
        }
    }
}

pub trait Collisions {
    /// Entities overlapping `entity` this tick; empty when not collided.
    fn collided_entities(&self, entity: EntityId) -> Vec<EntityId>;
}

pub trait Raycasts {
    fn set_ray_target(&mut self, entity: EntityId, ray: &str, target: Vec2);
    /// True when the named ray reaches its target unobstructed.
    fn ray_target_reached(&self, entity: EntityId, ray: &str) -> bool;
}

pub trait GridPaths {
    fn grid_anchor(&self, grid: GridKey) -> Option<Vec2>;
    /// Cells from `start` to `end`, or empty when no path exists.
    fn find_path(&self, grid: GridKey, start: GridCell, end: GridCell) -> Vec<GridCell>;
}

pub trait Lifecycle {
    fn spawn_prefab(&mut self, prefab: &str, position: Vec2, rotation_degrees: f32)
        -> Option<EntityId>;
    fn delete_entity(&mut self, entity: EntityId);
    fn exists(&self, entity: EntityId) -> bool;
}

pub trait Audio {
    fn play_audio(&mut self, entity: EntityId, clip: &str);
    fn stop_audio(&mut self, entity: EntityId, clip: &str);
}

/// Everything the scripts may ask of the engine.
pub trait Host: Clock + Transforms + Collisions + Raycasts + GridPaths + Lifecycle + Audio {}

impl<T> Host for T where T: Clock + Transforms + Collisions + Raycasts + GridPaths + Lifecycle + Audio
{}

/// Owned host object as scripts see it; `'static` so it can parameterize a scheduler.
pub type DynHost = dyn Host;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() <= 1e-4,
            "{actual} vs {expected}"
        );
    }

    #[test]
    fn heading_zero_points_up_and_ninety_points_right() {
        assert_close(Vec2::new(0.0, 1.0).heading_degrees(), 0.0);
        assert_close(Vec2::new(1.0, 0.0).heading_degrees(), 90.0);
        assert_close(Vec2::new(0.0, -1.0).heading_degrees().abs(), 180.0);
    }

    #[test]
    fn forward_vector_matches_heading() {
        let forward = Vec2::from_heading_degrees(90.0);
        assert_close(forward.x, 1.0);
        assert_close(forward.y, 0.0);
        assert_close(forward.heading_degrees(), 90.0);
    }

    #[test]
    fn normalized_zero_stays_zero() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
        assert_close(Vec2::new(3.0, 4.0).normalized().length(), 1.0);
    }
}
