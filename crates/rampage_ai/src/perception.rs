use crate::host::{DynHost, EntityId, Raycasts, Transforms, Vec2};

/// Ray every hostile keeps aimed at the player.
pub const PLAYER_RAY: &str = "RaycastToPlayer";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldOfView {
    pub angle_degrees: f32,
    pub distance: f32,
}

/// Wraps an angle into (-180, 180].
pub fn normalize_angle(degrees: f32) -> f32 {
    let wrapped = degrees % 360.0;
    if wrapped > 180.0 {
        wrapped - 360.0
    } else if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

pub fn is_in_fov(forward_degrees: f32, from: Vec2, to: Vec2, fov: FieldOfView) -> bool {
    let offset = from.to(to);
    if offset.length_sq() > fov.distance * fov.distance {
        return false;
    }
    let relative = normalize_angle(offset.heading_degrees() - forward_degrees);
    relative.abs() <= fov.angle_degrees / 2.0
}

/// Re-aims the sight ray at the target's current position.
pub fn update_ray_to_target(host: &mut DynHost, entity: EntityId, target: EntityId) -> Option<Vec2> {
    let position = host.position(target)?;
    host.set_ray_target(entity, PLAYER_RAY, position);
    Some(position)
}

pub fn target_within_sight(host: &DynHost, entity: EntityId) -> bool {
    host.ray_target_reached(entity, PLAYER_RAY)
}

/// Unobstructed line of sight and inside the viewing cone.
pub fn can_see(host: &DynHost, entity: EntityId, target: EntityId, fov: FieldOfView) -> bool {
    if !target_within_sight(host, entity) {
        return false;
    }
    let (Some(eye), Some(seen)) = (host.transform(entity), host.position(target)) else {
        return false;
    };
    is_in_fov(eye.rotation_degrees, eye.position, seen, fov)
}
