//! In-memory host used by the headless driver and by the AI tests.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::host::{
    Audio, Clock, Collisions, EntityId, GridCell, GridKey, GridPaths, Lifecycle, Raycasts,
    Transform, Transforms, Vec2,
};
use crate::movement::GridFrame;

/// Spacing of the samples taken along a ray when testing it against walls.
const RAY_SAMPLE_SPACING: f32 = 0.25;

#[derive(Debug, Clone)]
struct SimEntity {
    tag: String,
    transform: Transform,
    velocity: Option<Vec2>,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

#[derive(Debug, Clone)]
struct SimGrid {
    frame: GridFrame,
    width: i32,
    height: i32,
    walls: HashSet<GridCell>,
}

impl SimGrid {
    fn in_bounds(&self, cell: GridCell) -> bool {
        (0..self.width).contains(&cell.x) && (0..self.height).contains(&cell.y)
    }

    fn walkable(&self, cell: GridCell) -> bool {
        self.in_bounds(cell) && !self.walls.contains(&cell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioAction {
    Play,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioEvent {
    pub entity: EntityId,
    pub clip: String,
    pub action: AudioAction,
    pub at: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRecord {
    pub entity: EntityId,
    pub prefab: String,
    pub position: Vec2,
    pub rotation_degrees: f32,
    pub at: f32,
}

#[derive(Debug)]
pub struct SimWorld {
    entities: BTreeMap<EntityId, SimEntity>,
    next_entity: u32,
    grids: HashMap<GridKey, SimGrid>,
    rays: HashMap<(EntityId, String), Vec2>,
    collisions: HashMap<EntityId, Vec<EntityId>>,
    game_time: f32,
    delta_time: f32,
    time_scale: f32,
    audio_log: Vec<AudioEvent>,
    spawn_log: Vec<SpawnRecord>,
    delete_log: Vec<EntityId>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_entity: 1,
            grids: HashMap::new(),
            rays: HashMap::new(),
            collisions: HashMap::new(),
            game_time: 0.0,
            delta_time: 0.0,
            time_scale: 1.0,
            audio_log: Vec::new(),
            spawn_log: Vec::new(),
            delete_log: Vec::new(),
        }
    }

    fn insert(&mut self, tag: &str, position: Vec2, rotation_degrees: f32, body: bool) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        self.entities.insert(
            id,
            SimEntity {
                tag: tag.to_string(),
                transform: Transform {
                    rotation_degrees,
                    ..Transform::at(position)
                },
                velocity: body.then_some(Vec2::ZERO),
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    /// Adds an entity without a rigid body (markers, spawn points, waypoints).
    pub fn spawn_marker(&mut self, tag: &str, position: Vec2) -> EntityId {
        self.insert(tag, position, 0.0, false)
    }

    pub fn spawn_body(&mut self, tag: &str, position: Vec2) -> EntityId {
        self.insert(tag, position, 0.0, true)
    }

    pub fn attach_child(&mut self, parent: EntityId, child: EntityId) {
        if !self.entities.contains_key(&parent) {
            return;
        }
        let Some(entry) = self.entities.get_mut(&child) else {
            return;
        };
        entry.parent = Some(parent);
        if let Some(parent_entry) = self.entities.get_mut(&parent) {
            parent_entry.children.push(child);
        }
    }

    pub fn add_grid(&mut self, key: GridKey, anchor: Vec2, width: i32, height: i32) {
        self.grids.insert(
            key,
            SimGrid {
                frame: GridFrame { key, anchor },
                width: width.max(0),
                height: height.max(0),
                walls: HashSet::new(),
            },
        );
    }

    pub fn add_wall(&mut self, key: GridKey, cell: GridCell) {
        if let Some(grid) = self.grids.get_mut(&key) {
            grid.walls.insert(cell);
        }
    }

    /// Reports `a` and `b` as touching until the next `step`.
    pub fn inject_collision(&mut self, a: EntityId, b: EntityId) {
        self.collisions.entry(a).or_default().push(b);
        self.collisions.entry(b).or_default().push(a);
    }

    pub fn set_position(&mut self, entity: EntityId, position: Vec2) {
        if let Some(entry) = self.entities.get_mut(&entity) {
            entry.transform.position = position;
        }
    }

    /// Advances the clock by `dt` real seconds, integrates velocities and
    /// forgets last step's collisions.
    pub fn step(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.delta_time = dt * self.time_scale;
        self.game_time += self.delta_time;
        for entity in self.entities.values_mut() {
            if let Some(velocity) = entity.velocity {
                entity.transform.position = entity
                    .transform
                    .position
                    .offset(velocity.scaled(self.delta_time));
            }
        }
        self.collisions.clear();
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn count_tagged(&self, tag: &str) -> usize {
        self.entities.values().filter(|entity| entity.tag == tag).count()
    }

    pub fn audio_log(&self) -> &[AudioEvent] {
        &self.audio_log
    }

    pub fn played(&self, clip: &str) -> usize {
        self.audio_log
            .iter()
            .filter(|event| event.action == AudioAction::Play && event.clip == clip)
            .count()
    }

    pub fn spawn_log(&self) -> &[SpawnRecord] {
        &self.spawn_log
    }

    pub fn spawned(&self, prefab: &str) -> usize {
        self.spawn_log
            .iter()
            .filter(|record| record.prefab == prefab)
            .count()
    }

    pub fn delete_log(&self) -> &[EntityId] {
        &self.delete_log
    }

    fn segment_clear(&self, from: Vec2, to: Vec2) -> bool {
        let length = from.to(to).length();
        let samples = (length / RAY_SAMPLE_SPACING).ceil().max(1.0) as usize;
        self.grids.values().all(|grid| {
            (0..=samples).all(|i| {
                let t = i as f32 / samples as f32;
                let point = from.offset(from.to(to).scaled(t));
                !grid.walls.contains(&grid.frame.world_to_grid(point))
            })
        })
    }
}

impl Clock for SimWorld {
    fn game_time(&self) -> f32 {
        self.game_time
    }

    fn delta_time(&self) -> f32 {
        self.delta_time
    }

    fn time_scale(&self) -> f32 {
        self.time_scale
    }

    fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = if scale.is_finite() { scale.max(0.0) } else { 1.0 };
    }
}

impl Transforms for SimWorld {
    fn transform(&self, entity: EntityId) -> Option<Transform> {
        self.entities.get(&entity).map(|entry| entry.transform)
    }

    fn set_transform(&mut self, entity: EntityId, transform: Transform) {
        if let Some(entry) = self.entities.get_mut(&entity) {
            entry.transform = transform;
        }
    }

    fn velocity(&self, entity: EntityId) -> Option<Vec2> {
        self.entities.get(&entity).and_then(|entry| entry.velocity)
    }

    fn set_velocity(&mut self, entity: EntityId, velocity: Vec2) -> bool {
        match self.entities.get_mut(&entity) {
            Some(SimEntity {
                velocity: Some(slot),
                ..
            }) => {
                *slot = velocity;
                true
            }
            _ => false,
        }
    }

    fn children(&self, entity: EntityId) -> Vec<EntityId> {
        self.entities
            .get(&entity)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    fn tag_of(&self, entity: EntityId) -> Option<&str> {
        self.entities.get(&entity).map(|entry| entry.tag.as_str())
    }

    fn entity_with_tag(&self, tag: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, entry)| entry.tag == tag)
            .map(|(id, _)| *id)
    }
}

impl Collisions for SimWorld {
    fn collided_entities(&self, entity: EntityId) -> Vec<EntityId> {
        self.collisions.get(&entity).cloned().unwrap_or_default()
    }
}

impl Raycasts for SimWorld {
    fn set_ray_target(&mut self, entity: EntityId, ray: &str, target: Vec2) {
        self.rays.insert((entity, ray.to_string()), target);
    }

    fn ray_target_reached(&self, entity: EntityId, ray: &str) -> bool {
        let Some(target) = self.rays.get(&(entity, ray.to_string())) else {
            return false;
        };
        let Some(origin) = self.position(entity) else {
            return false;
        };
        self.segment_clear(origin, *target)
    }
}

impl GridPaths for SimWorld {
    fn grid_anchor(&self, grid: GridKey) -> Option<Vec2> {
        self.grids.get(&grid).map(|grid| grid.frame.anchor)
    }

    /// Staircase walk from `start` towards `end`, stepping along the axis with
    /// the larger remaining gap. Fails on the first blocked or out-of-bounds cell.
    fn find_path(&self, grid: GridKey, start: GridCell, end: GridCell) -> Vec<GridCell> {
        let Some(grid) = self.grids.get(&grid) else {
            return Vec::new();
        };
        if !grid.walkable(start) || !grid.walkable(end) {
            return Vec::new();
        }
        let mut cells = vec![start];
        let mut cursor = start;
        while cursor != end {
            let dx = end.x - cursor.x;
            let dy = end.y - cursor.y;
            if dx.abs() >= dy.abs() {
                cursor.x += dx.signum();
            } else {
                cursor.y += dy.signum();
            }
            if !grid.walkable(cursor) {
                return Vec::new();
            }
            cells.push(cursor);
        }
        cells
    }
}

impl Lifecycle for SimWorld {
    fn spawn_prefab(&mut self, prefab: &str, position: Vec2, rotation_degrees: f32) -> Option<EntityId> {
        if prefab.is_empty() {
            return None;
        }
        let entity = self.insert(prefab, position, rotation_degrees, true);
        self.spawn_log.push(SpawnRecord {
            entity,
            prefab: prefab.to_string(),
            position,
            rotation_degrees,
            at: self.game_time,
        });
        debug!(entity = entity.0, prefab, "prefab_spawned");
        Some(entity)
    }

    fn delete_entity(&mut self, entity: EntityId) {
        let Some(entry) = self.entities.remove(&entity) else {
            return;
        };
        if let Some(parent) = entry.parent.and_then(|parent| self.entities.get_mut(&parent)) {
            parent.children.retain(|child| *child != entity);
        }
        for child in entry.children {
            if let Some(child_entry) = self.entities.get_mut(&child) {
                child_entry.parent = None;
            }
        }
        self.rays.retain(|(owner, _), _| *owner != entity);
        self.delete_log.push(entity);
        debug!(entity = entity.0, tag = %entry.tag, "entity_deleted");
    }

    fn exists(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }
}

impl Audio for SimWorld {
    fn play_audio(&mut self, entity: EntityId, clip: &str) {
        self.audio_log.push(AudioEvent {
            entity,
            clip: clip.to_string(),
            action: AudioAction::Play,
            at: self.game_time,
        });
    }

    fn stop_audio(&mut self, entity: EntityId, clip: &str) {
        self.audio_log.push(AudioEvent {
            entity,
            clip: clip.to_string(),
            action: AudioAction::Stop,
            at: self.game_time,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walled_world() -> SimWorld {
        let mut world = SimWorld::new();
        world.add_grid(GridKey(0), Vec2::new(0.0, 10.0), 10, 10);
        world.add_wall(GridKey(0), GridCell::new(5, 5));
        world
    }

    #[test]
    fn step_integrates_velocity_by_time_scale() {
        let mut world = SimWorld::new();
        let body = world.spawn_body("Enemy", Vec2::ZERO);
        world.set_velocity(body, Vec2::new(2.0, 0.0));

        world.step(0.5);
        assert_eq!(world.position(body), Some(Vec2::new(1.0, 0.0)));

        world.set_time_scale(0.0);
        world.step(0.5);
        assert_eq!(world.position(body), Some(Vec2::new(1.0, 0.0)));
        assert_eq!(world.delta_time(), 0.0);
        assert_eq!(world.game_time(), 0.5);
    }

    #[test]
    fn markers_have_no_rigid_body() {
        let mut world = SimWorld::new();
        let marker = world.spawn_marker("Waypoint", Vec2::ZERO);
        assert_eq!(world.velocity(marker), None);
        assert!(!world.set_velocity(marker, Vec2::new(1.0, 1.0)));
    }

    #[test]
    fn injected_collisions_last_one_step() {
        let mut world = SimWorld::new();
        let a = world.spawn_body("Enemy", Vec2::ZERO);
        let b = world.spawn_body("PlayerBullet", Vec2::ZERO);
        world.inject_collision(a, b);
        assert_eq!(world.collided_entities(a), vec![b]);
        assert_eq!(world.collided_entities(b), vec![a]);

        world.step(0.016);
        assert!(world.collided_entities(a).is_empty());
    }

    #[test]
    fn walls_block_rays() {
        let mut world = walled_world();
        let frame = GridFrame {
            key: GridKey(0),
            anchor: Vec2::new(0.0, 10.0),
        };
        let eye = world.spawn_body("Enemy", frame.grid_to_world(GridCell::new(2, 5)));
        let behind_wall = frame.grid_to_world(GridCell::new(8, 5));
        let open = frame.grid_to_world(GridCell::new(2, 1));

        world.set_ray_target(eye, "ray", behind_wall);
        assert!(!world.ray_target_reached(eye, "ray"));
        world.set_ray_target(eye, "ray", open);
        assert!(world.ray_target_reached(eye, "ray"));
        assert!(!world.ray_target_reached(eye, "unset"));
    }

    #[test]
    fn staircase_path_reaches_end_or_fails_on_walls() {
        let world = walled_world();
        let path = world.find_path(GridKey(0), GridCell::new(0, 0), GridCell::new(3, 2));
        assert_eq!(path.first(), Some(&GridCell::new(0, 0)));
        assert_eq!(path.last(), Some(&GridCell::new(3, 2)));
        assert_eq!(path.len(), 6);

        let blocked = world.find_path(GridKey(0), GridCell::new(2, 5), GridCell::new(8, 5));
        assert!(blocked.is_empty());
        let outside = world.find_path(GridKey(0), GridCell::new(0, 0), GridCell::new(12, 0));
        assert!(outside.is_empty());
        assert!(world.find_path(GridKey(7), GridCell::new(0, 0), GridCell::new(1, 1)).is_empty());
    }

    #[test]
    fn deleting_parent_detaches_children() {
        let mut world = SimWorld::new();
        let parent = world.spawn_body("Enemy", Vec2::ZERO);
        let child = world.spawn_marker("Waypoint", Vec2::new(1.0, 0.0));
        world.attach_child(parent, child);
        assert_eq!(world.children(parent), vec![child]);

        world.delete_entity(parent);
        assert!(!world.exists(parent));
        assert!(world.exists(child));
        assert_eq!(world.delete_log(), &[parent]);
        world.delete_entity(parent);
        assert_eq!(world.delete_log().len(), 1);
    }

    #[test]
    fn spawned_prefabs_are_logged_and_tagged() {
        let mut world = SimWorld::new();
        let bullet = world.spawn_prefab("prefab_enemyBullet", Vec2::new(1.0, 2.0), 45.0);
        let Some(bullet) = bullet else {
            panic!("spawn failed");
        };
        assert_eq!(world.tag_of(bullet), Some("prefab_enemyBullet"));
        assert_eq!(world.spawned("prefab_enemyBullet"), 1);
        assert_eq!(world.entity_with_tag("prefab_enemyBullet"), Some(bullet));
        assert!(world.spawn_prefab("", Vec2::ZERO, 0.0).is_none());
    }
}
