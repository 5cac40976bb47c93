use crate::host::{DynHost, EntityId, GridCell, GridKey, GridPaths, Transforms, Vec2};

/// Default squared distance at which a seek snaps onto its target and stops.
pub const SNAP_DISTANCE_SQ: f32 = 0.1;
/// Distance over which seek speed eases down towards the target.
pub const EASE_FALLOFF_DISTANCE: f32 = 10.0;
/// Seek speed never drops below this fraction of the requested speed.
pub const EASE_MIN_FACTOR: f32 = 0.25;

/// A path grid as seen from world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridFrame {
    pub key: GridKey,
    pub anchor: Vec2,
}

impl GridFrame {
    pub fn resolve<H: GridPaths + ?Sized>(host: &H, key: GridKey) -> Option<Self> {
        let anchor = host.grid_anchor(key)?;
        Some(Self { key, anchor })
    }

    /// Centre of `cell`; rows grow downward from the anchor.
    pub fn grid_to_world(&self, cell: GridCell) -> Vec2 {
        Vec2 {
            x: self.anchor.x + cell.x as f32 + 0.5,
            y: self.anchor.y - cell.y as f32 - 0.5,
        }
    }

    pub fn world_to_grid(&self, position: Vec2) -> GridCell {
        GridCell {
            x: position.x.floor() as i32 - self.anchor.x as i32,
            y: self.anchor.y as i32 - position.y.floor() as i32 - 1,
        }
    }

    /// World-space waypoints from `from` to `to`; empty when the grid has no path.
    pub fn plan<H: GridPaths + ?Sized>(&self, host: &H, from: Vec2, to: Vec2) -> Vec<Vec2> {
        host.find_path(self.key, self.world_to_grid(from), self.world_to_grid(to))
            .into_iter()
            .map(|cell| self.grid_to_world(cell))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathFollower {
    points: Vec<Vec2>,
    index: usize,
}

impl PathFollower {
    pub fn replace(&mut self, points: Vec<Vec2>) {
        self.points = points;
        self.index = 0;
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.index = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.points.len()
    }

    /// Current waypoint. An index past the end of a non-empty path is reset to 0.
    pub fn current(&mut self) -> Option<Vec2> {
        if self.points.is_empty() {
            return None;
        }
        if self.index >= self.points.len() {
            self.index = 0;
        }
        self.points.get(self.index).copied()
    }

    /// Advances to the next waypoint; returns `false` once the path is used up.
    pub fn advance(&mut self) -> bool {
        self.index += 1;
        !self.is_exhausted()
    }

    pub fn last(&self) -> Option<Vec2> {
        self.points.last().copied()
    }
}

pub fn within_reach(position: Vec2, target: Vec2, reach: f32) -> bool {
    position.distance_sq(target) <= reach * reach
}

/// Speed for an agent `distance_sq` away from its destination, easing down near it.
pub fn eased_speed(max_speed: f32, distance_sq: f32) -> f32 {
    let falloff_sq = EASE_FALLOFF_DISTANCE * EASE_FALLOFF_DISTANCE;
    max_speed * (distance_sq / falloff_sq).clamp(EASE_MIN_FACTOR, 1.0)
}

/// How an agent walks a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gait {
    pub speed: f32,
    /// Distance at which a waypoint counts as reached.
    pub reach: f32,
    pub snap_distance_sq: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekOutcome {
    Arrived,
    Moving,
    /// The entity has no transform or no rigid body.
    Immobile,
}

/// Faces `entity` towards `target` and sets its velocity to `speed`, or snaps
/// onto the target once close enough.
pub fn seek(
    host: &mut DynHost,
    entity: EntityId,
    target: Vec2,
    speed: f32,
    snap_distance_sq: f32,
) -> SeekOutcome {
    let Some(mut transform) = host.transform(entity) else {
        return SeekOutcome::Immobile;
    };
    let direction = transform.position.to(target);
    let distance_sq = direction.length_sq();

    if distance_sq < snap_distance_sq {
        transform.position = target;
        host.set_transform(entity, transform);
        host.set_velocity(entity, Vec2::ZERO);
        return SeekOutcome::Arrived;
    }

    let heading = direction.normalized();
    transform.rotation_degrees = heading.heading_degrees();
    host.set_transform(entity, transform);
    if host.set_velocity(entity, heading.scaled(speed)) {
        SeekOutcome::Moving
    } else {
        SeekOutcome::Immobile
    }
}

pub fn stop(host: &mut DynHost, entity: EntityId) {
    host.set_velocity(entity, Vec2::ZERO);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathProgress {
    Moving,
    /// The last waypoint was reached.
    Finished,
    /// Nothing to follow, or the entity has no position.
    Stalled,
}

/// Walks `path`, advancing when the current waypoint is within reach. Speed
/// eases by the distance to the path's last point, not the current waypoint.
pub fn follow(
    host: &mut DynHost,
    entity: EntityId,
    path: &mut PathFollower,
    gait: Gait,
) -> PathProgress {
    let Some(position) = host.position(entity) else {
        return PathProgress::Stalled;
    };
    let (Some(waypoint), Some(destination)) = (path.current(), path.last()) else {
        return PathProgress::Stalled;
    };
    if within_reach(position, waypoint, gait.reach) {
        return if path.advance() {
            PathProgress::Moving
        } else {
            PathProgress::Finished
        };
    }
    let speed = eased_speed(gait.speed, position.distance_sq(destination));
    seek(host, entity, waypoint, speed, gait.snap_distance_sq);
    PathProgress::Moving
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimWorld;

    fn frame() -> GridFrame {
        GridFrame {
            key: GridKey(0),
            anchor: Vec2::new(-4.0, 4.0),
        }
    }

    #[test]
    fn grid_world_round_trip_lands_on_cell_centre() {
        let frame = frame();
        let cell = GridCell::new(2, 3);
        let world = frame.grid_to_world(cell);
        assert_eq!(world, Vec2::new(-1.5, 0.5));
        assert_eq!(frame.world_to_grid(world), cell);
        assert_eq!(frame.world_to_grid(Vec2::new(-1.01, 0.99)), cell);
    }

    #[test]
    fn follower_resets_out_of_range_index() {
        let mut path = PathFollower::default();
        path.replace(vec![Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)]);
        assert!(path.advance());
        assert!(!path.advance());
        assert!(path.is_exhausted());
        assert_eq!(path.current(), Some(Vec2::new(1.0, 0.0)));
        assert_eq!(path.index(), 0);
    }

    #[test]
    fn empty_follower_has_no_current_waypoint() {
        let mut path = PathFollower::default();
        assert_eq!(path.current(), None);
        assert!(path.is_exhausted());
    }

    #[test]
    fn eased_speed_slows_near_target_but_never_stalls() {
        assert_eq!(eased_speed(2.0, 400.0), 2.0);
        assert!(eased_speed(2.0, 25.0) < 2.0);
        assert_eq!(eased_speed(2.0, 0.2), 2.0 * EASE_MIN_FACTOR);
    }

    #[test]
    fn seek_snaps_when_close_and_moves_otherwise() {
        let mut world = SimWorld::new();
        let enemy = world.spawn_body("Enemy", Vec2::ZERO);

        assert_eq!(
            seek(&mut world, enemy, Vec2::new(0.0, 12.0), 2.0, SNAP_DISTANCE_SQ),
            SeekOutcome::Moving
        );
        let velocity = world.velocity(enemy).unwrap_or(Vec2::ZERO);
        assert!(velocity.y > 1.9 && velocity.x.abs() < 1e-5);
        assert!(world.transform(enemy).is_some_and(|t| t.rotation_degrees.abs() < 1e-4));

        assert_eq!(
            seek(&mut world, enemy, Vec2::new(0.2, 0.1), 2.0, SNAP_DISTANCE_SQ),
            SeekOutcome::Arrived
        );
        assert_eq!(world.position(enemy), Some(Vec2::new(0.2, 0.1)));
        assert_eq!(world.velocity(enemy), Some(Vec2::ZERO));
    }

    #[test]
    fn follow_advances_past_reached_waypoints() {
        let mut world = SimWorld::new();
        let enemy = world.spawn_body("Enemy", Vec2::ZERO);
        let mut path = PathFollower::default();
        path.replace(vec![Vec2::new(0.3, 0.0), Vec2::new(5.0, 0.0)]);

        let gait = Gait {
            speed: 1.0,
            reach: 0.5,
            snap_distance_sq: SNAP_DISTANCE_SQ,
        };

        assert_eq!(follow(&mut world, enemy, &mut path, gait), PathProgress::Moving);
        assert_eq!(path.index(), 1);
        assert_eq!(follow(&mut world, enemy, &mut path, gait), PathProgress::Moving);
        assert!(world.velocity(enemy).is_some_and(|v| v.x > 0.0));

        world.set_position(enemy, Vec2::new(4.8, 0.0));
        assert_eq!(follow(&mut world, enemy, &mut path, gait), PathProgress::Finished);
        path.clear();
        assert_eq!(follow(&mut world, enemy, &mut path, gait), PathProgress::Stalled);
    }

    #[test]
    fn follow_eases_by_distance_to_the_last_waypoint() {
        let mut world = SimWorld::new();
        let enemy = world.spawn_body("Enemy", Vec2::ZERO);
        let mut path = PathFollower::default();
        path.replace((1..=20).map(|x| Vec2::new(x as f32, 0.0)).collect());
        let gait = Gait {
            speed: 2.0,
            reach: 0.5,
            snap_distance_sq: SNAP_DISTANCE_SQ,
        };

        assert_eq!(follow(&mut world, enemy, &mut path, gait), PathProgress::Moving);
        let far = world.velocity(enemy).unwrap_or_default();
        assert!((far.x - 2.0).abs() < 1e-4, "full speed far from the end, got {far:?}");

        world.set_position(enemy, Vec2::new(15.0, 0.0));
        path.replace((16..=20).map(|x| Vec2::new(x as f32, 0.0)).collect());
        assert_eq!(follow(&mut world, enemy, &mut path, gait), PathProgress::Moving);
        let near = world.velocity(enemy).unwrap_or_default();
        assert!((near.x - eased_speed(2.0, 25.0)).abs() < 1e-4);
    }
}
