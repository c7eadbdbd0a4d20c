//! Range and angle predicates, near-point projection and path shortening
//! shared by the chase, follow and random-destination generators.

use crate::motion::actor::ActorView;
use crate::motion::constants::chase::CONTACT_DISTANCE;
use crate::motion::services::{Path, WorldQuery};
use crate::util::vec2::{angle_difference, normalize_orientation, Vec2};

/// Distance band a chaser keeps from its target, before hitbox adjustment.
///
/// The actor starts moving once it leaves `[min_range, max_range]` and aims
/// for `[min_tolerance, max_tolerance]`, which lies strictly inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaseRange {
    pub min_range: f32,
    pub min_tolerance: f32,
    pub max_range: f32,
    pub max_tolerance: f32,
}

impl ChaseRange {
    /// Keep roughly `range` away from the target
    pub fn new(range: f32) -> Self {
        Self {
            min_range: if range > CONTACT_DISTANCE {
                0.0
            } else {
                range - CONTACT_DISTANCE
            },
            min_tolerance: range,
            max_range: range + CONTACT_DISTANCE,
            max_tolerance: range,
        }
    }

    /// Stay between `min` and `max`
    pub fn between(min: f32, max: f32) -> Self {
        let min_tolerance = (min + CONTACT_DISTANCE).min((min + max) / 2.0);
        Self {
            min_range: min,
            min_tolerance,
            max_range: max,
            max_tolerance: (max - CONTACT_DISTANCE).max(min_tolerance),
        }
    }
}

/// Allowed bearing of the chaser as seen from the target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaseAngle {
    /// Relative to the target's facing
    pub relative: f32,
    pub tolerance: f32,
}

impl ChaseAngle {
    pub fn new(relative: f32, tolerance: f32) -> Self {
        Self {
            relative: normalize_orientation(relative),
            tolerance,
        }
    }

    pub fn upper_bound(&self) -> f32 {
        normalize_orientation(self.relative + self.tolerance)
    }

    pub fn lower_bound(&self) -> f32 {
        normalize_orientation(self.relative - self.tolerance)
    }

    pub fn is_angle_okay(&self, relative: f32) -> bool {
        angle_difference(relative, self.relative) <= self.tolerance
    }
}

/// Chase band with both combat reaches folded in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaseBand {
    pub min_range: f32,
    pub min_target: f32,
    pub max_range: f32,
    pub max_target: f32,
}

impl ChaseBand {
    /// `melee_range` is used as the outer edge when no range is configured
    pub fn resolve(range: Option<&ChaseRange>, hitbox_sum: f32, melee_range: f32) -> Self {
        match range {
            Some(range) => Self {
                min_range: range.min_range + hitbox_sum,
                min_target: range.min_tolerance + hitbox_sum,
                max_range: range.max_range + hitbox_sum,
                max_target: range.max_tolerance + hitbox_sum,
            },
            None => Self {
                min_range: CONTACT_DISTANCE,
                min_target: hitbox_sum,
                max_range: melee_range,
                max_target: CONTACT_DISTANCE + hitbox_sum,
            },
        }
    }
}

/// Whether a chaser at `position` is settled relative to `target`
pub fn position_okay(
    position: Vec2,
    target: &ActorView,
    min_distance: Option<f32>,
    max_distance: Option<f32>,
    angle: Option<&ChaseAngle>,
    world: &dyn WorldQuery,
) -> bool {
    let dist_sq = position.distance_sq_to(target.position);
    if min_distance.is_some_and(|min| dist_sq < min * min) {
        return false;
    }
    if max_distance.is_some_and(|max| dist_sq > max * max) {
        return false;
    }
    if angle.is_some_and(|angle| !angle.is_angle_okay(target.relative_angle_of(position))) {
        return false;
    }
    world.line_of_sight(position, target.position)
}

/// Point around `target` at `distance` past both hitboxes along `abs_angle`,
/// pulled back to the first obstacle
pub fn near_point(
    target: &ActorView,
    searcher_reach: f32,
    distance: f32,
    abs_angle: f32,
    world: &dyn WorldQuery,
) -> Vec2 {
    let reach = distance + target.combat_reach + searcher_reach;
    let wanted = target.position.offset(abs_angle, reach);
    world.first_collision(target.position, wanted)
}

/// Project `from` by `distance` along `angle`, stopping at the first obstacle
pub fn project_to_first_collision(world: &dyn WorldQuery, from: Vec2, distance: f32, angle: f32) -> Vec2 {
    world.first_collision(from, from.offset(angle, distance))
}

/// Cut `path` so it ends roughly `dist` away from `target`.
///
/// Walks back from the end while points are still too close and keep line
/// of sight to the target, then places the new end point on the segment
/// that crosses the `dist` circle.
pub fn shorten_path_until_dist(path: &mut Path, target: Vec2, dist: f32, world: &dyn WorldQuery) {
    if path.len() < 2 {
        return;
    }
    let dist_sq = dist * dist;

    if path[0].distance_sq_to(target) < dist_sq {
        return;
    }
    if path[path.len() - 1].distance_sq_to(target) >= dist_sq {
        return;
    }

    let mut i = path.len() - 1;
    loop {
        // path[i] is already too close
        if path[i - 1].distance_sq_to(target) >= dist_sq {
            break;
        }
        if !world.line_of_sight(path[i - 1], target) {
            path.truncate(i + 1);
            return;
        }
        i -= 1;
        if i == 0 {
            path[0] = path[1];
            path.truncate(2);
            return;
        }
    }

    let direction = (path[i - 1] - path[i]).normalize();
    let overshoot = dist - path[i].distance_to(target);
    path[i] += direction * overshoot;
    path.truncate(i + 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::actor::Actor;
    use std::f32::consts::{FRAC_PI_2, PI};

    struct Open;

    impl WorldQuery for Open {
        fn line_of_sight(&self, _from: Vec2, _to: Vec2) -> bool {
            true
        }

        fn first_collision(&self, _from: Vec2, to: Vec2) -> Vec2 {
            to
        }
    }

    /// Everything beyond x = 3 is solid
    struct WallAtThree;

    impl WorldQuery for WallAtThree {
        fn line_of_sight(&self, from: Vec2, to: Vec2) -> bool {
            from.x <= 3.0 && to.x <= 3.0
        }

        fn first_collision(&self, from: Vec2, to: Vec2) -> Vec2 {
            if to.x <= 3.0 {
                return to;
            }
            let t = ((3.0 - from.x) / (to.x - from.x)).clamp(0.0, 1.0);
            from.lerp(to, t)
        }
    }

    fn view_at(position: Vec2, orientation: f32, reach: f32) -> ActorView {
        let mut actor = Actor::new(2, position);
        actor.orientation = orientation;
        actor.combat_reach = reach;
        ActorView::capture(&actor, None)
    }

    fn path(points: &[(f32, f32)]) -> Path {
        points.iter().map(|&(x, y)| Vec2::new(x, y)).collect()
    }

    #[test]
    fn test_chase_range_between() {
        let range = ChaseRange::between(0.0, 5.0);
        assert_eq!(range.min_tolerance, 0.5);
        assert_eq!(range.max_tolerance, 4.5);

        // Narrow band keeps max tolerance above min tolerance
        let narrow = ChaseRange::between(2.0, 2.4);
        assert!((narrow.min_tolerance - 2.2).abs() < 1e-5);
        assert!((narrow.max_tolerance - 2.2).abs() < 1e-5);
    }

    #[test]
    fn test_chase_range_single() {
        let range = ChaseRange::new(3.0);
        assert_eq!(range.min_range, 0.0);
        assert_eq!(range.max_range, 3.5);
        assert_eq!(range.min_tolerance, 3.0);
    }

    #[test]
    fn test_chase_angle_wraps() {
        let angle = ChaseAngle::new(0.1, 0.3);
        assert!(angle.is_angle_okay(2.0 * PI - 0.1));
        assert!(!angle.is_angle_okay(PI));
        assert!((angle.lower_bound() - (2.0 * PI - 0.2)).abs() < 1e-5);
        assert!((angle.upper_bound() - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_band_defaults_to_melee() {
        let band = ChaseBand::resolve(None, 3.0, 5.0);
        assert_eq!(band.min_range, CONTACT_DISTANCE);
        assert_eq!(band.max_range, 5.0);
        assert_eq!(band.max_target, 3.5);

        let configured = ChaseBand::resolve(Some(&ChaseRange::between(0.0, 5.0)), 0.0, 5.0);
        assert_eq!(configured.max_range, 5.0);
        assert_eq!(configured.max_target, 4.5);
    }

    #[test]
    fn test_position_okay_checks_band_and_angle() {
        let target = view_at(Vec2::ZERO, 0.0, 0.0);
        assert!(position_okay(Vec2::new(4.0, 0.0), &target, Some(1.0), Some(5.0), None, &Open));
        assert!(!position_okay(Vec2::new(6.0, 0.0), &target, Some(1.0), Some(5.0), None, &Open));
        assert!(!position_okay(Vec2::new(0.5, 0.0), &target, Some(1.0), Some(5.0), None, &Open));

        // Behind the target
        let behind = ChaseAngle::new(PI, 0.5);
        assert!(!position_okay(Vec2::new(4.0, 0.0), &target, None, Some(5.0), Some(&behind), &Open));
        assert!(position_okay(Vec2::new(-4.0, 0.0), &target, None, Some(5.0), Some(&behind), &Open));
    }

    #[test]
    fn test_position_okay_requires_los() {
        let target = view_at(Vec2::new(4.0, 0.0), 0.0, 0.0);
        assert!(!position_okay(Vec2::ZERO, &target, None, Some(10.0), None, &WallAtThree));
    }

    #[test]
    fn test_near_point_adds_both_reaches() {
        let target = view_at(Vec2::ZERO, 0.0, 1.0);
        let point = near_point(&target, 0.5, 2.0, FRAC_PI_2, &Open);
        assert!(point.approx_eq(Vec2::new(0.0, 3.5), 1e-5));

        // Clamped by geometry
        let point = near_point(&target, 0.5, 2.0, 0.0, &WallAtThree);
        assert!(point.approx_eq(Vec2::new(3.0, 0.0), 1e-5));
    }

    #[test]
    fn test_project_negative_distance() {
        let point = project_to_first_collision(&Open, Vec2::ZERO, -2.0, 0.0);
        assert!(point.approx_eq(Vec2::new(-2.0, 0.0), 1e-5));
    }

    #[test]
    fn test_shorten_straight_path() {
        let mut points = path(&[(0.0, 0.0), (20.0, 0.0)]);
        shorten_path_until_dist(&mut points, Vec2::new(20.0, 0.0), 4.5, &Open);
        assert_eq!(points.len(), 2);
        assert!(points[1].approx_eq(Vec2::new(15.5, 0.0), 1e-4));
    }

    #[test]
    fn test_shorten_multi_segment_path() {
        let mut points = path(&[(0.0, 0.0), (10.0, 0.0), (10.0, 2.0), (10.0, 4.0)]);
        shorten_path_until_dist(&mut points, Vec2::new(10.0, 4.0), 5.0, &Open);
        // Cut lands on the first segment
        assert_eq!(points.len(), 2);
        assert!(points[1].approx_eq(Vec2::new(9.0, 0.0), 1e-4));
    }

    #[test]
    fn test_shorten_noop_when_end_far_enough() {
        let mut points = path(&[(0.0, 0.0), (5.0, 0.0)]);
        let original = points.clone();
        shorten_path_until_dist(&mut points, Vec2::new(20.0, 0.0), 4.5, &Open);
        assert_eq!(points, original);
    }

    #[test]
    fn test_shorten_noop_when_start_inside() {
        let mut points = path(&[(18.0, 0.0), (20.0, 0.0)]);
        let original = points.clone();
        shorten_path_until_dist(&mut points, Vec2::new(20.0, 0.0), 4.5, &Open);
        assert_eq!(points, original);
    }
}
