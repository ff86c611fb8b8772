//! Circle-overlap collision primitives.
//!
//! Everything in the arena is a circle; there is no rigid-body response.

use glam::Vec2;

/// True when two circles overlap (touching counts).
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    let r = ra + rb;
    a.distance_squared(b) <= r * r
}

pub fn distance(a: Vec2, b: Vec2) -> f32 {
    a.distance(b)
}

pub fn distance_sq(a: Vec2, b: Vec2) -> f32 {
    a.distance_squared(b)
}

/// Shortest distance from `p` to the segment `a..b`.
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Safe-zone test: within `radius` of the map centre.
pub fn in_safe_zone(p: Vec2, center: Vec2, radius: f32) -> bool {
    p.distance_squared(center) <= radius * radius
}

/// Unit vector for a heading in radians.
pub fn heading(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Heading (radians) pointing from `from` to `to`.
pub fn angle_to(from: Vec2, to: Vec2) -> f32 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// Clamp a point into the square map, keeping `margin` from the walls.
pub fn clamp_to_map(p: Vec2, map_size: f32, margin: f32) -> Vec2 {
    let hi = (map_size - margin).max(margin);
    Vec2::new(p.x.clamp(margin, hi), p.y.clamp(margin, hi))
}

/// Rotate `current` toward `target` by at most `max_step` radians.
pub fn turn_toward(current: f32, target: f32, max_step: f32) -> f32 {
    let mut diff = (target - current) % std::f32::consts::TAU;
    if diff > std::f32::consts::PI {
        diff -= std::f32::consts::TAU;
    } else if diff < -std::f32::consts::PI {
        diff += std::f32::consts::TAU;
    }
    current + diff.clamp(-max_step, max_step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circles_overlap() {
        assert!(circles_overlap(Vec2::ZERO, 5.0, Vec2::new(9.0, 0.0), 5.0));
        assert!(circles_overlap(Vec2::ZERO, 5.0, Vec2::new(10.0, 0.0), 5.0));
        assert!(!circles_overlap(Vec2::ZERO, 5.0, Vec2::new(10.1, 0.0), 5.0));
    }

    #[test]
    fn test_distances() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert!((distance(a, b) - 5.0).abs() < f32::EPSILON);
        assert!((distance_sq(a, b) - 25.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_point_segment_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);
        // Perpendicular foot inside the segment
        assert!((point_segment_distance(Vec2::new(5.0, 3.0), a, b) - 3.0).abs() < 1e-5);
        // Beyond the end point
        assert!((point_segment_distance(Vec2::new(13.0, 4.0), a, b) - 5.0).abs() < 1e-5);
        // Degenerate segment
        assert!((point_segment_distance(Vec2::new(3.0, 4.0), a, a) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_safe_zone() {
        let c = Vec2::new(2000.0, 2000.0);
        assert!(in_safe_zone(Vec2::new(2100.0, 2000.0), c, 300.0));
        assert!(!in_safe_zone(Vec2::new(2400.0, 2000.0), c, 300.0));
    }

    #[test]
    fn test_clamp_to_map() {
        let p = clamp_to_map(Vec2::new(-50.0, 5000.0), 4000.0, 20.0);
        assert_eq!(p, Vec2::new(20.0, 3980.0));
    }

    #[test]
    fn test_turn_toward_wraps() {
        let pi = std::f32::consts::PI;
        // Shortest way from 170deg to -170deg is +20deg, not -340deg
        let next = turn_toward(pi * 170.0 / 180.0, -pi * 170.0 / 180.0, 1.0);
        assert!(next > pi * 170.0 / 180.0);
        let capped = turn_toward(0.0, 1.0, 0.25);
        assert!((capped - 0.25).abs() < 1e-6);
    }
}
