//! World positions and the geometry helpers the target resolver leans on.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::constants::{MAP_HALFSIZE, MAP_MAX_HEIGHT};

/// A point in the world plus a facing orientation in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub o: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32, o: f32) -> Self {
        Self { x, y, z, o }
    }

    /// Whether all coordinates are finite and inside the playable area.
    /// Wire payloads carrying coordinates that fail this check are
    /// malformed and must abort the parse.
    pub fn is_valid_map_coord(&self) -> bool {
        let in_bounds = |v: f32| v.is_finite() && v.abs() <= MAP_HALFSIZE;
        in_bounds(self.x)
            && in_bounds(self.y)
            && self.z.is_finite()
            && self.z.abs() <= MAP_MAX_HEIGHT
            && self.o.is_finite()
    }

    pub fn dist_squared_2d(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn dist_squared(&self, other: &Position) -> f32 {
        let dz = self.z - other.z;
        self.dist_squared_2d(other) + dz * dz
    }

    pub fn dist(&self, other: &Position) -> f32 {
        self.dist_squared(other).sqrt()
    }

    pub fn dist_2d(&self, other: &Position) -> f32 {
        self.dist_squared_2d(other).sqrt()
    }

    /// Exact containment test without a square root.
    pub fn is_within_dist(&self, other: &Position, radius: f32) -> bool {
        self.dist_squared(other) <= radius * radius
    }

    /// Absolute angle from this position to the target, in `[0, 2pi)`.
    pub fn angle_to(&self, other: &Position) -> f32 {
        let a = (other.y - self.y).atan2(other.x - self.x);
        if a < 0.0 {
            a + std::f32::consts::TAU
        } else {
            a
        }
    }

    /// Whether `other` lies inside the cone of `arc` radians centered on
    /// this position's facing.
    pub fn is_within_arc(&self, other: &Position, arc: f32) -> bool {
        let mut delta = self.angle_to(other) - self.o;
        while delta > std::f32::consts::PI {
            delta -= std::f32::consts::TAU;
        }
        while delta < -std::f32::consts::PI {
            delta += std::f32::consts::TAU;
        }
        delta.abs() <= arc / 2.0
    }

    /// Whether `other` is in front of this position (within a half circle).
    pub fn has_in_front(&self, other: &Position) -> bool {
        self.is_within_arc(other, std::f32::consts::PI)
    }

    /// The point `dist` yards from here at absolute angle `angle`.
    pub fn offset_polar(&self, angle: f32, dist: f32) -> Position {
        Position {
            x: self.x + angle.cos() * dist,
            y: self.y + angle.sin() * dist,
            z: self.z,
            o: self.o,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32, y: f32) -> Position {
        Position::new(x, y, 0.0, 0.0)
    }

    #[test]
    fn test_distances() {
        let a = at(0.0, 0.0);
        let b = at(3.0, 4.0);
        assert_eq!(a.dist_2d(&b), 5.0);
        assert!(a.is_within_dist(&b, 5.0));
        assert!(!a.is_within_dist(&b, 4.99));
    }

    #[test]
    fn test_map_coord_validation() {
        assert!(at(100.0, -200.0).is_valid_map_coord());
        assert!(!at(f32::NAN, 0.0).is_valid_map_coord());
        assert!(!at(MAP_HALFSIZE + 1.0, 0.0).is_valid_map_coord());
        let mut p = at(0.0, 0.0);
        p.z = f32::INFINITY;
        assert!(!p.is_valid_map_coord());
    }

    #[test]
    fn test_cone_containment() {
        // caster at origin facing +x
        let caster = Position::new(0.0, 0.0, 0.0, 0.0);
        let ahead = at(10.0, 0.0);
        let ahead_left = at(10.0, 3.0);
        let behind = at(-10.0, 0.0);

        assert!(caster.is_within_arc(&ahead, std::f32::consts::FRAC_PI_2));
        assert!(caster.is_within_arc(&ahead_left, std::f32::consts::FRAC_PI_2));
        assert!(!caster.is_within_arc(&behind, std::f32::consts::FRAC_PI_2));
        assert!(caster.has_in_front(&ahead));
        assert!(!caster.has_in_front(&behind));
    }

    #[test]
    fn test_cone_wraps_across_zero() {
        // facing just below the 0/2pi seam, target just above it
        let caster = Position::new(0.0, 0.0, 0.0, std::f32::consts::TAU - 0.05);
        let target = at(10.0, 1.0);
        assert!(caster.is_within_arc(&target, std::f32::consts::FRAC_PI_2));
    }

    #[test]
    fn test_offset_polar() {
        let p = at(1.0, 1.0).offset_polar(0.0, 5.0);
        assert!((p.x - 6.0).abs() < 1e-5);
        assert!((p.y - 1.0).abs() < 1e-5);
    }
}
