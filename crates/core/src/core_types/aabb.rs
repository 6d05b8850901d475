//! Running axis-aligned bounds over a growing set of compartment samples

use super::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box accumulated from points with a radius
///
/// Starts empty (`min = +MAX`, `max = -MAX`). Each [`Aabb::add`] widens every
/// axis independently by the radius, so the result is a conservative
/// axis-aligned bound rather than a tight sphere bound. Insertion order does
/// not matter, which lets batches be folded in any order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Empty box that any added point will replace
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::MAX),
            max: Vec3::repeat(-f32::MAX),
        }
    }

    /// Box from explicit corners
    pub fn from_corners(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Expand so that a sphere of `radius` around `position` is contained
    pub fn add(&mut self, position: &Vec3, radius: f32) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(position[axis] - radius);
            self.max[axis] = self.max[axis].max(position[axis] + radius);
        }
    }

    /// Fold another box into this one
    pub fn merge(&mut self, other: &Aabb) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// True until the first point is added
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    /// Per-axis span (`max - min`)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for Aabb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "x:[{} {}] y:[{} {}] z:[{} {}]",
            self.min.x, self.max.x, self.min.y, self.max.y, self.min.z, self.max.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_box() {
        let aabb = Aabb::empty();
        assert!(aabb.is_empty());
        assert_eq!(aabb.min.x, f32::MAX);
        assert_eq!(aabb.max.z, -f32::MAX);
    }

    #[test]
    fn test_add_expands_by_radius_per_axis() {
        let mut aabb = Aabb::empty();
        aabb.add(&Vec3::new(1.0, 2.0, 3.0), 0.5);
        assert!(!aabb.is_empty());
        assert_eq!(aabb.min, Vec3::new(0.5, 1.5, 2.5));
        assert_eq!(aabb.max, Vec3::new(1.5, 2.5, 3.5));
    }

    #[test]
    fn test_add_never_shrinks() {
        let points = [
            (Vec3::new(-3.0, 4.0, 0.0), 1.0),
            (Vec3::new(10.0, -2.0, 7.0), 0.0),
            (Vec3::new(0.0, 0.0, 0.0), 2.5),
            (Vec3::new(5.0, 5.0, -9.0), 0.25),
        ];
        let mut aabb = Aabb::empty();
        for (pos, radius) in &points {
            let before = aabb;
            aabb.add(pos, *radius);
            for axis in 0..3 {
                assert!(aabb.min[axis] <= before.min[axis]);
                assert!(aabb.max[axis] >= before.max[axis]);
                assert!(aabb.min[axis] <= aabb.max[axis]);
            }
        }
    }

    #[test]
    fn test_order_independent() {
        let points = [
            (Vec3::new(-3.0, 4.0, 0.0), 1.0),
            (Vec3::new(10.0, -2.0, 7.0), 0.0),
            (Vec3::new(5.0, 5.0, -9.0), 0.25),
        ];
        let mut forward = Aabb::empty();
        for (pos, radius) in &points {
            forward.add(pos, *radius);
        }
        let mut halves = (Aabb::empty(), Aabb::empty());
        halves.0.add(&points[2].0, points[2].1);
        halves.1.add(&points[1].0, points[1].1);
        halves.1.add(&points[0].0, points[0].1);
        halves.0.merge(&halves.1);
        assert_eq!(forward, halves.0);
    }

    #[test]
    fn test_center_and_size() {
        let aabb = Aabb::from_corners(Vec3::new(-2.0, 0.0, 4.0), Vec3::new(2.0, 10.0, 8.0));
        assert_eq!(aabb.center(), Vec3::new(0.0, 5.0, 6.0));
        assert_eq!(aabb.size(), Vec3::new(4.0, 10.0, 4.0));
    }
}
