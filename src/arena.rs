use crate::utils::{POSITIVE, check_num};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Square arena centered at the origin.
///
/// Both bounds are the closed interval `[-side_length / 2, side_length / 2]`
/// and are always derived from `side_length`.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Arena {
    side_length: f64,
}

impl Arena {
    /// Create an arena with the given side length.
    ///
    /// # Errors
    /// Returns an error if `side_length` is not finite and positive.
    pub fn new(side_length: f64) -> Result<Self> {
        check_num(side_length, POSITIVE).context("invalid side length")?;
        Ok(Self { side_length })
    }

    pub fn side_length(&self) -> f64 {
        self.side_length
    }

    pub fn half_side(&self) -> f64 {
        0.5 * self.side_length
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        [-self.half_side(), self.half_side()]
    }

    pub fn y_bounds(&self) -> [f64; 2] {
        [-self.half_side(), self.half_side()]
    }

    /// Check whether a point lies inside the arena, boundary included.
    ///
    /// Points with a NaN coordinate are never contained.
    pub fn contains(&self, point: [f64; 2]) -> bool {
        let [x_min, x_max] = self.x_bounds();
        let [y_min, y_max] = self.y_bounds();
        (x_min..=x_max).contains(&point[0]) && (y_min..=y_max).contains(&point[1])
    }

    /// Distance from a contained point to the nearest wall.
    pub fn wall_distance(&self, point: [f64; 2]) -> f64 {
        self.half_side() - point[0].abs().max(point[1].abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_is_inclusive() {
        let arena = Arena::new(2.0).unwrap();
        assert!(arena.contains([1.0, 0.0]));
        assert!(arena.contains([-1.0, 1.0]));
        assert!(arena.contains([0.0, 0.0]));
        assert!(!arena.contains([1.000_000_1, 0.0]));
        assert!(!arena.contains([0.0, -1.000_000_1]));
    }

    #[test]
    fn nan_is_never_contained() {
        let arena = Arena::new(2.0).unwrap();
        assert!(!arena.contains([f64::NAN, 0.0]));
        assert!(!arena.contains([0.0, f64::NAN]));
    }

    #[test]
    fn bounds_are_symmetric() {
        let arena = Arena::new(1.25).unwrap();
        assert_eq!(arena.x_bounds(), [-0.625, 0.625]);
        assert_eq!(arena.y_bounds(), arena.x_bounds());
        assert_eq!(arena.wall_distance([0.5, -0.125]), 0.125);
    }

    #[test]
    fn invalid_side_length() {
        assert!(Arena::new(0.0).is_err());
        assert!(Arena::new(-1.0).is_err());
        assert!(Arena::new(f64::NAN).is_err());
        assert!(Arena::new(f64::INFINITY).is_err());
    }
}
