use std::ops::{Add, AddAssign, Mul, Sub};

/// 2D vector in world coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn from_angle(angle: f64) -> Self {
        Self {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    #[inline]
    pub fn distance_to(&self, other: Vec2) -> f64 {
        (other - *self).length()
    }

    /// Angle in radians, normalized to [0, 2π)
    pub fn angle(&self) -> f64 {
        self.y.atan2(self.x).rem_euclid(std::f64::consts::TAU)
    }
}

impl Add for Vec2 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_length() {
        assert!((Vec2::new(3.0, 4.0).length() - 5.0).abs() < EPSILON);
        assert_eq!(Vec2::ZERO.length(), 0.0);
    }

    #[test]
    fn test_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert!((a.distance_to(b) - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_angle_wraps_positive() {
        assert!((Vec2::new(0.0, -1.0).angle() - 1.5 * PI).abs() < EPSILON);
        assert!((Vec2::new(-1.0, 0.0).angle() - PI).abs() < EPSILON);
    }

    #[test]
    fn test_from_angle_round_trip() {
        let v = Vec2::from_angle(PI / 2.0);
        assert!(v.x.abs() < EPSILON && (v.y - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_ops() {
        let mut v = Vec2::new(1.0, 2.0) + Vec2::new(3.0, 4.0) - Vec2::new(1.0, 1.0);
        v += Vec2::new(1.0, 1.0);
        assert_eq!(v * 2.0, Vec2::new(8.0, 12.0));
    }
}
