//! 2D vector type.
//!
//! Angles are expressed in degrees and follow the screen convention
//! (y axis pointing down), so a positive rotation turns clockwise on screen.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A 2D vector or point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
}

impl Vector {
    /// The zero vector.
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise sum.
    #[inline]
    pub fn add(self, other: Vector) -> Vector {
        Vector::new(self.x + other.x, self.y + other.y)
    }

    /// Component-wise difference.
    #[inline]
    pub fn subtract(self, other: Vector) -> Vector {
        Vector::new(self.x - other.x, self.y - other.y)
    }

    /// Scale by a scalar.
    #[inline]
    pub fn multiply(self, k: f64) -> Vector {
        Vector::new(self.x * k, self.y * k)
    }

    /// Opposite vector.
    #[inline]
    pub fn negate(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }

    /// Dot product.
    #[inline]
    pub fn dot(self, other: Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Euclidean length.
    #[inline]
    pub fn length(self) -> f64 {
        self.length_sq().sqrt()
    }

    /// Squared length.
    #[inline]
    pub fn length_sq(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Angle of the vector in degrees, in `(-180, 180]`.
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x).to_degrees()
    }

    /// Unit vector with the same direction.
    ///
    /// The zero vector normalizes to itself.
    pub fn normalize(self) -> Vector {
        let len = self.length();
        if len == 0.0 {
            self
        } else {
            Vector::new(self.x / len, self.y / len)
        }
    }

    /// Rotate by `degrees`.
    pub fn rotate(self, degrees: f64) -> Vector {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Vector::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Vector) -> f64 {
        self.subtract(other).length()
    }

    /// Exact component equality.
    #[inline]
    pub fn equals(self, other: Vector) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        Vector::add(self, rhs)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, rhs: Vector) -> Vector {
        self.subtract(rhs)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, rhs: f64) -> Vector {
        self.multiply(rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        self.negate()
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(f64, f64)> for Vector {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_arithmetic() {
        let a = Vector::new(1.0, 2.0);
        let b = Vector::new(3.0, -1.0);
        assert_eq!(a + b, Vector::new(4.0, 1.0));
        assert_eq!(a - b, Vector::new(-2.0, 3.0));
        assert_eq!(a * 2.0, Vector::new(2.0, 4.0));
        assert_eq!(-a, Vector::new(-1.0, -2.0));
        assert_eq!(a.dot(b), 1.0);
    }

    #[test]
    fn test_length_and_normalize() {
        let v = Vector::new(3.0, 4.0);
        assert_eq!(v.length(), 5.0);
        let n = v.normalize();
        assert!((n.length() - 1.0).abs() < EPS);
        assert_eq!(Vector::ZERO.normalize(), Vector::ZERO);
    }

    #[test]
    fn test_angle_is_y_down() {
        // Pointing "down" the screen is +90 degrees.
        assert!((Vector::new(0.0, 1.0).angle() - 90.0).abs() < EPS);
        assert!((Vector::new(-1.0, 0.0).angle() - 180.0).abs() < EPS);
    }

    #[test]
    fn test_rotate() {
        let r = Vector::new(1.0, 0.0).rotate(90.0);
        assert!(r.x.abs() < EPS);
        assert!((r.y - 1.0).abs() < EPS);

        let back = r.rotate(-90.0);
        assert!((back.x - 1.0).abs() < EPS);
        assert!(back.y.abs() < EPS);
    }
}
