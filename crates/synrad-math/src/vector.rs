// ─────────────────────────────────────────────────────────────────────
// SynRad — Vector Algebra
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Small fixed-size vectors used throughout the simulator.
//!
//! `Vector3` carries positions, velocities and fields; `Vector3C` carries
//! frequency-domain fields; `Vector4` is a Minkowski four-vector with the
//! (+,−,−,−) metric; `Vector2` holds per-plane beam optics pairs.

use num_complex::Complex64;
use std::ops::{Add, AddAssign, Div, Index, Mul, MulAssign, Neg, Sub, SubAssign};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Vector2 { x, y }
    }

    pub fn dot(self, other: Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl From<[f64; 2]> for Vector2 {
    fn from(a: [f64; 2]) -> Self {
        Vector2::new(a[0], a[1])
    }
}

impl Add for Vector2 {
    type Output = Vector2;
    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;
    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;
    fn mul(self, s: f64) -> Vector2 {
        Vector2::new(self.x * s, self.y * s)
    }
}

/// Real 3-vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);
    pub const X: Vector3 = Vector3::new(1.0, 0.0, 0.0);
    pub const Y: Vector3 = Vector3::new(0.0, 1.0, 0.0);
    pub const Z: Vector3 = Vector3::new(0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Vector3 { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn dot(self, other: Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm_sqr(self) -> f64 {
        self.dot(self)
    }

    pub fn norm(self) -> f64 {
        self.norm_sqr().sqrt()
    }

    /// Unit vector in the same direction; the zero vector maps to itself.
    pub fn unit(self) -> Vector3 {
        let n = self.norm();
        if n > 0.0 {
            self / n
        } else {
            self
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    pub fn rotate_x(self, angle: f64) -> Vector3 {
        let (s, c) = angle.sin_cos();
        Vector3::new(self.x, c * self.y - s * self.z, s * self.y + c * self.z)
    }

    pub fn rotate_y(self, angle: f64) -> Vector3 {
        let (s, c) = angle.sin_cos();
        Vector3::new(c * self.x + s * self.z, self.y, -s * self.x + c * self.z)
    }

    pub fn rotate_z(self, angle: f64) -> Vector3 {
        let (s, c) = angle.sin_cos();
        Vector3::new(c * self.x - s * self.y, s * self.x + c * self.y, self.z)
    }

    /// Rodrigues rotation about an arbitrary axis (right-handed).
    pub fn rotate_about(self, axis: Vector3, angle: f64) -> Vector3 {
        let k = axis.unit();
        if k.is_zero() {
            return self;
        }
        let (s, c) = angle.sin_cos();
        self * c + k.cross(self) * s + k * (k.dot(self) * (1.0 - c))
    }

    /// Euler rotation: about X by `angles[0]`, then Y, then Z.
    pub fn rotate_xyz(self, angles: [f64; 3]) -> Vector3 {
        self.rotate_x(angles[0])
            .rotate_y(angles[1])
            .rotate_z(angles[2])
    }

    /// Exact inverse of [`Vector3::rotate_xyz`].
    pub fn rotate_xyz_inverse(self, angles: [f64; 3]) -> Vector3 {
        self.rotate_z(-angles[2])
            .rotate_y(-angles[1])
            .rotate_x(-angles[0])
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from(a: [f64; 3]) -> Self {
        Vector3::new(a[0], a[1], a[2])
    }
}

impl Index<usize> for Vector3 {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Vector3 index out of range: {i}"),
        }
    }
}

impl Add for Vector3 {
    type Output = Vector3;
    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;
    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Vector3;
    fn mul(self, s: f64) -> Vector3 {
        Vector3::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Mul<Vector3> for f64 {
    type Output = Vector3;
    fn mul(self, v: Vector3) -> Vector3 {
        v * self
    }
}

impl Div<f64> for Vector3 {
    type Output = Vector3;
    fn div(self, s: f64) -> Vector3 {
        Vector3::new(self.x / s, self.y / s, self.z / s)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, rhs: Vector3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl SubAssign for Vector3 {
    fn sub_assign(&mut self, rhs: Vector3) {
        self.x -= rhs.x;
        self.y -= rhs.y;
        self.z -= rhs.z;
    }
}

impl MulAssign<f64> for Vector3 {
    fn mul_assign(&mut self, s: f64) {
        self.x *= s;
        self.y *= s;
        self.z *= s;
    }
}

impl std::iter::Sum for Vector3 {
    fn sum<I: Iterator<Item = Vector3>>(iter: I) -> Vector3 {
        iter.fold(Vector3::ZERO, |acc, v| acc + v)
    }
}

/// Minkowski four-vector `(t, x, y, z)`, metric (+,−,−,−).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector4 {
    pub t: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector4 {
    pub const fn new(t: f64, x: f64, y: f64, z: f64) -> Self {
        Vector4 { t, x, y, z }
    }

    /// Dimensionless four-velocity `γ(1, β)`. Requires `|β| < 1`.
    pub fn four_velocity(beta: Vector3) -> Vector4 {
        let gamma = 1.0 / (1.0 - beta.norm_sqr()).sqrt();
        Vector4::new(gamma, gamma * beta.x, gamma * beta.y, gamma * beta.z)
    }

    pub fn spatial(self) -> Vector3 {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn minkowski_dot(self, other: Vector4) -> f64 {
        self.t * other.t - self.x * other.x - self.y * other.y - self.z * other.z
    }

    /// Invariant `t² − |x|²`.
    pub fn interval(self) -> f64 {
        self.minkowski_dot(self)
    }
}

impl Add for Vector4 {
    type Output = Vector4;
    fn add(self, rhs: Vector4) -> Vector4 {
        Vector4::new(self.t + rhs.t, self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector4 {
    type Output = Vector4;
    fn sub(self, rhs: Vector4) -> Vector4 {
        Vector4::new(self.t - rhs.t, self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vector4 {
    type Output = Vector4;
    fn mul(self, s: f64) -> Vector4 {
        Vector4::new(self.t * s, self.x * s, self.y * s, self.z * s)
    }
}

/// Complex 3-vector for frequency-domain fields.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3C {
    pub x: Complex64,
    pub y: Complex64,
    pub z: Complex64,
}

impl Vector3C {
    pub const ZERO: Vector3C = Vector3C {
        x: Complex64::new(0.0, 0.0),
        y: Complex64::new(0.0, 0.0),
        z: Complex64::new(0.0, 0.0),
    };

    pub const fn new(x: Complex64, y: Complex64, z: Complex64) -> Self {
        Vector3C { x, y, z }
    }

    pub fn from_parts(re: Vector3, im: Vector3) -> Self {
        Vector3C::new(
            Complex64::new(re.x, im.x),
            Complex64::new(re.y, im.y),
            Complex64::new(re.z, im.z),
        )
    }

    pub fn re(self) -> Vector3 {
        Vector3::new(self.x.re, self.y.re, self.z.re)
    }

    pub fn im(self) -> Vector3 {
        Vector3::new(self.x.im, self.y.im, self.z.im)
    }

    pub fn conj(self) -> Vector3C {
        Vector3C::new(self.x.conj(), self.y.conj(), self.z.conj())
    }

    /// Bilinear product with a real vector.
    pub fn dot_real(self, v: Vector3) -> Complex64 {
        self.x * v.x + self.y * v.y + self.z * v.z
    }

    /// Hermitian product `Σ conj(self_i) · other_i`.
    pub fn hdot(self, other: Vector3C) -> Complex64 {
        self.x.conj() * other.x + self.y.conj() * other.y + self.z.conj() * other.z
    }

    pub fn norm_sqr(self) -> f64 {
        self.x.norm_sqr() + self.y.norm_sqr() + self.z.norm_sqr()
    }

    pub fn is_finite(self) -> bool {
        self.re().is_finite() && self.im().is_finite()
    }
}

impl From<Vector3> for Vector3C {
    fn from(v: Vector3) -> Self {
        Vector3C::from_parts(v, Vector3::ZERO)
    }
}

impl Add for Vector3C {
    type Output = Vector3C;
    fn add(self, rhs: Vector3C) -> Vector3C {
        Vector3C::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3C {
    type Output = Vector3C;
    fn sub(self, rhs: Vector3C) -> Vector3C {
        Vector3C::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl AddAssign for Vector3C {
    fn add_assign(&mut self, rhs: Vector3C) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Mul<f64> for Vector3C {
    type Output = Vector3C;
    fn mul(self, s: f64) -> Vector3C {
        Vector3C::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Mul<Complex64> for Vector3C {
    type Output = Vector3C;
    fn mul(self, s: Complex64) -> Vector3C {
        Vector3C::new(self.x * s, self.y * s, self.z * s)
    }
}
