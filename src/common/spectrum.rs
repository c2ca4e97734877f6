use approx::{AbsDiffEq, RelativeEq};
use num::Zero;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub};

#[derive(Clone, Debug, Copy, PartialEq)]
pub struct RGBSpectrum(na::Vector3<f32>);

impl RGBSpectrum {
    pub fn new(c: f32) -> Self {
        Self(na::Vector3::new(c, c, c))
    }

    pub fn from_floats(r: f32, g: f32, b: f32) -> Self {
        Self(na::Vector3::new(r, g, b))
    }

    pub fn r(&self) -> f32 {
        self.0[0]
    }
    pub fn g(&self) -> f32 {
        self.0[1]
    }
    pub fn b(&self) -> f32 {
        self.0[2]
    }

    pub fn is_black(&self) -> bool {
        self.is_zero()
    }

    pub fn has_nan(&self) -> bool {
        self.r().is_nan() || self.g().is_nan() || self.b().is_nan()
    }

    pub fn is_finite(&self) -> bool {
        self.r().is_finite() && self.g().is_finite() && self.b().is_finite()
    }

    /// Luminance for linear sRGB primaries.
    pub fn y(&self) -> f32 {
        const Y_WEIGHT: [f32; 3] = [0.212671, 0.715160, 0.072169];
        self.r() * Y_WEIGHT[0] + self.g() * Y_WEIGHT[1] + self.b() * Y_WEIGHT[2]
    }

    /// Average over the channels.
    pub fn filter(&self) -> f32 {
        (self.r() + self.g() + self.b()) / 3.0
    }

    pub fn max_component_value(&self) -> f32 {
        self.r().max(self.g()).max(self.b())
    }

    pub fn clamp(&self, low: f32, high: f32) -> Self {
        Self::from_floats(
            self.r().clamp(low, high),
            self.g().clamp(low, high),
            self.b().clamp(low, high),
        )
    }

    pub fn sqrt(&self) -> Self {
        Self::from_floats(self.r().sqrt(), self.g().sqrt(), self.b().sqrt())
    }

    pub fn as_vector(&self) -> &na::Vector3<f32> {
        &self.0
    }
}

impl Default for RGBSpectrum {
    fn default() -> Self {
        Self::zero()
    }
}

impl AddAssign for RGBSpectrum {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Add for RGBSpectrum {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for RGBSpectrum {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul for RGBSpectrum {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0.component_mul(&rhs.0))
    }
}

impl MulAssign for RGBSpectrum {
    fn mul_assign(&mut self, rhs: Self) {
        self.0.component_mul_assign(&rhs.0);
    }
}

impl MulAssign<f32> for RGBSpectrum {
    fn mul_assign(&mut self, rhs: f32) {
        self.0 *= rhs;
    }
}

impl Mul<RGBSpectrum> for f32 {
    type Output = Spectrum;

    fn mul(self, rhs: Spectrum) -> Self::Output {
        rhs * self
    }
}

impl Mul<f32> for RGBSpectrum {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div for RGBSpectrum {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Self(self.0.component_div(&rhs.0))
    }
}

impl Div<f32> for RGBSpectrum {
    type Output = Self;

    fn div(self, rhs: f32) -> Self::Output {
        Self(self.0 / rhs)
    }
}

impl DivAssign<f32> for RGBSpectrum {
    fn div_assign(&mut self, rhs: f32) {
        self.0 /= rhs;
    }
}

impl num::Zero for RGBSpectrum {
    fn zero() -> Self {
        Self::new(0.0)
    }

    fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl num::One for RGBSpectrum {
    fn one() -> Self {
        Self::new(1.0)
    }
}

impl AbsDiffEq for RGBSpectrum {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        f32::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.0.abs_diff_eq(&other.0, epsilon)
    }
}

impl RelativeEq for RGBSpectrum {
    fn default_max_relative() -> f32 {
        f32::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f32, max_relative: f32) -> bool {
        self.0.relative_eq(&other.0, epsilon, max_relative)
    }
}

pub type Spectrum = RGBSpectrum;

/// CIE XYZ tristimulus value.
#[derive(Clone, Debug, Copy, PartialEq, Default)]
pub struct XYZColor {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl XYZColor {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn black() -> Self {
        Self::default()
    }

    pub fn is_black(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_vector(&self) -> na::Vector3<f32> {
        na::Vector3::new(self.x, self.y, self.z)
    }

    pub fn from_vector(v: &na::Vector3<f32>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl Add for XYZColor {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for XYZColor {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Mul<f32> for XYZColor {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}
