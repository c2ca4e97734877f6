use super::spectrum::{Spectrum, XYZColor};

lazy_static::lazy_static! {
    static ref SRGB: ColorSystem =
        ColorSystem::new(0.64, 0.33, 0.30, 0.60, 0.15, 0.06, 0.3127, 0.3290, 1.0);
}

/// How out of gamut colours above the white luminance are brought back.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ClampMethod {
    Lum,
    Hue,
    Cut,
}

/// RGB primaries and white point with the derived conversion matrices.
#[derive(Clone, Debug)]
pub struct ColorSystem {
    luminance: f32,
    xyz_to_rgb: na::Matrix3<f32>,
    rgb_to_xyz: na::Matrix3<f32>,
}

fn chromaticity_to_xyz(x: f32, y: f32) -> na::Vector3<f32> {
    na::Vector3::new(x / y, 1.0, (1.0 - x - y) / y)
}

impl ColorSystem {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        x_r: f32,
        y_r: f32,
        x_g: f32,
        y_g: f32,
        x_b: f32,
        y_b: f32,
        x_w: f32,
        y_w: f32,
        luminance: f32,
    ) -> Self {
        let primaries = na::Matrix3::from_columns(&[
            chromaticity_to_xyz(x_r, y_r),
            chromaticity_to_xyz(x_g, y_g),
            chromaticity_to_xyz(x_b, y_b),
        ]);
        let white = chromaticity_to_xyz(x_w, y_w);
        let scale = primaries
            .try_inverse()
            .map(|inv| inv * white)
            .unwrap_or_else(|| na::Vector3::new(1.0, 1.0, 1.0));

        let rgb_to_xyz = primaries * na::Matrix3::from_diagonal(&scale) * luminance;
        let xyz_to_rgb = rgb_to_xyz.try_inverse().unwrap_or_else(na::Matrix3::identity);

        Self {
            luminance,
            xyz_to_rgb,
            rgb_to_xyz,
        }
    }

    /// ITU-R BT.709 primaries with a D65 white point.
    pub fn srgb() -> Self {
        SRGB.clone()
    }

    pub fn luminance(&self) -> f32 {
        self.luminance
    }

    pub fn xyz_to_rgb(&self, xyz: &XYZColor) -> Spectrum {
        let rgb = self.xyz_to_rgb * xyz.to_vector();
        Spectrum::from_floats(rgb.x, rgb.y, rgb.z)
    }

    pub fn rgb_to_xyz(&self, rgb: &Spectrum) -> XYZColor {
        XYZColor::from_vector(&(self.rgb_to_xyz * rgb.as_vector()))
    }

    pub fn to_rgb_constrained(&self, xyz: &XYZColor) -> Spectrum {
        let mut rgb = self.xyz_to_rgb(xyz);
        self.constrain(xyz.y, &mut rgb);
        rgb
    }

    /// Desaturates a colour with a negative primary towards the white point
    /// until it lies on the gamut edge. Returns whether `rgb` changed.
    pub fn constrain(&self, lum: f32, rgb: &mut Spectrum) -> bool {
        if rgb.r() >= 0.0 && rgb.g() >= 0.0 && rgb.b() >= 0.0 {
            return false;
        }
        if lum < 0.0 {
            *rgb = Spectrum::new(0.0);
            return true;
        }

        let l = lum / self.luminance;
        let lowest = rgb.r().min(rgb.g()).min(rgb.b());
        let parameter = l / (l - lowest);
        *rgb = (Spectrum::new(l) * (1.0 - parameter) + *rgb * parameter).clamp(0.0, f32::INFINITY);
        true
    }

    /// Brings a colour with a primary above one back into the displayable range.
    pub fn limit(&self, rgb: &Spectrum, method: ClampMethod) -> Spectrum {
        if rgb.r() <= 1.0 && rgb.g() <= 1.0 && rgb.b() <= 1.0 {
            return *rgb;
        }

        let lum = match method {
            ClampMethod::Cut => return rgb.clamp(0.0, 1.0),
            ClampMethod::Lum => self.rgb_to_xyz(rgb).y,
            ClampMethod::Hue => self.luminance / 3.0,
        };
        if lum > self.luminance {
            return Spectrum::new(1.0);
        }

        let l = lum / self.luminance;
        let highest = rgb.max_component_value();
        let parameter = (1.0 - l) / (highest - l);
        Spectrum::new(l) * (1.0 - parameter) + *rgb * parameter
    }
}
