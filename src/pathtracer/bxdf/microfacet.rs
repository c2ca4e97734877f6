use crate::common::math::spherical_direction;
use crate::common::spectrum::Spectrum;
use ambassador::{delegatable_trait, Delegate};

use super::{
    abs_cos_theta, cos_2_theta, fresnel::Fresnel, fresnel::FresnelInterface, reflect,
    same_hemisphere, tan_2_theta, BxDFInterface, BxDFSample, BxDFType,
};

#[delegatable_trait]
pub trait MicrofacetDistributionInterface {
    /// Normalized so that the projected microfacet area integrates to one.
    fn d(&self, wh: &na::Vector3<f32>) -> f32;

    /// Samples a half vector in the +z hemisphere.
    fn sample_wh(&self, u: &na::Point2<f32>) -> na::Vector3<f32>;

    /// Density of `sample_wh` with respect to solid angle.
    fn pdf_wh(&self, wh: &na::Vector3<f32>) -> f32;
}

#[derive(Delegate, Clone, Debug)]
#[delegate(MicrofacetDistributionInterface)]
pub enum MicrofacetDistribution {
    Beckmann(Beckmann),
    Blinn(Blinn),
}

#[derive(Clone, Debug)]
pub struct Beckmann {
    r: f32,
}

impl Beckmann {
    pub fn new(roughness: f32) -> Self {
        Self {
            r: roughness.max(1e-3),
        }
    }
}

impl MicrofacetDistributionInterface for Beckmann {
    fn d(&self, wh: &na::Vector3<f32>) -> f32 {
        let tan_2_theta = tan_2_theta(wh);
        if !tan_2_theta.is_finite() {
            return 0.0;
        }
        let cos_4_theta = cos_2_theta(wh) * cos_2_theta(wh);
        (-tan_2_theta / (self.r * self.r)).exp()
            / (std::f32::consts::PI * self.r * self.r * cos_4_theta)
    }

    fn sample_wh(&self, u: &na::Point2<f32>) -> na::Vector3<f32> {
        let tan_2_theta = -(self.r * self.r) * (1.0 - u[0]).ln();
        let cos_theta = 1.0 / (1.0 + tan_2_theta).sqrt();
        let sin_theta = 0.0f32.max(1.0 - cos_theta * cos_theta).sqrt();
        spherical_direction(sin_theta, cos_theta, u[1] * 2.0 * std::f32::consts::PI)
    }

    fn pdf_wh(&self, wh: &na::Vector3<f32>) -> f32 {
        self.d(wh) * abs_cos_theta(wh)
    }
}

/// Blinn-Phong lobe with exponent `exponent`.
#[derive(Clone, Debug)]
pub struct Blinn {
    exponent: f32,
}

impl Blinn {
    pub fn new(exponent: f32) -> Self {
        Self {
            exponent: exponent.min(10000.0),
        }
    }
}

impl MicrofacetDistributionInterface for Blinn {
    fn d(&self, wh: &na::Vector3<f32>) -> f32 {
        (self.exponent + 2.0)
            * std::f32::consts::FRAC_1_PI
            * 0.5
            * abs_cos_theta(wh).powf(self.exponent)
    }

    fn sample_wh(&self, u: &na::Point2<f32>) -> na::Vector3<f32> {
        let cos_theta = u[0].powf(1.0 / (self.exponent + 1.0));
        let sin_theta = 0.0f32.max(1.0 - cos_theta * cos_theta).sqrt();
        spherical_direction(sin_theta, cos_theta, u[1] * 2.0 * std::f32::consts::PI)
    }

    fn pdf_wh(&self, wh: &na::Vector3<f32>) -> f32 {
        (self.exponent + 1.0)
            * std::f32::consts::FRAC_1_PI
            * 0.5
            * abs_cos_theta(wh).powf(self.exponent)
    }
}

/// Cook-Torrance glossy reflection.
#[derive(Clone, Debug)]
pub struct CookTorrance {
    ks: Spectrum,
    fresnel: Fresnel,
    distribution: MicrofacetDistribution,
}

impl CookTorrance {
    pub fn new(ks: Spectrum, fresnel: Fresnel, distribution: MicrofacetDistribution) -> Self {
        Self {
            ks,
            fresnel,
            distribution,
        }
    }

    fn g(&self, wo: &na::Vector3<f32>, wi: &na::Vector3<f32>, wh: &na::Vector3<f32>) -> f32 {
        let n_dot_wh = abs_cos_theta(wh);
        let n_dot_wo = abs_cos_theta(wo);
        let n_dot_wi = abs_cos_theta(wi);
        let wo_dot_wh = wo.dot(wh).abs();
        1.0f32
            .min(2.0 * n_dot_wh * n_dot_wo / wo_dot_wh)
            .min(2.0 * n_dot_wh * n_dot_wi / wo_dot_wh)
    }

    fn half_vector(wo: &na::Vector3<f32>, wi: &na::Vector3<f32>) -> Option<na::Vector3<f32>> {
        let wh = wo + wi;
        if wh.x == 0.0 && wh.y == 0.0 && wh.z == 0.0 {
            return None;
        }
        Some(wh.normalize())
    }
}

impl BxDFInterface for CookTorrance {
    fn f(&self, wo: &na::Vector3<f32>, wi: &na::Vector3<f32>) -> Spectrum {
        let cos_theta_o = abs_cos_theta(wo);
        let cos_theta_i = abs_cos_theta(wi);
        if cos_theta_i == 0.0 || cos_theta_o == 0.0 || !same_hemisphere(wo, wi) {
            return Spectrum::new(0.0);
        }
        let wh = match Self::half_vector(wo, wi) {
            Some(wh) => wh,
            None => return Spectrum::new(0.0),
        };

        let f = self.fresnel.evaluate(wi.dot(&wh));
        self.ks * f
            * (self.distribution.d(&wh) * self.g(wo, wi, &wh)
                / (4.0 * cos_theta_i * cos_theta_o))
    }

    fn sample_f(
        &self,
        wo: &na::Vector3<f32>,
        u: &na::Point2<f32>,
        reverse: bool,
    ) -> Option<BxDFSample> {
        let mut wh = self.distribution.sample_wh(u);
        if !same_hemisphere(wo, &wh) {
            wh = -wh;
        }
        let wi = reflect(wo, &wh);
        if !same_hemisphere(wo, &wi) {
            return None;
        }

        let pdf = self.pdf(wo, &wi);
        if pdf == 0.0 || !pdf.is_finite() {
            return None;
        }
        let f = if reverse { self.f(&wi, wo) } else { self.f(wo, &wi) };

        Some(BxDFSample {
            wi,
            f,
            pdf,
            pdf_back: self.pdf(&wi, wo),
            sampled_type: self.get_type(),
        })
    }

    fn pdf(&self, wo: &na::Vector3<f32>, wi: &na::Vector3<f32>) -> f32 {
        if !same_hemisphere(wo, wi) {
            return 0.0;
        }
        let wh = match Self::half_vector(wo, wi) {
            Some(wh) => wh,
            None => return 0.0,
        };
        let wo_dot_wh = wo.dot(&wh).abs();
        if wo_dot_wh == 0.0 {
            return 0.0;
        }
        self.distribution.pdf_wh(&wh) / (4.0 * wo_dot_wh)
    }

    fn get_type(&self) -> BxDFType {
        BxDFType::BSDF_REFLECTION | BxDFType::BSDF_GLOSSY
    }
}
