pub mod fresnel;
pub mod microfacet;

use super::sampling::{cosine_sample_hemisphere, uniform_hemisphere_pdf, uniform_sample_hemisphere};
use crate::common::spectrum::Spectrum;
use ambassador::{delegatable_trait, Delegate};
use fresnel::{NullTransmission, SpecularReflection, SpecularTransmission};
use microfacet::CookTorrance;

pub fn cos_theta(w: &na::Vector3<f32>) -> f32 {
    w.z
}

pub fn cos_2_theta(w: &na::Vector3<f32>) -> f32 {
    w.z * w.z
}

pub fn abs_cos_theta(w: &na::Vector3<f32>) -> f32 {
    w.z.abs()
}

pub fn sin_2_theta(w: &na::Vector3<f32>) -> f32 {
    0.0f32.max(1.0 - cos_2_theta(w))
}

pub fn sin_theta(w: &na::Vector3<f32>) -> f32 {
    sin_2_theta(w).sqrt()
}

pub fn tan_2_theta(w: &na::Vector3<f32>) -> f32 {
    sin_2_theta(w) / cos_2_theta(w)
}

pub fn same_hemisphere(w: &na::Vector3<f32>, wp: &na::Vector3<f32>) -> bool {
    w.z * wp.z > 0.0
}

pub fn reflect(wo: &na::Vector3<f32>, n: &na::Vector3<f32>) -> na::Vector3<f32> {
    -wo + 2. * wo.dot(n) * n
}

/// Refracted direction through the surface with normal `n`, `None` on total internal reflection.
pub fn refract(wi: &na::Vector3<f32>, n: &na::Vector3<f32>, eta: f32) -> Option<na::Vector3<f32>> {
    let cos_theta_i = n.dot(wi);
    let sin_2_theta_i = 0.0f32.max(1.0 - cos_theta_i * cos_theta_i);
    let sin_2_theta_t = eta * eta * sin_2_theta_i;
    if sin_2_theta_t >= 1.0 {
        return None;
    }
    let cos_theta_t = (1.0 - sin_2_theta_t).sqrt();
    Some(eta * -wi + (eta * cos_theta_i - cos_theta_t) * n)
}

bitflags! {
    pub struct BxDFType: u32 {
        const BSDF_REFLECTION = 1 << 0;
        const BSDF_TRANSMISSION = 1 << 1;
        const BSDF_DIFFUSE = 1 << 2;
        const BSDF_GLOSSY = 1 << 3;
        const BSDF_SPECULAR = 1 << 4;
        const BSDF_ALL_TYPES = Self::BSDF_DIFFUSE.bits | Self::BSDF_GLOSSY.bits | Self::BSDF_SPECULAR.bits;
        const BSDF_ALL_REFLECTION = Self::BSDF_REFLECTION.bits | Self::BSDF_ALL_TYPES.bits;
        const BSDF_ALL_TRANSMISSION = Self::BSDF_TRANSMISSION.bits | Self::BSDF_ALL_TYPES.bits;
        const BSDF_ALL = Self::BSDF_ALL_REFLECTION.bits | Self::BSDF_ALL_TRANSMISSION.bits;
    }
}

/// Outcome of importance sampling a scattering lobe.
#[derive(Clone, Copy, Debug)]
pub struct BxDFSample {
    pub wi: na::Vector3<f32>,
    pub f: Spectrum,
    pub pdf: f32,
    pub pdf_back: f32,
    pub sampled_type: BxDFType,
}

/// A single scattering lobe expressed in the local shading frame, where +z is
/// the shading normal.
///
/// The first argument of `f` is the side light arrives from. `reverse` makes
/// `sample_f` report `f(wi, wo)`, which is what paths traced from the camera need.
#[delegatable_trait]
pub trait BxDFInterface {
    fn f(&self, wo: &na::Vector3<f32>, wi: &na::Vector3<f32>) -> Spectrum;

    fn sample_f(
        &self,
        wo: &na::Vector3<f32>,
        u: &na::Point2<f32>,
        reverse: bool,
    ) -> Option<BxDFSample> {
        let mut wi = cosine_sample_hemisphere(u);
        if wo.z < 0.0 {
            wi.z *= -1.0;
        }
        // wi may lie in the tangent plane
        if !same_hemisphere(wo, &wi) {
            return None;
        }

        let f = if reverse { self.f(&wi, wo) } else { self.f(wo, &wi) };
        Some(BxDFSample {
            wi,
            f,
            pdf: self.pdf(wo, &wi),
            pdf_back: self.pdf(&wi, wo),
            sampled_type: self.get_type(),
        })
    }

    fn pdf(&self, wo: &na::Vector3<f32>, wi: &na::Vector3<f32>) -> f32 {
        if same_hemisphere(wo, wi) {
            abs_cos_theta(wi) * std::f32::consts::FRAC_1_PI
        } else {
            0.0
        }
    }

    /// Relative probability of picking this lobe inside a multi lobe BSDF.
    fn weight(&self, _wo: &na::Vector3<f32>) -> f32 {
        1.0
    }

    /// Hemispherical-directional reflectance from `samples`, two values per estimate.
    fn rho(&self, wo: &na::Vector3<f32>, samples: &[f32]) -> Spectrum {
        let n_samples = samples.len() / 2;
        if n_samples == 0 {
            return Spectrum::new(0.0);
        }
        let mut r = Spectrum::new(0.0);
        for u in samples.chunks_exact(2) {
            if let Some(s) = self.sample_f(wo, &na::Point2::new(u[0], u[1]), false) {
                if s.pdf > 0.0 {
                    r += s.f * (abs_cos_theta(&s.wi) / s.pdf);
                }
            }
        }
        r / n_samples as f32
    }

    /// Hemispherical-hemispherical reflectance from `samples`, four values per estimate.
    fn rho_hh(&self, samples: &[f32]) -> Spectrum {
        let n_samples = samples.len() / 4;
        if n_samples == 0 {
            return Spectrum::new(0.0);
        }
        let mut r = Spectrum::new(0.0);
        for u in samples.chunks_exact(4) {
            let wo = uniform_sample_hemisphere(&na::Point2::new(u[0], u[1]));
            let pdf_o = uniform_hemisphere_pdf();
            if let Some(s) = self.sample_f(&wo, &na::Point2::new(u[2], u[3]), false) {
                if s.pdf > 0.0 {
                    r += s.f * (abs_cos_theta(&s.wi) * abs_cos_theta(&wo) / (pdf_o * s.pdf));
                }
            }
        }
        r / (std::f32::consts::PI * n_samples as f32)
    }

    fn matches_flags(&self, t: BxDFType) -> bool {
        (self.get_type() & t) == self.get_type()
    }

    fn get_type(&self) -> BxDFType;
}

#[derive(Delegate, Clone, Debug)]
#[delegate(BxDFInterface)]
pub enum BxDF {
    Lambertian(LambertianReflection),
    LambertianTransmission(LambertianTransmission),
    SpecularReflection(SpecularReflection),
    SpecularTransmission(SpecularTransmission),
    CookTorrance(CookTorrance),
    NullTransmission(NullTransmission),
}

#[derive(Clone, Debug)]
pub struct LambertianReflection {
    r: Spectrum,
}

impl LambertianReflection {
    pub fn new(r: Spectrum) -> Self {
        Self { r }
    }
}

impl BxDFInterface for LambertianReflection {
    fn f(&self, wo: &na::Vector3<f32>, wi: &na::Vector3<f32>) -> Spectrum {
        if !same_hemisphere(wo, wi) {
            return Spectrum::new(0.0);
        }
        self.r * std::f32::consts::FRAC_1_PI
    }

    fn get_type(&self) -> BxDFType {
        BxDFType::BSDF_REFLECTION | BxDFType::BSDF_DIFFUSE
    }

    fn rho(&self, _wo: &na::Vector3<f32>, _samples: &[f32]) -> Spectrum {
        self.r
    }

    fn rho_hh(&self, _samples: &[f32]) -> Spectrum {
        self.r
    }
}

/// Diffuse transmission into the opposite hemisphere.
#[derive(Clone, Debug)]
pub struct LambertianTransmission {
    t: Spectrum,
}

impl LambertianTransmission {
    pub fn new(t: Spectrum) -> Self {
        Self { t }
    }
}

impl BxDFInterface for LambertianTransmission {
    fn f(&self, wo: &na::Vector3<f32>, wi: &na::Vector3<f32>) -> Spectrum {
        if same_hemisphere(wo, wi) {
            return Spectrum::new(0.0);
        }
        self.t * std::f32::consts::FRAC_1_PI
    }

    fn sample_f(
        &self,
        wo: &na::Vector3<f32>,
        u: &na::Point2<f32>,
        reverse: bool,
    ) -> Option<BxDFSample> {
        let mut wi = cosine_sample_hemisphere(u);
        if wo.z > 0.0 {
            wi.z *= -1.0;
        }
        if wi.z == 0.0 || wo.z == 0.0 {
            return None;
        }

        let f = if reverse { self.f(&wi, wo) } else { self.f(wo, &wi) };
        Some(BxDFSample {
            wi,
            f,
            pdf: self.pdf(wo, &wi),
            pdf_back: self.pdf(&wi, wo),
            sampled_type: self.get_type(),
        })
    }

    fn pdf(&self, wo: &na::Vector3<f32>, wi: &na::Vector3<f32>) -> f32 {
        if same_hemisphere(wo, wi) {
            0.0
        } else {
            abs_cos_theta(wi) * std::f32::consts::FRAC_1_PI
        }
    }

    fn get_type(&self) -> BxDFType {
        BxDFType::BSDF_TRANSMISSION | BxDFType::BSDF_DIFFUSE
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::fresnel::{Fresnel, FresnelConductor, FresnelDielectric};
    use super::microfacet::{Beckmann, Blinn, MicrofacetDistribution};
    use super::*;
    use crate::pathtracer::sampling::{latin_hypercube, Random};
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    pub(crate) fn glossy_lobe() -> BxDF {
        BxDF::CookTorrance(CookTorrance::new(
            Spectrum::new(0.8),
            Fresnel::Conductor(FresnelConductor::new(
                Spectrum::new(1.0),
                Spectrum::new(0.2),
                Spectrum::new(3.9),
            )),
            MicrofacetDistribution::Beckmann(Beckmann::new(0.3)),
        ))
    }

    fn non_specular_lobes() -> Vec<BxDF> {
        vec![
            BxDF::Lambertian(LambertianReflection::new(Spectrum::new(0.5))),
            BxDF::LambertianTransmission(LambertianTransmission::new(Spectrum::new(0.5))),
            glossy_lobe(),
            BxDF::CookTorrance(CookTorrance::new(
                Spectrum::new(1.0),
                Fresnel::Dielectric(FresnelDielectric::new(1.0, 1.5)),
                MicrofacetDistribution::Blinn(Blinn::new(40.0)),
            )),
        ]
    }

    #[test]
    fn test_sampled_pdf_matches_pdf() {
        let mut rng = Random::seed_from_u64(17);
        let mut samples = vec![0.0; 2 * 64];
        latin_hypercube(&mut samples, 64, 2, &mut rng);
        let wo = na::Vector3::new(0.3, -0.2, 0.9).normalize();

        for lobe in non_specular_lobes() {
            for u in samples.chunks_exact(2) {
                if let Some(s) = lobe.sample_f(&wo, &na::Point2::new(u[0], u[1]), false) {
                    if s.pdf == 0.0 {
                        continue;
                    }
                    let pdf = lobe.pdf(&wo, &s.wi);
                    assert!(pdf > 0.0);
                    assert_relative_eq!(pdf, s.pdf, max_relative = 1e-3);
                    assert_relative_eq!(lobe.pdf(&s.wi, &wo), s.pdf_back, max_relative = 1e-3);
                }
            }
        }
    }

    #[test]
    fn test_reflection_lobe_is_zero_across_hemispheres() {
        let lobe = BxDF::Lambertian(LambertianReflection::new(Spectrum::new(0.5)));
        let wo = na::Vector3::new(0.0, 0.0, 1.0);
        let wi = na::Vector3::new(0.0, 0.6, -0.8);
        assert!(lobe.f(&wo, &wi).is_black());
        assert_eq!(lobe.pdf(&wo, &wi), 0.0);
    }

    #[test]
    fn test_rho_is_bounded_and_converges() {
        let lobe = glossy_lobe();
        let wo = na::Vector3::new(0.0, 0.4, 0.9).normalize();
        let estimate = |n: usize, seed: u64| {
            let mut rng = Random::seed_from_u64(seed);
            let mut samples = vec![0.0; 2 * n];
            latin_hypercube(&mut samples, n, 2, &mut rng);
            lobe.rho(&wo, &samples).y()
        };

        let spread = |n: usize| {
            let values: Vec<f32> = (0..8).map(|seed| estimate(n, seed)).collect();
            for v in &values {
                assert!(*v >= 0.0 && *v <= 1.05);
            }
            let mean = values.iter().sum::<f32>() / values.len() as f32;
            values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / values.len() as f32
        };

        assert!(spread(1024) <= spread(16) + 1e-6);
    }

    #[test]
    fn test_lambertian_rho_hh_closed_form() {
        let lobe = BxDF::Lambertian(LambertianReflection::new(Spectrum::new(0.25)));
        assert_relative_eq!(lobe.rho_hh(&[0.1, 0.2, 0.3, 0.4]).g(), 0.25);
    }

    #[test]
    fn test_matches_flags() {
        let lobe = BxDF::Lambertian(LambertianReflection::new(Spectrum::new(0.5)));
        assert!(lobe.matches_flags(BxDFType::BSDF_ALL));
        assert!(lobe.matches_flags(BxDFType::BSDF_ALL_REFLECTION));
        assert!(!lobe.matches_flags(BxDFType::BSDF_ALL_TRANSMISSION));
        assert!(!lobe.matches_flags(BxDFType::BSDF_REFLECTION | BxDFType::BSDF_SPECULAR));
    }
}
