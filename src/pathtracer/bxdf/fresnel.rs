use crate::common::{math::face_forward, spectrum::Spectrum};
use ambassador::{delegatable_trait, Delegate};

use super::{abs_cos_theta, cos_theta, refract, BxDFInterface, BxDFSample, BxDFType};

#[delegatable_trait]
pub trait FresnelInterface {
    fn evaluate(&self, cos_i: f32) -> Spectrum;

    /// Relative index of refraction, 1 for non dielectric interfaces.
    fn index(&self) -> f32 {
        1.0
    }
}

#[derive(Delegate, Clone, Debug)]
#[delegate(FresnelInterface)]
pub enum Fresnel {
    Dielectric(FresnelDielectric),
    Conductor(FresnelConductor),
    Cauchy(FresnelCauchy),
    NoOp(FresnelNoOp),
}

pub fn fr_dielectric(cos_theta_i: f32, mut eta_i: f32, mut eta_t: f32) -> f32 {
    let mut cos_theta_i = cos_theta_i.clamp(-1.0, 1.0);
    let entering = cos_theta_i > 0.0;
    if !entering {
        std::mem::swap(&mut eta_i, &mut eta_t);
        cos_theta_i = cos_theta_i.abs();
    }

    let sin_theta_i = 0.0f32.max(1.0 - cos_theta_i * cos_theta_i).sqrt();
    let sin_theta_t = eta_i / eta_t * sin_theta_i;
    if sin_theta_t >= 1.0 {
        return 1.0;
    }
    let cos_theta_t = 0.0f32.max(1.0 - sin_theta_t * sin_theta_t).sqrt();
    let r_parl = ((eta_t * cos_theta_i) - (eta_i * cos_theta_t))
        / ((eta_t * cos_theta_i) + (eta_i * cos_theta_t));
    let r_perp = ((eta_i * cos_theta_i) - (eta_t * cos_theta_t))
        / ((eta_i * cos_theta_i) + (eta_t * cos_theta_t));
    (r_parl * r_parl + r_perp * r_perp) / 2.0
}

pub fn fr_conductor(cos_theta_i: f32, eta_i: Spectrum, eta_t: Spectrum, k: Spectrum) -> Spectrum {
    let cos_theta_i = cos_theta_i.clamp(-1., 1.);
    let eta = eta_t / eta_i;
    let etak = k / eta_i;

    let cos_theta_i2 = cos_theta_i * cos_theta_i;
    let sin_theta_i2 = 1. - cos_theta_i2;
    let eta2 = eta * eta;
    let etak2 = etak * etak;

    let t0 = eta2 - etak2 - Spectrum::new(sin_theta_i2);
    let a2_plus_b2 = (t0 * t0 + eta2 * etak2 * 4.).sqrt();
    let t1 = a2_plus_b2 + Spectrum::new(cos_theta_i2);
    let a = ((a2_plus_b2 + t0) * 0.5).sqrt();
    let t2 = a * (2. * cos_theta_i);
    let rs = (t1 - t2) / (t1 + t2);

    let t3 = a2_plus_b2 * cos_theta_i2 + Spectrum::new(sin_theta_i2 * sin_theta_i2);
    let t4 = t2 * sin_theta_i2;
    let rp = rs * (t3 - t4) / (t3 + t4);

    (rp + rs) * 0.5
}

#[derive(Clone, Debug)]
pub struct FresnelDielectric {
    eta_i: f32,
    eta_t: f32,
}

impl FresnelDielectric {
    pub fn new(eta_i: f32, eta_t: f32) -> Self {
        Self { eta_i, eta_t }
    }
}

impl FresnelInterface for FresnelDielectric {
    fn evaluate(&self, cos_i: f32) -> Spectrum {
        Spectrum::new(fr_dielectric(cos_i, self.eta_i, self.eta_t))
    }

    fn index(&self) -> f32 {
        self.eta_t / self.eta_i
    }
}

#[derive(Clone, Debug)]
pub struct FresnelConductor {
    eta_i: Spectrum,
    eta_t: Spectrum,
    k: Spectrum,
}

impl FresnelConductor {
    pub fn new(eta_i: Spectrum, eta_t: Spectrum, k: Spectrum) -> Self {
        Self { eta_i, eta_t, k }
    }
}

impl FresnelInterface for FresnelConductor {
    fn evaluate(&self, cos_i: f32) -> Spectrum {
        fr_conductor(cos_i.abs(), self.eta_i, self.eta_t, self.k)
    }
}

/// Dielectric whose index follows Cauchy's equation `a + b / lambda^2`
/// at the wavelength the path collapsed to, in micrometres.
#[derive(Clone, Debug)]
pub struct FresnelCauchy {
    dielectric: FresnelDielectric,
}

impl FresnelCauchy {
    pub fn new(a: f32, b: f32, wavelength_nm: f32) -> Self {
        let lambda = wavelength_nm * 1e-3;
        let eta = a + b / (lambda * lambda);
        Self {
            dielectric: FresnelDielectric::new(1.0, eta),
        }
    }
}

impl FresnelInterface for FresnelCauchy {
    fn evaluate(&self, cos_i: f32) -> Spectrum {
        self.dielectric.evaluate(cos_i)
    }

    fn index(&self) -> f32 {
        self.dielectric.index()
    }
}

#[derive(Clone, Debug)]
pub struct FresnelNoOp {}

impl FresnelInterface for FresnelNoOp {
    fn evaluate(&self, _cos_i: f32) -> Spectrum {
        Spectrum::new(1.0)
    }
}

/// Perfect mirror lobe. Selection weight follows the Fresnel reflectance so
/// that a glass surface picks reflection more often at grazing angles.
#[derive(Clone, Debug)]
pub struct SpecularReflection {
    r: Spectrum,
    fresnel: Fresnel,
}

impl SpecularReflection {
    pub fn new(r: Spectrum, fresnel: Fresnel) -> Self {
        Self { r, fresnel }
    }
}

impl BxDFInterface for SpecularReflection {
    fn f(&self, _wo: &na::Vector3<f32>, _wi: &na::Vector3<f32>) -> Spectrum {
        Spectrum::new(0.0)
    }

    fn sample_f(
        &self,
        wo: &na::Vector3<f32>,
        _u: &na::Point2<f32>,
        _reverse: bool,
    ) -> Option<BxDFSample> {
        let wi = na::Vector3::new(-wo.x, -wo.y, wo.z);
        let cos_i = abs_cos_theta(&wi);
        if cos_i == 0.0 {
            return None;
        }
        Some(BxDFSample {
            wi,
            f: self.fresnel.evaluate(cos_theta(wo)) * self.r / cos_i,
            pdf: 1.0,
            pdf_back: 1.0,
            sampled_type: self.get_type(),
        })
    }

    fn pdf(&self, _wo: &na::Vector3<f32>, _wi: &na::Vector3<f32>) -> f32 {
        0.0
    }

    fn weight(&self, wo: &na::Vector3<f32>) -> f32 {
        self.fresnel.evaluate(cos_theta(wo)).filter()
    }

    fn get_type(&self) -> BxDFType {
        BxDFType::BSDF_REFLECTION | BxDFType::BSDF_SPECULAR
    }
}

/// Perfect refraction between indices `eta_a` (outside) and `eta_b` (inside).
#[derive(Clone, Debug)]
pub struct SpecularTransmission {
    t: Spectrum,
    eta_a: f32,
    eta_b: f32,
    fresnel: FresnelDielectric,
}

impl SpecularTransmission {
    pub fn new(t: Spectrum, eta_a: f32, eta_b: f32) -> Self {
        Self {
            t,
            eta_a,
            eta_b,
            fresnel: FresnelDielectric::new(eta_a, eta_b),
        }
    }
}

impl BxDFInterface for SpecularTransmission {
    fn f(&self, _wo: &na::Vector3<f32>, _wi: &na::Vector3<f32>) -> Spectrum {
        Spectrum::new(0.0)
    }

    fn sample_f(
        &self,
        wo: &na::Vector3<f32>,
        _u: &na::Point2<f32>,
        reverse: bool,
    ) -> Option<BxDFSample> {
        let entering = cos_theta(wo) > 0.0;
        let (eta_i, eta_t) = if entering {
            (self.eta_a, self.eta_b)
        } else {
            (self.eta_b, self.eta_a)
        };

        let wi = refract(
            wo,
            &face_forward(&na::Vector3::new(0.0, 0.0, 1.0), wo),
            eta_i / eta_t,
        )?;
        let cos_i = abs_cos_theta(&wi);
        if cos_i == 0.0 {
            return None;
        }

        let mut ft = self.t * (Spectrum::new(1.0) - self.fresnel.evaluate(cos_theta(wo)));
        if !reverse {
            ft *= (eta_i * eta_i) / (eta_t * eta_t);
        }

        Some(BxDFSample {
            wi,
            f: ft / cos_i,
            pdf: 1.0,
            pdf_back: 1.0,
            sampled_type: self.get_type(),
        })
    }

    fn pdf(&self, _wo: &na::Vector3<f32>, _wi: &na::Vector3<f32>) -> f32 {
        0.0
    }

    fn weight(&self, wo: &na::Vector3<f32>) -> f32 {
        1.0 - self.fresnel.evaluate(cos_theta(wo)).filter()
    }

    fn get_type(&self) -> BxDFType {
        BxDFType::BSDF_TRANSMISSION | BxDFType::BSDF_SPECULAR
    }
}

/// Lets light pass straight through, for surfaces that only delimit a volume.
#[derive(Clone, Debug, Default)]
pub struct NullTransmission {}

impl BxDFInterface for NullTransmission {
    fn f(&self, _wo: &na::Vector3<f32>, _wi: &na::Vector3<f32>) -> Spectrum {
        Spectrum::new(0.0)
    }

    fn sample_f(
        &self,
        wo: &na::Vector3<f32>,
        _u: &na::Point2<f32>,
        _reverse: bool,
    ) -> Option<BxDFSample> {
        let wi = -wo;
        let cos_i = abs_cos_theta(&wi);
        if cos_i == 0.0 {
            return None;
        }
        Some(BxDFSample {
            wi,
            f: Spectrum::new(1.0 / cos_i),
            pdf: 1.0,
            pdf_back: 1.0,
            sampled_type: self.get_type(),
        })
    }

    fn pdf(&self, wo: &na::Vector3<f32>, wi: &na::Vector3<f32>) -> f32 {
        if wo.dot(wi) < 1e-4 - 1.0 {
            1.0
        } else {
            0.0
        }
    }

    fn get_type(&self) -> BxDFType {
        BxDFType::BSDF_TRANSMISSION | BxDFType::BSDF_SPECULAR
    }
}
