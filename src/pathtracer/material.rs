use super::{
    bsdf::{MixBSDF, MultiBSDF, SingleBSDF, BSDF},
    bxdf::{
        fresnel::{
            Fresnel, FresnelCauchy, FresnelDielectric, FresnelInterface, FresnelNoOp,
            NullTransmission, SpecularReflection, SpecularTransmission,
        },
        microfacet::{Beckmann, CookTorrance, MicrofacetDistribution},
        BxDF, LambertianReflection,
    },
    interaction::DifferentialGeometry,
    wavelengths::SpectrumWavelengths,
};
use crate::common::spectrum::Spectrum;
use ambassador::{delegatable_trait, Delegate};
use std::sync::Arc;

#[delegatable_trait]
pub trait MaterialInterface {
    /// Builds the scattering model at a hit point. Dispersive materials may
    /// collapse `swl` to a single wavelength.
    fn get_bsdf(
        &self,
        swl: &mut SpectrumWavelengths,
        dg: &DifferentialGeometry,
        ng: &na::Vector3<f32>,
    ) -> BSDF;
}

#[derive(Delegate)]
#[delegate(MaterialInterface)]
pub enum Material {
    Matte(MatteMaterial),
    Mirror(MirrorMaterial),
    Glass(GlassMaterial),
    Glossy(GlossyMaterial),
    Null(NullMaterial),
    Mix(MixMaterial),
}

impl Material {
    /// Null surfaces let every ray through, shadow rays included.
    pub fn is_null(&self) -> bool {
        matches!(self, Material::Null(_))
    }
}

pub struct MatteMaterial {
    kd: Spectrum,
}

impl MatteMaterial {
    pub fn new(kd: Spectrum) -> Self {
        Self { kd }
    }
}

impl MaterialInterface for MatteMaterial {
    fn get_bsdf(
        &self,
        _swl: &mut SpectrumWavelengths,
        dg: &DifferentialGeometry,
        ng: &na::Vector3<f32>,
    ) -> BSDF {
        BSDF::Single(SingleBSDF::new(
            dg,
            ng,
            BxDF::Lambertian(LambertianReflection::new(self.kd.clamp(0.0, 1.0))),
        ))
    }
}

pub struct MirrorMaterial {
    kr: Spectrum,
}

impl MirrorMaterial {
    pub fn new(kr: Spectrum) -> Self {
        Self { kr }
    }
}

impl MaterialInterface for MirrorMaterial {
    fn get_bsdf(
        &self,
        _swl: &mut SpectrumWavelengths,
        dg: &DifferentialGeometry,
        ng: &na::Vector3<f32>,
    ) -> BSDF {
        BSDF::Single(SingleBSDF::new(
            dg,
            ng,
            BxDF::SpecularReflection(SpecularReflection::new(
                self.kr.clamp(0.0, 1.0),
                Fresnel::NoOp(FresnelNoOp {}),
            )),
        ))
    }
}

/// Smooth dielectric. A non zero `cauchy_b` makes the index depend on
/// wavelength, which collapses the path to a single wavelength.
pub struct GlassMaterial {
    kr: Spectrum,
    kt: Spectrum,
    index: f32,
    cauchy_b: f32,
}

impl GlassMaterial {
    pub fn new(kr: Spectrum, kt: Spectrum, index: f32, cauchy_b: f32) -> Self {
        Self {
            kr,
            kt,
            index,
            cauchy_b,
        }
    }
}

impl MaterialInterface for GlassMaterial {
    fn get_bsdf(
        &self,
        swl: &mut SpectrumWavelengths,
        dg: &DifferentialGeometry,
        ng: &na::Vector3<f32>,
    ) -> BSDF {
        let (eta, fresnel) = if self.cauchy_b != 0.0 {
            let cauchy = FresnelCauchy::new(self.index, self.cauchy_b, swl.sample_single());
            (cauchy.index(), Fresnel::Cauchy(cauchy))
        } else {
            (
                self.index,
                Fresnel::Dielectric(FresnelDielectric::new(1.0, self.index)),
            )
        };

        let mut bsdf = MultiBSDF::new(dg, ng);
        let r = self.kr.clamp(0.0, 1.0);
        if !r.is_black() {
            bsdf.add(BxDF::SpecularReflection(SpecularReflection::new(r, fresnel)));
        }
        let t = self.kt.clamp(0.0, 1.0);
        if !t.is_black() {
            bsdf.add(BxDF::SpecularTransmission(SpecularTransmission::new(
                t, 1.0, eta,
            )));
        }
        BSDF::Multi(bsdf)
    }
}

/// Diffuse base under a Beckmann glossy coat.
pub struct GlossyMaterial {
    kd: Spectrum,
    ks: Spectrum,
    roughness: f32,
    index: f32,
}

impl GlossyMaterial {
    pub fn new(kd: Spectrum, ks: Spectrum, roughness: f32, index: f32) -> Self {
        Self {
            kd,
            ks,
            roughness,
            index,
        }
    }
}

impl MaterialInterface for GlossyMaterial {
    fn get_bsdf(
        &self,
        _swl: &mut SpectrumWavelengths,
        dg: &DifferentialGeometry,
        ng: &na::Vector3<f32>,
    ) -> BSDF {
        let mut bsdf = MultiBSDF::new(dg, ng);
        bsdf.add(BxDF::Lambertian(LambertianReflection::new(
            self.kd.clamp(0.0, 1.0),
        )));
        bsdf.add(BxDF::CookTorrance(CookTorrance::new(
            self.ks.clamp(0.0, 1.0),
            Fresnel::Dielectric(FresnelDielectric::new(1.0, self.index)),
            MicrofacetDistribution::Beckmann(Beckmann::new(self.roughness)),
        )));
        BSDF::Multi(bsdf)
    }
}

/// Invisible surface, only useful to delimit a region.
pub struct NullMaterial {}

impl MaterialInterface for NullMaterial {
    fn get_bsdf(
        &self,
        _swl: &mut SpectrumWavelengths,
        dg: &DifferentialGeometry,
        ng: &na::Vector3<f32>,
    ) -> BSDF {
        BSDF::Single(SingleBSDF::new(
            dg,
            ng,
            BxDF::NullTransmission(NullTransmission::default()),
        ))
    }
}

pub struct MixMaterial {
    a: Arc<Material>,
    b: Arc<Material>,
    amount: f32,
}

impl MixMaterial {
    /// `amount` is the weight of `b`, `a` gets the rest.
    pub fn new(a: Arc<Material>, b: Arc<Material>, amount: f32) -> Self {
        Self {
            a,
            b,
            amount: amount.clamp(0.0, 1.0),
        }
    }
}

impl MaterialInterface for MixMaterial {
    fn get_bsdf(
        &self,
        swl: &mut SpectrumWavelengths,
        dg: &DifferentialGeometry,
        ng: &na::Vector3<f32>,
    ) -> BSDF {
        let mut bsdf = MixBSDF::new(dg, ng);
        bsdf.add(1.0 - self.amount, self.a.get_bsdf(swl, dg, ng));
        bsdf.add(self.amount, self.b.get_bsdf(swl, dg, ng));
        BSDF::Mix(bsdf)
    }
}
