use super::{
    bxdf::{BxDF, BxDFInterface, BxDFType},
    interaction::DifferentialGeometry,
    sampling::{latin_hypercube, Random},
};
use crate::common::{math::coordinate_system, math::ONE_MINUS_EPSILON, spectrum::Spectrum};
use ambassador::{delegatable_trait, Delegate};

pub const MAX_BXDFS: usize = 8;
const RHO_SAMPLES: usize = 16;

/// Shading basis of a surface point, with the geometric normal kept apart
/// for the reflection/transmission side test.
#[derive(Clone, Debug)]
pub struct ShadingFrame {
    pub nn: na::Vector3<f32>,
    pub ng: na::Vector3<f32>,
    sn: na::Vector3<f32>,
    tn: na::Vector3<f32>,
}

impl ShadingFrame {
    pub fn new(dg: &DifferentialGeometry, ng: &na::Vector3<f32>) -> Self {
        let nn = dg.nn;
        let tangent = dg.dpdu - nn * nn.dot(&dg.dpdu);
        let sn = if tangent.norm_squared() > 0.0 {
            tangent.normalize()
        } else {
            let mut sn = glm::zero();
            let mut unused = glm::zero();
            coordinate_system(&nn, &mut sn, &mut unused);
            sn
        };
        Self {
            nn,
            ng: *ng,
            sn,
            tn: nn.cross(&sn),
        }
    }

    pub fn world_to_local(&self, v: &na::Vector3<f32>) -> na::Vector3<f32> {
        na::Vector3::new(v.dot(&self.sn), v.dot(&self.tn), v.dot(&self.nn))
    }

    pub fn local_to_world(&self, v: &na::Vector3<f32>) -> na::Vector3<f32> {
        self.sn * v.x + self.tn * v.y + self.nn * v.z
    }

    /// Restricts `flags` to the lobe kinds that can connect `wo_w` and `wi_w`
    /// given the side of the geometric surface each one lies on.
    fn side_flags(
        &self,
        wo_w: &na::Vector3<f32>,
        wi_w: &na::Vector3<f32>,
        flags: BxDFType,
    ) -> Option<BxDFType> {
        let side_test = wi_w.dot(&self.ng) * wo_w.dot(&self.ng);
        if side_test > 0.0 {
            Some(flags - BxDFType::BSDF_TRANSMISSION)
        } else if side_test < 0.0 {
            Some(flags - BxDFType::BSDF_REFLECTION)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BSDFSample {
    pub wi: na::Vector3<f32>,
    pub f: Spectrum,
    pub pdf: f32,
    pub pdf_back: f32,
    pub sampled_type: BxDFType,
}

/// Surface scattering at one shading point. Directions are in world space.
#[delegatable_trait]
pub trait BSDFInterface {
    fn frame(&self) -> &ShadingFrame;

    fn num_components(&self, flags: BxDFType) -> usize;

    fn f(&self, wo_w: &na::Vector3<f32>, wi_w: &na::Vector3<f32>, flags: BxDFType) -> Spectrum;

    /// `u` drives the chosen lobe, `u_component` picks the lobe.
    fn sample_f(
        &self,
        wo_w: &na::Vector3<f32>,
        u: &na::Point2<f32>,
        u_component: f32,
        flags: BxDFType,
        reverse: bool,
    ) -> Option<BSDFSample>;

    fn pdf(&self, wo_w: &na::Vector3<f32>, wi_w: &na::Vector3<f32>, flags: BxDFType) -> f32;

    fn rho(&self, wo_w: &na::Vector3<f32>, flags: BxDFType, rng: &mut Random) -> Spectrum;

    fn rho_hh(&self, flags: BxDFType, rng: &mut Random) -> Spectrum;
}

#[derive(Delegate, Clone, Debug)]
#[delegate(BSDFInterface)]
pub enum BSDF {
    Single(SingleBSDF),
    Multi(MultiBSDF),
    Mix(MixBSDF),
}

fn rho_samples(n_dimensions: usize, rng: &mut Random) -> Vec<f32> {
    let mut samples = vec![0.0; RHO_SAMPLES * n_dimensions];
    latin_hypercube(&mut samples, RHO_SAMPLES, n_dimensions, rng);
    samples
}

#[derive(Clone, Debug)]
pub struct SingleBSDF {
    frame: ShadingFrame,
    bxdf: BxDF,
}

impl SingleBSDF {
    pub fn new(dg: &DifferentialGeometry, ng: &na::Vector3<f32>, bxdf: BxDF) -> Self {
        Self {
            frame: ShadingFrame::new(dg, ng),
            bxdf,
        }
    }
}

impl BSDFInterface for SingleBSDF {
    fn frame(&self) -> &ShadingFrame {
        &self.frame
    }

    fn num_components(&self, flags: BxDFType) -> usize {
        self.bxdf.matches_flags(flags) as usize
    }

    fn f(&self, wo_w: &na::Vector3<f32>, wi_w: &na::Vector3<f32>, flags: BxDFType) -> Spectrum {
        let flags = self
            .frame
            .side_flags(wo_w, wi_w, flags)
            .unwrap_or_else(BxDFType::empty);
        if !self.bxdf.matches_flags(flags) {
            return Spectrum::new(0.0);
        }
        self.bxdf
            .f(&self.frame.world_to_local(wo_w), &self.frame.world_to_local(wi_w))
    }

    fn sample_f(
        &self,
        wo_w: &na::Vector3<f32>,
        u: &na::Point2<f32>,
        _u_component: f32,
        flags: BxDFType,
        reverse: bool,
    ) -> Option<BSDFSample> {
        if !self.bxdf.matches_flags(flags) {
            return None;
        }
        let s = self
            .bxdf
            .sample_f(&self.frame.world_to_local(wo_w), u, reverse)?;
        let wi = self.frame.local_to_world(&s.wi);

        let side_test = wi.dot(&self.frame.ng) * wo_w.dot(&self.frame.ng);
        let lobe = self.bxdf.get_type();
        if side_test > 0.0 {
            if lobe.contains(BxDFType::BSDF_TRANSMISSION) {
                return None;
            }
        } else if side_test < 0.0 {
            if lobe.contains(BxDFType::BSDF_REFLECTION) {
                return None;
            }
        } else {
            return None;
        }

        Some(BSDFSample {
            wi,
            f: s.f,
            pdf: s.pdf,
            pdf_back: s.pdf_back,
            sampled_type: lobe,
        })
    }

    fn pdf(&self, wo_w: &na::Vector3<f32>, wi_w: &na::Vector3<f32>, flags: BxDFType) -> f32 {
        if !self.bxdf.matches_flags(flags) {
            return 0.0;
        }
        self.bxdf
            .pdf(&self.frame.world_to_local(wo_w), &self.frame.world_to_local(wi_w))
    }

    fn rho(&self, wo_w: &na::Vector3<f32>, flags: BxDFType, rng: &mut Random) -> Spectrum {
        if !self.bxdf.matches_flags(flags) {
            return Spectrum::new(0.0);
        }
        let samples = rho_samples(2, rng);
        self.bxdf.rho(&self.frame.world_to_local(wo_w), &samples)
    }

    fn rho_hh(&self, flags: BxDFType, rng: &mut Random) -> Spectrum {
        if !self.bxdf.matches_flags(flags) {
            return Spectrum::new(0.0);
        }
        let samples = rho_samples(4, rng);
        self.bxdf.rho_hh(&samples)
    }
}

/// Several lobes sharing one shading frame. A lobe is picked in proportion to
/// its weight, then `f` and `pdf` are combined over every matching lobe.
#[derive(Clone, Debug)]
pub struct MultiBSDF {
    frame: ShadingFrame,
    bxdfs: Vec<BxDF>,
}

impl MultiBSDF {
    pub fn new(dg: &DifferentialGeometry, ng: &na::Vector3<f32>) -> Self {
        Self {
            frame: ShadingFrame::new(dg, ng),
            bxdfs: Vec::with_capacity(MAX_BXDFS),
        }
    }

    pub fn add(&mut self, bxdf: BxDF) {
        debug_assert!(self.bxdfs.len() < MAX_BXDFS);
        self.bxdfs.push(bxdf);
    }
}

impl BSDFInterface for MultiBSDF {
    fn frame(&self) -> &ShadingFrame {
        &self.frame
    }

    fn num_components(&self, flags: BxDFType) -> usize {
        self.bxdfs.iter().filter(|b| b.matches_flags(flags)).count()
    }

    fn f(&self, wo_w: &na::Vector3<f32>, wi_w: &na::Vector3<f32>, flags: BxDFType) -> Spectrum {
        let flags = self
            .frame
            .side_flags(wo_w, wi_w, flags)
            .unwrap_or_else(BxDFType::empty);
        let wo = self.frame.world_to_local(wo_w);
        let wi = self.frame.world_to_local(wi_w);
        let mut f = Spectrum::new(0.0);
        for bxdf in self.bxdfs.iter().filter(|b| b.matches_flags(flags)) {
            f += bxdf.f(&wo, &wi);
        }
        f
    }

    fn sample_f(
        &self,
        wo_w: &na::Vector3<f32>,
        u: &na::Point2<f32>,
        u_component: f32,
        flags: BxDFType,
        reverse: bool,
    ) -> Option<BSDFSample> {
        let wo = self.frame.world_to_local(wo_w);

        let mut weights = [0.0f32; MAX_BXDFS];
        let mut matching_comps = 0;
        let mut total_weight = 0.0;
        for (i, bxdf) in self.bxdfs.iter().enumerate() {
            if bxdf.matches_flags(flags) {
                weights[i] = bxdf.weight(&wo);
                total_weight += weights[i];
                matching_comps += 1;
            }
        }
        if matching_comps == 0 || !(total_weight > 0.0) {
            return None;
        }

        let mut u3 = u_component * total_weight;
        let mut which = 0;
        for (i, weight) in weights.iter().enumerate().take(self.bxdfs.len()) {
            if *weight > 0.0 {
                which = i;
                u3 -= weight;
                if u3 < 0.0 {
                    break;
                }
            }
        }

        let bxdf = &self.bxdfs[which];
        let s = bxdf.sample_f(&wo, u, reverse)?;
        let wi = s.wi;
        let wi_w = self.frame.local_to_world(&wi);
        let mut f = s.f;
        let mut pdf = s.pdf * weights[which];
        let mut total_weight_r = bxdf.weight(&wi);
        let mut pdf_back = s.pdf_back * total_weight_r;

        let flags2 = self.frame.side_flags(wo_w, &wi_w, flags)?;

        if !bxdf.get_type().contains(BxDFType::BSDF_SPECULAR) && matching_comps > 1 {
            if !bxdf.matches_flags(flags2) {
                f = Spectrum::new(0.0);
            }
            for (i, other) in self.bxdfs.iter().enumerate() {
                if i == which {
                    continue;
                }
                if other.matches_flags(flags2) {
                    f += if reverse {
                        other.f(&wi, &wo)
                    } else {
                        other.f(&wo, &wi)
                    };
                }
                if other.matches_flags(flags) {
                    pdf += other.pdf(&wo, &wi) * weights[i];
                    let weight_r = other.weight(&wi);
                    pdf_back += other.pdf(&wi, &wo) * weight_r;
                    total_weight_r += weight_r;
                }
            }
        }

        pdf /= total_weight;
        if total_weight_r > 0.0 {
            pdf_back /= total_weight_r;
        } else {
            pdf_back = 0.0;
        }

        Some(BSDFSample {
            wi: wi_w,
            f,
            pdf,
            pdf_back,
            sampled_type: bxdf.get_type(),
        })
    }

    fn pdf(&self, wo_w: &na::Vector3<f32>, wi_w: &na::Vector3<f32>, flags: BxDFType) -> f32 {
        let wo = self.frame.world_to_local(wo_w);
        let wi = self.frame.world_to_local(wi_w);
        let mut pdf = 0.0;
        let mut total_weight = 0.0;
        for bxdf in self.bxdfs.iter().filter(|b| b.matches_flags(flags)) {
            let weight = bxdf.weight(&wo);
            pdf += bxdf.pdf(&wo, &wi) * weight;
            total_weight += weight;
        }
        if total_weight > 0.0 {
            pdf / total_weight
        } else {
            0.0
        }
    }

    fn rho(&self, wo_w: &na::Vector3<f32>, flags: BxDFType, rng: &mut Random) -> Spectrum {
        let wo = self.frame.world_to_local(wo_w);
        let mut r = Spectrum::new(0.0);
        for bxdf in self.bxdfs.iter().filter(|b| b.matches_flags(flags)) {
            r += bxdf.rho(&wo, &rho_samples(2, rng));
        }
        r
    }

    fn rho_hh(&self, flags: BxDFType, rng: &mut Random) -> Spectrum {
        let mut r = Spectrum::new(0.0);
        for bxdf in self.bxdfs.iter().filter(|b| b.matches_flags(flags)) {
            r += bxdf.rho_hh(&rho_samples(4, rng));
        }
        r
    }
}

/// Weighted blend of whole BSDFs, each possibly with its own shading normal.
#[derive(Clone, Debug)]
pub struct MixBSDF {
    frame: ShadingFrame,
    bsdfs: Vec<(BSDF, f32)>,
    total_weight: f32,
}

impl MixBSDF {
    pub fn new(dg: &DifferentialGeometry, ng: &na::Vector3<f32>) -> Self {
        Self {
            frame: ShadingFrame::new(dg, ng),
            bsdfs: Vec::new(),
            total_weight: 1.0,
        }
    }

    pub fn add(&mut self, weight: f32, bsdf: BSDF) {
        if self.bsdfs.is_empty() {
            self.total_weight = weight;
        } else {
            self.total_weight += weight;
        }
        self.bsdfs.push((bsdf, weight));
    }

    pub fn total_weight(&self) -> f32 {
        self.total_weight
    }

    /// Rescales a value computed against a sub BSDF's shading normal so it
    /// reads as if it were computed against the mix's own normal.
    fn compensation(&self, sub: &BSDF, light: &na::Vector3<f32>) -> f32 {
        let cos_mix = light.dot(&self.frame.nn).abs();
        if cos_mix == 0.0 {
            return 0.0;
        }
        light.dot(&sub.frame().nn).abs() / cos_mix
    }
}

impl BSDFInterface for MixBSDF {
    fn frame(&self) -> &ShadingFrame {
        &self.frame
    }

    fn num_components(&self, flags: BxDFType) -> usize {
        self.bsdfs.iter().map(|(b, _)| b.num_components(flags)).sum()
    }

    fn f(&self, wo_w: &na::Vector3<f32>, wi_w: &na::Vector3<f32>, flags: BxDFType) -> Spectrum {
        let mut f = Spectrum::new(0.0);
        for (bsdf, weight) in &self.bsdfs {
            f += bsdf.f(wo_w, wi_w, flags) * (weight * self.compensation(bsdf, wo_w));
        }
        f / self.total_weight
    }

    fn sample_f(
        &self,
        wo_w: &na::Vector3<f32>,
        u: &na::Point2<f32>,
        u_component: f32,
        flags: BxDFType,
        reverse: bool,
    ) -> Option<BSDFSample> {
        if self.bsdfs.is_empty() {
            return None;
        }

        let mut u3 = u_component * self.total_weight;
        let mut which = self.bsdfs.len() - 1;
        for (i, (_, weight)) in self.bsdfs.iter().enumerate() {
            if u3 < *weight {
                which = i;
                break;
            }
            u3 -= weight;
        }
        let (chosen, chosen_weight) = &self.bsdfs[which];
        let u_sub = if *chosen_weight > 0.0 {
            (u3 / chosen_weight).clamp(0.0, ONE_MINUS_EPSILON)
        } else {
            0.0
        };

        let s = chosen.sample_f(wo_w, u, u_sub, flags, reverse)?;
        let wi_w = s.wi;
        let light = if reverse { &wi_w } else { wo_w };

        let mut f = s.f * (chosen_weight * self.compensation(chosen, light));
        let mut pdf = s.pdf * chosen_weight;
        let mut pdf_back = s.pdf_back * chosen_weight;

        for (i, (bsdf, weight)) in self.bsdfs.iter().enumerate() {
            if i == which {
                continue;
            }
            let value = if reverse {
                bsdf.f(&wi_w, wo_w, flags)
            } else {
                bsdf.f(wo_w, &wi_w, flags)
            };
            f += value * (weight * self.compensation(bsdf, light));
            pdf += weight * bsdf.pdf(wo_w, &wi_w, flags);
            pdf_back += weight * bsdf.pdf(&wi_w, wo_w, flags);
        }

        Some(BSDFSample {
            wi: wi_w,
            f: f / self.total_weight,
            pdf: pdf / self.total_weight,
            pdf_back: pdf_back / self.total_weight,
            sampled_type: s.sampled_type,
        })
    }

    fn pdf(&self, wo_w: &na::Vector3<f32>, wi_w: &na::Vector3<f32>, flags: BxDFType) -> f32 {
        let pdf: f32 = self
            .bsdfs
            .iter()
            .map(|(bsdf, weight)| weight * bsdf.pdf(wo_w, wi_w, flags))
            .sum();
        pdf / self.total_weight
    }

    fn rho(&self, wo_w: &na::Vector3<f32>, flags: BxDFType, rng: &mut Random) -> Spectrum {
        let mut r = Spectrum::new(0.0);
        for (bsdf, weight) in &self.bsdfs {
            r += bsdf.rho(wo_w, flags, rng) * *weight;
        }
        r / self.total_weight
    }

    fn rho_hh(&self, flags: BxDFType, rng: &mut Random) -> Spectrum {
        let mut r = Spectrum::new(0.0);
        for (bsdf, weight) in &self.bsdfs {
            r += bsdf.rho_hh(flags, rng) * *weight;
        }
        r / self.total_weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathtracer::bxdf::fresnel::{
        Fresnel, FresnelDielectric, SpecularReflection, SpecularTransmission,
    };
    use crate::pathtracer::bxdf::{
        tests::glossy_lobe, LambertianReflection, LambertianTransmission,
    };
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::SeedableRng;

    fn dg(nn: na::Vector3<f32>) -> DifferentialGeometry {
        DifferentialGeometry::new(
            na::Point3::origin(),
            nn,
            na::Vector3::new(1.0, 0.0, 0.0),
            na::Vector3::new(0.0, 1.0, 0.0),
            na::Point2::new(0.0, 0.0),
        )
    }

    fn up() -> na::Vector3<f32> {
        na::Vector3::new(0.0, 0.0, 1.0)
    }

    fn lambertian() -> BxDF {
        BxDF::Lambertian(LambertianReflection::new(Spectrum::new(0.5)))
    }

    fn directions() -> Vec<(na::Vector3<f32>, na::Vector3<f32>)> {
        vec![
            (
                na::Vector3::new(0.3, 0.2, 0.9).normalize(),
                na::Vector3::new(-0.5, 0.1, 0.7).normalize(),
            ),
            (
                na::Vector3::new(0.0, -0.6, 0.8),
                na::Vector3::new(0.1, 0.1, 0.98).normalize(),
            ),
        ]
    }

    #[test]
    fn test_frame_round_trip() {
        let frame = ShadingFrame::new(&dg(na::Vector3::new(0.0, 1.0, 0.0)), &up());
        let v = na::Vector3::new(0.2, -0.4, 0.8).normalize();
        assert_relative_eq!(frame.local_to_world(&frame.world_to_local(&v)), v, epsilon = 1e-6);
        assert_relative_eq!(frame.world_to_local(&frame.nn).z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_multi_with_one_lobe_matches_single() {
        let single = SingleBSDF::new(&dg(up()), &up(), glossy_lobe());
        let mut multi = MultiBSDF::new(&dg(up()), &up());
        multi.add(glossy_lobe());

        for (wo, wi) in directions() {
            assert_relative_eq!(
                single.f(&wo, &wi, BxDFType::BSDF_ALL),
                multi.f(&wo, &wi, BxDFType::BSDF_ALL)
            );
            assert_relative_eq!(
                single.pdf(&wo, &wi, BxDFType::BSDF_ALL),
                multi.pdf(&wo, &wi, BxDFType::BSDF_ALL)
            );
            let u = na::Point2::new(0.3, 0.6);
            let a = single.sample_f(&wo, &u, 0.4, BxDFType::BSDF_ALL, false).unwrap();
            let b = multi.sample_f(&wo, &u, 0.4, BxDFType::BSDF_ALL, false).unwrap();
            assert_relative_eq!(a.wi, b.wi);
            assert_relative_eq!(a.f, b.f);
            assert_relative_eq!(a.pdf, b.pdf, max_relative = 1e-6);
            assert_relative_eq!(a.pdf_back, b.pdf_back, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_multi_pdf_matches_sampled_pdf() {
        let mut multi = MultiBSDF::new(&dg(up()), &up());
        multi.add(lambertian());
        multi.add(glossy_lobe());
        let wo = na::Vector3::new(0.3, 0.2, 0.9).normalize();
        let mut checked = 0;
        for i in 0..64 {
            let u = na::Point2::new((i % 8) as f32 / 8.0 + 0.03, (i / 8) as f32 / 8.0 + 0.05);
            let u_component = (i as f32 + 0.5) / 64.0;
            if let Some(s) = multi.sample_f(&wo, &u, u_component, BxDFType::BSDF_ALL, false) {
                assert!(s.pdf > 0.0);
                assert_relative_eq!(
                    s.pdf,
                    multi.pdf(&wo, &s.wi, BxDFType::BSDF_ALL),
                    max_relative = 1e-4
                );
                assert_relative_eq!(
                    s.f,
                    multi.f(&wo, &s.wi, BxDFType::BSDF_ALL),
                    max_relative = 1e-4
                );
                checked += 1;
            }
        }
        assert!(checked > 32);
    }

    fn glass_and_diffuse() -> (MultiBSDF, [BxDF; 3]) {
        let lobes = [
            BxDF::SpecularReflection(SpecularReflection::new(
                Spectrum::new(1.0),
                Fresnel::Dielectric(FresnelDielectric::new(1.0, 1.5)),
            )),
            BxDF::SpecularTransmission(SpecularTransmission::new(Spectrum::new(1.0), 1.0, 1.5)),
            lambertian(),
        ];
        let mut multi = MultiBSDF::new(&dg(up()), &up());
        for lobe in lobes.iter() {
            multi.add(lobe.clone());
        }
        (multi, lobes)
    }

    #[test]
    fn test_specular_pick_skips_other_lobes() {
        let (multi, lobes) = glass_and_diffuse();
        let wo_w = na::Vector3::new(0.0, 0.6, 0.8);
        let wo = multi.frame().world_to_local(&wo_w);
        let weights: Vec<f32> = lobes.iter().map(|b| b.weight(&wo)).collect();
        let total: f32 = weights.iter().sum();
        let u = na::Point2::new(0.3, 0.7);

        // middle of each lobe's slice of [0, 1)
        let mut start = 0.0;
        for (lobe, weight) in lobes.iter().zip(&weights) {
            let u_component = (start + 0.5 * weight) / total;
            start += weight;
            let s = multi
                .sample_f(&wo_w, &u, u_component, BxDFType::BSDF_ALL, false)
                .unwrap();
            assert_eq!(s.sampled_type, lobe.get_type());
            if !lobe.get_type().contains(BxDFType::BSDF_SPECULAR) {
                continue;
            }
            let own = lobe.sample_f(&wo, &u, false).unwrap();
            assert_relative_eq!(s.f, own.f, max_relative = 1e-5);
            assert_relative_eq!(s.pdf, own.pdf * weight / total, max_relative = 1e-5);
            assert_relative_eq!(
                s.wi,
                multi.frame().local_to_world(&own.wi),
                epsilon = 1e-5
            );
        }
    }

    #[test]
    fn test_lobe_picks_follow_weights() {
        let (multi, lobes) = glass_and_diffuse();
        let wo_w = na::Vector3::new(0.0, 0.6, 0.8);
        let wo = multi.frame().world_to_local(&wo_w);
        let weights: Vec<f32> = lobes.iter().map(|b| b.weight(&wo)).collect();
        let total: f32 = weights.iter().sum();
        assert!(weights[0] > 0.0 && weights[0] < weights[1]);

        let n = 2000;
        let mut picks = [0usize; 3];
        for i in 0..n {
            let u_component = (i as f32 + 0.5) / n as f32;
            let s = multi
                .sample_f(&wo_w, &na::Point2::new(0.4, 0.6), u_component, BxDFType::BSDF_ALL, false)
                .unwrap();
            let idx = lobes
                .iter()
                .position(|b| b.get_type() == s.sampled_type)
                .unwrap();
            picks[idx] += 1;
        }
        for (count, weight) in picks.iter().zip(&weights) {
            assert_abs_diff_eq!(*count as f32 / n as f32, weight / total, epsilon = 2.0 / n as f32);
        }
    }

    #[test]
    fn test_no_matching_component_fails() {
        let mut multi = MultiBSDF::new(&dg(up()), &up());
        multi.add(lambertian());
        let wo = na::Vector3::new(0.0, 0.0, 1.0);
        let u = na::Point2::new(0.5, 0.5);
        assert!(multi
            .sample_f(&wo, &u, 0.5, BxDFType::BSDF_ALL_TRANSMISSION, false)
            .is_none());
        assert_eq!(multi.pdf(&wo, &wo, BxDFType::BSDF_ALL_TRANSMISSION), 0.0);
        assert_eq!(multi.num_components(BxDFType::BSDF_ALL_TRANSMISSION), 0);
        let empty = MultiBSDF::new(&dg(up()), &up());
        assert!(empty.sample_f(&wo, &u, 0.5, BxDFType::BSDF_ALL, false).is_none());
    }

    #[test]
    fn test_side_test_masks_lobes() {
        let reflect = SingleBSDF::new(&dg(up()), &up(), lambertian());
        let transmit = SingleBSDF::new(
            &dg(up()),
            &up(),
            BxDF::LambertianTransmission(LambertianTransmission::new(Spectrum::new(0.5))),
        );
        let wo = na::Vector3::new(0.0, 0.6, 0.8);
        let same_side = na::Vector3::new(0.6, 0.0, 0.8);
        let other_side = na::Vector3::new(0.6, 0.0, -0.8);

        assert!(transmit.f(&wo, &same_side, BxDFType::BSDF_ALL).is_black());
        assert!(!reflect.f(&wo, &same_side, BxDFType::BSDF_ALL).is_black());
        assert!(reflect.f(&wo, &other_side, BxDFType::BSDF_ALL).is_black());
        assert!(!transmit.f(&wo, &other_side, BxDFType::BSDF_ALL).is_black());

        let grazing = na::Vector3::new(1.0, 0.0, 0.0);
        assert!(reflect.f(&wo, &grazing, BxDFType::BSDF_ALL).is_black());
    }

    #[test]
    fn test_side_test_uses_geometric_normal() {
        // shading normal tilted away from the geometric one
        let tilted = na::Vector3::new(0.6, 0.0, 0.8);
        let bsdf = SingleBSDF::new(&dg(tilted), &up(), lambertian());
        let wo = na::Vector3::new(0.0, 0.0, 1.0);
        // above the shading plane, below the geometric plane
        let wi = na::Vector3::new(0.9, 0.0, -0.1).normalize();
        assert!(bsdf.f(&wo, &wi, BxDFType::BSDF_ALL).is_black());
    }

    #[test]
    fn test_mix_single_component_reproduces_sub() {
        let sub = BSDF::Multi({
            let mut m = MultiBSDF::new(&dg(up()), &up());
            m.add(lambertian());
            m.add(glossy_lobe());
            m
        });
        let mut mix = MixBSDF::new(&dg(up()), &up());
        mix.add(1.0, sub.clone());
        assert_relative_eq!(mix.total_weight(), 1.0);

        for (wo, wi) in directions() {
            assert_relative_eq!(
                mix.f(&wo, &wi, BxDFType::BSDF_ALL),
                sub.f(&wo, &wi, BxDFType::BSDF_ALL),
                max_relative = 1e-6
            );
            assert_relative_eq!(
                mix.pdf(&wo, &wi, BxDFType::BSDF_ALL),
                sub.pdf(&wo, &wi, BxDFType::BSDF_ALL),
                max_relative = 1e-6
            );
            let u = na::Point2::new(0.7, 0.2);
            let a = mix.sample_f(&wo, &u, 0.3, BxDFType::BSDF_ALL, false).unwrap();
            let b = sub.sample_f(&wo, &u, 0.3, BxDFType::BSDF_ALL, false).unwrap();
            assert_relative_eq!(a.wi, b.wi);
            assert_relative_eq!(a.pdf, b.pdf, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_mix_compensates_shading_normal() {
        let tilted = na::Vector3::new(0.6, 0.0, 0.8);
        let sub = BSDF::Single(SingleBSDF::new(&dg(tilted), &up(), lambertian()));
        let mut mix = MixBSDF::new(&dg(up()), &up());
        mix.add(1.0, sub.clone());

        let wo = na::Vector3::new(0.0, 0.0, 1.0);
        let wi = na::Vector3::new(0.3, 0.3, 0.9).normalize();
        let expected = sub.f(&wo, &wi, BxDFType::BSDF_ALL) * (wo.dot(&tilted).abs() / 1.0);
        assert_relative_eq!(mix.f(&wo, &wi, BxDFType::BSDF_ALL), expected, max_relative = 1e-6);
    }

    #[test]
    fn test_mix_selection_and_empty() {
        let empty = MixBSDF::new(&dg(up()), &up());
        assert_relative_eq!(empty.total_weight(), 1.0);
        let wo = na::Vector3::new(0.0, 0.0, 1.0);
        assert!(empty
            .sample_f(&wo, &na::Point2::new(0.5, 0.5), 0.5, BxDFType::BSDF_ALL, false)
            .is_none());
        assert!(empty.f(&wo, &wo, BxDFType::BSDF_ALL).is_black());

        let mut mix = MixBSDF::new(&dg(up()), &up());
        mix.add(0.25, BSDF::Single(SingleBSDF::new(&dg(up()), &up(), lambertian())));
        mix.add(0.75, BSDF::Single(SingleBSDF::new(&dg(up()), &up(), glossy_lobe())));
        assert_relative_eq!(mix.total_weight(), 1.0);
        for u3 in &[0.0, 0.1, 0.5, ONE_MINUS_EPSILON] {
            let s = mix.sample_f(&wo, &na::Point2::new(0.4, 0.4), *u3, BxDFType::BSDF_ALL, false);
            let s = s.unwrap();
            assert!(s.pdf > 0.0);
            assert_relative_eq!(
                s.pdf,
                mix.pdf(&wo, &s.wi, BxDFType::BSDF_ALL),
                max_relative = 1e-4
            );
        }
    }

    #[test]
    fn test_rho_is_bounded() {
        let mut rng = Random::seed_from_u64(7);
        let bsdf = BSDF::Single(SingleBSDF::new(&dg(up()), &up(), lambertian()));
        let r = bsdf.rho(&up(), BxDFType::BSDF_ALL, &mut rng);
        assert_relative_eq!(r.g(), 0.5, epsilon = 1e-4);
        let hh = bsdf.rho_hh(BxDFType::BSDF_ALL, &mut rng);
        assert!(hh.g() >= 0.0 && hh.g() <= 1.0);
        assert_eq!(bsdf.num_components(BxDFType::BSDF_ALL_TRANSMISSION), 0);
    }
}
