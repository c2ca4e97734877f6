use super::bsdf::{BSDFInterface, BSDF};
use super::bxdf::BxDFType;
use super::interaction::Intersection;
use super::light::{Light, LightInterface};
use super::primitive::PrimitiveInterface;
use super::sample::Sample;
use super::sampler::{Sampler, SamplerInterface};
use super::scene::Scene;
use super::wavelengths::SpectrumWavelengths;
use crate::common::math::power_heuristic;
use crate::common::ray::RayDifferential;
use crate::common::spectrum::Spectrum;
use crate::common::Camera;
use ambassador::{delegatable_trait, Delegate};
use num::Zero;

/// Consecutive null surfaces a path may cross before it is dropped.
pub const PASS_THROUGH_LIMIT: u32 = 10000;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LightStrategy {
    All,
    One,
    Auto,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RRStrategy {
    Efficiency,
    Probability,
    None,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct IntegratorSettings {
    pub max_depth: u32,
    pub light_strategy: LightStrategy,
    pub rr_strategy: RRStrategy,
    pub continue_probability: f32,
    pub include_environment: bool,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            max_depth: 16,
            light_strategy: LightStrategy::Auto,
            rr_strategy: RRStrategy::Efficiency,
            continue_probability: 0.65,
            include_environment: true,
        }
    }
}

/// Everything a render thread owns while tracing paths.
pub struct ThreadContext {
    pub swl: SpectrumWavelengths,
    pub camera: Camera,
    pub sampler: Sampler,
    pub time: f32,
}

#[delegatable_trait]
pub trait SurfaceIntegratorInterface {
    /// Scene wide set-up, run once before any thread starts.
    fn preprocess(&mut self, scene: &Scene);

    /// Declares the random number slots the integrator reads per path.
    fn request_samples(&mut self, sample: &mut Sample, scene: &Scene);

    /// Traces the path for `sample`, leaving its contributions in the sample.
    /// Returns how many non black contributions the path produced.
    fn li(&self, ctx: &mut ThreadContext, scene: &Scene, sample: &mut Sample) -> u32;
}

#[derive(Delegate, Clone)]
#[delegate(SurfaceIntegratorInterface)]
pub enum SurfaceIntegrator {
    Path(PathIntegrator),
}

impl SurfaceIntegrator {
    pub fn from_settings(log: &slog::Logger, settings: &IntegratorSettings) -> Self {
        SurfaceIntegrator::Path(PathIntegrator::new(log, settings))
    }
}

#[derive(Clone)]
pub struct PathIntegrator {
    settings: IntegratorSettings,
    light_strategy: LightStrategy,
    buffer_id: usize,
    sample_offset: usize,
    log: slog::Logger,
}

impl PathIntegrator {
    pub fn new(log: &slog::Logger, settings: &IntegratorSettings) -> Self {
        Self {
            settings: settings.clone(),
            light_strategy: settings.light_strategy,
            buffer_id: 0,
            sample_offset: 0,
            log: log.new(o!("module" => "integrator")),
        }
    }

    /// Strategy actually used once `Auto` has been resolved against the scene.
    pub fn light_strategy(&self) -> LightStrategy {
        self.light_strategy
    }

    /// Direct lighting from `light` with multiple importance sampling between
    /// the light and the BSDF. `data` is the vertex's slice of the xD slot.
    #[allow(clippy::too_many_arguments)]
    fn estimate_direct(
        &self,
        scene: &Scene,
        light: &Light,
        isect: &Intersection,
        bsdf: &BSDF,
        wo: &na::Vector3<f32>,
        data: &[f32; 10],
        time: f32,
    ) -> Spectrum {
        let n = bsdf.frame().nn;
        let p = isect.dg.p;
        let bsdf_flags = BxDFType::BSDF_ALL - BxDFType::BSDF_SPECULAR;
        let mut ld = Spectrum::zero();

        if let Some(ls) = light.sample_l(&p, &na::Point2::new(data[0], data[1])) {
            if ls.pdf > 0.0 && !ls.li.is_black() {
                let f = bsdf.f(&ls.wi, wo, BxDFType::BSDF_ALL);
                if !f.is_black()
                    && !scene
                        .aggregate
                        .intersect_p(&isect.spawn_ray_to(&ls.p_light, time))
                {
                    let cos = ls.wi.dot(&n).abs();
                    if light.is_delta() {
                        ld += f * ls.li * (cos / ls.pdf);
                    } else {
                        let bsdf_pdf = bsdf.pdf(wo, &ls.wi, bsdf_flags);
                        let weight = power_heuristic(1, ls.pdf, 1, bsdf_pdf);
                        ld += f * ls.li * (cos * weight / ls.pdf);
                    }
                }
            }
        }

        if !light.is_delta() {
            let bs = bsdf.sample_f(
                wo,
                &na::Point2::new(data[3], data[4]),
                data[5],
                bsdf_flags,
                true,
            );
            if let Some(bs) = bs.filter(|bs| bs.pdf > 0.0 && !bs.f.is_black()) {
                let light_pdf = light.pdf(&p, &bs.wi);
                if light_pdf > 0.0 {
                    let weight = power_heuristic(1, bs.pdf, 1, light_pdf);
                    let ray = isect.spawn_ray(&bs.wi, time);
                    if !scene.aggregate.intersect_p(&ray) {
                        let li = light.le(&ray);
                        if !li.is_black() {
                            ld += bs.f * li * (bs.wi.dot(&n).abs() * weight / bs.pdf);
                        }
                    }
                }
            }
        }

        ld
    }
}

impl SurfaceIntegratorInterface for PathIntegrator {
    fn preprocess(&mut self, scene: &Scene) {
        self.buffer_id = scene.film.request_buffer("eye");
        self.light_strategy = match self.settings.light_strategy {
            LightStrategy::Auto if scene.lights.len() > 5 => LightStrategy::One,
            LightStrategy::Auto => LightStrategy::All,
            s => s,
        };
        debug!(self.log, "path integrator ready";
            "max_depth" => self.settings.max_depth,
            "light_strategy" => ?self.light_strategy,
            "rr_strategy" => ?self.settings.rr_strategy);
    }

    fn request_samples(&mut self, sample: &mut Sample, _scene: &Scene) {
        let mut structure = vec![2, 1, 2, 1, 2, 1];
        if self.settings.rr_strategy != RRStrategy::None {
            structure.push(1);
        }
        self.sample_offset = sample.add_xd(&structure, self.settings.max_depth as usize + 1);
    }

    fn li(&self, ctx: &mut ThreadContext, scene: &Scene, sample: &mut Sample) -> u32 {
        let n_groups = scene.light_groups.len().max(1);
        let mut l = vec![Spectrum::zero(); n_groups];
        let mut v = vec![0.0f32; n_groups];
        let mut nr_contribs = 0;
        let mut alpha = 1.0;
        let mut distance = f32::INFINITY;

        let generated = ctx.camera.generate_ray(sample);
        let ray_weight = generated.as_ref().map_or(0.0, |(_, w)| *w);
        if let Some((camera_ray, _)) = generated {
            let time = ctx.time;
            let mut ray: RayDifferential = camera_ray;
            let mut throughput = Spectrum::new(1.0);
            let mut v_contrib = 0.1;
            let mut specular_bounce = true;
            let mut specular = true;
            let mut through = 0;
            let mut path_length = 0;

            loop {
                let isect = match scene.aggregate.intersect(&ray.ray) {
                    Some(isect) => isect,
                    None => {
                        if (self.settings.include_environment || path_length > 0)
                            && specular_bounce
                        {
                            for light in &scene.lights {
                                let le = light.le(&ray.ray) * throughput;
                                if !le.is_black() {
                                    l[light.group()] += le;
                                    v[light.group()] += le.filter() * v_contrib;
                                    nr_contribs += 1;
                                }
                            }
                        }
                        if path_length == 0 {
                            alpha = 0.0;
                        }
                        break;
                    }
                };
                if path_length == 0 && through == 0 {
                    distance = ray.ray.t_max.get() * ray.ray.d.norm();
                }
                if path_length == self.settings.max_depth {
                    break;
                }

                let mut data = [0.0f32; 10];
                {
                    let values = ctx.sampler.get_lazy_values(
                        sample,
                        self.sample_offset,
                        path_length as usize,
                    );
                    data[..values.len()].copy_from_slice(values);
                }
                let bsdf_ref = sample.arena.alloc(isect.get_bsdf(&mut ctx.swl));
                let bsdf = sample.arena.get(bsdf_ref);
                let wo = -ray.ray.d;
                let n = bsdf.frame().nn;

                match self.light_strategy {
                    LightStrategy::All => {
                        for light in &scene.lights {
                            let ld = self.estimate_direct(scene, light, &isect, bsdf, &wo, &data, time)
                                * throughput;
                            if !ld.is_black() {
                                l[light.group()] += ld;
                                v[light.group()] += ld.filter() * v_contrib;
                                nr_contribs += 1;
                            }
                        }
                    }
                    LightStrategy::One | LightStrategy::Auto => {
                        let n_lights = scene.lights.len();
                        if n_lights > 0 {
                            let idx = ((data[2] * n_lights as f32) as usize).min(n_lights - 1);
                            let light = &scene.lights[idx];
                            let ld = self.estimate_direct(scene, light, &isect, bsdf, &wo, &data, time)
                                * (throughput * n_lights as f32);
                            if !ld.is_black() {
                                l[light.group()] += ld;
                                v[light.group()] += ld.filter() * v_contrib;
                                nr_contribs += 1;
                            }
                        }
                    }
                }

                let bs = match bsdf.sample_f(
                    &wo,
                    &na::Point2::new(data[6], data[7]),
                    data[8],
                    BxDFType::BSDF_ALL,
                    true,
                ) {
                    Some(bs) if bs.pdf > 0.0 => bs,
                    _ => break,
                };
                let dp = bs.wi.dot(&n).abs() / bs.pdf;

                if path_length > 3 {
                    match self.settings.rr_strategy {
                        RRStrategy::Efficiency => {
                            let q = (bs.f.filter() * dp).min(1.0);
                            if q < data[9] {
                                break;
                            }
                            throughput /= q;
                        }
                        RRStrategy::Probability => {
                            if self.settings.continue_probability < data[9] {
                                break;
                            }
                            throughput /= self.settings.continue_probability;
                        }
                        RRStrategy::None => {}
                    }
                }

                let transmit = BxDFType::BSDF_TRANSMISSION | BxDFType::BSDF_SPECULAR;
                let pass_through =
                    bs.sampled_type == transmit && bsdf.pdf(&bs.wi, &wo, transmit) > 0.0;
                if pass_through {
                    if through > PASS_THROUGH_LIMIT {
                        break;
                    }
                    through += 1;
                } else {
                    specular_bounce = bs.sampled_type.contains(BxDFType::BSDF_SPECULAR);
                }
                specular = specular && specular_bounce;
                throughput *= bs.f;
                throughput *= dp;
                if !specular {
                    v_contrib += dp;
                }

                ray = RayDifferential::new(isect.spawn_ray(&bs.wi, time));
                if !pass_through {
                    path_length += 1;
                }
            }
        }

        let tint = ctx.swl.single_tint();
        let color_system = ctx.camera.film.color_system();
        for (group, (radiance, mut variance)) in l.into_iter().zip(v).enumerate() {
            let radiance = radiance * tint;
            if !radiance.is_black() {
                variance /= radiance.filter();
            }
            let color = color_system.rgb_to_xyz(&radiance) * ray_weight;
            sample.add_contribution(
                sample.image_x,
                sample.image_y,
                color,
                alpha,
                distance,
                variance,
                self.buffer_id,
                group,
            );
        }

        trace!(self.log, "path traced"; "contributions" => nr_contribs);
        nr_contribs
    }
}
