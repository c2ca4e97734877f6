use super::sampling::{uniform_sample_sphere, uniform_sphere_pdf};
use crate::common::{bounds::Bounds3, ray::Ray, spectrum::Spectrum};
use ambassador::{delegatable_trait, Delegate};
use std::f32::consts::PI;

/// Incident illumination sampled from a light.
#[derive(Clone, Debug)]
pub struct LightSample {
    /// Direction towards the light.
    pub wi: na::Vector3<f32>,
    pub li: Spectrum,
    pub pdf: f32,
    /// Point a shadow ray has to reach unoccluded.
    pub p_light: na::Point3<f32>,
}

#[delegatable_trait]
pub trait LightInterface {
    /// Index of the light group the light contributes to.
    fn group(&self) -> usize;

    fn sample_l(&self, p: &na::Point3<f32>, u: &na::Point2<f32>) -> Option<LightSample>;

    fn pdf(&self, p: &na::Point3<f32>, wi: &na::Vector3<f32>) -> f32;

    /// Radiance carried by a ray escaping the scene.
    fn le(&self, _r: &Ray) -> Spectrum {
        Spectrum::new(0.0)
    }

    fn power(&self) -> Spectrum;

    fn is_delta(&self) -> bool;

    fn is_environmental(&self) -> bool {
        false
    }

    fn preprocess(&mut self, _world_bound: &Bounds3) {}
}

#[derive(Delegate, Clone, Debug)]
#[delegate(LightInterface)]
pub enum Light {
    Point(PointLight),
    Distant(DistantLight),
    Infinite(InfiniteLight),
}

#[derive(Clone, Debug)]
pub struct PointLight {
    pos: na::Point3<f32>,
    intensity: Spectrum,
    group: usize,
}

impl PointLight {
    pub fn new(pos: na::Point3<f32>, intensity: Spectrum, group: usize) -> Self {
        Self {
            pos,
            intensity,
            group,
        }
    }
}

impl LightInterface for PointLight {
    fn group(&self) -> usize {
        self.group
    }

    fn sample_l(&self, p: &na::Point3<f32>, _u: &na::Point2<f32>) -> Option<LightSample> {
        let d = self.pos - p;
        let dist2 = d.norm_squared();
        if dist2 == 0.0 {
            return None;
        }
        Some(LightSample {
            wi: d / dist2.sqrt(),
            li: self.intensity / dist2,
            pdf: 1.0,
            p_light: self.pos,
        })
    }

    fn pdf(&self, _p: &na::Point3<f32>, _wi: &na::Vector3<f32>) -> f32 {
        0.0
    }

    fn power(&self) -> Spectrum {
        self.intensity * 4.0 * PI
    }

    fn is_delta(&self) -> bool {
        true
    }
}

/// Parallel light arriving from a single direction.
#[derive(Clone, Debug)]
pub struct DistantLight {
    /// Direction towards the light.
    dir: na::Vector3<f32>,
    radiance: Spectrum,
    group: usize,
    world_radius: f32,
}

impl DistantLight {
    pub fn new(dir: na::Vector3<f32>, radiance: Spectrum, group: usize) -> Self {
        Self {
            dir: dir.normalize(),
            radiance,
            group,
            world_radius: 1.0,
        }
    }
}

impl LightInterface for DistantLight {
    fn group(&self) -> usize {
        self.group
    }

    fn sample_l(&self, p: &na::Point3<f32>, _u: &na::Point2<f32>) -> Option<LightSample> {
        Some(LightSample {
            wi: self.dir,
            li: self.radiance,
            pdf: 1.0,
            p_light: p + self.dir * (2.0 * self.world_radius),
        })
    }

    fn pdf(&self, _p: &na::Point3<f32>, _wi: &na::Vector3<f32>) -> f32 {
        0.0
    }

    fn power(&self) -> Spectrum {
        self.radiance * (PI * self.world_radius * self.world_radius)
    }

    fn is_delta(&self) -> bool {
        true
    }

    fn preprocess(&mut self, world_bound: &Bounds3) {
        let (_, radius) = world_bound.bounding_sphere();
        self.world_radius = radius.max(f32::EPSILON);
    }
}

/// Constant radiance arriving from every direction.
#[derive(Clone, Debug)]
pub struct InfiniteLight {
    radiance: Spectrum,
    group: usize,
    world_radius: f32,
}

impl InfiniteLight {
    pub fn new(radiance: Spectrum, group: usize) -> Self {
        Self {
            radiance,
            group,
            world_radius: 1.0,
        }
    }
}

impl LightInterface for InfiniteLight {
    fn group(&self) -> usize {
        self.group
    }

    fn sample_l(&self, p: &na::Point3<f32>, u: &na::Point2<f32>) -> Option<LightSample> {
        let wi = uniform_sample_sphere(u);
        Some(LightSample {
            wi,
            li: self.radiance,
            pdf: uniform_sphere_pdf(),
            p_light: p + wi * (2.0 * self.world_radius),
        })
    }

    fn pdf(&self, _p: &na::Point3<f32>, _wi: &na::Vector3<f32>) -> f32 {
        uniform_sphere_pdf()
    }

    fn le(&self, _r: &Ray) -> Spectrum {
        self.radiance
    }

    fn power(&self) -> Spectrum {
        self.radiance * (PI * self.world_radius * self.world_radius)
    }

    fn is_delta(&self) -> bool {
        false
    }

    fn is_environmental(&self) -> bool {
        true
    }

    fn preprocess(&mut self, world_bound: &Bounds3) {
        let (_, radius) = world_bound.bounding_sphere();
        self.world_radius = radius.max(f32::EPSILON);
    }
}
