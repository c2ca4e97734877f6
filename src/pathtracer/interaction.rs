use super::{
    bsdf::BSDF,
    material::{Material, MaterialInterface},
    wavelengths::SpectrumWavelengths,
};
use crate::common::ray::RAY_EPSILON;
use crate::common::{math::face_forward, ray::Ray};

/// Local differential geometry of a surface point.
#[derive(Clone, Debug)]
pub struct DifferentialGeometry {
    pub p: na::Point3<f32>,
    /// Shading normal.
    pub nn: na::Vector3<f32>,
    pub dpdu: na::Vector3<f32>,
    pub dpdv: na::Vector3<f32>,
    pub uv: na::Point2<f32>,
}

impl DifferentialGeometry {
    pub fn new(
        p: na::Point3<f32>,
        nn: na::Vector3<f32>,
        dpdu: na::Vector3<f32>,
        dpdv: na::Vector3<f32>,
        uv: na::Point2<f32>,
    ) -> Self {
        Self {
            p,
            nn,
            dpdu,
            dpdv,
            uv,
        }
    }
}

pub struct Intersection<'a> {
    pub dg: DifferentialGeometry,
    /// Geometric normal.
    pub ng: na::Vector3<f32>,
    pub material: &'a Material,
}

impl<'a> Intersection<'a> {
    pub fn get_bsdf(&self, swl: &mut SpectrumWavelengths) -> BSDF {
        self.material.get_bsdf(swl, &self.dg, &self.ng)
    }

    /// Ray leaving the surface towards `d`, offset off the side it leaves from.
    pub fn spawn_ray(&self, d: &na::Vector3<f32>, time: f32) -> Ray {
        let n = face_forward(&self.ng, d);
        Ray::new(self.dg.p + n * RAY_EPSILON, *d, time)
    }

    /// Shadow ray towards `p`.
    pub fn spawn_ray_to(&self, p: &na::Point3<f32>, time: f32) -> Ray {
        let n = face_forward(&self.ng, &(p - self.dg.p));
        Ray::segment(&(self.dg.p + n * RAY_EPSILON), p, time)
    }
}
