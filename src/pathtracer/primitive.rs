use super::{
    interaction::Intersection,
    material::Material,
    shape::{Shape, ShapeInterface},
};
use crate::common::{bounds::Bounds3, ray::Ray};
use ambassador::{delegatable_trait, Delegate};
use std::sync::Arc;

#[delegatable_trait]
pub trait PrimitiveInterface {
    /// Nearest hit, shortening `r.t_max` to it.
    fn intersect(&self, r: &Ray) -> Option<Intersection<'_>>;
    fn intersect_p(&self, r: &Ray) -> bool;
    fn world_bound(&self) -> Bounds3;
}

#[derive(Delegate)]
#[delegate(PrimitiveInterface)]
pub enum Primitive {
    Geometric(GeometricPrimitive),
}

pub struct GeometricPrimitive {
    shape: Shape,
    material: Arc<Material>,
}

impl GeometricPrimitive {
    pub fn new(shape: Shape, material: Arc<Material>) -> Self {
        Self { shape, material }
    }
}

impl PrimitiveInterface for GeometricPrimitive {
    fn intersect(&self, r: &Ray) -> Option<Intersection<'_>> {
        let (t_hit, dg) = self.shape.intersect(r)?;
        r.t_max.set(t_hit);
        Some(Intersection {
            ng: dg.nn,
            dg,
            material: &self.material,
        })
    }

    fn intersect_p(&self, r: &Ray) -> bool {
        !self.material.is_null() && self.shape.intersect_p(r)
    }

    fn world_bound(&self) -> Bounds3 {
        self.shape.world_bound()
    }
}

/// Flat list of primitives tested one after another.
pub struct Aggregate {
    primitives: Vec<Primitive>,
    bounds: Bounds3,
}

impl Aggregate {
    pub fn new(primitives: Vec<Primitive>) -> Self {
        let bounds = primitives
            .iter()
            .fold(Bounds3::empty(), |b, p| Bounds3::union(&b, &p.world_bound()));
        Self { primitives, bounds }
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

impl PrimitiveInterface for Aggregate {
    fn intersect(&self, r: &Ray) -> Option<Intersection<'_>> {
        if self.bounds.intersect_p(r).is_none() {
            return None;
        }
        let mut isect_final = None;
        for prim in &self.primitives {
            if let Some(isect) = prim.intersect(r) {
                isect_final = Some(isect);
            }
        }
        isect_final
    }

    fn intersect_p(&self, r: &Ray) -> bool {
        self.bounds.intersect_p(r).is_some() && self.primitives.iter().any(|p| p.intersect_p(r))
    }

    fn world_bound(&self) -> Bounds3 {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::spectrum::Spectrum;
    use crate::pathtracer::material::{MatteMaterial, NullMaterial};
    use crate::pathtracer::shape::Sphere;
    use approx::assert_relative_eq;

    fn sphere_at(z: f32, material: &Arc<Material>) -> Primitive {
        Primitive::Geometric(GeometricPrimitive::new(
            Shape::Sphere(Sphere::new(na::Point3::new(0.0, 0.0, z), 1.0, false)),
            material.clone(),
        ))
    }

    #[test]
    fn test_aggregate_returns_nearest_hit() {
        let material = Arc::new(Material::Matte(MatteMaterial::new(Spectrum::new(0.5))));
        let aggregate = Aggregate::new(vec![
            sphere_at(-10.0, &material),
            sphere_at(-4.0, &material),
            sphere_at(-7.0, &material),
        ]);
        let ray = Ray::new(na::Point3::origin(), na::Vector3::new(0.0, 0.0, -1.0), 0.0);
        let isect = aggregate.intersect(&ray).unwrap();
        assert_relative_eq!(ray.t_max.get(), 3.0, epsilon = 1e-5);
        assert_relative_eq!(isect.dg.p.z, -3.0, epsilon = 1e-5);
        assert_eq!(aggregate.len(), 3);
    }

    #[test]
    fn test_occlusion() {
        let material = Arc::new(Material::Matte(MatteMaterial::new(Spectrum::new(0.5))));
        let aggregate = Aggregate::new(vec![sphere_at(-4.0, &material)]);
        let blocked = Ray::segment(&na::Point3::origin(), &na::Point3::new(0.0, 0.0, -8.0), 0.0);
        let clear = Ray::segment(&na::Point3::origin(), &na::Point3::new(0.0, 0.0, 2.0), 0.0);
        assert!(aggregate.intersect_p(&blocked));
        assert!(!aggregate.intersect_p(&clear));
    }

    #[test]
    fn test_null_surfaces_do_not_occlude() {
        let null = Arc::new(Material::Null(NullMaterial {}));
        let aggregate = Aggregate::new(vec![sphere_at(-4.0, &null)]);
        let ray = Ray::segment(&na::Point3::origin(), &na::Point3::new(0.0, 0.0, -8.0), 0.0);
        assert!(!aggregate.intersect_p(&ray));
        assert!(aggregate.intersect(&ray).is_some());
    }
}
