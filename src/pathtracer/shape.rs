use super::interaction::DifferentialGeometry;
use crate::common::{bounds::Bounds3, ray::Ray};
use ambassador::{delegatable_trait, Delegate};

#[delegatable_trait]
pub trait ShapeInterface {
    /// Parametric distance and geometry of the nearest hit inside the ray's extent.
    fn intersect(&self, r: &Ray) -> Option<(f32, DifferentialGeometry)>;
    fn intersect_p(&self, r: &Ray) -> bool {
        self.intersect(r).is_some()
    }
    fn world_bound(&self) -> Bounds3;
}

#[derive(Delegate, Clone, Debug)]
#[delegate(ShapeInterface)]
pub enum Shape {
    Sphere(Sphere),
}

#[derive(Clone, Debug)]
pub struct Sphere {
    center: na::Point3<f32>,
    radius: f32,
    /// Flips the normals so the surface faces inwards.
    reverse_orientation: bool,
}

impl Sphere {
    pub fn new(center: na::Point3<f32>, radius: f32, reverse_orientation: bool) -> Self {
        Self {
            center,
            radius,
            reverse_orientation,
        }
    }

    fn nearest_t(&self, r: &Ray) -> Option<f32> {
        let oc = r.o - self.center;
        let a = r.d.norm_squared();
        let b = 2.0 * oc.dot(&r.d);
        let c = oc.norm_squared() - self.radius * self.radius;
        let discrim = b * b - 4.0 * a * c;
        if discrim < 0.0 {
            return None;
        }
        let root = discrim.sqrt();
        let q = if b < 0.0 { -0.5 * (b - root) } else { -0.5 * (b + root) };
        let (mut t0, mut t1) = (q / a, c / q);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }

        let t_max = r.t_max.get();
        if t0 > t_max || t1 <= r.t_min {
            return None;
        }
        let t = if t0 > r.t_min { t0 } else { t1 };
        if t > t_max {
            None
        } else {
            Some(t)
        }
    }
}

impl ShapeInterface for Sphere {
    fn intersect(&self, r: &Ray) -> Option<(f32, DifferentialGeometry)> {
        let t = self.nearest_t(r)?;
        let p = r.point_at(t);
        let local = p - self.center;
        let mut n = local / self.radius;
        if self.reverse_orientation {
            n = -n;
        }

        let mut phi = local.y.atan2(local.x);
        if phi < 0.0 {
            phi += 2.0 * std::f32::consts::PI;
        }
        let cos_theta = (local.z / self.radius).clamp(-1.0, 1.0);
        let theta = cos_theta.acos();
        let dpdu = na::Vector3::new(-local.y, local.x, 0.0) * (2.0 * std::f32::consts::PI);
        let dpdu = if dpdu.norm_squared() > 0.0 {
            dpdu
        } else {
            // at the poles
            n.cross(&na::Vector3::new(1.0, 0.0, 0.0))
        };
        let dpdv = n.cross(&dpdu);

        let dg = DifferentialGeometry::new(
            p,
            n,
            dpdu,
            dpdv,
            na::Point2::new(phi / (2.0 * std::f32::consts::PI), theta / std::f32::consts::PI),
        );
        Some((t, dg))
    }

    fn intersect_p(&self, r: &Ray) -> bool {
        self.nearest_t(r).is_some()
    }

    fn world_bound(&self) -> Bounds3 {
        let r = na::Vector3::new(self.radius, self.radius, self.radius);
        Bounds3::new(self.center - r, self.center + r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_hit_from_outside() {
        let sphere = Sphere::new(na::Point3::new(0.0, 0.0, -5.0), 1.0, false);
        let ray = Ray::new(na::Point3::origin(), na::Vector3::new(0.0, 0.0, -1.0), 0.0);
        let (t, dg) = sphere.intersect(&ray).unwrap();
        assert_relative_eq!(t, 4.0, epsilon = 1e-5);
        assert_relative_eq!(dg.nn, na::Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-5);
        assert!(dg.dpdu.dot(&dg.nn).abs() < 1e-4);
    }

    #[test]
    fn test_sphere_respects_extent() {
        let sphere = Sphere::new(na::Point3::new(0.0, 0.0, -5.0), 1.0, false);
        let ray = Ray::segment(&na::Point3::origin(), &na::Point3::new(0.0, 0.0, -2.0), 0.0);
        assert!(!sphere.intersect_p(&ray));
        let miss = Ray::new(na::Point3::origin(), na::Vector3::new(0.0, 1.0, 0.0), 0.0);
        assert!(sphere.intersect(&miss).is_none());
    }

    #[test]
    fn test_hit_from_inside_uses_far_root() {
        let sphere = Sphere::new(na::Point3::origin(), 2.0, true);
        let ray = Ray::new(na::Point3::origin(), na::Vector3::new(1.0, 0.0, 0.0), 0.0);
        let (t, dg) = sphere.intersect(&ray).unwrap();
        assert_relative_eq!(t, 2.0, epsilon = 1e-5);
        assert_relative_eq!(dg.nn, na::Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
    }
}
