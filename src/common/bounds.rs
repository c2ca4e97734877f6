use super::ray::Ray;

#[derive(Debug, Clone, Copy)]
pub struct Bounds3 {
    pub p_min: na::Point3<f32>,
    pub p_max: na::Point3<f32>,
}

pub fn min_p(p1: &na::Point3<f32>, p2: &na::Point3<f32>) -> na::Point3<f32> {
    na::Point3::new(p1.x.min(p2.x), p1.y.min(p2.y), p1.z.min(p2.z))
}

pub fn max_p(p1: &na::Point3<f32>, p2: &na::Point3<f32>) -> na::Point3<f32> {
    na::Point3::new(p1.x.max(p2.x), p1.y.max(p2.y), p1.z.max(p2.z))
}

impl Bounds3 {
    pub fn new(p1: na::Point3<f32>, p2: na::Point3<f32>) -> Self {
        Self {
            p_min: min_p(&p1, &p2),
            p_max: max_p(&p1, &p2),
        }
    }

    pub fn empty() -> Self {
        Self {
            p_min: na::Point3::new(f32::MAX, f32::MAX, f32::MAX),
            p_max: na::Point3::new(f32::MIN, f32::MIN, f32::MIN),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.p_min.x > self.p_max.x || self.p_min.y > self.p_max.y || self.p_min.z > self.p_max.z
    }

    pub fn diagonal(&self) -> na::Vector3<f32> {
        self.p_max - self.p_min
    }

    pub fn union(b1: &Bounds3, b2: &Bounds3) -> Bounds3 {
        Bounds3 {
            p_min: min_p(&b1.p_min, &b2.p_min),
            p_max: max_p(&b1.p_max, &b2.p_max),
        }
    }

    pub fn union_p(b: &Bounds3, p: &na::Point3<f32>) -> Bounds3 {
        Bounds3 {
            p_min: min_p(&b.p_min, p),
            p_max: max_p(&b.p_max, p),
        }
    }

    /// Center and radius of a sphere enclosing the box.
    pub fn bounding_sphere(&self) -> (na::Point3<f32>, f32) {
        if self.is_empty() {
            return (na::Point3::origin(), 0.0);
        }
        let center = na::center(&self.p_min, &self.p_max);
        (center, (self.p_max - center).norm())
    }

    /// Slab test returning the parametric overlap with the ray, if any.
    pub fn intersect_p(&self, r: &Ray) -> Option<(f32, f32)> {
        let mut t0 = r.t_min;
        let mut t1 = r.t_max.get();

        for i in 0..3usize {
            let inv_ray_dir: f32 = 1.0 / r.d[i];
            let mut t_near: f32 = (self.p_min[i] - r.o[i]) * inv_ray_dir;
            let mut t_far: f32 = (self.p_max[i] - r.o[i]) * inv_ray_dir;

            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }

            t_far *= 1.0 + 1e-5;
            t0 = if t_near > t0 { t_near } else { t0 };
            t1 = if t_far < t1 { t_far } else { t1 };
            if t0 > t1 {
                return None;
            }
        }

        Some((t0, t1))
    }
}
