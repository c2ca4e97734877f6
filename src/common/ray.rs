use std::cell::Cell;

pub const RAY_EPSILON: f32 = 1e-4;

#[derive(Clone, Debug)]
pub struct Ray {
    pub o: na::Point3<f32>,
    pub d: na::Vector3<f32>,
    pub t_min: f32,
    pub t_max: Cell<f32>,
    pub time: f32,
}

impl Ray {
    pub fn new(o: na::Point3<f32>, d: na::Vector3<f32>, time: f32) -> Self {
        Self {
            o,
            d,
            t_min: RAY_EPSILON,
            t_max: Cell::new(f32::INFINITY),
            time,
        }
    }

    /// Ray restricted to the open segment between `p0` and `p1`.
    pub fn segment(p0: &na::Point3<f32>, p1: &na::Point3<f32>, time: f32) -> Self {
        let d = p1 - p0;
        Self {
            o: *p0,
            d,
            t_min: RAY_EPSILON,
            t_max: Cell::new(1.0 - RAY_EPSILON),
            time,
        }
    }

    pub fn point_at(&self, t: f32) -> na::Point3<f32> {
        self.o + self.d * t
    }
}

#[derive(Clone, Debug)]
pub struct RayDifferential {
    pub ray: Ray,
    pub has_differentials: bool,
    pub rx_origin: na::Point3<f32>,
    pub ry_origin: na::Point3<f32>,
    pub rx_direction: na::Vector3<f32>,
    pub ry_direction: na::Vector3<f32>,
}

impl RayDifferential {
    pub fn new(ray: Ray) -> Self {
        Self {
            ray,
            has_differentials: false,
            rx_origin: na::Point3::origin(),
            ry_origin: na::Point3::origin(),
            rx_direction: glm::zero(),
            ry_direction: glm::zero(),
        }
    }

    pub fn scale_differentials(&mut self, s: f32) {
        self.rx_origin = self.ray.o + (self.rx_origin - self.ray.o) * s;
        self.ry_origin = self.ray.o + (self.ry_origin - self.ray.o) * s;
        self.rx_direction = self.ray.d + (self.rx_direction - self.ray.d) * s;
        self.ry_direction = self.ray.d + (self.ry_direction - self.ray.d) * s;
    }
}
