use super::film::Film;
use super::math::lerp;
use super::ray::{Ray, RayDifferential};
use crate::pathtracer::primitive::{Aggregate, PrimitiveInterface};
use crate::pathtracer::sample::Sample;
use crate::pathtracer::sampling::concentric_sample_disk;
use std::sync::Arc;

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CameraSettings {
    /// Field of view of the shorter image axis, in degrees.
    pub fov: f32,
    pub lens_radius: f32,
    pub focal_distance: f32,
    pub auto_focus: bool,
    pub shutter_open: f32,
    pub shutter_close: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov: 45.0,
            lens_radius: 0.0,
            focal_distance: 1e6,
            auto_focus: false,
            shutter_open: 0.0,
            shutter_close: 1.0,
        }
    }
}

/// Rigid camera motion between two keyframes.
#[derive(Clone, Debug)]
pub struct MotionSystem {
    start_time: f32,
    end_time: f32,
    start: na::Isometry3<f32>,
    end: na::Isometry3<f32>,
    active: bool,
}

impl MotionSystem {
    pub fn new(
        start_time: f32,
        end_time: f32,
        start: na::Isometry3<f32>,
        end: na::Isometry3<f32>,
    ) -> Self {
        let active = start_time < end_time && start != end;
        Self {
            start_time,
            end_time,
            start,
            end,
            active,
        }
    }

    pub fn fixed(transform: na::Isometry3<f32>) -> Self {
        Self::new(0.0, 0.0, transform, transform)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn sample(&self, time: f32) -> na::Isometry3<f32> {
        if !self.active {
            return self.start;
        }
        let t = ((time - self.start_time) / (self.end_time - self.start_time)).clamp(0.0, 1.0);
        self.start.lerp_slerp(&self.end, t)
    }
}

/// Thin lens perspective camera looking down its local -z axis.
///
/// Cloned once per render thread; the clone owns its sampled transform while
/// sharing the film.
#[derive(Clone)]
pub struct Camera {
    motion: MotionSystem,
    cam_to_world: na::Isometry3<f32>,
    tan_half_fov: f32,
    screen: [f32; 4],
    lens_radius: f32,
    focal_distance: f32,
    auto_focus: bool,
    shutter_open: f32,
    shutter_close: f32,
    pub film: Arc<Film>,
    log: slog::Logger,
}

impl Camera {
    pub fn new(
        log: &slog::Logger,
        motion: MotionSystem,
        settings: &CameraSettings,
        film: Arc<Film>,
    ) -> Self {
        let log = log.new(o!("module" => "camera"));
        let ratio = film.x_resolution as f32 / film.y_resolution as f32;
        let screen = if ratio >= 1.0 {
            [-ratio, ratio, -1.0, 1.0]
        } else {
            [-1.0, 1.0, -1.0 / ratio, 1.0 / ratio]
        };

        Self {
            cam_to_world: motion.sample(settings.shutter_open),
            motion,
            tan_half_fov: (settings.fov.to_radians() * 0.5).tan(),
            screen,
            lens_radius: settings.lens_radius,
            focal_distance: settings.focal_distance,
            auto_focus: settings.auto_focus,
            shutter_open: settings.shutter_open,
            shutter_close: settings.shutter_close,
            film,
            log,
        }
    }

    pub fn look_at(
        log: &slog::Logger,
        eye: &na::Point3<f32>,
        target: &na::Point3<f32>,
        up: &na::Vector3<f32>,
        settings: &CameraSettings,
        film: Arc<Film>,
    ) -> Self {
        let cam_to_world = na::Isometry3::look_at_rh(eye, target, up).inverse();
        Self::new(log, MotionSystem::fixed(cam_to_world), settings, film)
    }

    /// Maps a uniform variate onto the shutter interval.
    pub fn get_time(&self, u: f32) -> f32 {
        lerp(u, self.shutter_open, self.shutter_close)
    }

    pub fn sample_motion(&mut self, time: f32) {
        if self.motion.is_active() {
            self.cam_to_world = self.motion.sample(time);
        }
    }

    pub fn focal_distance(&self) -> f32 {
        self.focal_distance
    }

    fn raster_to_camera(&self, x: f32, y: f32) -> na::Vector3<f32> {
        let u = x / self.film.x_resolution as f32;
        let v = y / self.film.y_resolution as f32;
        let sx = lerp(u, self.screen[0], self.screen[1]);
        let sy = lerp(v, self.screen[3], self.screen[2]);
        na::Vector3::new(sx * self.tan_half_fov, sy * self.tan_half_fov, -1.0)
    }

    /// Generates the primary ray for `sample`, returning it with its importance weight.
    pub fn generate_ray(&self, sample: &Sample) -> Option<(RayDifferential, f32)> {
        let dir = self.raster_to_camera(sample.image_x, sample.image_y).normalize();
        let mut origin = na::Point3::origin();
        let mut d = dir;

        if self.lens_radius > 0.0 {
            let lens = concentric_sample_disk(&na::Point2::new(sample.lens_u, sample.lens_v));
            origin = na::Point3::new(lens.x * self.lens_radius, lens.y * self.lens_radius, 0.0);
            let ft = self.focal_distance / -dir.z;
            let p_focus = na::Point3::from(dir * ft);
            d = (p_focus - origin).normalize();
        }
        if !d.iter().all(|c| c.is_finite()) {
            return None;
        }

        let ray = Ray::new(
            self.cam_to_world * origin,
            self.cam_to_world * d,
            sample.time,
        );
        let mut ray = RayDifferential::new(ray);
        ray.has_differentials = true;
        ray.rx_origin = ray.ray.o;
        ray.ry_origin = ray.ray.o;
        ray.rx_direction = self.cam_to_world
            * self
                .raster_to_camera(sample.image_x + 1.0, sample.image_y)
                .normalize();
        ray.ry_direction = self.cam_to_world
            * self
                .raster_to_camera(sample.image_x, sample.image_y + 1.0)
                .normalize();

        Some((ray, 1.0))
    }

    /// Focuses on whatever the ray through the image centre hits first.
    pub fn auto_focus(&mut self, aggregate: &Aggregate) {
        if !self.auto_focus {
            return;
        }
        let dir = self.raster_to_camera(
            self.film.x_resolution as f32 * 0.5,
            self.film.y_resolution as f32 * 0.5,
        );
        let dir = dir.normalize();
        let ray = Ray::new(
            self.cam_to_world * na::Point3::origin(),
            self.cam_to_world * dir,
            self.shutter_open,
        );
        match aggregate.intersect(&ray) {
            Some(_) => {
                self.focal_distance = ray.t_max.get() * -dir.z;
                info!(self.log, "autofocus"; "focal_distance" => self.focal_distance);
            }
            None => warn!(self.log, "autofocus ray missed the scene, keeping focal distance";
                "focal_distance" => self.focal_distance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::film::FilmSettings;
    use approx::assert_relative_eq;

    fn test_camera(settings: &CameraSettings) -> Camera {
        let log = slog::Logger::root(slog::Discard, o!());
        let film = Arc::new(Film::new(&log, &FilmSettings::with_resolution(64, 32)));
        Camera::look_at(
            &log,
            &na::Point3::new(0.0, 0.0, 5.0),
            &na::Point3::origin(),
            &na::Vector3::y(),
            settings,
            film,
        )
    }

    #[test]
    fn test_center_ray_points_at_target() {
        let camera = test_camera(&CameraSettings::default());
        let mut sample = Sample::default();
        sample.image_x = 32.0;
        sample.image_y = 16.0;
        let (ray, weight) = camera.generate_ray(&sample).unwrap();

        assert_relative_eq!(weight, 1.0);
        assert_relative_eq!(ray.ray.o, na::Point3::new(0.0, 0.0, 5.0), epsilon = 1e-5);
        assert_relative_eq!(ray.ray.d, na::Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_shutter_time() {
        let settings = CameraSettings {
            shutter_open: 1.0,
            shutter_close: 3.0,
            ..Default::default()
        };
        let camera = test_camera(&settings);
        assert_relative_eq!(camera.get_time(0.5), 2.0);
    }

    #[test]
    fn test_motion_interpolates_translation() {
        let start = na::Isometry3::translation(0.0, 0.0, 0.0);
        let end = na::Isometry3::translation(2.0, 0.0, 0.0);
        let motion = MotionSystem::new(0.0, 1.0, start, end);
        assert!(motion.is_active());
        assert_relative_eq!(motion.sample(0.5).translation.vector.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(motion.sample(5.0).translation.vector.x, 2.0, epsilon = 1e-5);
        assert!(!MotionSystem::fixed(start).is_active());
    }
}
