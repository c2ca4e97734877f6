use super::integrator::SurfaceIntegrator;
use super::light::{DistantLight, InfiniteLight, Light, PointLight};
use super::material::{
    GlassMaterial, GlossyMaterial, Material, MatteMaterial, MirrorMaterial, MixMaterial,
    NullMaterial,
};
use super::primitive::{Aggregate, GeometricPrimitive, Primitive};
use super::sampler::Sampler;
use super::scene::Scene;
use super::shape::{Shape, Sphere};
use crate::common::config::RenderSettings;
use crate::common::film::Film;
use crate::common::spectrum::Spectrum;
use crate::common::Camera;
use std::sync::Arc;

fn sphere(center: na::Point3<f32>, radius: f32, material: &Arc<Material>) -> Primitive {
    Primitive::Geometric(GeometricPrimitive::new(
        Shape::Sphere(Sphere::new(center, radius, false)),
        material.clone(),
    ))
}

/// A row of spheres on a large ground sphere, one per material, lit by a key
/// light, a sun and a sky.
pub fn demo_scene(log: &slog::Logger, settings: &RenderSettings) -> anyhow::Result<Scene> {
    let film = Arc::new(Film::new(log, &settings.film));
    let camera = Camera::look_at(
        log,
        &na::Point3::new(0.0, 1.6, 6.5),
        &na::Point3::new(0.0, 0.5, 0.0),
        &na::Vector3::y(),
        &settings.camera,
        film.clone(),
    );

    let ground = Arc::new(Material::Matte(MatteMaterial::new(Spectrum::new(0.6))));
    let matte = Arc::new(Material::Matte(MatteMaterial::new(Spectrum::from_floats(
        0.8, 0.35, 0.1,
    ))));
    let mirror = Arc::new(Material::Mirror(MirrorMaterial::new(Spectrum::new(0.9))));
    let glass = Arc::new(Material::Glass(GlassMaterial::new(
        Spectrum::new(1.0),
        Spectrum::new(1.0),
        1.5,
        0.004,
    )));
    let glossy = Arc::new(Material::Glossy(GlossyMaterial::new(
        Spectrum::from_floats(0.1, 0.2, 0.5),
        Spectrum::new(0.3),
        0.1,
        1.5,
    )));
    let mix = Arc::new(Material::Mix(MixMaterial::new(
        matte.clone(),
        mirror.clone(),
        0.5,
    )));
    let null = Arc::new(Material::Null(NullMaterial {}));

    let y = 0.6;
    let primitives = vec![
        sphere(na::Point3::new(0.0, -1000.0, 0.0), 1000.0, &ground),
        sphere(na::Point3::new(-2.6, y, 0.0), 0.6, &glass),
        sphere(na::Point3::new(-1.3, y, 0.0), 0.6, &mirror),
        sphere(na::Point3::new(0.0, y, 0.0), 0.6, &glossy),
        sphere(na::Point3::new(1.3, y, 0.0), 0.6, &matte),
        // invisible shell around the matte sphere
        sphere(na::Point3::new(1.3, y, 0.0), 0.65, &null),
        sphere(na::Point3::new(2.6, y, 0.0), 0.6, &mix),
    ];

    let light_groups = vec![
        String::from("key"),
        String::from("sun"),
        String::from("sky"),
    ];
    let lights = vec![
        Light::Point(PointLight::new(
            na::Point3::new(3.0, 5.0, 4.0),
            Spectrum::new(40.0),
            0,
        )),
        Light::Distant(DistantLight::new(
            na::Vector3::new(-1.0, 2.0, 1.0),
            Spectrum::from_floats(1.4, 1.3, 1.1),
            1,
        )),
        Light::Infinite(InfiniteLight::new(Spectrum::from_floats(0.15, 0.2, 0.3), 2)),
    ];

    let sampler = Sampler::from_settings(log, &settings.sampler, film);
    let integrator = SurfaceIntegrator::from_settings(log, &settings.integrator);
    let scene = Scene::new(
        log,
        camera,
        sampler,
        integrator,
        Aggregate::new(primitives),
        lights,
        light_groups,
    )?
    .with_seed(settings.seed);
    scene.set_suspend_threads_when_done(settings.suspend_threads_when_done);
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::film::FilmSettings;

    #[test]
    fn test_demo_scene_renders() {
        let log = slog::Logger::root(slog::Discard, o!());
        let mut settings = RenderSettings {
            film: FilmSettings::with_resolution(16, 12),
            seed: Some(1),
            ..Default::default()
        };
        settings.film.halt_spp = 1;
        settings.integrator.max_depth = 4;

        let scene = Arc::new(demo_scene(&log, &settings).unwrap());
        assert_eq!(scene.lights.len(), 3);
        assert_eq!(scene.light_groups.len(), 3);
        assert_eq!(scene.aggregate.len(), 7);

        scene.set_thread_count(2);
        scene.render().unwrap();
        assert!(scene.film.enough_samples());
        assert_eq!(scene.film.group_names(), vec!["key", "sun", "sky"]);
        let image = scene.framebuffer();
        assert!(image.pixels().any(|p| p.0.iter().any(|c| *c > 0)));
    }
}
