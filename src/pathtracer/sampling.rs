use crate::common::math::{INV_2_PI, INV_4_PI, ONE_MINUS_EPSILON};
use rand::Rng;

pub type Random = rand::rngs::SmallRng;

pub fn uniform_float(rng: &mut Random) -> f32 {
    rng.gen::<f32>().min(ONE_MINUS_EPSILON)
}

pub fn concentric_sample_disk(u: &na::Point2<f32>) -> na::Point2<f32> {
    let u_offset = u.coords * 2.0 - na::Vector2::new(1.0, 1.0);

    if u_offset.x == 0.0 && u_offset.y == 0.0 {
        return na::Point2::new(0.0, 0.0);
    }

    let (r, theta) = if u_offset.x.abs() > u_offset.y.abs() {
        (
            u_offset.x,
            std::f32::consts::FRAC_PI_4 * (u_offset.y / u_offset.x),
        )
    } else {
        (
            u_offset.y,
            std::f32::consts::FRAC_PI_2 - std::f32::consts::FRAC_PI_4 * (u_offset.x / u_offset.y),
        )
    };

    na::Point2::new(r * theta.cos(), r * theta.sin())
}

pub fn cosine_sample_hemisphere(u: &na::Point2<f32>) -> na::Vector3<f32> {
    let d = concentric_sample_disk(u);
    let z = 0.0f32.max(1.0 - d.x * d.x - d.y * d.y).sqrt();
    na::Vector3::new(d.x, d.y, z)
}

pub fn cosine_hemisphere_pdf(cos_theta: f32) -> f32 {
    cos_theta * std::f32::consts::FRAC_1_PI
}

pub fn uniform_sample_hemisphere(u: &na::Point2<f32>) -> na::Vector3<f32> {
    let z = u[0];
    let r = 0.0f32.max(1.0 - z * z).sqrt();
    let phi = 2.0 * std::f32::consts::PI * u[1];
    na::Vector3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn uniform_hemisphere_pdf() -> f32 {
    INV_2_PI
}

pub fn uniform_sample_sphere(u: &na::Point2<f32>) -> na::Vector3<f32> {
    let z = 1.0 - 2.0 * u[0];
    let r = 0.0f32.max(1.0 - z * z).sqrt();
    let phi = 2.0 * std::f32::consts::PI * u[1];
    na::Vector3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn uniform_sphere_pdf() -> f32 {
    INV_4_PI
}

/// Direction inside the cone of half angle `acos(cos_theta_max)` around +z.
pub fn uniform_sample_cone(u: &na::Point2<f32>, cos_theta_max: f32) -> na::Vector3<f32> {
    let cos_theta = (1.0 - u[0]) + u[0] * cos_theta_max;
    let sin_theta = 0.0f32.max(1.0 - cos_theta * cos_theta).sqrt();
    let phi = u[1] * 2.0 * std::f32::consts::PI;
    na::Vector3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta)
}

pub fn uniform_cone_pdf(cos_theta_max: f32) -> f32 {
    1.0 / (2.0 * std::f32::consts::PI * (1.0 - cos_theta_max))
}

pub fn stratified_sample_1d(samples: &mut [f32], rng: &mut Random, jitter: bool) {
    let inv_n_samples = 1.0 / samples.len() as f32;
    for (i, sample) in samples.iter_mut().enumerate() {
        let delta = if jitter { uniform_float(rng) } else { 0.5 };
        *sample = ((i as f32 + delta) * inv_n_samples).min(ONE_MINUS_EPSILON);
    }
}

/// Fills `samples` with `nx * ny` jittered strata, stored as interleaved (u, v) pairs.
pub fn stratified_sample_2d(
    samples: &mut [f32],
    nx: usize,
    ny: usize,
    rng: &mut Random,
    jitter: bool,
) {
    debug_assert!(samples.len() >= 2 * nx * ny);
    let dx = 1.0 / nx as f32;
    let dy = 1.0 / ny as f32;
    let mut idx = 0;
    for y in 0..ny {
        for x in 0..nx {
            let jx = if jitter { uniform_float(rng) } else { 0.5 };
            let jy = if jitter { uniform_float(rng) } else { 0.5 };
            samples[idx] = ((x as f32 + jx) * dx).min(ONE_MINUS_EPSILON);
            samples[idx + 1] = ((y as f32 + jy) * dy).min(ONE_MINUS_EPSILON);
            idx += 2;
        }
    }
}

/// Permutes `count` blocks of `n_dimensions` consecutive values.
pub fn shuffle<T>(samples: &mut [T], count: usize, n_dimensions: usize, rng: &mut Random) {
    for i in 0..count {
        let other = i + rng.gen_range(0, count - i);
        for j in 0..n_dimensions {
            samples.swap(n_dimensions * i + j, n_dimensions * other + j);
        }
    }
}

/// Latin hypercube samples, `n_samples` points of `n_dimensions` values each.
pub fn latin_hypercube(
    samples: &mut [f32],
    n_samples: usize,
    n_dimensions: usize,
    rng: &mut Random,
) {
    let delta = 1.0 / n_samples as f32;
    for i in 0..n_samples {
        for j in 0..n_dimensions {
            samples[n_dimensions * i + j] =
                ((i as f32 + uniform_float(rng)) * delta).min(ONE_MINUS_EPSILON);
        }
    }
    for i in 0..n_dimensions {
        for j in 0..n_samples {
            let other = j + rng.gen_range(0, n_samples - j);
            samples.swap(n_dimensions * j + i, n_dimensions * other + i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    #[test]
    fn test_concentric_disk_stays_inside() {
        for &(x, y) in &[(0.0, 0.0), (1.0, 0.5), (0.25, 0.9), (0.5, 0.5)] {
            let d = concentric_sample_disk(&na::Point2::new(x, y));
            assert!(d.coords.norm() <= 1.0 + 1e-6);
        }
        assert_relative_eq!(
            concentric_sample_disk(&na::Point2::new(0.5, 0.5)).coords.norm(),
            0.0
        );
    }

    #[test]
    fn test_cosine_hemisphere_is_upper() {
        let w = cosine_sample_hemisphere(&na::Point2::new(0.3, 0.7));
        assert!(w.z >= 0.0);
        assert_relative_eq!(w.norm(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_stratified_1d_covers_strata() {
        let mut rng = Random::seed_from_u64(7);
        let mut samples = [0.0; 8];
        stratified_sample_1d(&mut samples, &mut rng, true);
        for (i, s) in samples.iter().enumerate() {
            assert!(*s >= i as f32 / 8.0 && *s < (i + 1) as f32 / 8.0);
        }
    }

    #[test]
    fn test_latin_hypercube_one_sample_per_stratum() {
        let mut rng = Random::seed_from_u64(11);
        let n = 16;
        let mut samples = vec![0.0; n * 3];
        latin_hypercube(&mut samples, n, 3, &mut rng);

        for dim in 0..3 {
            let mut strata: Vec<usize> = (0..n)
                .map(|i| (samples[i * 3 + dim] * n as f32) as usize)
                .collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_shuffle_keeps_pairs_together() {
        let mut rng = Random::seed_from_u64(3);
        let mut samples: Vec<f32> = (0..8).map(|i| i as f32).collect();
        shuffle(&mut samples, 4, 2, &mut rng);
        for pair in samples.chunks(2) {
            assert_relative_eq!(pair[1], pair[0] + 1.0);
        }
    }
}
