pub const INV_PI: f32 = std::f32::consts::FRAC_1_PI;
pub const INV_2_PI: f32 = std::f32::consts::FRAC_1_PI * 0.5;
pub const INV_4_PI: f32 = std::f32::consts::FRAC_1_PI * 0.25;

pub const ONE_MINUS_EPSILON: f32 = hexf32!("0x1.fffffep-1");

pub fn lerp(t: f32, a: f32, b: f32) -> f32 {
    (1.0 - t) * a + t * b
}

pub fn face_forward<T: na::RealField + num::FromPrimitive>(
    n: &na::Vector3<T>,
    v: &na::Vector3<T>,
) -> na::Vector3<T> {
    if n.dot(v) < na::zero() {
        -n
    } else {
        n.clone()
    }
}

/// Builds an orthonormal basis around `v1`, which must be normalized.
pub fn coordinate_system<T: na::RealField + num::FromPrimitive>(
    v1: &na::Vector3<T>,
    v2: &mut na::Vector3<T>,
    v3: &mut na::Vector3<T>,
) {
    let zero: T = na::zero();
    if v1.x.clone().abs() > v1.y.clone().abs() {
        *v2 = na::Vector3::new(-v1.z.clone(), zero, v1.x.clone())
            / (v1.x.clone() * v1.x.clone() + v1.z.clone() * v1.z.clone()).sqrt();
    } else {
        *v2 = na::Vector3::new(zero, v1.z.clone(), -v1.y.clone())
            / (v1.y.clone() * v1.y.clone() + v1.z.clone() * v1.z.clone()).sqrt();
    }
    *v3 = v1.cross(v2);
}

pub fn gamma_correct(value: f32) -> f32 {
    if value <= 0.0031308f32 {
        return 12.92 * value;
    }

    1.055 * value.powf(1.0 / 2.4) - 0.055
}

pub fn inverse_gamma_correct(value: f32) -> f32 {
    if value <= 0.04045 {
        return value * 1.0 / 12.92;
    }

    ((value + 0.055) * 1.0 / 1.055).powf(2.4)
}

pub fn power_heuristic(nf: i32, f_pdf: f32, ng: i32, g_pdf: f32) -> f32 {
    let f = nf as f32 * f_pdf;
    let g = ng as f32 * g_pdf;
    if f == 0.0 && g == 0.0 {
        return 0.0;
    }
    (f * f) / (f * f + g * g)
}

pub fn balance_heuristic(nf: i32, f_pdf: f32, ng: i32, g_pdf: f32) -> f32 {
    let f = nf as f32 * f_pdf;
    let g = ng as f32 * g_pdf;
    if f == 0.0 && g == 0.0 {
        return 0.0;
    }
    f / (f + g)
}

pub fn spherical_theta(v: &na::Vector3<f32>) -> f32 {
    v.z.clamp(-1.0, 1.0).acos()
}

pub fn spherical_phi(v: &na::Vector3<f32>) -> f32 {
    let p = v.y.atan2(v.x);
    if p < 0.0 {
        p + 2.0 * std::f32::consts::PI
    } else {
        p
    }
}

pub fn spherical_direction(sin_theta: f32, cos_theta: f32, phi: f32) -> na::Vector3<f32> {
    na::Vector3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Largest index in `[0, size - 2]` for which `pred` holds.
pub fn find_interval<T: Fn(usize) -> bool>(size: usize, pred: T) -> usize {
    let mut first = 0;
    let mut len = size;

    while len > 0 {
        let half = len >> 1;
        let middle = first + half;
        if pred(middle) {
            first = middle + 1;
            len -= half + 1;
        } else {
            len = half;
        }
    }

    (first.max(1) - 1).min(size.max(2) - 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_coordinate_system() {
        let v1 = na::Vector3::new(0.3f32, -0.5, 0.8).normalize();
        let mut v2 = na::Vector3::zeros();
        let mut v3 = na::Vector3::zeros();
        coordinate_system(&v1, &mut v2, &mut v3);

        assert_relative_eq!(v1.dot(&v2), 0.0, epsilon = 1e-6);
        assert_relative_eq!(v1.dot(&v3), 0.0, epsilon = 1e-6);
        assert_relative_eq!(v2.dot(&v3), 0.0, epsilon = 1e-6);
        assert_relative_eq!(v2.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(v3.norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_find_interval() {
        let nodes = [0.0f32, 1.0, 2.0, 3.0];
        assert_eq!(find_interval(nodes.len(), |i| nodes[i] <= 1.5), 1);
        assert_eq!(find_interval(nodes.len(), |i| nodes[i] <= -1.0), 0);
        assert_eq!(find_interval(nodes.len(), |i| nodes[i] <= 10.0), 2);
    }

    #[test]
    fn test_gamma_round_trip() {
        for &v in &[0.0f32, 0.001, 0.2, 0.5, 1.0] {
            assert_relative_eq!(inverse_gamma_correct(gamma_correct(v)), v, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_power_heuristic_degenerate() {
        assert_eq!(power_heuristic(1, 0.0, 1, 0.0), 0.0);
        assert_relative_eq!(power_heuristic(1, 1.0, 1, 1.0), 0.5);
    }
}
