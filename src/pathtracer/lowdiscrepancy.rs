//! Deterministic low discrepancy sequences.
//!
//! Every generator is a pure function of the sample index and a scramble
//! value; the `*_shuffle_scrambled_*` helpers draw their scrambles and
//! permutations from the supplied RNG only.

use super::sampling::{shuffle, Random};
use crate::common::math::ONE_MINUS_EPSILON;
use rand::Rng;

const INV_2_32: f64 = 1.0 / 4294967296.0;

fn to_unit(bits: u32) -> f32 {
    ((bits as f64 * INV_2_32) as f32).min(ONE_MINUS_EPSILON)
}

pub fn radical_inverse(mut n: u32, base: u32) -> f64 {
    let inv_base = 1.0 / base as f64;
    let mut inv_bi = inv_base;
    let mut val = 0.0;
    while n > 0 {
        let d_i = n % base;
        val += d_i as f64 * inv_bi;
        n /= base;
        inv_bi *= inv_base;
    }
    val
}

/// Radical inverse with each digit offset by its position, avoiding the
/// correlation of plain Halton in the low dimensions.
pub fn folded_radical_inverse(mut n: u32, base: u32) -> f64 {
    let inv_base = 1.0 / base as f64;
    let mut inv_bi = inv_base;
    let mut val = 0.0;
    let mut mod_offset = 0u32;
    while val + base as f64 * inv_bi != val {
        let digit = n.wrapping_add(mod_offset) % base;
        val += digit as f64 * inv_bi;
        n /= base;
        inv_bi *= inv_base;
        mod_offset += 1;
    }
    val
}

pub fn van_der_corput(n: u32, scramble: u32) -> f32 {
    to_unit(n.reverse_bits() ^ scramble)
}

pub fn sobol2(mut n: u32, mut scramble: u32) -> f32 {
    let mut v = 1u32 << 31;
    while n != 0 {
        if n & 1 != 0 {
            scramble ^= v;
        }
        n >>= 1;
        v ^= v >> 1;
    }
    to_unit(scramble)
}

pub fn larcher_pillichshammer2(mut n: u32, mut scramble: u32) -> f32 {
    let mut v = 1u32 << 31;
    while n != 0 {
        if n & 1 != 0 {
            scramble ^= v;
        }
        n >>= 1;
        v |= v >> 1;
    }
    to_unit(scramble)
}

fn scrambled_folded(n: u32, base: u32, scramble: u32) -> f32 {
    let s = folded_radical_inverse(n, base);
    let bits = (s * 4294967296.0) as u64 as u32;
    to_unit(bits ^ scramble)
}

/// Folded base 2 Halton value.
pub fn halton(n: u32, scramble: u32) -> f32 {
    scrambled_folded(n, 2, scramble)
}

/// Folded base 3 Halton value.
pub fn halton2(n: u32, scramble: u32) -> f32 {
    scrambled_folded(n, 3, scramble)
}

pub fn sample_halton(n: u32, scramble: &[u32; 2]) -> [f32; 2] {
    [halton(n, scramble[0]), halton2(n, scramble[1])]
}

pub fn sample_02(n: u32, scramble: &[u32; 2]) -> [f32; 2] {
    [van_der_corput(n, scramble[0]), sobol2(n, scramble[1])]
}

fn shuffle_scrambled(
    rng: &mut Random,
    n_samples: usize,
    n_pixel: usize,
    dims: usize,
    samples: &mut [f32],
) {
    for i in 0..n_pixel {
        let start = i * n_samples * dims;
        shuffle(
            &mut samples[start..start + n_samples * dims],
            n_samples,
            dims,
            rng,
        );
    }
    shuffle(samples, n_pixel, n_samples * dims, rng);
}

pub fn ld_shuffle_scrambled_1d(
    rng: &mut Random,
    n_samples: usize,
    n_pixel: usize,
    samples: &mut [f32],
) {
    let scramble = rng.gen::<u32>();
    for (i, s) in samples[..n_samples * n_pixel].iter_mut().enumerate() {
        *s = van_der_corput(i as u32, scramble);
    }
    shuffle_scrambled(rng, n_samples, n_pixel, 1, samples);
}

pub fn ld_shuffle_scrambled_2d(
    rng: &mut Random,
    n_samples: usize,
    n_pixel: usize,
    samples: &mut [f32],
) {
    let scramble = [rng.gen::<u32>(), rng.gen::<u32>()];
    for i in 0..n_samples * n_pixel {
        let s = sample_02(i as u32, &scramble);
        samples[2 * i] = s[0];
        samples[2 * i + 1] = s[1];
    }
    shuffle_scrambled(rng, n_samples, n_pixel, 2, samples);
}

pub fn halton_shuffle_scrambled_1d(
    rng: &mut Random,
    n_samples: usize,
    n_pixel: usize,
    samples: &mut [f32],
) {
    let scramble = rng.gen::<u32>();
    for (i, s) in samples[..n_samples * n_pixel].iter_mut().enumerate() {
        *s = halton(i as u32, scramble);
    }
    shuffle_scrambled(rng, n_samples, n_pixel, 1, samples);
}

pub fn halton_shuffle_scrambled_2d(
    rng: &mut Random,
    n_samples: usize,
    n_pixel: usize,
    samples: &mut [f32],
) {
    let scramble = [rng.gen::<u32>(), rng.gen::<u32>()];
    for i in 0..n_samples * n_pixel {
        let s = sample_halton(i as u32, &scramble);
        samples[2 * i] = s[0];
        samples[2 * i + 1] = s[1];
    }
    shuffle_scrambled(rng, n_samples, n_pixel, 2, samples);
}

pub fn generate_permutation(base: u32, rng: &mut Random) -> Vec<u32> {
    let mut buf: Vec<u32> = (0..base).collect();
    shuffle(&mut buf, base as usize, 1, rng);
    buf
}

pub fn permuted_radical_inverse(mut n: u32, base: u32, p: &[u32]) -> f64 {
    let inv_base = 1.0 / base as f64;
    let mut inv_bi = inv_base;
    let mut val = 0.0;
    while n > 0 {
        let d_i = p[(n % base) as usize];
        val += d_i as f64 * inv_bi;
        n /= base;
        inv_bi *= inv_base;
    }
    val
}

fn first_primes(count: usize) -> Vec<u32> {
    let mut primes: Vec<u32> = Vec::with_capacity(count);
    let mut candidate = 2u32;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

/// Halton points with a random digit permutation per dimension.
#[derive(Clone, Debug)]
pub struct PermutedHalton {
    bases: Vec<u32>,
    permute: Vec<u32>,
}

impl PermutedHalton {
    pub fn new(dims: usize, rng: &mut Random) -> Self {
        let bases = first_primes(dims);
        let mut permute = Vec::with_capacity(bases.iter().map(|&b| b as usize).sum());
        for &b in &bases {
            permute.extend(generate_permutation(b, rng));
        }
        Self { bases, permute }
    }

    pub fn dimensions(&self) -> usize {
        self.bases.len()
    }

    pub fn sample(&self, n: u32, out: &mut [f32]) {
        let mut offset = 0;
        for (i, &b) in self.bases.iter().enumerate() {
            let p = &self.permute[offset..offset + b as usize];
            out[i] = (permuted_radical_inverse(n, b, p) as f32).min(ONE_MINUS_EPSILON);
            offset += b as usize;
        }
    }
}
