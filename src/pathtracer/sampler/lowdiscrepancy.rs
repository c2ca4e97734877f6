use super::{pixel::PixelSamplerKind, SamplerBase, SamplerInterface};
use crate::common::film::Film;
use crate::pathtracer::{
    lowdiscrepancy::{
        halton_shuffle_scrambled_1d, halton_shuffle_scrambled_2d, ld_shuffle_scrambled_1d,
        ld_shuffle_scrambled_2d,
    },
    sample::Sample,
    sampling::Random,
};
use std::sync::Arc;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LDSequence {
    /// Scrambled (0, 2) sequence: van der Corput and Sobol.
    Sobol,
    /// Scrambled folded Halton, bases 2 and 3.
    Halton,
}

impl Default for LDSequence {
    fn default() -> Self {
        LDSequence::Sobol
    }
}

impl LDSequence {
    fn fill_1d(self, rng: &mut Random, n_samples: usize, n_pixel: usize, samples: &mut [f32]) {
        match self {
            LDSequence::Sobol => ld_shuffle_scrambled_1d(rng, n_samples, n_pixel, samples),
            LDSequence::Halton => halton_shuffle_scrambled_1d(rng, n_samples, n_pixel, samples),
        }
    }

    fn fill_2d(self, rng: &mut Random, n_samples: usize, n_pixel: usize, samples: &mut [f32]) {
        match self {
            LDSequence::Sobol => ld_shuffle_scrambled_2d(rng, n_samples, n_pixel, samples),
            LDSequence::Halton => halton_shuffle_scrambled_2d(rng, n_samples, n_pixel, samples),
        }
    }
}

/// Stratifies every dimension over the samples of one pixel with a scrambled
/// low discrepancy sequence. Tables are regenerated on every new pixel; xD
/// tables only when the integrator first asks for them.
#[derive(Clone)]
pub struct LowDiscrepancySampler {
    base: SamplerBase,
    sequence: LDSequence,
    x_pos: i32,
    y_pos: i32,
    /// Index of the next sample inside the current pixel.
    sample_pos: usize,
    image_samples: Vec<f32>,
    lens_samples: Vec<f32>,
    time_samples: Vec<f32>,
    wavelength_samples: Vec<f32>,
    n1d: Vec<usize>,
    n2d: Vec<usize>,
    sxd: Vec<Vec<usize>>,
    one_d: Vec<Vec<f32>>,
    two_d: Vec<Vec<f32>>,
    xd: Vec<Vec<Vec<f32>>>,
}

impl LowDiscrepancySampler {
    pub fn new(
        log: &slog::Logger,
        film: Arc<Film>,
        pixel_sampler: PixelSamplerKind,
        pixel_samples: usize,
        sequence: LDSequence,
    ) -> Self {
        let pixel_samples = pixel_samples.max(1).next_power_of_two();
        let base = SamplerBase::new(log, film, pixel_sampler, pixel_samples);
        Self {
            image_samples: vec![0.0; 2 * pixel_samples],
            lens_samples: vec![0.0; 2 * pixel_samples],
            time_samples: vec![0.0; pixel_samples],
            wavelength_samples: vec![0.0; pixel_samples],
            sample_pos: pixel_samples,
            base,
            sequence,
            x_pos: 0,
            y_pos: 0,
            n1d: Vec::new(),
            n2d: Vec::new(),
            sxd: Vec::new(),
            one_d: Vec::new(),
            two_d: Vec::new(),
            xd: Vec::new(),
        }
    }

    fn start_pixel(&mut self) {
        let spp = self.base.samples_per_pixel;
        let rng = &mut self.base.rng;
        self.sequence.fill_2d(rng, 1, spp, &mut self.image_samples);
        self.sequence.fill_2d(rng, 1, spp, &mut self.lens_samples);
        self.sequence.fill_1d(rng, 1, spp, &mut self.time_samples);
        self.sequence.fill_1d(rng, 1, spp, &mut self.wavelength_samples);
        for (n, table) in self.n1d.iter().zip(self.one_d.iter_mut()) {
            self.sequence.fill_1d(rng, *n, spp, table);
        }
        for (n, table) in self.n2d.iter().zip(self.two_d.iter_mut()) {
            self.sequence.fill_2d(rng, *n, spp, table);
        }
        for tables in self.xd.iter_mut() {
            for table in tables.iter_mut() {
                table.clear();
            }
        }
    }

    /// Builds the table of xD slot `num` at vertex `pos` for every sample of
    /// the pixel, components interleaved per sample.
    fn fill_xd(&mut self, num: usize, pos: usize) {
        let spp = self.base.samples_per_pixel;
        let structure = &self.sxd[num];
        let dim: usize = structure.iter().sum();
        let table = &mut self.xd[num][pos];
        table.resize(spp * dim, 0.0);

        let mut offset = 0;
        let mut scratch = Vec::new();
        for &size in structure {
            scratch.resize(size * spp, 0.0);
            if size == 2 {
                self.sequence.fill_2d(&mut self.base.rng, 1, spp, &mut scratch);
            } else {
                self.sequence.fill_1d(&mut self.base.rng, size, spp, &mut scratch);
            }
            for s in 0..spp {
                table[s * dim + offset..s * dim + offset + size]
                    .copy_from_slice(&scratch[s * size..(s + 1) * size]);
            }
            offset += size;
        }
    }
}

impl SamplerInterface for LowDiscrepancySampler {
    fn base(&self) -> &SamplerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SamplerBase {
        &mut self.base
    }

    fn init_sample(&mut self, sample: &mut Sample) {
        let spp = self.base.samples_per_pixel;
        self.n1d = sample.n1d.clone();
        self.n2d = sample.n2d.clone();
        self.sxd = sample.sxd.clone();
        self.one_d = self.n1d.iter().map(|n| vec![0.0; n * spp]).collect();
        self.two_d = self.n2d.iter().map(|n| vec![0.0; 2 * n * spp]).collect();
        self.xd = sample.nxd.iter().map(|n| vec![Vec::new(); *n]).collect();
        sample.allocate();
        // force new tables for the new layout
        self.sample_pos = spp;
    }

    fn get_next_sample(&mut self, sample: &mut Sample, use_pos: &mut u32) -> bool {
        if self.sample_pos >= self.base.samples_per_pixel {
            match self.base.next_pixel(use_pos) {
                Some((x, y)) => {
                    self.x_pos = x;
                    self.y_pos = y;
                    self.sample_pos = 0;
                }
                None => return false,
            }
            self.start_pixel();
        }

        let sp = self.sample_pos;
        sample.image_x = self.x_pos as f32 + self.image_samples[2 * sp];
        sample.image_y = self.y_pos as f32 + self.image_samples[2 * sp + 1];
        sample.lens_u = self.lens_samples[2 * sp];
        sample.lens_v = self.lens_samples[2 * sp + 1];
        sample.time = self.time_samples[sp];
        sample.wavelengths = self.wavelength_samples[sp];
        for (i, n) in self.n1d.iter().enumerate() {
            sample.one_d[i].copy_from_slice(&self.one_d[i][sp * n..(sp + 1) * n]);
        }
        for (i, n) in self.n2d.iter().enumerate() {
            sample.two_d[i].copy_from_slice(&self.two_d[i][2 * sp * n..2 * (sp + 1) * n]);
        }
        sample.stamp = sample.stamp.wrapping_add(1);

        self.sample_pos += 1;
        true
    }

    fn get_lazy_values<'a>(
        &mut self,
        sample: &'a mut Sample,
        num: usize,
        pos: usize,
    ) -> &'a [f32] {
        let dim = sample.dxd[num];
        let start = pos * dim;
        if sample.xd_stamp[num][pos] != sample.stamp {
            if self.xd[num][pos].is_empty() {
                self.fill_xd(num, pos);
            }
            let sp = self.sample_pos.saturating_sub(1);
            sample.xd[num][start..start + dim]
                .copy_from_slice(&self.xd[num][pos][sp * dim..(sp + 1) * dim]);
            sample.xd_stamp[num][pos] = sample.stamp;
        }
        &sample.xd[num][start..start + dim]
    }

    fn round_size(&self, size: usize) -> usize {
        size.next_power_of_two()
    }
}
