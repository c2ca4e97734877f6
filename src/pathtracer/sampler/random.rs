use super::{pixel::PixelSamplerKind, SamplerBase, SamplerInterface};
use crate::common::film::Film;
use crate::pathtracer::{sample::Sample, sampling::uniform_float};
use std::sync::Arc;

/// Independent uniform variates for every dimension.
#[derive(Clone)]
pub struct RandomSampler {
    base: SamplerBase,
    x_pos: i32,
    y_pos: i32,
    sample_pos: usize,
}

impl RandomSampler {
    pub fn new(
        log: &slog::Logger,
        film: Arc<Film>,
        pixel_sampler: PixelSamplerKind,
        pixel_samples: usize,
    ) -> Self {
        let base = SamplerBase::new(log, film, pixel_sampler, pixel_samples);
        Self {
            sample_pos: base.samples_per_pixel,
            base,
            x_pos: 0,
            y_pos: 0,
        }
    }
}

impl SamplerInterface for RandomSampler {
    fn base(&self) -> &SamplerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SamplerBase {
        &mut self.base
    }

    fn init_sample(&mut self, sample: &mut Sample) {
        sample.allocate();
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
        }

        let rng = &mut self.base.rng;
        sample.image_x = self.x_pos as f32 + uniform_float(rng);
        sample.image_y = self.y_pos as f32 + uniform_float(rng);
        sample.lens_u = uniform_float(rng);
        sample.lens_v = uniform_float(rng);
        sample.time = uniform_float(rng);
        sample.wavelengths = uniform_float(rng);
        for table in sample.one_d.iter_mut().chain(sample.two_d.iter_mut()) {
            for v in table.iter_mut() {
                *v = uniform_float(rng);
            }
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
            for v in sample.xd[num][start..start + dim].iter_mut() {
                *v = uniform_float(&mut self.base.rng);
            }
            sample.xd_stamp[num][pos] = sample.stamp;
        }
        &sample.xd[num][start..start + dim]
    }
}
