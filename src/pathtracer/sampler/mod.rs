pub mod lowdiscrepancy;
pub mod pixel;
pub mod random;

use super::{sample::Sample, sampling::Random};
use crate::common::{
    contribution::{ContributionBuffer, ContributionPool},
    film::Film,
};
use ambassador::{delegatable_trait, Delegate};
use pixel::{PixelSampler, PixelSamplerInterface, PixelSamplerKind};
use rand::SeedableRng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub use lowdiscrepancy::{LDSequence, LowDiscrepancySampler};
pub use random::RandomSampler;

/// Marks a work position that has already been consumed by the sampler.
pub const UNSET_SAMPLE_POS: u32 = u32::MAX;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    Random,
    LowDiscrepancy,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SamplerSettings {
    pub kind: SamplerKind,
    pub sequence: LDSequence,
    pub pixel_sampler: PixelSamplerKind,
    pub pixel_samples: u32,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            kind: SamplerKind::LowDiscrepancy,
            sequence: LDSequence::Sobol,
            pixel_sampler: PixelSamplerKind::Linear,
            pixel_samples: 4,
        }
    }
}

/// Work distribution shared by all render threads: hands out pixel positions
/// in order, wrapping at the end of the image.
#[derive(Debug, Default)]
pub struct SamplePosCursor {
    pos: AtomicU32,
}

impl SamplePosCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.pos.store(0, Ordering::SeqCst);
    }

    pub fn position(&self) -> u32 {
        self.pos.load(Ordering::SeqCst)
    }

    /// Returns the current position and moves the cursor forward, modulo `max`.
    pub fn advance(&self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        let prev = self
            .pos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |p| {
                Some(if p + 1 >= max { 0 } else { p + 1 })
            })
            .unwrap_or_else(|p| p);
        prev % max
    }
}

/// State every sampler carries: the image extent, the shared pixel order, the
/// thread's RNG and its contribution buffer.
pub struct SamplerBase {
    pub x_start: i32,
    pub x_end: i32,
    pub y_start: i32,
    pub y_end: i32,
    pub samples_per_pixel: usize,
    pub film: Arc<Film>,
    pub pixel_sampler: Arc<PixelSampler>,
    pub rng: Random,
    local_pos: u32,
    pool: Option<Arc<ContributionPool>>,
    contrib_buffer: Option<ContributionBuffer>,
    log: slog::Logger,
}

impl Clone for SamplerBase {
    // Contribution buffers belong to a single thread and are never shared.
    fn clone(&self) -> Self {
        Self {
            x_start: self.x_start,
            x_end: self.x_end,
            y_start: self.y_start,
            y_end: self.y_end,
            samples_per_pixel: self.samples_per_pixel,
            film: self.film.clone(),
            pixel_sampler: self.pixel_sampler.clone(),
            rng: self.rng.clone(),
            local_pos: self.local_pos,
            pool: self.pool.clone(),
            contrib_buffer: None,
            log: self.log.clone(),
        }
    }
}

impl SamplerBase {
    fn new(
        log: &slog::Logger,
        film: Arc<Film>,
        pixel_sampler: PixelSamplerKind,
        samples_per_pixel: usize,
    ) -> Self {
        let (x_start, x_end, y_start, y_end) = film.sample_extent();
        Self {
            x_start,
            x_end,
            y_start,
            y_end,
            samples_per_pixel: samples_per_pixel.max(1),
            pixel_sampler: Arc::new(PixelSampler::from_kind(
                pixel_sampler,
                x_start,
                x_end,
                y_start,
                y_end,
            )),
            film,
            rng: Random::seed_from_u64(0),
            local_pos: 0,
            pool: None,
            contrib_buffer: None,
            log: log.new(o!("module" => "sampler")),
        }
    }

    /// Next pixel to sample, consuming `use_pos` when it holds a position.
    /// `None` once the film holds enough samples.
    fn next_pixel(&mut self, use_pos: &mut u32) -> Option<(i32, i32)> {
        if self.film.enough_samples() {
            debug!(self.log, "enough samples per pixel, stopping");
            return None;
        }
        let pos = if *use_pos != UNSET_SAMPLE_POS {
            let pos = *use_pos;
            *use_pos = UNSET_SAMPLE_POS;
            pos
        } else {
            let pos = self.local_pos;
            self.local_pos = self.local_pos.wrapping_add(1);
            pos
        };
        Some(self.pixel_sampler.pixel(pos))
    }

    fn add_sample(&mut self, sample: &mut Sample) {
        self.film.add_sample_count(1);
        let pool = match &self.pool {
            Some(pool) => pool,
            None => {
                sample.contributions.clear();
                return;
            }
        };
        let mut buffer = self.contrib_buffer.take().unwrap_or_else(|| pool.get());
        for contrib in sample.contributions.drain(..) {
            if !buffer.add(contrib) {
                buffer = pool.next(buffer);
                buffer.add(contrib);
            }
        }
        self.contrib_buffer = Some(buffer);
    }

    fn cleanup(&mut self) {
        if let (Some(pool), Some(buffer)) = (&self.pool, self.contrib_buffer.take()) {
            pool.end(buffer);
        }
    }
}

#[delegatable_trait]
pub trait SamplerInterface {
    fn base(&self) -> &SamplerBase;

    fn base_mut(&mut self) -> &mut SamplerBase;

    /// Sizes the per sample tables once the integrator has declared its slots.
    fn init_sample(&mut self, sample: &mut Sample);

    /// Fills `sample` with the next set of variates. `use_pos` carries the
    /// shared work position and is reset to `UNSET_SAMPLE_POS` when consumed.
    fn get_next_sample(&mut self, sample: &mut Sample, use_pos: &mut u32) -> bool;

    /// Values of xD slot `num` for path vertex `pos`, generated on first use.
    fn get_lazy_values<'a>(&mut self, sample: &'a mut Sample, num: usize, pos: usize)
        -> &'a [f32];

    fn get_one_d(&self, sample: &Sample, num: usize, pos: usize) -> f32 {
        sample.one_d[num][pos]
    }

    fn get_two_d(&self, sample: &Sample, num: usize, pos: usize) -> [f32; 2] {
        [sample.two_d[num][2 * pos], sample.two_d[num][2 * pos + 1]]
    }

    fn get_total_sample_pos(&self) -> u32 {
        self.base().pixel_sampler.total_pixels()
    }

    fn round_size(&self, size: usize) -> usize {
        size
    }
}

#[derive(Delegate, Clone)]
#[delegate(SamplerInterface)]
pub enum Sampler {
    Random(RandomSampler),
    LowDiscrepancy(LowDiscrepancySampler),
}

impl Sampler {
    pub fn from_settings(log: &slog::Logger, settings: &SamplerSettings, film: Arc<Film>) -> Self {
        match settings.kind {
            SamplerKind::Random => Sampler::Random(RandomSampler::new(
                log,
                film,
                settings.pixel_sampler,
                settings.pixel_samples as usize,
            )),
            SamplerKind::LowDiscrepancy => Sampler::LowDiscrepancy(LowDiscrepancySampler::new(
                log,
                film,
                settings.pixel_sampler,
                settings.pixel_samples as usize,
                settings.sequence,
            )),
        }
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.base_mut().rng = Random::seed_from_u64(seed);
    }

    pub fn set_contribution_pool(&mut self, pool: Arc<ContributionPool>) {
        self.base_mut().pool = Some(pool);
    }

    /// Pushes the contributions gathered by `sample` towards the film.
    pub fn add_sample(&mut self, sample: &mut Sample) {
        self.base_mut().add_sample(sample);
    }

    /// Returns the thread's partially filled buffer to the pool.
    pub fn cleanup(&mut self) {
        self.base_mut().cleanup();
    }

    pub fn film(&self) -> &Arc<Film> {
        &self.base().film
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::common::film::FilmSettings;
    use crate::common::spectrum::XYZColor;
    use std::collections::HashSet;

    pub(crate) fn test_film(x: u32, y: u32, halt_spp: u32) -> Arc<Film> {
        let log = slog::Logger::root(slog::Discard, o!());
        let mut settings = FilmSettings::with_resolution(x, y);
        settings.halt_spp = halt_spp;
        let film = Arc::new(Film::new(&log, &settings));
        film.request_buffer("eye");
        film.request_buffer_groups(&["default".to_owned()]);
        film.create_buffers();
        film
    }

    fn samplers(film: &Arc<Film>) -> Vec<Sampler> {
        let log = slog::Logger::root(slog::Discard, o!());
        [SamplerKind::Random, SamplerKind::LowDiscrepancy]
            .iter()
            .map(|kind| {
                let settings = SamplerSettings {
                    kind: *kind,
                    ..Default::default()
                };
                Sampler::from_settings(&log, &settings, film.clone())
            })
            .collect()
    }

    #[test]
    fn test_cursor_wraps() {
        let cursor = SamplePosCursor::new();
        let got: Vec<u32> = (0..7).map(|_| cursor.advance(3)).collect();
        assert_eq!(got, vec![0, 1, 2, 0, 1, 2, 0]);
        cursor.reset();
        assert_eq!(cursor.advance(3), 0);
        assert_eq!(cursor.advance(0), 0);
    }

    #[test]
    fn test_cursor_shared_between_threads() {
        let cursor = Arc::new(SamplePosCursor::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cursor = cursor.clone();
                std::thread::spawn(move || (0..100).map(|_| cursor.advance(1000)).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            for pos in h.join().unwrap() {
                assert!(seen.insert(pos));
            }
        }
        assert_eq!(seen.len(), 400);
    }

    #[test]
    fn test_samples_stay_inside_pixel() {
        let film = test_film(8, 4, 0);
        for mut sampler in samplers(&film) {
            sampler.set_seed(11);
            let mut sample = Sample::new();
            let one = sample.add_1d(2);
            let two = sample.add_2d(3);
            sampler.init_sample(&mut sample);

            let mut use_pos = 5;
            let spp = sampler.base().samples_per_pixel;
            for i in 0..spp {
                assert!(sampler.get_next_sample(&mut sample, &mut use_pos));
                assert_eq!(use_pos, UNSET_SAMPLE_POS, "position consumed on first sample {}", i);
                assert!(sample.image_x >= 5.0 && sample.image_x < 6.0);
                assert!(sample.image_y >= 0.0 && sample.image_y < 1.0);
                for v in &[sample.lens_u, sample.lens_v, sample.time, sample.wavelengths] {
                    assert!(*v >= 0.0 && *v < 1.0);
                }
                let u = sampler.get_one_d(&sample, one, 1);
                assert!((0.0..1.0).contains(&u));
                let [u0, u1] = sampler.get_two_d(&sample, two, 2);
                assert!((0.0..1.0).contains(&u0) && (0.0..1.0).contains(&u1));
            }
            // next pixel comes from the sampler's own counter once the position is spent
            assert!(sampler.get_next_sample(&mut sample, &mut use_pos));
            assert!(sample.image_x < 1.0 && sample.image_y < 1.0);
        }
    }

    #[test]
    fn test_lazy_values_are_stable_within_a_sample() {
        let film = test_film(4, 4, 0);
        for mut sampler in samplers(&film) {
            let mut sample = Sample::new();
            let xd = sample.add_xd(&[2, 1, 2], 4);
            sampler.init_sample(&mut sample);
            let mut use_pos = 0;
            assert!(sampler.get_next_sample(&mut sample, &mut use_pos));

            let first = sampler.get_lazy_values(&mut sample, xd, 2).to_vec();
            assert_eq!(first.len(), 5);
            assert!(first.iter().all(|v| (0.0..1.0).contains(v)));
            let again = sampler.get_lazy_values(&mut sample, xd, 2).to_vec();
            assert_eq!(first, again);

            assert!(sampler.get_next_sample(&mut sample, &mut use_pos));
            let next = sampler.get_lazy_values(&mut sample, xd, 2).to_vec();
            assert_ne!(first, next);
        }
    }

    #[test]
    fn test_halts_when_film_has_enough_samples() {
        let film = test_film(2, 2, 1);
        for mut sampler in samplers(&film) {
            let mut sample = Sample::new();
            sampler.init_sample(&mut sample);
            let mut use_pos = UNSET_SAMPLE_POS;
            let mut taken = 0;
            while sampler.get_next_sample(&mut sample, &mut use_pos) {
                sampler.add_sample(&mut sample);
                taken += 1;
                assert!(taken <= 64);
            }
            assert!(film.enough_samples());
        }
    }

    #[test]
    fn test_add_sample_forwards_contributions() {
        let film = test_film(4, 4, 0);
        let log = slog::Logger::root(slog::Discard, o!());
        let pool = Arc::new(ContributionPool::new(&log, film.clone()));
        let mut sampler = samplers(&film).remove(0);
        sampler.set_contribution_pool(pool.clone());

        let mut sample = Sample::new();
        sampler.init_sample(&mut sample);
        let mut use_pos = 0;
        assert!(sampler.get_next_sample(&mut sample, &mut use_pos));
        sample.add_contribution(1.5, 1.5, XYZColor::new(1.0, 1.0, 1.0), 1.0, 1.0, 0.0, 0, 0);
        sampler.add_sample(&mut sample);
        assert!(sample.contributions.is_empty());
        assert_eq!(film.num_samples(), 1);

        // a clone starts without the original's buffer
        let mut clone = sampler.clone();
        clone.cleanup();
        assert_eq!(pool.splatted(), 0);

        sampler.cleanup();
        pool.flush();
        assert_eq!(pool.splatted(), 1);
    }
}
