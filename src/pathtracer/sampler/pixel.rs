use ambassador::{delegatable_trait, Delegate};
use rand::{seq::SliceRandom, SeedableRng};

use crate::pathtracer::sampling::Random;

const TILE_SIZE: i32 = 32;

/// Order in which image pixels are visited. Maps a work position in
/// `0..total_pixels()` to a raster pixel and holds no mutable state, so every
/// sampler clone can share one instance.
#[delegatable_trait]
pub trait PixelSamplerInterface {
    fn total_pixels(&self) -> u32;
    fn pixel(&self, pos: u32) -> (i32, i32);
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PixelSamplerKind {
    Linear,
    Tile,
    Random,
}

impl Default for PixelSamplerKind {
    fn default() -> Self {
        PixelSamplerKind::Linear
    }
}

#[derive(Delegate, Debug)]
#[delegate(PixelSamplerInterface)]
pub enum PixelSampler {
    Linear(LinearPixelSampler),
    Tile(TilePixelSampler),
    Random(RandomPixelSampler),
}

impl PixelSampler {
    pub fn from_kind(kind: PixelSamplerKind, x_start: i32, x_end: i32, y_start: i32, y_end: i32) -> Self {
        match kind {
            PixelSamplerKind::Linear => {
                PixelSampler::Linear(LinearPixelSampler::new(x_start, x_end, y_start, y_end))
            }
            PixelSamplerKind::Tile => {
                PixelSampler::Tile(TilePixelSampler::new(x_start, x_end, y_start, y_end))
            }
            PixelSamplerKind::Random => {
                PixelSampler::Random(RandomPixelSampler::new(x_start, x_end, y_start, y_end))
            }
        }
    }
}

/// Scanline order.
#[derive(Debug)]
pub struct LinearPixelSampler {
    x_start: i32,
    y_start: i32,
    x_count: i32,
    total: u32,
}

impl LinearPixelSampler {
    pub fn new(x_start: i32, x_end: i32, y_start: i32, y_end: i32) -> Self {
        let x_count = (x_end - x_start).max(0);
        let y_count = (y_end - y_start).max(0);
        Self {
            x_start,
            y_start,
            x_count,
            total: (x_count * y_count) as u32,
        }
    }
}

impl PixelSamplerInterface for LinearPixelSampler {
    fn total_pixels(&self) -> u32 {
        self.total
    }

    fn pixel(&self, pos: u32) -> (i32, i32) {
        let pos = (pos % self.total.max(1)) as i32;
        let x_count = self.x_count.max(1);
        (self.x_start + pos % x_count, self.y_start + pos / x_count)
    }
}

/// Square tiles in scanline order, scanline order inside each tile.
#[derive(Debug)]
pub struct TilePixelSampler {
    pixels: Vec<(i32, i32)>,
}

impl TilePixelSampler {
    pub fn new(x_start: i32, x_end: i32, y_start: i32, y_end: i32) -> Self {
        let mut pixels = Vec::new();
        for ty in (y_start..y_end).step_by(TILE_SIZE as usize) {
            for tx in (x_start..x_end).step_by(TILE_SIZE as usize) {
                for y in ty..(ty + TILE_SIZE).min(y_end) {
                    for x in tx..(tx + TILE_SIZE).min(x_end) {
                        pixels.push((x, y));
                    }
                }
            }
        }
        Self { pixels }
    }
}

impl PixelSamplerInterface for TilePixelSampler {
    fn total_pixels(&self) -> u32 {
        self.pixels.len() as u32
    }

    fn pixel(&self, pos: u32) -> (i32, i32) {
        if self.pixels.is_empty() {
            return (0, 0);
        }
        self.pixels[pos as usize % self.pixels.len()]
    }
}

/// Fixed pseudo random permutation of the image.
#[derive(Debug)]
pub struct RandomPixelSampler {
    pixels: Vec<(i32, i32)>,
}

impl RandomPixelSampler {
    pub fn new(x_start: i32, x_end: i32, y_start: i32, y_end: i32) -> Self {
        let mut pixels: Vec<(i32, i32)> = (y_start..y_end)
            .flat_map(|y| (x_start..x_end).map(move |x| (x, y)))
            .collect();
        let mut rng = Random::seed_from_u64(pixels.len() as u64);
        pixels.shuffle(&mut rng);
        Self { pixels }
    }
}

impl PixelSamplerInterface for RandomPixelSampler {
    fn total_pixels(&self) -> u32 {
        self.pixels.len() as u32
    }

    fn pixel(&self, pos: u32) -> (i32, i32) {
        if self.pixels.is_empty() {
            return (0, 0);
        }
        self.pixels[pos as usize % self.pixels.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn visits_every_pixel_once(sampler: &PixelSampler) {
        let seen: HashSet<(i32, i32)> = (0..sampler.total_pixels()).map(|p| sampler.pixel(p)).collect();
        assert_eq!(seen.len(), sampler.total_pixels() as usize);
        for (x, y) in seen {
            assert!((0..70).contains(&x) && (0..45).contains(&y));
        }
    }

    #[test]
    fn test_pixel_samplers_cover_image() {
        for kind in &[PixelSamplerKind::Linear, PixelSamplerKind::Tile, PixelSamplerKind::Random] {
            let sampler = PixelSampler::from_kind(*kind, 0, 70, 0, 45);
            assert_eq!(sampler.total_pixels(), 70 * 45);
            visits_every_pixel_once(&sampler);
        }
    }

    #[test]
    fn test_linear_order_and_wrap() {
        let sampler = PixelSampler::from_kind(PixelSamplerKind::Linear, 0, 4, 0, 3);
        assert_eq!(sampler.pixel(0), (0, 0));
        assert_eq!(sampler.pixel(5), (1, 1));
        assert_eq!(sampler.pixel(12), (0, 0));
    }

    #[test]
    fn test_tile_order() {
        let sampler = PixelSampler::from_kind(PixelSamplerKind::Tile, 0, 40, 0, 40);
        assert_eq!(sampler.pixel(31), (31, 0));
        assert_eq!(sampler.pixel(32), (0, 1));
        assert_eq!(sampler.pixel(32 * 32), (32, 0));
    }
}
