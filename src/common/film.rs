use super::color::{ClampMethod, ColorSystem};
use super::contribution::Contribution;
use super::filter::{Filter, FilterInterface, FilterKind};
use super::math::gamma_correct;
use super::spectrum::XYZColor;
use anyhow::Context;
use image::RgbImage;
use itertools::Itertools;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct FilmSettings {
    pub x_resolution: u32,
    pub y_resolution: u32,
    pub filter: FilterKind,
    pub filter_radius: f32,
    pub halt_spp: u32,
    pub clamp_method: ClampMethod,
    pub use_zbuffer: bool,
}

impl Default for FilmSettings {
    fn default() -> Self {
        Self {
            x_resolution: 640,
            y_resolution: 480,
            filter: FilterKind::Gaussian,
            filter_radius: 1.5,
            halt_spp: 0,
            clamp_method: ClampMethod::Lum,
            use_zbuffer: false,
        }
    }
}

impl FilmSettings {
    pub fn with_resolution(x_resolution: u32, y_resolution: u32) -> Self {
        Self {
            x_resolution,
            y_resolution,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Pixel {
    xyz: XYZColor,
    alpha: f32,
    weight_sum: f32,
}

struct BufferGroup {
    name: String,
    scale: f32,
    buffers: Vec<Vec<Pixel>>,
}

#[derive(Default)]
struct FilmBuffers {
    groups: Vec<BufferGroup>,
    z_buffer: Vec<(f32, f32)>,
}

/// Image plane accumulating filtered XYZ contributions per light group.
pub struct Film {
    pub x_resolution: u32,
    pub y_resolution: u32,
    filter: Filter,
    color_system: ColorSystem,
    clamp_method: ClampMethod,
    halt_spp: u32,
    use_zbuffer: bool,
    buffer_names: Mutex<Vec<String>>,
    group_names: Mutex<Vec<String>>,
    buffers: RwLock<FilmBuffers>,
    num_samples: AtomicU64,
    rejected: AtomicUsize,
    framebuffer: RwLock<RgbImage>,
    log: slog::Logger,
}

impl Film {
    pub fn new(log: &slog::Logger, settings: &FilmSettings) -> Self {
        let log = log.new(o!("module" => "film"));
        Self {
            x_resolution: settings.x_resolution,
            y_resolution: settings.y_resolution,
            filter: Filter::from_kind(settings.filter, settings.filter_radius),
            color_system: ColorSystem::srgb(),
            clamp_method: settings.clamp_method,
            halt_spp: settings.halt_spp,
            use_zbuffer: settings.use_zbuffer,
            buffer_names: Mutex::new(Vec::new()),
            group_names: Mutex::new(Vec::new()),
            buffers: RwLock::new(FilmBuffers::default()),
            num_samples: AtomicU64::new(0),
            rejected: AtomicUsize::new(0),
            framebuffer: RwLock::new(RgbImage::new(settings.x_resolution, settings.y_resolution)),
            log,
        }
    }

    /// Registers a named buffer and returns its id. Must happen before `create_buffers`.
    pub fn request_buffer(&self, name: &str) -> usize {
        let mut names = self.buffer_names.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(idx) = names.iter().position(|n| n == name) {
            return idx;
        }
        names.push(name.to_owned());
        names.len() - 1
    }

    pub fn request_buffer_groups(&self, names: &[String]) {
        let mut groups = self.group_names.lock().unwrap_or_else(|e| e.into_inner());
        for name in names {
            if !groups.contains(name) {
                groups.push(name.clone());
            }
        }
    }

    /// Allocates pixel storage for every requested buffer in every group.
    pub fn create_buffers(&self) {
        let pixel_count = (self.x_resolution * self.y_resolution) as usize;
        let mut buffer_count = self
            .buffer_names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len();
        if buffer_count == 0 {
            buffer_count = 1;
        }
        let mut group_names = self
            .group_names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if group_names.is_empty() {
            group_names.push(String::from("default"));
        }

        let mut buffers = self.buffers.write().unwrap_or_else(|e| e.into_inner());
        buffers.groups = group_names
            .into_iter()
            .map(|name| BufferGroup {
                name,
                scale: 1.0,
                buffers: vec![vec![Pixel::default(); pixel_count]; buffer_count],
            })
            .collect();
        if self.use_zbuffer {
            buffers.z_buffer = vec![(0.0, 0.0); pixel_count];
        }

        debug!(self.log, "created film buffers";
            "groups" => buffers.groups.len(), "buffers" => buffer_count);
    }

    pub fn group_names(&self) -> Vec<String> {
        let buffers = self.buffers.read().unwrap_or_else(|e| e.into_inner());
        buffers.groups.iter().map(|g| g.name.clone()).collect()
    }

    pub fn set_group_scale(&self, group: usize, scale: f32) {
        let mut buffers = self.buffers.write().unwrap_or_else(|e| e.into_inner());
        if let Some(g) = buffers.groups.get_mut(group) {
            g.scale = scale;
        }
    }

    /// Raster extent, exclusive upper bound.
    pub fn sample_extent(&self) -> (i32, i32, i32, i32) {
        (0, self.x_resolution as i32, 0, self.y_resolution as i32)
    }

    pub fn color_system(&self) -> &ColorSystem {
        &self.color_system
    }

    pub fn add_contributions(&self, contribs: &[Contribution]) {
        let mut buffers = self.buffers.write().unwrap_or_else(|e| e.into_inner());
        for contrib in contribs {
            if !contrib.color.is_finite() || !contrib.alpha.is_finite() {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                trace!(self.log, "rejected non finite contribution";
                    "x" => contrib.image_x, "y" => contrib.image_y);
                continue;
            }
            self.splat(&mut buffers, contrib);
        }
    }

    fn splat(&self, buffers: &mut FilmBuffers, contrib: &Contribution) {
        let radius = self.filter.radius();
        let dx = contrib.image_x - 0.5;
        let dy = contrib.image_y - 0.5;
        let x0 = ((dx - radius.x).ceil() as i32).max(0);
        let x1 = ((dx + radius.x).floor() as i32).min(self.x_resolution as i32 - 1);
        let y0 = ((dy - radius.y).ceil() as i32).max(0);
        let y1 = ((dy + radius.y).floor() as i32).min(self.y_resolution as i32 - 1);
        if x1 < x0 || y1 < y0 {
            return;
        }

        let group = match buffers.groups.get_mut(contrib.buffer_group) {
            Some(group) => group,
            None => return,
        };
        let buffer = match group.buffers.get_mut(contrib.buffer) {
            Some(buffer) => buffer,
            None => return,
        };

        for (y, x) in (y0..=y1).cartesian_product(x0..=x1) {
            let weight = self
                .filter
                .evaluate(&na::Point2::new(x as f32 - dx, y as f32 - dy));
            if weight == 0.0 {
                continue;
            }
            let pixel = &mut buffer[(y as u32 * self.x_resolution + x as u32) as usize];
            pixel.xyz += contrib.color * weight;
            pixel.alpha += contrib.alpha * weight;
            pixel.weight_sum += weight;
        }

        if self.use_zbuffer && contrib.z_depth.is_finite() {
            let x = (contrib.image_x as i32).clamp(0, self.x_resolution as i32 - 1) as u32;
            let y = (contrib.image_y as i32).clamp(0, self.y_resolution as i32 - 1) as u32;
            let z = &mut buffers.z_buffer[(y * self.x_resolution + x) as usize];
            z.0 += contrib.z_depth;
            z.1 += 1.0;
        }
    }

    pub fn add_sample_count(&self, count: u64) {
        self.num_samples.fetch_add(count, Ordering::Relaxed);
    }

    pub fn num_samples(&self) -> u64 {
        self.num_samples.load(Ordering::Relaxed)
    }

    pub fn samples_per_pixel(&self) -> f64 {
        self.num_samples() as f64 / (self.x_resolution as f64 * self.y_resolution as f64)
    }

    /// Whether the configured samples per pixel have been taken.
    pub fn enough_samples(&self) -> bool {
        self.halt_spp > 0 && self.samples_per_pixel() >= self.halt_spp as f64
    }

    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Average depth of the contributions that landed on a pixel, if any.
    pub fn depth(&self, x: u32, y: u32) -> Option<f32> {
        let buffers = self.buffers.read().unwrap_or_else(|e| e.into_inner());
        buffers
            .z_buffer
            .get((y * self.x_resolution + x) as usize)
            .filter(|z| z.1 > 0.0)
            .map(|z| z.0 / z.1)
    }

    /// Weighted XYZ of a pixel summed over all light groups for buffer 0.
    pub fn pixel_xyz(&self, x: u32, y: u32) -> XYZColor {
        let buffers = self.buffers.read().unwrap_or_else(|e| e.into_inner());
        Self::resolve_pixel(&buffers, (y * self.x_resolution + x) as usize)
    }

    fn resolve_pixel(buffers: &FilmBuffers, offset: usize) -> XYZColor {
        buffers
            .groups
            .iter()
            .filter_map(|group| {
                let pixel = group.buffers.first()?.get(offset)?;
                if pixel.weight_sum > 0.0 {
                    Some(pixel.xyz * (group.scale / pixel.weight_sum))
                } else {
                    None
                }
            })
            .fold(XYZColor::black(), |acc, c| acc + c)
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        let guard = self.buffers.read().unwrap_or_else(|e| e.into_inner());
        let buffers: &FilmBuffers = &guard;
        let width = self.x_resolution as usize;
        let raw: Vec<u8> = (0..self.y_resolution as usize)
            .into_par_iter()
            .flat_map_iter(|y| {
                (0..width).flat_map(move |x| {
                    let xyz = Self::resolve_pixel(buffers, y * width + x);
                    let rgb = self.color_system.to_rgb_constrained(&xyz);
                    let rgb = self.color_system.limit(&rgb, self.clamp_method);
                    let to_byte = |v: f32| (gamma_correct(v) * 255.0 + 0.5).clamp(0.0, 255.0) as u8;
                    vec![to_byte(rgb.r()), to_byte(rgb.g()), to_byte(rgb.b())]
                })
            })
            .collect();

        RgbImage::from_raw(self.x_resolution, self.y_resolution, raw)
            .unwrap_or_else(|| RgbImage::new(self.x_resolution, self.y_resolution))
    }

    /// Refreshes the display framebuffer from the accumulated buffers.
    pub fn update_framebuffer(&self) {
        let image = self.to_rgb_image();
        *self.framebuffer.write().unwrap_or_else(|e| e.into_inner()) = image;
    }

    pub fn framebuffer(&self) -> RgbImage {
        self.framebuffer
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn write_image(&self, path: &Path) -> anyhow::Result<()> {
        info!(self.log, "writing image"; "path" => %path.display());
        self.to_rgb_image()
            .save(path)
            .with_context(|| format!("failed to write image to {}", path.display()))
    }
}
