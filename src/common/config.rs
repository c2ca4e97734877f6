use super::camera::CameraSettings;
use super::film::FilmSettings;
use crate::pathtracer::integrator::IntegratorSettings;
use crate::pathtracer::sampler::SamplerSettings;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Everything needed to set up and drive a render. Every field has a
/// default, so a settings file only lists what it changes.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RenderSettings {
    pub film: FilmSettings,
    pub camera: CameraSettings,
    pub sampler: SamplerSettings,
    pub integrator: IntegratorSettings,
    /// Render threads, 0 for one per available core.
    pub threads: usize,
    /// Seed base; drawn from the process RNG when absent.
    pub seed: Option<u64>,
    /// Wall-clock limit in seconds, 0 for none.
    pub halt_time: u64,
    pub suspend_threads_when_done: bool,
    pub output: PathBuf,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            film: FilmSettings::default(),
            camera: CameraSettings::default(),
            sampler: SamplerSettings::default(),
            integrator: IntegratorSettings::default(),
            threads: 0,
            seed: None,
            halt_time: 0,
            suspend_threads_when_done: false,
            output: PathBuf::from("render.png"),
        }
    }
}

impl RenderSettings {
    pub fn from_xml(text: &str) -> anyhow::Result<Self> {
        quick_xml::de::from_str(text).context("invalid render settings")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::from_xml(&text).with_context(|| format!("while loading {}", path.display()))
    }

    pub fn thread_count(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism().map_or(1, |n| n.get())
    }

    /// Stops at `halt_spp` unless neither a sample nor a time limit is set,
    /// in which case a single sample per pixel is taken.
    pub fn ensure_halt_condition(&mut self) {
        if self.film.halt_spp == 0 && self.halt_time == 0 {
            self.film.halt_spp = 1;
        }
    }
}
