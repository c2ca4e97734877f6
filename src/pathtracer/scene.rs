use super::integrator::{SurfaceIntegrator, SurfaceIntegratorInterface, ThreadContext};
use super::light::{Light, LightInterface};
use super::primitive::{Aggregate, PrimitiveInterface};
use super::sample::Sample;
use super::sampler::{SamplePosCursor, Sampler, SamplerInterface, UNSET_SAMPLE_POS};
use super::wavelengths::SpectrumWavelengths;
use crate::common::contribution::ContributionPool;
use crate::common::film::Film;
use crate::common::Camera;
use anyhow::bail;
use image::RgbImage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Longest a blocked render thread sleeps before re-checking its signal.
const WAIT_GRANULARITY: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadSignal {
    Run,
    Pause,
    Exit,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadStats {
    pub samples: u64,
    /// Count of non-black contributions over every traced path. Kept under
    /// its historical name; efficiency is this over `samples`.
    pub black_samples: u64,
}

impl ThreadStats {
    fn drain_into(&mut self, total: &mut ThreadStats) {
        total.samples += self.samples;
        total.black_samples += self.black_samples;
        *self = ThreadStats::default();
    }
}

/// Signal and counters shared between a render thread and the scene.
pub struct ThreadControl {
    signal: Mutex<ThreadSignal>,
    wake: Condvar,
    stats: Mutex<ThreadStats>,
}

impl ThreadControl {
    fn new(signal: ThreadSignal) -> Self {
        Self {
            signal: Mutex::new(signal),
            wake: Condvar::new(),
            stats: Mutex::new(ThreadStats::default()),
        }
    }

    pub fn signal(&self) -> ThreadSignal {
        *self.signal.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_signal(&self, signal: ThreadSignal) {
        *self.signal.lock().unwrap_or_else(|e| e.into_inner()) = signal;
        self.wake.notify_all();
    }

    /// Blocks while the signal is `Pause` and returns the one that released it.
    fn wait_while_paused(&self) -> ThreadSignal {
        let mut signal = self.signal.lock().unwrap_or_else(|e| e.into_inner());
        while *signal == ThreadSignal::Pause {
            signal = self
                .wake
                .wait_timeout(signal, WAIT_GRANULARITY)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        *signal
    }

    /// Pauses a thread that ran out of work, unless it has been told to do
    /// something else meanwhile, and blocks until the pause is lifted.
    fn suspend(&self) -> ThreadSignal {
        let mut signal = self.signal.lock().unwrap_or_else(|e| e.into_inner());
        if *signal == ThreadSignal::Run {
            *signal = ThreadSignal::Pause;
        }
        while *signal == ThreadSignal::Pause {
            signal = self
                .wake
                .wait_timeout(signal, WAIT_GRANULARITY)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        *signal
    }

    fn record(&self, contributions: u32) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.samples += 1;
        stats.black_samples += contributions as u64;
    }
}

pub struct RenderThread {
    pub index: usize,
    control: Arc<ThreadControl>,
    handle: Option<JoinHandle<()>>,
}

struct RenderThreads {
    list: Vec<RenderThread>,
    /// Signal new threads start with.
    signal: ThreadSignal,
}

/// Everything a render needs plus the pool of threads working on it.
///
/// Threads are created with [`Scene::create_render_thread`] and removed
/// last-in first-out. [`Scene::render`] runs the set-up, starts the first
/// thread if none exists yet and blocks until thread 0 finishes.
pub struct Scene {
    pub film: Arc<Film>,
    pub aggregate: Aggregate,
    pub lights: Vec<Light>,
    pub light_groups: Vec<String>,
    camera: RwLock<Camera>,
    sampler: Mutex<Sampler>,
    integrator: RwLock<SurfaceIntegrator>,
    sample_layout: RwLock<Sample>,
    threads: Mutex<RenderThreads>,
    preprocess_done: Mutex<bool>,
    preprocess_cv: Condvar,
    contribution_pool: RwLock<Option<Arc<ContributionPool>>>,
    sample_pos: SamplePosCursor,
    seed: Option<u64>,
    seed_base: AtomicU64,
    suspend_threads_when_done: AtomicBool,
    rendering: AtomicBool,
    stats: Mutex<ThreadStats>,
    timer: Mutex<Option<Instant>>,
    last_rate: Mutex<(f64, u64)>,
    log: slog::Logger,
}

impl Scene {
    pub fn new(
        log: &slog::Logger,
        camera: Camera,
        sampler: Sampler,
        integrator: SurfaceIntegrator,
        aggregate: Aggregate,
        mut lights: Vec<Light>,
        light_groups: Vec<String>,
    ) -> anyhow::Result<Self> {
        let log = log.new(o!("module" => "scene"));
        let light_groups = if light_groups.is_empty() {
            vec![String::from("default")]
        } else {
            light_groups
        };
        if let Some(light) = lights.iter().find(|l| l.group() >= light_groups.len()) {
            bail!(
                "light refers to group {} but only {} light groups are defined",
                light.group(),
                light_groups.len()
            );
        }

        let world_bound = aggregate.world_bound();
        for light in lights.iter_mut() {
            light.preprocess(&world_bound);
        }
        info!(log, "scene created";
            "primitives" => aggregate.len(),
            "lights" => lights.len(),
            "light_groups" => light_groups.len());

        Ok(Self {
            film: camera.film.clone(),
            aggregate,
            lights,
            light_groups,
            camera: RwLock::new(camera),
            sampler: Mutex::new(sampler),
            integrator: RwLock::new(integrator),
            sample_layout: RwLock::new(Sample::new()),
            threads: Mutex::new(RenderThreads {
                list: Vec::new(),
                signal: ThreadSignal::Run,
            }),
            preprocess_done: Mutex::new(false),
            preprocess_cv: Condvar::new(),
            contribution_pool: RwLock::new(None),
            sample_pos: SamplePosCursor::new(),
            seed: None,
            seed_base: AtomicU64::new(0),
            suspend_threads_when_done: AtomicBool::new(false),
            rendering: AtomicBool::new(false),
            stats: Mutex::new(ThreadStats::default()),
            timer: Mutex::new(None),
            last_rate: Mutex::new((0.0, 0)),
            log,
        })
    }

    /// Fixes the seed base instead of drawing it at render start.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn set_suspend_threads_when_done(&self, suspend: bool) {
        self.suspend_threads_when_done
            .store(suspend, Ordering::Relaxed);
    }

    /// Independent copy of the camera for one thread.
    pub fn camera(&self) -> Camera {
        self.camera
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn sampler(&self) -> Sampler {
        self.sampler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn integrator(&self) -> SurfaceIntegrator {
        self.integrator
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering.load(Ordering::Acquire)
    }

    /// Spawns a render thread starting in the current global signal. Refused
    /// once the scene has been told to exit.
    pub fn create_render_thread(self: &Arc<Self>) -> bool {
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        if threads.signal == ThreadSignal::Exit {
            debug!(self.log, "scene is exiting, render thread not created");
            return false;
        }

        let index = threads.list.len();
        let control = Arc::new(ThreadControl::new(threads.signal));
        let scene = self.clone();
        let thread_control = control.clone();
        let handle = std::thread::Builder::new()
            .name(format!("render-{}", index))
            .spawn(move || scene.render_loop(index, &thread_control));
        match handle {
            Ok(handle) => {
                threads.list.push(RenderThread {
                    index,
                    control,
                    handle: Some(handle),
                });
                info!(self.log, "render thread created"; "thread" => index);
                true
            }
            Err(err) => {
                error!(self.log, "failed to spawn render thread"; "error" => %err);
                false
            }
        }
    }

    /// Stops and joins the most recently created thread. Thread 0 stays while
    /// a render is running. Returns whether a thread was removed.
    pub fn remove_render_thread(&self) -> bool {
        let thread = {
            let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
            if threads.list.len() == 1 && self.is_rendering() {
                debug!(self.log, "thread 0 is kept until the render ends");
                return false;
            }
            match threads.list.pop() {
                Some(thread) => thread,
                None => return false,
            }
        };
        thread.control.set_signal(ThreadSignal::Exit);
        self.preprocess_cv.notify_all();
        if let Some(handle) = thread.handle {
            if handle.join().is_err() {
                error!(self.log, "render thread panicked"; "thread" => thread.index);
            }
        }
        self.retire(&thread.control);
        info!(self.log, "render thread removed"; "thread" => thread.index);
        true
    }

    pub fn thread_count(&self) -> usize {
        self.threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .list
            .len()
    }

    /// Creates or removes threads until `count` are running. Returns the count reached.
    pub fn set_thread_count(self: &Arc<Self>, count: usize) -> usize {
        loop {
            let current = self.thread_count();
            if current < count {
                if !self.create_render_thread() {
                    return current;
                }
            } else if current > count {
                if !self.remove_render_thread() {
                    return current;
                }
            } else {
                return current;
            }
        }
    }

    pub fn threads_status(&self) -> Vec<(usize, ThreadSignal)> {
        let threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        threads
            .list
            .iter()
            .map(|t| (t.index, t.control.signal()))
            .collect()
    }

    /// Sets the signal of every thread and of threads created from now on.
    pub fn signal_threads(&self, signal: ThreadSignal) {
        {
            let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
            threads.signal = signal;
            for thread in &threads.list {
                thread.control.set_signal(signal);
            }
        }
        if signal == ThreadSignal::Exit {
            self.preprocess_cv.notify_all();
        }
        debug!(self.log, "threads signalled"; "signal" => ?signal);
    }

    /// Moves every thread to `Run` unless an exit has already been signalled.
    fn run_unless_exiting(&self) -> bool {
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        if threads.signal == ThreadSignal::Exit {
            return false;
        }
        threads.signal = ThreadSignal::Run;
        for thread in &threads.list {
            thread.control.set_signal(ThreadSignal::Run);
        }
        true
    }

    pub fn start(&self) {
        self.signal_threads(ThreadSignal::Run);
    }

    pub fn pause(&self) {
        self.signal_threads(ThreadSignal::Pause);
    }

    pub fn exit(&self) {
        self.signal_threads(ThreadSignal::Exit);
    }

    /// Ends the render for good, including threads suspended after finishing.
    pub fn terminate(&self) {
        info!(self.log, "terminating render");
        self.set_suspend_threads_when_done(false);
        self.exit();
    }

    /// Runs the render to completion. Fails without starting any thread when
    /// the scene cannot be rendered.
    pub fn render(self: &Arc<Self>) -> anyhow::Result<()> {
        if self.lights.is_empty() {
            error!(self.log, "no light sources defined in scene, nothing to render");
            bail!("no light sources defined in scene");
        }
        if self.threads.lock().unwrap_or_else(|e| e.into_inner()).signal == ThreadSignal::Exit {
            bail!("scene has already been shut down");
        }

        let seed_base = self.seed.unwrap_or_else(|| rand::random::<u32>() as u64);
        self.seed_base.store(seed_base, Ordering::Relaxed);
        info!(self.log, "preprocessing"; "seed_base" => seed_base);

        {
            let mut integrator = self.integrator.write().unwrap_or_else(|e| e.into_inner());
            integrator.preprocess(self);
            let mut layout = Sample::new();
            integrator.request_samples(&mut layout, self);
            *self.sample_layout.write().unwrap_or_else(|e| e.into_inner()) = layout;
        }
        self.film.request_buffer_groups(&self.light_groups);
        self.film.create_buffers();

        let pool = Arc::new(ContributionPool::new(&self.log, self.film.clone()));
        self.sampler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_contribution_pool(pool.clone());
        *self
            .contribution_pool
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(pool.clone());

        self.camera
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .auto_focus(&self.aggregate);
        self.sample_pos.reset();
        *self.timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());

        self.rendering.store(true, Ordering::Release);
        if !self.run_unless_exiting() {
            info!(self.log, "exit requested during preprocessing");
        } else if self.thread_count() == 0 && !self.create_render_thread() {
            self.rendering.store(false, Ordering::Release);
            bail!("could not start the first render thread");
        }
        *self
            .preprocess_done
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = true;
        self.preprocess_cv.notify_all();
        info!(self.log, "rendering started");

        let primary = self
            .threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .list
            .first_mut()
            .and_then(|t| t.handle.take());
        if let Some(primary) = primary {
            if primary.join().is_err() {
                error!(self.log, "render thread panicked"; "thread" => 0);
            }
        }

        // Thread 0 is done: no new threads from here on, the others finish their work.
        let (handles, controls) = {
            let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
            threads.signal = ThreadSignal::Exit;
            let handles: Vec<_> = threads
                .list
                .iter_mut()
                .filter_map(|t| t.handle.take())
                .collect();
            let controls: Vec<_> = threads.list.drain(..).map(|t| t.control).collect();
            (handles, controls)
        };
        for handle in handles {
            if handle.join().is_err() {
                error!(self.log, "render thread panicked");
            }
        }
        for control in &controls {
            self.retire(control);
        }

        pool.flush();
        pool.delete();
        *self
            .contribution_pool
            .write()
            .unwrap_or_else(|e| e.into_inner()) = None;
        self.film.update_framebuffer();
        self.rendering.store(false, Ordering::Release);
        info!(self.log, "rendering done";
            "samples" => self.film.num_samples(),
            "splatted" => pool.splatted(),
            "seconds" => self.seconds_elapsed());
        Ok(())
    }

    fn wait_for_preprocess(&self, control: &ThreadControl) -> bool {
        let mut done = self
            .preprocess_done
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        while !*done {
            if control.signal() == ThreadSignal::Exit {
                return false;
            }
            done = self
                .preprocess_cv
                .wait_timeout(done, WAIT_GRANULARITY)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        true
    }

    fn render_loop(self: Arc<Self>, index: usize, control: &ThreadControl) {
        let log = self.log.new(o!("thread" => index));
        if !self.wait_for_preprocess(control) {
            debug!(log, "render thread left before preprocessing finished");
            return;
        }

        let seed = self.seed_base.load(Ordering::Relaxed) + index as u64;
        let mut ctx = ThreadContext {
            swl: SpectrumWavelengths::default(),
            camera: self.camera(),
            sampler: self.sampler(),
            time: 0.0,
        };
        ctx.sampler.set_seed(seed);
        let integrator = self.integrator();
        let mut sample = self
            .sample_layout
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .with_layout();
        ctx.sampler.init_sample(&mut sample);

        let max_pos = ctx.sampler.get_total_sample_pos();
        let mut use_pos = if max_pos != 0 {
            self.sample_pos.advance(max_pos)
        } else {
            UNSET_SAMPLE_POS
        };
        debug!(log, "render thread started"; "seed" => seed);

        loop {
            if control.wait_while_paused() == ThreadSignal::Exit {
                break;
            }
            if !ctx.sampler.get_next_sample(&mut sample, &mut use_pos) {
                if !self.suspend_threads_when_done.load(Ordering::Relaxed) {
                    break;
                }
                debug!(log, "no more samples, suspending");
                if control.suspend() == ThreadSignal::Exit {
                    break;
                }
                continue;
            }

            ctx.time = ctx.camera.get_time(sample.time);
            ctx.camera.sample_motion(ctx.time);
            ctx.swl.sample(sample.wavelengths);

            if control.wait_while_paused() == ThreadSignal::Exit {
                break;
            }

            let contributions = integrator.li(&mut ctx, &self, &mut sample);
            control.record(contributions);

            ctx.sampler.add_sample(&mut sample);
            sample.arena.free_all();

            if use_pos == UNSET_SAMPLE_POS && max_pos != 0 {
                use_pos = self.sample_pos.advance(max_pos);
            }
        }

        ctx.sampler.cleanup();
        debug!(log, "render thread stopped");
    }

    fn retire(&self, control: &ThreadControl) {
        let mut total = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        control
            .stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain_into(&mut total);
    }

    /// Folds every thread's counters into the scene totals.
    fn collect_stats(&self) -> ThreadStats {
        let threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        for thread in &threads.list {
            self.retire(&thread.control);
        }
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn seconds_elapsed(&self) -> f64 {
        self.timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map_or(0.0, |start| start.elapsed().as_secs_f64())
    }

    /// Rate since the previous call.
    pub fn samples_per_second(&self) -> f64 {
        let samples = self.collect_stats().samples;
        let now = self.seconds_elapsed();
        let mut last = self.last_rate.lock().unwrap_or_else(|e| e.into_inner());
        let (last_time, last_samples) = *last;
        *last = (now, samples);
        let elapsed = now - last_time;
        if elapsed <= 0.0 {
            return 0.0;
        }
        samples.saturating_sub(last_samples) as f64 / elapsed
    }

    /// Average rate since rendering started.
    pub fn samples_total_per_second(&self) -> f64 {
        let elapsed = self.seconds_elapsed();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.collect_stats().samples as f64 / elapsed
    }

    pub fn samples_per_pixel(&self) -> f64 {
        self.film.samples_per_pixel()
    }

    /// Percentage of contributing paths.
    pub fn efficiency(&self) -> f64 {
        let stats = self.collect_stats();
        if stats.samples == 0 {
            return 0.0;
        }
        100.0 * stats.black_samples as f64 / stats.samples as f64
    }

    pub fn statistics(&self, name: &str) -> anyhow::Result<f64> {
        Ok(match name {
            "seconds_elapsed" => self.seconds_elapsed(),
            "samples_per_second" => self.samples_per_second(),
            "samples_total_per_second" => self.samples_total_per_second(),
            "samples_per_pixel" => self.samples_per_pixel(),
            "efficiency" => self.efficiency(),
            "thread_count" => self.thread_count() as f64,
            _ => bail!("unknown statistic '{}'", name),
        })
    }

    pub fn update_framebuffer(&self) {
        self.film.update_framebuffer();
    }

    pub fn framebuffer(&self) -> RgbImage {
        self.film.framebuffer()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::common::camera::CameraSettings;
    use crate::common::film::FilmSettings;
    use crate::common::spectrum::Spectrum;
    use crate::pathtracer::integrator::IntegratorSettings;
    use crate::pathtracer::light::PointLight;
    use crate::pathtracer::material::{Material, MatteMaterial};
    use crate::pathtracer::primitive::{GeometricPrimitive, Primitive};
    use crate::pathtracer::sampler::SamplerSettings;
    use crate::pathtracer::shape::{Shape, Sphere};

    /// Matte unit sphere at the origin seen from +z, lit by `n_lights` point lights.
    pub(crate) fn test_scene(film_settings: FilmSettings, n_lights: usize) -> Scene {
        let log = slog::Logger::root(slog::Discard, o!());
        let film = Arc::new(Film::new(&log, &film_settings));
        let camera = Camera::look_at(
            &log,
            &na::Point3::new(0.0, 0.0, 5.0),
            &na::Point3::origin(),
            &na::Vector3::y(),
            &CameraSettings::default(),
            film.clone(),
        );
        let sampler = Sampler::from_settings(&log, &SamplerSettings::default(), film);
        let integrator = SurfaceIntegrator::from_settings(&log, &IntegratorSettings::default());
        let material = Arc::new(Material::Matte(MatteMaterial::new(Spectrum::new(0.5))));
        let aggregate = Aggregate::new(vec![Primitive::Geometric(GeometricPrimitive::new(
            Shape::Sphere(Sphere::new(na::Point3::origin(), 1.0, false)),
            material,
        ))]);
        let light_groups = if n_lights > 1 {
            vec![String::from("default"), String::from("fill")]
        } else {
            vec![String::from("default")]
        };
        let lights = (0..n_lights)
            .map(|i| {
                Light::Point(PointLight::new(
                    na::Point3::new(i as f32 * 0.5 - 1.0, 2.0, 4.0),
                    Spectrum::new(20.0),
                    i % light_groups.len(),
                ))
            })
            .collect();
        Scene::new(
            &log,
            camera,
            sampler,
            integrator,
            aggregate,
            lights,
            light_groups,
        )
        .unwrap()
        .with_seed(Some(7))
    }

    fn wait_for(mut pred: impl FnMut() -> bool) {
        for _ in 0..500 {
            if pred() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn test_create_then_remove_threads() {
        let scene = Arc::new(test_scene(FilmSettings::with_resolution(4, 4), 1));
        for _ in 0..3 {
            assert!(scene.create_render_thread());
        }
        assert_eq!(scene.thread_count(), 3);
        let indices: Vec<usize> = scene.threads_status().iter().map(|s| s.0).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        for _ in 0..3 {
            assert!(scene.remove_render_thread());
        }
        assert_eq!(scene.thread_count(), 0);
        assert!(!scene.remove_render_thread());
        assert_eq!(scene.thread_count(), 0);
    }

    #[test]
    fn test_suspend_keeps_exit() {
        let control = ThreadControl::new(ThreadSignal::Run);
        control.set_signal(ThreadSignal::Exit);
        assert_eq!(control.suspend(), ThreadSignal::Exit);
        assert_eq!(control.signal(), ThreadSignal::Exit);

        let control = Arc::new(ThreadControl::new(ThreadSignal::Run));
        let suspended = {
            let control = control.clone();
            std::thread::spawn(move || control.suspend())
        };
        wait_for(|| control.signal() == ThreadSignal::Pause);
        control.set_signal(ThreadSignal::Exit);
        assert_eq!(suspended.join().unwrap(), ThreadSignal::Exit);
    }

    #[test]
    fn test_exit_ends_suspended_render() {
        let mut settings = FilmSettings::with_resolution(4, 4);
        settings.halt_spp = 1;
        let scene = Arc::new(test_scene(settings, 1));
        scene.set_suspend_threads_when_done(true);
        scene.set_thread_count(2);
        let render = {
            let scene = scene.clone();
            std::thread::spawn(move || scene.render())
        };
        wait_for(|| scene.is_rendering());
        scene.exit();
        render.join().unwrap().unwrap();
        assert_eq!(scene.thread_count(), 0);
    }

    #[test]
    fn test_paused_threads_draw_no_work() {
        let scene = Arc::new(test_scene(FilmSettings::with_resolution(16, 16), 1));
        scene.set_thread_count(2);
        let render = {
            let scene = scene.clone();
            std::thread::spawn(move || scene.render())
        };
        wait_for(|| scene.film.num_samples() > 0);

        scene.pause();
        // let samples in flight land
        std::thread::sleep(Duration::from_millis(100));
        let samples = scene.film.num_samples();
        let position = scene.sample_pos.position();
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(scene.film.num_samples(), samples);
        assert_eq!(scene.sample_pos.position(), position);

        scene.start();
        wait_for(|| scene.film.num_samples() > samples);
        scene.exit();
        render.join().unwrap().unwrap();
    }

    #[test]
    fn test_first_thread_stays_while_rendering() {
        let scene = Arc::new(test_scene(FilmSettings::with_resolution(8, 8), 1));
        let render = {
            let scene = scene.clone();
            std::thread::spawn(move || scene.render())
        };
        wait_for(|| scene.is_rendering() && scene.thread_count() == 1);
        assert_eq!(scene.set_thread_count(3), 3);
        assert_eq!(scene.set_thread_count(0), 1);
        assert!(!scene.remove_render_thread());
        assert_eq!(scene.threads_status(), vec![(0, ThreadSignal::Run)]);
        assert!(scene.is_rendering());

        scene.exit();
        render.join().unwrap().unwrap();
        assert_eq!(scene.thread_count(), 0);
        assert!(!scene.is_rendering());
    }

    #[test]
    fn test_set_thread_count_removes_newest_first() {
        let scene = Arc::new(test_scene(FilmSettings::with_resolution(4, 4), 1));
        assert_eq!(scene.set_thread_count(4), 4);
        assert_eq!(scene.set_thread_count(1), 1);
        assert_eq!(scene.threads_status(), vec![(0, ThreadSignal::Run)]);
        scene.set_thread_count(0);
    }

    #[test]
    fn test_no_threads_after_exit() {
        let scene = Arc::new(test_scene(FilmSettings::with_resolution(4, 4), 1));
        scene.pause();
        assert!(scene.create_render_thread());
        assert_eq!(scene.threads_status(), vec![(0, ThreadSignal::Pause)]);
        scene.exit();
        assert!(!scene.create_render_thread());
        assert_eq!(scene.thread_count(), 1);
        assert!(scene.remove_render_thread());
        assert!(scene.render().is_err());
    }

    #[test]
    fn test_render_without_lights_starts_nothing() {
        let scene = Arc::new(test_scene(FilmSettings::with_resolution(4, 4), 0));
        assert!(scene.render().is_err());
        assert_eq!(scene.thread_count(), 0);
        assert_eq!(scene.film.num_samples(), 0);
        assert!(!scene.is_rendering());
    }

    #[test]
    fn test_light_group_must_exist() {
        let log = slog::Logger::root(slog::Discard, o!());
        let scene = test_scene(FilmSettings::with_resolution(4, 4), 1);
        let result = Scene::new(
            &log,
            scene.camera(),
            scene.sampler(),
            scene.integrator(),
            Aggregate::new(Vec::new()),
            vec![Light::Point(PointLight::new(
                na::Point3::origin(),
                Spectrum::new(1.0),
                3,
            ))],
            Vec::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_render_halts_on_samples_per_pixel() {
        let mut settings = FilmSettings::with_resolution(8, 8);
        settings.halt_spp = 2;
        let scene = Arc::new(test_scene(settings, 2));
        assert_eq!(scene.set_thread_count(3), 3);
        scene.render().unwrap();

        assert_eq!(scene.thread_count(), 0);
        assert!(scene.film.enough_samples());
        assert!(scene.statistics("samples_per_pixel").unwrap() >= 2.0);
        let efficiency = scene.statistics("efficiency").unwrap();
        assert!(efficiency > 0.0);
        assert!(scene.statistics("samples_total_per_second").unwrap() > 0.0);
        assert!(scene.statistics("no_such_statistic").is_err());
        assert!(!scene.create_render_thread());

        let image = scene.framebuffer();
        let centre = image.get_pixel(4, 4);
        let corner = image.get_pixel(0, 0);
        assert!(centre.0.iter().any(|c| *c > 0));
        assert_eq!(corner.0, [0, 0, 0]);
    }

    #[test]
    fn test_pause_resume_and_exit() {
        let scene = Arc::new(test_scene(FilmSettings::with_resolution(8, 8), 1));
        let render = {
            let scene = scene.clone();
            std::thread::spawn(move || scene.render())
        };
        wait_for(|| scene.is_rendering());
        assert_eq!(scene.set_thread_count(2), 2);

        scene.pause();
        assert!(scene
            .threads_status()
            .iter()
            .all(|(_, s)| *s == ThreadSignal::Pause));
        scene.start();
        wait_for(|| scene.film.num_samples() > 0);

        scene.exit();
        render.join().unwrap().unwrap();
        assert_eq!(scene.thread_count(), 0);
        assert!(!scene.is_rendering());
    }

    #[test]
    fn test_threads_suspend_when_done() {
        let mut settings = FilmSettings::with_resolution(4, 4);
        settings.halt_spp = 1;
        let scene = Arc::new(test_scene(settings, 1));
        scene.set_suspend_threads_when_done(true);
        let render = {
            let scene = scene.clone();
            std::thread::spawn(move || scene.render())
        };
        wait_for(|| {
            let status = scene.threads_status();
            !status.is_empty() && status.iter().all(|(_, s)| *s == ThreadSignal::Pause)
        });
        assert!(scene.film.enough_samples());

        scene.terminate();
        render.join().unwrap().unwrap();
    }
}
