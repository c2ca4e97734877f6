use super::film::Film;
use super::spectrum::XYZColor;
use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CONTRIB_BUFFER_SIZE: usize = 4096;

/// One radiance sample destined for a film pixel.
#[derive(Clone, Copy, Debug)]
pub struct Contribution {
    pub image_x: f32,
    pub image_y: f32,
    pub color: XYZColor,
    pub alpha: f32,
    pub z_depth: f32,
    pub variance: f32,
    pub buffer: usize,
    pub buffer_group: usize,
}

impl Contribution {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        image_x: f32,
        image_y: f32,
        color: XYZColor,
        alpha: f32,
        z_depth: f32,
        variance: f32,
        buffer: usize,
        buffer_group: usize,
    ) -> Self {
        Self {
            image_x,
            image_y,
            color,
            alpha,
            z_depth,
            variance,
            buffer,
            buffer_group,
        }
    }
}

/// Fixed capacity batch of contributions owned by one render thread.
pub struct ContributionBuffer {
    contribs: Vec<Contribution>,
}

impl ContributionBuffer {
    fn new() -> Self {
        Self {
            contribs: Vec::with_capacity(CONTRIB_BUFFER_SIZE),
        }
    }

    /// Returns false once the buffer is full and must be handed back to the pool.
    pub fn add(&mut self, contrib: Contribution) -> bool {
        if self.contribs.len() >= CONTRIB_BUFFER_SIZE {
            return false;
        }
        self.contribs.push(contrib);
        true
    }

    pub fn len(&self) -> usize {
        self.contribs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contribs.is_empty()
    }

    pub fn contributions(&self) -> &[Contribution] {
        &self.contribs
    }

    fn clear(&mut self) {
        self.contribs.clear();
    }
}

/// Hands out contribution buffers to render threads and splats full ones into the film.
///
/// All writes into the film go through `splat`, which holds a single mutex for the
/// duration of the write.
pub struct ContributionPool {
    film: Arc<Film>,
    free: SegQueue<ContributionBuffer>,
    pending: Mutex<Vec<ContributionBuffer>>,
    splatting: Mutex<()>,
    splatted: AtomicUsize,
    allocated: AtomicUsize,
    log: slog::Logger,
}

impl ContributionPool {
    pub fn new(log: &slog::Logger, film: Arc<Film>) -> Self {
        let log = log.new(o!("module" => "contribution_pool"));
        Self {
            film,
            free: SegQueue::new(),
            pending: Mutex::new(Vec::new()),
            splatting: Mutex::new(()),
            splatted: AtomicUsize::new(0),
            allocated: AtomicUsize::new(0),
            log,
        }
    }

    /// Fetches an empty buffer, reusing a released one when possible.
    pub fn get(&self) -> ContributionBuffer {
        if let Ok(buffer) = self.free.pop() {
            return buffer;
        }
        let allocated = self.allocated.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(self.log, "allocating contribution buffer"; "allocated" => allocated);
        ContributionBuffer::new()
    }

    /// Splats a full buffer and returns an empty one in its place.
    pub fn next(&self, full: ContributionBuffer) -> ContributionBuffer {
        self.splat(full);
        self.get()
    }

    /// Takes back a thread's partially filled buffer when the thread stops.
    pub fn end(&self, buffer: ContributionBuffer) {
        if buffer.is_empty() {
            self.free.push(buffer);
            return;
        }
        match self.pending.lock() {
            Ok(mut pending) => pending.push(buffer),
            Err(_) => error!(self.log, "pending buffer list poisoned, dropping buffer"),
        }
    }

    /// Splats every buffer handed back through `end`.
    pub fn flush(&self) {
        let pending = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => {
                error!(self.log, "pending buffer list poisoned, nothing flushed");
                return;
            }
        };
        debug!(self.log, "flushing contribution buffers"; "count" => pending.len());
        for buffer in pending {
            self.splat(buffer);
        }
    }

    /// Releases every pooled buffer. Pending buffers that were never flushed are lost.
    pub fn delete(&self) {
        let mut released = 0;
        while self.free.pop().is_ok() {
            released += 1;
        }
        if let Ok(mut pending) = self.pending.lock() {
            if !pending.is_empty() {
                warn!(self.log, "deleting unflushed contribution buffers"; "count" => pending.len());
            }
            released += pending.len();
            pending.clear();
        }
        debug!(self.log, "released contribution buffers"; "count" => released);
    }

    /// Number of contributions written into the film so far.
    pub fn splatted(&self) -> usize {
        self.splatted.load(Ordering::Relaxed)
    }

    pub fn film(&self) -> &Arc<Film> {
        &self.film
    }

    fn splat(&self, mut buffer: ContributionBuffer) {
        {
            let _guard = self.splatting.lock().unwrap_or_else(|e| e.into_inner());
            self.film.add_contributions(buffer.contributions());
        }
        self.splatted.fetch_add(buffer.len(), Ordering::Relaxed);
        buffer.clear();
        self.free.push(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::film::{Film, FilmSettings};

    fn test_log() -> slog::Logger {
        slog::Logger::root(slog::Discard, o!())
    }

    fn contrib(x: f32, y: f32) -> Contribution {
        Contribution::new(x, y, XYZColor::new(1.0, 1.0, 1.0), 1.0, 1.0, 1.0, 0, 0)
    }

    #[test]
    fn test_buffer_capacity() {
        let mut buffer = ContributionBuffer::new();
        for _ in 0..CONTRIB_BUFFER_SIZE {
            assert!(buffer.add(contrib(0.5, 0.5)));
        }
        assert!(!buffer.add(contrib(0.5, 0.5)));
        assert_eq!(buffer.len(), CONTRIB_BUFFER_SIZE);
    }

    #[test]
    fn test_end_then_flush_splats_once() {
        let log = test_log();
        let film = Arc::new(Film::new(&log, &FilmSettings::with_resolution(4, 4)));
        film.create_buffers();
        let pool = ContributionPool::new(&log, film.clone());

        let mut buffer = pool.get();
        buffer.add(contrib(1.5, 1.5));
        buffer.add(contrib(2.5, 2.5));
        pool.end(buffer);
        assert_eq!(pool.splatted(), 0);

        pool.flush();
        assert_eq!(pool.splatted(), 2);
        pool.flush();
        assert_eq!(pool.splatted(), 2);
        pool.delete();
    }

    #[test]
    fn test_next_recycles_buffers() {
        let log = test_log();
        let film = Arc::new(Film::new(&log, &FilmSettings::with_resolution(2, 2)));
        film.create_buffers();
        let pool = ContributionPool::new(&log, film);

        let mut buffer = pool.get();
        buffer.add(contrib(0.5, 0.5));
        let buffer = pool.next(buffer);
        assert!(buffer.is_empty());
        assert_eq!(pool.splatted(), 1);
    }
}
