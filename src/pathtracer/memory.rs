use super::bsdf::BSDF;

/// Handle to a BSDF stored in a `MemoryArena`. Only valid until the next `free_all`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BSDFRef(usize);

/// Per path storage for scattering functions, released in bulk once the path
/// has been evaluated.
#[derive(Default, Debug)]
pub struct MemoryArena {
    bsdfs: Vec<BSDF>,
}

impl MemoryArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, bsdf: BSDF) -> BSDFRef {
        self.bsdfs.push(bsdf);
        BSDFRef(self.bsdfs.len() - 1)
    }

    pub fn get(&self, r: BSDFRef) -> &BSDF {
        debug_assert!(r.0 < self.bsdfs.len(), "stale arena handle");
        &self.bsdfs[r.0]
    }

    /// Drops every allocation while keeping the backing storage.
    pub fn free_all(&mut self) {
        self.bsdfs.clear();
    }

    pub fn len(&self) -> usize {
        self.bsdfs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bsdfs.is_empty()
    }
}
