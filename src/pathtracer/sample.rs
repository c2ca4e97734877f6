use super::memory::MemoryArena;
use crate::common::contribution::Contribution;
use crate::common::spectrum::XYZColor;

/// Scratch record of one camera path: image plane position, lens, time and
/// wavelength variates, the random number slots the integrator asked for,
/// and the contributions produced while tracing.
///
/// Slot layouts are declared once through `add_1d`, `add_2d` and `add_xd` and
/// stay fixed for the whole render.
#[derive(Default, Debug)]
pub struct Sample {
    pub image_x: f32,
    pub image_y: f32,
    pub lens_u: f32,
    pub lens_v: f32,
    pub time: f32,
    pub wavelengths: f32,

    pub n1d: Vec<usize>,
    pub n2d: Vec<usize>,
    pub nxd: Vec<usize>,
    pub dxd: Vec<usize>,
    pub sxd: Vec<Vec<usize>>,

    /// Values of each 1D slot for the current sample, `n1d[i]` per slot.
    pub one_d: Vec<Vec<f32>>,
    /// Values of each 2D slot for the current sample, `2 * n2d[i]` per slot.
    pub two_d: Vec<Vec<f32>>,
    /// Lazily filled values of each xD slot, `nxd[i] * dxd[i]` per slot.
    pub xd: Vec<Vec<f32>>,
    /// Sample generation each xD entry was filled for.
    pub xd_stamp: Vec<Vec<u64>>,
    /// Incremented by the sampler whenever it produces a new sample.
    pub stamp: u64,

    pub contributions: Vec<Contribution>,
    pub arena: MemoryArena,
}

impl Sample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_1d(&mut self, num: usize) -> usize {
        self.n1d.push(num);
        self.n1d.len() - 1
    }

    pub fn add_2d(&mut self, num: usize) -> usize {
        self.n2d.push(num);
        self.n2d.len() - 1
    }

    /// Requests `num` groups of values laid out as `structure`, one group per
    /// path vertex for instance.
    pub fn add_xd(&mut self, structure: &[usize], num: usize) -> usize {
        self.nxd.push(num);
        self.dxd.push(structure.iter().sum());
        self.sxd.push(structure.to_vec());
        self.nxd.len() - 1
    }

    /// Fresh sample sharing this one's slot layout.
    pub fn with_layout(&self) -> Self {
        Self {
            n1d: self.n1d.clone(),
            n2d: self.n2d.clone(),
            nxd: self.nxd.clone(),
            dxd: self.dxd.clone(),
            sxd: self.sxd.clone(),
            ..Self::default()
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_contribution(
        &mut self,
        x: f32,
        y: f32,
        color: XYZColor,
        alpha: f32,
        z_depth: f32,
        variance: f32,
        buffer: usize,
        group: usize,
    ) {
        self.contributions.push(Contribution::new(
            x, y, color, alpha, z_depth, variance, buffer, group,
        ));
    }

    /// Sizes the value tables after every slot has been declared.
    pub fn allocate(&mut self) {
        self.one_d = self.n1d.iter().map(|n| vec![0.0; *n]).collect();
        self.two_d = self.n2d.iter().map(|n| vec![0.0; 2 * n]).collect();
        self.xd = self
            .nxd
            .iter()
            .zip(&self.dxd)
            .map(|(n, d)| vec![0.0; n * d])
            .collect();
        self.xd_stamp = self.nxd.iter().map(|n| vec![u64::MAX; *n]).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_indices_are_stable() {
        let mut sample = Sample::new();
        assert_eq!(sample.add_1d(1), 0);
        assert_eq!(sample.add_2d(4), 0);
        assert_eq!(sample.add_1d(2), 1);
        let xd = sample.add_xd(&[2, 1, 2, 1, 2, 1], 17);
        assert_eq!(xd, 0);
        assert_eq!(sample.dxd[xd], 9);
        assert_eq!(sample.sxd[xd].len(), 6);

        sample.allocate();
        assert_eq!(sample.one_d[1].len(), 2);
        assert_eq!(sample.two_d[0].len(), 8);
        assert_eq!(sample.xd[0].len(), 17 * 9);
    }
}
