use crate::common::spectrum::Spectrum;

pub const WAVELENGTH_SAMPLES: usize = 4;
pub const WAVELENGTH_START: f32 = 380.0;
pub const WAVELENGTH_END: f32 = 720.0;

// RGB response of each wavelength bin, averaging to white over all bins.
const BIN_TINTS: [[f32; 3]; WAVELENGTH_SAMPLES] = [
    [0.4, 0.0, 3.0],
    [0.0, 1.6, 1.0],
    [0.6, 2.4, 0.0],
    [3.0, 0.0, 0.0],
];

/// Stratified wavelengths carried by one path.
#[derive(Clone, Debug)]
pub struct SpectrumWavelengths {
    pub w: [f32; WAVELENGTH_SAMPLES],
    pub single_w: usize,
    pub single: bool,
}

impl Default for SpectrumWavelengths {
    fn default() -> Self {
        let mut swl = Self {
            w: [0.0; WAVELENGTH_SAMPLES],
            single_w: 0,
            single: false,
        };
        swl.sample(0.5);
        swl
    }
}

impl SpectrumWavelengths {
    /// Draws one wavelength per bin, jittered by the same offset, and picks the
    /// bin a dispersive event would collapse to.
    pub fn sample(&mut self, u: f32) {
        self.single = false;
        let u = u * WAVELENGTH_SAMPLES as f32;
        self.single_w = (u.floor() as usize).min(WAVELENGTH_SAMPLES - 1);
        let u = u - self.single_w as f32;

        let offset = (WAVELENGTH_END - WAVELENGTH_START) / WAVELENGTH_SAMPLES as f32;
        let mut waveln = WAVELENGTH_START + u * offset;
        for w in self.w.iter_mut() {
            *w = waveln;
            waveln += offset;
        }
    }

    /// Collapses the path to a single wavelength and returns it.
    pub fn sample_single(&mut self) -> f32 {
        self.single = true;
        self.w[self.single_w]
    }

    /// Throughput tint of the path once collapsed to a single wavelength.
    pub fn single_tint(&self) -> Spectrum {
        if !self.single {
            return Spectrum::new(1.0);
        }
        let t = BIN_TINTS[self.single_w];
        Spectrum::from_floats(t[0], t[1], t[2])
    }
}
