pub mod bsdf;
pub mod bxdf;
pub mod demo;
pub mod integrator;
pub mod interaction;
pub mod light;
pub mod lowdiscrepancy;
pub mod material;
pub mod memory;
pub mod primitive;
pub mod sample;
pub mod sampler;
pub mod sampling;
pub mod scene;
pub mod shape;
pub mod wavelengths;

pub use scene::{Scene, ThreadSignal};
