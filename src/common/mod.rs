pub mod bounds;
pub mod camera;
pub mod color;
pub mod config;
pub mod contribution;
pub mod film;
pub mod filter;
pub mod math;
pub mod ray;
pub mod spectrum;

pub use camera::Camera;
