pub mod generator;
pub mod mesh;

pub use mesh::{Domain, Mesh, Side};
