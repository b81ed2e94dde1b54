pub mod forecast;
pub mod geometry;
pub mod plan;
pub mod zone;

pub use forecast::*;
pub use geometry::*;
pub use plan::*;
pub use zone::*;
