pub mod errors;
pub mod grounding;
pub mod params;

pub use errors::*;
pub use grounding::*;
pub use params::*;
