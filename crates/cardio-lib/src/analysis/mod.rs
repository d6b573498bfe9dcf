pub mod envelope;
pub mod trend;

pub use envelope::*;
pub use trend::*;
