pub mod rr;
pub mod summary;

pub use rr::*;
pub use summary::*;
