//! Surrogate waveform synthesis: PQRST beats tiled along an RR sequence.

pub mod assemble;
pub mod beat;

pub use assemble::*;
pub use beat::*;
