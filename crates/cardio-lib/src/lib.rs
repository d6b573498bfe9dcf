//! Beat analysis and surrogate waveform synthesis for physiological traces.

pub mod analysis;
pub mod cache;
pub mod detectors;
pub mod error;
pub mod interp;
pub mod io;
pub mod metrics;
pub mod noise;
pub mod pipeline;
pub mod plot;
pub mod signal;
pub mod synth;

pub use analysis::*;
pub use detectors::*;
pub use error::{CardioError, Result};
pub use metrics::*;
pub use signal::*;
pub use synth::*;
