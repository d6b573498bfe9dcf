pub mod export;
pub mod recording;
pub mod text;

pub use recording::Recording;
