//! Page image cleanup ahead of recognition.

pub mod pipeline;
pub mod steps;

pub use pipeline::{Pipeline, Preset, StepTiming};
