use super::steps;
use crate::error::ExtractError;
use image::{DynamicImage, GrayImage};
use serde::Serialize;
use std::time::Instant;

/// Preprocessing presets, from cheapest to most invasive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Hand the page to the engine untouched
    None,
    /// Grayscale only, for clean digital-origin scans
    Minimal,
    /// Grayscale, upscale, contrast stretch, sharpen
    #[default]
    Default,
    /// Adds speckle removal and binarization for faxed or photocopied reports
    Aggressive,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Default => "default",
            Self::Aggressive => "aggressive",
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: &'static str,
    pub time_ms: u64,
}

type Step = fn(GrayImage) -> Result<GrayImage, ExtractError>;

const DEFAULT_STEPS: &[(&str, Step)] = &[
    ("upscale", steps::upscale),
    ("normalize", steps::normalize),
    ("sharpen", steps::sharpen),
];

const AGGRESSIVE_STEPS: &[(&str, Step)] = &[
    ("upscale", steps::upscale),
    ("denoise", steps::denoise),
    ("normalize", steps::normalize),
    ("sharpen", steps::sharpen),
    ("binarize", steps::binarize),
];

pub struct Pipeline {
    preset: Preset,
}

impl Pipeline {
    pub fn new(preset: Preset) -> Self {
        Self { preset }
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    fn steps(&self) -> &'static [(&'static str, Step)] {
        match self.preset {
            Preset::None | Preset::Minimal => &[],
            Preset::Default => DEFAULT_STEPS,
            Preset::Aggressive => AGGRESSIVE_STEPS,
        }
    }

    /// Run the preset's steps on one page image
    pub fn process(
        &self,
        image: DynamicImage,
    ) -> Result<(DynamicImage, Vec<StepTiming>), ExtractError> {
        if self.preset == Preset::None {
            return Ok((image, Vec::new()));
        }

        let mut timings = Vec::new();
        let started = Instant::now();
        let mut gray = steps::grayscale(image)?;
        timings.push(StepTiming {
            name: "grayscale",
            time_ms: started.elapsed().as_millis() as u64,
        });

        for &(name, step) in self.steps() {
            let started = Instant::now();
            gray = step(gray)?;
            timings.push(StepTiming {
                name,
                time_ms: started.elapsed().as_millis() as u64,
            });
        }

        tracing::debug!(preset = %self.preset, ?timings, "Page image preprocessed");
        Ok((DynamicImage::ImageLuma8(gray), timings))
    }
}
