use image::{GrayImage, RgbImage};
use imageproc::contours::Contour;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One acquisition tick worth of colour samples.
pub type Frame = RgbImage;

/// Expected colour of a tagged particle population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Red,
    Green,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Red => "red",
            Tag::Green => "green",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A particle seen in a single frame. No identity is carried across frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleObservation {
    pub x: i32,
    pub y: i32,
    pub area: f64,
    pub tag: Tag,
    pub radius: i32,
}

/// Exclusive area band a contour must fall into to count as a particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeBand {
    min: f64,
    max: f64,
}

impl SizeBand {
    pub fn new(min: f64, max: f64) -> VisionResult<Self> {
        if !(min.is_finite() && max.is_finite()) || min >= max {
            return Err(VisionError::InvalidSizeBand { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Strict on both ends: `min < area < max`.
    pub fn admits(&self, area: f64) -> bool {
        self.min < area && area < self.max
    }
}

impl Default for SizeBand {
    fn default() -> Self {
        Self {
            min: 30.0,
            max: 600.0,
        }
    }
}

/// Common error type for the vision stages.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VisionError {
    #[error("invalid size band: min {min} must be below max {max}")]
    InvalidSizeBand { min: f64, max: f64 },
}

pub type VisionResult<T> = Result<T, VisionError>;

/// Splits a cleaned binary image into the outlines of candidate particles.
///
/// Implementations must be deterministic for a given input so repeated runs over
/// the same mask yield the same particle list.
pub trait SeparationStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn separate(&self, binary: &GrayImage) -> Vec<Contour<i32>>;
}
