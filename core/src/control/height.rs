use crate::math::StatsHelper;
use crate::prelude::ParticleObservation;
use serde::{Deserialize, Serialize};

/// One process-variable sample: mean particle height measured up from the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightSample {
    /// Pixels above the bottom edge.
    pub raw: f64,
    /// `raw / frame_height`.
    pub normalized: f64,
}

pub struct HeightEstimator;

impl HeightEstimator {
    /// `None` when no particle is visible or the frame has no rows; the control
    /// tick must then withhold actuation.
    pub fn estimate(particles: &[ParticleObservation], frame_height: u32) -> Option<HeightSample> {
        if frame_height == 0 {
            return None;
        }
        let heights: Vec<f64> = particles
            .iter()
            .map(|p| frame_height as f64 - p.y as f64)
            .collect();
        let raw = StatsHelper::mean(&heights)?;
        Some(HeightSample {
            raw,
            normalized: raw / frame_height as f64,
        })
    }
}
