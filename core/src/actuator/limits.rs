use serde::{Deserialize, Serialize};
use std::fmt;

/// Volts per unit of operator amplitude on the manual path.
pub const MANUAL_VOLTS_PER_AMP: f64 = 0.57;
/// Volts per unit of clamped PID output.
pub const PID_VOLTS_PER_UNIT: f64 = 2.28;
/// Nominal maximum amplitude reported for a saturated PID output.
pub const PID_AMP_PER_UNIT: f64 = 3.0;
/// Error code shown to the operator for a safety-band rejection.
pub const SAFETY_ERROR_CODE: &str = "SP1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MagnetSide {
    Upper,
    Lower,
}

impl fmt::Display for MagnetSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MagnetSide::Upper => "upper",
            MagnetSide::Lower => "lower",
        })
    }
}

/// Inclusive voltage band per magnet channel.
///
/// The bands are deliberately asymmetric; they are hardware constants and must
/// not be unified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyEnvelope {
    pub upper: (f64, f64),
    pub lower: (f64, f64),
}

pub const MAGNET_ENVELOPE: SafetyEnvelope = SafetyEnvelope {
    upper: (-2.28, 2.28),
    lower: (-2.28, 3.0),
};

impl SafetyEnvelope {
    /// Upper is checked first. NaN is always outside.
    pub fn check(&self, upper_volts: f64, lower_volts: f64) -> Result<(), MagnetSide> {
        if !within(self.upper, upper_volts) {
            return Err(MagnetSide::Upper);
        }
        if !within(self.lower, lower_volts) {
            return Err(MagnetSide::Lower);
        }
        Ok(())
    }
}

impl Default for SafetyEnvelope {
    fn default() -> Self {
        MAGNET_ENVELOPE
    }
}

fn within((low, high): (f64, f64), volts: f64) -> bool {
    volts >= low && volts <= high
}
