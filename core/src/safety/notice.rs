use crate::actuator::ActuatorError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    SafetyViolation,
    DriverFault,
    ZeroFailure,
}

/// Modal-equivalent message for the operator. Category 2 and 3 failures must reach
/// the operator through one of these, not only through the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorNotice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl OperatorNotice {
    pub fn from_actuator_error(err: &ActuatorError) -> Self {
        match err {
            ActuatorError::SafetyViolation { code, zeroed, .. } => Self {
                kind: NoticeKind::SafetyViolation,
                title: "Safety Protocol".to_string(),
                message: format!(
                    "Magnet amp is above the safe operating value. Magnets {}. Contact VANTAGE Support with error code {} before reusing the software.",
                    zeroed_phrase(*zeroed),
                    code
                ),
            },
            ActuatorError::DriverFault { source, zeroed } => Self {
                kind: NoticeKind::DriverFault,
                title: "Magnet Error".to_string(),
                message: format!(
                    "Failed to apply magnet voltages: {}. Magnets {}.",
                    source,
                    zeroed_phrase(*zeroed)
                ),
            },
            ActuatorError::ZeroFailed { source } => Self {
                kind: NoticeKind::ZeroFailure,
                title: super::alert::CRITICAL_TITLE.to_string(),
                message: format!("{} ({})", super::alert::ZERO_FAILURE_MESSAGE, source),
            },
        }
    }
}

fn zeroed_phrase(zeroed: bool) -> &'static str {
    if zeroed {
        "were zeroed"
    } else {
        "could NOT be zeroed"
    }
}
