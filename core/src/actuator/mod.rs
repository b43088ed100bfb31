pub mod limits;
pub mod magnet;

pub use limits::{MagnetSide, SafetyEnvelope, MAGNET_ENVELOPE, SAFETY_ERROR_CODE};
pub use magnet::{ActuatorCommand, ActuatorError, MagnetActuator, PidActuation};
