//! Particle detection and magnet control core for the VANTAGE capillary rig.
//!
//! Everything here is pure computation over frames and particle lists, plus the
//! two hardware contracts (frame source, DAC driver) and the safety-critical
//! magnet actuator. Scheduling lives in the rig binary.

pub mod actuator;
pub mod control;
pub mod hardware;
pub mod math;
pub mod prelude;
pub mod project;
pub mod roi;
pub mod safety;
pub mod telemetry;
pub mod vision;

pub use actuator::{ActuatorCommand, ActuatorError, MagnetActuator, PidActuation};
pub use control::{HeightEstimator, HeightSample, PidController, PidGains};
pub use hardware::{DacDriver, DriverError, FrameSource, SimulatedBoard};
pub use prelude::{Frame, ParticleObservation, SizeBand, Tag};
pub use project::{ConfigError, ProjectRecord, ProjectSettings, Resolution};
pub use roi::{Region, RegionClassifier, RegionSet, RoiTally};
pub use safety::{CriticalAlert, OperatorNotice};
pub use telemetry::{AuditLog, MetricsRecorder, Severity};
pub use vision::{ColorSegmenter, ExtractionStrategy, ParticleExtractor};
