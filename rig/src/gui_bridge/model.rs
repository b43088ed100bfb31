use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use vantagecore::actuator::ActuatorCommand;
use vantagecore::control::{HeightSample, PidGains};
use vantagecore::prelude::ParticleObservation;
use vantagecore::project::ProjectRecord;
use vantagecore::roi::RoiTally;
use vantagecore::safety::{AlertStatus, OperatorNotice};
use vantagecore::telemetry::TickCounters;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ParticleStats {
    pub count: usize,
    /// 0 when no particles were found.
    pub mean_area: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameReport {
    pub width: u32,
    pub height: u32,
    pub red: ParticleStats,
    pub green: ParticleStats,
    pub tally: RoiTally,
    pub particles: Vec<ParticleObservation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PidReport {
    /// Normalised to `[0, 1]`.
    pub setpoint: f64,
    pub height: f64,
    pub output: f64,
    pub intended_amplitude: f64,
    /// `None` while the PID gate is off.
    pub applied_amplitude: Option<f64>,
}

/// Outcome of the latest control tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ControlReport {
    /// No particles visible, so the magnets were left alone.
    Withheld,
    Actuated {
        sample: HeightSample,
        pid: PidReport,
    },
    Faulted {
        sample: HeightSample,
        message: String,
    },
}

/// Everything an operator display needs, refreshed after each tick and command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusModel {
    pub frame: Option<FrameReport>,
    pub control: Option<ControlReport>,
    pub pid_active: bool,
    /// Operator scale, 0 to 100.
    pub setpoint: f64,
    pub gains: Option<PidGains>,
    pub strategy: String,
    pub magnets: ActuatorCommand,
    pub simulate_zero_failure: bool,
    pub counters: TickCounters,
    pub notice: Option<OperatorNotice>,
    pub alert: Option<AlertStatus>,
}

/// Latest status and project record, shared between the frame loop and the bridge.
#[derive(Clone, Debug)]
pub struct StatusBoard {
    status: Arc<RwLock<StatusModel>>,
    project: Arc<RwLock<ProjectRecord>>,
}

impl StatusBoard {
    pub fn new(project: ProjectRecord) -> Self {
        Self {
            status: Arc::new(RwLock::new(StatusModel::default())),
            project: Arc::new(RwLock::new(project)),
        }
    }

    pub fn publish(&self, status: StatusModel) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub fn publish_project(&self, project: ProjectRecord) {
        *self.project.write().unwrap_or_else(PoisonError::into_inner) = project;
    }

    pub fn set_alert(&self, alert: Option<AlertStatus>) {
        self.status
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .alert = alert;
    }

    pub fn snapshot(&self) -> StatusModel {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn project(&self) -> ProjectRecord {
        self.project
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
