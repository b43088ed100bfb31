use crate::generator::profile::MagnetField;
use crate::gui_bridge::model::{ControlReport, FrameReport, ParticleStats, PidReport, StatusModel};
use crate::workflow::command::OperatorCommand;
use anyhow::{anyhow, bail, Context};
use log::{debug, error, info};
use vantagecore::actuator::{ActuatorCommand, ActuatorError, MagnetActuator};
use vantagecore::control::{HeightEstimator, PidController, PidGains};
use vantagecore::hardware::{fit_frame, DacDriver, FrameSource};
use vantagecore::math::StatsHelper;
use vantagecore::prelude::{Frame, ParticleObservation, SizeBand, Tag};
use vantagecore::project::{ProjectRecord, ProjectSettings, Resolution};
use vantagecore::roi::{Region, RegionClassifier, RegionSet};
use vantagecore::safety::OperatorNotice;
use vantagecore::telemetry::{AuditLog, MetricsRecorder};
use vantagecore::vision::{ColorSegmenter, EnhanceConfig, ExtractionStrategy, ParticleExtractor};

/// Segmenter and extractor for one tagged population.
struct TagPipeline {
    tag: Tag,
    segmenter: ColorSegmenter,
    extractor: ParticleExtractor,
}

impl TagPipeline {
    fn new(tag: Tag, threshold: u8, strategy: ExtractionStrategy, band: SizeBand, enhance: EnhanceConfig) -> Self {
        Self {
            tag,
            segmenter: ColorSegmenter::new(threshold),
            extractor: ParticleExtractor::new(strategy, band, enhance),
        }
    }

    fn run(&self, frame: &Frame) -> Vec<ParticleObservation> {
        let isolated = self.segmenter.isolate_gray(frame);
        self.extractor.extract(&isolated, self.tag)
    }
}

/// Controller settings applied when a session starts.
#[derive(Debug, Clone, Copy)]
pub struct ControlSettings {
    pub gains: PidGains,
    pub setpoint: f64,
    pub pid_active: bool,
    pub dt: f64,
    pub strategy: ExtractionStrategy,
    pub enhance: EnhanceConfig,
}

/// All per-session state the two ticks operate on. Owned by a single task, so
/// every actuator write is serialised through it.
pub struct Session<D: DacDriver> {
    source: Box<dyn FrameSource>,
    actuator: MagnetActuator<D>,
    audit: AuditLog,
    metrics: MetricsRecorder,
    field: MagnetField,
    red: TagPipeline,
    green: TagPipeline,
    regions: RegionSet,
    pid: PidController,
    setpoint: f64,
    pid_active: bool,
    dt: f64,
    particles: Vec<ParticleObservation>,
    frame_height: u32,
    frame: Option<FrameReport>,
    control: Option<ControlReport>,
    notice: Option<OperatorNotice>,
    unseen_notice: bool,
}

impl<D: DacDriver> Session<D> {
    pub fn new(
        mut source: Box<dyn FrameSource>,
        actuator: MagnetActuator<D>,
        audit: AuditLog,
        project: ProjectSettings,
        control: ControlSettings,
        field: MagnetField,
    ) -> Self {
        source.set_camera_port(project.camera_port);
        source.set_resolution(project.resolution);
        let pipeline = |tag, threshold| {
            TagPipeline::new(tag, threshold, control.strategy, project.size_band, control.enhance)
        };
        info!(
            "session starting: camera port {} at {}, strategy {:?}",
            project.camera_port, project.resolution, control.strategy
        );
        Self {
            source,
            actuator,
            audit,
            metrics: MetricsRecorder::new(),
            field,
            red: pipeline(Tag::Red, project.red_threshold),
            green: pipeline(Tag::Green, project.green_threshold),
            regions: project.regions,
            pid: PidController::new(control.gains),
            setpoint: control.setpoint,
            pid_active: control.pid_active,
            dt: control.dt,
            particles: Vec::new(),
            frame_height: project.resolution.height,
            frame: None,
            control: None,
            notice: None,
            unseen_notice: false,
        }
    }

    /// Acquire, segment, extract and classify one frame. A failed read skips the tick.
    pub fn frame_tick(&mut self) -> Option<&FrameReport> {
        let Some(frame) = self.source.read() else {
            self.metrics.record_missed_frame();
            debug!("frame read failed, skipping tick");
            return None;
        };
        let frame = fit_frame(frame, self.source.resolution());
        Some(self.process_frame(&frame))
    }

    pub fn process_frame(&mut self, frame: &Frame) -> &FrameReport {
        let mut particles = self.red.run(frame);
        let red = stats(&particles);
        let greens = self.green.run(frame);
        let green = stats(&greens);
        particles.extend(greens);

        let tally = RegionClassifier::classify(&particles, &self.regions);
        self.frame_height = frame.height();
        self.particles = particles.clone();
        self.metrics.record_frame();
        self.frame.insert(FrameReport {
            width: frame.width(),
            height: frame.height(),
            red,
            green,
            tally,
            particles,
        })
    }

    /// Height estimate, PID and actuation from the most recent particle list.
    pub fn control_tick(&mut self) -> &ControlReport {
        self.metrics.record_control_tick();
        let Some(sample) = HeightEstimator::estimate(&self.particles, self.frame_height) else {
            self.metrics.record_withheld();
            return self.control.insert(ControlReport::Withheld);
        };

        let setpoint = self.setpoint / 100.0;
        let report = match self.pid.compute(setpoint, sample.normalized, self.dt) {
            Err(err) => ControlReport::Faulted {
                sample,
                message: err.to_string(),
            },
            Ok(output) => match self.actuator.apply_pid_output(output, self.pid_active) {
                Ok(actuation) => {
                    if actuation.applied.is_some() {
                        self.field.set(self.actuator.applied_amplitude());
                    }
                    ControlReport::Actuated {
                        sample,
                        pid: PidReport {
                            setpoint,
                            height: sample.normalized,
                            output,
                            intended_amplitude: actuation.intended_amplitude,
                            applied_amplitude: actuation.applied.map(|_| actuation.intended_amplitude),
                        },
                    }
                }
                Err(err) => {
                    let message = err.to_string();
                    self.raise(&err);
                    ControlReport::Faulted { sample, message }
                }
            },
        };
        self.control.insert(report)
    }

    /// Applies one operator edit and returns a confirmation for the operator.
    pub fn apply(&mut self, command: OperatorCommand) -> anyhow::Result<String> {
        match command {
            OperatorCommand::SetSetpoint { value } => {
                if !(0.0..=100.0).contains(&value) {
                    bail!("setpoint {} is outside 0..=100", value);
                }
                self.setpoint = value;
                Ok(format!("setpoint {}", value))
            }
            OperatorCommand::TuneGains { kp, ki, kd } => {
                self.pid.set_gains(PidGains { kp, ki, kd });
                self.audit
                    .info(format!("PID re-tuned: kp={} ki={} kd={}", kp, ki, kd));
                Ok(format!("gains kp={} ki={} kd={}", kp, ki, kd))
            }
            OperatorCommand::SetPidActive { active } => Ok(self.set_pid_active(active)),
            OperatorCommand::ResetPid => {
                self.pid.reset();
                self.audit.info("PID history reset by operator");
                Ok("PID reset".to_string())
            }
            OperatorCommand::SetThreshold { tag, value } => {
                if value > 100 {
                    bail!("{} threshold {} is outside 0..=100", tag, value);
                }
                self.pipeline_mut(tag).segmenter.set_threshold(value);
                Ok(format!("{} threshold {}", tag, value))
            }
            OperatorCommand::SetSizeBand { tag, min, max } => {
                let band = SizeBand::new(min, max)?;
                self.pipeline_mut(tag).extractor.set_size_band(band);
                Ok(format!("{} size band {}..{}", tag, min, max))
            }
            OperatorCommand::SetStrategy { strategy } => {
                self.red.extractor.set_strategy(strategy);
                self.green.extractor.set_strategy(strategy);
                Ok(format!("strategy {}", self.red.extractor.strategy_name()))
            }
            OperatorCommand::AddRegion { tag, rect } => {
                let region = Region::from_rect(rect)?;
                self.regions.add(tag, region);
                Ok(format!("{} region {:?}", tag, region.to_rect()))
            }
            OperatorCommand::ClearRegions => {
                self.regions.clear();
                Ok("regions cleared".to_string())
            }
            OperatorCommand::ManualAmplitude { amplitude } => {
                match self.actuator.apply_manual_amplitude(amplitude) {
                    Ok(applied) => Ok(applied_message(applied)),
                    Err(err) => {
                        self.raise(&err);
                        Err(anyhow!(err))
                    }
                }
            }
            OperatorCommand::SetResolution { resolution } => {
                let resolution: Resolution = resolution
                    .parse()
                    .context("changing capture resolution")?;
                self.source.set_resolution(resolution);
                Ok(format!("resolution {}", resolution))
            }
            OperatorCommand::SetCameraPort { port } => {
                self.source.set_camera_port(port);
                Ok(format!("camera port {}", port))
            }
            OperatorCommand::SimulateZeroFailure { enabled } => {
                self.actuator.set_simulated_zero_failure(enabled);
                Ok(format!("simulated zero failure {}", enabled))
            }
        }
    }

    /// A new control epoch starts whenever the gate opens, so history is cleared then.
    fn set_pid_active(&mut self, active: bool) -> String {
        if active && !self.pid_active {
            self.pid.reset();
            self.audit.info("PID activated; controller history reset");
        } else if !active && self.pid_active {
            self.audit.info("PID deactivated; magnet writes suspended");
        }
        self.pid_active = active;
        format!("PID {}", if active { "active" } else { "inactive" })
    }

    fn pipeline_mut(&mut self, tag: Tag) -> &mut TagPipeline {
        match tag {
            Tag::Red => &mut self.red,
            Tag::Green => &mut self.green,
        }
    }

    fn raise(&mut self, err: &ActuatorError) {
        match err {
            ActuatorError::SafetyViolation { .. } => self.metrics.record_safety_rejection(),
            _ => self.metrics.record_driver_fault(),
        }
        error!("{}", err);
        self.notice = Some(OperatorNotice::from_actuator_error(err));
        self.unseen_notice = true;
    }

    /// The latest notice, once, for the console to show.
    pub fn take_new_notice(&mut self) -> Option<OperatorNotice> {
        if std::mem::take(&mut self.unseen_notice) {
            self.notice.clone()
        } else {
            None
        }
    }

    pub fn detect_board(&mut self) -> anyhow::Result<u32> {
        Ok(self.actuator.detect_board()?)
    }

    /// Mandatory zeroing at the end of the session.
    pub fn zero_for_shutdown(&mut self) -> Result<(), ActuatorError> {
        let result = self.actuator.zero_on_shutdown();
        match &result {
            Ok(()) => self.field.set(0.0),
            Err(err) => self.raise(err),
        }
        result
    }

    pub fn release_source(&mut self) {
        self.source.release();
        self.audit.info("Frame source released");
    }

    #[cfg(test)]
    pub fn actuator(&self) -> &MagnetActuator<D> {
        &self.actuator
    }

    #[cfg(test)]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn project_settings(&self) -> ProjectSettings {
        ProjectSettings {
            camera_port: self.source.camera_port(),
            resolution: self.source.resolution(),
            red_threshold: self.red.segmenter.band().threshold(),
            green_threshold: self.green.segmenter.band().threshold(),
            size_band: covering_band(self.red.extractor.size_band(), self.green.extractor.size_band()),
            regions: self.regions.clone(),
        }
    }

    pub fn project_record(&self) -> ProjectRecord {
        ProjectRecord::from_settings(&self.project_settings())
    }

    pub fn status(&self) -> StatusModel {
        StatusModel {
            frame: self.frame.clone(),
            control: self.control.clone(),
            pid_active: self.pid_active,
            setpoint: self.setpoint,
            gains: Some(self.pid.gains()),
            strategy: self.red.extractor.strategy_name().to_string(),
            magnets: self.actuator.last_command(),
            simulate_zero_failure: self.actuator.simulated_zero_failure(),
            counters: self.metrics.snapshot(),
            notice: self.notice.clone(),
            alert: None,
        }
    }

    #[cfg(test)]
    pub fn last_command(&self) -> ActuatorCommand {
        self.actuator.last_command()
    }
}

/// Operator confirmation for a manual write.
fn applied_message(command: ActuatorCommand) -> String {
    format!(
        "Magnet settings applied: Up = {}V, Bottom = {}V",
        command.upper_voltage, command.lower_voltage
    )
}

fn stats(particles: &[ParticleObservation]) -> ParticleStats {
    let areas: Vec<f64> = particles.iter().map(|p| p.area).collect();
    ParticleStats {
        count: particles.len(),
        mean_area: StatsHelper::mean_or_zero(&areas),
    }
}

/// The project file holds one band for both tags; the saved band covers both.
fn covering_band(a: SizeBand, b: SizeBand) -> SizeBand {
    SizeBand::new(a.min().min(b.min()), a.max().max(b.max())).unwrap_or(a)
}
