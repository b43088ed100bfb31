use crate::actuator::limits::{
    MagnetSide, SafetyEnvelope, MANUAL_VOLTS_PER_AMP, PID_AMP_PER_UNIT, PID_VOLTS_PER_UNIT,
    SAFETY_ERROR_CODE,
};
use crate::hardware::dac::{DacDriver, DriverError, LOWER_MAGNET_CHANNEL, UPPER_MAGNET_CHANNEL};
use crate::telemetry::{AuditLog, Severity};
use serde::{Deserialize, Serialize};

/// Voltages for the two complementary magnet channels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub upper_voltage: f64,
    pub lower_voltage: f64,
}

impl ActuatorCommand {
    pub const ZERO: ActuatorCommand = ActuatorCommand {
        upper_voltage: 0.0,
        lower_voltage: 0.0,
    };

    /// From a PID output already clamped to `[-1, 1]`.
    pub fn from_pid_output(clamped: f64) -> Self {
        Self {
            upper_voltage: clamped * PID_VOLTS_PER_UNIT,
            lower_voltage: -clamped * PID_VOLTS_PER_UNIT,
        }
    }

    /// From an operator-entered amplitude.
    pub fn from_manual_amplitude(amplitude: f64) -> Self {
        Self {
            upper_voltage: amplitude * MANUAL_VOLTS_PER_AMP,
            lower_voltage: amplitude * -MANUAL_VOLTS_PER_AMP,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ActuatorError {
    #[error(
        "magnet amp above safe operating value ({side} channel {volts} V); contact support with error code {code}"
    )]
    SafetyViolation {
        side: MagnetSide,
        volts: f64,
        code: &'static str,
        zeroed: bool,
    },
    #[error("failed to apply voltages: {source}")]
    DriverFault {
        #[source]
        source: DriverError,
        zeroed: bool,
    },
    #[error("failed to zero magnets: {source}")]
    ZeroFailed {
        #[source]
        source: DriverError,
    },
}

/// Result of feeding one PID output through the closed-loop path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidActuation {
    pub clamped_output: f64,
    /// `clamped_output * 3`, reported whether or not the gate is open.
    pub intended_amplitude: f64,
    /// `None` when the PID gate was closed and nothing was written.
    pub applied: Option<ActuatorCommand>,
}

/// Owns the DAC driver and every write to the magnet channels.
pub struct MagnetActuator<D: DacDriver> {
    driver: D,
    audit: AuditLog,
    envelope: SafetyEnvelope,
    last_command: ActuatorCommand,
    applied_amplitude: f64,
    simulate_zero_failure: bool,
    /// Set by any non-zero or failed write, cleared by a completed zeroing.
    energised: bool,
}

impl<D: DacDriver> MagnetActuator<D> {
    pub fn new(driver: D, audit: AuditLog) -> Self {
        Self {
            driver,
            audit,
            envelope: SafetyEnvelope::default(),
            last_command: ActuatorCommand::ZERO,
            applied_amplitude: 0.0,
            simulate_zero_failure: false,
            energised: false,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn last_command(&self) -> ActuatorCommand {
        self.last_command
    }

    /// True while either channel may still carry a voltage.
    pub fn is_energised(&self) -> bool {
        self.energised
    }

    /// Amplitude of the last successful closed-loop write.
    pub fn applied_amplitude(&self) -> f64 {
        self.applied_amplitude
    }

    pub fn set_simulated_zero_failure(&mut self, enabled: bool) {
        self.simulate_zero_failure = enabled;
        self.audit.warning(format!(
            "Magnet zero error simulation {}",
            if enabled { "enabled" } else { "disabled" }
        ));
    }

    pub fn simulated_zero_failure(&self) -> bool {
        self.simulate_zero_failure
    }

    pub fn detect_board(&mut self) -> Result<u32, DriverError> {
        match self.driver.detect_board() {
            Ok(id) => {
                self.audit.info(format!("Detected DAC board id {}", id));
                Ok(id)
            }
            Err(err) => {
                self.audit.error(format!("Board detection failed: {}", err));
                Err(err)
            }
        }
    }

    /// Closed-loop path: clamp to `[-1, 1]`, then write only when `active`.
    pub fn apply_pid_output(&mut self, output: f64, active: bool) -> Result<PidActuation, ActuatorError> {
        let clamped = output.clamp(-1.0, 1.0);
        let intended_amplitude = clamped * PID_AMP_PER_UNIT;
        if !active {
            return Ok(PidActuation {
                clamped_output: clamped,
                intended_amplitude,
                applied: None,
            });
        }

        let command = ActuatorCommand::from_pid_output(clamped);
        self.guard(command)?;
        self.commit(command)?;
        self.applied_amplitude = intended_amplitude;
        self.audit.info(format!(
            "Magnet strength adjusted: Up = {}V, Bottom = {}V, Amp = {:.2}",
            command.upper_voltage, command.lower_voltage, intended_amplitude
        ));
        Ok(PidActuation {
            clamped_output: clamped,
            intended_amplitude,
            applied: Some(command),
        })
    }

    /// Manual/calibration path. The requested voltages are never applied when either
    /// channel falls outside its band; both channels are zeroed instead.
    pub fn apply_manual_amplitude(&mut self, amplitude: f64) -> Result<ActuatorCommand, ActuatorError> {
        let command = ActuatorCommand::from_manual_amplitude(amplitude);
        self.guard(command)?;
        self.audit.info(format!(
            "Attempting to set voltages: Up = {}V, Bottom = {}V - Amp: {}",
            command.upper_voltage, command.lower_voltage, amplitude
        ));
        self.commit(command)?;
        self.audit.info("Magnet settings applied successfully.");
        Ok(command)
    }

    /// Drives both channels to 0 V. Both writes are attempted even if the first fails.
    pub fn zero(&mut self) -> Result<(), DriverError> {
        let upper = self.write(UPPER_MAGNET_CHANNEL, 0.0);
        let lower = self.write(LOWER_MAGNET_CHANNEL, 0.0);
        upper.and(lower)?;
        self.last_command = ActuatorCommand::ZERO;
        self.applied_amplitude = 0.0;
        self.energised = false;
        Ok(())
    }

    /// Mandatory zeroing when a session ends. A failure here leaves the magnets in an
    /// unknown state and must be escalated to the operator.
    pub fn zero_on_shutdown(&mut self) -> Result<(), ActuatorError> {
        let result = if self.simulate_zero_failure {
            Err(DriverError::Simulated)
        } else {
            self.zero()
        };
        match result {
            Ok(()) => {
                self.audit.info("Magnet settings zeroed.");
                Ok(())
            }
            Err(source) => {
                self.audit.critical(format!("Failed to zero magnets: {}", source));
                Err(ActuatorError::ZeroFailed { source })
            }
        }
    }

    fn guard(&mut self, command: ActuatorCommand) -> Result<(), ActuatorError> {
        let Err(side) = self.envelope.check(command.upper_voltage, command.lower_voltage) else {
            return Ok(());
        };
        let volts = match side {
            MagnetSide::Upper => command.upper_voltage,
            MagnetSide::Lower => command.lower_voltage,
        };
        let zeroed = self.zero().is_ok();
        self.audit.warning(format!(
            "Magnet settings zeroed due to unsafe {} magnet value.",
            match side {
                MagnetSide::Upper => "upper",
                MagnetSide::Lower => "bottom",
            }
        ));
        self.audit.critical(format!(
            "Safety Protocol: magnet amp above safe operating value ({} = {}V). Contact VANTAGE Support with error code {} before reusing the software.",
            side, volts, SAFETY_ERROR_CODE
        ));
        Err(ActuatorError::SafetyViolation {
            side,
            volts,
            code: SAFETY_ERROR_CODE,
            zeroed,
        })
    }

    fn commit(&mut self, command: ActuatorCommand) -> Result<(), ActuatorError> {
        let written = self
            .write(UPPER_MAGNET_CHANNEL, command.upper_voltage)
            .and_then(|_| self.write(LOWER_MAGNET_CHANNEL, command.lower_voltage));
        match written {
            Ok(()) => {
                self.last_command = command;
                Ok(())
            }
            Err(source) => {
                self.audit.critical(format!("Failed to apply voltages: {}", source));
                let zeroed = self.zero().is_ok();
                if zeroed {
                    self.audit.warning("Magnet settings zeroed due to error.");
                } else {
                    self.audit
                        .critical("Magnet zeroing after a failed write also failed; channel state unknown.");
                }
                Err(ActuatorError::DriverFault { source, zeroed })
            }
        }
    }

    fn write(&mut self, channel: u8, volts: f64) -> Result<(), DriverError> {
        let written = self.driver.set_channel_voltage(channel, volts);
        if written.is_err() || volts != 0.0 {
            self.energised = true;
        }
        match written {
            Ok(()) => {
                self.audit
                    .record(Severity::Debug, format!("DAC channel {} <- {}V", channel, volts));
                Ok(())
            }
            Err(err) => {
                self.audit
                    .error(format!("DAC channel {} <- {}V failed: {}", channel, volts, err));
                Err(err)
            }
        }
    }
}

/// Last line of defence for exits that bypass the shutdown sequence, such as an
/// early error return or a panic unwinding through the frame loop.
impl<D: DacDriver> Drop for MagnetActuator<D> {
    fn drop(&mut self) {
        if !self.energised {
            return;
        }
        match self.zero() {
            Ok(()) => self
                .audit
                .warning("Magnet settings zeroed on release; the session ended without a shutdown zeroing."),
            Err(err) => self.audit.critical(format!(
                "Failed to zero magnets on release: {}. Manually shut down the power supplies.",
                err
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedBoard;
    use std::sync::{Arc, Mutex};

    /// Board handle that outlives the actuator, to observe what happens on drop.
    #[derive(Clone)]
    struct SharedBoard(Arc<Mutex<SimulatedBoard>>);

    impl SharedBoard {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(SimulatedBoard::new(1))))
        }

        fn voltage(&self, channel: u8) -> Option<f64> {
            self.0.lock().unwrap().voltage(channel)
        }
    }

    impl DacDriver for SharedBoard {
        fn set_channel_voltage(&mut self, channel: u8, volts: f64) -> Result<(), DriverError> {
            self.0.lock().unwrap().set_channel_voltage(channel, volts)
        }

        fn detect_board(&mut self) -> Result<u32, DriverError> {
            self.0.lock().unwrap().detect_board()
        }
    }

    /// Rejects the first write, then behaves.
    struct FlakyBoard {
        board: SimulatedBoard,
        failures_left: usize,
    }

    impl FlakyBoard {
        fn failing_once() -> Self {
            Self {
                board: SimulatedBoard::new(1),
                failures_left: 1,
            }
        }
    }

    impl DacDriver for FlakyBoard {
        fn set_channel_voltage(&mut self, channel: u8, volts: f64) -> Result<(), DriverError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(DriverError::Simulated);
            }
            self.board.set_channel_voltage(channel, volts)
        }

        fn detect_board(&mut self) -> Result<u32, DriverError> {
            self.board.detect_board()
        }
    }

    fn actuator() -> (MagnetActuator<SimulatedBoard>, AuditLog) {
        let audit = AuditLog::in_memory();
        (MagnetActuator::new(SimulatedBoard::new(1), audit.clone()), audit)
    }

    #[test]
    fn manual_amplitude_at_boundary_is_accepted() {
        let (mut magnet, _) = actuator();
        let command = magnet.apply_manual_amplitude(4.0).unwrap();
        assert_eq!(command.upper_voltage, 2.28);
        assert_eq!(command.lower_voltage, -2.28);
        assert_eq!(magnet.driver().voltage(UPPER_MAGNET_CHANNEL), Some(2.28));
        assert_eq!(magnet.driver().voltage(LOWER_MAGNET_CHANNEL), Some(-2.28));
    }

    #[test]
    fn manual_amplitude_past_boundary_zeroes_both_channels() {
        let (mut magnet, audit) = actuator();
        magnet.apply_manual_amplitude(2.0).unwrap();
        let err = magnet.apply_manual_amplitude(4.01).unwrap_err();
        assert!(matches!(
            err,
            ActuatorError::SafetyViolation {
                side: MagnetSide::Upper,
                zeroed: true,
                code: "SP1",
                ..
            }
        ));
        assert_eq!(magnet.driver().voltage(UPPER_MAGNET_CHANNEL), Some(0.0));
        assert_eq!(magnet.driver().voltage(LOWER_MAGNET_CHANNEL), Some(0.0));
        // the requested voltage never reached the board
        assert!(magnet
            .driver()
            .writes()
            .iter()
            .all(|&(_, volts)| volts.abs() <= 2.28));
        assert_eq!(audit.count(Severity::Critical), 1);
        assert_eq!(magnet.last_command(), ActuatorCommand::ZERO);
    }

    #[test]
    fn negative_manual_overrange_is_rejected() {
        let (mut magnet, _) = actuator();
        assert!(magnet.apply_manual_amplitude(-4.5).is_err());
        assert!(magnet.apply_manual_amplitude(-4.0).is_ok());
    }

    #[test]
    fn pid_output_is_clamped_and_scaled() {
        let (mut magnet, _) = actuator();
        let actuation = magnet.apply_pid_output(7.5, true).unwrap();
        assert_eq!(actuation.clamped_output, 1.0);
        assert_eq!(actuation.intended_amplitude, 3.0);
        assert_eq!(
            actuation.applied,
            Some(ActuatorCommand {
                upper_voltage: 2.28,
                lower_voltage: -2.28
            })
        );
        assert_eq!(magnet.applied_amplitude(), 3.0);

        let actuation = magnet.apply_pid_output(-0.5, true).unwrap();
        assert_eq!(actuation.intended_amplitude, -1.5);
        assert_eq!(magnet.driver().voltage(UPPER_MAGNET_CHANNEL), Some(-1.14));
        assert_eq!(magnet.driver().voltage(LOWER_MAGNET_CHANNEL), Some(1.14));
    }

    #[test]
    fn closed_gate_writes_nothing() {
        let (mut magnet, _) = actuator();
        let actuation = magnet.apply_pid_output(0.4, false).unwrap();
        assert!(actuation.applied.is_none());
        assert!((actuation.intended_amplitude - 1.2).abs() < 1e-12);
        assert!(magnet.driver().writes().is_empty());
    }

    #[test]
    fn nan_pid_output_is_a_safety_violation() {
        let (mut magnet, _) = actuator();
        let err = magnet.apply_pid_output(f64::NAN, true).unwrap_err();
        assert!(matches!(err, ActuatorError::SafetyViolation { zeroed: true, .. }));
    }

    #[test]
    fn driver_fault_zeroes_and_reports() {
        let (mut magnet, audit) = actuator();
        magnet.driver_mut().fail_channel(Some(LOWER_MAGNET_CHANNEL));
        let err = magnet.apply_pid_output(0.5, true).unwrap_err();
        // lower channel stays broken, so zeroing cannot complete either
        assert!(matches!(err, ActuatorError::DriverFault { zeroed: false, .. }));
        assert_eq!(magnet.driver().voltage(UPPER_MAGNET_CHANNEL), Some(0.0));
        assert!(audit.count(Severity::Critical) >= 1);
        assert!(audit
            .records()
            .iter()
            .any(|r| r.severity == Severity::Critical && r.message.starts_with("Failed to apply voltages")));
    }

    #[test]
    fn zeroed_driver_fault_is_still_critical() {
        let audit = AuditLog::in_memory();
        let mut magnet = MagnetActuator::new(FlakyBoard::failing_once(), audit.clone());
        let err = magnet.apply_pid_output(0.2, true).unwrap_err();
        assert!(matches!(err, ActuatorError::DriverFault { zeroed: true, .. }));
        assert!(!magnet.is_energised());
        assert_eq!(audit.count(Severity::Critical), 1);
        assert!(audit
            .records()
            .iter()
            .any(|r| r.severity == Severity::Critical && r.message.starts_with("Failed to apply voltages")));
    }

    #[test]
    fn every_successful_write_is_audited() {
        let (mut magnet, audit) = actuator();
        magnet.apply_manual_amplitude(1.0).unwrap();
        magnet.apply_pid_output(0.5, true).unwrap();
        magnet.zero().unwrap();

        let writes: Vec<String> = audit
            .records()
            .into_iter()
            .filter(|r| r.message.starts_with("DAC channel"))
            .map(|r| r.message)
            .collect();
        let expected: Vec<String> = magnet
            .driver()
            .writes()
            .iter()
            .map(|(channel, volts)| format!("DAC channel {} <- {}V", channel, volts))
            .collect();
        assert_eq!(writes.len(), 6);
        assert_eq!(writes, expected);
    }

    #[test]
    fn dropping_an_energised_actuator_zeroes_both_channels() {
        let board = SharedBoard::new();
        let audit = AuditLog::in_memory();
        let mut magnet = MagnetActuator::new(board.clone(), audit.clone());
        let applied = magnet.apply_manual_amplitude(3.0).unwrap();
        assert!(magnet.is_energised());
        assert_eq!(board.voltage(UPPER_MAGNET_CHANNEL), Some(applied.upper_voltage));
        assert!(applied.upper_voltage > 0.0);

        drop(magnet);
        assert_eq!(board.voltage(UPPER_MAGNET_CHANNEL), Some(0.0));
        assert_eq!(board.voltage(LOWER_MAGNET_CHANNEL), Some(0.0));
        assert!(audit.records().iter().any(|r| r.message.contains("zeroed on release")));
    }

    #[test]
    fn dropping_after_shutdown_zeroing_writes_nothing_more() {
        let board = SharedBoard::new();
        let mut magnet = MagnetActuator::new(board.clone(), AuditLog::in_memory());
        magnet.apply_manual_amplitude(2.0).unwrap();
        magnet.zero_on_shutdown().unwrap();
        assert!(!magnet.is_energised());
        let writes = board.0.lock().unwrap().writes().len();

        drop(magnet);
        assert_eq!(board.0.lock().unwrap().writes().len(), writes);
    }

    #[test]
    fn failed_zeroing_on_drop_is_critical() {
        let board = SharedBoard::new();
        let audit = AuditLog::in_memory();
        let mut magnet = MagnetActuator::new(board.clone(), audit.clone());
        magnet.apply_manual_amplitude(2.0).unwrap();
        board.0.lock().unwrap().set_fail_writes(true);

        drop(magnet);
        assert_eq!(audit.count(Severity::Critical), 1);
        assert_eq!(board.voltage(UPPER_MAGNET_CHANNEL), Some(1.14));
    }

    #[test]
    fn transient_fault_is_zeroed() {
        let (mut magnet, _) = actuator();
        magnet.driver_mut().set_fail_writes(true);
        let err = magnet.apply_manual_amplitude(1.0).unwrap_err();
        assert!(matches!(err, ActuatorError::DriverFault { zeroed: false, .. }));
        magnet.driver_mut().set_fail_writes(false);
        magnet.apply_manual_amplitude(1.0).unwrap();
        assert_eq!(magnet.driver().voltage(UPPER_MAGNET_CHANNEL), Some(0.57));
    }

    #[test]
    fn shutdown_zeroes_or_escalates() {
        let (mut magnet, audit) = actuator();
        magnet.apply_manual_amplitude(3.0).unwrap();
        magnet.zero_on_shutdown().unwrap();
        assert_eq!(magnet.driver().voltage(UPPER_MAGNET_CHANNEL), Some(0.0));

        magnet.set_simulated_zero_failure(true);
        let err = magnet.zero_on_shutdown().unwrap_err();
        assert_eq!(
            err,
            ActuatorError::ZeroFailed {
                source: DriverError::Simulated
            }
        );
        assert_eq!(audit.count(Severity::Critical), 1);
    }

    #[test]
    fn board_detection_passes_through() {
        let (mut magnet, _) = actuator();
        assert_eq!(magnet.detect_board(), Ok(1));
        let mut absent = MagnetActuator::new(SimulatedBoard::absent(), AuditLog::in_memory());
        assert!(absent.detect_board().is_err());
    }
}
