use std::collections::BTreeMap;

/// Analog output channel on the DAC board, addressed the way the driver expects.
pub type Channel = u8;

pub const UPPER_MAGNET_CHANNEL: Channel = 4;
pub const LOWER_MAGNET_CHANNEL: Channel = 7;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("no DAC board available: {0}")]
    Unavailable(String),
    #[error("write to channel {channel} failed: {reason}")]
    WriteFailed { channel: Channel, reason: String },
    #[error("simulated driver fault")]
    Simulated,
}

/// Contract required from the vendor DAC driver.
pub trait DacDriver: Send {
    fn set_channel_voltage(&mut self, channel: Channel, volts: f64) -> Result<(), DriverError>;
    fn detect_board(&mut self) -> Result<u32, DriverError>;
}

/// In-process stand-in for the DAC board. Remembers the last voltage per channel and
/// every write in order; faults can be injected for drills and tests.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBoard {
    board_id: Option<u32>,
    outputs: BTreeMap<Channel, f64>,
    writes: Vec<(Channel, f64)>,
    fail_writes: bool,
    fail_channel: Option<Channel>,
}

impl SimulatedBoard {
    pub fn new(board_id: u32) -> Self {
        Self {
            board_id: Some(board_id),
            ..Default::default()
        }
    }

    /// A board that is never detected and rejects every write.
    pub fn absent() -> Self {
        Self {
            board_id: None,
            ..Default::default()
        }
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Fails writes to one channel only, leaving others working.
    pub fn fail_channel(&mut self, channel: Option<Channel>) {
        self.fail_channel = channel;
    }

    pub fn voltage(&self, channel: Channel) -> Option<f64> {
        self.outputs.get(&channel).copied()
    }

    pub fn writes(&self) -> &[(Channel, f64)] {
        &self.writes
    }
}

impl DacDriver for SimulatedBoard {
    fn set_channel_voltage(&mut self, channel: Channel, volts: f64) -> Result<(), DriverError> {
        if self.board_id.is_none() {
            return Err(DriverError::Unavailable("simulated board absent".into()));
        }
        if self.fail_writes || self.fail_channel == Some(channel) {
            return Err(DriverError::WriteFailed {
                channel,
                reason: "injected fault".into(),
            });
        }
        self.outputs.insert(channel, volts);
        self.writes.push((channel, volts));
        Ok(())
    }

    fn detect_board(&mut self) -> Result<u32, DriverError> {
        self.board_id
            .ok_or_else(|| DriverError::Unavailable("simulated board absent".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_board_records_writes() {
        let mut board = SimulatedBoard::new(3);
        board.set_channel_voltage(UPPER_MAGNET_CHANNEL, 1.5).unwrap();
        board.set_channel_voltage(LOWER_MAGNET_CHANNEL, -1.5).unwrap();
        assert_eq!(board.voltage(UPPER_MAGNET_CHANNEL), Some(1.5));
        assert_eq!(board.writes().len(), 2);
        assert_eq!(board.detect_board(), Ok(3));
    }

    #[test]
    fn absent_board_rejects_everything() {
        let mut board = SimulatedBoard::absent();
        assert!(board.detect_board().is_err());
        assert!(board.set_channel_voltage(UPPER_MAGNET_CHANNEL, 0.0).is_err());
    }

    #[test]
    fn injected_channel_fault_spares_other_channels() {
        let mut board = SimulatedBoard::new(0);
        board.fail_channel(Some(LOWER_MAGNET_CHANNEL));
        assert!(board.set_channel_voltage(UPPER_MAGNET_CHANNEL, 1.0).is_ok());
        assert!(board.set_channel_voltage(LOWER_MAGNET_CHANNEL, 1.0).is_err());
    }
}
