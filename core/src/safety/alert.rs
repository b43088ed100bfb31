use serde::Serialize;
use std::time::Duration;

pub const CRITICAL_TITLE: &str = "CRITICAL ERROR";
pub const ZERO_FAILURE_MESSAGE: &str =
    "MAGNET AMP FAILED TO ZERO. MANUALLY SHUTDOWN POWER SUPPLIES AND ZERO MAGNET AMP USING BACKUP SOFTWARE";

pub const DEFAULT_COUNTDOWN: Duration = Duration::from_secs(8);
pub const FLASH_PERIOD: Duration = Duration::from_millis(500);
pub const BEEP_PERIOD: Duration = Duration::from_secs(2);

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AlertError {
    #[error("alert cannot be dismissed for another {remaining_secs} s")]
    NotYetDismissable { remaining_secs: u64 },
}

/// Blocking operator alert raised when the magnets may still be energised.
///
/// Purely time-driven: the caller feeds elapsed time through [`CriticalAlert::advance`]
/// and sounds one beep per returned count. Acknowledgement is refused until the
/// countdown has run out; beeping continues until acknowledged.
#[derive(Debug, Clone)]
pub struct CriticalAlert {
    title: &'static str,
    message: String,
    countdown: Duration,
    elapsed: Duration,
    beeps_sounded: u64,
    acknowledged: bool,
}

impl CriticalAlert {
    pub fn new(message: impl Into<String>, countdown: Duration) -> Self {
        Self {
            title: CRITICAL_TITLE,
            message: message.into(),
            countdown,
            elapsed: Duration::ZERO,
            beeps_sounded: 0,
            acknowledged: false,
        }
    }

    pub fn zero_failure(countdown: Duration) -> Self {
        Self::new(ZERO_FAILURE_MESSAGE, countdown)
    }

    pub fn title(&self) -> &str {
        self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Moves the clock forward and returns how many beeps fell due, including the
    /// immediate one on the first call.
    pub fn advance(&mut self, step: Duration) -> u64 {
        if self.acknowledged {
            return 0;
        }
        self.elapsed += step;
        let due = (self.elapsed.as_millis() / BEEP_PERIOD.as_millis()) as u64 + 1;
        let fresh = due.saturating_sub(self.beeps_sounded);
        self.beeps_sounded = due;
        fresh
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn remaining(&self) -> Duration {
        self.countdown.saturating_sub(self.elapsed)
    }

    /// Whole seconds left, rounded up the way a countdown label shows them.
    pub fn remaining_secs(&self) -> u64 {
        let millis = self.remaining().as_millis() as u64;
        millis.div_ceil(1000)
    }

    pub fn is_dismissable(&self) -> bool {
        self.remaining().is_zero()
    }

    /// True during the "on" half of each flash period.
    pub fn flash_on(&self) -> bool {
        (self.elapsed.as_millis() / FLASH_PERIOD.as_millis()) % 2 == 0
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn try_acknowledge(&mut self) -> Result<(), AlertError> {
        if !self.is_dismissable() {
            return Err(AlertError::NotYetDismissable {
                remaining_secs: self.remaining_secs(),
            });
        }
        self.acknowledged = true;
        Ok(())
    }

    pub fn status(&self) -> AlertStatus {
        AlertStatus {
            title: self.title.to_string(),
            message: self.message.clone(),
            remaining_secs: self.remaining_secs(),
            dismissable: self.is_dismissable(),
            acknowledged: self.acknowledged,
        }
    }
}

/// Serialisable view of an alert for status reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertStatus {
    pub title: String,
    pub message: String,
    pub remaining_secs: u64,
    pub dismissable: bool,
    pub acknowledged: bool,
}
