pub mod alert;
pub mod notice;

pub use alert::{
    AlertError, AlertStatus, CriticalAlert, BEEP_PERIOD, CRITICAL_TITLE, DEFAULT_COUNTDOWN,
    FLASH_PERIOD, ZERO_FAILURE_MESSAGE,
};
pub use notice::{NoticeKind, OperatorNotice};
