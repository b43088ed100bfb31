pub mod height;
pub mod pid;

pub use height::{HeightEstimator, HeightSample};
pub use pid::{ControlError, PidController, PidGains};
