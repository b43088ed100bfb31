pub mod camera;
pub mod dac;

pub use camera::{fit_frame, FrameSource};
pub use dac::{
    Channel, DacDriver, DriverError, SimulatedBoard, LOWER_MAGNET_CHANNEL, UPPER_MAGNET_CHANNEL,
};
