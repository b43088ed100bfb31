use crate::prelude::Frame;
use crate::project::Resolution;
use image::imageops::{resize, FilterType};

/// Contract required from the video collaborator. A failed read is `None`; the
/// frame tick skips that cycle.
pub trait FrameSource: Send {
    fn read(&mut self) -> Option<Frame>;
    fn resolution(&self) -> Resolution;
    /// Takes effect on the next read without reopening the source.
    fn set_resolution(&mut self, resolution: Resolution);
    fn camera_port(&self) -> u32;
    fn set_camera_port(&mut self, port: u32);
    fn release(&mut self);
}

impl<F: FrameSource + ?Sized> FrameSource for Box<F> {
    fn read(&mut self) -> Option<Frame> {
        (**self).read()
    }

    fn resolution(&self) -> Resolution {
        (**self).resolution()
    }

    fn set_resolution(&mut self, resolution: Resolution) {
        (**self).set_resolution(resolution)
    }

    fn camera_port(&self) -> u32 {
        (**self).camera_port()
    }

    fn set_camera_port(&mut self, port: u32) {
        (**self).set_camera_port(port)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Brings a captured frame to the configured processing size.
pub fn fit_frame(frame: Frame, resolution: Resolution) -> Frame {
    if frame.dimensions() == (resolution.width, resolution.height) {
        return frame;
    }
    resize(&frame, resolution.width, resolution.height, FilterType::Triangle)
}
