use anyhow::{ensure, Context};
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use vantagecore::hardware::FrameSource;
use vantagecore::prelude::Frame;
use vantagecore::project::Resolution;

const EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Replays recorded frames from a directory in file-name order, looping forever.
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    cursor: usize,
    resolution: Resolution,
    camera_port: u32,
    released: bool,
}

impl ImageSequenceSource {
    pub fn open<P: AsRef<Path>>(directory: P, resolution: Resolution) -> anyhow::Result<Self> {
        let directory = directory.as_ref();
        let mut frames: Vec<PathBuf> = fs::read_dir(directory)
            .with_context(|| format!("listing frame directory {}", directory.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();
        ensure!(
            !frames.is_empty(),
            "no png/jpeg frames found in {}",
            directory.display()
        );
        Ok(Self {
            frames,
            cursor: 0,
            resolution,
            camera_port: 0,
            released: false,
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn read(&mut self) -> Option<Frame> {
        if self.released {
            return None;
        }
        let path = &self.frames[self.cursor];
        self.cursor = (self.cursor + 1) % self.frames.len();
        match image::open(path) {
            Ok(decoded) => Some(decoded.to_rgb8()),
            Err(err) => {
                warn!("skipping unreadable frame {}: {}", path.display(), err);
                None
            }
        }
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    fn camera_port(&self) -> u32 {
        self.camera_port
    }

    fn set_camera_port(&mut self, port: u32) {
        self.camera_port = port;
    }

    fn release(&mut self) {
        self.released = true;
    }
}
