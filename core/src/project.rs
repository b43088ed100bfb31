//! Persisted project record (`.vtp`, JSON) and its strict parsing.

use crate::prelude::{SizeBand, Tag};
use crate::roi::RegionSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const PROJECT_EXTENSION: &str = "vtp";

/// Largest accepted capture width or height, in pixels.
pub const MAX_DIMENSION: u32 = 8192;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("malformed resolution {0:?}, expected WIDTHxHEIGHT with each side in 1..=8192")]
    MalformedResolution(String),
    #[error("{name} threshold {value} is outside 0..=100")]
    ThresholdOutOfRange { name: &'static str, value: i64 },
    #[error("particle size band {min}..{max} is empty")]
    InvalidSizeBand { min: i64, max: i64 },
    #[error("region {0:?} must have positive width and height")]
    InvalidRegion([i32; 4]),
    #[error("reading project {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing project {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Capture size, written `WIDTHxHEIGHT` in the project file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedResolution(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(malformed)?;
        let width: u32 = w.trim().parse().map_err(|_| malformed())?;
        let height: u32 = h.trim().parse().map_err(|_| malformed())?;
        if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
            return Err(malformed());
        }
        Ok(Self { width, height })
    }
}

/// On-disk layout. Only the box lists may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub camera_port: u32,
    pub resolution: String,
    pub red_threshold: i64,
    pub green_threshold: i64,
    pub min_particle_size: i64,
    pub max_particle_size: i64,
    #[serde(default)]
    pub green_boxes: Vec<[i32; 4]>,
    #[serde(default)]
    pub red_boxes: Vec<[i32; 4]>,
}

/// Validated project state ready to configure a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSettings {
    pub camera_port: u32,
    pub resolution: Resolution,
    pub red_threshold: u8,
    pub green_threshold: u8,
    pub size_band: SizeBand,
    pub regions: RegionSet,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            camera_port: 0,
            resolution: Resolution::default(),
            red_threshold: 20,
            green_threshold: 20,
            size_band: SizeBand::default(),
            regions: RegionSet::new(),
        }
    }
}

fn threshold(name: &'static str, value: i64) -> Result<u8, ConfigError> {
    if (0..=100).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}

impl ProjectRecord {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the record, appending the `.vtp` extension when missing. Returns the
    /// path actually written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf, ConfigError> {
        let mut path = path.as_ref().to_path_buf();
        let has_extension = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(PROJECT_EXTENSION))
            .unwrap_or(false);
        if !has_extension {
            let mut name = path.as_os_str().to_os_string();
            name.push(".");
            name.push(PROJECT_EXTENSION);
            path = PathBuf::from(name);
        }
        let io_error = |source| ConfigError::Io {
            path: path.clone(),
            source,
        };
        let contents = serde_json::to_string(self).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, contents).map_err(io_error)?;
        Ok(path)
    }

    pub fn to_settings(&self) -> Result<ProjectSettings, ConfigError> {
        let resolution: Resolution = self.resolution.parse()?;
        let red_threshold = threshold("red", self.red_threshold)?;
        let green_threshold = threshold("green", self.green_threshold)?;
        let size_band = SizeBand::new(self.min_particle_size as f64, self.max_particle_size as f64)
            .map_err(|_| ConfigError::InvalidSizeBand {
                min: self.min_particle_size,
                max: self.max_particle_size,
            })?;
        let regions = RegionSet::from_rects(&self.green_boxes, &self.red_boxes)?;
        Ok(ProjectSettings {
            camera_port: self.camera_port,
            resolution,
            red_threshold,
            green_threshold,
            size_band,
            regions,
        })
    }

    pub fn from_settings(settings: &ProjectSettings) -> Self {
        Self {
            camera_port: settings.camera_port,
            resolution: settings.resolution.to_string(),
            red_threshold: settings.red_threshold as i64,
            green_threshold: settings.green_threshold as i64,
            min_particle_size: settings.size_band.min().round() as i64,
            max_particle_size: settings.size_band.max().round() as i64,
            green_boxes: settings.regions.to_rects(Tag::Green),
            red_boxes: settings.regions.to_rects(Tag::Red),
        }
    }
}
