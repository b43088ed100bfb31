use image::Rgb;
use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use vantagecore::hardware::FrameSource;
use vantagecore::prelude::{Frame, Tag};
use vantagecore::project::Resolution;

/// Magnet amplitude as last applied to the board, shared with the synthetic source so
/// that simulated particles respond to the control loop.
#[derive(Clone, Debug, Default)]
pub struct MagnetField(Arc<AtomicU64>);

impl MagnetField {
    pub fn set(&self, amplitude: f64) {
        self.0.store(amplitude.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Parameters for generating synthetic capillary frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub red_particles: usize,
    pub green_particles: usize,
    pub radius: u32,
    /// Probability that a read fails, 0 to 1.
    pub drop_rate: f64,
    /// Upward pixels per frame per unit of magnet amplitude.
    pub lift_per_amplitude: f64,
    /// Downward pixels per frame with the magnets off.
    pub sink_rate: f64,
    pub jitter: f64,
    pub red_rgb: [u8; 3],
    pub green_rgb: [u8; 3],
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            red_particles: 3,
            green_particles: 3,
            radius: 6,
            drop_rate: 0.0,
            lift_per_amplitude: 1.5,
            sink_rate: 0.5,
            jitter: 0.3,
            red_rgb: [220, 30, 30],
            green_rgb: [40, 200, 60],
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Disc {
    x: f64,
    y: f64,
    tag: Tag,
}

/// Renders coloured discs drifting in a dark capillary. Deterministic for a given
/// seed and sequence of magnet amplitudes.
pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: StdRng,
    resolution: Resolution,
    camera_port: u32,
    discs: Vec<Disc>,
    field: MagnetField,
    released: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig, resolution: Resolution, field: MagnetField) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let discs = spawn_discs(&config, resolution, &mut rng);
        Self {
            config,
            rng,
            resolution,
            camera_port: 0,
            discs,
            field,
            released: false,
        }
    }

    fn step(&mut self) {
        let lift = self.field.get() * self.config.lift_per_amplitude;
        let radius = self.config.radius as f64;
        let floor = (self.resolution.height as f64 - radius - 1.0).max(radius);
        for disc in &mut self.discs {
            let noise = if self.config.jitter > 0.0 {
                self.rng.gen_range(-self.config.jitter..self.config.jitter)
            } else {
                0.0
            };
            disc.y = (disc.y - lift + self.config.sink_rate + noise).clamp(radius, floor);
        }
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::new(self.resolution.width, self.resolution.height);
        let r = self.config.radius as i64;
        for disc in &self.discs {
            let colour = match disc.tag {
                Tag::Red => Rgb(self.config.red_rgb),
                Tag::Green => Rgb(self.config.green_rgb),
            };
            let (cx, cy) = (disc.x.round() as i64, disc.y.round() as i64);
            for y in (cy - r).max(0)..=(cy + r).min(frame.height() as i64 - 1) {
                for x in (cx - r).max(0)..=(cx + r).min(frame.width() as i64 - 1) {
                    if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                        frame.put_pixel(x as u32, y as u32, colour);
                    }
                }
            }
        }
        frame
    }
}

/// Spreads the discs evenly across the width at random heights, interleaving tags.
fn spawn_discs(config: &SyntheticConfig, resolution: Resolution, rng: &mut StdRng) -> Vec<Disc> {
    let (mut reds, mut greens) = (config.red_particles, config.green_particles);
    let mut tags = Vec::with_capacity(reds + greens);
    while reds + greens > 0 {
        if reds > 0 && reds >= greens {
            tags.push(Tag::Red);
            reds -= 1;
        } else {
            tags.push(Tag::Green);
            greens -= 1;
        }
    }

    let total = tags.len();
    let low = config.radius as f64;
    let high = (resolution.height as f64 - low).max(low + 1.0);
    tags.into_iter()
        .enumerate()
        .map(|(i, tag)| Disc {
            x: resolution.width as f64 * (i as f64 + 0.5) / total as f64,
            y: rng.gen_range(low..high),
            tag,
        })
        .collect()
}

impl FrameSource for SyntheticSource {
    fn read(&mut self) -> Option<Frame> {
        if self.released {
            return None;
        }
        self.step();
        if self.config.drop_rate > 0.0 && self.rng.gen_bool(self.config.drop_rate.min(1.0)) {
            debug!("synthetic source dropped a frame");
            return None;
        }
        Some(self.render())
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn set_resolution(&mut self, resolution: Resolution) {
        let sx = resolution.width as f64 / self.resolution.width as f64;
        let sy = resolution.height as f64 / self.resolution.height as f64;
        for disc in &mut self.discs {
            disc.x *= sx;
            disc.y *= sy;
        }
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
