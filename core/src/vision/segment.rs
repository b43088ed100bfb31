use crate::prelude::Frame;
use image::{GrayImage, Luma, Pixel, Rgb};
use serde::{Deserialize, Serialize};

/// Operator threshold scale is 0..=100; hue space is 0..=179.
const THRESHOLD_MAX: u8 = 100;
const HUE_PER_THRESHOLD: f64 = 1.79;
const HUE_HALF_WIDTH: i32 = 20;
const HUE_MAX: i32 = 179;
const MIN_SATURATION: u8 = 50;
const MIN_VALUE: u8 = 50;

/// Hue/saturation/value sample on the 8-bit scale (`h` in 0..=179).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub fn from_rgb(px: &Rgb<u8>) -> Self {
        let [r, g, b] = px.0.map(i32::from);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let s = if max == 0 {
            0
        } else {
            ((255 * delta) as f64 / max as f64).round() as i32
        };

        let h = if delta == 0 {
            0.0
        } else {
            let degrees = if max == r {
                60.0 * (g - b) as f64 / delta as f64
            } else if max == g {
                120.0 + 60.0 * (b - r) as f64 / delta as f64
            } else {
                240.0 + 60.0 * (r - g) as f64 / delta as f64
            };
            let degrees = if degrees < 0.0 { degrees + 360.0 } else { degrees };
            (degrees / 2.0).round()
        };

        Self {
            h: (h as i32).clamp(0, HUE_MAX) as u8,
            s: s.clamp(0, 255) as u8,
            v: max as u8,
        }
    }
}

/// The hue window that selects one tagged population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorBand {
    threshold: u8,
    lower: Hsv,
    upper: Hsv,
}

impl ColorBand {
    pub fn from_threshold(threshold: u8) -> Self {
        let threshold = threshold.min(THRESHOLD_MAX);
        let hue = (threshold as f64 * HUE_PER_THRESHOLD).round() as i32;
        let low = (hue - HUE_HALF_WIDTH).clamp(0, HUE_MAX);
        let high = (hue + HUE_HALF_WIDTH).clamp(0, HUE_MAX);
        Self {
            threshold,
            lower: Hsv {
                h: low as u8,
                s: MIN_SATURATION,
                v: MIN_VALUE,
            },
            upper: Hsv {
                h: high as u8,
                s: u8::MAX,
                v: u8::MAX,
            },
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn hue_range(&self) -> (u8, u8) {
        (self.lower.h, self.upper.h)
    }

    /// Inclusive on every channel.
    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.lower.h..=self.upper.h).contains(&hsv.h)
            && (self.lower.s..=self.upper.s).contains(&hsv.s)
            && (self.lower.v..=self.upper.v).contains(&hsv.v)
    }
}

/// Isolates the pixels of one colour band.
#[derive(Debug, Clone)]
pub struct ColorSegmenter {
    band: ColorBand,
}

impl ColorSegmenter {
    pub fn new(threshold: u8) -> Self {
        Self {
            band: ColorBand::from_threshold(threshold),
        }
    }

    pub fn set_threshold(&mut self, threshold: u8) {
        self.band = ColorBand::from_threshold(threshold);
    }

    pub fn band(&self) -> &ColorBand {
        &self.band
    }

    /// Binary mask (0 / 255) of pixels inside the band.
    pub fn mask(&self, frame: &Frame) -> GrayImage {
        GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
            if self.band.contains(Hsv::from_rgb(frame.get_pixel(x, y))) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    /// The frame with every pixel outside the band blacked out.
    pub fn isolate(&self, frame: &Frame) -> Frame {
        let mask = self.mask(frame);
        Frame::from_fn(frame.width(), frame.height(), |x, y| {
            if mask.get_pixel(x, y).0[0] > 0 {
                *frame.get_pixel(x, y)
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    /// Grayscale rendition of [`isolate`](Self::isolate); this feeds particle extraction.
    pub fn isolate_gray(&self, frame: &Frame) -> GrayImage {
        GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
            let px = frame.get_pixel(x, y);
            if self.band.contains(Hsv::from_rgb(px)) {
                px.to_luma()
            } else {
                Luma([0])
            }
        })
    }
}
