use crate::math::min_enclosing_circle;
use crate::prelude::{ParticleObservation, SeparationStrategy, SizeBand, Tag};
use crate::vision::enhance::{prepare_binary, EnhanceConfig};
use crate::vision::watershed::watershed;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::geometry::contour_area;
use imageproc::point::Point;
use log::debug;
use serde::{Deserialize, Serialize};

/// Selects how the cleaned binary image is split into particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    Contour,
    #[default]
    Watershed,
}

impl ExtractionStrategy {
    pub fn separator(&self) -> Box<dyn SeparationStrategy> {
        match self {
            ExtractionStrategy::Contour => Box::new(ExternalContours),
            ExtractionStrategy::Watershed => Box::new(WatershedContours),
        }
    }
}

/// Every external outline becomes one candidate; touching blobs stay merged.
pub struct ExternalContours;

impl SeparationStrategy for ExternalContours {
    fn name(&self) -> &'static str {
        "contour"
    }

    fn separate(&self, binary: &GrayImage) -> Vec<Contour<i32>> {
        find_contours::<i32>(binary)
            .into_iter()
            .filter(is_external)
            .collect()
    }
}

/// Splits touching blobs with a marker watershed before tracing outlines.
pub struct WatershedContours;

impl SeparationStrategy for WatershedContours {
    fn name(&self) -> &'static str {
        "watershed"
    }

    fn separate(&self, binary: &GrayImage) -> Vec<Contour<i32>> {
        let segmentation = watershed(binary);
        if segmentation.count == 0 {
            return Vec::new();
        }

        // Bounding box per label: (min_x, min_y, max_x, max_y).
        let mut boxes = vec![None::<(u32, u32, u32, u32)>; segmentation.count as usize + 1];
        for (x, y, p) in segmentation.labels.enumerate_pixels() {
            let label = p.0[0] as usize;
            if label == 0 {
                continue;
            }
            boxes[label] = Some(match boxes[label] {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }

        let mut contours = Vec::new();
        for (label, bounds) in boxes.iter().enumerate().skip(1) {
            let Some((x0, y0, x1, y1)) = *bounds else {
                continue;
            };
            // One pixel of padding on every side keeps the outline off the crop border.
            let crop = GrayImage::from_fn(x1 - x0 + 3, y1 - y0 + 3, |cx, cy| {
                let inside = cx >= 1 && cy >= 1 && cx <= x1 - x0 + 1 && cy <= y1 - y0 + 1;
                if inside
                    && segmentation.labels.get_pixel(x0 + cx - 1, y0 + cy - 1).0[0] as usize == label
                {
                    Luma([255])
                } else {
                    Luma([0])
                }
            });
            let outline = find_contours::<i32>(&crop).into_iter().find(is_external);
            if let Some(mut contour) = outline {
                let (ox, oy) = (x0 as i32 - 1, y0 as i32 - 1);
                for p in contour.points.iter_mut() {
                    *p = Point::new(p.x + ox, p.y + oy);
                }
                contours.push(contour);
            }
        }
        contours
    }
}

fn is_external(contour: &Contour<i32>) -> bool {
    contour.border_type == BorderType::Outer && contour.parent.is_none()
}

/// Turns a grayscale isolated frame into particle observations for one tag.
pub struct ParticleExtractor {
    band: SizeBand,
    enhance: EnhanceConfig,
    separator: Box<dyn SeparationStrategy>,
}

impl ParticleExtractor {
    pub fn new(strategy: ExtractionStrategy, band: SizeBand, enhance: EnhanceConfig) -> Self {
        Self::with_separator(strategy.separator(), band, enhance)
    }

    pub fn with_separator(
        separator: Box<dyn SeparationStrategy>,
        band: SizeBand,
        enhance: EnhanceConfig,
    ) -> Self {
        Self {
            band,
            enhance,
            separator,
        }
    }

    pub fn size_band(&self) -> SizeBand {
        self.band
    }

    pub fn set_size_band(&mut self, band: SizeBand) {
        self.band = band;
    }

    pub fn set_strategy(&mut self, strategy: ExtractionStrategy) {
        self.separator = strategy.separator();
    }

    pub fn strategy_name(&self) -> &'static str {
        self.separator.name()
    }

    /// An empty source yields an empty list.
    pub fn extract(&self, source: &GrayImage, tag: Tag) -> Vec<ParticleObservation> {
        let binary = prepare_binary(source, &self.enhance);
        let candidates = self.separator.separate(&binary);
        let total = candidates.len();
        let particles: Vec<_> = candidates
            .iter()
            .filter_map(|contour| self.measure(contour, tag))
            .collect();
        debug!(
            "{} extraction ({}): {} of {} candidates inside size band",
            tag,
            self.separator.name(),
            particles.len(),
            total
        );
        particles
    }

    fn measure(&self, contour: &Contour<i32>, tag: Tag) -> Option<ParticleObservation> {
        let area = contour_area(&contour.points);
        if !self.band.admits(area) {
            return None;
        }
        let circle = min_enclosing_circle(&contour.points)?;
        Some(ParticleObservation {
            x: circle.cx as i32,
            y: circle.cy as i32,
            area,
            tag,
            radius: circle.radius as i32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(width: u32, height: u32, discs: &[(i32, i32, i32)]) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let hit = discs.iter().any(|&(cx, cy, r)| {
                let dx = x as i32 - cx;
                let dy = y as i32 - cy;
                dx * dx + dy * dy <= r * r
            });
            if hit {
                Luma([120])
            } else {
                Luma([0])
            }
        })
    }

    fn wide_band() -> SizeBand {
        SizeBand::new(30.0, 5000.0).unwrap()
    }

    #[test]
    fn separated_discs_yield_one_particle_each() {
        let source = canvas(160, 80, &[(30, 40, 10), (110, 40, 10)]);
        for strategy in [ExtractionStrategy::Contour, ExtractionStrategy::Watershed] {
            let extractor = ParticleExtractor::new(strategy, wide_band(), EnhanceConfig::default());
            let particles = extractor.extract(&source, Tag::Red);
            assert_eq!(particles.len(), 2, "strategy {:?}", strategy);
            assert!(particles.iter().all(|p| p.tag == Tag::Red));
            let mut xs: Vec<i32> = particles.iter().map(|p| p.x).collect();
            xs.sort();
            assert!((xs[0] - 30).abs() <= 1);
            assert!((xs[1] - 110).abs() <= 1);
            assert!(particles.iter().all(|p| (p.y - 40).abs() <= 1));
            assert!(particles.iter().all(|p| p.radius >= 9 && p.radius <= 14));
        }
    }

    #[test]
    fn watershed_splits_discs_touching_at_one_point() {
        // Centres 20 apart with radius 10: the discs share a single pixel.
        let source = canvas(96, 48, &[(34, 24, 10), (54, 24, 10)]);
        let extractor = ParticleExtractor::new(
            ExtractionStrategy::Watershed,
            wide_band(),
            EnhanceConfig::default(),
        );
        let particles = extractor.extract(&source, Tag::Green);
        assert_eq!(particles.len(), 2);
    }

    #[test]
    fn size_band_boundaries_are_exclusive() {
        let source = canvas(80, 80, &[(40, 40, 10)]);
        let extractor = ParticleExtractor::new(
            ExtractionStrategy::Contour,
            wide_band(),
            EnhanceConfig::default(),
        );
        let particles = extractor.extract(&source, Tag::Red);
        assert_eq!(particles.len(), 1);
        let area = particles[0].area;

        let mut at_min = ParticleExtractor::new(
            ExtractionStrategy::Contour,
            SizeBand::new(area, area + 100.0).unwrap(),
            EnhanceConfig::default(),
        );
        assert!(at_min.extract(&source, Tag::Red).is_empty());

        at_min.set_size_band(SizeBand::new(area - 100.0, area).unwrap());
        assert!(at_min.extract(&source, Tag::Red).is_empty());

        at_min.set_size_band(SizeBand::new(area - 1.0, area + 1.0).unwrap());
        assert_eq!(at_min.extract(&source, Tag::Red).len(), 1);
    }

    #[test]
    fn disc_area_tracks_its_radius() {
        let source = canvas(80, 80, &[(40, 40, 10)]);
        let extractor = ParticleExtractor::new(
            ExtractionStrategy::Contour,
            wide_band(),
            EnhanceConfig::default(),
        );
        let particles = extractor.extract(&source, Tag::Green);
        assert_eq!(particles.len(), 1);
        let disc = std::f64::consts::PI * 100.0;
        assert!(particles[0].area > 0.7 * disc && particles[0].area < 1.1 * disc);
        assert!((particles[0].radius - 10).abs() <= 1);
    }

    #[test]
    fn empty_source_yields_no_particles() {
        let source = GrayImage::new(64, 64);
        let extractor = ParticleExtractor::new(
            ExtractionStrategy::Watershed,
            SizeBand::default(),
            EnhanceConfig::default(),
        );
        assert!(extractor.extract(&source, Tag::Green).is_empty());
    }

    #[test]
    fn extraction_is_deterministic() {
        let source = canvas(120, 60, &[(20, 30, 8), (60, 30, 9), (100, 30, 7)]);
        let extractor = ParticleExtractor::new(
            ExtractionStrategy::Watershed,
            wide_band(),
            EnhanceConfig::default(),
        );
        let first = extractor.extract(&source, Tag::Red);
        let second = extractor.extract(&source, Tag::Red);
        assert_eq!(first, second);
    }

    #[test]
    fn strategy_can_be_swapped() {
        let mut extractor = ParticleExtractor::new(
            ExtractionStrategy::Contour,
            wide_band(),
            EnhanceConfig::default(),
        );
        assert_eq!(extractor.strategy_name(), "contour");
        extractor.set_strategy(ExtractionStrategy::Watershed);
        assert_eq!(extractor.strategy_name(), "watershed");
    }
}
