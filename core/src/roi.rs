//! Operator-drawn regions of interest and the per-tick confinement tally.

use crate::prelude::{ParticleObservation, Tag};
use crate::project::ConfigError;
use serde::{Deserialize, Serialize};

/// Inclusive rectangle, always normalised so `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl Region {
    /// Builds a region from two opposite corners given in any order.
    pub fn from_corners(ax: i32, ay: i32, bx: i32, by: i32) -> Self {
        Self {
            x1: ax.min(bx),
            y1: ay.min(by),
            x2: ax.max(bx),
            y2: ay.max(by),
        }
    }

    /// Reads the persisted `[x, y, width, height]` form.
    pub fn from_rect(rect: [i32; 4]) -> Result<Self, ConfigError> {
        let [x, y, w, h] = rect;
        if w <= 0 || h <= 0 {
            return Err(ConfigError::InvalidRegion(rect));
        }
        let x2 = x.checked_add(w - 1).ok_or(ConfigError::InvalidRegion(rect))?;
        let y2 = y.checked_add(h - 1).ok_or(ConfigError::InvalidRegion(rect))?;
        Ok(Self { x1: x, y1: y, x2, y2 })
    }

    /// The persisted `[x, y, width, height]` form.
    pub fn to_rect(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2 - self.x1 + 1, self.y2 - self.y1 + 1]
    }

    pub fn corners(&self) -> (i32, i32, i32, i32) {
        (self.x1, self.y1, self.x2, self.y2)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.x1..=self.x2).contains(&x) && (self.y1..=self.y2).contains(&y)
    }
}

/// Regions grouped by the tag expected inside them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSet {
    green: Vec<Region>,
    red: Vec<Region>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tag: Tag, region: Region) {
        match tag {
            Tag::Green => self.green.push(region),
            Tag::Red => self.red.push(region),
        }
    }

    pub fn regions(&self, tag: Tag) -> &[Region] {
        match tag {
            Tag::Green => &self.green,
            Tag::Red => &self.red,
        }
    }

    pub fn clear(&mut self) {
        self.green.clear();
        self.red.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.green.is_empty() && self.red.is_empty()
    }

    pub fn to_rects(&self, tag: Tag) -> Vec<[i32; 4]> {
        self.regions(tag).iter().map(Region::to_rect).collect()
    }

    pub fn from_rects(green: &[[i32; 4]], red: &[[i32; 4]]) -> Result<Self, ConfigError> {
        Ok(Self {
            green: green.iter().copied().map(Region::from_rect).collect::<Result<_, _>>()?,
            red: red.iter().copied().map(Region::from_rect).collect::<Result<_, _>>()?,
        })
    }

    fn covers(&self, tag: Tag, particle: &ParticleObservation) -> bool {
        self.regions(tag)
            .iter()
            .any(|region| region.contains(particle.x, particle.y))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiTally {
    pub matched_green: usize,
    pub matched_red: usize,
    pub mismatched: usize,
}

pub struct RegionClassifier;

impl RegionClassifier {
    /// Each particle adds to at most one counter. A particle inside a region of its
    /// own colour counts as matched even if another region of the other colour
    /// overlaps it; it is a mismatch only when it sits exclusively in regions of the
    /// other colour.
    pub fn classify(particles: &[ParticleObservation], regions: &RegionSet) -> RoiTally {
        let mut tally = RoiTally::default();
        for particle in particles {
            let in_green = regions.covers(Tag::Green, particle);
            let in_red = regions.covers(Tag::Red, particle);
            match particle.tag {
                Tag::Green if in_green => tally.matched_green += 1,
                Tag::Red if in_red => tally.matched_red += 1,
                Tag::Green if in_red => tally.mismatched += 1,
                Tag::Red if in_green => tally.mismatched += 1,
                _ => {}
            }
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(x: i32, y: i32, tag: Tag) -> ParticleObservation {
        ParticleObservation {
            x,
            y,
            area: 50.0,
            tag,
            radius: 4,
        }
    }

    #[test]
    fn corners_are_normalised() {
        let region = Region::from_corners(40, 30, 10, 5);
        assert_eq!(region.corners(), (10, 5, 40, 30));
        assert!(region.contains(10, 5));
        assert!(region.contains(40, 30));
        assert!(!region.contains(41, 30));
    }

    #[test]
    fn red_particle_in_green_region_is_a_mismatch() {
        let mut regions = RegionSet::new();
        regions.add(Tag::Green, Region::from_corners(0, 0, 50, 50));
        let tally = RegionClassifier::classify(&[particle(10, 10, Tag::Red)], &regions);
        assert_eq!(
            tally,
            RoiTally {
                matched_green: 0,
                matched_red: 0,
                mismatched: 1
            }
        );
    }

    #[test]
    fn matching_particles_are_counted_per_colour() {
        let mut regions = RegionSet::new();
        regions.add(Tag::Green, Region::from_corners(0, 0, 50, 50));
        regions.add(Tag::Red, Region::from_corners(100, 0, 150, 50));
        let particles = [
            particle(10, 10, Tag::Green),
            particle(20, 20, Tag::Green),
            particle(120, 10, Tag::Red),
            particle(120, 10, Tag::Green),
            particle(300, 300, Tag::Red),
        ];
        let tally = RegionClassifier::classify(&particles, &regions);
        assert_eq!(tally.matched_green, 2);
        assert_eq!(tally.matched_red, 1);
        assert_eq!(tally.mismatched, 1);
    }

    #[test]
    fn own_colour_wins_in_overlapping_regions() {
        let mut regions = RegionSet::new();
        regions.add(Tag::Green, Region::from_corners(0, 0, 50, 50));
        regions.add(Tag::Red, Region::from_corners(0, 0, 50, 50));
        regions.add(Tag::Red, Region::from_corners(5, 5, 20, 20));
        let tally = RegionClassifier::classify(
            &[particle(10, 10, Tag::Red), particle(10, 10, Tag::Green)],
            &regions,
        );
        assert_eq!(tally.matched_red, 1);
        assert_eq!(tally.matched_green, 1);
        assert_eq!(tally.mismatched, 0);
    }

    #[test]
    fn rect_round_trip_is_exact() {
        let mut regions = RegionSet::new();
        regions.add(Tag::Green, Region::from_corners(3, 4, 93, 60));
        regions.add(Tag::Green, Region::from_corners(7, 7, 7, 7));
        regions.add(Tag::Red, Region::from_corners(-5, 10, 200, 11));

        let green = regions.to_rects(Tag::Green);
        let red = regions.to_rects(Tag::Red);
        let restored = RegionSet::from_rects(&green, &red).unwrap();
        assert_eq!(restored, regions);
    }

    #[test]
    fn non_positive_extent_is_rejected() {
        assert!(Region::from_rect([0, 0, 0, 5]).is_err());
        assert!(Region::from_rect([0, 0, 5, -1]).is_err());
    }

    #[test]
    fn clear_empties_both_colours() {
        let mut regions = RegionSet::new();
        regions.add(Tag::Green, Region::from_corners(0, 0, 1, 1));
        regions.add(Tag::Red, Region::from_corners(0, 0, 1, 1));
        regions.clear();
        assert!(regions.is_empty());
    }
}
