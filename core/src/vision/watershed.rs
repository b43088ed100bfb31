use image::{GrayImage, ImageBuffer, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Fraction of the peak distance a pixel must exceed to seed a particle.
pub const SURE_FOREGROUND_RATIO: f64 = 0.7;

/// Quantisation used to order pixels by distance in the flood queue.
const LEVEL_SCALE: f64 = 1024.0;

pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Per-region labels produced by the marker flood; `0` is background.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub labels: LabelImage,
    pub count: u32,
}

/// Euclidean distance from every foreground pixel to the nearest background pixel.
///
/// The image is padded by one background pixel so a mask without background
/// still yields finite distances.
pub fn distance_to_background(binary: &GrayImage) -> ImageBuffer<Luma<f64>, Vec<f64>> {
    let (width, height) = binary.dimensions();
    let padded = GrayImage::from_fn(width + 2, height + 2, |x, y| {
        let inside = x >= 1 && y >= 1 && x <= width && y <= height;
        if inside && binary.get_pixel(x - 1, y - 1).0[0] > 0 {
            Luma([0])
        } else {
            Luma([255])
        }
    });
    let squared = euclidean_squared_distance_transform(&padded);
    ImageBuffer::from_fn(width, height, |x, y| {
        Luma([squared.get_pixel(x + 1, y + 1).0[0].sqrt()])
    })
}

/// Splits touching blobs: seeds are the cores above [`SURE_FOREGROUND_RATIO`] of the
/// peak distance, then every remaining foreground pixel is flooded from the seeds in
/// order of decreasing distance (a watershed over the inverted distance map).
pub fn watershed(binary: &GrayImage) -> Segmentation {
    let (width, height) = binary.dimensions();
    let empty = Segmentation {
        labels: LabelImage::new(width, height),
        count: 0,
    };
    if width == 0 || height == 0 {
        return empty;
    }

    let distance = distance_to_background(binary);
    let peak = distance.pixels().fold(0.0f64, |acc, p| acc.max(p.0[0]));
    if peak <= 0.0 {
        return empty;
    }

    let cutoff = SURE_FOREGROUND_RATIO * peak;
    let sure_foreground = GrayImage::from_fn(width, height, |x, y| {
        if distance.get_pixel(x, y).0[0] > cutoff {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    let mut labels = connected_components(&sure_foreground, Connectivity::Eight, Luma([0u8]));
    let count = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0);

    let w = width as i64;
    let h = height as i64;
    let level = |x: u32, y: u32| (distance.get_pixel(x, y).0[0] * LEVEL_SCALE) as u64;

    let mut queue = BinaryHeap::new();
    let mut seq = 0u64;
    for (x, y, label) in labels.enumerate_pixels() {
        if label.0[0] > 0 {
            queue.push((level(x, y), Reverse(seq), x, y));
            seq += 1;
        }
    }

    while let Some((_, _, x, y)) = queue.pop() {
        let label = labels.get_pixel(x, y).0[0];
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if (dx == 0 && dy == 0) || nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);
                if binary.get_pixel(nx, ny).0[0] == 0 || labels.get_pixel(nx, ny).0[0] != 0 {
                    continue;
                }
                labels.put_pixel(nx, ny, Luma([label]));
                queue.push((level(nx, ny), Reverse(seq), nx, ny));
                seq += 1;
            }
        }
    }

    Segmentation { labels, count }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_disc(img: &mut GrayImage, cx: i32, cy: i32, r: i32) {
        let (width, height) = img.dimensions();
        for y in 0..height {
            for x in 0..width {
                let dx = x as i32 - cx;
                let dy = y as i32 - cy;
                if dx * dx + dy * dy <= r * r {
                    img.put_pixel(x, y, Luma([255]));
                }
            }
        }
    }

    #[test]
    fn distance_peaks_at_disc_center() {
        let mut img = GrayImage::new(40, 40);
        draw_disc(&mut img, 20, 20, 8);
        let distance = distance_to_background(&img);
        let center = distance.get_pixel(20, 20).0[0];
        assert!(center > 8.0 && center < 10.0);
        assert_eq!(distance.get_pixel(0, 0).0[0], 0.0);
    }

    #[test]
    fn full_mask_has_finite_distances() {
        let img = GrayImage::from_pixel(5, 5, Luma([255]));
        let distance = distance_to_background(&img);
        assert_eq!(distance.get_pixel(2, 2).0[0], 3.0);
    }

    #[test]
    fn touching_discs_get_separate_labels() {
        let mut img = GrayImage::new(64, 40);
        draw_disc(&mut img, 20, 20, 10);
        draw_disc(&mut img, 40, 20, 10);
        let segmentation = watershed(&img);
        assert_eq!(segmentation.count, 2);
        let left = segmentation.labels.get_pixel(20, 20).0[0];
        let right = segmentation.labels.get_pixel(40, 20).0[0];
        assert_ne!(left, 0);
        assert_ne!(right, 0);
        assert_ne!(left, right);
        // every foreground pixel is claimed
        for (x, y, p) in img.enumerate_pixels() {
            if p.0[0] > 0 {
                assert_ne!(segmentation.labels.get_pixel(x, y).0[0], 0);
            }
        }
    }

    #[test]
    fn empty_mask_has_no_regions() {
        let img = GrayImage::new(16, 16);
        assert_eq!(watershed(&img).count, 0);
    }
}
