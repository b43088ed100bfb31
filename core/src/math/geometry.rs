use imageproc::point::Point;

const EPS: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub cx: f64,
    pub cy: f64,
    pub radius: f64,
}

impl Circle {
    fn contains(&self, x: f64, y: f64) -> bool {
        let dx = x - self.cx;
        let dy = y - self.cy;
        (dx * dx + dy * dy).sqrt() <= self.radius + EPS
    }

    fn from_diameter(a: (f64, f64), b: (f64, f64)) -> Self {
        let cx = (a.0 + b.0) / 2.0;
        let cy = (a.1 + b.1) / 2.0;
        let radius = ((a.0 - cx).powi(2) + (a.1 - cy).powi(2)).sqrt();
        Self { cx, cy, radius }
    }

    fn through(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
        if d.abs() < EPS {
            // Collinear: the widest pair spans the circle.
            let mut widest = Self::from_diameter(a, b);
            for candidate in [Self::from_diameter(b, c), Self::from_diameter(a, c)] {
                if candidate.radius > widest.radius {
                    widest = candidate;
                }
            }
            return widest;
        }
        let a2 = a.0 * a.0 + a.1 * a.1;
        let b2 = b.0 * b.0 + b.1 * b.1;
        let c2 = c.0 * c.0 + c.1 * c.1;
        let cx = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
        let cy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
        let radius = ((a.0 - cx).powi(2) + (a.1 - cy).powi(2)).sqrt();
        Self { cx, cy, radius }
    }
}

/// Smallest circle enclosing every point (incremental Welzl construction).
///
/// Points are visited in input order so the result is reproducible.
pub fn min_enclosing_circle(points: &[Point<i32>]) -> Option<Circle> {
    let pts: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    let first = *pts.first()?;
    let mut circle = Circle {
        cx: first.0,
        cy: first.1,
        radius: 0.0,
    };

    for (i, &p) in pts.iter().enumerate().skip(1) {
        if circle.contains(p.0, p.1) {
            continue;
        }
        circle = Circle {
            cx: p.0,
            cy: p.1,
            radius: 0.0,
        };
        for (j, &q) in pts[..i].iter().enumerate() {
            if circle.contains(q.0, q.1) {
                continue;
            }
            circle = Circle::from_diameter(p, q);
            for &r in &pts[..j] {
                if !circle.contains(r.0, r.1) {
                    circle = Circle::through(p, q, r);
                }
            }
        }
    }

    Some(circle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: i32) -> Vec<Point<i32>> {
        vec![
            Point::new(0, 0),
            Point::new(side, 0),
            Point::new(side, side),
            Point::new(0, side),
        ]
    }

    #[test]
    fn enclosing_circle_of_square_is_centered() {
        let circle = min_enclosing_circle(&square(10)).unwrap();
        assert!((circle.cx - 5.0).abs() < 1e-9);
        assert!((circle.cy - 5.0).abs() < 1e-9);
        assert!((circle.radius - 50f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn enclosing_circle_handles_collinear_points() {
        let pts = vec![Point::new(0, 0), Point::new(4, 0), Point::new(2, 0)];
        let circle = min_enclosing_circle(&pts).unwrap();
        assert!((circle.cx - 2.0).abs() < 1e-9);
        assert!((circle.radius - 2.0).abs() < 1e-9);
    }

    #[test]
    fn enclosing_circle_of_nothing_is_none() {
        assert!(min_enclosing_circle(&[]).is_none());
    }
}
