pub mod geometry;
pub mod stats;

pub use geometry::{min_enclosing_circle, Circle};
pub use stats::StatsHelper;
