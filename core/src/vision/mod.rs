pub mod enhance;
pub mod extract;
pub mod segment;
pub mod watershed;

pub use enhance::EnhanceConfig;
pub use extract::{ExtractionStrategy, ExternalContours, ParticleExtractor, WatershedContours};
pub use segment::{ColorBand, ColorSegmenter, Hsv};
