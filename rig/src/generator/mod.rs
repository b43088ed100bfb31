pub mod profile;
pub mod sequence;
