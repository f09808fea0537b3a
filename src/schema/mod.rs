pub mod generation;
pub mod params;
pub mod story;
