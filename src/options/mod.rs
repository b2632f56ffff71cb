//! Put option parameters and display projection

pub mod params;
pub mod view;

pub use params::{normalize, NormalizedParams, OptionForm, ValidationError};
pub use view::{partition, OptionPartition, OptionView};
