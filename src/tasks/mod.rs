//! Leaf tasks of the build pipelines.

mod clean;
mod copy;
mod data;
mod time_file;

pub use clean::Clean;
pub use copy::CopyStatic;
pub use data::{parse_readings, DataProcessing, Reading, Readings};
pub use time_file::{TimeFile, TimeRecord};
