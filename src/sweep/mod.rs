//! Sweep module - Frequency sweeps, candidate enumeration, and cross-run
//! scoring for source placement.

mod aggregator;
mod driver;
mod octaves;
mod record;
mod source_pairs;
mod weighting;

pub use aggregator::*;
pub use driver::*;
pub use octaves::*;
pub use record::*;
pub use source_pairs::*;
pub use weighting::*;
