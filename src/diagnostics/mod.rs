//! Serializable reports produced while the driver refines scales.
//!
//! `RunReport` is the entry point returned by [`ScaleDriver::run`](crate::ScaleDriver::run):
//! one `ScaleReport` per processed scale, each listing the `BlockReport` of
//! every scheduled block with its stage timings.

pub mod report;
pub mod timing;

pub use report::{BlockReport, RunReport, ScaleReport};
pub use timing::{StageTiming, TimingBreakdown};
