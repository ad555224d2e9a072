#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod driver;
pub mod error;
pub mod extract;
pub mod kernel;
pub mod types;

// Building blocks of the driver. Public for tools and tests, but their
// signatures may still move.
pub mod diagnostics;
pub mod grid;
pub mod index;
pub mod level;
pub mod select;
pub mod store;
pub mod tensor;

// Tooling
pub mod config;
pub mod io;

// --- High-level re-exports -------------------------------------------------

pub use crate::driver::{
    CoarseningPolicy, DriverParams, DriverState, LevelPlan, ScaleDriver, SIGNIFICANCE_THRESHOLD,
};
pub use crate::error::{RefineError, Result};
pub use crate::kernel::{StickBallKernel, VotingKernel};
pub use crate::types::{Bounds, Point, Tensor, Token};

// Reports returned by `ScaleDriver::run`.
pub use crate::diagnostics::{BlockReport, RunReport, ScaleReport};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use level_refine::prelude::*;
///
/// # fn main() -> level_refine::Result<()> {
/// let points: Vec<Point> = (0..1000)
///     .map(|i| Point::new(i as f64 * 0.1, 50.0))
///     .collect();
/// let bounds = Bounds::new(0.0, 0.0, 100.0, 100.0);
///
/// let mut driver = ScaleDriver::new(points, bounds, DriverParams::default())?;
/// let report = driver.run("out/tokens", 5_000, 1)?;
/// for scale in &report.scales {
///     let tokens = driver.get_tokens(scale.scale_index, None)?;
///     println!("scale {:.3}: {} significant tokens", scale.scale, tokens.len());
/// }
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::{Bounds, DriverParams, Point, ScaleDriver, Token};
}
