//! Scale driver: block scheduling, memory budgeting, scale progression and
//! persistence.
//!
//! The driver walks a small state machine:
//!
//! ```text
//! Idle --initialize_level--> LevelInitialized --refine_next_block--> BlockInProgress
//!                                                                        |
//!        LevelInitialized <--advance_scale-- ScaleExhausted <-- (cursor done)
//!                                                |
//!                                                +--advance_scale (last scale)--> Terminal
//! ```
//!
//! Typical use:
//!
//! ```no_run
//! use level_refine::{Bounds, DriverParams, Point, ScaleDriver};
//!
//! # fn main() -> level_refine::Result<()> {
//! let points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.5)];
//! let bounds = Bounds::new(0.0, 0.0, 10.0, 10.0);
//! let mut driver = ScaleDriver::new(points, bounds, DriverParams::default())?;
//! driver.compute_scale()?;
//! driver.build_tree()?;
//! let report = driver.run("out/tokens", 5_000, 1)?;
//! println!("{} scales", report.scales.len());
//! # Ok(())
//! # }
//! ```
//!
//! Processing is strictly sequential; the only blocking points are token file
//! reads and writes.

pub mod params;
mod refine;
mod schedule;

pub use params::{
    CoarseningPolicy, DriverParams, INFLUENCE_FACTOR, PADDING_FACTOR, SIGNIFICANCE_THRESHOLD,
};
pub use schedule::LevelPlan;

use crate::diagnostics::{RunReport, ScaleReport};
use crate::error::{RefineError, Result};
use crate::extract::collect_tokens;
use crate::grid::SpatialGrid;
use crate::kernel::{StickBallKernel, VotingKernel};
use crate::select::SelectionLedger;
use crate::types::{Bounds, Point, Token};
use log::{debug, info};
use schedule::Cursor;
use serde::Serialize;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DriverState {
    Idle,
    LevelInitialized,
    BlockInProgress,
    ScaleExhausted,
    Terminal,
}

pub struct ScaleDriver<K: VotingKernel = StickBallKernel> {
    params: DriverParams,
    kernel: K,
    bounds: Bounds,
    input_len: usize,
    pending: Option<Vec<Point>>,
    grid: Option<SpatialGrid>,
    scale: Option<f64>,
    initial_scale: Option<f64>,
    scale_index: usize,
    state: DriverState,
    plan: Option<LevelPlan>,
    request: Option<(usize, usize)>,
    cursor: Cursor,
    ledger: SelectionLedger,
    sequence: u64,
    current_report: Option<ScaleReport>,
    finished_reports: Vec<ScaleReport>,
}

impl ScaleDriver<StickBallKernel> {
    /// Driver over `points` inside `bounds` using the reference voting kernel.
    pub fn new(points: Vec<Point>, bounds: Bounds, params: DriverParams) -> Result<Self> {
        Self::with_kernel(points, bounds, params, StickBallKernel::default())
    }
}

impl<K: VotingKernel> ScaleDriver<K> {
    pub fn with_kernel(
        points: Vec<Point>,
        bounds: Bounds,
        params: DriverParams,
        kernel: K,
    ) -> Result<Self> {
        if !bounds.is_valid() {
            return Err(RefineError::InvalidBounds);
        }
        params.validate()?;
        Ok(Self {
            params,
            kernel,
            bounds,
            input_len: points.len(),
            pending: Some(points),
            grid: None,
            scale: None,
            initial_scale: None,
            scale_index: 0,
            state: DriverState::Idle,
            plan: None,
            request: None,
            cursor: Cursor::default(),
            ledger: SelectionLedger::new(),
            sequence: 0,
            current_report: None,
            finished_reports: Vec::new(),
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn params(&self) -> &DriverParams {
        &self.params
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn scale(&self) -> Option<f64> {
        self.scale
    }

    pub fn scale_index(&self) -> usize {
        self.scale_index
    }

    pub fn plan(&self) -> Option<&LevelPlan> {
        self.plan.as_ref()
    }

    pub fn grid(&self) -> Option<&SpatialGrid> {
        self.grid.as_ref()
    }

    /// Number of token files written so far.
    pub fn files_written(&self) -> u64 {
        self.sequence
    }

    /// Reports of the scales finished so far.
    pub fn scale_reports(&self) -> &[ScaleReport] {
        &self.finished_reports
    }

    fn require_scale(&self) -> Result<f64> {
        self.scale.ok_or(RefineError::ScaleNotSet)
    }

    fn require_idle_without_scale(&self, op: &'static str) -> Result<()> {
        if let Some(current) = self.scale {
            return Err(RefineError::ScaleAlreadySet(current));
        }
        if self.state != DriverState::Idle || self.grid.is_some() {
            return Err(RefineError::InvalidState {
                op,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Derives the initial scale from the mean point spacing of the input.
    pub fn compute_scale(&mut self) -> Result<f64> {
        self.require_idle_without_scale("compute_scale")?;
        let n = self.input_len;
        if n == 0 {
            return Err(RefineError::EmptyInput);
        }
        let area = self.bounds.area();
        let spacing = if area > 0.0 {
            (area / n as f64).sqrt()
        } else {
            self.bounds.extent() / n as f64
        };
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(RefineError::InvalidScale(spacing));
        }
        self.scale = Some(spacing);
        self.initial_scale = Some(spacing);
        info!("computed initial scale {spacing:.6} from {n} points");
        Ok(spacing)
    }

    /// Sets the initial scale explicitly.
    pub fn set_scale(&mut self, value: f64) -> Result<()> {
        if !(value.is_finite() && value > 0.0) {
            return Err(RefineError::InvalidScale(value));
        }
        if self.state != DriverState::Idle || self.grid.is_some() {
            return Err(RefineError::InvalidState {
                op: "set_scale",
                state: self.state,
            });
        }
        self.scale = Some(value);
        self.initial_scale = Some(value);
        Ok(())
    }

    /// Number of scales from the current one until `6 × scale` covers the domain.
    pub fn estimate_levels(&self) -> Result<usize> {
        let mut scale = self.require_scale()?;
        let extent = self.bounds.extent();
        let mut levels = 1;
        while PADDING_FACTOR * scale < extent {
            scale *= self.params.scale_multiplier;
            levels += 1;
        }
        Ok(levels)
    }

    /// `true` once the current scale's padding spans the whole domain.
    pub fn is_final_scale(&self) -> bool {
        self.scale
            .map(|s| PADDING_FACTOR * s >= self.bounds.extent())
            .unwrap_or(false)
    }

    /// Builds the quadtree and bins the raw input as scale 0. Returns the tree depth.
    pub fn build_tree(&mut self) -> Result<usize> {
        let scale = self.require_scale()?;
        let Some(points) = self.pending.take() else {
            return Err(RefineError::InvalidState {
                op: "build_tree",
                state: self.state,
            });
        };
        let depth = self
            .params
            .derive_tree_depth(self.bounds.extent(), scale);
        let mut grid = SpatialGrid::build(depth, self.bounds)?;
        let leaves = grid.populate(points, scale, self.kernel.initial_tensor())?;
        info!(
            "built quadtree depth {} ({} cells, {} leaf blocks, {} points)",
            depth,
            grid.cell_count(),
            leaves,
            self.input_len
        );
        self.grid = Some(grid);
        Ok(depth)
    }

    /// Moves to the next scale. Returns `false` once the finished scale was the last.
    pub fn advance_scale(&mut self) -> Result<bool> {
        match self.state {
            DriverState::ScaleExhausted => {}
            DriverState::Terminal => return Ok(false),
            state => {
                return Err(RefineError::InvalidState {
                    op: "advance_scale",
                    state,
                })
            }
        }
        if let Some(report) = self.current_report.take() {
            self.finished_reports.push(report);
        }
        if self.is_final_scale() {
            info!("scale index {} was the last scale", self.scale_index);
            self.state = DriverState::Terminal;
            return Ok(false);
        }
        let scale = self.require_scale()? * self.params.scale_multiplier;
        self.scale = Some(scale);
        self.scale_index += 1;
        self.ledger.clear();
        info!("advanced to scale index {} (scale {scale:.6})", self.scale_index);

        let (budget, min_depth) = self.request.unwrap_or((usize::MAX, 0));
        self.plan_level(budget, min_depth)?;
        Ok(true)
    }

    /// Tokens with saliency above the significance threshold at `scale_index`,
    /// optionally restricted to `bounds`. Spilled blocks are read back
    /// temporarily; the returned list is an independent copy.
    pub fn get_tokens(&self, scale_index: usize, bounds: Option<&Bounds>) -> Result<Vec<Token>> {
        match &self.grid {
            Some(grid) => collect_tokens(grid, scale_index, bounds),
            None => Err(RefineError::InvalidState {
                op: "get_tokens",
                state: self.state,
            }),
        }
    }

    /// Runs every remaining scale to completion, writing token files under `prefix`.
    pub fn run(&mut self, prefix: &str, budget: usize, min_depth: usize) -> Result<RunReport> {
        let start = Instant::now();
        if self.scale.is_none() {
            self.compute_scale()?;
        }
        if self.grid.is_none() {
            self.build_tree()?;
        }
        if matches!(self.state, DriverState::Idle | DriverState::LevelInitialized) {
            self.initialize_level(budget, min_depth)?;
        }
        loop {
            while self.refine_next_block(prefix)? > 0 {}
            if !self.advance_scale()? {
                break;
            }
        }
        let report = RunReport {
            input_points: self.input_len,
            tree_depth: self.grid.as_ref().map(|g| g.depth()).unwrap_or(0),
            initial_scale: self.initial_scale.unwrap_or(0.0),
            scales: self.finished_reports.clone(),
            files_written: self.sequence as usize,
            total_ms: start.elapsed().as_secs_f64() * 1000.0,
        };
        debug!(
            "run finished: {} scales, {} files in {:.1} ms",
            report.scales.len(),
            report.files_written,
            report.total_ms
        );
        Ok(report)
    }
}
