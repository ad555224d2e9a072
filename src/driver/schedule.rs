//! Level planning and the row-major block cursor.
//!
//! Planning starts at the shallowest depth holding the current scale and
//! climbs toward the root while a coarser schedule still fits the point
//! budget. The estimate for a depth is the worst count-only neighborhood
//! gather over all its cells, so no token data is touched while planning.
use super::params::PADDING_FACTOR;
use super::{DriverState, ScaleDriver};
use crate::diagnostics::ScaleReport;
use crate::error::{RefineError, Result};
use crate::grid::{CellId, SpatialGrid};
use crate::kernel::VotingKernel;
use log::{debug, info, warn};
use serde::Serialize;

/// Schedule chosen for one scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelPlan {
    /// Root depth of the scheduled cells.
    pub depth: usize,
    /// Levels between the scheduled cells and the leaves (`tree_depth − depth`).
    pub height: usize,
    /// Number of scheduled blocks, `4^depth`.
    pub blocks: usize,
    /// Worst-case count-only neighborhood size at `depth`.
    pub estimated_block_size: usize,
    pub budget: usize,
    pub min_depth: usize,
    /// Depth of the shallowest cell holding the scale's data.
    pub data_depth: usize,
}

/// Row-major cursor over the scheduled cells following lateral links.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Cursor {
    anchor: Option<CellId>,
    current: Option<CellId>,
}

impl Cursor {
    pub(crate) fn start(first: Option<CellId>) -> Self {
        Self {
            anchor: first,
            current: first,
        }
    }

    /// Returns the cell under the cursor and moves right, wrapping to the next row.
    pub(crate) fn advance(&mut self, grid: &SpatialGrid) -> Option<CellId> {
        let cell = self.current?;
        self.current = match grid.cell(cell).right {
            Some(right) => Some(right),
            None => {
                self.anchor = self.anchor.and_then(|a| grid.cell(a).up);
                self.anchor
            }
        };
        Some(cell)
    }
}

/// Worst count-only neighborhood size over all cells at `depth`.
pub(crate) fn estimate_block_size(
    grid: &SpatialGrid,
    depth: usize,
    scale_index: usize,
    padding: f64,
) -> usize {
    let n = 1usize << depth;
    let mut worst = 0;
    for j in 0..n {
        for i in 0..n {
            if let Some(cell) = grid.locate(depth, i, j) {
                let rect = grid.cell(cell).bounds.padded_up_right(padding);
                worst = worst.max(grid.count_neighborhood(cell, scale_index, &rect));
            }
        }
    }
    worst
}

impl<K: VotingKernel> ScaleDriver<K> {
    /// Chooses the scheduling depth for the current scale and resets the cursor.
    /// Returns the number of scheduled blocks.
    pub fn initialize_level(&mut self, budget: usize, min_depth: usize) -> Result<usize> {
        match self.state {
            DriverState::Idle | DriverState::LevelInitialized => {}
            state => {
                return Err(RefineError::InvalidState {
                    op: "initialize_level",
                    state,
                })
            }
        }
        if budget == 0 {
            return Err(RefineError::InvalidParameter {
                name: "budget",
                message: "point budget must be positive".to_string(),
            });
        }
        self.plan_level(budget, min_depth)
    }

    pub(crate) fn plan_level(&mut self, budget: usize, min_depth: usize) -> Result<usize> {
        let scale = self.require_scale()?;
        let grid = self.grid.as_ref().ok_or(RefineError::InvalidState {
            op: "initialize_level",
            state: self.state,
        })?;
        let k = self.scale_index;
        let data_depth = grid
            .shallowest_level_depth(k)
            .ok_or(RefineError::InvalidState {
                op: "initialize_level",
                state: self.state,
            })?;
        let padding = PADDING_FACTOR * scale;

        let mut depth = data_depth;
        let mut estimate = estimate_block_size(grid, depth, k, padding);
        if data_depth < min_depth {
            debug!(
                "scale index {k}: data already held at depth {data_depth} above min depth {min_depth}"
            );
        }
        while depth > min_depth {
            let coarser = estimate_block_size(grid, depth - 1, k, padding);
            if coarser > budget {
                break;
            }
            depth -= 1;
            estimate = coarser;
        }
        if estimate > budget {
            warn!(
                "scale index {k}: worst block estimate {estimate} exceeds budget {budget} at data depth {depth}"
            );
        }

        let plan = LevelPlan {
            depth,
            height: grid.depth() - depth,
            blocks: 1usize << (2 * depth),
            estimated_block_size: estimate,
            budget,
            min_depth,
            data_depth,
        };
        info!(
            "scale index {k} (scale {scale:.6}): scheduling {} blocks at depth {} (estimate {}, budget {})",
            plan.blocks, plan.depth, plan.estimated_block_size, budget
        );

        self.cursor = Cursor::start(grid.locate(depth, 0, 0));
        self.plan = Some(plan);
        self.request = Some((budget, min_depth));
        self.current_report = Some(ScaleReport::new(
            k,
            scale,
            self.is_final_scale(),
            Some(plan),
        ));
        self.state = DriverState::LevelInitialized;
        Ok(plan.blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bounds, Point, Tensor};

    #[test]
    fn cursor_visits_cells_row_major() {
        let grid = SpatialGrid::build(2, Bounds::new(0.0, 0.0, 4.0, 4.0)).unwrap();
        let mut cursor = Cursor::start(grid.locate(1, 0, 0));
        let mut visited = Vec::new();
        while let Some(c) = cursor.advance(&grid) {
            visited.push(c);
        }
        let expected: Vec<CellId> = [(0, 0), (1, 0), (0, 1), (1, 1)]
            .iter()
            .map(|&(i, j)| grid.locate(1, i, j).unwrap())
            .collect();
        assert_eq!(visited, expected);
        assert_eq!(cursor.advance(&grid), None);
    }

    #[test]
    fn estimate_takes_the_worst_neighborhood() {
        let mut grid = SpatialGrid::build(1, Bounds::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        let points = vec![
            Point::new(1.0, 1.0),
            Point::new(6.0, 1.0),
            Point::new(6.0, 6.0),
            Point::new(7.0, 7.0),
        ];
        grid.populate(points, 1.0, Tensor::identity()).unwrap();
        assert_eq!(estimate_block_size(&grid, 1, 0, 1.0), 4);
        assert_eq!(estimate_block_size(&grid, 1, 0, 0.0), 2);
        assert_eq!(estimate_block_size(&grid, 0, 0, 0.0), 4);
    }
}
