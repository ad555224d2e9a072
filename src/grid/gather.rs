//! Level gathers over the quadtree.
//!
//! A cell answers for a scale either with its own block or, when it holds
//! none, with the blocks of its four children (recursively). The bounded
//! variant prunes subtrees that do not overlap the requested rectangle.
//!
//! The neighborhood gather walks lateral links from a scheduled cell: first
//! rightward along its row, then up row by row (rightward again on each row),
//! while the next cell still starts below the padded rectangle's upper edge.
//! Blocks are processed in row-major order with padding only to the right and
//! above, so nothing below or left of the cell is ever needed.
use super::{CellId, SpatialGrid};
use crate::level::BlockId;
use crate::types::Bounds;
use log::error;

impl SpatialGrid {
    /// Blocks at `scale_index` held by `cell` or, failing that, by its subtree.
    ///
    /// A leaf reached without finding the scale is a caller protocol
    /// violation: it is logged and contributes nothing.
    pub fn gather_levels(&self, cell: CellId, scale_index: usize) -> Vec<BlockId> {
        let mut out = Vec::new();
        if !self.collect_levels(cell, scale_index, None, &mut out) {
            error!(
                "gather_levels: scale index {} absent below cell {} (depth {})",
                scale_index,
                cell.index(),
                self.cell(cell).depth
            );
        }
        out
    }

    /// Like [`gather_levels`](Self::gather_levels), skipping subtrees whose
    /// bounds do not intersect `required`.
    pub fn gather_levels_within_bounds(
        &self,
        cell: CellId,
        scale_index: usize,
        required: &Bounds,
    ) -> Vec<BlockId> {
        let mut out = Vec::new();
        if !self.collect_levels(cell, scale_index, Some(required), &mut out) {
            error!(
                "gather_levels_within_bounds: scale index {} absent below cell {} (depth {})",
                scale_index,
                cell.index(),
                self.cell(cell).depth
            );
        }
        out
    }

    /// Returns `false` if some branch bottomed out without the scale.
    fn collect_levels(
        &self,
        cell: CellId,
        scale_index: usize,
        required: Option<&Bounds>,
        out: &mut Vec<BlockId>,
    ) -> bool {
        let c = self.cell(cell);
        if let Some(req) = required {
            if !c.bounds.intersects(req) {
                return true;
            }
        }
        if let Some(block) = c.level(scale_index) {
            out.push(block);
            return true;
        }
        match c.children {
            Some(children) => {
                let mut complete = true;
                for child in children {
                    complete &= self.collect_levels(child, scale_index, required, out);
                }
                complete
            }
            None => false,
        }
    }

    /// Cells of the row-major sweep starting at `cell` and covering `rect`.
    pub fn neighborhood_cells(&self, cell: CellId, rect: &Bounds) -> Vec<CellId> {
        let mut cells = Vec::new();
        let mut row = Some(cell);
        while let Some(anchor) = row {
            if anchor != cell && self.cell(anchor).bounds.min_y >= rect.max_y {
                break;
            }
            let mut cur = Some(anchor);
            while let Some(c) = cur {
                if c != anchor && self.cell(c).bounds.min_x >= rect.max_x {
                    break;
                }
                cells.push(c);
                cur = self.cell(c).right;
            }
            row = self.cell(anchor).up;
        }
        cells
    }

    /// Blocks at `scale_index` in the padded neighborhood of `cell`.
    pub fn gather_neighborhood(
        &self,
        cell: CellId,
        scale_index: usize,
        rect: &Bounds,
    ) -> Vec<BlockId> {
        self.neighborhood_cells(cell, rect)
            .into_iter()
            .flat_map(|c| self.gather_levels(c, scale_index))
            .collect()
    }

    /// Count-only neighborhood gather: total points the real gather would move.
    pub fn count_neighborhood(&self, cell: CellId, scale_index: usize, rect: &Bounds) -> usize {
        self.gather_neighborhood(cell, scale_index, rect)
            .into_iter()
            .map(|b| self.block(b).point_count())
            .sum()
    }
}
