//! Quadtree over the point domain with lateral neighbor links.
//!
//! Cells live in a flat arena addressed by `CellId`; parent, child and lateral
//! (`right`, `up`) links are indices, so neighbor hops are O(1) and no cell
//! borrows another. Every cell owns a sparse scale-index → `BlockId` map: a
//! missing entry means the scale is held elsewhere in the subtree, which is
//! different from an entry pointing at an empty block.
//!
//! Child order is fixed: 0 lower-left, 1 lower-right, 2 upper-left,
//! 3 upper-right. "Up" is increasing y.
//!
//! - [`gather`]: level gathers over subtrees and row-major neighborhoods.

pub mod gather;

#[cfg(test)]
mod tests;

use crate::error::{RefineError, Result};
use crate::level::{BlockId, LevelBlock};
use crate::types::{Bounds, Point, Tensor};
use std::collections::BTreeMap;

/// Deepest quadtree the arena will allocate (`4^12` leaves).
pub const MAX_GRID_DEPTH: usize = 12;

/// Stable index of a cell inside the grid arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(pub(crate) usize);

impl CellId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
pub struct SpatialCell {
    pub depth: usize,
    pub bounds: Bounds,
    pub parent: Option<CellId>,
    pub children: Option<[CellId; 4]>,
    pub right: Option<CellId>,
    pub up: Option<CellId>,
    levels: BTreeMap<usize, BlockId>,
}

impl SpatialCell {
    fn new(depth: usize, bounds: Bounds, parent: Option<CellId>) -> Self {
        Self {
            depth,
            bounds,
            parent,
            children: None,
            right: None,
            up: None,
            levels: BTreeMap::new(),
        }
    }

    /// Block held by this cell itself at `scale_index`.
    pub fn level(&self, scale_index: usize) -> Option<BlockId> {
        self.levels.get(&scale_index).copied()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Complete quadtree plus the arena of blocks its cells own.
#[derive(Debug)]
pub struct SpatialGrid {
    bounds: Bounds,
    depth: usize,
    cells: Vec<SpatialCell>,
    blocks: Vec<LevelBlock>,
}

impl SpatialGrid {
    /// Builds a complete quadtree of `depth` levels below the root over `bounds`.
    ///
    /// Levels are created breadth first; once a level exists its lateral links
    /// are derived from siblings or from the parent's neighbor's children.
    pub fn build(depth: usize, bounds: Bounds) -> Result<Self> {
        if !bounds.is_valid() {
            return Err(RefineError::InvalidBounds);
        }
        if depth > MAX_GRID_DEPTH {
            return Err(RefineError::InvalidParameter {
                name: "tree_depth",
                message: format!("depth {depth} exceeds the maximum of {MAX_GRID_DEPTH}"),
            });
        }
        let total: usize = (0..=depth).map(|d| 1usize << (2 * d)).sum();
        let mut cells = Vec::with_capacity(total);
        cells.push(SpatialCell::new(0, bounds, None));

        let mut frontier = vec![CellId(0)];
        for d in 1..=depth {
            let mut next = Vec::with_capacity(frontier.len() * 4);
            for &parent in &frontier {
                let base = cells.len();
                let ids = [
                    CellId(base),
                    CellId(base + 1),
                    CellId(base + 2),
                    CellId(base + 3),
                ];
                for q in 0..4 {
                    let b = cells[parent.0].bounds.quadrant(q);
                    cells.push(SpatialCell::new(d, b, Some(parent)));
                }
                cells[parent.0].children = Some(ids);
                next.extend_from_slice(&ids);
            }
            for &parent in &frontier {
                link_children(&mut cells, parent);
            }
            frontier = next;
        }

        Ok(Self {
            bounds,
            depth,
            cells,
            blocks: Vec::new(),
        })
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Number of levels below the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn root(&self) -> CellId {
        CellId(0)
    }

    pub fn cell(&self, id: CellId) -> &SpatialCell {
        &self.cells[id.0]
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn block(&self, id: BlockId) -> &LevelBlock {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut LevelBlock {
        &mut self.blocks[id.0]
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Cell `(i, j)` at `depth`, descending one coordinate bit per level.
    pub fn locate(&self, depth: usize, i: usize, j: usize) -> Option<CellId> {
        if depth > self.depth || i >= (1 << depth) || j >= (1 << depth) {
            return None;
        }
        let mut id = self.root();
        for level in (0..depth).rev() {
            let q = ((i >> level) & 1) | (((j >> level) & 1) << 1);
            let children = self.cells[id.0].children?;
            id = children[q];
        }
        Some(id)
    }

    /// `(i, j)` coordinates of `cell` among the cells of its depth; the
    /// inverse of [`locate`](Self::locate).
    pub fn coords(&self, cell: CellId) -> (usize, usize) {
        let (mut i, mut j) = (0, 0);
        let mut id = cell;
        let mut bit = 0;
        while let Some(parent) = self.cells[id.0].parent {
            let q = self.cells[parent.0]
                .children
                .and_then(|c| c.iter().position(|&child| child == id))
                .unwrap_or(0);
            i |= (q & 1) << bit;
            j |= ((q >> 1) & 1) << bit;
            bit += 1;
            id = parent;
        }
        (i, j)
    }

    /// Leaf cell a point bins into. Points outside the domain clamp to the edge.
    pub fn leaf_for_point(&self, p: &Point) -> CellId {
        let n = 1usize << self.depth;
        let axis = |v: f64, lo: f64, extent: f64| -> usize {
            if extent <= 0.0 {
                return 0;
            }
            let t = ((v - lo) / extent * n as f64).floor();
            if t.is_nan() || t < 0.0 {
                0
            } else {
                (t as usize).min(n - 1)
            }
        };
        let i = axis(p.x, self.bounds.min_x, self.bounds.width());
        let j = axis(p.y, self.bounds.min_y, self.bounds.height());
        self.locate(self.depth, i, j).unwrap_or(self.root())
    }

    /// `true` if `cell` is `ancestor` or lies in its subtree.
    pub fn is_within(&self, cell: CellId, ancestor: CellId) -> bool {
        let target_depth = self.cells[ancestor.0].depth;
        let mut id = cell;
        while self.cells[id.0].depth > target_depth {
            match self.cells[id.0].parent {
                Some(p) => id = p,
                None => return false,
            }
        }
        id == ancestor
    }

    /// Registers `block` as the holder of its scale index at its cell.
    pub fn attach_block(&mut self, block: LevelBlock) -> Result<BlockId> {
        let cell = block.cell();
        let scale_index = block.scale_index();
        if self.cells[cell.0].levels.contains_key(&scale_index) {
            return Err(RefineError::LevelOccupied {
                cell: cell.0,
                scale_index,
            });
        }
        let id = BlockId(self.blocks.len());
        self.blocks.push(block);
        self.cells[cell.0].levels.insert(scale_index, id);
        Ok(id)
    }

    /// Bins the raw input into scale-0 blocks, one per leaf (empty leaves get
    /// empty blocks so every leaf holds scale 0).
    pub fn populate(&mut self, points: Vec<Point>, scale: f64, seed: Tensor) -> Result<usize> {
        let leaves: Vec<CellId> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_leaf())
            .map(|(i, _)| CellId(i))
            .collect();
        let mut bins: BTreeMap<CellId, Vec<Point>> =
            leaves.iter().map(|&id| (id, Vec::new())).collect();
        for p in points {
            let leaf = self.leaf_for_point(&p);
            bins.entry(leaf).or_default().push(p);
        }
        let mut attached = 0;
        for (cell, pts) in bins {
            self.attach_block(LevelBlock::populate(cell, scale, pts, seed))?;
            attached += 1;
        }
        Ok(attached)
    }

    /// Shallowest depth at which some cell holds a block at `scale_index`.
    pub fn shallowest_level_depth(&self, scale_index: usize) -> Option<usize> {
        self.cells
            .iter()
            .filter(|c| c.levels.contains_key(&scale_index))
            .map(|c| c.depth)
            .min()
    }

    /// Every block recorded at `scale_index`, in arena order of their cells.
    pub fn blocks_at_scale(&self, scale_index: usize) -> Vec<BlockId> {
        self.cells
            .iter()
            .filter_map(|c| c.level(scale_index))
            .collect()
    }
}

fn link_children(cells: &mut [SpatialCell], parent: CellId) {
    let Some(children) = cells[parent.0].children else {
        return;
    };
    let parent_right = cells[parent.0].right.and_then(|r| cells[r.0].children);
    let parent_up = cells[parent.0].up.and_then(|u| cells[u.0].children);
    for (q, &child) in children.iter().enumerate() {
        let right = if q & 1 == 0 {
            Some(children[q + 1])
        } else {
            parent_right.map(|c| c[q - 1])
        };
        let up = if q & 2 == 0 {
            Some(children[q + 2])
        } else {
            parent_up.map(|c| c[q - 2])
        };
        cells[child.0].right = right;
        cells[child.0].up = up;
    }
}
