//! Per-cell, per-scale point containers.
//!
//! A `LevelBlock` keeps its metadata (owning cell, scale, point count, file
//! path, selection list) for the whole run, while the heavy arrays live in
//! move-only buffers that come and go:
//!
//! - `BlockTokens`: coordinates, computed tensors and per-point resolved flags.
//!   Dropped after the block is persisted, reloaded from disk on demand.
//! - `WorkingBuffer`: seed tensors the points vote with at this scale. Released
//!   once every point of the block is resolved and the block will not vote again.
//!
//! Scale-0 blocks are filled by binning raw input (`populate`); later scales are
//! filled only by concatenating selections of finished blocks (`promote`).
use crate::grid::CellId;
use crate::kernel::VotingKernel;
use crate::tensor::saliency_or_unresolved;
use crate::types::{Point, Tensor};
use std::path::{Path, PathBuf};

/// Stable index of a block inside the grid's block arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Resident token arrays of a block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockTokens {
    pub points: Vec<Point>,
    pub tensors: Vec<Tensor>,
    pub resolved: Vec<bool>,
}

impl BlockTokens {
    /// Fresh, fully unresolved arrays for `points`.
    pub fn unresolved(points: Vec<Point>) -> Self {
        let n = points.len();
        Self {
            points,
            tensors: vec![Tensor::zeros(); n],
            resolved: vec![false; n],
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn saliency(&self, i: usize) -> f64 {
        saliency_or_unresolved(&self.tensors[i], self.resolved[i])
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved.iter().filter(|&&r| r).count()
    }
}

/// Seed tensors used while the block's points vote. Move-only.
#[derive(Debug, PartialEq)]
pub struct WorkingBuffer {
    seeds: Vec<Tensor>,
}

impl WorkingBuffer {
    pub fn new(seeds: Vec<Tensor>) -> Self {
        Self { seeds }
    }

    pub fn seeds(&self) -> &[Tensor] {
        &self.seeds
    }

    pub fn into_seeds(self) -> Vec<Tensor> {
        self.seeds
    }
}

/// One selection subset feeding a promotion.
pub struct PromotionSource<'a> {
    pub tokens: &'a BlockTokens,
    pub selection: &'a [usize],
}

/// Scale-indexed container of points owned by a grid cell.
#[derive(Debug)]
pub struct LevelBlock {
    cell: CellId,
    scale: f64,
    scale_index: usize,
    point_count: usize,
    tokens: Option<BlockTokens>,
    working: Option<WorkingBuffer>,
    selection: Vec<usize>,
    file: Option<PathBuf>,
}

impl LevelBlock {
    /// Scale-0 block built directly from binned raw input.
    pub fn populate(cell: CellId, scale: f64, points: Vec<Point>, seed: Tensor) -> Self {
        let n = points.len();
        Self {
            cell,
            scale,
            scale_index: 0,
            point_count: n,
            tokens: Some(BlockTokens::unresolved(points)),
            working: Some(WorkingBuffer::new(vec![seed; n])),
            selection: Vec::new(),
            file: None,
        }
    }

    /// Next-scale block concatenating the selected points of `sources`.
    ///
    /// Coordinates are copied verbatim; each point's resolved tensor is carried
    /// forward through the kernel to become its seed. All points start unresolved.
    pub fn promote<K: VotingKernel + ?Sized>(
        cell: CellId,
        scale: f64,
        scale_index: usize,
        sources: &[PromotionSource<'_>],
        kernel: &K,
        scale_multiplier: f64,
        max_saliency_clamp: f64,
    ) -> Self {
        let total: usize = sources.iter().map(|s| s.selection.len()).sum();
        let mut points = Vec::with_capacity(total);
        let mut seeds = Vec::with_capacity(total);
        for source in sources {
            for &i in source.selection {
                points.push(source.tokens.points[i]);
                seeds.push(kernel.carry_forward(
                    &source.tokens.tensors[i],
                    scale_multiplier,
                    max_saliency_clamp,
                ));
            }
        }
        Self {
            cell,
            scale,
            scale_index,
            point_count: total,
            tokens: Some(BlockTokens::unresolved(points)),
            working: Some(WorkingBuffer::new(seeds)),
            selection: Vec::new(),
            file: None,
        }
    }

    pub fn cell(&self) -> CellId {
        self.cell
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn scale_index(&self) -> usize {
        self.scale_index
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn is_resident(&self) -> bool {
        self.tokens.is_some()
    }

    pub fn tokens(&self) -> Option<&BlockTokens> {
        self.tokens.as_ref()
    }

    pub fn tokens_mut(&mut self) -> Option<&mut BlockTokens> {
        self.tokens.as_mut()
    }

    pub fn working(&self) -> Option<&WorkingBuffer> {
        self.working.as_ref()
    }

    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub(crate) fn set_file(&mut self, path: PathBuf) {
        self.file = Some(path);
    }

    /// Re-attaches arrays read back from disk.
    pub(crate) fn restore(&mut self, tokens: BlockTokens, working: Option<WorkingBuffer>) {
        debug_assert_eq!(tokens.len(), self.point_count);
        self.tokens = Some(tokens);
        self.working = working;
    }

    /// Records a promoted point. Out-of-range indices are ignored.
    pub fn record_selection(&mut self, local: usize) {
        if local < self.point_count {
            self.selection.push(local);
        }
    }

    /// Frees the token arrays. Metadata stays valid.
    pub fn unload(&mut self) -> Option<BlockTokens> {
        self.tokens.take()
    }

    /// Frees the seed tensors; the block can no longer vote at this scale.
    pub fn release_working(&mut self) -> Option<WorkingBuffer> {
        self.working.take()
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.tokens
            .as_ref()
            .map(|t| t.resolved.iter().all(|&r| r))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::StickBallKernel;

    fn cell() -> CellId {
        CellId(0)
    }

    #[test]
    fn populate_starts_unresolved_with_seeds() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
        let block = LevelBlock::populate(cell(), 0.5, pts.clone(), Tensor::identity());
        assert_eq!(block.point_count(), 2);
        assert_eq!(block.scale_index(), 0);
        let tokens = block.tokens().unwrap();
        assert_eq!(tokens.points, pts);
        assert!(tokens.resolved.iter().all(|r| !r));
        assert_eq!(block.working().unwrap().seeds().len(), 2);
        assert_eq!(tokens.saliency(0), -1.0);
    }

    #[test]
    fn promote_concatenates_selected_points_only() {
        let mut a = BlockTokens::unresolved(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
        ]);
        a.tensors[2] = Tensor::new(3.0, 0.0, 0.0, 1.0);
        a.resolved = vec![true; 3];
        let b = BlockTokens::unresolved(vec![Point::new(5.0, 5.0)]);

        let kernel = StickBallKernel::default();
        let sel_a = [2usize, 0];
        let sel_b = [0usize];
        let promoted = LevelBlock::promote(
            CellId(3),
            1.0,
            1,
            &[
                PromotionSource {
                    tokens: &a,
                    selection: &sel_a,
                },
                PromotionSource {
                    tokens: &b,
                    selection: &sel_b,
                },
            ],
            &kernel,
            2.0,
            10.0,
        );
        assert_eq!(promoted.point_count(), 3);
        assert_eq!(promoted.cell(), CellId(3));
        let tokens = promoted.tokens().unwrap();
        assert_eq!(
            tokens.points,
            vec![
                Point::new(2.0, 0.0),
                Point::new(0.0, 0.0),
                Point::new(5.0, 5.0)
            ]
        );
        assert!(tokens.resolved.iter().all(|r| !r));
        let seeds = promoted.working().unwrap().seeds();
        assert_eq!(seeds[0], kernel.carry_forward(&a.tensors[2], 2.0, 10.0));
    }

    #[test]
    fn selection_rejects_out_of_range_indices() {
        let mut block =
            LevelBlock::populate(cell(), 1.0, vec![Point::new(0.0, 0.0)], Tensor::identity());
        block.record_selection(0);
        block.record_selection(4);
        assert_eq!(block.selection(), &[0]);
    }

    #[test]
    fn unload_keeps_metadata() {
        let mut block =
            LevelBlock::populate(cell(), 1.0, vec![Point::new(0.0, 0.0)], Tensor::identity());
        assert!(block.unload().is_some());
        assert!(!block.is_resident());
        assert_eq!(block.point_count(), 1);
        assert_eq!(block.scale(), 1.0);
    }
}
