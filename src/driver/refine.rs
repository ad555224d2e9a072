//! Processing of one scheduled block.
//!
//! gather → load → vote → select → promote → persist → free, all before the
//! next block starts. A point is resolved by the first neighborhood whose
//! padded rectangle contains its whole influence disc; sides touching the
//! domain boundary count as covered. With right/up padding of twice the
//! influence radius this resolves every point of the scheduled cell by the end
//! of its own call, so the cell's blocks release their seeds right away.
use super::params::{INFLUENCE_FACTOR, PADDING_FACTOR};
use super::{DriverState, ScaleDriver};
use crate::diagnostics::timing::elapsed_ms;
use crate::diagnostics::{BlockReport, TimingBreakdown};
use crate::error::{RefineError, Result};
use crate::grid::{CellId, SpatialGrid};
use crate::index::BinIndex;
use crate::kernel::VotingKernel;
use crate::level::{BlockId, LevelBlock, PromotionSource};
use crate::select::{select_candidates, Candidate};
use crate::store::{read_block, token_file_path, write_block};
use crate::tensor::UNRESOLVED_SALIENCY;
use crate::types::{Bounds, Point, Tensor};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

impl<K: VotingKernel> ScaleDriver<K> {
    /// Processes the next scheduled block and returns the number of token
    /// files written. Scheduled blocks without points are skipped; `0` means
    /// the current scale is exhausted.
    pub fn refine_next_block(&mut self, prefix: &str) -> Result<usize> {
        match self.state {
            DriverState::LevelInitialized | DriverState::BlockInProgress => {}
            DriverState::ScaleExhausted | DriverState::Terminal => return Ok(0),
            state => {
                return Err(RefineError::InvalidState {
                    op: "refine_next_block",
                    state,
                })
            }
        }
        loop {
            let next = match self.grid.as_ref() {
                Some(grid) => self.cursor.advance(grid),
                None => None,
            };
            let Some(cell) = next else {
                info!(
                    "scale index {} exhausted ({} files so far)",
                    self.scale_index, self.sequence
                );
                self.state = DriverState::ScaleExhausted;
                return Ok(0);
            };
            self.state = DriverState::BlockInProgress;
            let report = self.process_block(cell, prefix)?;
            let files = report.files_written;
            let empty = report.points_gathered == 0;
            if empty {
                debug!(
                    "scheduled cell {} at scale index {} gathered no points",
                    cell.index(),
                    self.scale_index
                );
            }
            if let Some(scale_report) = self.current_report.as_mut() {
                scale_report.push(report);
            }
            if files > 0 {
                return Ok(files);
            }
        }
    }

    fn process_block(&mut self, cell: CellId, prefix: &str) -> Result<BlockReport> {
        let start = Instant::now();
        let scale = self.require_scale()?;
        let is_final = self.is_final_scale();
        let k = self.scale_index;
        let domain = self.bounds;
        let Self {
            grid,
            kernel,
            params,
            ledger,
            sequence,
            ..
        } = self;
        let grid = grid.as_mut().ok_or(RefineError::ScaleNotSet)?;

        let mut timings = TimingBreakdown::default();
        let mut report = BlockReport {
            scale_index: k,
            cell: cell.index(),
            ..Default::default()
        };

        // gather
        let rect = grid.cell(cell).bounds;
        let padded = rect.padded_up_right(PADDING_FACTOR * scale);
        let blocks = grid.gather_neighborhood(cell, k, &padded);
        let owned: Vec<bool> = blocks
            .iter()
            .map(|&b| grid.is_within(grid.block(b).cell(), cell))
            .collect();
        for &b in &blocks {
            load_block(grid, b)?;
        }
        report.blocks_touched = blocks.len();
        let mut lap = timings.lap("gather", start);

        // flatten the neighborhood
        let mut points: Vec<Point> = Vec::new();
        let mut seeds: Vec<Tensor> = Vec::new();
        let mut owners: Vec<(usize, usize)> = Vec::new();
        let mut resolved: Vec<bool> = Vec::new();
        for (slot, &b) in blocks.iter().enumerate() {
            let block = grid.block(b);
            let Some(tokens) = block.tokens() else {
                continue;
            };
            points.extend_from_slice(&tokens.points);
            resolved.extend_from_slice(&tokens.resolved);
            match block.working() {
                Some(w) if w.seeds().len() == tokens.len() => seeds.extend_from_slice(w.seeds()),
                _ => seeds.extend(std::iter::repeat(Tensor::zeros()).take(tokens.len())),
            }
            owners.extend((0..tokens.len()).map(|i| (slot, i)));
        }
        report.points_gathered = points.len();

        // vote
        let influence = INFLUENCE_FACTOR * scale;
        let index = BinIndex::from_points(&points, influence);
        let kernel = &*kernel;
        let todo: Vec<usize> = (0..points.len())
            .filter(|&i| !resolved[i] && disc_covered(&points[i], influence, &padded, &domain))
            .collect();
        let accumulate = |i: usize| -> Tensor {
            let mut t = Tensor::zeros();
            index.for_each_within(&points[i], influence, |j| {
                if j != i {
                    t += kernel.vote(&points[j], &seeds[j], &points[i], scale);
                }
            });
            t
        };
        #[cfg(feature = "parallel")]
        let computed: Vec<Tensor> = todo.par_iter().map(|&i| accumulate(i)).collect();
        #[cfg(not(feature = "parallel"))]
        let computed: Vec<Tensor> = todo.iter().map(|&i| accumulate(i)).collect();
        for (&i, tensor) in todo.iter().zip(computed) {
            let (slot, local) = owners[i];
            if let Some(tokens) = grid.block_mut(blocks[slot]).tokens_mut() {
                tokens.tensors[local] = tensor;
                tokens.resolved[local] = true;
            }
        }
        report.points_resolved = todo.len();
        lap = timings.lap("vote", lap);

        // owned blocks are finished voting at this scale
        for (slot, &b) in blocks.iter().enumerate() {
            if !owned[slot] {
                continue;
            }
            let block = grid.block_mut(b);
            if !block.is_fully_resolved() && block.point_count() > 0 {
                let unresolved = block
                    .tokens()
                    .map(|t| t.len() - t.resolved_count())
                    .unwrap_or(0);
                warn!(
                    "block {} at scale index {k} leaves {unresolved} points unresolved",
                    b.index()
                );
            }
            block.release_working();
        }

        // select + promote
        let mut promoted: Vec<BlockId> = Vec::new();
        if !is_final {
            let radius = scale * params.mask_fraction;
            let eligible: Vec<usize> = (0..points.len())
                .filter(|&i| owned[owners[i].0])
                .collect();
            let candidates: Vec<Candidate> = eligible
                .iter()
                .map(|&i| {
                    let (slot, local) = owners[i];
                    let saliency = grid
                        .block(blocks[slot])
                        .tokens()
                        .map(|t| t.saliency(local))
                        .unwrap_or(UNRESOLVED_SALIENCY);
                    Candidate {
                        point: points[i],
                        saliency,
                    }
                })
                .collect();
            let coords = grid.coords(cell);
            ledger.retire_rows(coords.1, &rect, radius);
            let prior = ledger.masks_near(coords, &rect, radius);
            let chosen: Vec<usize> = select_candidates(&candidates, &prior, radius)
                .into_iter()
                .map(|c| eligible[c])
                .collect();

            let mut per_slot: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for &c in &chosen {
                let (slot, local) = owners[c];
                per_slot.entry(slot).or_default().push(local);
            }
            for (slot, locals) in per_slot {
                let block = grid.block_mut(blocks[slot]);
                for local in locals {
                    block.record_selection(local);
                }
            }
            ledger.record(coords, rect, chosen.iter().map(|&c| points[c]).collect());
            report.points_selected = chosen.len();
            lap = timings.lap("select", lap);

            let merge = params.coarsening.merges_after(k);
            let scheduled_depth = grid.cell(cell).depth;
            let mut targets: BTreeMap<CellId, Vec<BlockId>> = BTreeMap::new();
            for (slot, &b) in blocks.iter().enumerate() {
                if !owned[slot] {
                    continue;
                }
                let source = grid.block(b).cell();
                let source_cell = grid.cell(source);
                let target = match source_cell.parent {
                    Some(parent) if merge && source_cell.depth > scheduled_depth => parent,
                    _ => source,
                };
                targets.entry(target).or_default().push(b);
            }
            let next_scale = scale * params.scale_multiplier;
            for (target, sources) in targets {
                let block = {
                    let inputs: Vec<PromotionSource<'_>> = sources
                        .iter()
                        .filter_map(|&b| {
                            let block = grid.block(b);
                            block.tokens().map(|tokens| PromotionSource {
                                tokens,
                                selection: block.selection(),
                            })
                        })
                        .collect();
                    LevelBlock::promote(
                        target,
                        next_scale,
                        k + 1,
                        &inputs,
                        kernel,
                        params.scale_multiplier,
                        params.max_saliency_clamp,
                    )
                };
                promoted.push(grid.attach_block(block)?);
            }
            report.blocks_promoted = promoted.len();
            lap = timings.lap("promote", lap);
        }

        // persist + free
        let mut files = 0;
        for &b in blocks.iter().chain(promoted.iter()) {
            if persist_block(grid, b, prefix, sequence)? {
                files += 1;
            }
        }
        report.files_written = files;
        timings.lap("persist", lap);
        timings.total_ms = elapsed_ms(start);
        report.timings = timings;

        debug!(
            "cell {} scale index {k}: {} blocks, {} points, {} resolved, {} selected, {} files",
            cell.index(),
            report.blocks_touched,
            report.points_gathered,
            report.points_resolved,
            report.points_selected,
            report.files_written
        );
        Ok(report)
    }
}

/// `true` when the influence disc of `p` lies inside `padded`, treating sides
/// that reach the domain boundary as open.
fn disc_covered(p: &Point, radius: f64, padded: &Bounds, domain: &Bounds) -> bool {
    let left = p.x - radius >= padded.min_x || padded.min_x <= domain.min_x;
    let right = p.x + radius <= padded.max_x || padded.max_x >= domain.max_x;
    let below = p.y - radius >= padded.min_y || padded.min_y <= domain.min_y;
    let above = p.y + radius <= padded.max_y || padded.max_y >= domain.max_y;
    left && right && below && above
}

/// Reads a spilled block back into memory.
fn load_block(grid: &mut SpatialGrid, id: BlockId) -> Result<()> {
    let block = grid.block_mut(id);
    if block.is_resident() {
        return Ok(());
    }
    let Some(path) = block.file().map(|p| p.to_path_buf()) else {
        warn!("block {} is neither resident nor persisted", id.index());
        return Ok(());
    };
    let loaded = read_block(&path)?;
    let mismatch = if loaded.tokens.len() != block.point_count() {
        Some(format!(
            "expected {} points, found {}",
            block.point_count(),
            loaded.tokens.len()
        ))
    } else if loaded.scale_index != block.scale_index() || loaded.scale != block.scale() {
        Some(format!(
            "expected scale index {} (scale {}), found {} (scale {})",
            block.scale_index(),
            block.scale(),
            loaded.scale_index,
            loaded.scale
        ))
    } else if loaded.selection != block.selection() {
        Some(format!(
            "selection of {} points differs from the {} recorded",
            loaded.selection.len(),
            block.selection().len()
        ))
    } else {
        None
    };
    if let Some(message) = mismatch {
        return Err(RefineError::Decode { path, message });
    }
    block.restore(loaded.tokens, loaded.working);
    Ok(())
}

/// Writes a resident block to its token file (allocating one on first write)
/// and frees its arrays. Returns whether a file was written.
fn persist_block(
    grid: &mut SpatialGrid,
    id: BlockId,
    prefix: &str,
    sequence: &mut u64,
) -> Result<bool> {
    let block = grid.block_mut(id);
    if !block.is_resident() || (block.point_count() == 0 && block.file().is_none()) {
        return Ok(false);
    }
    let path = match block.file() {
        Some(path) => path.to_path_buf(),
        None => {
            let path = token_file_path(prefix, *sequence);
            *sequence += 1;
            block.set_file(path.clone());
            path
        }
    };
    write_block(&path, block)?;
    block.unload();
    block.release_working();
    Ok(true)
}
