//! Saliency-ranked, spatially masked selection (non-maximum suppression).
//!
//! Candidates are the points of the blocks owned by the scheduled cell, visited
//! in decreasing saliency. A candidate survives when no earlier survivor and no
//! selection made by an already-processed cell lies within
//! `scale × mask_fraction`; every survivor then masks its own surroundings.
//! Survivors are pairwise farther apart than the mask radius.
//!
//! Unresolved points (saliency −1) and degenerate tensors (saliency 0) are
//! never selectable. A NaN saliency ranks as unresolved.
use crate::index::BinIndex;
use crate::tensor::UNRESOLVED_SALIENCY;
use crate::types::{Bounds, Point};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug)]
pub struct Candidate {
    pub point: Point,
    pub saliency: f64,
}

fn rank_key(saliency: f64) -> f64 {
    if saliency.is_nan() {
        UNRESOLVED_SALIENCY
    } else {
        saliency
    }
}

/// Indices into `candidates` of the survivors, in selection order.
pub fn select_candidates(candidates: &[Candidate], prior: &[Point], radius: f64) -> Vec<usize> {
    let mut ranking: Vec<usize> = (0..candidates.len()).collect();
    ranking.sort_by(|&a, &b| {
        rank_key(candidates[b].saliency)
            .total_cmp(&rank_key(candidates[a].saliency))
            .then(a.cmp(&b))
    });

    let mut mask = BinIndex::new(radius);
    for p in prior {
        mask.insert(*p);
    }

    let mut chosen = Vec::new();
    for idx in ranking {
        let cand = &candidates[idx];
        if rank_key(cand.saliency) <= 0.0 {
            break;
        }
        if mask.any_within_inclusive(&cand.point, radius) {
            continue;
        }
        mask.insert(cand.point);
        chosen.push(idx);
    }
    chosen
}

/// Selections made at the current scale, keyed by the `(row, column)` of the
/// scheduled cell that produced them.
///
/// Cells are processed row by row, bottom to top, so a later cell can only be
/// masked by rows at most one mask radius below it. [`retire_rows`] drops
/// everything older.
///
/// [`retire_rows`]: SelectionLedger::retire_rows
#[derive(Debug, Default)]
pub struct SelectionLedger {
    entries: BTreeMap<(usize, usize), (Bounds, Vec<Point>)>,
}

impl SelectionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the selections of the cell at column `i`, row `j`.
    pub fn record(&mut self, (i, j): (usize, usize), rect: Bounds, points: Vec<Point>) {
        if !points.is_empty() {
            self.entries.insert((j, i), (rect, points));
        }
    }

    /// Prior selections within `radius` of the cell at `(i, j)` spanning `rect`.
    pub fn masks_near(&self, (i, j): (usize, usize), rect: &Bounds, radius: f64) -> Vec<Point> {
        let (reach_i, reach_j) = reach(rect, radius);
        let area = rect.inflated(radius);
        let mut out = Vec::new();
        for row in j.saturating_sub(reach_j)..=j {
            let lo = (row, i.saturating_sub(reach_i));
            let hi = (row, i.saturating_add(reach_i));
            for (cell_rect, pts) in self.entries.range(lo..=hi).map(|(_, e)| e) {
                if cell_rect.intersects(&area) {
                    out.extend(pts.iter().filter(|p| area.contains(p)).copied());
                }
            }
        }
        out
    }

    /// Forgets rows that can no longer mask a cell in row `j` or above.
    pub fn retire_rows(&mut self, j: usize, rect: &Bounds, radius: f64) {
        let (_, reach_j) = reach(rect, radius);
        let keep_from = (j.saturating_sub(reach_j), 0);
        self.entries = self.entries.split_off(&keep_from);
    }

    /// Number of cells with recorded selections.
    pub fn cell_count(&self) -> usize {
        self.entries.len()
    }

    pub fn selected_count(&self) -> usize {
        self.entries.values().map(|(_, pts)| pts.len()).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Cells per axis a mask radius can cross, at least one.
fn reach(rect: &Bounds, radius: f64) -> (usize, usize) {
    let cells = |extent: f64| -> usize {
        if extent > 0.0 {
            ((radius / extent).ceil() as usize).max(1)
        } else {
            usize::MAX
        }
    };
    (cells(rect.width()), cells(rect.height()))
}
