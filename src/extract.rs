//! Range queries over the tokens of one scale.
use crate::driver::SIGNIFICANCE_THRESHOLD;
use crate::error::Result;
use crate::grid::SpatialGrid;
use crate::level::BlockTokens;
use crate::store::read_block;
use crate::types::{Bounds, Token};
use log::{debug, warn};
use std::borrow::Cow;

/// Significant tokens (saliency above [`SIGNIFICANCE_THRESHOLD`]) at
/// `scale_index`, optionally limited to `bounds`.
///
/// Non-resident blocks are read from their token file for the duration of the
/// call only; the grid is left untouched.
pub fn collect_tokens(
    grid: &SpatialGrid,
    scale_index: usize,
    bounds: Option<&Bounds>,
) -> Result<Vec<Token>> {
    let root = grid.root();
    let blocks = match bounds {
        Some(b) => grid.gather_levels_within_bounds(root, scale_index, b),
        None => grid.gather_levels(root, scale_index),
    };

    let mut out = Vec::new();
    let mut loaded = 0;
    for id in blocks {
        let block = grid.block(id);
        if block.point_count() == 0 {
            continue;
        }
        let tokens: Cow<'_, BlockTokens> = match (block.tokens(), block.file()) {
            (Some(tokens), _) => Cow::Borrowed(tokens),
            (None, Some(path)) => {
                loaded += 1;
                Cow::Owned(read_block(path)?.tokens)
            }
            (None, None) => {
                warn!("block {} has no resident tokens and no file", id.index());
                continue;
            }
        };
        let partial = bounds.filter(|b| !b.contains_bounds(&grid.cell(block.cell()).bounds));
        for i in 0..tokens.len() {
            if !tokens.resolved[i] || tokens.saliency(i) <= SIGNIFICANCE_THRESHOLD {
                continue;
            }
            let point = tokens.points[i];
            if let Some(b) = partial {
                if !b.contains(&point) {
                    continue;
                }
            }
            out.push(Token {
                point,
                tensor: tokens.tensors[i],
            });
        }
    }
    debug!(
        "extracted {} tokens at scale index {} ({} blocks read from disk)",
        out.len(),
        scale_index,
        loaded
    );
    Ok(out)
}
