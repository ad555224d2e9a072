//! Parameter types configuring the scale driver.
//!
//! Defaults follow the usual tensor-voting setup: the scale doubles between
//! levels, selections keep half a scale apart, and blocks merge into their
//! parent cell on every other transition.
use crate::error::{RefineError, Result};
use crate::grid::MAX_GRID_DEPTH;
use serde::{Deserialize, Serialize};

/// Padding around a scheduled block, in units of the current scale.
pub const PADDING_FACTOR: f64 = 6.0;
/// Influence radius of a voter, in units of the current scale.
pub const INFLUENCE_FACTOR: f64 = 3.0;
/// Tokens at or below this saliency are not reported by extraction.
pub const SIGNIFICANCE_THRESHOLD: f64 = 1.0;

/// When promotion merges sibling blocks into their parent cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoarseningPolicy {
    /// Promoted blocks stay in their source cell.
    Never,
    /// Merge after every odd scale index (never after scale 0).
    #[default]
    Alternate,
    /// Merge after every scale except scale 0.
    Always,
}

impl CoarseningPolicy {
    /// Whether promotion out of `scale_index` targets the parent cell.
    pub fn merges_after(self, scale_index: usize) -> bool {
        match self {
            Self::Never => false,
            Self::Alternate => scale_index % 2 == 1,
            Self::Always => scale_index > 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverParams {
    /// Factor applied to the scale by every `advance_scale` (> 1).
    pub scale_multiplier: f64,
    /// Selection mask radius as a fraction of the scale, in `[0, 1]`.
    pub mask_fraction: f64,
    /// Upper clamp on eigenvalues when carrying tensors to the next scale.
    pub max_saliency_clamp: f64,
    /// Fixed quadtree depth; `None` derives it from the initial scale.
    pub tree_depth: Option<usize>,
    /// Upper bound for the derived depth, at most `MAX_GRID_DEPTH`.
    pub max_tree_depth: usize,
    pub coarsening: CoarseningPolicy,
}

impl Default for DriverParams {
    fn default() -> Self {
        Self {
            scale_multiplier: 2.0,
            mask_fraction: 0.5,
            max_saliency_clamp: 10.0,
            tree_depth: None,
            max_tree_depth: 10,
            coarsening: CoarseningPolicy::Alternate,
        }
    }
}

impl DriverParams {
    pub fn with_scale_multiplier(mut self, scale_multiplier: f64) -> Self {
        self.scale_multiplier = scale_multiplier;
        self
    }

    pub fn with_mask_fraction(mut self, mask_fraction: f64) -> Self {
        self.mask_fraction = mask_fraction;
        self
    }

    pub fn with_tree_depth(mut self, tree_depth: usize) -> Self {
        self.tree_depth = Some(tree_depth);
        self
    }

    pub fn with_coarsening(mut self, coarsening: CoarseningPolicy) -> Self {
        self.coarsening = coarsening;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scale_multiplier.is_finite() && self.scale_multiplier > 1.0) {
            return Err(RefineError::InvalidParameter {
                name: "scale_multiplier",
                message: format!("must be finite and > 1, got {}", self.scale_multiplier),
            });
        }
        if !(0.0..=1.0).contains(&self.mask_fraction) {
            return Err(RefineError::InvalidParameter {
                name: "mask_fraction",
                message: format!("must lie in [0, 1], got {}", self.mask_fraction),
            });
        }
        if !(self.max_saliency_clamp.is_finite() && self.max_saliency_clamp > 0.0) {
            return Err(RefineError::InvalidParameter {
                name: "max_saliency_clamp",
                message: format!("must be finite and > 0, got {}", self.max_saliency_clamp),
            });
        }
        if let Some(depth) = self.tree_depth.filter(|&d| d > MAX_GRID_DEPTH) {
            return Err(RefineError::InvalidParameter {
                name: "tree_depth",
                message: format!("must be at most {MAX_GRID_DEPTH}, got {depth}"),
            });
        }
        if self.tree_depth.is_none() && self.max_tree_depth > MAX_GRID_DEPTH {
            return Err(RefineError::InvalidParameter {
                name: "max_tree_depth",
                message: format!("must be at most {MAX_GRID_DEPTH}, got {}", self.max_tree_depth),
            });
        }
        Ok(())
    }

    /// Quadtree depth for a domain of `extent` at initial scale `scale`:
    /// leaves about one padding wide, clamped to `[1, max_tree_depth]`.
    pub fn derive_tree_depth(&self, extent: f64, scale: f64) -> usize {
        if let Some(depth) = self.tree_depth {
            return depth;
        }
        let ratio = extent / (PADDING_FACTOR * scale);
        let depth = if ratio > 1.0 {
            ratio.log2().ceil() as usize
        } else {
            0
        };
        depth.clamp(1, self.max_tree_depth.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternate_policy_skips_scale_zero() {
        let p = CoarseningPolicy::Alternate;
        let merges: Vec<bool> = (0..5).map(|k| p.merges_after(k)).collect();
        assert_eq!(merges, vec![false, true, false, true, false]);
        assert!(!CoarseningPolicy::Always.merges_after(0));
        assert!(CoarseningPolicy::Always.merges_after(2));
        assert!(!CoarseningPolicy::Never.merges_after(1));
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let p: DriverParams =
            serde_json::from_str(r#"{ "mask_fraction": 0.25, "coarsening": "never" }"#).unwrap();
        assert_eq!(p.mask_fraction, 0.25);
        assert_eq!(p.scale_multiplier, 2.0);
        assert_eq!(p.coarsening, CoarseningPolicy::Never);
    }

    #[test]
    fn invalid_params_are_rejected() {
        assert!(DriverParams::default().validate().is_ok());
        assert!(DriverParams::default()
            .with_scale_multiplier(1.0)
            .validate()
            .is_err());
        assert!(DriverParams::default()
            .with_mask_fraction(1.5)
            .validate()
            .is_err());
    }

    #[test]
    fn oversized_tree_depths_are_rejected() {
        let err = DriverParams::default()
            .with_tree_depth(33)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            RefineError::InvalidParameter {
                name: "tree_depth",
                ..
            }
        ));
        assert!(DriverParams::default()
            .with_tree_depth(MAX_GRID_DEPTH)
            .validate()
            .is_ok());

        let mut p = DriverParams::default();
        p.max_tree_depth = 40;
        assert!(matches!(
            p.validate(),
            Err(RefineError::InvalidParameter {
                name: "max_tree_depth",
                ..
            })
        ));
        // an explicit depth makes the derived bound irrelevant
        assert!(p.with_tree_depth(4).validate().is_ok());
    }

    #[test]
    fn oversized_depth_in_json_is_rejected() {
        let p: DriverParams = serde_json::from_str(r#"{ "tree_depth": 20 }"#).unwrap();
        assert!(p.validate().is_err());
    }

    #[test]
    fn derived_depth_makes_leaves_about_one_padding_wide() {
        let p = DriverParams::default();
        assert_eq!(p.derive_tree_depth(100.0, 1.0), 5);
        assert_eq!(p.derive_tree_depth(1.0, 1.0), 1);
        assert_eq!(p.derive_tree_depth(1e9, 1e-3), 10);
        assert_eq!(p.clone().with_tree_depth(3).derive_tree_depth(100.0, 1.0), 3);
    }
}
