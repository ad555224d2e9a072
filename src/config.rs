//! JSON runtime configuration for the `level_refine` tool.
//!
//! ```json
//! {
//!   "input": "points.txt",
//!   "bounds": { "minX": 0, "minY": 0, "maxX": 100, "maxY": 100 },
//!   "scale": null,
//!   "budget": 5000,
//!   "min_depth": 1,
//!   "params": { "mask_fraction": 0.5, "coarsening": "alternate" },
//!   "output": { "prefix": "out/tokens", "report_json": "out/report.json" }
//! }
//! ```
use crate::driver::DriverParams;
use crate::types::Bounds;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_BUDGET: usize = 10_000;

fn default_budget() -> usize {
    DEFAULT_BUDGET
}

#[derive(Clone, Debug, Deserialize)]
pub struct OutputConfig {
    /// Token files are written as `<prefix>_<n>.tvl`.
    pub prefix: String,
    #[serde(default)]
    pub report_json: Option<PathBuf>,
    /// Significant tokens of every scale.
    #[serde(default)]
    pub tokens_json: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    pub input: PathBuf,
    /// Domain rectangle; derived from the points when absent.
    #[serde(default)]
    pub bounds: Option<Bounds>,
    /// Initial scale; the mean point spacing when absent.
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default = "default_budget")]
    pub budget: usize,
    #[serde(default)]
    pub min_depth: usize,
    #[serde(default)]
    pub params: DriverParams,
    pub output: OutputConfig,
}

pub fn load_config(path: &Path) -> Result<RuntimeConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    parse_config(&data).map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}

pub fn parse_config(data: &str) -> Result<RuntimeConfig, String> {
    serde_json::from_str(data).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::CoarseningPolicy;

    #[test]
    fn minimal_config_takes_defaults() {
        let cfg = parse_config(r#"{ "input": "p.txt", "output": { "prefix": "out/t" } }"#).unwrap();
        assert_eq!(cfg.budget, DEFAULT_BUDGET);
        assert_eq!(cfg.min_depth, 0);
        assert!(cfg.bounds.is_none());
        assert!(cfg.scale.is_none());
        assert_eq!(cfg.params.coarsening, CoarseningPolicy::Alternate);
        assert!(cfg.output.report_json.is_none());
    }

    #[test]
    fn full_config_round_trips_fields() {
        let cfg = parse_config(
            r#"{
                "input": "p.txt",
                "bounds": { "minX": 0, "minY": 0, "maxX": 10, "maxY": 5 },
                "scale": 0.5,
                "budget": 200,
                "min_depth": 2,
                "params": { "scale_multiplier": 3.0, "coarsening": "never" },
                "output": { "prefix": "t", "report_json": "r.json", "tokens_json": "k.json" }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.bounds, Some(Bounds::new(0.0, 0.0, 10.0, 5.0)));
        assert_eq!(cfg.scale, Some(0.5));
        assert_eq!(cfg.budget, 200);
        assert_eq!(cfg.params.scale_multiplier, 3.0);
        assert_eq!(cfg.params.coarsening, CoarseningPolicy::Never);
        assert_eq!(cfg.output.tokens_json, Some(PathBuf::from("k.json")));
    }

    #[test]
    fn missing_output_is_an_error() {
        assert!(parse_config(r#"{ "input": "p.txt" }"#).is_err());
    }
}
