use super::timing::TimingBreakdown;
use crate::driver::LevelPlan;
use serde::Serialize;

/// Outcome of one scheduled block.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReport {
    pub scale_index: usize,
    /// Arena index of the scheduled cell.
    pub cell: usize,
    pub blocks_touched: usize,
    pub points_gathered: usize,
    pub points_resolved: usize,
    pub points_selected: usize,
    pub blocks_promoted: usize,
    pub files_written: usize,
    pub timings: TimingBreakdown,
}

/// Aggregate of every block processed at one scale.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleReport {
    pub scale_index: usize,
    pub scale: f64,
    pub is_final: bool,
    pub plan: Option<LevelPlan>,
    pub points_resolved: usize,
    pub points_selected: usize,
    pub files_written: usize,
    pub empty_blocks: usize,
    pub elapsed_ms: f64,
    pub blocks: Vec<BlockReport>,
}

impl ScaleReport {
    pub fn new(scale_index: usize, scale: f64, is_final: bool, plan: Option<LevelPlan>) -> Self {
        Self {
            scale_index,
            scale,
            is_final,
            plan,
            points_resolved: 0,
            points_selected: 0,
            files_written: 0,
            empty_blocks: 0,
            elapsed_ms: 0.0,
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: BlockReport) {
        self.points_resolved += block.points_resolved;
        self.points_selected += block.points_selected;
        self.files_written += block.files_written;
        if block.points_gathered == 0 {
            self.empty_blocks += 1;
        }
        self.elapsed_ms += block.timings.total_ms;
        self.blocks.push(block);
    }
}

/// Trace of a complete run from scale 0 to the terminal scale.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub input_points: usize,
    pub tree_depth: usize,
    pub initial_scale: f64,
    pub scales: Vec<ScaleReport>,
    pub files_written: usize,
    pub total_ms: f64,
}
