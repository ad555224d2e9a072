//! Voting kernel contract consumed by the refinement driver.
//!
//! The driver never inspects how a vote is produced: it only needs a pure
//! `vote` function evaluated for every (voter, votee) pair inside the influence
//! radius, a `carry_forward` transform seeding the next scale from a resolved
//! tensor, and the seed used for raw input points.
//!
//! `StickBallKernel` is the reference collaborator used by the binaries and the
//! tests. Kernels are shared across worker threads when the `parallel`
//! feature is enabled, hence the `Send + Sync` bound.

pub mod stick_ball;

pub use stick_ball::StickBallKernel;

use crate::types::{Point, Tensor};

pub trait VotingKernel: Send + Sync {
    /// Contribution of a voter at `voter_pos` carrying `voter_tensor` to the
    /// votee at `votee_pos`, for neighborhood scale `scale`.
    fn vote(&self, voter_pos: &Point, voter_tensor: &Tensor, votee_pos: &Point, scale: f64)
        -> Tensor;

    /// Seed tensor for the next scale derived from a resolved tensor.
    fn carry_forward(&self, tensor: &Tensor, scale_multiplier: f64, max_saliency_clamp: f64)
        -> Tensor;

    /// Seed tensor for raw (scale 0) input points.
    fn initial_tensor(&self) -> Tensor {
        Tensor::identity()
    }
}
