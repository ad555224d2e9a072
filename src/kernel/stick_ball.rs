//! 2D stick + ball voting fields.
//!
//! A voter tensor is split into its stick part (strength `λ₁ − λ₂`, normal
//! `e₁`) and its ball part (strength `λ₂`).
//!
//! - Stick votes follow the osculating circle through voter and votee: the
//!   votee receives the circle's normal weighted by
//!   `exp(-(s² + c·κ²) / σ²)` with arc length `s` and curvature `κ`. Votes
//!   beyond a 45° aperture from the voter's tangent are dropped.
//! - Ball votes favour the straight connection: `λ₂ · exp(-l²/σ²) · (I − v̂v̂ᵀ)`.
use super::VotingKernel;
use crate::tensor::TensorEigen;
use crate::types::{Point, Tensor};
use nalgebra::Vector2;
use std::f64::consts::FRAC_PI_4;

const DEFAULT_CURVATURE_WEIGHT: f64 = 0.5;

#[derive(Clone, Debug)]
pub struct StickBallKernel {
    /// Curvature penalty `c` expressed in units of σ⁴.
    pub curvature_weight: f64,
}

impl Default for StickBallKernel {
    fn default() -> Self {
        Self {
            curvature_weight: DEFAULT_CURVATURE_WEIGHT,
        }
    }
}

impl StickBallKernel {
    fn stick_vote(&self, normal: &Vector2<f64>, v: &Vector2<f64>, sigma: f64) -> Tensor {
        let len = v.norm();
        let mut tangent = Vector2::new(-normal.y, normal.x);
        if v.dot(&tangent) < 0.0 {
            tangent = -tangent;
        }
        let along = v.dot(&tangent);
        let across = v.dot(normal);
        let theta = across.atan2(along);
        if theta.abs() > FRAC_PI_4 {
            return Tensor::zeros();
        }

        let sin_theta = theta.sin();
        let (arc, curvature) = if sin_theta.abs() < 1e-12 {
            (len, 0.0)
        } else {
            (theta * len / sin_theta, 2.0 * sin_theta / len)
        };
        let sigma2 = sigma * sigma;
        let c = self.curvature_weight * sigma2 * sigma2;
        let decay = (-(arc * arc + c * curvature * curvature) / sigma2).exp();

        let two_theta = 2.0 * theta;
        let n_vote = -tangent * two_theta.sin() + normal * two_theta.cos();
        n_vote * n_vote.transpose() * decay
    }

    fn ball_vote(v: &Vector2<f64>, sigma: f64) -> Tensor {
        let len2 = v.norm_squared();
        let dir = v / len2.sqrt();
        let decay = (-len2 / (sigma * sigma)).exp();
        (Tensor::identity() - dir * dir.transpose()) * decay
    }
}

impl VotingKernel for StickBallKernel {
    fn vote(
        &self,
        voter_pos: &Point,
        voter_tensor: &Tensor,
        votee_pos: &Point,
        scale: f64,
    ) -> Tensor {
        let v = votee_pos - voter_pos;
        if v.norm_squared() <= f64::EPSILON || scale <= 0.0 {
            return Tensor::zeros();
        }
        let eig = TensorEigen::new(voter_tensor);
        let mut out = Tensor::zeros();
        let stick = eig.stick();
        if stick > 0.0 {
            out += self.stick_vote(&eig.e1, &v, scale) * stick;
        }
        let ball = eig.ball();
        if ball > 0.0 {
            out += Self::ball_vote(&v, scale) * ball;
        }
        out
    }

    fn carry_forward(
        &self,
        tensor: &Tensor,
        scale_multiplier: f64,
        max_saliency_clamp: f64,
    ) -> Tensor {
        let clamp = max_saliency_clamp.max(f64::EPSILON);
        let eig = TensorEigen::new(tensor);
        let l1 = eig.l1.clamp(0.0, clamp);
        let l2 = eig.l2.clamp(0.0, clamp);
        eig.compose(l1, l2) * (scale_multiplier / clamp)
    }
}
