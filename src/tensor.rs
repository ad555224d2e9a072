//! Eigen analysis of symmetric 2×2 feature tensors.
//!
//! A tensor `T = λ₁·e₁e₁ᵀ + λ₂·e₂e₂ᵀ` (λ₁ ≥ λ₂) splits into a stick part of
//! strength `λ₁ − λ₂` oriented along `e₁` and a ball part of strength `λ₂`.
//! Saliency is the largest eigen-gap `max(λ₁ − λ₂, λ₂)`.
use crate::types::Tensor;
use nalgebra::{SymmetricEigen, Vector2};

/// Saliency reported for points whose tensor has not been computed yet.
pub const UNRESOLVED_SALIENCY: f64 = -1.0;

/// Ordered eigen decomposition of a symmetric 2×2 tensor.
#[derive(Clone, Copy, Debug)]
pub struct TensorEigen {
    /// Largest eigenvalue.
    pub l1: f64,
    /// Smallest eigenvalue.
    pub l2: f64,
    /// Unit eigenvector of `l1` (the stick normal).
    pub e1: Vector2<f64>,
}

impl TensorEigen {
    pub fn new(t: &Tensor) -> Self {
        let sym = symmetrize(t);
        let eig = SymmetricEigen::new(sym);
        let (a, b) = (eig.eigenvalues[0], eig.eigenvalues[1]);
        let (l1, l2, k) = if a >= b { (a, b, 0) } else { (b, a, 1) };
        let e1 = eig.eigenvectors.column(k).into_owned();
        let norm = e1.norm();
        let e1 = if norm > 0.0 {
            e1 / norm
        } else {
            Vector2::new(1.0, 0.0)
        };
        Self { l1, l2, e1 }
    }

    pub fn stick(&self) -> f64 {
        (self.l1 - self.l2).max(0.0)
    }

    pub fn ball(&self) -> f64 {
        self.l2.max(0.0)
    }

    /// Largest eigen-gap.
    pub fn saliency(&self) -> f64 {
        self.stick().max(self.ball())
    }

    /// Rebuilds a tensor from (possibly modified) eigenvalues along the same frame.
    pub fn compose(&self, l1: f64, l2: f64) -> Tensor {
        let e2 = Vector2::new(-self.e1.y, self.e1.x);
        self.e1 * self.e1.transpose() * l1 + e2 * e2.transpose() * l2
    }
}

/// Largest eigen-gap of `t`.
pub fn saliency(t: &Tensor) -> f64 {
    TensorEigen::new(t).saliency()
}

/// Saliency of an optional resolved tensor; unresolved entries rank below everything.
pub fn saliency_or_unresolved(t: &Tensor, resolved: bool) -> f64 {
    if resolved {
        saliency(t)
    } else {
        UNRESOLVED_SALIENCY
    }
}

fn symmetrize(t: &Tensor) -> Tensor {
    let off = 0.5 * (t[(0, 1)] + t[(1, 0)]);
    Tensor::new(t[(0, 0)], off, off, t[(1, 1)])
}

/// Packs the three unique entries `[xx, xy, yy]`.
pub fn pack(t: &Tensor) -> [f64; 3] {
    [t[(0, 0)], 0.5 * (t[(0, 1)] + t[(1, 0)]), t[(1, 1)]]
}

pub fn unpack(v: [f64; 3]) -> Tensor {
    Tensor::new(v[0], v[1], v[1], v[2])
}
