use nalgebra::{Matrix2, Point2};
use serde::{Deserialize, Serialize};

/// 2D point coordinate.
pub type Point = Point2<f64>;

/// Symmetric 2×2 feature tensor (orientation + saliency).
pub type Tensor = Matrix2<f64>;

/// Axis-aligned rectangle `[min_x, max_x] × [min_y, max_y]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest rectangle enclosing all `points`, or `None` for an empty set.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut b = Self::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            b.min_x = b.min_x.min(p.x);
            b.min_y = b.min_y.min(p.y);
            b.max_x = b.max_x.max(p.x);
            b.max_y = b.max_y.max(p.y);
        }
        Some(b)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Largest axis extent.
    pub fn extent(&self) -> f64 {
        self.width().max(self.height())
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn is_valid(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
            && self.max_x >= self.min_x
            && self.max_y >= self.min_y
            && self.extent() > 0.0
    }

    pub fn center(&self) -> Point {
        Point::new(
            0.5 * (self.min_x + self.max_x),
            0.5 * (self.min_y + self.max_y),
        )
    }

    /// Closed containment test.
    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// `true` when `other` lies entirely inside `self`.
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Interval overlap on both axes (touching edges count as overlap).
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Extends the upper x/y edges by `pad`, leaving the lower edges in place.
    pub fn padded_up_right(&self, pad: f64) -> Self {
        Self::new(self.min_x, self.min_y, self.max_x + pad, self.max_y + pad)
    }

    /// Grows every edge by `pad`.
    pub fn inflated(&self, pad: f64) -> Self {
        Self::new(
            self.min_x - pad,
            self.min_y - pad,
            self.max_x + pad,
            self.max_y + pad,
        )
    }

    /// Quadrant `q` in child order: 0 lower-left, 1 lower-right, 2 upper-left, 3 upper-right.
    pub fn quadrant(&self, q: usize) -> Self {
        let c = self.center();
        let (min_x, max_x) = if q & 1 == 0 {
            (self.min_x, c.x)
        } else {
            (c.x, self.max_x)
        };
        let (min_y, max_y) = if q & 2 == 0 {
            (self.min_y, c.y)
        } else {
            (c.y, self.max_y)
        };
        Self::new(min_x, min_y, max_x, max_y)
    }
}

/// A (point, tensor) record: the unit of persistence and query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Token {
    pub point: Point,
    pub tensor: Tensor,
}
