//! Uniform bucket index for fixed-radius queries.
//!
//! Built once per processed neighborhood over the gathered points (bucket edge
//! = query radius), so a radius query inspects at most 3×3 buckets. Also used
//! incrementally by selection to test masks against already-chosen points.
use crate::types::Point;
use std::collections::HashMap;

#[derive(Debug)]
pub struct BinIndex {
    cell: f64,
    buckets: HashMap<(i64, i64), Vec<usize>>,
    points: Vec<Point>,
}

impl BinIndex {
    /// Empty index with bucket edge `radius` (clamped away from zero).
    pub fn new(radius: f64) -> Self {
        Self {
            cell: radius.max(f64::MIN_POSITIVE),
            buckets: HashMap::new(),
            points: Vec::new(),
        }
    }

    pub fn from_points(points: &[Point], radius: f64) -> Self {
        let mut index = Self::new(radius);
        index.points.reserve(points.len());
        for p in points {
            index.insert(*p);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn key(&self, p: &Point) -> (i64, i64) {
        (
            (p.x / self.cell).floor() as i64,
            (p.y / self.cell).floor() as i64,
        )
    }

    /// Inserts `p` and returns its index.
    pub fn insert(&mut self, p: Point) -> usize {
        let idx = self.points.len();
        let key = self.key(&p);
        self.buckets.entry(key).or_default().push(idx);
        self.points.push(p);
        idx
    }

    /// Indices of points strictly closer than `radius` to `p` (radius ≤ bucket edge).
    pub fn within(&self, p: &Point, radius: f64) -> Vec<usize> {
        let mut out = Vec::new();
        self.for_each_within(p, radius, |i| out.push(i));
        out
    }

    /// `true` if some indexed point lies within distance ≤ `radius` of `p`.
    pub fn any_within_inclusive(&self, p: &Point, radius: f64) -> bool {
        let r2 = radius * radius;
        let (kx, ky) = self.key(p);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let key = (kx.saturating_add(dx), ky.saturating_add(dy));
                if let Some(bucket) = self.buckets.get(&key) {
                    if bucket
                        .iter()
                        .any(|&i| (self.points[i] - p).norm_squared() <= r2)
                    {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn for_each_within<F: FnMut(usize)>(&self, p: &Point, radius: f64, mut f: F) {
        let r2 = radius * radius;
        let (kx, ky) = self.key(p);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let key = (kx.saturating_add(dx), ky.saturating_add(dy));
                if let Some(bucket) = self.buckets.get(&key) {
                    for &i in bucket {
                        if (self.points[i] - p).norm_squared() < r2 {
                            f(i);
                        }
                    }
                }
            }
        }
    }
}
