use level_refine::Point;

/// Small deterministic generator (64-bit LCG), uniform in `[0, 1)`.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(6364136223846793005).wrapping_add(1))
    }

    pub fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Points on a circle, radially jittered by up to `noise`.
pub fn noisy_circle(center: Point, radius: f64, count: usize, noise: f64, seed: u64) -> Vec<Point> {
    assert!(count > 0, "count must be positive");
    let mut rng = Lcg::new(seed);
    (0..count)
        .map(|i| {
            let theta = i as f64 / count as f64 * std::f64::consts::TAU;
            let r = radius + rng.range(-noise, noise);
            Point::new(center.x + r * theta.cos(), center.y + r * theta.sin())
        })
        .collect()
}

/// Uniform clutter inside `[lo, hi]²`.
pub fn uniform_square(lo: f64, hi: f64, count: usize, seed: u64) -> Vec<Point> {
    let mut rng = Lcg::new(seed);
    (0..count)
        .map(|_| Point::new(rng.range(lo, hi), rng.range(lo, hi)))
        .collect()
}

/// Distance from `p` to the circle through `center` with `radius`.
pub fn circle_distance(p: &Point, center: Point, radius: f64) -> f64 {
    ((p - center).norm() - radius).abs()
}
