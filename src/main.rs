use level_refine::prelude::*;
use std::f64::consts::TAU;

const SEED: u64 = 0x5eed;

fn noisy_circle(n: usize, clutter: usize) -> Vec<Point> {
    let mut state = SEED;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    let mut pts = Vec::with_capacity(n + clutter);
    for i in 0..n {
        let theta = i as f64 / n as f64 * TAU;
        let r = 30.0 + (next() - 0.5) * 0.5;
        pts.push(Point::new(50.0 + r * theta.cos(), 50.0 + r * theta.sin()));
    }
    for _ in 0..clutter {
        pts.push(Point::new(next() * 100.0, next() * 100.0));
    }
    pts
}

fn main() {
    // Demo: refine a noisy circle with clutter and print per-scale token counts
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let points = noisy_circle(2_000, 300);
    let bounds = Bounds::new(0.0, 0.0, 100.0, 100.0);
    let prefix = std::env::temp_dir().join("level_refine_demo").join("tokens");

    let result = ScaleDriver::new(points, bounds, DriverParams::default()).and_then(|mut driver| {
        let report = driver.run(&prefix.to_string_lossy(), 4_000, 1)?;
        let mut counts = Vec::with_capacity(report.scales.len());
        for s in &report.scales {
            counts.push((s.scale, driver.get_tokens(s.scale_index, None)?.len()));
        }
        Ok((report, counts))
    });

    match result {
        Ok((report, counts)) => {
            for (scale, n) in counts {
                println!("scale={scale:.3} significant_tokens={n}");
            }
            println!(
                "files={} total_ms={:.3} (under {})",
                report.files_written,
                report.total_ms,
                prefix.display()
            );
        }
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
