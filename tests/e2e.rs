mod common;

use common::synthetic_points::{circle_distance, noisy_circle, uniform_square};
use level_refine::{Bounds, DriverParams, DriverState, Point, ScaleDriver};
use std::collections::HashSet;

const RADIUS: f64 = 30.0;

fn center() -> Point {
    Point::new(50.0, 50.0)
}

fn domain() -> Bounds {
    Bounds::new(0.0, 0.0, 100.0, 100.0)
}

fn circle_with_clutter() -> Vec<Point> {
    let mut points = noisy_circle(center(), RADIUS, 800, 0.2, 7);
    points.extend(uniform_square(0.0, 100.0, 100, 11));
    points
}

#[test]
fn significant_tokens_concentrate_on_the_curve() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("circle");

    let mut driver =
        ScaleDriver::new(circle_with_clutter(), domain(), DriverParams::default()).unwrap();
    let report = driver.run(prefix.to_str().unwrap(), 2_000, 1).unwrap();
    assert_eq!(driver.state(), DriverState::Terminal);

    let tokens = driver.get_tokens(0, None).unwrap();
    assert!(tokens.len() >= 700, "only {} significant tokens", tokens.len());
    let on_curve = tokens
        .iter()
        .filter(|t| circle_distance(&t.point, center(), RADIUS) < 1.5)
        .count();
    assert!(
        on_curve as f64 >= 0.85 * tokens.len() as f64,
        "{on_curve} of {} tokens on the curve",
        tokens.len()
    );

    // coarser scales keep fewer points
    let per_scale: Vec<usize> = report
        .scales
        .iter()
        .map(|s| s.points_resolved)
        .collect();
    assert!(per_scale.windows(2).all(|w| w[1] <= w[0]), "{per_scale:?}");
}

#[test]
fn run_covers_every_estimated_scale_and_names_files_sequentially() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("seq");

    let mut driver =
        ScaleDriver::new(circle_with_clutter(), domain(), DriverParams::default()).unwrap();
    driver.compute_scale().unwrap();
    let expected_scales = driver.estimate_levels().unwrap();
    let report = driver.run(prefix.to_str().unwrap(), 2_000, 1).unwrap();

    assert_eq!(report.scales.len(), expected_scales);
    assert!(report.scales.last().unwrap().is_final);
    assert!(report.scales[..expected_scales - 1].iter().all(|s| !s.is_final));
    for pair in report.scales.windows(2) {
        assert!((pair[1].scale - 2.0 * pair[0].scale).abs() < 1e-9);
    }

    let files: HashSet<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files.len(), report.files_written);
    for i in 0..report.files_written {
        assert!(files.contains(&format!("seq_{i}.tvl")), "missing seq_{i}.tvl");
    }
}

#[test]
fn finished_run_keeps_only_empty_blocks_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("mem");

    let mut driver =
        ScaleDriver::new(circle_with_clutter(), domain(), DriverParams::default()).unwrap();
    driver.run(prefix.to_str().unwrap(), 500, 0).unwrap();

    let grid = driver.grid().unwrap();
    let mut spilled = 0;
    for k in 0..driver.scale_reports().len() {
        for id in grid.blocks_at_scale(k) {
            let block = grid.block(id);
            if block.point_count() > 0 {
                assert!(!block.is_resident(), "block {} still resident", id.index());
                assert!(block.working().is_none());
                assert!(block.file().is_some());
                spilled += 1;
            }
        }
    }
    assert!(spilled > 0);
}

#[test]
fn bounded_queries_agree_with_filtering_the_full_result() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("query");

    let mut driver =
        ScaleDriver::new(circle_with_clutter(), domain(), DriverParams::default()).unwrap();
    let report = driver.run(prefix.to_str().unwrap(), 2_000, 1).unwrap();

    let window = Bounds::new(10.0, 35.0, 55.0, 90.0);
    for scale in &report.scales {
        let all = driver.get_tokens(scale.scale_index, None).unwrap();
        let inside = driver.get_tokens(scale.scale_index, Some(&window)).unwrap();
        let expected = all.iter().filter(|t| window.contains(&t.point)).count();
        assert_eq!(inside.len(), expected, "scale index {}", scale.scale_index);
    }
}
