use level_refine::config::{load_config, RuntimeConfig};
use level_refine::io::{load_points, write_json_file};
use level_refine::{Bounds, RunReport, ScaleDriver, Token};
use serde::Serialize;
use std::env;
use std::path::PathBuf;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScaleTokens {
    scale_index: usize,
    scale: f64,
    tokens: Vec<Token>,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn usage(program: &str) -> String {
    format!("Usage: {program} <config.json>")
}

fn run() -> Result<(), String> {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "level_refine".to_string());
    let config_path = args.next().map(PathBuf::from).ok_or_else(|| usage(&program))?;
    let config = load_config(&config_path)?;

    let points = load_points(&config.input)?;
    let bounds = resolve_bounds(&config, &points)?;
    println!(
        "Loaded {} points from {} (domain [{:.3}, {:.3}] x [{:.3}, {:.3}])",
        points.len(),
        config.input.display(),
        bounds.min_x,
        bounds.max_x,
        bounds.min_y,
        bounds.max_y
    );

    let mut driver =
        ScaleDriver::new(points, bounds, config.params.clone()).map_err(|e| e.to_string())?;
    if let Some(scale) = config.scale {
        driver.set_scale(scale).map_err(|e| e.to_string())?;
    }
    let report = driver
        .run(&config.output.prefix, config.budget, config.min_depth)
        .map_err(|e| e.to_string())?;
    print_summary(&report);

    if let Some(path) = &config.output.report_json {
        write_json_file(path, &report)?;
        println!("Report written to {}", path.display());
    }
    if let Some(path) = &config.output.tokens_json {
        let mut scales = Vec::with_capacity(report.scales.len());
        for s in &report.scales {
            let tokens = driver
                .get_tokens(s.scale_index, None)
                .map_err(|e| e.to_string())?;
            scales.push(ScaleTokens {
                scale_index: s.scale_index,
                scale: s.scale,
                tokens,
            });
        }
        write_json_file(path, &scales)?;
        println!("Tokens written to {}", path.display());
    }
    Ok(())
}

fn resolve_bounds(
    config: &RuntimeConfig,
    points: &[level_refine::Point],
) -> Result<Bounds, String> {
    match config.bounds {
        Some(b) if b.is_valid() => Ok(b),
        Some(b) => Err(format!("Invalid bounds in config: {b:?}")),
        None => Bounds::from_points(points)
            .filter(Bounds::is_valid)
            .ok_or_else(|| "Cannot derive bounds: input has no spread".to_string()),
    }
}

fn print_summary(report: &RunReport) {
    println!(
        "Refined {} points over {} scales (tree depth {}, initial scale {:.4})",
        report.input_points,
        report.scales.len(),
        report.tree_depth,
        report.initial_scale
    );
    for s in &report.scales {
        let (blocks, depth) = s
            .plan
            .map(|p| (p.blocks, p.depth))
            .unwrap_or((0, 0));
        println!(
            "  k={} scale={:.4} blocks={} depth={} resolved={} selected={} files={} empty={} ms={:.2}{}",
            s.scale_index,
            s.scale,
            blocks,
            depth,
            s.points_resolved,
            s.points_selected,
            s.files_written,
            s.empty_blocks,
            s.elapsed_ms,
            if s.is_final { " (final)" } else { "" }
        );
    }
    println!(
        "{} token files, total {:.2} ms",
        report.files_written, report.total_ms
    );
}
