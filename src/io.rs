//! I/O helpers for point files and JSON.
//!
//! - `load_points`: read `x y [...]` rows (whitespace or comma separated).
//! - `write_json_file`: pretty-print a serializable value to disk.
//! - `ensure_parent_dir`: shared by JSON output and token files.
use crate::types::Point;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Parse point rows from text. Blank lines and `#` comments are skipped,
/// columns past the second are ignored.
pub fn parse_points(text: &str) -> Result<Vec<Point>, String> {
    let mut points = Vec::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty());
        let mut coord = |name: &str| -> Result<f64, String> {
            let field = fields
                .next()
                .ok_or_else(|| format!("line {}: missing {name} coordinate", lineno + 1))?;
            let v: f64 = field
                .parse()
                .map_err(|e| format!("line {}: bad {name} value {field:?}: {e}", lineno + 1))?;
            if !v.is_finite() {
                return Err(format!("line {}: {name} is not finite", lineno + 1));
            }
            Ok(v)
        };
        let x = coord("x")?;
        let y = coord("y")?;
        points.push(Point::new(x, y));
    }
    Ok(points)
}

/// Load a point file from disk.
pub fn load_points(path: &Path) -> Result<Vec<Point>, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read points {}: {e}", path.display()))?;
    parse_points(&text).map_err(|e| format!("Failed to parse points {}: {e}", path.display()))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)
        .map_err(|e| format!("Failed to create parent of {}: {e}", path.display()))?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
