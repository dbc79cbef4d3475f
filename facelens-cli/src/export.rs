//! JSON and CSV export of analysis results.

use std::{fs, path::Path};

use anyhow::{Context, Result};

use facelens_core::ImageAnalysis;

/// Column order of the per-face CSV export.
pub const CSV_HEADER: [&str; 9] = [
    "Face ID",
    "Age",
    "Age Confidence",
    "Gender",
    "Gender Confidence",
    "X",
    "Y",
    "Width",
    "Height",
];

/// Write all analyses as a pretty-printed JSON report.
pub fn write_json_report<P: AsRef<Path>>(path: P, analyses: &[ImageAnalysis]) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, analyses)
        .with_context(|| format!("failed to write analysis JSON to {}", path.display()))?;
    Ok(())
}

/// Write one analysis as CSV, one row per face, coordinates in original
/// pixel space.
pub fn write_csv<P: AsRef<Path>>(path: P, analysis: &ImageAnalysis) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(CSV_HEADER)?;

    for face in &analysis.faces {
        writer.write_record([
            face.id.as_str(),
            &face.age.to_string(),
            &face.age_confidence.to_string(),
            &face.gender.to_string(),
            &face.gender_confidence.to_string(),
            &face.bbox.x.to_string(),
            &face.bbox.y.to_string(),
            &face.bbox.width.to_string(),
            &face.bbox.height.to_string(),
        ])?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush CSV to {}", path.display()))?;
    Ok(())
}
