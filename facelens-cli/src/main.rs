use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use walkdir::WalkDir;

use facelens_core::{FaceAnalyzer, ImageAnalysis, InputSize, OnnxFaceModel, render_overlay};
use facelens_store::{AnalysisStore, NewAnalysis, open_store};
use facelens_utils::{config::AppSettings, image_utils::load_image, init_logging, normalize_path};

mod export;

/// Run face analysis over images or directories.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AnalyzeArgs {
    /// Path to an image file or a directory containing images.
    #[arg(short, long)]
    input: PathBuf,

    /// Path to the face-analysis ONNX model (overrides settings).
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Optional settings JSON (defaults to built-in parameters).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override detection score threshold.
    #[arg(long)]
    score_threshold: Option<f32>,

    /// Override detection canvas target width (pixels).
    #[arg(long)]
    target_width: Option<u32>,

    /// Override the maximum number of faces kept per image.
    #[arg(long)]
    max_faces: Option<usize>,

    /// Write analyses to a JSON file instead of stdout.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Directory to write annotated overlay images.
    #[arg(long)]
    annotate: Option<PathBuf>,

    /// Directory to write one CSV file of faces per image.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Persist each analysis through the configured store.
    #[arg(long)]
    persist: bool,
}

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = AnalyzeArgs::parse();

    let input_path = normalize_path(&args.input)?;
    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);

    facelens_utils::configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    let model_path = resolve_model_path(&args, &settings)?;
    let annotate_dir = prepare_output_dir(args.annotate.as_ref())?;
    let csv_dir = prepare_output_dir(args.csv.as_ref())?;

    info!("Loading analysis model from {}", model_path.display());
    let model = OnnxFaceModel::load(
        &model_path,
        InputSize::default(),
        (&settings.detection).into(),
    )?;
    let analyzer = FaceAnalyzer::new(Box::new(model), settings.detection.clone());

    let store = if args.persist {
        Some(open_store(&settings.server).context("failed to open analysis store")?)
    } else {
        None
    };

    let images = collect_images(&input_path)?;
    if images.is_empty() {
        anyhow::bail!(
            "no images found at {} (supported extensions: jpg, jpeg, png, bmp, webp)",
            input_path.display()
        );
    }

    info!("Analyzing {} image(s)...", images.len());
    let mut results = Vec::with_capacity(images.len());
    for image_path in images {
        match analyze_one(&analyzer, &image_path) {
            Ok((image, analysis)) => {
                info!(
                    "{} -> {} face(s), avg confidence {}%",
                    image_path.display(),
                    analysis.stats.total_faces,
                    analysis.stats.average_confidence
                );

                if let Some(dir) = annotate_dir.as_ref() {
                    if let Err(err) =
                        save_overlay(&image, &analysis, &image_path, dir, &settings)
                    {
                        warn!("Failed to annotate {}: {err}", image_path.display());
                    }
                }

                if let Some(dir) = csv_dir.as_ref() {
                    let csv_path = dir.join(csv_file_name(&image_path));
                    if let Err(err) = export::write_csv(&csv_path, &analysis) {
                        warn!("Failed to write CSV for {}: {err}", image_path.display());
                    }
                }

                if let Some(store) = store.as_deref() {
                    if let Err(err) = persist_analysis(store, &analysis) {
                        warn!("Failed to persist {}: {err}", image_path.display());
                    }
                }

                results.push(analysis);
            }
            Err(err) => {
                warn!("Failed to process {}: {err}", image_path.display());
            }
        }
    }

    if results.is_empty() {
        anyhow::bail!("all analyses failed; cannot produce output");
    }

    if let Some(json_path) = args.json.as_ref() {
        export::write_json_report(json_path, &results)?;
        info!("Wrote analyses to {}", json_path.display());
    } else {
        let json =
            serde_json::to_string_pretty(&results).context("failed to serialize analyses")?;
        println!("{json}");
    }

    Ok(())
}

fn analyze_one(
    analyzer: &FaceAnalyzer,
    image_path: &Path,
) -> Result<(image::DynamicImage, ImageAnalysis)> {
    let image = load_image(image_path)?;
    let file_name = image_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image")
        .to_string();
    let analysis = analyzer.analyze(&image, &file_name)?;
    Ok((image, analysis))
}

fn save_overlay(
    image: &image::DynamicImage,
    analysis: &ImageAnalysis,
    image_path: &Path,
    output_dir: &Path,
    settings: &AppSettings,
) -> Result<PathBuf> {
    let overlay = render_overlay(image, &analysis.faces, &settings.overlay)?;

    let file_name = image_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("frame");
    let output_path = output_dir.join(format!("{file_name}.png"));

    overlay
        .save(&output_path)
        .with_context(|| format!("failed to save annotated image {}", output_path.display()))?;
    info!("Annotated image saved to {}", output_path.display());
    Ok(output_path)
}

fn persist_analysis(store: &dyn AnalysisStore, analysis: &ImageAnalysis) -> Result<()> {
    let record = store.create_analysis(NewAnalysis {
        image_file_name: analysis.image_file_name.clone(),
        width: analysis.width,
        height: analysis.height,
        faces: analysis.faces.clone(),
        processing_time: Some(analysis.stats.processing_time.clone()),
    })?;
    debug!("persisted analysis {}", record.id);
    Ok(())
}

fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        AppSettings::load_from_path(&resolved)
    } else {
        Ok(AppSettings::default())
    }
}

fn apply_cli_overrides(settings: &mut AppSettings, args: &AnalyzeArgs) {
    if let Some(score) = args.score_threshold {
        settings.detection.score_threshold = score;
    }
    if let Some(width) = args.target_width {
        settings.detection.target_width = width;
    }
    if let Some(max_faces) = args.max_faces {
        settings.detection.max_faces = max_faces;
    }
}

fn resolve_model_path(args: &AnalyzeArgs, settings: &AppSettings) -> Result<PathBuf> {
    if let Some(path) = args.model.as_ref() {
        return normalize_path(path);
    }
    let configured = settings
        .model_path
        .as_ref()
        .context("no model path configured; pass --model or set model_path in settings")?;
    normalize_path(configured)
}

fn prepare_output_dir(dir: Option<&PathBuf>) -> Result<Option<PathBuf>> {
    let Some(dir) = dir else {
        return Ok(None);
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    Ok(Some(normalize_path(dir)?))
}

fn csv_file_name(image_path: &Path) -> String {
    let stem = image_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("faces");
    format!("{stem}.csv")
}

fn collect_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        anyhow::bail!(
            "input path is neither file nor directory: {}",
            path.display()
        );
    }

    let exts = ["jpg", "jpeg", "png", "bmp", "webp"];
    let mut images = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        if let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) {
            let ext_lower = ext.to_ascii_lowercase();
            if exts.contains(&ext_lower.as_str()) {
                images.push(entry.path().to_path_buf());
            } else {
                debug!("Skipping non-image file {}", entry.path().display());
            }
        }
    }
    images.sort();
    Ok(images)
}
