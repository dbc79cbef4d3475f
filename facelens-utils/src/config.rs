//! Shared configuration types consumed across the FaceLens workspace.
//!
//! These structures provide a common representation for detection, refinement,
//! overlay, server, and telemetry settings that can be serialized to disk and
//! reused by the CLI and server front-ends.

use crate::color::RgbaColor;

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Parameters controlling detection and its postprocessing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    /// Minimum confidence score for a detection to be considered valid.
    pub score_threshold: f32,
    /// Target canvas width in pixels. Images narrower than this are upscaled
    /// before inference; wider images run at their native width.
    pub target_width: u32,
    /// The maximum number of detections to keep per image.
    pub max_faces: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            target_width: 1280,
            max_faces: 100,
        }
    }
}

/// Settings for the annotated overlay output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlaySettings {
    /// Bounding box outline color.
    pub box_color: RgbaColor,
    /// Fill color drawn inside each box; the alpha channel controls opacity.
    pub fill_color: RgbaColor,
    /// Landmark dot color.
    pub landmark_color: RgbaColor,
    /// Optional path to a TTF/OTF font used for text labels.
    /// When absent, boxes and landmarks still render but labels are skipped.
    pub font_path: Option<PathBuf>,
    /// Label text height in pixels.
    pub label_scale: f32,
    /// Whether to draw landmark dots.
    pub draw_landmarks: bool,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            box_color: RgbaColor::opaque(0, 200, 120),
            fill_color: RgbaColor::with_alpha(0, 200, 120, 40),
            landmark_color: RgbaColor::opaque(255, 220, 0),
            font_path: None,
            label_scale: 18.0,
            draw_landmarks: true,
        }
    }
}

impl OverlaySettings {
    /// Clamp values to sensible ranges.
    pub fn sanitize(&mut self) {
        if !self.label_scale.is_finite() || self.label_scale < 6.0 {
            self.label_scale = 18.0;
        }
    }
}

/// Settings for the analysis REST server and its storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address the HTTP server binds to.
    pub bind_addr: String,
    /// Path to the SQLite database file. When absent, analyses are kept in a
    /// process-local in-memory store instead.
    pub database_path: Option<PathBuf>,
    /// Default number of records returned by the recent-analyses listing.
    pub default_recent_limit: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            database_path: None,
            default_recent_limit: 10,
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// Persistent application settings consumed by the CLI and server binaries.
///
/// Aggregates all user-configurable parameters, allowing them to be loaded
/// from and saved to a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Optional override for the face-analysis ONNX model path.
    /// If `None`, a default path is used.
    pub model_path: Option<String>,
    /// Detection and postprocessing parameters.
    pub detection: DetectionSettings,
    /// Overlay rendering parameters.
    pub overlay: OverlaySettings,
    /// REST server and storage parameters.
    pub server: ServerSettings,
    /// Telemetry and diagnostics preferences.
    pub telemetry: TelemetrySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        let mut settings = Self {
            model_path: Some("models/face_analysis.onnx".into()),
            detection: DetectionSettings::default(),
            overlay: OverlaySettings::default(),
            server: ServerSettings::default(),
            telemetry: TelemetrySettings::default(),
        };
        settings.overlay.sanitize();
        settings
    }
}

impl AppSettings {
    /// Load settings from a JSON file.
    ///
    /// If the file does not exist or cannot be parsed, an error is returned.
    /// If the `model_path` is missing from the JSON, it falls back to the default.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;

        if settings.model_path.is_none() {
            settings.model_path = AppSettings::default().model_path;
        }

        settings.overlay.sanitize();

        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON.
    ///
    /// This will overwrite the file if it already exists.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}

/// Returns the default path for persisted application settings (`config/facelens.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/facelens.json"))
        .unwrap_or_else(|_| PathBuf::from("config/facelens.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_settings_round_trip() {
        let file = NamedTempFile::new().expect("tempfile");
        let settings = AppSettings::default();
        settings.save_to_path(file.path()).expect("save");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.detection, settings.detection);
        assert_eq!(loaded.model_path, settings.model_path);
        assert_eq!(loaded.server, settings.server);
        assert_eq!(loaded.telemetry.enabled, settings.telemetry.enabled);
    }

    #[test]
    fn missing_model_path_uses_default() {
        let file = NamedTempFile::new().expect("tempfile");
        let json = r#"{
            "detection": { "score_threshold": 0.8, "target_width": 1600, "max_faces": 25 }
        }"#;
        fs::write(file.path(), json).expect("write custom settings");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.detection.target_width, 1600);
        assert_eq!(loaded.detection.max_faces, 25);
        assert!(loaded.model_path.is_some());
        assert!(loaded.server.database_path.is_none());
    }

    #[test]
    fn telemetry_level_parses_variants() {
        let telemetry = TelemetrySettings {
            level: "TRACE".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Trace);

        let telemetry = TelemetrySettings {
            level: "Warn".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Warn);
    }

    #[test]
    fn overlay_sanitize_restores_label_scale() {
        let mut overlay = OverlaySettings {
            label_scale: -4.0,
            ..OverlaySettings::default()
        };
        overlay.sanitize();
        assert_eq!(overlay.label_scale, 18.0);
    }
}
