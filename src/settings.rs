use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::commit::{CommitStyle, DEFAULT_FONT_SIZE, TextColor};
use crate::geometry::{DEFAULT_RASTER_SCALE, RasterScale};
use crate::overlay::{
    AnnotationDefaults, DEFAULT_ANNOTATION_HEIGHT, DEFAULT_ANNOTATION_WIDTH, DEFAULT_PLACEHOLDER,
};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pdfstamp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Rasterization multiplier, also used to map annotations back
    #[serde(default = "default_raster_scale")]
    pub raster_scale: f32,

    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// `#RRGGBB`
    #[serde(default = "default_text_color")]
    pub text_color: String,

    #[serde(default = "default_placeholder")]
    pub placeholder_text: String,

    #[serde(default = "default_annotation_width")]
    pub annotation_width: f32,

    #[serde(default = "default_annotation_height")]
    pub annotation_height: f32,

    #[serde(default = "default_export_file_name")]
    pub export_file_name: String,

    /// How long the headless front end waits for a page render
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_raster_scale() -> f32 {
    DEFAULT_RASTER_SCALE
}

fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE
}

fn default_text_color() -> String {
    "#000000".to_string()
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

fn default_annotation_width() -> f32 {
    DEFAULT_ANNOTATION_WIDTH
}

fn default_annotation_height() -> f32 {
    DEFAULT_ANNOTATION_HEIGHT
}

fn default_export_file_name() -> String {
    "edited.pdf".to_string()
}

fn default_render_timeout_ms() -> u64 {
    10_000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            raster_scale: default_raster_scale(),
            font_size: default_font_size(),
            text_color: default_text_color(),
            placeholder_text: default_placeholder(),
            annotation_width: default_annotation_width(),
            annotation_height: default_annotation_height(),
            export_file_name: default_export_file_name(),
            render_timeout_ms: default_render_timeout_ms(),
        }
    }
}

impl Settings {
    /// Configured scale, or the default if the file holds a bad value
    pub fn raster_scale(&self) -> RasterScale {
        RasterScale::new(self.raster_scale).unwrap_or_else(|e| {
            warn!("{e}, using {DEFAULT_RASTER_SCALE}");
            RasterScale::default()
        })
    }

    pub fn commit_style(&self) -> CommitStyle {
        let color = TextColor::from_hex(&self.text_color).unwrap_or_else(|| {
            warn!("Invalid text_color {:?}, using black", self.text_color);
            TextColor::BLACK
        });
        let font_size = if self.font_size.is_finite() && self.font_size > 0.0 {
            self.font_size
        } else {
            warn!("Invalid font_size {}, using {DEFAULT_FONT_SIZE}", self.font_size);
            DEFAULT_FONT_SIZE
        };
        CommitStyle { font_size, color }
    }

    pub fn annotation_defaults(&self) -> AnnotationDefaults {
        let positive = |value: f32, fallback: f32| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };
        AnnotationDefaults {
            placeholder: self.placeholder_text.clone(),
            width: positive(self.annotation_width, DEFAULT_ANNOTATION_WIDTH),
            height: positive(self.annotation_height, DEFAULT_ANNOTATION_HEIGHT),
        }
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load the user's config, creating it with defaults on first run
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    load_settings_from_path(&path);
}

/// Load settings from an explicit path, creating the file if it is missing
pub fn load_settings_from_path(path: &Path) {
    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, path);
        }
        return;
    }

    match read_settings_file(path) {
        Ok((settings, migrated)) => {
            if migrated {
                save_settings_to_file(&settings, path);
            }
            if let Ok(mut global) = SETTINGS.write() {
                *global = settings;
            }
        }
        Err(e) => error!("{e:#}"),
    }
}

/// Read and migrate a settings file. The flag is set when a migration ran.
pub fn read_settings_file(path: &Path) -> Result<(Settings, bool)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {path:?}"))?;
    let mut settings = serde_yaml::from_str::<Settings>(&content)
        .with_context(|| format!("Failed to parse settings file {path:?}"))?;
    debug!("Loaded settings from {path:?}");

    let migrated = settings.version < CURRENT_VERSION;
    if migrated {
        migrate_settings(&mut settings);
    }
    Ok((settings, migrated))
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here, keyed on settings.version

    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    match fs::write(path, generate_settings_yaml(settings)) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(SETTINGS_HEADER);
    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!("raster_scale: {}\n", settings.raster_scale));
    content.push_str(&format!("font_size: {}\n", settings.font_size));
    content.push_str(&format!("text_color: \"{}\"\n", settings.text_color));
    content.push_str(&format!(
        "placeholder_text: \"{}\"\n",
        settings.placeholder_text.replace('\\', "\\\\").replace('"', "\\\"")
    ));
    content.push_str(&format!("annotation_width: {}\n", settings.annotation_width));
    content.push_str(&format!("annotation_height: {}\n", settings.annotation_height));
    content.push_str(&format!(
        "export_file_name: \"{}\"\n",
        settings.export_file_name.replace('\\', "\\\\").replace('"', "\\\"")
    ));
    content.push_str(&format!("render_timeout_ms: {}\n", settings.render_timeout_ms));

    content
}

const SETTINGS_HEADER: &str = r##"# ============================================================================
# pdfstamp settings
# ============================================================================
# raster_scale       page pixels per PDF unit when rendering
# font_size          size of committed text, in PDF units
# text_color         "#RRGGBB"
# annotation_width   default box size, in screen pixels
# annotation_height
# export_file_name   default name for `download`

"##;

// Public API for accessing settings

/// Snapshot of the loaded settings
pub fn current() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let settings: Settings = serde_yaml::from_str("font_size: 12\n").unwrap();
        assert_eq!(settings.font_size, 12.0);
        assert_eq!(settings.raster_scale, DEFAULT_RASTER_SCALE);
        assert_eq!(settings.export_file_name, "edited.pdf");
        assert_eq!(settings.version, CURRENT_VERSION);
    }

    #[test]
    fn generated_yaml_round_trips() {
        let settings = Settings {
            placeholder_text: "Say \"hi\"".to_string(),
            raster_scale: 2.0,
            ..Settings::default()
        };
        let parsed: Settings = serde_yaml::from_str(&generate_settings_yaml(&settings)).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn invalid_values_fall_back() {
        let settings = Settings {
            raster_scale: -1.0,
            text_color: "blue".to_string(),
            font_size: 0.0,
            annotation_width: f32::NAN,
            ..Settings::default()
        };
        assert_eq!(settings.raster_scale().factor(), DEFAULT_RASTER_SCALE);
        assert_eq!(settings.commit_style(), CommitStyle::default());
        assert_eq!(settings.annotation_defaults().width, DEFAULT_ANNOTATION_WIDTH);
    }

    #[test]
    fn old_files_are_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "version: 0\nraster_scale: 2\n").unwrap();

        let (settings, migrated) = read_settings_file(&path).unwrap();
        assert!(migrated);
        assert_eq!(settings.version, CURRENT_VERSION);
        assert_eq!(settings.raster_scale, 2.0);
    }

    #[test]
    fn unreadable_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "font_size: [not, a, number]\n").unwrap();
        assert!(read_settings_file(&path).is_err());
    }
}
