//! Configuration loading for the speed reader.
//!
//! All user-tunable settings are centralized here and loaded from
//! `conf/config.toml` if present. Any missing or invalid entries fall back to
//! sensible defaults so the reader can still launch.

use crate::render::DisplayMode;
use crate::segment::SegmentMode;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// High-level app configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct AppConfig {
    /// Seconds each display unit stays on screen.
    #[serde(default = "default_speed_secs")]
    pub speed_secs: f64,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default)]
    pub reading_mode: SegmentMode,
    #[serde(default)]
    pub display_mode: DisplayMode,
    #[serde(default)]
    pub speech_enabled: bool,
    #[serde(default = "default_speech_rate")]
    pub speech_rate_wpm: u32,
    #[serde(default = "default_tts_model")]
    pub tts_model_path: String,
    #[serde(default = "default_tts_espeak_path")]
    pub tts_espeak_path: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            speed_secs: default_speed_secs(),
            font_size: default_font_size(),
            reading_mode: SegmentMode::default(),
            display_mode: DisplayMode::default(),
            speech_enabled: false,
            speech_rate_wpm: default_speech_rate(),
            tts_model_path: default_tts_model(),
            tts_espeak_path: default_tts_espeak_path(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            AppConfig::default()
        }
    }
}

fn default_speed_secs() -> f64 {
    0.09
}

fn default_font_size() -> u32 {
    42
}

fn default_speech_rate() -> u32 {
    150
}

fn default_tts_model() -> String {
    "/usr/share/piper-voices/en/en_US/ryan/high/en_US-ryan-high.onnx".to_string()
}

fn default_tts_espeak_path() -> String {
    "/usr/share".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
