//! Sub-configuration structs with editing and export defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where working copies and artifacts are written
    pub work_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("~/.tilepress"),
        }
    }
}

/// Editing surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Side of the square crop window, in display units
    pub window_size: f64,

    /// Viewport width in display units
    pub viewport_width: f64,

    /// Viewport height in display units
    pub viewport_height: f64,

    /// Upper zoom bound (lower bound is always window coverage)
    pub max_scale: f64,

    /// Opacity of the dimmed full-photo backdrop layer
    pub backdrop_opacity: f64,

    /// Debounce window for persisting in-progress UI state, in milliseconds
    pub ui_debounce_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            window_size: 300.0,
            viewport_width: 400.0,
            viewport_height: 400.0,
            max_scale: 3.0,
            backdrop_opacity: 0.45,
            ui_debounce_ms: 400,
        }
    }
}

/// Working copy generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingCopyConfig {
    /// Longest edge of the interactive working copy, in pixels
    pub max_edge: u32,

    /// JPEG quality for working copies
    pub quality: u8,
}

impl Default for WorkingCopyConfig {
    fn default() -> Self {
        Self {
            max_edge: 1000,
            quality: 85,
        }
    }
}

/// Preview and print artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Longest edge of the shareable preview, in pixels
    pub preview_edge: u32,

    /// JPEG quality for previews
    pub preview_quality: u8,

    /// Exact square side of the print master, in pixels
    pub print_size: u32,

    /// JPEG quality for print masters
    pub print_quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            preview_edge: 512,
            preview_quality: 80,
            print_size: 5000,
            print_quality: 95,
        }
    }
}

/// Filter bake settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Frames to wait before the first snapshot attempt
    pub warmup_frames: u32,

    /// Frames to wait before the single retry
    pub retry_frames: u32,

    /// Duration of one frame tick in milliseconds
    pub frame_ms: u64,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            warmup_frames: 2,
            retry_frames: 1,
            frame_ms: 16,
        }
    }
}

/// Photo-to-photo crossfade settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeConfig {
    /// Total crossfade duration in milliseconds (0 switches instantly)
    pub duration_ms: u64,

    /// Duration of one animation tick in milliseconds
    pub frame_ms: u64,
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            duration_ms: 220,
            frame_ms: 16,
        }
    }
}

/// Working copy resolution retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Attempts before falling back to the raw source
    pub retry_attempts: u32,

    /// Base delay between attempts in milliseconds (doubles per attempt)
    pub retry_delay_ms: u64,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 250,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log format: pretty or json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
