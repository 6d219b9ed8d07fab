//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.editor.window_size <= 0.0 {
            return Err(ConfigError::ValidationError(
                "editor.window_size must be > 0".into(),
            ));
        }
        if self.editor.viewport_width < self.editor.window_size
            || self.editor.viewport_height < self.editor.window_size
        {
            return Err(ConfigError::ValidationError(
                "editor viewport must be at least window_size on both axes".into(),
            ));
        }
        if self.editor.max_scale < 1.0 {
            return Err(ConfigError::ValidationError(
                "editor.max_scale must be >= 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.editor.backdrop_opacity) {
            return Err(ConfigError::ValidationError(
                "editor.backdrop_opacity must be between 0.0 and 1.0".into(),
            ));
        }
        if self.working_copy.max_edge == 0 {
            return Err(ConfigError::ValidationError(
                "working_copy.max_edge must be > 0".into(),
            ));
        }
        if self.export.preview_edge == 0 {
            return Err(ConfigError::ValidationError(
                "export.preview_edge must be > 0".into(),
            ));
        }
        if self.export.print_size == 0 {
            return Err(ConfigError::ValidationError(
                "export.print_size must be > 0".into(),
            ));
        }
        for (name, quality) in [
            ("working_copy.quality", self.working_copy.quality),
            ("export.preview_quality", self.export.preview_quality),
            ("export.print_quality", self.export.print_quality),
        ] {
            if quality == 0 || quality > 100 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 1 and 100"
                )));
            }
        }
        if self.compositor.frame_ms == 0 {
            return Err(ConfigError::ValidationError(
                "compositor.frame_ms must be > 0".into(),
            ));
        }
        if self.crossfade.frame_ms == 0 {
            return Err(ConfigError::ValidationError(
                "crossfade.frame_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}
