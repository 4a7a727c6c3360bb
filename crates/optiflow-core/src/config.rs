use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::EngineError;

/// Placement of the diagnostic thumbnail column drawn by the composite pass.
///
/// Coordinates are in normalized device space: the quad spans [-1, 1] at scale 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailLayout {
    #[serde(default = "default_thumb_x")]
    pub x: f32,
    /// Center of the first (top) thumbnail.
    #[serde(default = "default_thumb_top")]
    pub top: f32,
    /// Vertical distance between consecutive thumbnails.
    #[serde(default = "default_thumb_step")]
    pub step: f32,
    #[serde(default = "default_thumb_scale")]
    pub scale: f32,
}

fn default_thumb_x() -> f32 {
    0.8
}
fn default_thumb_top() -> f32 {
    0.8
}
fn default_thumb_step() -> f32 {
    0.4
}
fn default_thumb_scale() -> f32 {
    0.19
}

impl Default for ThumbnailLayout {
    fn default() -> Self {
        Self {
            x: default_thumb_x(),
            top: default_thumb_top(),
            step: default_thumb_step(),
            scale: default_thumb_scale(),
        }
    }
}

impl ThumbnailLayout {
    /// Translation of thumbnail `slot` (0 = top).
    pub fn offset(&self, slot: usize) -> [f32; 3] {
        [self.x, self.top - self.step * slot as f32, 0.0]
    }
}

/// Engine/pipeline configuration.
///
/// Every field has a default so a partial JSON file is valid; the host applies
/// CLI overrides on top of what was loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the image sequence.
    #[serde(default = "default_images")]
    pub images: PathBuf,

    /// Extra blur round trips after the first Gaussian application.
    #[serde(default)]
    pub blur_passes: u32,

    /// Clear color used by every offscreen target and the display.
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],

    /// MSAA sample count requested for the window surface.
    #[serde(default = "default_samples")]
    pub samples: u8,

    #[serde(default)]
    pub thumbnails: ThumbnailLayout,

    /// Advance one frame per redraw instead of waiting for the advance key.
    #[serde(default)]
    pub autoplay: bool,

    /// Optional directory overriding the builtin shader sources.
    #[serde(default)]
    pub shader_dir: Option<PathBuf>,

    /// Optional geometry file overriding the builtin quad.
    #[serde(default)]
    pub mesh: Option<PathBuf>,
}

fn default_images() -> PathBuf {
    PathBuf::from("./images")
}
fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}
fn default_samples() -> u8 {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            images: default_images(),
            blur_passes: 0,
            clear_color: default_clear_color(),
            samples: default_samples(),
            thumbnails: ThumbnailLayout::default(),
            autoplay: false,
            shader_dir: None,
            mesh: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: PipelineConfig =
            serde_json::from_str(&text).map_err(|source| EngineError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate(path)?;
        Ok(cfg)
    }

    /// Checks value ranges; `origin` is only used for error reporting.
    pub fn validate(&self, origin: &Path) -> Result<(), EngineError> {
        let invalid = |msg: &str| EngineError::InvalidConfig {
            path: origin.to_path_buf(),
            msg: msg.to_string(),
        };

        if !(self.thumbnails.scale > 0.0 && self.thumbnails.scale <= 1.0) {
            return Err(invalid("thumbnails.scale must be in (0, 1]"));
        }
        if self.samples > 16 {
            return Err(invalid("samples must be <= 16"));
        }
        if self.clear_color.iter().any(|c| !c.is_finite()) {
            return Err(invalid("clear_color must be finite"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let cfg: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.blur_passes, 0);
        assert_eq!(cfg.samples, 4);
        assert_eq!(cfg.thumbnails.scale, 0.19);
    }

    #[test]
    fn partial_thumbnail_block_keeps_other_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{ "thumbnails": { "scale": 0.25 }, "blur_passes": 2 }"#)
                .unwrap();
        assert_eq!(cfg.thumbnails.scale, 0.25);
        assert_eq!(cfg.thumbnails.x, 0.8);
        assert_eq!(cfg.blur_passes, 2);
    }

    #[test]
    fn thumbnail_offsets_walk_down_the_column() {
        let layout = ThumbnailLayout::default();
        assert_eq!(layout.offset(0), [0.8, 0.8, 0.0]);
        let last = layout.offset(4);
        assert!((last[1] + 0.8).abs() < 1e-6);
    }

    #[test]
    fn validate_rejects_zero_scale() {
        let mut cfg = PipelineConfig::default();
        cfg.thumbnails.scale = 0.0;
        let err = cfg.validate(Path::new("cfg.json")).unwrap_err();
        assert!(err.to_string().contains("thumbnails.scale"));
    }

    #[test]
    fn from_json_path_reports_missing_file() {
        let p = std::env::temp_dir().join("optiflow_core_missing_config.json");
        let _ = std::fs::remove_file(&p);
        match PipelineConfig::from_json_path(&p) {
            Err(EngineError::Io { path, .. }) => assert_eq!(path, p),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
