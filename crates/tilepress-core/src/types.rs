//! Shared data model for editing sessions, patches, and artifacts.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::filters::{FilterParams, ORIGINAL_FILTER_ID};
use crate::geometry::FrameRect;

/// A full-resolution photograph selected for tiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAsset {
    /// Stable identity within the session (caller-supplied or derived).
    pub id: String,
    /// Location of the original capture.
    pub uri: PathBuf,
    /// Upright width of the original in pixels, after EXIF rotation.
    pub width: u32,
    /// Upright height of the original in pixels, after EXIF rotation.
    pub height: u32,
}

/// One entry of the input collection: the asset plus any previously saved edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoRecord {
    #[serde(flatten)]
    pub asset: SourceAsset,
    /// Edits committed in an earlier session, restored when the photo reopens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edits: Option<PhotoEdits>,
}

/// The interactive pan/zoom state, in viewport display units.
///
/// Translation is measured from the centered position; scale multiplies the
/// cover-fitted base size. The identity transform shows the photo centered at
/// cover scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// The centered, unzoomed transform.
    pub fn identity() -> Self {
        Self {
            translate_x: 0.0,
            translate_y: 0.0,
            scale: 1.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.translate_x == 0.0 && self.translate_y == 0.0 && self.scale == 1.0
    }
}

/// Display-space dimensions of the editing viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned pixel rectangle in some raster's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Remap this rectangle from one raster's pixel space into another's.
    ///
    /// Used to carry a crop computed against the full-resolution source into
    /// the smaller working copy. The result is clamped into the target bounds
    /// and never degenerates below 1x1.
    pub fn scaled_to(&self, from: (u32, u32), to: (u32, u32)) -> CropRect {
        let fx = to.0 as f64 / from.0.max(1) as f64;
        let fy = to.1 as f64 / from.1.max(1) as f64;

        let mut x = (self.x as f64 * fx).floor() as u32;
        let mut y = (self.y as f64 * fy).floor() as u32;
        let w = ((self.width as f64 * fx).ceil() as u32).max(1);
        let h = ((self.height as f64 * fy).ceil() as u32).max(1);

        x = x.min(to.0.saturating_sub(1));
        y = y.min(to.1.saturating_sub(1));
        let w = w.min(to.0 - x).max(1);
        let h = h.min(to.1 - y).max(1);

        CropRect {
            x,
            y,
            width: w,
            height: h,
        }
    }
}

/// A bounded-size interactive stand-in for a source photo.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingCopy {
    /// File the interactive layers render from.
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// The in-session edit state for one photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditState {
    pub transform: Transform,
    pub filter_id: String,
}

impl Default for EditState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            filter_id: ORIGINAL_FILTER_ID.to_string(),
        }
    }
}

/// Committed (or in-progress) edit values carried by an update patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoEdits {
    /// Source-space crop. Absent until the photo is committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropRect>,
    pub filter_id: String,
    /// Snapshot of the applied filter's matrix and overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_params: Option<FilterParams>,
    /// The interactive transform, restored when the photo is reopened.
    pub ui: Transform,
    pub committed: bool,
}

impl PhotoEdits {
    /// The edit state a reopened photo should restore to.
    pub fn to_edit_state(&self) -> EditState {
        EditState {
            transform: self.ui,
            filter_id: self.filter_id.clone(),
        }
    }
}

/// A finished raster artifact on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub uri: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Artifact references carried by an update patch.
///
/// `preview` is filled by the synchronous commit; `print` arrives later from
/// the deferred queue, in a second patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputArtifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<ExportArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print: Option<ExportArtifact>,
}

/// An update applied to the caller's photo record through [`RecordStore`].
///
/// [`RecordStore`]: crate::session::RecordStore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPatch {
    pub edits: PhotoEdits,
    #[serde(default)]
    pub output: OutputArtifacts,
    /// Placement of the square crop window in the viewport.
    pub frame_rect: FrameRect,
    pub viewport: Viewport,
}
