//! The interactive pan/zoom surface.
//!
//! The surface owns the live transform for the photo being edited. Values
//! move freely while a gesture is in progress (the host renders them
//! directly); ending a gesture clamps the transform back into coverage and
//! publishes it as a committed snapshot. Nothing outside the interaction
//! loop ever sees an unclamped transform.

use tokio::sync::mpsc;

use crate::config::EditorConfig;
use crate::geometry::{self, FrameRect, PlacedRect};
use crate::types::{Transform, Viewport, WorkingCopy};

/// One interaction event from the host UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    PanStart,
    /// Cumulative drag delta since the pan started, in display units.
    PanMove { dx: f64, dy: f64 },
    PinchStart,
    /// Cumulative scale ratio since the pinch started.
    PinchMove { ratio: f64 },
    /// The gesture ended; clamp the live values and commit.
    End,
    /// Replace the transform outright (restoring saved edits).
    Reset(Transform),
}

/// Fixed per-photo geometry the surface operates in.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceGeometry {
    /// Photo size at cover scale, in display units.
    pub base_width: f64,
    pub base_height: f64,
    pub viewport: Viewport,
    pub window: f64,
    pub max_scale: f64,
    pub backdrop_opacity: f64,
}

impl SurfaceGeometry {
    /// Geometry for editing `copy` under the given editor settings.
    pub fn for_working_copy(copy: &WorkingCopy, editor: &EditorConfig) -> Self {
        let (base_width, base_height) = geometry::covered_size(
            copy.width as f64,
            copy.height as f64,
            editor.window_size,
        );
        Self {
            base_width,
            base_height,
            viewport: Viewport::new(editor.viewport_width, editor.viewport_height),
            window: editor.window_size,
            max_scale: editor.max_scale,
            backdrop_opacity: editor.backdrop_opacity,
        }
    }

    /// The crop window, centered in the viewport.
    pub fn frame(&self) -> FrameRect {
        geometry::frame_rect(self.viewport, self.window)
    }

    /// Clamp a transform into this geometry's coverage bounds.
    pub fn clamp(&self, transform: Transform) -> Transform {
        geometry::clamp_transform(
            transform,
            self.base_width,
            self.base_height,
            self.window,
            self.max_scale,
        )
    }
}

/// A layer the host should draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layer {
    pub rect: PlacedRect,
    pub opacity: f64,
    /// Clip region, if the layer is masked to the crop window.
    pub clip: Option<FrameRect>,
}

/// The two-layer render plan: a dimmed full photo under a window-clipped
/// tile. Both layers share one placement, so they stay in register.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerPlan {
    pub backdrop: Layer,
    pub tile: Layer,
}

/// Live pan/pinch state for one photo.
pub struct GestureSurface {
    geometry: SurfaceGeometry,
    transform: Transform,
    pan_origin: Option<(f64, f64)>,
    pinch_origin: Option<f64>,
}

impl GestureSurface {
    /// Surface starting from `initial`, clamped into bounds.
    pub fn new(geometry: SurfaceGeometry, initial: Transform) -> Self {
        let transform = geometry.clamp(initial);
        Self {
            geometry,
            transform,
            pan_origin: None,
            pinch_origin: None,
        }
    }

    /// The live transform. Unclamped while a gesture is in progress.
    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn geometry(&self) -> &SurfaceGeometry {
        &self.geometry
    }

    /// Feed one event into the surface.
    ///
    /// Returns the committed transform when the event ends a gesture; `None`
    /// for intermediate updates. Move events without a preceding start are
    /// ignored.
    pub fn apply(&mut self, event: GestureEvent) -> Option<Transform> {
        match event {
            GestureEvent::PanStart => {
                self.pan_origin = Some((self.transform.translate_x, self.transform.translate_y));
                None
            }
            GestureEvent::PanMove { dx, dy } => {
                if let Some((ox, oy)) = self.pan_origin {
                    self.transform.translate_x = ox + dx;
                    self.transform.translate_y = oy + dy;
                }
                None
            }
            GestureEvent::PinchStart => {
                self.pinch_origin = Some(self.transform.scale);
                None
            }
            GestureEvent::PinchMove { ratio } => {
                if let Some(origin) = self.pinch_origin {
                    self.transform.scale = origin * ratio;
                }
                None
            }
            GestureEvent::End => {
                self.pan_origin = None;
                self.pinch_origin = None;
                self.transform = self.geometry.clamp(self.transform);
                Some(self.transform)
            }
            GestureEvent::Reset(t) => {
                self.pan_origin = None;
                self.pinch_origin = None;
                self.transform = self.geometry.clamp(t);
                Some(self.transform)
            }
        }
    }

    /// What the host should draw for the current live transform.
    pub fn layers(&self) -> LayerPlan {
        let rect = geometry::rendered_rect(
            self.geometry.base_width,
            self.geometry.base_height,
            self.geometry.viewport,
            self.transform,
        );
        LayerPlan {
            backdrop: Layer {
                rect,
                opacity: self.geometry.backdrop_opacity,
                clip: None,
            },
            tile: Layer {
                rect,
                opacity: 1.0,
                clip: Some(self.geometry.frame()),
            },
        }
    }

    /// Pump events until the channel closes, publishing committed transforms.
    ///
    /// The surface owns the live values; only clamped snapshots cross the
    /// channel, so the consumer never observes mid-gesture state.
    pub async fn drive(
        mut self,
        mut events: mpsc::Receiver<GestureEvent>,
        commits: mpsc::Sender<Transform>,
    ) {
        while let Some(event) = events.recv().await {
            if let Some(committed) = self.apply(event) {
                if commits.send(committed).await.is_err() {
                    tracing::debug!("commit receiver dropped, stopping gesture loop");
                    break;
                }
            }
        }
    }
}
