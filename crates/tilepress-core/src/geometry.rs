//! Crop-window coordinate mapping.
//!
//! Pure math translating the center-anchored interactive transform into pixel
//! rectangles: cover fitting, transform clamping, viewport layer placement,
//! and the inverse mapping from a committed transform back to a square crop
//! in source pixels. No state, no I/O; everything here is f64 until the final
//! integer conversion.

use serde::{Deserialize, Serialize};

use crate::types::{CropRect, Transform, Viewport};

/// Guard against division by a collapsed render size. Clamped transforms
/// never get near this; it only keeps the math total for garbage input.
const MIN_RENDER_SCALE: f64 = 1e-6;

/// The square crop window, centered in the viewport, in display units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRect {
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

impl FrameRect {
    pub fn right(&self) -> f64 {
        self.x + self.size
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.size
    }
}

/// Placement of a rendered photo layer in viewport display units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PlacedRect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether this placement fully covers the crop window.
    pub fn covers(&self, frame: &FrameRect, tolerance: f64) -> bool {
        self.x <= frame.x + tolerance
            && self.y <= frame.y + tolerance
            && self.right() >= frame.right() - tolerance
            && self.bottom() >= frame.bottom() - tolerance
    }
}

/// The crop window: a `window`-sized square centered in the viewport.
pub fn frame_rect(viewport: Viewport, window: f64) -> FrameRect {
    FrameRect {
        x: (viewport.width - window) / 2.0,
        y: (viewport.height - window) / 2.0,
        size: window,
    }
}

/// Scale factor that makes the photo cover the crop window.
///
/// The larger of the two per-axis ratios, so the shorter photo edge exactly
/// fills the window and the longer edge overflows it.
pub fn cover_scale(source_width: f64, source_height: f64, window: f64) -> f64 {
    let w = source_width.max(MIN_RENDER_SCALE);
    let h = source_height.max(MIN_RENDER_SCALE);
    (window / w).max(window / h)
}

/// Photo dimensions at cover scale, in display units.
///
/// This is the base size the interactive transform multiplies: at scale 1.0
/// the photo is exactly cover-fitted to the window.
pub fn covered_size(source_width: f64, source_height: f64, window: f64) -> (f64, f64) {
    let c = cover_scale(source_width, source_height, window);
    (source_width * c, source_height * c)
}

/// The smallest user scale that still covers the window from a given base size.
///
/// For a base produced by [`covered_size`] this is 1.0; for arbitrary bases it
/// is whatever factor restores coverage on both axes.
pub fn min_scale(base_width: f64, base_height: f64, window: f64) -> f64 {
    let w = base_width.max(MIN_RENDER_SCALE);
    let h = base_height.max(MIN_RENDER_SCALE);
    1.0_f64.max(window / w).max(window / h)
}

/// Maximum absolute translation on one axis that keeps the window covered.
///
/// The rendered edge is `base_edge * scale`; the photo is drawn centered, so
/// the slack on each side is half the overflow.
pub fn max_translate(base_edge: f64, window: f64, scale: f64) -> f64 {
    ((base_edge * scale - window) / 2.0).max(0.0)
}

/// Clamp a transform so the photo always covers the crop window.
///
/// Scale is bounded below by coverage and above by `max_scale`; translation is
/// then bounded by the slack the clamped scale leaves on each axis. Applying
/// this twice yields the same result as applying it once.
pub fn clamp_transform(
    transform: Transform,
    base_width: f64,
    base_height: f64,
    window: f64,
    max_scale: f64,
) -> Transform {
    let lo = min_scale(base_width, base_height, window);
    let hi = max_scale.max(lo);
    let scale = if transform.scale.is_finite() {
        transform.scale.clamp(lo, hi)
    } else {
        lo
    };

    let max_tx = max_translate(base_width, window, scale);
    let max_ty = max_translate(base_height, window, scale);
    let tx = if transform.translate_x.is_finite() {
        transform.translate_x.clamp(-max_tx, max_tx)
    } else {
        0.0
    };
    let ty = if transform.translate_y.is_finite() {
        transform.translate_y.clamp(-max_ty, max_ty)
    } else {
        0.0
    };

    Transform {
        translate_x: tx,
        translate_y: ty,
        scale,
    }
}

/// Where a transformed photo layer lands in the viewport.
///
/// The photo is drawn centered in the viewport at `base * scale`, then offset
/// by the translation.
pub fn rendered_rect(
    base_width: f64,
    base_height: f64,
    viewport: Viewport,
    transform: Transform,
) -> PlacedRect {
    let scale = transform.scale.max(MIN_RENDER_SCALE);
    let width = base_width * scale;
    let height = base_height * scale;
    PlacedRect {
        x: viewport.width / 2.0 + transform.translate_x - width / 2.0,
        y: viewport.height / 2.0 + transform.translate_y - height / 2.0,
        width,
        height,
    }
}

/// Map a committed transform back to a square crop in source pixels.
///
/// Projects the crop window's corners into the rendered photo, normalizes
/// them against the rendered size, and scales into the source raster. The
/// result uses floor/ceil so it never loses covered pixels, is clamped into
/// the source bounds, and is forced square (the larger span wins, bounded by
/// both source dimensions) so downstream resizes never distort.
///
/// Callers are expected to pass a transform already run through
/// [`clamp_transform`] against the same window; unclamped input still
/// produces an in-bounds square, just not necessarily the one on screen.
pub fn map_to_source_rect(
    source_width: u32,
    source_height: u32,
    viewport: Viewport,
    window: f64,
    transform: Transform,
) -> CropRect {
    let sw = source_width.max(1) as f64;
    let sh = source_height.max(1) as f64;

    let (base_w, base_h) = covered_size(sw, sh, window);
    let scale = transform.scale.max(MIN_RENDER_SCALE);
    let rendered_w = (base_w * scale).max(MIN_RENDER_SCALE);
    let rendered_h = (base_h * scale).max(MIN_RENDER_SCALE);

    // Photo top-left in viewport space: centered, then translated.
    let left = viewport.width / 2.0 + transform.translate_x - rendered_w / 2.0;
    let top = viewport.height / 2.0 + transform.translate_y - rendered_h / 2.0;

    let frame = frame_rect(viewport, window);

    // Window corners in normalized photo coordinates.
    let u0 = (frame.x - left) / rendered_w;
    let v0 = (frame.y - top) / rendered_h;
    let u1 = (frame.right() - left) / rendered_w;
    let v1 = (frame.bottom() - top) / rendered_h;

    // Into source pixels: floor the leading edge, ceil the trailing edge.
    let x0 = (u0 * sw).floor().clamp(0.0, sw - 1.0) as i64;
    let y0 = (v0 * sh).floor().clamp(0.0, sh - 1.0) as i64;
    let x1 = (u1 * sw).ceil().clamp(1.0, sw) as i64;
    let y1 = (v1 * sh).ceil().clamp(1.0, sh) as i64;

    let width = (x1 - x0).max(1);
    let height = (y1 - y0).max(1);

    // Force square: keep the fuller span, bounded by both source dimensions,
    // then pull the origin back so the square still fits.
    let side = width
        .max(height)
        .min(source_width.max(1) as i64)
        .min(source_height.max(1) as i64)
        .max(1);
    let x = x0.min(source_width.max(1) as i64 - side).max(0);
    let y = y0.min(source_height.max(1) as i64 - side).max(0);

    CropRect {
        x: x as u32,
        y: y as u32,
        width: side as u32,
        height: side as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Viewport = Viewport {
        width: 400.0,
        height: 400.0,
    };
    const WINDOW: f64 = 300.0;

    #[test]
    fn frame_rect_is_centered() {
        let frame = frame_rect(VIEWPORT, WINDOW);
        assert_eq!(frame.x, 50.0);
        assert_eq!(frame.y, 50.0);
        assert_eq!(frame.size, 300.0);
        assert_eq!(frame.right(), 350.0);
    }

    #[test]
    fn cover_scale_uses_shorter_edge() {
        // Landscape: height is the shorter edge.
        let c = cover_scale(4000.0, 3000.0, WINDOW);
        assert!((c - 0.1).abs() < 1e-12);
        // Portrait: width is the shorter edge.
        let c = cover_scale(3000.0, 4000.0, WINDOW);
        assert!((c - 0.1).abs() < 1e-12);
    }

    #[test]
    fn covered_size_fills_window_on_shorter_edge() {
        let (w, h) = covered_size(4000.0, 3000.0, WINDOW);
        assert!((w - 400.0).abs() < 1e-9);
        assert!((h - 300.0).abs() < 1e-9);
    }

    #[test]
    fn min_scale_is_one_for_covered_base() {
        let (w, h) = covered_size(4000.0, 3000.0, WINDOW);
        assert_eq!(min_scale(w, h, WINDOW), 1.0);
    }

    #[test]
    fn clamp_restores_minimum_zoom() {
        let (w, h) = covered_size(4000.0, 3000.0, WINDOW);
        let t = Transform {
            translate_x: 0.0,
            translate_y: 0.0,
            scale: 0.3,
        };
        let clamped = clamp_transform(t, w, h, WINDOW, 3.0);
        assert_eq!(clamped.scale, 1.0);
    }

    #[test]
    fn clamp_caps_maximum_zoom() {
        let (w, h) = covered_size(4000.0, 3000.0, WINDOW);
        let t = Transform {
            translate_x: 0.0,
            translate_y: 0.0,
            scale: 9.0,
        };
        let clamped = clamp_transform(t, w, h, WINDOW, 3.0);
        assert_eq!(clamped.scale, 3.0);
    }

    #[test]
    fn clamp_bounds_translation_by_overflow() {
        let (w, h) = covered_size(4000.0, 3000.0, WINDOW);
        // At scale 1 a 400x300 base leaves 50px of slack horizontally and
        // none vertically.
        let t = Transform {
            translate_x: 500.0,
            translate_y: -500.0,
            scale: 1.0,
        };
        let clamped = clamp_transform(t, w, h, WINDOW, 3.0);
        assert_eq!(clamped.translate_x, 50.0);
        assert_eq!(clamped.translate_y, 0.0);
    }

    #[test]
    fn clamp_is_idempotent() {
        let (w, h) = covered_size(4000.0, 3000.0, WINDOW);
        let t = Transform {
            translate_x: 123.0,
            translate_y: -77.0,
            scale: 2.3,
        };
        let once = clamp_transform(t, w, h, WINDOW, 3.0);
        let twice = clamp_transform(once, w, h, WINDOW, 3.0);
        assert_eq!(once, twice);
    }

    #[test]
    fn clamp_handles_non_finite_input() {
        let (w, h) = covered_size(4000.0, 3000.0, WINDOW);
        let t = Transform {
            translate_x: f64::NAN,
            translate_y: f64::INFINITY,
            scale: f64::NAN,
        };
        let clamped = clamp_transform(t, w, h, WINDOW, 3.0);
        assert_eq!(clamped.scale, 1.0);
        assert_eq!(clamped.translate_x, 0.0);
        assert_eq!(clamped.translate_y, 0.0);
    }

    #[test]
    fn clamped_layer_always_covers_window() {
        let (w, h) = covered_size(4000.0, 3000.0, WINDOW);
        let frame = frame_rect(VIEWPORT, WINDOW);
        let t = clamp_transform(
            Transform {
                translate_x: 40.0,
                translate_y: 10.0,
                scale: 1.2,
            },
            w,
            h,
            WINDOW,
            3.0,
        );
        let placed = rendered_rect(w, h, VIEWPORT, t);
        assert!(placed.covers(&frame, 1e-9));
    }

    #[test]
    fn identity_maps_to_centered_square_crop() {
        // 4000x3000 source, 300 window, 400x400 viewport: the photo renders
        // 400x300 centered, the window sees the middle 300x300 of it, which
        // is the centered 3000x3000 block of the source.
        let crop = map_to_source_rect(4000, 3000, VIEWPORT, WINDOW, Transform::identity());
        assert_eq!(
            crop,
            CropRect {
                x: 500,
                y: 0,
                width: 3000,
                height: 3000
            }
        );
    }

    #[test]
    fn identity_on_square_source_takes_everything() {
        let crop = map_to_source_rect(2000, 2000, VIEWPORT, WINDOW, Transform::identity());
        assert_eq!(
            crop,
            CropRect {
                x: 0,
                y: 0,
                width: 2000,
                height: 2000
            }
        );
    }

    #[test]
    fn zooming_in_shrinks_the_crop() {
        let base = map_to_source_rect(4000, 3000, VIEWPORT, WINDOW, Transform::identity());
        let zoomed = map_to_source_rect(
            4000,
            3000,
            VIEWPORT,
            WINDOW,
            Transform {
                translate_x: 0.0,
                translate_y: 0.0,
                scale: 2.0,
            },
        );
        assert!(zoomed.width < base.width);
        // Still centered on the same spot.
        assert_eq!(zoomed.x + zoomed.width / 2, base.x + base.width / 2);
    }

    #[test]
    fn panning_moves_the_crop_opposite_to_translation() {
        let t = clamp_transform(
            Transform {
                translate_x: 30.0,
                translate_y: 0.0,
                scale: 1.0,
            },
            400.0,
            300.0,
            WINDOW,
            3.0,
        );
        let crop = map_to_source_rect(4000, 3000, VIEWPORT, WINDOW, t);
        let centered = map_to_source_rect(4000, 3000, VIEWPORT, WINDOW, Transform::identity());
        // Dragging the photo right reveals pixels further left in the source.
        assert!(crop.x < centered.x);
    }

    #[test]
    fn crop_is_square_and_in_bounds_for_extreme_input() {
        let crop = map_to_source_rect(
            50,
            5000,
            VIEWPORT,
            WINDOW,
            Transform {
                translate_x: 1e9,
                translate_y: -1e9,
                scale: 0.001,
            },
        );
        assert_eq!(crop.width, crop.height);
        assert!(crop.width >= 1);
        assert!(crop.right() <= 50);
        assert!(crop.bottom() <= 5000);
    }

    #[test]
    fn tiny_source_never_degenerates() {
        let crop = map_to_source_rect(1, 1, VIEWPORT, WINDOW, Transform::identity());
        assert_eq!(
            crop,
            CropRect {
                x: 0,
                y: 0,
                width: 1,
                height: 1
            }
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_transform() -> impl Strategy<Value = Transform> {
            (-2000.0..2000.0_f64, -2000.0..2000.0_f64, 0.01..20.0_f64).prop_map(
                |(translate_x, translate_y, scale)| Transform {
                    translate_x,
                    translate_y,
                    scale,
                },
            )
        }

        proptest! {
            #[test]
            fn clamped_transform_always_covers(
                sw in 1u32..8000,
                sh in 1u32..8000,
                t in arb_transform(),
            ) {
                let (bw, bh) = covered_size(sw as f64, sh as f64, WINDOW);
                let clamped = clamp_transform(t, bw, bh, WINDOW, 3.0);
                let placed = rendered_rect(bw, bh, VIEWPORT, clamped);
                let frame = frame_rect(VIEWPORT, WINDOW);
                prop_assert!(placed.covers(&frame, 1e-6));
            }

            #[test]
            fn clamp_is_idempotent_everywhere(
                sw in 1u32..8000,
                sh in 1u32..8000,
                t in arb_transform(),
            ) {
                let (bw, bh) = covered_size(sw as f64, sh as f64, WINDOW);
                let once = clamp_transform(t, bw, bh, WINDOW, 3.0);
                let twice = clamp_transform(once, bw, bh, WINDOW, 3.0);
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn mapped_crop_is_square_and_contained(
                sw in 1u32..8000,
                sh in 1u32..8000,
                t in arb_transform(),
            ) {
                let (bw, bh) = covered_size(sw as f64, sh as f64, WINDOW);
                let clamped = clamp_transform(t, bw, bh, WINDOW, 3.0);
                let crop = map_to_source_rect(sw, sh, VIEWPORT, WINDOW, clamped);
                prop_assert_eq!(crop.width, crop.height);
                prop_assert!(crop.width >= 1);
                prop_assert!(crop.right() <= sw);
                prop_assert!(crop.bottom() <= sh);
            }

            #[test]
            fn mapping_agrees_across_resolutions(
                sw in 64u32..1500,
                sh in 64u32..1500,
                t in arb_transform(),
            ) {
                // The same clamped transform mapped against a 4x source must
                // land on the same normalized region, within integer rounding.
                let (bw, bh) = covered_size(sw as f64, sh as f64, WINDOW);
                let clamped = clamp_transform(t, bw, bh, WINDOW, 3.0);

                let small = map_to_source_rect(sw, sh, VIEWPORT, WINDOW, clamped);
                let large = map_to_source_rect(sw * 4, sh * 4, VIEWPORT, WINDOW, clamped);

                let tol_x = 2.0 / sw as f64;
                let tol_y = 2.0 / sh as f64;
                let nx_small = small.x as f64 / sw as f64;
                let nx_large = large.x as f64 / (sw * 4) as f64;
                let ny_small = small.y as f64 / sh as f64;
                let ny_large = large.y as f64 / (sh * 4) as f64;
                let nw_small = small.width as f64 / sw as f64;
                let nw_large = large.width as f64 / (sw * 4) as f64;

                prop_assert!((nx_small - nx_large).abs() <= tol_x);
                prop_assert!((ny_small - ny_large).abs() <= tol_y);
                prop_assert!((nw_small - nw_large).abs() <= tol_x.max(tol_y));
            }
        }
    }
}
