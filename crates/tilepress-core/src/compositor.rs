//! Filter baking through an off-screen render surface.
//!
//! Baking draws a photo with a color matrix and optional tint overlay, then
//! snapshots the result. Real render surfaces need warmup before their pixels
//! are readable, so the surface sits behind [`RenderCanvas`]: `snapshot`
//! yields `None` until the surface has produced data. The compositor owns a
//! single surface slot, waits out a warmup, retries once, and reports a
//! failed bake as `None` so callers can keep the unfiltered artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use tokio::sync::Mutex;

use crate::config::CompositorConfig;
use crate::export;
use crate::filters::{ColorMatrix, FilterDefinition, Overlay};

/// What one bake renders: source pixels plus the filter to apply.
#[derive(Clone)]
pub struct BakeRequest {
    pub pixels: RgbaImage,
    pub matrix: ColorMatrix,
    pub overlay: Option<Overlay>,
}

impl BakeRequest {
    pub fn new(pixels: RgbaImage, filter: &FilterDefinition) -> Self {
        Self {
            pixels,
            matrix: filter.matrix,
            overlay: filter.overlay,
        }
    }
}

/// A finished bake on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct BakedImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Off-screen render target the compositor drains bakes through.
///
/// Implementations return `None` while the surface has no readable pixels
/// yet. The compositor handles warmup and retry; implementations only need
/// to answer "is there a frame right now".
pub trait RenderCanvas: Send + Sync {
    fn snapshot(&self, request: &BakeRequest) -> Option<RgbaImage>;
}

/// CPU render target. Always ready; applies the matrix and overlay directly.
#[derive(Debug, Default)]
pub struct SoftwareCanvas;

impl RenderCanvas for SoftwareCanvas {
    fn snapshot(&self, request: &BakeRequest) -> Option<RgbaImage> {
        let mut pixels = request.pixels.clone();
        apply_color_matrix(&mut pixels, &request.matrix);
        if let Some(overlay) = request.overlay {
            blend_overlay(&mut pixels, overlay);
        }
        Some(pixels)
    }
}

/// Serializes filter bakes through one render surface.
pub struct FilterCompositor {
    config: CompositorConfig,
    canvas: Arc<dyn RenderCanvas>,
    // One off-screen surface: bakes are strictly sequential.
    slot: Mutex<()>,
}

impl FilterCompositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self::with_canvas(config, Arc::new(SoftwareCanvas))
    }

    /// Build a compositor around a caller-supplied render surface.
    pub fn with_canvas(config: CompositorConfig, canvas: Arc<dyn RenderCanvas>) -> Self {
        Self {
            config,
            canvas,
            slot: Mutex::new(()),
        }
    }

    /// Bake `request` and write the result as a JPEG to `out`.
    ///
    /// Waits the configured warmup before the first snapshot and retries once
    /// after a further wait. Returns `None` when the surface never produced a
    /// readable frame or the write failed; callers keep their unfiltered
    /// artifact in that case, and a failed write leaves no partial file at
    /// `out`.
    pub async fn bake(&self, request: BakeRequest, out: &Path, quality: u8) -> Option<BakedImage> {
        let _slot = self.slot.lock().await;

        self.wait_frames(self.config.warmup_frames).await;
        let mut shot = self.try_snapshot(&request).await;
        if shot.is_none() {
            tracing::debug!(
                "canvas snapshot empty, retrying after {} frame(s)",
                self.config.retry_frames
            );
            self.wait_frames(self.config.retry_frames).await;
            shot = self.try_snapshot(&request).await;
        }

        let Some(pixels) = shot else {
            tracing::warn!("filter bake produced no pixels for {}", out.display());
            return None;
        };

        let (width, height) = pixels.dimensions();
        let path = out.to_path_buf();
        let write = tokio::task::spawn_blocking(move || {
            export::write_jpeg(&image::DynamicImage::ImageRgba8(pixels), &path, quality)
        })
        .await;

        match write {
            Ok(Ok(())) => Some(BakedImage {
                path: out.to_path_buf(),
                width,
                height,
            }),
            Ok(Err(e)) => {
                tracing::warn!("failed to write baked image {}: {e}", out.display());
                discard_partial(out);
                None
            }
            Err(e) => {
                tracing::warn!("bake write task failed: {e}");
                discard_partial(out);
                None
            }
        }
    }

    /// Load `src`, bake it with `filter`, and write to `out`.
    pub async fn bake_file(
        &self,
        src: &Path,
        filter: &FilterDefinition,
        out: &Path,
        quality: u8,
    ) -> Option<BakedImage> {
        let src_path = src.to_path_buf();
        let loaded =
            tokio::task::spawn_blocking(move || image::open(&src_path).map(|i| i.to_rgba8()))
                .await;
        let pixels = match loaded {
            Ok(Ok(pixels)) => pixels,
            Ok(Err(e)) => {
                tracing::warn!("cannot load bake input {}: {e}", src.display());
                return None;
            }
            Err(e) => {
                tracing::warn!("bake load task failed: {e}");
                return None;
            }
        };
        self.bake(BakeRequest::new(pixels, filter), out, quality)
            .await
    }

    async fn try_snapshot(&self, request: &BakeRequest) -> Option<RgbaImage> {
        let canvas = Arc::clone(&self.canvas);
        let request = request.clone();
        match tokio::task::spawn_blocking(move || canvas.snapshot(&request)).await {
            Ok(shot) => shot,
            Err(e) => {
                tracing::warn!("snapshot task failed: {e}");
                None
            }
        }
    }

    async fn wait_frames(&self, frames: u32) {
        for _ in 0..frames {
            tokio::time::sleep(Duration::from_millis(self.config.frame_ms)).await;
        }
    }
}

/// Best-effort removal of a half-written bake output.
fn discard_partial(out: &Path) {
    let _ = std::fs::remove_file(out);
}

/// Apply a row-major RGBA color matrix in place. Straight alpha; every
/// output channel is clamped to 0..1 before quantization.
fn apply_color_matrix(pixels: &mut RgbaImage, m: &ColorMatrix) {
    for px in pixels.pixels_mut() {
        let [r, g, b, a] = px.0.map(|c| c as f32 / 255.0);
        let nr = (m[0] * r + m[1] * g + m[2] * b + m[3] * a + m[4]).clamp(0.0, 1.0);
        let ng = (m[5] * r + m[6] * g + m[7] * b + m[8] * a + m[9]).clamp(0.0, 1.0);
        let nb = (m[10] * r + m[11] * g + m[12] * b + m[13] * a + m[14]).clamp(0.0, 1.0);
        let na = (m[15] * r + m[16] * g + m[17] * b + m[18] * a + m[19]).clamp(0.0, 1.0);
        px.0 = [to_u8(nr), to_u8(ng), to_u8(nb), to_u8(na)];
    }
}

/// Composite a translucent solid color over the image ("over" blend).
fn blend_overlay(pixels: &mut RgbaImage, overlay: Overlay) {
    let alpha = overlay.opacity.clamp(0.0, 1.0);
    if alpha == 0.0 {
        return;
    }
    let [or, og, ob] = overlay.color.map(|c| c as f32 / 255.0);
    for px in pixels.pixels_mut() {
        let [r, g, b, a] = px.0.map(|c| c as f32 / 255.0);
        let nr = or * alpha + r * (1.0 - alpha);
        let ng = og * alpha + g * (1.0 - alpha);
        let nb = ob * alpha + b * (1.0 - alpha);
        let na = alpha + a * (1.0 - alpha);
        px.0 = [to_u8(nr), to_u8(ng), to_u8(nb), to_u8(na)];
    }
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0 + 0.5) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters;
    use image::Rgba;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    fn test_config() -> CompositorConfig {
        CompositorConfig {
            warmup_frames: 1,
            retry_frames: 1,
            frame_ms: 1,
        }
    }

    fn sample_image() -> RgbaImage {
        RgbaImage::from_fn(8, 8, |x, y| {
            Rgba([(x * 30) as u8, (y * 30) as u8, 128, 255])
        })
    }

    /// Fails the first `failures` snapshots, then delegates to the CPU canvas.
    struct FlakyCanvas {
        failures: AtomicU32,
        calls: AtomicU32,
        inner: SoftwareCanvas,
    }

    impl FlakyCanvas {
        fn new(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                inner: SoftwareCanvas,
            }
        }
    }

    impl RenderCanvas for FlakyCanvas {
        fn snapshot(&self, request: &BakeRequest) -> Option<RgbaImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return None;
            }
            self.inner.snapshot(request)
        }
    }

    #[test]
    fn identity_matrix_is_a_no_op() {
        let mut img = sample_image();
        let original = img.clone();
        apply_color_matrix(&mut img, &filters::original().matrix);
        assert_eq!(img, original);
    }

    #[test]
    fn noir_matrix_produces_gray() {
        let mut img = sample_image();
        let noir = filters::find("noir").unwrap();
        apply_color_matrix(&mut img, &noir.matrix);
        for px in img.pixels() {
            assert_eq!(px.0[0], px.0[1]);
            assert_eq!(px.0[1], px.0[2]);
            assert_eq!(px.0[3], 255);
        }
    }

    #[test]
    fn matrix_output_clamps_saturated_input() {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let vivid = filters::find("vivid").unwrap();
        apply_color_matrix(&mut img, &vivid.matrix);
        // Boosted red must clip at 255, negative green/blue must floor at 0.
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn zero_opacity_overlay_is_a_no_op() {
        let mut img = sample_image();
        let original = img.clone();
        blend_overlay(
            &mut img,
            Overlay {
                color: [255, 0, 0],
                opacity: 0.0,
            },
        );
        assert_eq!(img, original);
    }

    #[test]
    fn full_opacity_overlay_replaces_pixels() {
        let mut img = sample_image();
        blend_overlay(
            &mut img,
            Overlay {
                color: [10, 20, 30],
                opacity: 1.0,
            },
        );
        for px in img.pixels() {
            assert_eq!(px.0, [10, 20, 30, 255]);
        }
    }

    #[tokio::test]
    async fn bake_writes_a_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("baked.jpg");
        let compositor = FilterCompositor::new(test_config());
        let noir = filters::find("noir").unwrap();

        let baked = compositor
            .bake(BakeRequest::new(sample_image(), noir), &out, 85)
            .await
            .unwrap();

        assert_eq!(baked.width, 8);
        assert_eq!(baked.height, 8);
        assert!(baked.path.exists());
    }

    #[tokio::test]
    async fn transient_failure_recovers_on_retry() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("baked.jpg");
        let canvas = Arc::new(FlakyCanvas::new(1));
        let compositor = FilterCompositor::with_canvas(test_config(), canvas.clone());
        let sepia = filters::find("sepia").unwrap();

        let baked = compositor
            .bake(BakeRequest::new(sample_image(), sepia), &out, 85)
            .await;

        assert!(baked.is_some());
        assert_eq!(canvas.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_write_discards_the_partial_file() {
        // Always has a frame, but one no JPEG encoder accepts: the write
        // fails after the output file is created.
        struct EmptyFrameCanvas;

        impl RenderCanvas for EmptyFrameCanvas {
            fn snapshot(&self, _request: &BakeRequest) -> Option<RgbaImage> {
                Some(RgbaImage::new(0, 0))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("baked.jpg");
        let compositor = FilterCompositor::with_canvas(test_config(), Arc::new(EmptyFrameCanvas));
        let noir = filters::find("noir").unwrap();

        let baked = compositor
            .bake(BakeRequest::new(sample_image(), noir), &out, 85)
            .await;

        assert!(baked.is_none());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn persistent_failure_yields_none_after_two_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("baked.jpg");
        let canvas = Arc::new(FlakyCanvas::new(u32::MAX));
        let compositor = FilterCompositor::with_canvas(test_config(), canvas.clone());
        let noir = filters::find("noir").unwrap();

        let baked = compositor
            .bake(BakeRequest::new(sample_image(), noir), &out, 85)
            .await;

        assert!(baked.is_none());
        assert_eq!(canvas.calls.load(Ordering::SeqCst), 2);
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn concurrent_bakes_are_serialized() {
        struct TrackingCanvas {
            busy: AtomicBool,
            overlapped: AtomicBool,
        }

        impl RenderCanvas for TrackingCanvas {
            fn snapshot(&self, request: &BakeRequest) -> Option<RgbaImage> {
                if self.busy.swap(true, Ordering::SeqCst) {
                    self.overlapped.store(true, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_millis(5));
                self.busy.store(false, Ordering::SeqCst);
                Some(request.pixels.clone())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let canvas = Arc::new(TrackingCanvas {
            busy: AtomicBool::new(false),
            overlapped: AtomicBool::new(false),
        });
        let compositor = Arc::new(FilterCompositor::with_canvas(test_config(), canvas.clone()));
        let noir = filters::find("noir").unwrap();

        let mut handles = Vec::new();
        for i in 0..3 {
            let compositor = Arc::clone(&compositor);
            let out = dir.path().join(format!("bake_{i}.jpg"));
            handles.push(tokio::spawn(async move {
                compositor
                    .bake(BakeRequest::new(sample_image(), noir), &out, 85)
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
        assert!(!canvas.overlapped.load(Ordering::SeqCst));
    }
}
