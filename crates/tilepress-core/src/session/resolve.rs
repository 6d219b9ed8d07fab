//! Working-copy preparation.
//!
//! Photos are edited against a bounded-size stand-in generated from the
//! original: decoded, EXIF-normalized, downscaled, re-encoded into scratch.
//! Preparation retries with backoff; when generation keeps failing the
//! resolver degrades to interacting with the raw source at natural size, and
//! as a last resort hands back a 1x1 placeholder so the session can keep
//! rendering while the host surfaces the problem. `resolve` never fails.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, ResolveConfig, WorkingCopyConfig};
use crate::error::{ExportError, ExportResult};
use crate::export;
use crate::types::{SourceAsset, WorkingCopy};

/// Prepares and caches working copies, one per asset id.
pub struct WorkingCopyResolver {
    working: WorkingCopyConfig,
    retry: ResolveConfig,
    scratch_dir: PathBuf,
    cache: HashMap<String, WorkingCopy>,
}

impl WorkingCopyResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            working: config.working_copy.clone(),
            retry: config.resolve.clone(),
            scratch_dir: config.scratch_dir(),
            cache: HashMap::new(),
        }
    }

    /// Prepare (or fetch from cache) the working copy for `asset`.
    ///
    /// Falls back to the raw source and finally to a placeholder instead of
    /// failing; degraded results are not cached, so a revisit retries.
    pub async fn resolve(&mut self, asset: &SourceAsset) -> WorkingCopy {
        if let Some(copy) = self.cache.get(&asset.id).cloned() {
            if copy.path.exists() {
                tracing::debug!("working copy cache hit for {}", asset.id);
                return copy;
            }
            // Scratch was cleaned out from under us; regenerate.
            self.cache.remove(&asset.id);
        }

        let attempts = self.retry.retry_attempts.max(1);
        for attempt in 0..attempts {
            match self.generate(asset).await {
                Ok(copy) => {
                    tracing::debug!(
                        "working copy for {} at {}x{}",
                        asset.id,
                        copy.width,
                        copy.height
                    );
                    self.cache.insert(asset.id.clone(), copy.clone());
                    return copy;
                }
                Err(e) => {
                    tracing::warn!(
                        "working copy attempt {}/{} failed for {}: {e}",
                        attempt + 1,
                        attempts,
                        asset.id
                    );
                    if attempt + 1 < attempts {
                        tokio::time::sleep(backoff_duration(attempt, self.retry.retry_delay_ms))
                            .await;
                    }
                }
            }
        }

        // Degraded: interact against the raw source at natural size. The raw
        // file keeps its EXIF tag, so the stand-in dimensions are upright.
        let probe_uri = asset.uri.clone();
        let probed =
            tokio::task::spawn_blocking(move || export::oriented_dimensions(&probe_uri)).await;
        if let Ok(Some((width, height))) = probed {
            tracing::warn!("using raw source as working copy for {}", asset.id);
            return WorkingCopy {
                path: asset.uri.clone(),
                width,
                height,
            };
        }

        // Last resort: a placeholder the host can hang a spinner on.
        tracing::warn!("could not prepare photo {}, using placeholder", asset.id);
        WorkingCopy {
            path: asset.uri.clone(),
            width: 1,
            height: 1,
        }
    }

    async fn generate(&self, asset: &SourceAsset) -> ExportResult<WorkingCopy> {
        let src = asset.uri.clone();
        let out = self
            .scratch_dir
            .join(format!("{}_work.jpg", export::short_digest(&asset.id)));
        let max_edge = self.working.max_edge;
        let quality = self.working.quality;

        tokio::task::spawn_blocking(move || {
            let img = export::open_oriented(&src)?;
            let img = export::bound_long_edge(&img, max_edge);
            let (width, height) = (img.width(), img.height());
            export::write_jpeg(&img, &out, quality)?;
            Ok(WorkingCopy {
                path: out,
                width,
                height,
            })
        })
        .await
        .map_err(|e| ExportError::Join(e.to_string()))?
    }
}

/// Exponential backoff: base * 2^attempt, capped at 10 seconds.
fn backoff_duration(attempt: u32, base_ms: u64) -> Duration {
    let ms = base_ms.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(ms.min(10_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::path::Path;

    fn fast_config(work_dir: &Path) -> Config {
        let mut config = Config::default();
        config.general.work_dir = work_dir.to_path_buf();
        config.working_copy.max_edge = 100;
        config.resolve.retry_attempts = 2;
        config.resolve.retry_delay_ms = 1;
        config
    }

    fn write_source(path: &Path, width: u32, height: u32) {
        let img = RgbaImage::from_pixel(width, height, Rgba([90, 120, 150, 255]));
        export::write_jpeg(&DynamicImage::ImageRgba8(img), path, 90).unwrap();
    }

    fn asset(uri: PathBuf, width: u32, height: u32) -> SourceAsset {
        SourceAsset {
            id: "asset-1".to_string(),
            uri,
            width,
            height,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_duration(0, 250), Duration::from_millis(250));
        assert_eq!(backoff_duration(1, 250), Duration::from_millis(500));
        assert_eq!(backoff_duration(2, 250), Duration::from_millis(1000));
        assert_eq!(backoff_duration(12, 250), Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn generates_bounded_copy_and_caches_it() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("photo.jpg");
        write_source(&src, 1200, 900);
        let mut resolver = WorkingCopyResolver::new(&fast_config(dir.path()));

        let copy = resolver.resolve(&asset(src.clone(), 1200, 900)).await;
        assert_eq!((copy.width, copy.height), (100, 75));
        assert!(copy.path.exists());
        assert!(copy.path.starts_with(dir.path().join("scratch")));
        assert_ne!(copy.path, src);

        let again = resolver.resolve(&asset(src, 1200, 900)).await;
        assert_eq!(again, copy);
    }

    #[tokio::test]
    async fn regenerates_when_scratch_file_disappears() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("photo.jpg");
        write_source(&src, 400, 400);
        let mut resolver = WorkingCopyResolver::new(&fast_config(dir.path()));

        let copy = resolver.resolve(&asset(src.clone(), 400, 400)).await;
        std::fs::remove_file(&copy.path).unwrap();

        let again = resolver.resolve(&asset(src, 400, 400)).await;
        assert!(again.path.exists());
    }

    #[tokio::test]
    async fn falls_back_to_raw_source_when_scratch_is_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("photo.jpg");
        write_source(&src, 640, 480);
        // A file where the scratch directory should be makes every
        // generation attempt fail at the write step.
        std::fs::write(dir.path().join("scratch"), b"not a directory").unwrap();
        let mut resolver = WorkingCopyResolver::new(&fast_config(dir.path()));

        let copy = resolver.resolve(&asset(src.clone(), 640, 480)).await;
        assert_eq!(copy.path, src);
        assert_eq!((copy.width, copy.height), (640, 480));
    }

    #[tokio::test]
    async fn missing_source_degrades_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = WorkingCopyResolver::new(&fast_config(dir.path()));

        let copy = resolver
            .resolve(&asset(dir.path().join("gone.jpg"), 4000, 3000))
            .await;
        assert_eq!((copy.width, copy.height), (1, 1));
    }
}
