//! Preview and print raster production.
//!
//! Two pipelines with different quality goals: the preview cuts the crop out
//! of the working copy and bounds it to a small shareable edge; the print
//! master recomputes the crop against the full-resolution original and
//! resizes to an exact square at high quality. All decode and encode work
//! runs on blocking threads.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::DynamicImage;

use crate::config::{Config, ExportConfig};
use crate::error::{ExportError, ExportResult};
use crate::geometry;
use crate::types::{CropRect, ExportArtifact, SourceAsset, Transform, Viewport, WorkingCopy};

/// Produces shareable previews and print masters.
#[derive(Debug, Clone)]
pub struct ExportPipeline {
    export: ExportConfig,
    artifact_dir: PathBuf,
}

impl ExportPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            export: config.export.clone(),
            artifact_dir: config.artifact_dir(),
        }
    }

    /// Target path for an artifact of `kind` belonging to `asset_id`.
    ///
    /// Names are derived from a content-independent digest of the id, so
    /// re-exports overwrite their previous artifact instead of accumulating.
    pub fn artifact_path(&self, asset_id: &str, kind: &str) -> PathBuf {
        self.artifact_dir
            .join(format!("{}_{kind}.jpg", short_digest(asset_id)))
    }

    /// Produce the shareable preview from the working copy.
    ///
    /// `crop` is in source pixel space; it is carried proportionally into the
    /// working copy, cut, bounded to the preview edge (never upscaled), and
    /// encoded at preview quality.
    pub async fn export_preview(
        &self,
        working: &WorkingCopy,
        asset: &SourceAsset,
        crop: CropRect,
    ) -> ExportResult<ExportArtifact> {
        let start = std::time::Instant::now();
        let local = crop.scaled_to((asset.width, asset.height), (working.width, working.height));
        let src = working.path.clone();
        let out = self.artifact_path(&asset.id, "preview");
        let edge = self.export.preview_edge;
        let quality = self.export.preview_quality;

        let artifact = run_raster(move || {
            let img = open_oriented(&src)?;
            let img = crop_image(&img, local)?;
            let img = bound_long_edge(&img, edge);
            let (width, height) = (img.width(), img.height());
            write_jpeg(&img, &out, quality)?;
            Ok(ExportArtifact {
                uri: out,
                width,
                height,
            })
        })
        .await?;

        tracing::debug!(
            "preview for {} in {:?} -> {} ({}x{})",
            asset.id,
            start.elapsed(),
            artifact.uri.display(),
            artifact.width,
            artifact.height
        );
        Ok(artifact)
    }

    /// Produce the print master from the full-resolution original.
    ///
    /// The crop is recomputed here from the committed transform, so the print
    /// never inherits working-copy rounding. The result is an exact
    /// `print_size` square.
    pub async fn export_print(
        &self,
        asset: &SourceAsset,
        viewport: Viewport,
        window: f64,
        transform: Transform,
    ) -> ExportResult<ExportArtifact> {
        let start = std::time::Instant::now();
        let crop =
            geometry::map_to_source_rect(asset.width, asset.height, viewport, window, transform);
        let src = asset.uri.clone();
        let out = self.artifact_path(&asset.id, "print");
        let recorded = (asset.width, asset.height);
        let size = self.export.print_size;
        let quality = self.export.print_quality;

        let artifact = run_raster(move || {
            let img = open_oriented(&src)?;
            // Recorded dimensions can drift from the decoded file; remap the
            // crop proportionally into what the decoder actually produced.
            let local = crop.scaled_to(recorded, (img.width(), img.height()));
            let img = crop_image(&img, local)?;
            let img = img.resize_exact(size, size, FilterType::Lanczos3);
            write_jpeg(&img, &out, quality)?;
            Ok(ExportArtifact {
                uri: out,
                width: size,
                height: size,
            })
        })
        .await?;

        tracing::debug!(
            "print for {} in {:?} -> {} ({}x{} from {:?})",
            asset.id,
            start.elapsed(),
            artifact.uri.display(),
            artifact.width,
            artifact.height,
            crop
        );
        Ok(artifact)
    }
}

/// Run CPU-bound raster work on the blocking pool.
async fn run_raster<T, F>(f: F) -> ExportResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ExportResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ExportError::Join(e.to_string()))?
}

/// Decode an image and normalize EXIF rotation to upright pixels.
pub(crate) fn open_oriented(path: &Path) -> ExportResult<DynamicImage> {
    let img = image::open(path).map_err(|e| ExportError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(match read_orientation(path) {
        Some(o) if o > 1 => apply_orientation(img, o),
        _ => img,
    })
}

/// Upright dimensions from the image header, honoring EXIF rotation.
///
/// Orientations 5 through 8 transpose the pixel grid, so the header width and
/// height are swapped to match what [`open_oriented`] decodes. Recorded asset
/// dimensions must come from here, not from the raw header, or crops computed
/// against them land sideways on the upright pixels.
pub fn oriented_dimensions(path: &Path) -> Option<(u32, u32)> {
    let (width, height) = image::image_dimensions(path).ok()?;
    match read_orientation(path) {
        Some(o) if (5..=8).contains(&o) => Some((height, width)),
        _ => Some((width, height)),
    }
}

/// EXIF orientation tag value, if the file carries one.
pub(crate) fn read_orientation(path: &Path) -> Option<u32> {
    let file = std::fs::File::open(path).ok()?;
    let mut reader = std::io::BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| match &f.value {
            exif::Value::Short(v) => v.first().map(|&x| x as u32),
            exif::Value::Long(v) => v.first().copied(),
            _ => None,
        })
}

/// Apply one of the eight EXIF orientations.
pub(crate) fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// JPEG APP1 block holding a single EXIF orientation entry, spliced after the
/// SOI marker to tag fixture files.
#[cfg(test)]
pub(crate) fn exif_orientation_segment(orientation: u8) -> Vec<u8> {
    let mut seg = vec![0xFF, 0xE1, 0x00, 0x22];
    seg.extend_from_slice(b"Exif\0\0");
    // Little-endian TIFF header, first IFD at offset 8.
    seg.extend_from_slice(&[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]);
    // One entry: tag 0x0112, type SHORT, count 1, then no further IFD.
    seg.extend_from_slice(&[0x01, 0x00]);
    seg.extend_from_slice(&[0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00]);
    seg.extend_from_slice(&[orientation, 0x00, 0x00, 0x00]);
    seg.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    seg
}

/// Short filename-safe digest of an asset id.
pub(crate) fn short_digest(input: &str) -> String {
    let digest = blake3::hash(input.as_bytes()).to_hex().to_string();
    digest[..16].to_string()
}

/// Cut a rectangle out of an image, rejecting out-of-bounds requests.
fn crop_image(img: &DynamicImage, crop: CropRect) -> ExportResult<DynamicImage> {
    let (w, h) = (img.width(), img.height());
    if crop.width == 0 || crop.height == 0 || crop.right() > w || crop.bottom() > h {
        return Err(ExportError::InvalidCrop {
            x: crop.x,
            y: crop.y,
            width: crop.width,
            height: crop.height,
            source_width: w,
            source_height: h,
        });
    }
    Ok(img.crop_imm(crop.x, crop.y, crop.width, crop.height))
}

/// Downscale so the longer edge is at most `max_edge`. Never upscales.
pub(crate) fn bound_long_edge(img: &DynamicImage, max_edge: u32) -> DynamicImage {
    if img.width().max(img.height()) <= max_edge {
        return img.clone();
    }
    img.resize(max_edge, max_edge, FilterType::Lanczos3)
}

/// Encode as JPEG at the given quality, creating parent directories.
pub(crate) fn write_jpeg(img: &DynamicImage, path: &Path, quality: u8) -> ExportResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ExportError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    let file = std::fs::File::create(path).map_err(|e| ExportError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, quality);
    encoder
        .encode_image(&img.to_rgb8())
        .map_err(|e| ExportError::Encode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}
