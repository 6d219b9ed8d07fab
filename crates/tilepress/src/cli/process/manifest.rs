//! Collection loading: order manifests and directory discovery.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tilepress_core::{oriented_dimensions, PhotoEdits, PhotoRecord, SourceAsset};
use walkdir::WalkDir;

/// Extensions accepted when discovering photos.
const SUPPORTED_FORMATS: &[&str] = &["jpg", "jpeg", "png"];

/// One entry of an order manifest.
///
/// Only `uri` is required: missing ids are derived from the path and missing
/// dimensions are probed from the file header.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry {
    uri: PathBuf,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    edits: Option<PhotoEdits>,
}

/// Load the photo collection named by `input`.
///
/// `input` may be a JSON order manifest, a single photo, or a directory that
/// is scanned recursively. Entries whose dimensions cannot be determined are
/// skipped with a warning rather than failing the whole collection.
pub fn load_collection(input: &Path) -> anyhow::Result<Vec<PhotoRecord>> {
    if input.is_dir() {
        return Ok(discover_directory(input));
    }
    if !input.is_file() {
        anyhow::bail!("Input not found: {}", input.display());
    }
    match input.extension().and_then(|e| e.to_str()) {
        Some("json") => load_manifest(input),
        _ if is_supported(input) => Ok(single_photo(input).into_iter().collect()),
        _ => anyhow::bail!(
            "Unsupported input {}: expected a .json manifest, a photo, or a directory",
            input.display()
        ),
    }
}

fn load_manifest(path: &Path) -> anyhow::Result<Vec<PhotoRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let entries: Vec<ManifestEntry> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse manifest {}", path.display()))?;

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let (width, height) = match (entry.width, entry.height) {
            (Some(w), Some(h)) => (w, h),
            _ => match probe_dimensions(&entry.uri) {
                Some(dims) => dims,
                None => {
                    tracing::warn!(
                        "Skipping {}: cannot determine dimensions",
                        entry.uri.display()
                    );
                    continue;
                }
            },
        };
        records.push(PhotoRecord {
            asset: SourceAsset {
                id: entry.id.unwrap_or_else(|| derive_id(&entry.uri)),
                uri: entry.uri,
                width,
                height,
            },
            edits: entry.edits,
        });
    }
    Ok(records)
}

fn discover_directory(dir: &Path) -> Vec<PhotoRecord> {
    let mut records = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_supported(path) {
            continue;
        }
        if let Some(record) = single_photo(path) {
            records.push(record);
        }
    }
    // Sort by uri for deterministic ordering
    records.sort_by(|a, b| a.asset.uri.cmp(&b.asset.uri));
    records
}

fn single_photo(path: &Path) -> Option<PhotoRecord> {
    let (width, height) = match probe_dimensions(path) {
        Some(dims) => dims,
        None => {
            tracing::warn!("Skipping {}: cannot read image header", path.display());
            return None;
        }
    };
    Some(PhotoRecord {
        asset: SourceAsset {
            id: derive_id(path),
            uri: path.to_path_buf(),
            width,
            height,
        },
        edits: None,
    })
}

/// Read upright dimensions from the image header without decoding pixels.
///
/// Rotated captures (EXIF orientations 5 through 8) are recorded with their
/// width and height swapped so the session's crop math matches the upright
/// pixels the working copy and exporters see.
fn probe_dimensions(path: &Path) -> Option<(u32, u32)> {
    oriented_dimensions(path)
}

/// Stable asset id derived from the photo's path.
fn derive_id(path: &Path) -> String {
    let hex = blake3::hash(path.to_string_lossy().as_bytes())
        .to_hex()
        .to_string();
    hex[..16].to_string()
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            SUPPORTED_FORMATS.iter().any(|fmt| *fmt == ext_lower)
        })
        .unwrap_or(false)
}
