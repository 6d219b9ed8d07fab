//! The built-in filter catalog.
//!
//! Every filter is a 20-value RGBA color matrix, optionally followed by a
//! translucent tint overlay. The catalog is fixed at compile time; filters
//! are referenced everywhere else by id.

use serde::{Deserialize, Serialize};

/// Row-major RGBA color matrix: four rows of five values, one row per output
/// channel (`[r, g, b, a, offset]`). Channels and offsets are in normalized
/// 0..1 units.
pub type ColorMatrix = [f32; 20];

/// Id of the pass-through filter. Selecting it skips baking entirely.
pub const ORIGINAL_FILTER_ID: &str = "original";

#[rustfmt::skip]
const IDENTITY: ColorMatrix = [
    1.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 1.0, 0.0,
];

// Rec. 709 luma weights.
#[rustfmt::skip]
const NOIR: ColorMatrix = [
    0.2126, 0.7152, 0.0722, 0.0, 0.0,
    0.2126, 0.7152, 0.0722, 0.0, 0.0,
    0.2126, 0.7152, 0.0722, 0.0, 0.0,
    0.0,    0.0,    0.0,    1.0, 0.0,
];

#[rustfmt::skip]
const SEPIA: ColorMatrix = [
    0.393, 0.769, 0.189, 0.0, 0.0,
    0.349, 0.686, 0.168, 0.0, 0.0,
    0.272, 0.534, 0.131, 0.0, 0.0,
    0.0,   0.0,   0.0,   1.0, 0.0,
];

// Saturation 1.3 around the luma axis.
#[rustfmt::skip]
const VIVID: ColorMatrix = [
     1.2361, -0.2145, -0.0216, 0.0, 0.0,
    -0.0639,  1.0855, -0.0216, 0.0, 0.0,
    -0.0639, -0.2145,  1.2784, 0.0, 0.0,
     0.0,     0.0,     0.0,    1.0, 0.0,
];

// Lowered contrast with a lifted floor.
#[rustfmt::skip]
const FADE: ColorMatrix = [
    0.9, 0.0, 0.0, 0.0, 0.05,
    0.0, 0.9, 0.0, 0.0, 0.05,
    0.0, 0.0, 0.9, 0.0, 0.05,
    0.0, 0.0, 0.0, 1.0, 0.0,
];

#[rustfmt::skip]
const WARM: ColorMatrix = [
    1.06, 0.0,  0.0,  0.0, 0.0,
    0.0,  1.0,  0.0,  0.0, 0.0,
    0.0,  0.0,  0.94, 0.0, 0.0,
    0.0,  0.0,  0.0,  1.0, 0.0,
];

#[rustfmt::skip]
const COOL: ColorMatrix = [
    0.94, 0.0, 0.0,  0.0, 0.0,
    0.0,  1.0, 0.0,  0.0, 0.0,
    0.0,  0.0, 1.06, 0.0, 0.0,
    0.0,  0.0, 0.0,  1.0, 0.0,
];

/// A translucent solid-color layer composited over the filtered photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    /// RGB tint color.
    pub color: [u8; 3],
    /// Blend opacity in 0..1.
    pub opacity: f32,
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FilterDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub matrix: ColorMatrix,
    pub overlay: Option<Overlay>,
}

impl FilterDefinition {
    /// Whether this filter leaves pixels untouched (no bake needed).
    pub fn is_identity(&self) -> bool {
        self.id == ORIGINAL_FILTER_ID
    }

    /// Owned, serializable snapshot of the filter's parameters.
    pub fn params(&self) -> FilterParams {
        FilterParams {
            matrix: self.matrix,
            overlay: self.overlay,
        }
    }
}

/// Serializable filter parameters, recorded in patches so downstream
/// consumers can reproduce the look without the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    pub matrix: ColorMatrix,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<Overlay>,
}

const CATALOG: &[FilterDefinition] = &[
    FilterDefinition {
        id: ORIGINAL_FILTER_ID,
        label: "Original",
        matrix: IDENTITY,
        overlay: None,
    },
    FilterDefinition {
        id: "noir",
        label: "Noir",
        matrix: NOIR,
        overlay: None,
    },
    FilterDefinition {
        id: "sepia",
        label: "Sepia",
        matrix: SEPIA,
        overlay: None,
    },
    FilterDefinition {
        id: "vivid",
        label: "Vivid",
        matrix: VIVID,
        overlay: None,
    },
    FilterDefinition {
        id: "fade",
        label: "Fade",
        matrix: FADE,
        overlay: None,
    },
    FilterDefinition {
        id: "warm",
        label: "Warm",
        matrix: WARM,
        overlay: Some(Overlay {
            color: [255, 149, 64],
            opacity: 0.08,
        }),
    },
    FilterDefinition {
        id: "cool",
        label: "Cool",
        matrix: COOL,
        overlay: Some(Overlay {
            color: [64, 156, 255],
            opacity: 0.08,
        }),
    },
];

/// All built-in filters, in display order.
pub fn catalog() -> &'static [FilterDefinition] {
    CATALOG
}

/// Look up a filter by id.
pub fn find(id: &str) -> Option<&'static FilterDefinition> {
    CATALOG.iter().find(|f| f.id == id)
}

/// The pass-through filter.
pub fn original() -> &'static FilterDefinition {
    &CATALOG[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_unique() {
        let mut ids: Vec<&str> = CATALOG.iter().map(|f| f.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), CATALOG.len());
    }

    #[test]
    fn original_is_identity() {
        let f = find(ORIGINAL_FILTER_ID).unwrap();
        assert!(f.is_identity());
        assert_eq!(f.matrix, IDENTITY);
        assert!(f.overlay.is_none());
    }

    #[test]
    fn find_unknown_returns_none() {
        assert!(find("glow").is_none());
    }

    #[test]
    fn color_rows_preserve_white() {
        // Every filter maps pure white to a channel value near 1.0 before
        // the offset column, so highlights do not clip oddly.
        for f in catalog() {
            for row in 0..3 {
                let sum: f32 = f.matrix[row * 5..row * 5 + 3].iter().sum();
                assert!(
                    (0.8..=1.4).contains(&sum),
                    "filter {} row {} sums to {}",
                    f.id,
                    row,
                    sum
                );
            }
        }
    }

    #[test]
    fn alpha_rows_pass_through() {
        for f in catalog() {
            assert_eq!(&f.matrix[15..20], &[0.0, 0.0, 0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn overlay_opacities_are_translucent() {
        for f in catalog() {
            if let Some(o) = f.overlay {
                assert!(o.opacity > 0.0 && o.opacity < 1.0, "filter {}", f.id);
            }
        }
    }

    #[test]
    fn params_snapshot_round_trips() {
        let params = find("warm").unwrap().params();
        let json = serde_json::to_string(&params).unwrap();
        let back: FilterParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
        assert_eq!(back.overlay.unwrap().color, [255, 149, 64]);
    }
}
