//! Bounding-box geometry for annotated regions.
//!
//! Annotators draw boxes by dragging, so width and height are signed: a
//! negative extent anchors the box at the opposite corner. Every pixel-space
//! operation must go through [`BoundingBox::normalized`] first. The
//! normalized form is never written back to storage.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A box in canvas coordinates as authored by the annotator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A non-empty crop window in whole pixels.
///
/// The origin may lie off the canvas; the part of the window outside the
/// canvas renders as background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Parse a stored bounding box.
    ///
    /// Boxes are persisted as raw JSON, so a record can carry a box with
    /// missing or non-numeric fields. Those fail here with
    /// [`CoreError::Validation`] and the caller skips the detail.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        let obj = value.as_object().ok_or_else(|| {
            CoreError::Validation("bounding box must be a JSON object".to_string())
        })?;

        let field = |name: &str| -> Result<f64, CoreError> {
            let n = obj
                .get(name)
                .and_then(serde_json::Value::as_f64)
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "bounding box field '{name}' is missing or not a number"
                    ))
                })?;
            if !n.is_finite() {
                return Err(CoreError::Validation(format!(
                    "bounding box field '{name}' must be finite"
                )));
            }
            Ok(n)
        };

        Ok(Self::new(
            field("x")?,
            field("y")?,
            field("width")?,
            field("height")?,
        ))
    }

    /// Canonicalize the sign of the extents.
    ///
    /// A negative width shifts `x` by that width and flips the width
    /// positive; height is handled the same way against `y`.
    pub fn normalized(self) -> Self {
        let (x, width) = if self.width < 0.0 {
            (self.x + self.width, self.width.abs())
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0.0 {
            (self.y + self.height, self.height.abs())
        } else {
            (self.y, self.height)
        };
        Self::new(x, y, width, height)
    }

    /// Normalize and convert to a pixel window for a
    /// `canvas_width` x `canvas_height` canvas.
    ///
    /// Edges are rounded to the nearest pixel and the extent is capped at
    /// the canvas size. The window keeps its size even where it hangs off
    /// the canvas. The origin is clamped so a window far off the canvas
    /// sits just outside its edge. Returns `None` for a zero-area box.
    pub fn to_pixel_region(self, canvas_width: u32, canvas_height: u32) -> Option<PixelRegion> {
        let b = self.normalized();

        let extent = |v: f64, max: u32| v.round().clamp(0.0, f64::from(max)) as u32;
        let width = extent(b.width, canvas_width);
        let height = extent(b.height, canvas_height);

        if width == 0 || height == 0 {
            return None;
        }

        let origin = |v: f64, size: u32, max: u32| {
            v.round().clamp(-f64::from(size), f64::from(max)) as i64
        };

        Some(PixelRegion {
            x: origin(b.x, width, canvas_width),
            y: origin(b.y, height, canvas_height),
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn normalizes_negative_extents() {
        let b = BoundingBox::new(10.0, 10.0, -5.0, -5.0).normalized();
        assert_eq!(b, BoundingBox::new(5.0, 5.0, 5.0, 5.0));
    }

    #[test]
    fn normalizes_negative_width_only() {
        let b = BoundingBox::new(0.0, 0.0, -10.0, 20.0).normalized();
        assert_eq!(b, BoundingBox::new(-10.0, 0.0, 10.0, 20.0));
    }

    #[test]
    fn positive_box_is_unchanged() {
        let b = BoundingBox::new(3.0, 4.0, 5.0, 6.0);
        assert_eq!(b.normalized(), b);
    }

    #[test]
    fn parses_numeric_fields() {
        let b = BoundingBox::from_json(&json!({"x": 1, "y": 2.5, "width": -3, "height": 4})).unwrap();
        assert_eq!(b, BoundingBox::new(1.0, 2.5, -3.0, 4.0));
    }

    #[test]
    fn rejects_missing_field() {
        let err = BoundingBox::from_json(&json!({"x": 1, "y": 2, "width": 3})).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("height"));
    }

    #[test]
    fn rejects_non_numeric_field() {
        let err = BoundingBox::from_json(&json!({"x": "1", "y": 2, "width": 3, "height": 4}));
        assert_matches!(err, Err(CoreError::Validation(_)));
    }

    #[test]
    fn rejects_non_object() {
        assert_matches!(
            BoundingBox::from_json(&serde_json::Value::Null),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn pixel_region_inside_canvas() {
        let r = BoundingBox::new(10.0, 20.0, 30.0, 40.0)
            .to_pixel_region(800, 600)
            .unwrap();
        assert_eq!(
            r,
            PixelRegion {
                x: 10,
                y: 20,
                width: 30,
                height: 40
            }
        );
    }

    #[test]
    fn pixel_region_keeps_size_off_canvas() {
        // Dragged left from the origin: the whole window lies left of the canvas.
        let r = BoundingBox::new(0.0, 0.0, -10.0, 20.0)
            .to_pixel_region(800, 600)
            .unwrap();
        assert_eq!(
            r,
            PixelRegion {
                x: -10,
                y: 0,
                width: 10,
                height: 20
            }
        );
    }

    #[test]
    fn pixel_region_extent_is_capped_at_canvas() {
        let r = BoundingBox::new(-100.0, 0.0, 5000.0, 50.4)
            .to_pixel_region(800, 600)
            .unwrap();
        assert_eq!((r.x, r.width, r.height), (-100, 800, 50));
    }

    #[test]
    fn far_off_canvas_origin_is_clamped_to_edge() {
        let r = BoundingBox::new(-1e300, 1e300, 10.0, 10.0)
            .to_pixel_region(800, 600)
            .unwrap();
        assert_eq!(
            r,
            PixelRegion {
                x: -10,
                y: 600,
                width: 10,
                height: 10
            }
        );
    }

    #[test]
    fn zero_area_box_is_none() {
        assert!(BoundingBox::new(10.0, 10.0, 0.0, 50.0)
            .to_pixel_region(800, 600)
            .is_none());
        assert!(BoundingBox::new(10.0, 10.0, 30.0, 0.2)
            .to_pixel_region(800, 600)
            .is_none());
    }
}
