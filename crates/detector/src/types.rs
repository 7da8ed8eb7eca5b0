/// Bounding box in the unit square with a bottom-left origin, y pointing up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedBox {
    /// Converts a model box given as normalized center/size with a top-left
    /// origin into bottom-left origin space.
    pub fn from_top_left_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        let width = w.max(0.0);
        let height = h.max(0.0);
        Self {
            x: cx - width / 2.0,
            y: 1.0 - (cy + height / 2.0),
            width,
            height,
        }
    }

    /// Scales to pixels and flips the Y axis so the origin is top-left.
    pub fn to_pixel_box(&self, image_width: u32, image_height: u32) -> PixelBox {
        let w = image_width as f32;
        let h = image_height as f32;
        PixelBox {
            x: self.x * w,
            y: (1.0 - self.y - self.height) * h,
            width: self.width * w,
            height: self.height * h,
        }
    }
}

/// Bounding box in pixels, top-left origin, y pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassScore {
    pub identifier: String,
    pub confidence: f32,
}

/// One recognized object before normalization. `labels` is sorted by
/// descending confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub labels: Vec<ClassScore>,
    pub bounding_box: NormalizedBox,
}

impl Observation {
    pub fn top_label(&self) -> Option<&ClassScore> {
        self.labels.first()
    }

    /// `None` when the observation carries no labels.
    pub fn to_detection(&self, image_width: u32, image_height: u32) -> Option<Detection> {
        let top = self.top_label()?;
        Some(Detection::new(
            top.identifier.clone(),
            top.confidence,
            self.bounding_box.to_pixel_box(image_width, image_height),
        ))
    }
}

/// Detection result in pixel coordinates of the original image.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Detection {
    pub fn new(label: String, confidence: f32, bbox: PixelBox) -> Self {
        Self {
            label,
            confidence,
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32, what: &str) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "{what}: expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_pixel_conversion_flips_y_axis() {
        let bbox = NormalizedBox {
            x: 0.1,
            y: 0.2,
            width: 0.3,
            height: 0.4,
        };

        let px = bbox.to_pixel_box(100, 200);

        assert_close(px.x, 10.0, "x");
        assert_close(px.y, 80.0, "y");
        assert_close(px.width, 30.0, "width");
        assert_close(px.height, 80.0, "height");
    }

    #[test]
    fn test_box_touching_bottom_edge_maps_to_image_bottom() {
        // y = 0 in bottom-left space is the last pixel row in top-left space
        let bbox = NormalizedBox {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 0.25,
        };
        let px = bbox.to_pixel_box(640, 480);
        assert_close(px.y, 360.0, "y");
        assert_close(px.y + px.height, 480.0, "bottom edge");
    }

    #[test]
    fn test_from_top_left_cxcywh_round_trips_to_pixels() {
        // Model box: centered at (0.5, 0.25), 0.2 x 0.1, top-left origin
        let bbox = NormalizedBox::from_top_left_cxcywh(0.5, 0.25, 0.2, 0.1);
        assert_close(bbox.x, 0.4, "x");
        assert_close(bbox.y, 0.7, "y");

        // Back in top-left pixels the box starts at 0.2 of the height
        let px = bbox.to_pixel_box(1000, 1000);
        assert_close(px.x, 400.0, "x");
        assert_close(px.y, 200.0, "y");
        assert_close(px.width, 200.0, "width");
        assert_close(px.height, 100.0, "height");
    }

    #[test]
    fn test_negative_extent_is_clamped() {
        let bbox = NormalizedBox::from_top_left_cxcywh(0.5, 0.5, -0.1, 0.2);
        assert_eq!(bbox.width, 0.0);
        assert_close(bbox.height, 0.2, "height");
    }

    #[test]
    fn test_observation_uses_top_label() {
        let observation = Observation {
            labels: vec![
                ClassScore {
                    identifier: "Hardhat".to_string(),
                    confidence: 0.9,
                },
                ClassScore {
                    identifier: "NO-Hardhat".to_string(),
                    confidence: 0.05,
                },
            ],
            bounding_box: NormalizedBox {
                x: 0.0,
                y: 0.5,
                width: 0.5,
                height: 0.5,
            },
        };

        let detection = observation.to_detection(10, 10).unwrap();
        assert_eq!(detection.label, "Hardhat");
        assert_close(detection.confidence, 0.9, "confidence");
        assert_close(detection.y, 0.0, "y");
    }

    #[test]
    fn test_observation_without_labels_is_skipped() {
        let observation = Observation {
            labels: vec![],
            bounding_box: NormalizedBox {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            },
        };
        assert!(observation.to_detection(10, 10).is_none());
    }
}
