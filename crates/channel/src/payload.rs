//! Result payloads returned to the application shell.

use crate::value::EncodableValue;
use detector::{ComplianceReport, DetectError, Detection, ImageQuality};

pub fn detection_value(detection: &Detection) -> EncodableValue {
    EncodableValue::map([
        ("label", EncodableValue::from(detection.label.as_str())),
        ("confidence", detection.confidence.into()),
        ("x", detection.x.into()),
        ("y", detection.y.into()),
        ("width", detection.width.into()),
        ("height", detection.height.into()),
    ])
}

fn detections_list(detections: &[Detection]) -> EncodableValue {
    EncodableValue::List(detections.iter().map(detection_value).collect())
}

/// Adapter failures travel as `{error}` on the success path.
pub fn error_value(err: &DetectError) -> EncodableValue {
    EncodableValue::map([("error", EncodableValue::from(err.to_string()))])
}

/// `{detections: [...]}` or `{error: message}`.
pub fn detection_outcome(result: &Result<Vec<Detection>, DetectError>) -> EncodableValue {
    match result {
        Ok(detections) => EncodableValue::map([("detections", detections_list(detections))]),
        Err(e) => error_value(e),
    }
}

pub fn quality_value(quality: &ImageQuality) -> EncodableValue {
    EncodableValue::map([
        ("sharpness", quality.sharpness.into()),
        ("brightness", quality.brightness.into()),
        (
            "issues",
            EncodableValue::List(
                quality
                    .issues
                    .iter()
                    .map(|issue| EncodableValue::from(issue.description()))
                    .collect(),
            ),
        ),
        ("is_good", quality.is_good.into()),
    ])
}

pub fn validation_value(
    report: &ComplianceReport,
    quality: &ImageQuality,
    detections: &[Detection],
) -> EncodableValue {
    EncodableValue::map([
        ("success", report.success.into()),
        (
            "detected_items",
            EncodableValue::map([
                ("helmet", report.helmet.into()),
                ("vest", report.vest.into()),
            ]),
        ),
        (
            "missing_items",
            EncodableValue::List(
                report
                    .missing_items
                    .iter()
                    .map(|item| EncodableValue::from(item.as_str()))
                    .collect(),
            ),
        ),
        ("image_quality", quality_value(quality)),
        ("detections", detections_list(detections)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use detector::{PpeItem, QualityIssue};
    use serde_json::json;

    fn vest() -> Detection {
        Detection {
            label: "Safety Vest".to_string(),
            confidence: 0.5,
            x: 10.0,
            y: 80.0,
            width: 30.0,
            height: 80.0,
        }
    }

    #[test]
    fn test_detection_outcome_success() {
        let value = detection_outcome(&Ok(vec![vest()]));

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({ "detections": [{
                "label": "Safety Vest",
                "confidence": 0.5,
                "x": 10.0,
                "y": 80.0,
                "width": 30.0,
                "height": 80.0,
            }]})
        );
    }

    #[test]
    fn test_detection_outcome_failure_carries_message() {
        let value = detection_outcome(&Err(DetectError::ModelNotLoaded));

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({ "error": "Model not loaded" })
        );
    }

    #[test]
    fn test_validation_value_shape() {
        let report = ComplianceReport {
            success: false,
            helmet: false,
            vest: true,
            missing_items: vec![PpeItem::Helmet],
        };
        let quality = ImageQuality {
            sharpness: 42.0,
            brightness: 120.0,
            issues: vec![QualityIssue::VeryBlurry],
            is_good: false,
        };

        let value = validation_value(&report, &quality, &[vest()]);
        let json = serde_json::to_value(&value).unwrap();

        assert_eq!(json["success"], json!(false));
        assert_eq!(json["detected_items"], json!({ "helmet": false, "vest": true }));
        assert_eq!(json["missing_items"], json!(["helmet"]));
        assert_eq!(json["image_quality"]["issues"], json!(["Image is very blurry"]));
        assert_eq!(json["image_quality"]["is_good"], json!(false));
        assert_eq!(json["detections"].as_array().map(|d| d.len()), Some(1));
    }
}
