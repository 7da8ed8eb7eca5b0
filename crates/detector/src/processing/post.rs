use crate::backend::InferenceOutput;
use crate::labels::LabelTable;
use crate::types::{ClassScore, Detection, NormalizedBox, Observation};
use common::span_debug;
use ndarray::{ArrayD, ArrayView2, Axis, Ix2};

pub struct PostProcessor {
    pub confidence_threshold: f32,
    labels: LabelTable,
}

impl PostProcessor {
    pub fn new(confidence_threshold: f32, labels: LabelTable) -> Self {
        Self {
            confidence_threshold,
            labels,
        }
    }

    /// Turn NMS-filtered model rows into observations with ranked labels.
    ///
    /// Rows whose best class score falls below the confidence threshold are
    /// dropped. Boxes are converted to bottom-left origin unit space.
    pub fn decode_observations(&self, output: &InferenceOutput) -> anyhow::Result<Vec<Observation>> {
        let _s = span_debug!("decode_observations");

        let confidence = rows_2d(&output.confidence, "confidence")?;
        let coordinates = rows_2d(&output.coordinates, "coordinates")?;

        let num_rows = confidence.nrows();
        if coordinates.nrows() != num_rows {
            anyhow::bail!(
                "Output row mismatch: {} confidence rows, {} coordinate rows",
                num_rows,
                coordinates.nrows()
            );
        }
        if coordinates.ncols() != 4 {
            anyhow::bail!(
                "Expected 4 box coordinates per row, got {}",
                coordinates.ncols()
            );
        }

        let mut observations = Vec::with_capacity(num_rows);

        for (scores, bbox) in confidence.outer_iter().zip(coordinates.outer_iter()) {
            let mut labels: Vec<ClassScore> = scores
                .iter()
                .enumerate()
                .map(|(class_idx, &score)| ClassScore {
                    identifier: self.labels.name(class_idx),
                    confidence: score.clamp(0.0, 1.0),
                })
                .collect();

            // Stable sort keeps class order for ties
            labels.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

            match labels.first() {
                Some(top) if top.confidence >= self.confidence_threshold => {}
                _ => continue,
            }

            observations.push(Observation {
                labels,
                bounding_box: NormalizedBox::from_top_left_cxcywh(
                    bbox[0], bbox[1], bbox[2], bbox[3],
                ),
            });
        }

        tracing::trace!(
            rows = num_rows,
            kept = observations.len(),
            "Decoded observations"
        );

        Ok(observations)
    }

    /// Pixel-space detections relative to the original image size.
    pub fn to_detections(
        &self,
        observations: &[Observation],
        image_width: u32,
        image_height: u32,
    ) -> Vec<Detection> {
        observations
            .iter()
            .filter_map(|obs| obs.to_detection(image_width, image_height))
            .collect()
    }
}

/// View an output as `[rows, cols]`, dropping a leading batch axis of one.
fn rows_2d<'a>(array: &'a ArrayD<f32>, name: &str) -> anyhow::Result<ArrayView2<'a, f32>> {
    let view = match array.shape() {
        [_, _] => array.view(),
        [1, _, _] => array.index_axis(Axis(0), 0),
        shape => anyhow::bail!("Unexpected `{}` output shape {:?}", name, shape),
    };
    Ok(view.into_dimensionality::<Ix2>()?)
}
