#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use tract_onnx::prelude::tract_ndarray::{ArrayView3, Ix3};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::postprocess::non_max_suppression;
use crate::detect::result::{BoundingBox, Detection, DetectionSet};

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// The image is stretched to the model input size, so reported boxes live in
/// model-input coordinates. Loading happens once; inference only reads the plan.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
        })
    }

    /// Override the default confidence and NMS thresholds.
    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    fn build_input(&self, image: &DynamicImage) -> Tensor {
        let rgb = image
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgb8();
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| rgb.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>) -> Result<DetectionSet> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<Ix3>()
            .context("model output must be [batch, features, anchors]")?;
        decode_output(view, self.confidence_threshold, self.iou_threshold)
    }
}

/// Turn a raw YOLO head into corner boxes in model-input coordinates.
///
/// Accepts `[1, 4+nc, anchors]` or its transpose. Each anchor keeps its best
/// class score; anchors below `confidence_threshold` are dropped before NMS.
pub(crate) fn decode_output(
    view: ArrayView3<'_, f32>,
    confidence_threshold: f32,
    iou_threshold: f32,
) -> Result<DetectionSet> {
    let shape = view.shape();
    if shape[0] != 1 {
        return Err(anyhow!("expected batch size 1, got {}", shape[0]));
    }

    // Anchors outnumber features in any real export.
    let transposed = shape[1] > shape[2];
    let (features, anchors) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if features <= 4 {
        return Err(anyhow!(
            "model output has {} features, expected box + class scores",
            features
        ));
    }
    let at = |feature: usize, anchor: usize| {
        if transposed {
            view[[0, anchor, feature]]
        } else {
            view[[0, feature, anchor]]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..features)
            .map(|feature| (feature - 4, at(feature, anchor)))
            .fold((0usize, f32::NEG_INFINITY), |best, current| {
                if current.1 > best.1 {
                    current
                } else {
                    best
                }
            });
        if !score.is_finite() || score < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        if !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite()) {
            continue;
        }
        if w <= 0.0 || h <= 0.0 {
            continue;
        }

        candidates.push(Detection::new(
            class_id as u32,
            score.min(1.0),
            BoundingBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0),
        ));
    }

    Ok(DetectionSet::new(non_max_suppression(
        candidates,
        iou_threshold,
    )))
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn detect(&self, image: &DynamicImage) -> Result<DetectionSet> {
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs)
    }

    fn warm_up(&self) -> Result<()> {
        let blank = DynamicImage::new_rgb8(self.width, self.height);
        self.detect(&blank).map(|_| ())
    }
}
