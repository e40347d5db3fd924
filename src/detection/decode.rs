//! Raw model output → candidate boxes in model-input pixels.

use ndarray::{ArrayD, ArrayView4};
use tracing::{debug, warn};

use crate::detection::backend::RawOutput;
use crate::error::DetectError;
use crate::models::{Candidate, InputSize, Rect};

/// Converts one detector family's raw output into an unfiltered candidate list
pub trait DecodeStrategy: Send + Sync + std::fmt::Debug {
    fn decode(&self, raw: &RawOutput, input: InputSize) -> Result<Vec<Candidate>, DetectError>;

    /// Human-readable name (used in logs)
    fn name(&self) -> &str;
}

/// SSD-style output: boxes, scores, class indices and a valid-box count,
/// already regressed by the backend.
#[derive(Debug, Clone)]
pub struct DirectRegressionDecoder {
    pub class_offset: i64,
    pub class_count: usize,
}

impl DecodeStrategy for DirectRegressionDecoder {
    fn decode(&self, raw: &RawOutput, input: InputSize) -> Result<Vec<Candidate>, DetectError> {
        let [boxes, scores, classes, count] = match raw.tensors.as_slice() {
            [b, s, c, n, ..] => [b, s, c, n].map(flatten),
            other => {
                return Err(DetectError::DecodeError(format!(
                    "expected boxes, scores, classes and count tensors, got {}",
                    other.len()
                )));
            }
        };

        if boxes.len() % 4 != 0 {
            return Err(DetectError::DecodeError(format!(
                "box tensor length {} is not a multiple of 4",
                boxes.len()
            )));
        }
        let total = boxes.len() / 4;
        if scores.len() != total || classes.len() != total {
            return Err(DetectError::DecodeError(format!(
                "{} boxes but {} scores and {} classes",
                total,
                scores.len(),
                classes.len()
            )));
        }

        let valid = match count.first() {
            Some(n) if *n >= 0.0 && (n.round() as usize) <= total => n.round() as usize,
            Some(n) => {
                return Err(DetectError::DecodeError(format!(
                    "valid count {} outside 0..={}",
                    n, total
                )));
            }
            None => return Err(DetectError::DecodeError("empty count tensor".to_string())),
        };

        let (h, w) = (input.height as f64, input.width as f64);
        let mut candidates = Vec::with_capacity(valid);
        for i in 0..valid {
            let b = &boxes[i * 4..i * 4 + 4];
            // backend order is (top, left, bottom, right)
            let (top, left, bottom, right) = (
                b[0] as f64 * h,
                b[1] as f64 * w,
                b[2] as f64 * h,
                b[3] as f64 * w,
            );

            let class = classes[i].round() as i64 - self.class_offset;
            if class < 0 || class as usize >= self.class_count {
                warn!(
                    index = i,
                    raw_class = classes[i],
                    class_count = self.class_count,
                    "skipping box with unknown class"
                );
                continue;
            }
            if ![top, left, bottom, right].iter().all(|v| v.is_finite()) {
                warn!(index = i, "skipping box with non-finite corners");
                continue;
            }

            candidates.push(Candidate {
                bbox: Rect::from_corners(left, top, right, bottom),
                class_id: class as usize,
                score: scores[i],
            });
        }

        debug!(valid, kept = candidates.len(), total, "direct-regression decode");
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "Direct Regression"
    }
}

/// Single grid head with softmax class probabilities. Anchors are in grid
/// cell units.
#[derive(Debug, Clone)]
pub struct GridAnchorDecoder {
    pub anchors: Vec<[f32; 2]>,
    pub class_count: usize,
}

impl DecodeStrategy for GridAnchorDecoder {
    fn decode(&self, raw: &RawOutput, input: InputSize) -> Result<Vec<Candidate>, DetectError> {
        let tensor = raw
            .tensors
            .first()
            .ok_or_else(|| DetectError::DecodeError("no output tensor".to_string()))?;

        let mut candidates = Vec::new();
        decode_head(
            tensor,
            &self.anchors,
            self.class_count,
            HeadKind::GridNormalized,
            input,
            &mut candidates,
        )?;

        debug!(candidates = candidates.len(), "grid-anchor decode");
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "Grid Anchor"
    }
}

/// Several grid heads at different resolutions, each with its own anchors
/// (in input pixels) and independent per-class sigmoid confidences.
#[derive(Debug, Clone)]
pub struct MultiScaleGridDecoder {
    pub heads: Vec<Vec<[f32; 2]>>,
    pub class_count: usize,
}

impl DecodeStrategy for MultiScaleGridDecoder {
    fn decode(&self, raw: &RawOutput, input: InputSize) -> Result<Vec<Candidate>, DetectError> {
        if raw.tensors.len() != self.heads.len() {
            return Err(DetectError::DecodeError(format!(
                "expected {} detection heads, got {}",
                self.heads.len(),
                raw.tensors.len()
            )));
        }

        let mut candidates = Vec::new();
        for (tensor, anchors) in raw.tensors.iter().zip(&self.heads) {
            decode_head(
                tensor,
                anchors,
                self.class_count,
                HeadKind::InputNormalized,
                input,
                &mut candidates,
            )?;
        }

        debug!(
            heads = self.heads.len(),
            candidates = candidates.len(),
            "multi-scale decode"
        );
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "Multi-Scale Grid Anchor"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadKind {
    /// Box sizes divided by the grid size, softmax over classes
    GridNormalized,
    /// Box sizes divided by the input size, sigmoid per class
    InputNormalized,
}

fn flatten(tensor: &ArrayD<f32>) -> Vec<f32> {
    tensor.iter().copied().collect()
}

/// Decode one `[gridH, gridW, anchors, 5 + classes]` head, appending one
/// candidate per cell and anchor.
fn decode_head(
    tensor: &ArrayD<f32>,
    anchors: &[[f32; 2]],
    class_count: usize,
    kind: HeadKind,
    input: InputSize,
    out: &mut Vec<Candidate>,
) -> Result<(), DetectError> {
    let depth = 5 + class_count;
    let n = anchors.len();
    let (grid_h, grid_w) = match *tensor.shape() {
        [gh, gw, a, d] | [1, gh, gw, a, d] if a == n && d == depth => (gh, gw),
        [gh, gw, c] | [1, gh, gw, c] if c == n * depth => (gh, gw),
        _ => {
            return Err(DetectError::DecodeError(format!(
                "expected grid head [H, W, {}x{}], got {:?}",
                n,
                depth,
                tensor.shape()
            )));
        }
    };

    let data = tensor.as_standard_layout();
    let head: ArrayView4<f32> = data
        .view()
        .into_shape_with_order((grid_h, grid_w, n, depth))
        .map_err(|e| DetectError::DecodeError(e.to_string()))?;

    let (size_w, size_h) = match kind {
        HeadKind::GridNormalized => (grid_w as f64, grid_h as f64),
        HeadKind::InputNormalized => (input.width as f64, input.height as f64),
    };
    let (in_w, in_h) = (input.width as f64, input.height as f64);
    let mut probs = vec![0.0f32; class_count];
    let mut skipped = 0usize;

    out.reserve(grid_h * grid_w * n);
    for r in 0..grid_h {
        for c in 0..grid_w {
            for (a, anchor) in anchors.iter().enumerate() {
                let at = |k: usize| head[[r, c, a, k]];

                let cx = (sigmoid(at(0)) as f64 + c as f64) / grid_w as f64;
                let cy = (sigmoid(at(1)) as f64 + r as f64) / grid_h as f64;
                let bw = (at(2) as f64).exp() * anchor[0] as f64 / size_w;
                let bh = (at(3) as f64).exp() * anchor[1] as f64 / size_h;
                let objectness = sigmoid(at(4));

                let (left, top) = ((cx - bw / 2.0) * in_w, (cy - bh / 2.0) * in_h);
                let (right, bottom) = ((cx + bw / 2.0) * in_w, (cy + bh / 2.0) * in_h);
                // huge size logits overflow even in f64; such boxes carry no position
                if ![left, top, right, bottom].iter().all(|v| v.is_finite()) {
                    skipped += 1;
                    continue;
                }

                for (k, p) in probs.iter_mut().enumerate() {
                    *p = at(5 + k);
                }
                match kind {
                    HeadKind::GridNormalized => softmax_in_place(&mut probs),
                    HeadKind::InputNormalized => probs.iter_mut().for_each(|p| *p = sigmoid(*p)),
                }
                let (class_id, prob) = argmax(&probs);

                out.push(Candidate {
                    bbox: Rect::from_corners(left, top, right, bottom),
                    class_id,
                    score: objectness * prob,
                });
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "dropped grid boxes with non-finite corners");
    }
    Ok(())
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax_in_place(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    }
}

/// First index of the largest value
fn argmax(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}
