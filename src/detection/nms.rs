use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::Candidate;

/// Which accepted boxes a candidate is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionMode {
    /// Every accepted box, whatever its class
    #[default]
    CrossClass,
    /// Only accepted boxes with the same class id
    PerClass,
}

/// Greedy IoU-based non-max suppression
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonMaxSuppressor {
    pub iou_threshold: f32,
    pub prob_threshold: f32,
    pub mode: SuppressionMode,
}

impl NonMaxSuppressor {
    pub fn new(iou_threshold: f32, prob_threshold: f32) -> Self {
        Self {
            iou_threshold,
            prob_threshold,
            mode: SuppressionMode::CrossClass,
        }
    }

    pub fn with_mode(mut self, mode: SuppressionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Keep the highest-scoring boxes, dropping any box whose IoU with an
    /// already accepted box exceeds the threshold. Output is ordered by
    /// descending score.
    pub fn suppress(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let total = candidates.len();

        // NaN scores fail this comparison and are dropped with the rest
        let mut ranked: Vec<(usize, Candidate)> = candidates
            .into_iter()
            .enumerate()
            .filter(|(_, c)| c.score >= self.prob_threshold)
            .collect();
        let above_threshold = ranked.len();

        ranked.sort_by(|(ia, a), (ib, b)| b.score.total_cmp(&a.score).then(ia.cmp(ib)));

        let iou_threshold = self.iou_threshold as f64;
        let mut accepted: Vec<Candidate> = Vec::new();
        for (_, candidate) in ranked {
            let overlaps = accepted.iter().any(|kept| {
                let comparable = match self.mode {
                    SuppressionMode::CrossClass => true,
                    SuppressionMode::PerClass => kept.class_id == candidate.class_id,
                };
                comparable && kept.bbox.iou(&candidate.bbox) > iou_threshold
            });
            if !overlaps {
                accepted.push(candidate);
            }
        }

        debug!(
            total,
            above_threshold,
            kept = accepted.len(),
            mode = ?self.mode,
            "non-max suppression"
        );
        accepted
    }
}
