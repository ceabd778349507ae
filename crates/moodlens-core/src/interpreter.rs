//! Turn classifier logits into a labelled probability.

use crate::types::{ClassLabels, DetectionResult};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum InterpretError {
    #[error("classifier returned no scores")]
    Empty,
    #[error("logit {index} is not finite: {value}")]
    NonFinite { index: usize, value: f32 },
}

/// Numerically stable softmax: the maximum logit is subtracted before
/// exponentiating, so large logits cannot overflow.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>, InterpretError> {
    if logits.is_empty() {
        return Err(InterpretError::Empty);
    }
    if let Some((index, &value)) = logits.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(InterpretError::NonFinite { index, value });
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    // The max entry contributes exp(0) = 1, so the sum is never below 1.
    let sum: f32 = exps.iter().sum();

    Ok(exps.into_iter().map(|e| e / sum).collect())
}

/// Index of the largest probability; the first occurrence wins on ties.
fn argmax(probs: &[f32]) -> usize {
    let mut best = 0;
    for (i, &p) in probs.iter().enumerate().skip(1) {
        if p > probs[best] {
            best = i;
        }
    }
    best
}

/// Softmax the logits, pick the top class and look up its label.
pub fn interpret(logits: &[f32], labels: &ClassLabels) -> Result<DetectionResult, InterpretError> {
    let probs = softmax(logits)?;
    let best = argmax(&probs);

    Ok(DetectionResult {
        label: labels.label_for(best),
        confidence: probs[best].clamp(0.0, 1.0),
    })
}
