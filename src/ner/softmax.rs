//! Probability helpers for per-token logits.

/// Numerically stable softmax.
///
/// The row maximum is subtracted before exponentiating. NaN entries get
/// probability zero; if any entry is `+inf` the mass is spread evenly over
/// those entries; a row with nothing finite (all `-inf`/NaN) comes back
/// all-zero.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max = logits
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f32::NEG_INFINITY, f32::max);

    if max == f32::NEG_INFINITY {
        return vec![0.0; logits.len()];
    }

    if max == f32::INFINITY {
        let hits = logits.iter().filter(|v| **v == f32::INFINITY).count() as f32;
        return logits
            .iter()
            .map(|&v| if v == f32::INFINITY { 1.0 / hits } else { 0.0 })
            .collect();
    }

    let exps: Vec<f32> = logits
        .iter()
        .map(|&v| if v.is_nan() { 0.0 } else { (v - max).exp() })
        .collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}

/// Index and value of the largest probability; ties go to the lowest index.
pub fn argmax(probs: &[f32]) -> Option<(usize, f32)> {
    probs
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ if p.is_nan() => best,
            _ => Some((i, p)),
        })
}
