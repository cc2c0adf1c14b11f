// ============================================================
// Layer 5 — Scoring Statistics
// ============================================================
// Small numeric helpers shared by the reducer and the trainer:
// Pearson correlation, R², accuracy and column means.

/// Pearson correlation coefficient.
///
/// Returns `None` when either side has zero variance or the
/// slices are shorter than two, where r is undefined.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some(sxy / denom)
}

/// Coefficient of determination.
///
/// A constant target gives 1.0 for a perfect fit and 0.0 otherwise,
/// matching scikit-learn's `r2_score`.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let m = mean(y_true);
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - m).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// R² per output column of row-major targets, plus their uniform mean.
pub fn r2_multi(y_true: &[Vec<f64>], y_pred: &[Vec<f64>]) -> (Vec<f64>, f64) {
    let n_out = y_true.first().map(Vec::len).unwrap_or(0);
    let scores: Vec<f64> = (0..n_out)
        .map(|j| {
            let t: Vec<f64> = y_true.iter().map(|r| r[j]).collect();
            let p: Vec<f64> = y_pred.iter().map(|r| r[j]).collect();
            r2_score(&t, &p)
        })
        .collect();
    let avg = mean(&scores);
    (scores, avg)
}

pub fn accuracy<T: PartialEq>(y_true: &[T], y_pred: &[T]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    correct as f64 / y_true.len() as f64
}

pub fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        0.0
    } else {
        v.iter().sum::<f64>() / v.len() as f64
    }
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
