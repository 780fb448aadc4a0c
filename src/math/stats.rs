use crate::field::{is_valid, MV};

/// Statistical operator applied to a window or neighbourhood of values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatType {
    Mean,
    /// Population standard deviation
    Std,
    /// Quantile on [0, 1]; min = 0, median = 0.5, max = 1
    Quantile(f32),
}

/// Compute `stat` over the valid entries of `values`
///
/// Missing values are dropped from `values` first (the buffer is reordered
/// in the process). Returns `MV` if nothing valid remains.
pub fn calculate_stat(values: &mut Vec<f32>, stat: StatType) -> f32 {
    values.retain(|&v| is_valid(v));
    if values.is_empty() {
        return MV;
    }

    match stat {
        StatType::Mean => mean(values) as f32,
        StatType::Std => {
            let mean = mean(values);
            let variance = values
                .iter()
                .map(|&v| (v as f64 - mean).powi(2))
                .sum::<f64>()
                / values.len() as f64;
            variance.sqrt() as f32
        }
        StatType::Quantile(q) => {
            values.sort_unstable_by(|a, b| a.total_cmp(b));
            quantile_sorted(values, q)
        }
    }
}

fn mean(values: &[f32]) -> f64 {
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

/// Linearly interpolated quantile of an ascending, non-empty slice
pub fn quantile_sorted(sorted: &[f32], q: f32) -> f32 {
    if !is_valid(q) || !(0.0..=1.0).contains(&q) {
        return MV;
    }
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let position = q as f64 * (n - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = position - lower as f64;
        (sorted[lower] as f64 + (sorted[upper] as f64 - sorted[lower] as f64) * frac) as f32
    }
}
