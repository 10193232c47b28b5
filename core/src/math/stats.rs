pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    /// Trailing mean over at most `window` samples ending at each index.
    pub fn rolling_mean(samples: &[f64], window: usize) -> Vec<f64> {
        let window = window.max(1);
        let mut out = Vec::with_capacity(samples.len());
        let mut sum = 0.0;
        for (index, value) in samples.iter().enumerate() {
            sum += value;
            if index >= window {
                sum -= samples[index - window];
            }
            let count = (index + 1).min(window);
            out.push(sum / count as f64);
        }
        out
    }

    pub fn percent(count: usize, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        count as f64 * 100.0 / total as f64
    }

    /// Most frequent absolute step between consecutive values, smallest on ties.
    pub fn typical_step(values: &[i64]) -> Option<i64> {
        let mut counts = std::collections::BTreeMap::new();
        for pair in values.windows(2) {
            let step = (pair[1] - pair[0]).abs();
            if step > 0 {
                *counts.entry(step).or_insert(0usize) += 1;
            }
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(step, _)| step)
    }
}
