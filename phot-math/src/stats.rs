//! Statistical functions for background estimation and result aggregation
//!
//! Everything here tolerates non-finite input. Reductions either skip NaN
//! entries or report NaN upward; none of them panic on empty data.

/// Calculate median of a slice of f64 values
///
/// This function computes the median while filtering out NaN values but including
/// infinite values (±inf). For even-length data, returns the average of the two
/// middle values.
///
/// # Arguments
///
/// * `values` - Slice of f64 values to compute median from
///
/// # Returns
///
/// * `Ok(median)` - The median value
/// * `Err(message)` - If no valid values remain after filtering NaN
pub fn median(values: &[f64]) -> Result<f64, String> {
    let mut valid_values: Vec<f64> = values.iter().filter(|v| !v.is_nan()).copied().collect();

    if valid_values.is_empty() {
        return Err(format!(
            "Insufficient data points to compute median: {} total values, 0 valid (all NaN)",
            values.len()
        ));
    }

    valid_values.sort_by(f64::total_cmp);

    let median_value = if valid_values.len() % 2 == 0 {
        let mid = valid_values.len() / 2;
        (valid_values[mid - 1] + valid_values[mid]) / 2.0
    } else {
        valid_values[valid_values.len() / 2]
    };

    Ok(median_value)
}

/// Iteratively reject outliers beyond `sigma` standard deviations of the mean.
///
/// Each pass computes the mean and population standard deviation of the
/// surviving values and keeps only those within
/// `[mean - sigma * std, mean + sigma * std]`. Passes repeat until one removes
/// nothing. Non-finite inputs are dropped before the first pass.
///
/// # Arguments
/// * `values` - Sample to clip
/// * `sigma` - Clipping threshold in standard deviations (applied to both tails)
///
/// # Returns
/// The surviving values in their original order. Empty when no finite
/// values were supplied.
pub fn sigma_clip(values: &[f64], sigma: f64) -> Vec<f64> {
    let mut kept: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

    loop {
        let stats: NanStats = kept.iter().copied().collect();
        if stats.count() == 0 {
            return kept;
        }

        let mean = stats.mean();
        let spread = stats.std() * sigma;
        let lower = mean - spread;
        let upper = mean + spread;

        let before = kept.len();
        kept.retain(|&v| v >= lower && v <= upper);

        if kept.len() == before {
            return kept;
        }
    }
}

/// Median of the values surviving [`sigma_clip`].
///
/// Returns NaN when nothing survives (empty or all non-finite input), so a
/// caller can carry the unusable estimate forward instead of aborting.
pub fn sigma_clipped_median(values: &[f64], sigma: f64) -> f64 {
    median(&sigma_clip(values, sigma)).unwrap_or(f64::NAN)
}

/// Streaming mean and population standard deviation over finite samples.
///
/// Non-finite samples are counted as skipped and otherwise ignored. Uses
/// Welford's update so a single sample yields its own value as the mean and
/// exactly zero spread.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NanStats {
    count: usize,
    skipped: usize,
    mean: f64,
    m2: f64,
}

impl NanStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample into the accumulator.
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            self.skipped += 1;
            return;
        }

        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Number of finite samples seen.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of non-finite samples ignored.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Mean of the finite samples, NaN if there were none.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.mean
        }
    }

    /// Population (ddof = 0) standard deviation, NaN if there were no finite samples.
    pub fn std(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }
}

impl Extend<f64> for NanStats {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl FromIterator<f64> for NanStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = NanStats::new();
        stats.extend(iter);
        stats
    }
}

/// NaN-aware mean of a slice.
pub fn nan_mean(values: &[f64]) -> f64 {
    values.iter().copied().collect::<NanStats>().mean()
}

/// NaN-aware population standard deviation of a slice.
pub fn nan_std(values: &[f64]) -> f64 {
    values.iter().copied().collect::<NanStats>().std()
}
