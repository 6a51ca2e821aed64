//! Descriptive statistics with explicit degrees-of-freedom handling.

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance with Bessel's correction (n − 1 denominator).
///
/// `None` when fewer than two values are given, since the estimate is
/// undefined there.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|x| (x - m) * (x - m)).sum();
    Some(ss / (n - 1) as f64)
}

/// Population variance (n denominator). `None` for an empty slice.
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|x| (x - m) * (x - m)).sum();
    Some(ss / values.len() as f64)
}

/// Turn a population (n-denominator) variance into the unbiased estimate.
///
/// Returns `None` for `n < 2`.
pub fn correct_variance(sample_variance: f64, n: usize) -> Option<f64> {
    if n < 2 {
        return None;
    }
    Some(sample_variance * (n as f64 / (n - 1) as f64))
}

/// Standard deviation counterpart of [`correct_variance`].
pub fn correct_std(sample_std: f64, n: usize) -> Option<f64> {
    correct_variance(sample_std * sample_std, n).map(f64::sqrt)
}

/// Streaming mean/variance accumulator (Welford).
///
/// Used to summarize groups without buffering their values.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupSummary {
    count: usize,
    mean: f64,
    m2: f64,
}

impl GroupSummary {
    /// Create an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation.
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Number of observations seen.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Bessel-corrected variance, `None` with fewer than two observations.
    pub fn variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }
}

impl FromIterator<f64> for GroupSummary {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut summary = GroupSummary::new();
        for x in iter {
            summary.update(x);
        }
        summary
    }
}
