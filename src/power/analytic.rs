//! Closed-form power of the two-sample t-test.
//!
//! Power under the alternative is a noncentral-t tail probability. Writing
//! `T' = (Z + δ) / √(V/ν)` with `V ~ χ²_ν`,
//!
//! ```text
//! P(T' > c) = E_V[ Φ(δ − c·√(V/ν)) ]
//! ```
//!
//! which is evaluated by Simpson quadrature over the χ² density. For very
//! large `ν` the mixture collapses to the normal limit.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use statrs::function::erf::erfc;
use statrs::function::gamma::ln_gamma;

/// Degrees of freedom above which the normal limit is used.
const NORMAL_LIMIT_DF: f64 = 1e5;

/// Simpson intervals for the χ² mixture (even).
const QUADRATURE_INTERVALS: usize = 2000;

/// Smallest group size `solve_power` will report.
///
/// Two per condition is the least that leaves the pooled t-test a positive
/// degree of freedom. Below it the χ² quadrature is not reliable, so effects
/// large enough to need fewer report this floor.
pub const MIN_NOBS: f64 = 2.0;

/// Largest group size `solve_power` will search before giving up.
const MAX_NOBS: f64 = 1e9;

/// Direction of the alternative hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Alternative {
    /// Effect in either direction.
    #[default]
    TwoSided,
    /// Condition 1 larger than condition 0.
    Larger,
    /// Condition 1 smaller than condition 0.
    Smaller,
}

fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Critical values `(lower, upper)` of the null t distribution.
///
/// One-sided alternatives leave the other bound infinite.
fn critical_values(alpha: f64, df: f64, alternative: Alternative) -> (f64, f64) {
    let quantile = |p: f64| {
        if df > NORMAL_LIMIT_DF {
            Normal::new(0.0, 1.0).map_or(f64::NAN, |n| n.inverse_cdf(p))
        } else {
            StudentsT::new(0.0, 1.0, df).map_or(f64::NAN, |t| t.inverse_cdf(p))
        }
    };
    match alternative {
        Alternative::TwoSided => {
            let c = quantile(1.0 - alpha / 2.0);
            (-c, c)
        }
        Alternative::Larger => (f64::NEG_INFINITY, quantile(1.0 - alpha)),
        Alternative::Smaller => (quantile(alpha), f64::INFINITY),
    }
}

/// `P(T' > upper) + P(T' < lower)` for `T' ~ t'(df, nc)`.
fn noncentral_tails(lower: f64, upper: f64, df: f64, nc: f64) -> f64 {
    let tails = |s: f64| {
        let above = if upper.is_finite() {
            standard_normal_cdf(nc - upper * s)
        } else {
            0.0
        };
        let below = if lower.is_finite() {
            standard_normal_cdf(lower * s - nc)
        } else {
            0.0
        };
        above + below
    };

    if df > NORMAL_LIMIT_DF {
        return tails(1.0);
    }

    // integrate over V ~ χ²_df on mean ± 12 sd
    let sd = (2.0 * df).sqrt();
    let lo = (df - 12.0 * sd).max(0.0);
    let hi = df + 12.0 * sd;
    let h = (hi - lo) / QUADRATURE_INTERVALS as f64;
    let log_norm = 0.5 * df * std::f64::consts::LN_2 + ln_gamma(0.5 * df);
    let density = |v: f64| {
        if v <= 0.0 {
            return if df == 2.0 { 0.5 } else { 0.0 };
        }
        ((0.5 * df - 1.0) * v.ln() - 0.5 * v - log_norm).exp()
    };

    let mut mass = 0.0;
    let mut total = 0.0;
    for i in 0..=QUADRATURE_INTERVALS {
        let v = lo + h * i as f64;
        let weight = if i == 0 || i == QUADRATURE_INTERVALS {
            1.0
        } else if i % 2 == 1 {
            4.0
        } else {
            2.0
        };
        let f = density(v) * weight;
        mass += f;
        total += f * tails((v / df).sqrt());
    }

    if mass > 0.0 {
        (total / mass).clamp(0.0, 1.0)
    } else {
        tails(1.0)
    }
}

/// Power of the independent two-sample t-test.
///
/// `effect_size` is Cohen's d, `nobs1` the size of the first sample and
/// `ratio = nobs2 / nobs1`.
pub fn ttest_ind_power(effect_size: f64, nobs1: f64, alpha: f64, ratio: f64, alternative: Alternative) -> f64 {
    let nobs2 = nobs1 * ratio;
    let df = nobs1 + nobs2 - 2.0;
    if !(df > 0.0) {
        return f64::NAN;
    }
    if effect_size.is_infinite() {
        let helps = match alternative {
            Alternative::TwoSided => true,
            Alternative::Larger => effect_size > 0.0,
            Alternative::Smaller => effect_size < 0.0,
        };
        return if helps { 1.0 } else { 0.0 };
    }

    let nc = effect_size * (nobs1 * nobs2 / (nobs1 + nobs2)).sqrt();
    let (lower, upper) = critical_values(alpha, df, alternative);
    noncentral_tails(lower, upper, df, nc)
}

/// Smallest `nobs1` whose power reaches `power`.
///
/// Returns `f64::INFINITY` when the target is not reachable, which includes
/// a zero effect size. The result is never below [`MIN_NOBS`]: when the
/// target is already met at that size, [`MIN_NOBS`] is returned as is, even
/// if a fractional size below it would also suffice.
pub fn solve_power(effect_size: f64, alpha: f64, power: f64, ratio: f64, alternative: Alternative) -> f64 {
    if effect_size == 0.0 || effect_size.is_nan() {
        return f64::INFINITY;
    }
    let gap = |n: f64| ttest_ind_power(effect_size, n, alpha, ratio, alternative) - power;

    let mut lo = MIN_NOBS;
    if gap(lo) >= 0.0 {
        return lo;
    }
    let mut hi = lo * 2.0;
    while gap(hi) < 0.0 {
        lo = hi;
        hi *= 2.0;
        if hi > MAX_NOBS {
            return f64::INFINITY;
        }
    }

    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if gap(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1e-10 * hi {
            break;
        }
    }
    hi
}

/// Analytic sample-size bound for a planned difference in means.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyticEstimate {
    /// Cohen's d.
    pub effect_size: f64,
    /// `√((var1 + var2) / 2)`.
    pub pooled_std: f64,
    /// Units per condition needed to reach the target power.
    pub required_n_per_condition: f64,
    /// Power with the planned number of units per condition.
    pub power_at_design: f64,
}

impl AnalyticEstimate {
    /// Two-sided bound for `mean_diff` with the given per-condition variances.
    ///
    /// `condition_2_variance` defaults to `condition_1_variance`.
    pub fn new(
        mean_diff: f64,
        condition_1_variance: f64,
        condition_2_variance: Option<f64>,
        alpha: f64,
        power: f64,
        planned_n: usize,
    ) -> Self {
        let c2 = condition_2_variance.unwrap_or(condition_1_variance);
        let pooled_std = ((condition_1_variance + c2) / 2.0).sqrt();
        let effect_size = if pooled_std > 0.0 {
            mean_diff / pooled_std
        } else if mean_diff == 0.0 {
            0.0
        } else {
            mean_diff.signum() * f64::INFINITY
        };

        let required = solve_power(effect_size, alpha, power, 1.0, Alternative::TwoSided);
        let power_at_design = if planned_n >= 2 {
            ttest_ind_power(effect_size, planned_n as f64, alpha, 1.0, Alternative::TwoSided)
        } else {
            f64::NAN
        };

        Self {
            effect_size,
            pooled_std,
            required_n_per_condition: required,
            power_at_design,
        }
    }
}
