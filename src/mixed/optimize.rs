//! Bounded scalar minimization.

use crate::error::FitError;

/// Location of a scalar minimum.
#[derive(Debug, Clone, Copy)]
pub struct Minimum {
    pub x: f64,
    pub value: f64,
    pub iterations: usize,
}

/// Scan `points + 1` equally spaced values on `[lo, hi]` and return the
/// bracket around the best one.
///
/// Non-finite objective values are treated as +∞. Returns `None` if the
/// objective is non-finite everywhere.
pub fn grid_bracket<F>(f: &mut F, lo: f64, hi: f64, points: usize) -> Option<(f64, f64, Minimum)>
where
    F: FnMut(f64) -> f64,
{
    let step = (hi - lo) / points as f64;
    let mut best: Option<(usize, f64)> = None;

    for i in 0..=points {
        let x = lo + step * i as f64;
        let value = f(x);
        if !value.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, v)| value < v) {
            best = Some((i, value));
        }
    }

    let (k, value) = best?;
    let left = lo + step * k.saturating_sub(1) as f64;
    let right = (lo + step * (k + 1) as f64).min(hi);
    Some((
        left,
        right,
        Minimum {
            x: lo + step * k as f64,
            value,
            iterations: points + 1,
        },
    ))
}

/// Golden-section search for the minimum of a unimodal function on `[a, b]`.
///
/// Stops when the bracket is narrower than `tol·(1 + |x|)`; fails with
/// [`FitError::NotConverged`] if that does not happen within `max_iter`
/// iterations.
pub fn golden_section<F>(
    f: &mut F,
    mut a: f64,
    mut b: f64,
    tol: f64,
    max_iter: usize,
) -> Result<Minimum, FitError>
where
    F: FnMut(f64) -> f64,
{
    let inv_phi = (5.0_f64.sqrt() - 1.0) / 2.0;

    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);

    for iteration in 1..=max_iter {
        if (b - a).abs() <= tol * (1.0 + c.abs().max(d.abs())) {
            let (x, value) = if fc <= fd { (c, fc) } else { (d, fd) };
            if !value.is_finite() {
                return Err(FitError::NonFinite);
            }
            return Ok(Minimum {
                x,
                value,
                iterations: iteration,
            });
        }

        // NaN compares false, so a NaN at c moves the bracket away from it
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = f(d);
        }
    }

    Err(FitError::NotConverged {
        iterations: max_iter,
    })
}
