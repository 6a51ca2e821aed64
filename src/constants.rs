//! Defaults and fixed values shared across the crate.

/// Default deterministic seed for the simulation RNG streams.
///
/// Same seed + same parameters = same simulated experiments, regardless of
/// whether the `parallel` feature is enabled. The value is "mixed" in ASCII.
pub const DEFAULT_SEED: u64 = 0x6D69786564;

// =============================================================================
// Default run configuration
// =============================================================================

/// Default significance level for the condition effect.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Default target power for the analytic sample-size bound.
pub const DEFAULT_TARGET_POWER: f64 = 0.8;

/// Default hypothesized difference between condition means (payoff units).
pub const DEFAULT_MEAN_DIFF: f64 = 2.0;

/// Default number of participants per group.
pub const DEFAULT_GROUP_SIZE: usize = 4;

/// Default number of groups sampled per condition.
pub const DEFAULT_GROUPS_PER_CONDITION: usize = 60;

/// Default number of simulated experiments.
pub const DEFAULT_EXPERIMENTS: usize = 1000;

// =============================================================================
// Payoff rules of the public-goods game with punishment
// =============================================================================

/// Endowment each participant starts a round with.
pub const PAYOFF_BASE: f64 = 20.0;

/// Multiplier applied to the group's total contribution.
pub const PAYOFF_MULTIPLIER: f64 = 1.6;

/// Number of participant slots in a pilot group.
pub const PAYOFF_GROUP_SIZE: usize = 4;

// =============================================================================
// Pilot data filters
// =============================================================================

/// Experiment name kept from algoinst-format pilot data.
pub const ALGOINST_EXPERIMENT: &str = "trail_rounds_2";

/// Session kept from session-log pilot data by default.
pub const DEFAULT_SESSION: &str = "85dlorg9";

/// Human-readable manager labels for known pilot sessions.
pub const SESSION_LABELS: [(&str, &str); 4] = [
    ("wwjoqsbe", "ci, γ=1"),
    ("unc1fc2m", "ci, γ=1"),
    ("ka5v3qsi", "ci, γ=0.9"),
    ("85dlorg9", "pgh, γ=0.98"),
];

/// Look up the manager label of a pilot session.
pub fn session_label(session: &str) -> Option<&'static str> {
    SESSION_LABELS
        .iter()
        .find(|(id, _)| *id == session)
        .map(|(_, label)| *label)
}

// =============================================================================
// Mixed-model optimizer
// =============================================================================

/// Number of grid points scanned on the log variance-ratio scale before refinement.
pub const FIT_GRID_POINTS: usize = 48;

/// Lower end of the `ln(σ_b²/σ²)` search interval. Ratio `0` is checked separately.
pub const FIT_MIN_LOG_RATIO: f64 = -23.025850929940457; // ln 1e-10

/// Upper end of the `ln(σ_b²/σ²)` search interval.
pub const FIT_MAX_LOG_RATIO: f64 = 23.025850929940457; // ln 1e10

/// Residual share `σ²/(σ_b² + σ²)` below which the residual variance counts as collapsed.
pub const FIT_MIN_RESIDUAL_SHARE: f64 = 1e-9;

/// Relative objective gap within which the zero-ratio boundary is preferred.
///
/// A profile that is flat in the variance ratio (one observation per group)
/// falls back to ordinary least squares.
pub const FIT_FLAT_TOLERANCE: f64 = 1e-9;

/// Convergence tolerance on the log variance ratio.
pub const FIT_TOLERANCE: f64 = 1e-10;

/// Iteration cap for the golden-section refinement.
pub const FIT_MAX_ITERATIONS: usize = 200;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_label_lookup() {
        assert_eq!(session_label("85dlorg9"), Some("pgh, γ=0.98"));
        assert_eq!(session_label("ka5v3qsi"), Some("ci, γ=0.9"));
        assert_eq!(session_label("unknown"), None);
    }
}
