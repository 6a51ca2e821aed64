//! Payoff derivation for public-goods pilot data.
//!
//! ```text
//! payoff = base − contribution − punishment + common_good / (group_size − missing)
//! ```
//!
//! `missing` counts the group's participants without input in that round.
//! When the export has no `common_good` it is rebuilt from the group totals,
//! `Σ contribution × multiplier − Σ punishment`, with missing participants
//! contributing nothing.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{decompose, DataStatistics};
use crate::config::{Config, MissingInputPolicy, PayoffRules};
use crate::data::{PilotData, PilotFormat, RoundObservation};
use crate::error::EstimationError;
use crate::mixed::{MixedModel, WaldReference};
use crate::statistics::GroupSummary;

/// A participant's payoff averaged over rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantPayoff {
    /// Group key.
    pub group: String,
    /// Participant identifier.
    pub participant: String,
    /// Mean payoff over the rounds kept.
    pub payoff: f64,
    /// Number of rounds averaged.
    pub rounds: usize,
}

#[derive(Default)]
struct RoundTotals {
    contribution: f64,
    punishment: f64,
    missing: usize,
}

/// Payoff of every kept observation, in input order.
///
/// Observations of missing participants get a payoff of zero or are dropped,
/// depending on `policy`.
///
/// # Errors
/// [`EstimationError::EmptyGroupRound`] when a participant with input belongs
/// to a round where every slot of the group is counted as missing.
pub fn round_payoffs<'a>(
    observations: &'a [RoundObservation],
    rules: &PayoffRules,
    policy: MissingInputPolicy,
) -> Result<Vec<(&'a RoundObservation, f64)>, EstimationError> {
    let mut totals: HashMap<(&str, &str), RoundTotals> = HashMap::new();
    for obs in observations {
        let t = totals.entry((obs.group.as_str(), obs.round.as_str())).or_default();
        if obs.missing {
            t.missing += 1;
        } else {
            t.contribution += obs.contribution;
            t.punishment += obs.punishment;
        }
    }

    let mut payoffs = Vec::with_capacity(observations.len());
    for obs in observations {
        if obs.missing {
            match policy {
                MissingInputPolicy::ZeroPayoff => payoffs.push((obs, 0.0)),
                MissingInputPolicy::Exclude => {}
            }
            continue;
        }

        let t = &totals[&(obs.group.as_str(), obs.round.as_str())];
        let sharing = rules.group_size as f64 - t.missing as f64;
        if sharing <= 0.0 {
            return Err(EstimationError::EmptyGroupRound {
                group: obs.group.clone(),
                round: obs.round.clone(),
            });
        }

        let common_good = obs
            .common_good
            .unwrap_or(t.contribution * rules.multiplier - t.punishment);
        let payoff = rules.base - obs.contribution - obs.punishment + common_good / sharing;
        payoffs.push((obs, payoff));
    }

    Ok(payoffs)
}

/// Average payoffs per (group, participant).
pub fn derive_payoffs(
    data: &PilotData,
    rules: &PayoffRules,
    policy: MissingInputPolicy,
) -> Result<Vec<ParticipantPayoff>, EstimationError> {
    let rounds = round_payoffs(&data.observations, rules, policy)?;

    let mut by_participant: BTreeMap<(&str, &str), GroupSummary> = BTreeMap::new();
    for (obs, payoff) in &rounds {
        by_participant
            .entry((obs.group.as_str(), obs.participant.as_str()))
            .or_default()
            .update(*payoff);
    }

    Ok(by_participant
        .into_iter()
        .filter_map(|((group, participant), summary)| {
            Some(ParticipantPayoff {
                group: group.to_string(),
                participant: participant.to_string(),
                payoff: summary.mean()?,
                rounds: summary.count(),
            })
        })
        .collect())
}

/// Variance decomposition of pilot payoffs.
///
/// Within-group variance is computed over participant averages. The sample
/// between-group variance uses group means of the participant averages,
/// except for algoinst exports where it uses group means of the raw round
/// payoffs. A random-intercept model on the participant averages supplies the
/// model-based between-group variance; a failed fit leaves it empty.
pub fn estimate_payoffs(data: &PilotData, config: &Config) -> Result<DataStatistics, EstimationError> {
    let participants = derive_payoffs(data, &config.payoff, config.missing_inputs)?;

    let mut groups: BTreeMap<&str, GroupSummary> = BTreeMap::new();
    for p in &participants {
        groups.entry(p.group.as_str()).or_default().update(p.payoff);
    }
    let participant_level = decompose(groups.iter().map(|(g, s)| (*g, s)))?;

    let between_sample = match data.format {
        PilotFormat::SessionLog => participant_level.between,
        PilotFormat::Algoinst => {
            let mut raw: BTreeMap<&str, GroupSummary> = BTreeMap::new();
            for (obs, payoff) in round_payoffs(&data.observations, &config.payoff, config.missing_inputs)? {
                raw.entry(obs.group.as_str()).or_default().update(payoff);
            }
            decompose(raw.iter().map(|(g, s)| (*g, s)))?.between
        }
    };

    let payoffs: Vec<f64> = participants.iter().map(|p| p.payoff).collect();
    let labels: Vec<&str> = participants.iter().map(|p| p.group.as_str()).collect();
    let model_variance = match MixedModel::intercept_only(&payoffs, &labels)
        .and_then(|m| m.fit(config.fit_method, WaldReference::Normal))
    {
        Ok(fit) => {
            debug!(
                group_variance = fit.group_variance,
                residual_variance = fit.residual_variance,
                method = %fit.method,
                "pilot random-intercept fit"
            );
            Some(fit.group_variance)
        }
        Err(error) => {
            warn!(%error, "pilot mixed-model fit failed; using sample between-group variance");
            None
        }
    };

    let stats = DataStatistics {
        between_group_sample_variance: between_sample,
        within_group_variance: participant_level.within,
        between_group_sample_std: between_sample.sqrt(),
        within_group_std: participant_level.within.sqrt(),
        n_observations: participants.len(),
        n_groups: participant_level.n_groups,
        degenerate_groups: participant_level.degenerate,
        ..Default::default()
    };
    Ok(stats.with_model_variance(model_variance))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(group: &str, participant: &str, round: &str, c: f64, p: f64, missing: bool) -> RoundObservation {
        RoundObservation {
            session: "s".to_string(),
            group: group.to_string(),
            participant: participant.to_string(),
            round: round.to_string(),
            contribution: c,
            punishment: p,
            missing,
            common_good: None,
        }
    }

    #[test]
    fn test_full_group_payoff() {
        let rows = vec![
            obs("g", "a", "1", 10.0, 0.0, false),
            obs("g", "b", "1", 10.0, 0.0, false),
            obs("g", "c", "1", 0.0, 2.0, false),
            obs("g", "d", "1", 0.0, 0.0, false),
        ];
        let payoffs = round_payoffs(&rows, &PayoffRules::default(), MissingInputPolicy::ZeroPayoff).unwrap();
        // common good = 20·1.6 − 2 = 30, shared by 4
        assert!((payoffs[0].1 - (20.0 - 10.0 + 7.5)).abs() < 1e-12);
        assert!((payoffs[2].1 - (20.0 - 2.0 + 7.5)).abs() < 1e-12);
        assert!((payoffs[3].1 - 27.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_participant_policies() {
        let rows = vec![
            obs("g", "a", "1", 10.0, 0.0, false),
            obs("g", "b", "1", 10.0, 0.0, false),
            obs("g", "c", "1", 10.0, 0.0, false),
            obs("g", "d", "1", 99.0, 99.0, true),
        ];
        let rules = PayoffRules::default();

        let zero = round_payoffs(&rows, &rules, MissingInputPolicy::ZeroPayoff).unwrap();
        assert_eq!(zero.len(), 4);
        assert_eq!(zero[3].1, 0.0);
        // missing inputs add nothing; 30·1.6 = 48 shared by 3
        assert!((zero[0].1 - (20.0 - 10.0 + 16.0)).abs() < 1e-12);

        let excluded = round_payoffs(&rows, &rules, MissingInputPolicy::Exclude).unwrap();
        assert_eq!(excluded.len(), 3);
        assert!(excluded.iter().all(|(o, _)| !o.missing));
    }

    #[test]
    fn test_fully_missing_round_is_guarded() {
        let rules = PayoffRules {
            group_size: 2,
            ..PayoffRules::default()
        };
        let rows = vec![
            obs("g", "a", "1", 0.0, 0.0, true),
            obs("g", "b", "1", 0.0, 0.0, true),
            obs("g", "c", "1", 5.0, 0.0, false),
        ];
        assert!(matches!(
            round_payoffs(&rows, &rules, MissingInputPolicy::ZeroPayoff),
            Err(EstimationError::EmptyGroupRound { .. })
        ));
    }

    #[test]
    fn test_supplied_common_good_wins() {
        let mut row = obs("g", "a", "1", 4.0, 1.0, false);
        row.common_good = Some(40.0);
        let payoffs = round_payoffs(std::slice::from_ref(&row), &PayoffRules::default(), MissingInputPolicy::ZeroPayoff)
            .unwrap();
        assert!((payoffs[0].1 - (20.0 - 4.0 - 1.0 + 10.0)).abs() < 1e-12);
    }

    #[test]
    fn test_participant_averages() {
        let rows = vec![
            obs("g", "a", "1", 10.0, 0.0, false),
            obs("g", "a", "2", 0.0, 0.0, false),
        ];
        let data = PilotData::new(PilotFormat::SessionLog, rows);
        let averages = derive_payoffs(&data, &PayoffRules::default(), MissingInputPolicy::ZeroPayoff).unwrap();
        assert_eq!(averages.len(), 1);
        assert_eq!(averages[0].rounds, 2);
        // round 1: 20 − 10 + 16/4 = 14; round 2: 20
        assert!((averages[0].payoff - 17.0).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_payoffs_on_group_structure() {
        // three groups of four participants over two rounds; groups differ
        // in how much they contribute
        let mut rows = Vec::new();
        for (g, base) in [("g1", 0.0), ("g2", 6.0), ("g3", 12.0)] {
            for (i, p) in ["a", "b", "c", "d"].iter().enumerate() {
                for round in ["1", "2"] {
                    let c = base + i as f64 + if round == "1" { 0.0 } else { 1.0 };
                    rows.push(obs(g, &format!("{g}{p}"), round, c, 0.0, false));
                }
            }
        }
        let data = PilotData::new(PilotFormat::SessionLog, rows);
        let stats = estimate_payoffs(&data, &Config::default()).unwrap();

        assert_eq!(stats.n_groups, 3);
        assert_eq!(stats.n_observations, 12);
        assert_eq!(stats.degenerate_groups, 0);
        assert!(stats.between_group_sample_variance > 0.0);
        assert!(stats.within_group_variance > 0.0);
        assert_eq!(stats.condition_0_mean, None);
        assert!(stats.between_group_variance.is_some());
        assert!(stats.between_group_variance.unwrap() >= 0.0);
    }
}
