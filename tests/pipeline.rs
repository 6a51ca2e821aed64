//! End-to-end runs from pilot CSV files to the persisted summary table.

use std::io::Write;

use mixedpower::data::{load_algoinst_csv, load_session_log_csv, PilotFormat};
use mixedpower::output::{format_report, to_json, write_summary};
use mixedpower::{Config, DataError, Error, PowerAnalysis, ALGOINST_EXPERIMENT, DEFAULT_SESSION};
use tempfile::{tempdir, NamedTempFile};

const ALGOINST_HEADER: &str = "experiment_name,session,global_group_id,round_number,episode,participant_code,player_no_input,contribution,punishment,common_good";
const SESSION_LOG_HEADER: &str =
    "session,round,group_idx,contributions,groups,punishments,participant_codes,missing_inputs";

fn contribution(group: usize, participant: usize, round: usize) -> f64 {
    ((group * 7 + participant * 3 + round * 5) % 11) as f64
}

fn algoinst_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{ALGOINST_HEADER}").unwrap();
    for group in 0..6 {
        for round in 1..=3 {
            let total: f64 = (0..4).map(|p| contribution(group, p, round)).sum();
            let common_good = total * 1.6 - 1.0;
            for participant in 0..4 {
                let punishment = if participant == 0 { 1.0 } else { 0.0 };
                writeln!(
                    file,
                    "{ALGOINST_EXPERIMENT},s1,{group},{round},1,p{group}_{participant},False,{},{punishment},{common_good}",
                    contribution(group, participant, round)
                )
                .unwrap();
            }
        }
        // other experiments are filtered out
        writeln!(file, "other,s1,{group},1,1,x,False,1,0,1").unwrap();
    }
    file.flush().unwrap();
    file
}

fn list(items: impl Iterator<Item = String>) -> String {
    format!("\"[{}]\"", items.collect::<Vec<_>>().join(", "))
}

fn session_log_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{SESSION_LOG_HEADER}").unwrap();
    let slots: Vec<(usize, usize)> = (0..4).flat_map(|g| (0..4).map(move |p| (g, p))).collect();
    for round in 1..=3 {
        let contributions = list(slots.iter().map(|&(g, p)| contribution(g + 2, p, round).to_string()));
        let groups = list(slots.iter().map(|&(g, _)| format!("'g{g}'")));
        let punishments = list(slots.iter().map(|&(_, p)| (p % 2).to_string()));
        let participants = list(slots.iter().map(|&(g, p)| format!("'q{g}_{p}'")));
        let missing = list(
            slots
                .iter()
                .map(|&(g, p)| if round == 2 && g == 1 && p == 3 { "True" } else { "False" }.to_string()),
        );
        writeln!(
            file,
            "{DEFAULT_SESSION},{round},0,{contributions},{groups},{punishments},{participants},{missing}"
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

fn config() -> Config {
    Config::new()
        .with_experiments(30)
        .with_groups_per_condition(10)
        .with_seed(77)
}

#[test]
fn loaders_read_both_formats() {
    let algoinst = algoinst_file();
    let old = load_algoinst_csv(algoinst.path(), ALGOINST_EXPERIMENT).unwrap();
    assert_eq!(old.format, PilotFormat::Algoinst);
    assert_eq!(old.len(), 6 * 3 * 4);
    assert_eq!(old.n_groups(), 6);

    let log = session_log_file();
    let new = load_session_log_csv(log.path(), &[DEFAULT_SESSION.to_string()]).unwrap();
    assert_eq!(new.format, PilotFormat::SessionLog);
    assert_eq!(new.len(), 3 * 16);
    assert_eq!(new.n_groups(), 4);
    assert_eq!(new.sessions, vec![DEFAULT_SESSION.to_string()]);
}

#[test]
fn full_pipeline_writes_summary() {
    let algoinst = algoinst_file();
    let log = session_log_file();
    let analysis = PowerAnalysis::new(config().with_new_pilot(true)).unwrap();

    let old = load_algoinst_csv(algoinst.path(), &analysis.config().experiment_name).unwrap();
    let new = load_session_log_csv(log.path(), &analysis.config().sessions).unwrap();
    let report = analysis.run_pilots(&old, Some(&new)).unwrap();

    let sources: Vec<&str> = report.summary.iter().map(|r| r.source.as_str()).collect();
    assert_eq!(sources, vec!["old_pilot", "pgh", "sampled"]);
    assert_eq!(report.tallies.experiments, 30);
    assert_eq!(
        report.tallies.significant + report.tallies.not_significant + report.tallies.failed,
        30
    );
    let old_row = &report.summary[0].statistics;
    assert_eq!(old_row.n_groups, 6);
    assert!(old_row.within_group_variance > 0.0);

    let dir = tempdir().unwrap();
    let path = dir.path().join("data").join("stats.csv");
    write_summary(&report, &path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 4);
    assert!(text.lines().nth(3).unwrap().starts_with("sampled,"));

    assert!(format_report(&report).contains("Empirical power"));
    assert!(to_json(&report).unwrap().contains("\"tallies\""));
}

#[test]
fn pipeline_without_second_pilot() {
    let algoinst = algoinst_file();
    let analysis = PowerAnalysis::new(config()).unwrap();
    let old = load_algoinst_csv(algoinst.path(), ALGOINST_EXPERIMENT).unwrap();

    let report = analysis.run_pilots(&old, None).unwrap();
    let sources: Vec<&str> = report.summary.iter().map(|r| r.source.as_str()).collect();
    assert_eq!(sources, vec!["old_pilot", "sampled"]);
}

#[test]
fn considering_missing_second_pilot_fails() {
    let algoinst = algoinst_file();
    let analysis = PowerAnalysis::new(config().with_new_pilot(true)).unwrap();
    let old = load_algoinst_csv(algoinst.path(), ALGOINST_EXPERIMENT).unwrap();
    assert!(matches!(analysis.run_pilots(&old, None), Err(Error::Config(_))));
}

#[test]
fn schema_errors_are_fatal() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "experiment_name,session,global_group_id").unwrap();
    writeln!(file, "{ALGOINST_EXPERIMENT},s1,0").unwrap();
    file.flush().unwrap();

    let err = load_algoinst_csv(file.path(), ALGOINST_EXPERIMENT).unwrap_err();
    assert!(matches!(err, DataError::MissingColumn { .. }));
}
