//! Terminal output formatting with colors and box drawing.

use colored::Colorize;

use crate::power::{PowerReport, SummaryRow};

/// Format a report for human-readable terminal output.
///
/// Shows the analytic upper bound, the summary table and the empirical power.
pub fn format_report(report: &PowerReport) -> String {
    let mut output = String::new();
    let config = &report.config;

    let power = report.empirical_power;
    let header = match power {
        Some(p) if p >= config.target_power => format!(
            "{} {}",
            "\u{2713}".green().bold(),
            "TARGET POWER REACHED".green().bold()
        ),
        Some(_) => format!(
            "{} {}",
            "\u{26A0}".yellow().bold(),
            "BELOW TARGET POWER".yellow().bold()
        ),
        None => format!("{} {}", "\u{2717}".red().bold(), "NO USABLE FITS".red().bold()),
    };

    output.push_str(&format_box_top());
    output.push_str(&format_box_line(&header));
    output.push_str(&format_box_separator());

    output.push_str(&format_box_line(&format!(
        "Design: {} groups x {} per condition, \u{0394} = {}",
        config.groups_per_condition, config.group_size, config.mean_diff
    )));
    output.push_str(&format_box_line(&format!(
        "Alpha: {}  Target power: {}  Seed: {}",
        config.alpha, config.target_power, report.seed
    )));
    output.push_str(&format_box_separator());

    output.push_str(&format_box_line(&"Analytic upper bound:".bold().to_string()));
    output.push_str(&format_box_line(&format!(
        "  Effect size d: {:.3}",
        report.effect_size
    )));
    output.push_str(&format_box_line(&format!(
        "  Required groups: {}",
        format_count(report.analytic.required_n_per_condition)
    )));
    output.push_str(&format_box_line(&format!(
        "  Power at design: {}",
        format_percent(report.analytic_power_upper_bound())
    )));
    output.push_str(&format_box_line(&format!(
        "  Design effect: {:.2} (ICC {:.3}) \u{2192} {} groups",
        report.cluster.design_effect,
        report.cluster.icc,
        format_count(report.cluster.groups_per_condition)
    )));
    output.push_str(&format_box_separator());

    let power_str = format!(
        "Empirical power: {}",
        power.map_or_else(|| "n/a".to_string(), format_percent)
    );
    let power_colored = match power {
        Some(p) if p >= config.target_power => power_str.green(),
        Some(p) if p >= config.target_power / 2.0 => power_str.yellow(),
        _ => power_str.red(),
    };
    output.push_str(&format_box_line(&power_colored.to_string()));

    let t = &report.tallies;
    output.push_str(&format_box_line(&format!(
        "Experiments: {} ({} significant, {} not, {} failed)",
        t.experiments, t.significant, t.not_significant, t.failed
    )));
    output.push_str(&format_box_bottom());

    output.push('\n');
    output.push_str(&format_summary_table(&report.summary));

    if t.failed > 0 {
        output.push_str(&format!(
            "\n{}\n",
            format!("Note: {} model fit(s) failed and were tallied separately.", t.failed)
                .dimmed()
                .italic()
        ));
    }

    output
}

/// Format the summary rows as an aligned table.
fn format_summary_table(rows: &[SummaryRow]) -> String {
    let mut out = format!(
        "{:<12} {:>12} {:>12} {:>10} {:>10} {:>10} {:>10} {:>8}\n",
        "source",
        "between var",
        "within var",
        "between sd",
        "within sd",
        "mean c0",
        "mean c1",
        "c1 > c0"
    );
    for row in rows {
        let s = &row.statistics;
        out.push_str(&format!(
            "{:<12} {:>12.4} {:>12.4} {:>10.4} {:>10.4} {:>10} {:>10} {:>8}\n",
            row.source,
            s.between_group_variance.unwrap_or(s.between_group_sample_variance),
            s.within_group_variance,
            s.between_group_std.unwrap_or(s.between_group_sample_std),
            s.within_group_std,
            format_optional(s.condition_0_mean),
            format_optional(s.condition_1_mean),
            s.condition_1_higher.map_or_else(|| "-".to_string(), |n| n.to_string()),
        ));
    }
    out
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

fn format_count(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.1}")
    } else {
        "\u{221E}".to_string()
    }
}

fn format_percent(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.1}%", value * 100.0)
    }
}

// Box drawing helpers

const BOX_WIDTH: usize = 64;

fn format_box_top() -> String {
    format!("\u{250C}{}\u{2510}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_bottom() -> String {
    format!("\u{2514}{}\u{2518}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_separator() -> String {
    format!("\u{251C}{}\u{2524}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_line(content: &str) -> String {
    let visible_len = strip_ansi_codes(content).chars().count();
    let padding = (BOX_WIDTH - 2).saturating_sub(visible_len);
    format!("\u{2502} {}{} \u{2502}\n", content, " ".repeat(padding))
}

/// Strip ANSI escape codes for accurate length calculation.
fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // skip to the terminating 'm'
            while let Some(&next) = chars.peek() {
                chars.next();
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
