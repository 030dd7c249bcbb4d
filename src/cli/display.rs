//! Terminal display for transmutation and refactor runs
//!
//! Renders phase transitions, per-cycle metrics and final reports.
//! All output goes to stderr so stdout remains clean for piping.

use colored::{ColoredString, Colorize};

use crate::metrics::CycleMetrics;
use crate::pipeline::refactor::RefactorReport;
use crate::pipeline::state::{CycleRecord, Phase, PipelineState};
use crate::pipeline::summary::{RunSummary, Trend};

/// Health bucket for an RSI score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsiColor {
    /// RSI ≥ 0.7
    Green,
    /// 0.4 ≤ RSI < 0.7
    Yellow,
    /// RSI < 0.4
    Red,
}

impl RsiColor {
    /// Bucket for `rsi`.
    #[must_use]
    pub fn from_rsi(rsi: f64) -> Self {
        if rsi >= 0.7 {
            Self::Green
        } else if rsi >= 0.4 {
            Self::Yellow
        } else {
            Self::Red
        }
    }

    fn paint(self, text: &str) -> ColoredString {
        match self {
            Self::Green => text.green().bold(),
            Self::Yellow => text.yellow().bold(),
            Self::Red => text.red().bold(),
        }
    }
}

/// Display handler for a transmutation run
pub struct RunDisplay {
    provider: String,
    started: bool,
}

impl RunDisplay {
    /// Create a display for a run against `provider`.
    #[must_use]
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            started: false,
        }
    }

    /// Print the run header
    pub fn print_header(&self, total_cycles: u32) {
        eprintln!(
            "\n{} {}",
            "===".bold().cyan(),
            format!("Transmute: {total_cycles} cycle(s) via {}", self.provider)
                .bold()
                .cyan()
        );
        eprintln!("{}", "─".repeat(50).dimmed());
    }

    /// Render a phase transition
    pub fn render_phase(&mut self, state: &PipelineState) {
        if let Some(line) = phase_line(state, self.started) {
            eprintln!("{line}");
        }
        self.started = true;
    }

    /// Render one completed cycle
    pub fn render_cycle(&self, record: &CycleRecord) {
        eprintln!("  {}", cycle_line(record));
    }
}

fn phase_line(state: &PipelineState, started: bool) -> Option<String> {
    let progress = format!("[{}/{}]", state.current_cycle, state.total_cycles);
    match state.phase {
        Phase::Mutate => Some(format!(
            "{} {} mutating",
            progress.dimmed(),
            "▶".magenta()
        )),
        Phase::Stabilize => Some(format!(
            "{} {} stabilizing",
            progress.dimmed(),
            "▶".blue()
        )),
        Phase::Complete => Some(format!(
            "{} {} cycle(s)",
            "COMPLETED".green().bold(),
            state.history.len()
        )),
        Phase::Error => Some(format!(
            "{} {}",
            "FAILED".red().bold(),
            state.error.as_deref().unwrap_or("unknown error").red()
        )),
        // Idle is both the starting phase and the cancelled end state
        Phase::Idle if started => Some(format!(
            "{} after {} cycle(s)",
            "CANCELLED".yellow().bold(),
            state.history.len()
        )),
        Phase::Idle => None,
    }
}

fn cycle_line(record: &CycleRecord) -> String {
    let rsi = record.rsi();
    let m = &record.metrics;
    format!(
        "{} cycle {} | heat {:.2} | cool {:.2} | conv {:.2} | cx {:.1} | Δlines {:+}",
        RsiColor::from_rsi(rsi).paint(&format!("RSI {rsi:.3}")),
        record.cycle_number,
        m.heat_entropy,
        m.cool_stability,
        m.convergence,
        m.complexity,
        m.delta_lines
    )
}

/// Render the aggregate summary at the end of a run
pub fn render_run_summary(summary: &RunSummary) {
    eprintln!("{}", "─".repeat(50).dimmed());
    for line in run_summary_lines(summary) {
        eprintln!("  {line}");
    }
    eprintln!();
}

fn run_summary_lines(summary: &RunSummary) -> Vec<String> {
    let trend = match summary.trend {
        Trend::Converging => summary.trend.to_string().green(),
        Trend::Diverging => summary.trend.to_string().red(),
        Trend::Steady => summary.trend.to_string().normal(),
    };
    vec![
        format!(
            "{} {} cycle(s) | best #{} | trend {trend}",
            "Summary:".dimmed(),
            summary.cycles_completed,
            summary.best_cycle
        ),
        format!(
            "{} mean {:.3} | final {}",
            "RSI:".dimmed(),
            summary.mean_rsi,
            RsiColor::from_rsi(summary.final_rsi).paint(&format!("{:.3}", summary.final_rsi))
        ),
        format!(
            "{} heat {:.2} | cool {:.2} | conv {:.2} | Δlines {:+}",
            "Means:".dimmed(),
            summary.mean_heat_entropy,
            summary.mean_cool_stability,
            summary.mean_convergence,
            summary.net_delta_lines
        ),
    ]
}

/// Render a refactor report
pub fn render_refactor_report(report: &RefactorReport) {
    eprintln!(
        "\n{} {}",
        "===".bold().cyan(),
        "Refactor report".bold().cyan()
    );
    eprintln!("{}", "─".repeat(50).dimmed());
    for line in refactor_report_lines(report) {
        eprintln!("  {line}");
    }
    eprintln!();
}

fn refactor_report_lines(report: &RefactorReport) -> Vec<String> {
    let analysis = &report.analysis;
    let mut lines = vec![analysis.summary.clone()];

    let sections = [
        ("Issues:", analysis.issues.iter().map(ToString::to_string).collect::<Vec<_>>()),
        ("Goals:", analysis.refactor_goals.clone()),
        ("Plan:", analysis.high_level_plan.clone()),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        lines.push(title.dimmed().to_string());
        lines.extend(items.iter().map(|item| format!("  - {item}")));
    }

    let gain = report.rsi_gain();
    let gain = if gain >= 0.0 {
        format!("{gain:+.3}").green()
    } else {
        format!("{gain:+.3}").red()
    };
    lines.push(format!(
        "{} {:.3} → {} ({gain})",
        "RSI:".dimmed(),
        report.rsi_before,
        RsiColor::from_rsi(report.rsi_after).paint(&format!("{:.3}", report.rsi_after))
    ));
    lines.push(format!(
        "{} {}",
        "Complexity:".dimmed(),
        complexity_change(&report.metrics_before, &report.metrics_after)
    ));
    lines
}

fn complexity_change(before: &CycleMetrics, after: &CycleMetrics) -> String {
    format!("{:.1} → {:.1}", before.complexity, after.complexity)
}
