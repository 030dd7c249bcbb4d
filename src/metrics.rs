//! Metrics engine
//!
//! Pure, deterministic scoring of text: entropy, structural complexity, token
//! similarity and the composite reality-stabilization index (RSI).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Control-flow and declaration keywords across mainstream languages.
const STRUCTURAL_KEYWORDS: &[&str] = &[
    // conditionals
    "if", "else", "elif", "elsif", "unless", "switch", "case", "match", "when", "default",
    // loops
    "for", "foreach", "while", "do", "loop", "until", "repeat",
    // error flow
    "try", "catch", "except", "finally", "rescue", "throw", "raise",
    // functions
    "function", "func", "fn", "def", "fun", "lambda", "async",
    // types
    "class", "struct", "enum", "interface", "trait", "impl", "type", "union", "protocol",
    "module", "namespace",
];

/// Per-cycle scores. Built once and never modified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleMetrics {
    /// Entropy of the mutated text, in [0, 1]
    pub heat_entropy: f64,
    /// Stability of the stabilized text, in [0, 1]
    pub cool_stability: f64,
    /// Structural complexity of the stabilized text
    pub complexity: f64,
    /// Token similarity between mutated and stabilized text, in [0, 1]
    pub convergence: f64,
    /// Stabilized line count minus mutated line count
    pub delta_lines: i64,
}

impl CycleMetrics {
    /// Score one mutate/stabilize pair.
    #[must_use]
    pub fn compute(mutated: &str, stabilized: &str) -> Self {
        Self {
            heat_entropy: entropy(mutated),
            cool_stability: cool_stability(stabilized),
            complexity: complexity(stabilized),
            convergence: convergence(mutated, stabilized),
            delta_lines: delta_lines(mutated, stabilized),
        }
    }

    /// Metrics of a text compared with itself.
    #[must_use]
    pub fn of_text(text: &str) -> Self {
        Self::compute(text, text)
    }

    /// Composite index for these metrics.
    #[must_use]
    pub fn rsi(&self) -> f64 {
        rsi(self)
    }
}

/// Share of symbol characters (neither alphanumeric nor whitespace), scaled
/// by 4 and clamped to [0, 1]. Empty text scores 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn entropy(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }

    let symbols = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();

    (symbols as f64 / total as f64 * 4.0).clamp(0.0, 1.0)
}

/// Keyword occurrences plus a quarter of the deepest indentation.
///
/// Tabs count as four columns of indentation.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn complexity(text: &str) -> f64 {
    let keywords = text
        .split(|c: char| !is_word_char(c))
        .filter(|word| STRUCTURAL_KEYWORDS.contains(word))
        .count();

    let max_indent = text.split('\n').map(indent_width).max().unwrap_or(0);

    keywords as f64 + max_indent as f64 / 4.0
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Maximal runs of word characters longer than one character.
fn tokens(text: &str) -> HashSet<&str> {
    text.split(|c: char| !is_word_char(c))
        .filter(|t| t.chars().count() > 1)
        .collect()
}

/// Jaccard index over token sets.
///
/// Two empty inputs are identical (1); exactly one empty input scores 0.
/// Non-empty inputs with no tokens on either side also score 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity(a: &str, b: &str) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let left = tokens(a);
    let right = tokens(b);
    let union = left.union(&right).count();
    if union == 0 {
        return 1.0;
    }
    let intersection = left.intersection(&right).count();

    intersection as f64 / union as f64
}

/// `1 - entropy * 0.8`.
#[must_use]
pub fn cool_stability(text: &str) -> f64 {
    1.0 - entropy(text) * 0.8
}

/// How close the stabilized text stayed to the mutated text.
#[must_use]
pub fn convergence(mutated: &str, stabilized: &str) -> f64 {
    similarity(mutated, stabilized)
}

/// Stabilized line count minus mutated line count.
#[must_use]
pub fn delta_lines(mutated: &str, stabilized: &str) -> i64 {
    line_count(stabilized) - line_count(mutated)
}

fn line_count(text: &str) -> i64 {
    i64::try_from(text.split('\n').count()).unwrap_or(i64::MAX)
}

/// Reality-stabilization index, clamped to [0, 1].
///
/// NaN inputs count as 0.5.
#[must_use]
pub fn rsi(metrics: &CycleMetrics) -> f64 {
    let entropy = or_half(metrics.heat_entropy);
    let complexity = or_half(metrics.complexity);
    let stability = or_half(metrics.cool_stability);
    let convergence = or_half(metrics.convergence);

    let score = 0.3 * (1.0 - entropy)
        + 0.3 * (1.0 - (complexity / 80.0).min(1.0))
        + 0.2 * stability
        + 0.2 * convergence;

    or_half(score).clamp(0.0, 1.0)
}

const fn or_half(value: f64) -> f64 {
    if value.is_nan() {
        0.5
    } else {
        value
    }
}
