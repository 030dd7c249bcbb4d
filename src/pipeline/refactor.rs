//! Refactor pipeline
//!
//! Single-shot analyze → apply. The first call asks the model for a JSON
//! review of the code; the second applies the resulting plan. Both calls go
//! straight to the provider, without retries.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::prompts::PromptSet;
use super::text::{extract_json_object, strip_code_fences};
use crate::metrics::CycleMetrics;
use crate::provider::{ProviderError, TextProvider};

/// Temperature of the analysis call.
pub const ANALYSIS_TEMPERATURE: f32 = 0.2;

/// Temperature of the apply call.
pub const APPLY_TEMPERATURE: f32 = 0.2;

const FALLBACK_SUMMARY: &str = "Analysis unavailable; applying the requested goals directly.";

/// A single finding from the analysis call.
///
/// Models return plain strings, small objects with loosely named keys, or
/// occasionally something else entirely. None of these fails the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefactorIssue {
    /// Free-form finding
    Text(String),
    /// Structured finding
    Detailed {
        /// Short name of the issue
        #[serde(default, alias = "issue", alias = "name", alias = "problem")]
        title: Option<String>,
        /// Longer explanation
        #[serde(default)]
        description: Option<String>,
        /// Severity as reported by the model
        #[serde(default)]
        severity: Option<String>,
        /// Line the issue refers to
        #[serde(default)]
        line: Option<u32>,
    },
    /// Anything else, kept verbatim
    Other(serde_json::Value),
}

impl fmt::Display for RefactorIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Detailed {
                title,
                description,
                severity,
                line,
            } => {
                if let Some(severity) = severity {
                    write!(f, "[{severity}] ")?;
                }
                match (title, description) {
                    (Some(title), _) => f.write_str(title)?,
                    (None, Some(description)) => f.write_str(description)?,
                    (None, None) => f.write_str("unnamed issue")?,
                }
                if let Some(line) = line {
                    write!(f, " (line {line})")?;
                }
                if let (Some(_), Some(description)) = (title, description) {
                    write!(f, ": {description}")?;
                }
                Ok(())
            }
            Self::Other(value) => write!(f, "{value}"),
        }
    }
}

/// Structured review returned by the analysis call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefactorAnalysis {
    /// One-paragraph summary of the code
    pub summary: String,
    /// Problems found
    pub issues: Vec<RefactorIssue>,
    /// Goals the refactor should reach
    pub refactor_goals: Vec<String>,
    /// Ordered steps to get there
    pub high_level_plan: Vec<String>,
}

impl RefactorAnalysis {
    /// Minimal analysis used when the model's JSON can't be read.
    #[must_use]
    pub fn fallback(goals: &[String]) -> Self {
        Self {
            summary: FALLBACK_SUMMARY.to_string(),
            issues: Vec::new(),
            refactor_goals: goals.to_vec(),
            high_level_plan: Vec::new(),
        }
    }

    /// Parse the analysis out of a model response.
    ///
    /// Tolerates code fences and chatter around the object. Returns `None`
    /// when no JSON object can be decoded.
    #[must_use]
    pub fn parse(response: &str) -> Option<Self> {
        let unfenced = strip_code_fences(response);
        serde_json::from_str(extract_json_object(&unfenced)).ok()
    }

    /// Steps handed to the apply call: the plan, or the goals if there is none.
    #[must_use]
    pub fn steps(&self) -> &[String] {
        if self.high_level_plan.is_empty() {
            &self.refactor_goals
        } else {
            &self.high_level_plan
        }
    }
}

/// Result of one `optimize` call. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefactorReport {
    /// Code as supplied
    pub original_code: String,
    /// Code as returned by the apply call
    pub optimized_code: String,
    /// Review that drove the refactor
    pub analysis: RefactorAnalysis,
    /// Self-compared metrics of the original code
    pub metrics_before: CycleMetrics,
    /// Self-compared metrics of the optimized code
    pub metrics_after: CycleMetrics,
    /// RSI of the original code
    pub rsi_before: f64,
    /// RSI of the optimized code
    pub rsi_after: f64,
}

impl RefactorReport {
    /// RSI change from before to after.
    #[must_use]
    pub fn rsi_gain(&self) -> f64 {
        self.rsi_after - self.rsi_before
    }
}

/// Analyze → apply refactoring against one provider.
pub struct RefactorPipeline {
    provider: Arc<dyn TextProvider>,
    prompts: PromptSet,
}

impl RefactorPipeline {
    /// Pipeline with the default prompts.
    #[must_use]
    pub fn new(provider: Arc<dyn TextProvider>) -> Self {
        Self {
            provider,
            prompts: PromptSet::default(),
        }
    }

    /// Replace the instruction templates.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Review `code`, apply the plan and score both versions.
    ///
    /// # Errors
    ///
    /// Returns the provider error from either call unchanged.
    pub async fn optimize(
        &self,
        code: &str,
        language: &str,
        goals: &[String],
    ) -> Result<RefactorReport, ProviderError> {
        info!(provider = self.provider.name(), language, "analyzing code");

        let request = self
            .prompts
            .analysis(code, language, goals, ANALYSIS_TEMPERATURE);
        let response = self.provider.generate_text(&request).await?;

        let analysis = RefactorAnalysis::parse(&response).unwrap_or_else(|| {
            warn!("analysis response was not valid JSON, using fallback");
            debug!(response = %response, "unparsed analysis");
            RefactorAnalysis::fallback(goals)
        });

        info!(steps = analysis.steps().len(), "applying refactor plan");
        let request = self
            .prompts
            .apply(code, language, analysis.steps(), APPLY_TEMPERATURE);
        let optimized_code = strip_code_fences(&self.provider.generate_text(&request).await?);

        let metrics_before = CycleMetrics::of_text(code);
        let metrics_after = CycleMetrics::of_text(&optimized_code);

        Ok(RefactorReport {
            original_code: code.to_string(),
            optimized_code,
            analysis,
            rsi_before: metrics_before.rsi(),
            rsi_after: metrics_after.rsi(),
            metrics_before,
            metrics_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderRequest;
    use crate::testutil::{plain_prompts, step_of, FnProvider, Step};

    const ANALYSIS_JSON: &str = r#"{
        "summary": "Nested loops",
        "issues": ["deep nesting", {"title": "magic number", "severity": "low", "line": 3}],
        "refactorGoals": ["flatten"],
        "highLevelPlan": ["extract helper", "name constant"]
    }"#;

    fn pipeline(provider: Arc<dyn TextProvider>) -> RefactorPipeline {
        RefactorPipeline::new(provider).with_prompts(plain_prompts())
    }

    #[test]
    fn test_parse_full_analysis() {
        let analysis = RefactorAnalysis::parse(ANALYSIS_JSON).unwrap();
        assert_eq!(analysis.summary, "Nested loops");
        assert_eq!(analysis.refactor_goals, vec!["flatten"]);
        assert_eq!(analysis.high_level_plan.len(), 2);
        assert_eq!(analysis.issues[0], RefactorIssue::Text("deep nesting".to_string()));
        assert_eq!(analysis.issues[1].to_string(), "[low] magic number (line 3)");
    }

    #[test]
    fn test_parse_keeps_analysis_with_loosely_shaped_issues() {
        let response = r#"{
            "summary": "Works, but opaque",
            "issues": [
                {"issue": "magic number", "severity": "low"},
                {"description": "no docs"},
                {"title": "bad line", "line": "twelve"},
                42
            ],
            "refactorGoals": ["name constants"],
            "highLevelPlan": ["introduce LIMIT"]
        }"#;

        let analysis = RefactorAnalysis::parse(response).unwrap();
        assert_eq!(analysis.summary, "Works, but opaque");
        assert_eq!(analysis.high_level_plan, vec!["introduce LIMIT"]);
        assert_eq!(analysis.issues.len(), 4);
        assert_eq!(analysis.issues[0].to_string(), "[low] magic number");
        assert_eq!(analysis.issues[1].to_string(), "no docs");
        assert!(matches!(analysis.issues[2], RefactorIssue::Other(_)));
        assert_eq!(analysis.issues[3].to_string(), "42");
    }

    #[test]
    fn test_parse_fenced_analysis_with_missing_fields() {
        let analysis = RefactorAnalysis::parse("```json\n{\"summary\": \"ok\"}\n```").unwrap();
        assert_eq!(analysis.summary, "ok");
        assert!(analysis.issues.is_empty());
        assert!(analysis.high_level_plan.is_empty());
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(RefactorAnalysis::parse("I think the code is fine.").is_none());
    }

    #[test]
    fn test_steps_fall_back_to_goals() {
        let analysis = RefactorAnalysis::fallback(&["add types".to_string()]);
        assert_eq!(analysis.steps(), ["add types".to_string()]);
    }

    #[tokio::test]
    async fn test_optimize_applies_parsed_plan() {
        let provider = FnProvider::new(|request: &ProviderRequest| match step_of(request) {
            Step::Analyze => Ok(ANALYSIS_JSON.to_string()),
            Step::Apply => Ok("```python\ndef helper():\n    return 1\n```".to_string()),
            other => panic!("unexpected step {other:?}"),
        });

        let report = pipeline(provider.clone())
            .optimize("for a in b:\n    for c in d:\n        x = 3", "python", &[])
            .await
            .unwrap();

        assert_eq!(report.analysis.summary, "Nested loops");
        assert_eq!(report.optimized_code, "def helper():\n    return 1");
        assert_eq!(provider.call_count(), 2);

        let apply = &provider.calls()[1];
        assert!(apply.user_prompt.contains("- extract helper\n- name constant"));
        assert!((apply.temperature - APPLY_TEMPERATURE).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_optimize_falls_back_on_bad_json() {
        let provider = FnProvider::new(|request: &ProviderRequest| match step_of(request) {
            Step::Analyze => Ok("not json at all".to_string()),
            _ => Ok("y = 2".to_string()),
        });
        let goals = vec!["simplify".to_string()];

        let report = pipeline(provider.clone())
            .optimize("x = 1", "python", &goals)
            .await
            .unwrap();

        assert_eq!(report.analysis.summary, FALLBACK_SUMMARY);
        assert_eq!(report.analysis.refactor_goals, goals);
        assert!(report.analysis.issues.is_empty());
        assert!(provider.calls()[1].user_prompt.contains("- simplify"));
    }

    #[tokio::test]
    async fn test_metrics_are_self_compared() {
        let provider = FnProvider::new(|request: &ProviderRequest| match step_of(request) {
            Step::Analyze => Ok("{}".to_string()),
            _ => Ok("if a:\n    return b".to_string()),
        });

        let report = pipeline(provider)
            .optimize("x = 1", "python", &[])
            .await
            .unwrap();

        assert_eq!(report.metrics_before, CycleMetrics::of_text("x = 1"));
        assert_eq!(report.metrics_after, CycleMetrics::of_text("if a:\n    return b"));
        assert!((report.metrics_after.convergence - 1.0).abs() < f64::EPSILON);
        assert!((report.rsi_after - report.metrics_after.rsi()).abs() < f64::EPSILON);
        assert!((report.rsi_gain() - (report.rsi_after - report.rsi_before)).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_analysis_failure_propagates() {
        let provider = FnProvider::new(|_: &ProviderRequest| {
            Err(ProviderError::with_status(500, "internal"))
        });

        let err = pipeline(provider.clone())
            .optimize("x = 1", "python", &[])
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_apply_failure_propagates() {
        let provider = FnProvider::new(|request: &ProviderRequest| match step_of(request) {
            Step::Analyze => Ok("{}".to_string()),
            _ => Err(ProviderError::with_status(401, "unauthorized")),
        });

        let err = pipeline(provider)
            .optimize("x = 1", "python", &[])
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "unauthorized");
    }
}
