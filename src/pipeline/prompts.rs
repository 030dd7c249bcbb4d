//! Instruction templates for every provider call.
//!
//! Templates use `{{variable_name}}` syntax. Unknown variables are left as-is.
//! Defaults are built in; any of them can be replaced from `[prompts]` in
//! transmute.toml.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderRequest;

const MUTATION_SYSTEM: &str = "You are the mutation engine of a transmutation loop. \
Rewrite the input with bold stylistic divergence: new structure, new phrasing, new idioms. \
Keep it recognizably about the same subject. Output only the rewritten text.";

const MUTATION_TEMPLATE: &str = "{{input}}";

const STABILIZATION_SYSTEM: &str = "You are the stabilization engine of a transmutation loop. \
You receive GROUND TRUTH and MUTATED MATERIAL. Rewrite the ground truth using the style of the \
mutated material. Every fact, name, number and behavior must come from the ground truth; \
never invent facts that are not in it. Output only the rewritten text, without commentary.";

const STABILIZATION_TEMPLATE: &str = "GROUND TRUTH:\n{{source}}\n\nMUTATED MATERIAL:\n{{mutated}}";

const RECOVERY_SYSTEM: &str = "The previous rewrite came back empty. Restore the following \
text to a clean, working state. Output only the restored text.";

const RECOVERY_TEMPLATE: &str = "{{current}}";

const ANALYSIS_SYSTEM: &str = "You are a senior code reviewer. Respond with strict JSON only, \
no markdown, matching: {\"summary\": string, \"issues\": [string], \"refactorGoals\": [string], \
\"highLevelPlan\": [string]}";

const ANALYSIS_TEMPLATE: &str = "Language: {{language}}\nGoals:\n{{goals}}\n\nCode:\n{{code}}";

const APPLY_SYSTEM: &str = "You are a refactoring engine. Apply the plan to the code. \
Respond with only the raw refactored code: no prose, no explanations, no markdown fences.";

const APPLY_TEMPLATE: &str = "Language: {{language}}\nPlan:\n{{plan}}\n\nCode:\n{{code}}";

/// Expand `{{variable_name}}` patterns in a template string.
///
/// Looks up each `{{name}}` in `vars`. If found, replaces it with the value;
/// otherwise the `{{name}}` literal stays in the output. Partial syntax like
/// `{{incomplete` is also left as-is.
#[must_use]
#[allow(clippy::implicit_hasher)]
pub fn expand_template(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        result.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];

        match after_open.find("}}") {
            Some(close)
                if close > 0 && !after_open[..close].contains(char::is_whitespace) =>
            {
                let name = &after_open[..close];
                match vars.get(name) {
                    Some(value) => result.push_str(value),
                    None => result.push_str(&rest[open..open + 2 + close + 2]),
                }
                rest = &after_open[close + 2..];
            }
            _ => {
                result.push_str("{{");
                rest = after_open;
            }
        }
    }

    result.push_str(rest);
    result
}

/// Optional replacements for the built-in instructions, as read from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptOverrides {
    /// System instruction for the mutation phase
    pub mutation_system: Option<String>,
    /// User prompt for the mutation phase (`{{input}}`)
    pub mutation_template: Option<String>,
    /// System instruction for the stabilization phase
    pub stabilization_system: Option<String>,
    /// User prompt for stabilization (`{{source}}`, `{{mutated}}`)
    pub stabilization_template: Option<String>,
    /// System instruction for emergency recovery
    pub recovery_system: Option<String>,
    /// User prompt for recovery (`{{current}}`)
    pub recovery_template: Option<String>,
    /// System instruction for refactor analysis
    pub analysis_system: Option<String>,
    /// User prompt for analysis (`{{language}}`, `{{goals}}`, `{{code}}`)
    pub analysis_template: Option<String>,
    /// System instruction for applying a refactor plan
    pub apply_system: Option<String>,
    /// User prompt for apply (`{{language}}`, `{{plan}}`, `{{code}}`)
    pub apply_template: Option<String>,
}

/// The resolved instruction set used by both pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// Mutation system instruction
    pub mutation_system: String,
    /// Mutation user template
    pub mutation_template: String,
    /// Stabilization system instruction
    pub stabilization_system: String,
    /// Stabilization user template
    pub stabilization_template: String,
    /// Recovery system instruction
    pub recovery_system: String,
    /// Recovery user template
    pub recovery_template: String,
    /// Analysis system instruction
    pub analysis_system: String,
    /// Analysis user template
    pub analysis_template: String,
    /// Apply system instruction
    pub apply_system: String,
    /// Apply user template
    pub apply_template: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            mutation_system: MUTATION_SYSTEM.to_string(),
            mutation_template: MUTATION_TEMPLATE.to_string(),
            stabilization_system: STABILIZATION_SYSTEM.to_string(),
            stabilization_template: STABILIZATION_TEMPLATE.to_string(),
            recovery_system: RECOVERY_SYSTEM.to_string(),
            recovery_template: RECOVERY_TEMPLATE.to_string(),
            analysis_system: ANALYSIS_SYSTEM.to_string(),
            analysis_template: ANALYSIS_TEMPLATE.to_string(),
            apply_system: APPLY_SYSTEM.to_string(),
            apply_template: APPLY_TEMPLATE.to_string(),
        }
    }
}

impl PromptSet {
    /// Defaults with any configured overrides applied.
    #[must_use]
    pub fn with_overrides(overrides: &PromptOverrides) -> Self {
        let defaults = Self::default();
        let pick = |value: &Option<String>, fallback: String| value.clone().unwrap_or(fallback);

        Self {
            mutation_system: pick(&overrides.mutation_system, defaults.mutation_system),
            mutation_template: pick(&overrides.mutation_template, defaults.mutation_template),
            stabilization_system: pick(
                &overrides.stabilization_system,
                defaults.stabilization_system,
            ),
            stabilization_template: pick(
                &overrides.stabilization_template,
                defaults.stabilization_template,
            ),
            recovery_system: pick(&overrides.recovery_system, defaults.recovery_system),
            recovery_template: pick(&overrides.recovery_template, defaults.recovery_template),
            analysis_system: pick(&overrides.analysis_system, defaults.analysis_system),
            analysis_template: pick(&overrides.analysis_template, defaults.analysis_template),
            apply_system: pick(&overrides.apply_system, defaults.apply_system),
            apply_template: pick(&overrides.apply_template, defaults.apply_template),
        }
    }

    /// Mutation request for the current text.
    #[must_use]
    pub fn mutation(&self, input: &str, temperature: f32) -> ProviderRequest {
        let vars = HashMap::from([("input", input)]);
        ProviderRequest::new(
            self.mutation_system.clone(),
            expand_template(&self.mutation_template, &vars),
            temperature,
        )
    }

    /// Stabilization request anchored on the source and the mutated material.
    #[must_use]
    pub fn stabilization(&self, source: &str, mutated: &str, temperature: f32) -> ProviderRequest {
        let vars = HashMap::from([("source", source), ("mutated", mutated)]);
        ProviderRequest::new(
            self.stabilization_system.clone(),
            expand_template(&self.stabilization_template, &vars),
            temperature,
        )
    }

    /// Emergency recovery request for the last good text.
    #[must_use]
    pub fn recovery(&self, current: &str, temperature: f32) -> ProviderRequest {
        let vars = HashMap::from([("current", current)]);
        ProviderRequest::new(
            self.recovery_system.clone(),
            expand_template(&self.recovery_template, &vars),
            temperature,
        )
    }

    /// Refactor analysis request.
    #[must_use]
    pub fn analysis(&self, code: &str, language: &str, goals: &[String], temperature: f32) -> ProviderRequest {
        let goals = bullet_list(goals, "(none specified)");
        let vars = HashMap::from([("code", code), ("language", language), ("goals", goals.as_str())]);
        ProviderRequest::new(
            self.analysis_system.clone(),
            expand_template(&self.analysis_template, &vars),
            temperature,
        )
    }

    /// Refactor apply request carrying the plan.
    #[must_use]
    pub fn apply(&self, code: &str, language: &str, plan: &[String], temperature: f32) -> ProviderRequest {
        let plan = bullet_list(plan, "(no plan; improve readability without changing behavior)");
        let vars = HashMap::from([("code", code), ("language", language), ("plan", plan.as_str())]);
        ProviderRequest::new(
            self.apply_system.clone(),
            expand_template(&self.apply_template, &vars),
            temperature,
        )
    }
}

fn bullet_list(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
