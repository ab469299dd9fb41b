use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::PlanStep;

pub const PLANNER_SYSTEM_PROMPT: &str = "You are a concise planner.";

const TITLE_CHARS: usize = 80;
const JSON_FALLBACK_CHARS: usize = 500;

#[allow(clippy::expect_used)]
static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)[\.\)]\s*(.+)$").expect("numbered step pattern"));

/// Shape the planner asks the model to answer in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanFormat {
    #[default]
    Numbered,
    Json,
}

impl PlanFormat {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Numbered => "numbered",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for PlanFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PlanFormat {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numbered" => Ok(Self::Numbered),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown plan format: {s}")),
        }
    }
}

#[must_use]
pub fn planning_prompt(goal: &str, format: PlanFormat) -> String {
    match format {
        PlanFormat::Numbered => format!(
            "Break the goal into a numbered sequence of discrete steps. Goal:\n{goal}\n\nReturn only numbered steps."
        ),
        PlanFormat::Json => format!(
            "Break the goal into discrete steps. Goal:\n{goal}\n\nReturn only JSON of the form {{\"steps\": [{{\"title\": \"...\", \"description\": \"...\"}}]}}."
        ),
    }
}

/// Lines shaped `N.` or `N)`; when none match, blank-line separated blocks.
#[must_use]
pub fn parse_numbered_steps(text: &str) -> Vec<String> {
    let numbered: Vec<String> = text
        .lines()
        .filter_map(|line| NUMBERED_LINE.captures(line.trim()))
        .filter_map(|caps| caps.get(2).map(|m| m.as_str().trim().to_string()))
        .filter(|step| !step.is_empty())
        .collect();
    if !numbered.is_empty() {
        return numbered;
    }

    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[derive(Deserialize)]
struct JsonPlan {
    steps: Vec<JsonStep>,
}

#[derive(Deserialize)]
struct JsonStep {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed.strip_prefix("```").map_or(trimmed, |rest| {
        rest.split_once('\n').map_or(rest, |(_lang, body)| body)
    });
    without_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// `{"steps": [{"title", "description"}]}` with optional markdown fences. Unparseable text
/// becomes one step holding its first 500 characters.
#[must_use]
pub fn parse_json_steps(text: &str) -> Vec<PlanStep> {
    let parsed = serde_json::from_str::<JsonPlan>(strip_code_fences(text)).ok();
    let steps: Vec<PlanStep> = parsed
        .map(|plan| {
            plan.steps
                .into_iter()
                .filter_map(|step| {
                    let description = step.description.unwrap_or_default().trim().to_string();
                    let title = step
                        .title
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| truncate_chars(&description, TITLE_CHARS));
                    if title.is_empty() && description.is_empty() {
                        return None;
                    }
                    let prompt = if description.is_empty() {
                        title.clone()
                    } else {
                        description
                    };
                    Some(PlanStep {
                        title: truncate_chars(&title, TITLE_CHARS),
                        prompt,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    if !steps.is_empty() {
        return steps;
    }

    let fallback = truncate_chars(text.trim(), JSON_FALLBACK_CHARS);
    if fallback.is_empty() {
        return Vec::new();
    }
    vec![PlanStep {
        title: truncate_chars(&fallback, TITLE_CHARS),
        prompt: fallback,
    }]
}

#[must_use]
pub fn parse_plan(text: &str, format: PlanFormat) -> Vec<PlanStep> {
    match format {
        PlanFormat::Numbered => parse_numbered_steps(text)
            .into_iter()
            .map(|step| PlanStep {
                title: truncate_chars(&step, TITLE_CHARS),
                prompt: step,
            })
            .collect(),
        PlanFormat::Json => parse_json_steps(text),
    }
}

#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
