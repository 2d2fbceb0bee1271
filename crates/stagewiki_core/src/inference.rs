use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::category::Classification;
use crate::rules::CategoryRule;

pub const EVENT_SENTINEL: &str = "|event = [[name]]";
pub const TABBER_MARKER: &str = "<tabber>";
pub const LEVEL_MARKER: &str = "Lv.";

const TIME_LIMIT_PATTERN: &str = r" = (\d+ minutes)";

static TIME_LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TIME_LIMIT_PATTERN).expect("time limit pattern"));

/// Read-only view over generator output. Every content predicate goes
/// through here so the rules never touch the raw string directly.
#[derive(Debug, Clone, Copy)]
pub struct ContentView<'a> {
    text: &'a str,
}

impl<'a> ContentView<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.text.contains(marker)
    }

    pub fn has_event_sentinel(&self) -> bool {
        self.contains(EVENT_SENTINEL)
    }

    /// Gauntlet tabbers start with the map name and then list one tab per
    /// level (`Lv.1`, `Lv.2`, ...). The name is everything before the first
    /// level marker.
    pub fn derived_title(&self) -> Option<&'a str> {
        if !self.contains(TABBER_MARKER) {
            return None;
        }
        let end = self.text.find(LEVEL_MARKER)?;
        let head = self.text[..end].trim_start();
        let title = head.strip_prefix(TABBER_MARKER).unwrap_or(head).trim();
        if title.is_empty() { None } else { Some(title) }
    }

    /// Configured duration, e.g. `3 minutes` from `|time limit = 3 minutes`.
    pub fn time_limit(&self) -> Option<&'a str> {
        TIME_LIMIT
            .captures(self.text)
            .and_then(|caps| caps.get(1))
            .map(|found| found.as_str())
    }
}

pub fn time_limit_pattern() -> &'static str {
    TIME_LIMIT_PATTERN
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Condition {
    Always,
    Collaboration,
    NotCollaboration,
    StageType(&'static [&'static str]),
    Contains(&'static str),
}

impl Condition {
    pub fn holds(&self, classification: &Classification, view: &ContentView<'_>) -> bool {
        match self {
            Self::Always => true,
            Self::Collaboration => classification.is_collaboration,
            Self::NotCollaboration => !classification.is_collaboration,
            Self::StageType(codes) => codes
                .iter()
                .any(|code| classification.request.stage_type.eq_ignore_ascii_case(code)),
            Self::Contains(marker) => view.contains(marker),
        }
    }

    pub fn is_content_predicate(&self) -> bool {
        matches!(self, Self::Contains(_))
    }
}

/// Evaluate rules once, in declaration order. Never removes anything a
/// static rule already produced.
pub fn evaluate<'r>(
    rules: &'r [CategoryRule],
    classification: &Classification,
    view: &ContentView<'_>,
) -> Vec<&'r CategoryRule> {
    let mut active = Vec::new();
    for rule in rules {
        let holds = rule.when.holds(classification, view);
        if rule.when.is_content_predicate() {
            tracing::debug!(tag = rule.tag.as_str(), holds, "content predicate");
        }
        if holds {
            active.push(rule);
        }
    }
    active
}

/// Drop repeated entries, keeping the first occurrence.
pub fn dedupe(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}
