use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::category::Classification;
use crate::error::{PipelineError, Result};
use crate::guard::guarded_rewrite;
use crate::inference::{ContentView, time_limit_pattern};
use crate::rules::Template;

pub const STAGE_HEADER_CELL: &str = "! rowspan=\"2\" style=\"text-align: center;\" |Stage";

static DURATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+ minutes").expect("duration pattern"));

/// Engine phases. Rules run sorted by phase; declaration order breaks ties.
/// Locale remapping must finish before anything that matches file names or
/// numbers, and field fills run before the derived rewrites that read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    LocaleRemap,
    GuardedRemap,
    Placeholder,
    DerivedTitle,
    TimeLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SubstitutionRule {
    /// ` <source>.png]]` to ` <target>.png]]`.
    LocaleAsset,
    /// The stage's own `File:Map<word><NNN>` image becomes `value`.
    GuardedMapImage { value: &'static str },
    Literal {
        find: &'static str,
        replace: Template,
        required: bool,
    },
    /// `|<field> = ?` for each listed field.
    PlaceholderFields {
        fields: &'static [&'static str],
        value: Template,
    },
    DerivedTitle { fallback: Template },
    ExplanationBlock {
        find: &'static str,
        replace: &'static str,
    },
    TimeLimit,
}

impl SubstitutionRule {
    pub fn phase(&self) -> Phase {
        match self {
            Self::LocaleAsset => Phase::LocaleRemap,
            Self::GuardedMapImage { .. } => Phase::GuardedRemap,
            Self::Literal { .. } | Self::PlaceholderFields { .. } => Phase::Placeholder,
            Self::DerivedTitle { .. } => Phase::DerivedTitle,
            Self::ExplanationBlock { .. } | Self::TimeLimit => Phase::TimeLimit,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LocaleAsset => "locale_asset",
            Self::GuardedMapImage { .. } => "guarded_map_image",
            Self::Literal { .. } => "literal",
            Self::PlaceholderFields { .. } => "placeholder_fields",
            Self::DerivedTitle { .. } => "derived_title",
            Self::ExplanationBlock { .. } => "explanation_block",
            Self::TimeLimit => "time_limit",
        }
    }

    /// Fields this rule promises to leave without a `?` value.
    pub fn resolved_fields(&self) -> &'static [&'static str] {
        match self {
            Self::PlaceholderFields { fields, .. } => *fields,
            Self::DerivedTitle { .. } => &["script"],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedRule {
    pub rule: &'static str,
    pub replacements: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
    pub text: String,
    pub applied: Vec<AppliedRule>,
}

pub fn apply(
    rules: &[SubstitutionRule],
    classification: &Classification,
    text: String,
) -> Result<Substituted> {
    let mut ordered: Vec<&SubstitutionRule> = rules.iter().collect();
    ordered.sort_by_key(|rule| rule.phase());

    let mut text = text;
    let mut applied = Vec::with_capacity(ordered.len());
    for rule in ordered {
        let (next, replacements) = apply_rule(rule, classification, text)?;
        tracing::debug!(rule = rule.name(), replacements, "substitution applied");
        applied.push(AppliedRule {
            rule: rule.name(),
            replacements,
        });
        text = next;
    }
    verify_resolved(rules, &text)?;
    Ok(Substituted { text, applied })
}

fn apply_rule(
    rule: &SubstitutionRule,
    classification: &Classification,
    text: String,
) -> Result<(String, usize)> {
    let request = &classification.request;
    match rule {
        SubstitutionRule::LocaleAsset => {
            if request.locale.source == request.locale.target {
                return Ok((text, 0));
            }
            let from = format!(" {}.png]]", request.locale.source);
            let to = format!(" {}.png]]", request.locale.target);
            Ok(replace_literal(text, &from, &to))
        }
        SubstitutionRule::GuardedMapImage { value } => {
            let index = format!("{:03}", request.chapter);
            let pattern = Regex::new(&format!(r"(File:Map\w+){}", regex::escape(&index)))?;
            let outcome = guarded_rewrite(&text, &pattern, value);
            Ok((outcome.text, outcome.replaced))
        }
        SubstitutionRule::Literal {
            find,
            replace,
            required,
        } => {
            if !text.contains(find) {
                if *required {
                    return Err(PipelineError::MissingPattern {
                        rule: rule.name(),
                        pattern: (*find).to_string(),
                    });
                }
                return Ok((text, 0));
            }
            let replacement = replace.render(request)?;
            Ok(replace_literal(text, find, &replacement))
        }
        SubstitutionRule::PlaceholderFields { fields, value } => {
            let pattern = placeholder_pattern(fields)?;
            if !pattern.is_match(&text) {
                return Ok((text, 0));
            }
            let value = value.render(request)?;
            let count = pattern.find_iter(&text).count();
            let replaced = pattern
                .replace_all(&text, |caps: &regex::Captures<'_>| {
                    let field = caps.get(1).map_or("", |group| group.as_str());
                    format!("|{field} = {value}")
                })
                .into_owned();
            Ok((replaced, count))
        }
        SubstitutionRule::DerivedTitle { fallback } => {
            let title = ContentView::new(&text).derived_title().map(str::to_string);
            match title {
                Some(title) => {
                    let (text, filled) =
                        replace_literal(text, "|script = ?", &format!("|script = {title} Lv.X"));
                    let header = STAGE_HEADER_CELL.replace("|Stage", &format!("|{title}"));
                    let (text, relabeled) = replace_literal(text, STAGE_HEADER_CELL, &header);
                    Ok((text, filled + relabeled))
                }
                None => {
                    tracing::warn!("no tabber title found; script field falls back to page name");
                    let fallback = fallback.render(request)?;
                    Ok(replace_literal(
                        text,
                        "|script = ?",
                        &format!("|script = {fallback}"),
                    ))
                }
            }
        }
        SubstitutionRule::ExplanationBlock { find, replace } => {
            if !text.contains(find) {
                tracing::warn!(pattern = *find, "strategy placeholder not found; explanation skipped");
                return Ok((text, 0));
            }
            Ok(replace_literal(text, find, replace))
        }
        SubstitutionRule::TimeLimit => {
            let limit = ContentView::new(&text)
                .time_limit()
                .map(str::to_string)
                .ok_or_else(|| PipelineError::MissingPattern {
                    rule: rule.name(),
                    pattern: time_limit_pattern().to_string(),
                })?;
            let count = DURATION_PATTERN.find_iter(&text).count();
            let replaced = DURATION_PATTERN
                .replace_all(&text, regex::NoExpand(&limit))
                .into_owned();
            Ok((replaced, count))
        }
    }
}

fn replace_literal(text: String, from: &str, to: &str) -> (String, usize) {
    let count = text.matches(from).count();
    if count == 0 {
        return (text, 0);
    }
    (text.replace(from, to), count)
}

fn placeholder_pattern(fields: &[&str]) -> Result<Regex> {
    let alternatives = fields
        .iter()
        .map(|field| regex::escape(field))
        .collect::<Vec<_>>()
        .join("|");
    Ok(Regex::new(&format!(r"\|({alternatives}) = \?"))?)
}

/// Fails when a field the rule set promised to fill still reads `?`.
pub fn verify_resolved(rules: &[SubstitutionRule], text: &str) -> Result<()> {
    for field in rules.iter().flat_map(SubstitutionRule::resolved_fields) {
        let leftover = format!("|{field} = ?");
        if text.contains(&leftover) {
            return Err(PipelineError::UnresolvedPlaceholder(leftover));
        }
    }
    Ok(())
}
