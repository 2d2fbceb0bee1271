use serde::Serialize;

use crate::category::{StageCategory, StageRequest};
use crate::error::{PipelineError, Result};
use crate::inference::{Condition, EVENT_SENTINEL};
use crate::substitute::SubstitutionRule;

const PAGE_NAME: Template = Template("{{subst:PAGENAME}}");
const SUB_PAGE_NAME: Template = Template("{{subst:SUBPAGENAME}}");
const COLLABORATION_EVENT: Template = Template("|event = [[${collab} Collaboration Event]]");
const MAP_IMAGE_SENTINEL: &str = "000";

const LIMITED_CONTENT: BannerRule = BannerRule::new("LimitedContent");
const STRATEGY_NEEDED: BannerRule = BannerRule::new("StrategyNeeded");
const TRANSLATION_NEEDED: BannerRule = BannerRule::new("TranslationNeeded");

const NO_CONTINUES: &str = "[[No Continues]]";
const NO_CONTINUES_RESTRICTION: &str = "|restriction = [[No Continues]]";
const SCORE_REWARD: &str = "|score reward = ";

const NO_CONTINUE_STAGES: Template = Template("[[Category:No Continue Stages]]");
const TIMED_SCORE_STAGES: Template = Template("[[Category:Timed Score Stages]]");
const GAUNTLETS: Template = Template("[[Category:Gauntlets]]");
const EVENT_STAGES: Template = Template("[[Category:Event Stages]]");
const SPECIAL_STAGES_LIST: Template = Template("{{SpecialStages List}}");
const COLLABORATION_NAME: Template = Template("{{${collab}}}");
const COLLABORATION_STAGES_LIST: Template = Template("{{CollaborationStages List}}");
const COLLABORATION_STAGES: Template = Template("[[Category:Collaboration Stages]]");

const RANKING_STRATEGY_PLACEHOLDER: &str = "==Strategy==\n-";
const RANKING_EXPLANATION: &str = "==Explanation==
*You have three minutes to defeat as many enemies as possible.
*You have unlimited Speed Ups and Cat CPUs but no other power ups.
*The base has unlimited health and can attack Cats that are close to it.
*You gain no money for defeating enemies.
*Defeating enemies will score points and the number varies.
*The total points will decrease overtime.";

/// Text with `${name}` slots filled from the request. Wiki braces (`{{`) pass
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template(pub &'static str);

impl Template {
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn render(&self, request: &StageRequest) -> Result<String> {
        let mut output = String::with_capacity(self.0.len());
        let mut rest = self.0;
        while let Some(start) = rest.find("${") {
            output.push_str(&rest[..start]);
            let slot = &rest[start + 2..];
            let Some(end) = slot.find('}') else {
                return Err(PipelineError::UnresolvedPlaceholder(format!(
                    "unterminated slot in `{}`",
                    self.0
                )));
            };
            output.push_str(&slot_value(&slot[..end], request)?);
            rest = &slot[end + 1..];
        }
        output.push_str(rest);
        Ok(output)
    }
}

fn slot_value(name: &str, request: &StageRequest) -> Result<String> {
    match name {
        "collab" => request
            .collaboration
            .clone()
            .ok_or(PipelineError::MissingValue("collab")),
        "round" => Ok(request.round_label()),
        "sub_chapter" => Ok(request.sub_chapter().to_string()),
        "chapter" => Ok(request.chapter.to_string()),
        "map" => Ok(request.map.to_string()),
        "stage_type" => Ok(request.stage_type.clone()),
        _ => Err(PipelineError::UnresolvedPlaceholder(format!("${{{name}}}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BannerRule {
    pub name: Template,
}

impl BannerRule {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Template(name),
        }
    }

    pub fn render(&self, request: &StageRequest) -> Result<String> {
        Ok(format!("{{{{{}}}}}", self.name.render(request)?))
    }
}

/// A trailing line (template or category tag) emitted when `when` holds.
/// Static tags use `Condition::Always`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRule {
    pub when: Condition,
    pub tag: Template,
}

impl CategoryRule {
    pub const fn fixed(tag: Template) -> Self {
        Self {
            when: Condition::Always,
            tag,
        }
    }

    pub const fn when(when: Condition, tag: Template) -> Self {
        Self { when, tag }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub category: StageCategory,
    /// Arguments passed to the generator after the configured program prefix.
    pub generator: Vec<Template>,
    pub banners: Vec<BannerRule>,
    pub templates: Vec<CategoryRule>,
    pub categories: Vec<CategoryRule>,
    pub substitutions: Vec<SubstitutionRule>,
}

impl RuleSet {
    pub fn generator_args(&self, request: &StageRequest) -> Result<Vec<String>> {
        self.generator
            .iter()
            .map(|arg| arg.render(request))
            .collect()
    }

    pub fn render_banners(&self, request: &StageRequest) -> Result<Vec<String>> {
        self.banners
            .iter()
            .map(|banner| banner.render(request))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Registry {
    rule_sets: Vec<RuleSet>,
}

impl Registry {
    pub fn builtin() -> Self {
        Self {
            rule_sets: StageCategory::ALL.into_iter().map(builtin_rule_set).collect(),
        }
    }

    pub fn lookup(&self, category: StageCategory) -> Result<&RuleSet> {
        self.rule_sets
            .iter()
            .find(|set| set.category == category)
            .ok_or_else(|| PipelineError::UnsupportedCategory(category.as_str().to_string()))
    }

    pub fn rule_sets(&self) -> &[RuleSet] {
        &self.rule_sets
    }
}

fn builtin_rule_set(category: StageCategory) -> RuleSet {
    let stage_selector = Template("${stage_type} ${chapter} ${map}");
    match category {
        StageCategory::Event => RuleSet {
            category,
            generator: vec![Template("stage"), stage_selector],
            banners: vec![LIMITED_CONTENT, STRATEGY_NEEDED, TRANSLATION_NEEDED],
            templates: vec![CategoryRule::fixed(SPECIAL_STAGES_LIST)],
            categories: vec![
                CategoryRule::fixed(EVENT_STAGES),
                CategoryRule::when(Condition::StageType(&["a"]), GAUNTLETS),
                CategoryRule::when(Condition::Contains(NO_CONTINUES), NO_CONTINUE_STAGES),
                CategoryRule::when(Condition::Contains(SCORE_REWARD), TIMED_SCORE_STAGES),
            ],
            substitutions: vec![
                SubstitutionRule::LocaleAsset,
                SubstitutionRule::PlaceholderFields {
                    fields: &["script"],
                    value: PAGE_NAME,
                },
            ],
        },
        StageCategory::Collaboration => RuleSet {
            category,
            generator: vec![Template("stage"), stage_selector],
            banners: vec![LIMITED_CONTENT, STRATEGY_NEEDED, TRANSLATION_NEEDED],
            templates: vec![
                CategoryRule::fixed(COLLABORATION_NAME),
                CategoryRule::fixed(COLLABORATION_STAGES_LIST),
            ],
            categories: vec![
                CategoryRule::fixed(COLLABORATION_STAGES),
                CategoryRule::when(Condition::Contains(NO_CONTINUES), NO_CONTINUE_STAGES),
                CategoryRule::when(Condition::Contains(SCORE_REWARD), TIMED_SCORE_STAGES),
                CategoryRule::when(Condition::StageType(&["ca"]), GAUNTLETS),
            ],
            substitutions: vec![
                SubstitutionRule::LocaleAsset,
                SubstitutionRule::Literal {
                    find: EVENT_SENTINEL,
                    replace: COLLABORATION_EVENT,
                    required: true,
                },
                SubstitutionRule::PlaceholderFields {
                    fields: &["script"],
                    value: PAGE_NAME,
                },
            ],
        },
        StageCategory::Gauntlet => RuleSet {
            category,
            generator: vec![
                Template("gauntlet"),
                Template("${chapter}"),
                Template("${map}"),
                Template("-l=warn"),
            ],
            banners: vec![LIMITED_CONTENT, STRATEGY_NEEDED, TRANSLATION_NEEDED],
            templates: vec![
                CategoryRule::when(Condition::Collaboration, COLLABORATION_NAME),
                CategoryRule::when(Condition::Collaboration, COLLABORATION_STAGES_LIST),
                CategoryRule::when(Condition::NotCollaboration, SPECIAL_STAGES_LIST),
            ],
            categories: vec![
                CategoryRule::when(Condition::Collaboration, COLLABORATION_STAGES),
                CategoryRule::when(
                    Condition::Contains(NO_CONTINUES_RESTRICTION),
                    NO_CONTINUE_STAGES,
                ),
                CategoryRule::fixed(GAUNTLETS),
            ],
            substitutions: vec![
                SubstitutionRule::LocaleAsset,
                SubstitutionRule::Literal {
                    find: EVENT_SENTINEL,
                    replace: COLLABORATION_EVENT,
                    required: false,
                },
                SubstitutionRule::DerivedTitle {
                    fallback: PAGE_NAME,
                },
            ],
        },
        StageCategory::Colosseum => RuleSet {
            category,
            generator: vec![Template("stage"), stage_selector],
            banners: vec![
                BannerRule::new("DISPLAYTITLE:${round}"),
                LIMITED_CONTENT,
                STRATEGY_NEEDED,
            ],
            templates: vec![CategoryRule::fixed(SPECIAL_STAGES_LIST)],
            categories: vec![
                CategoryRule::fixed(EVENT_STAGES),
                CategoryRule::fixed(Template("[[Category:Restriction Stages]]")),
            ],
            substitutions: vec![
                SubstitutionRule::LocaleAsset,
                SubstitutionRule::GuardedMapImage {
                    value: MAP_IMAGE_SENTINEL,
                },
                SubstitutionRule::PlaceholderFields {
                    fields: &["romaji", "jpname", "script"],
                    value: Template("${round}"),
                },
            ],
        },
        StageCategory::ZeroLegends => RuleSet {
            category,
            generator: vec![Template("stage"), stage_selector],
            banners: vec![LIMITED_CONTENT, STRATEGY_NEEDED],
            templates: vec![CategoryRule::fixed(Template("{{LegendStages}}"))],
            categories: vec![
                CategoryRule::fixed(Template("[[Category:Sub-chapter ${sub_chapter} Stages]]")),
                CategoryRule::fixed(Template("[[Category:Zero Legends Stages]]")),
            ],
            substitutions: vec![
                SubstitutionRule::LocaleAsset,
                SubstitutionRule::PlaceholderFields {
                    fields: &["script"],
                    value: PAGE_NAME,
                },
            ],
        },
        StageCategory::RankingDojo => RuleSet {
            category,
            generator: vec![Template("stage"), stage_selector, Template("-l=warn")],
            banners: vec![LIMITED_CONTENT],
            templates: vec![CategoryRule::fixed(Template("{{DojoStages}}"))],
            categories: vec![CategoryRule::fixed(Template(
                "[[Category:Ranking Dojo Stages]]",
            ))],
            substitutions: vec![
                SubstitutionRule::LocaleAsset,
                SubstitutionRule::PlaceholderFields {
                    fields: &["script"],
                    value: SUB_PAGE_NAME,
                },
                SubstitutionRule::ExplanationBlock {
                    find: RANKING_STRATEGY_PLACEHOLDER,
                    replace: RANKING_EXPLANATION,
                },
                SubstitutionRule::TimeLimit,
            ],
        },
    }
}
