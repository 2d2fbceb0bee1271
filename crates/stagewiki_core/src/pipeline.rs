use serde::Serialize;

use crate::category::{Classification, StageRequest, classify};
use crate::compose::{ArticleParts, compose};
use crate::error::Result;
use crate::inference::{ContentView, dedupe, evaluate};
use crate::rules::{CategoryRule, Registry};
use crate::substitute::{self, AppliedRule};

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub request: StageRequest,
    pub is_collaboration: bool,
    pub banners: Vec<String>,
    pub templates: Vec<String>,
    pub categories: Vec<String>,
    pub substitutions: Vec<AppliedRule>,
    pub text: String,
}

/// Article plus whatever the generator complained about on the way.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleReport {
    pub generator_warnings: Vec<String>,
    #[serde(flatten)]
    pub article: Article,
}

/// Raw text flows forward once: classify, infer (read-only), substitute,
/// compose.
pub fn process(registry: &Registry, request: StageRequest, raw: &str) -> Result<Article> {
    request.validate()?;
    let rule_set = registry.lookup(request.category)?;
    let classification = classify(request, raw);
    tracing::debug!(
        category = classification.request.category.as_str(),
        is_collaboration = classification.is_collaboration,
        "classified stage"
    );

    let view = ContentView::new(raw);
    let banners = rule_set.render_banners(&classification.request)?;
    let templates = render_active(&rule_set.templates, &classification, &view)?;
    let categories = render_active(&rule_set.categories, &classification, &view)?;

    let substituted = substitute::apply(
        &rule_set.substitutions,
        &classification,
        raw.trim().to_string(),
    )?;

    let text = compose(ArticleParts {
        banners: &banners,
        body: &substituted.text,
        templates: &templates,
        categories: &categories,
    });

    Ok(Article {
        request: classification.request,
        is_collaboration: classification.is_collaboration,
        banners,
        templates,
        categories,
        substitutions: substituted.applied,
        text,
    })
}

fn render_active(
    rules: &[CategoryRule],
    classification: &Classification,
    view: &ContentView<'_>,
) -> Result<Vec<String>> {
    let rendered = evaluate(rules, classification, view)
        .into_iter()
        .map(|rule| rule.tag.render(&classification.request))
        .collect::<Result<Vec<_>>>()?;
    Ok(dedupe(rendered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::StageCategory;
    use crate::error::PipelineError;
    use crate::substitute::STAGE_HEADER_CELL;

    fn run(request: StageRequest, raw: &str) -> Result<Article> {
        process(&Registry::builtin(), request, raw)
    }

    fn position(text: &str, needle: &str) -> usize {
        text.find(needle)
            .unwrap_or_else(|| panic!("missing `{needle}` in:\n{text}"))
    }

    #[test]
    fn event_article_matches_expected_layout() {
        let raw = "{{Stage Info\n|script = ?\n|image = [[File:Mapsn001 en.png]]\n}}\n";
        let request = StageRequest::new(StageCategory::Event, "s", 1, 0);
        let article = run(request, raw).expect("process");
        assert_eq!(
            article.text,
            "{{LimitedContent}}\n{{StrategyNeeded}}\n{{TranslationNeeded}}\n{{Stage Info\n|script = {{subst:PAGENAME}}\n|image = [[File:Mapsn001 ja.png]]\n}}\n\n{{SpecialStages List}}\n[[Category:Event Stages]]"
        );
    }

    #[test]
    fn event_content_predicates_append_categories() {
        let raw = "|restriction = [[No Continues]]\n|score reward = 10000";
        let request = StageRequest::new(StageCategory::Event, "a", 1, 0);
        let article = run(request, raw).expect("process");
        assert_eq!(
            article.categories,
            vec![
                "[[Category:Event Stages]]",
                "[[Category:Gauntlets]]",
                "[[Category:No Continue Stages]]",
                "[[Category:Timed Score Stages]]",
            ]
        );
    }

    #[test]
    fn banner_order_matches_declaration_for_every_category() {
        let registry = Registry::builtin();
        let raw = "|event = [[name]]\n|time limit = 3 minutes";
        for category in StageCategory::ALL {
            let request =
                StageRequest::new(category, "s", 1, 0).with_collaboration(Some("Merc Storia"));
            let expected = registry
                .lookup(category)
                .expect("rule set")
                .render_banners(&request)
                .expect("banners");
            let article = process(&registry, request, raw).expect("process");
            assert_eq!(article.banners, expected);
            let mut cursor = 0;
            for banner in &expected {
                let found = position(&article.text[cursor..], banner);
                cursor += found + banner.len();
            }
            assert!(article.text.starts_with(&expected[0]));
        }
    }

    #[test]
    fn collaboration_gauntlet_scenario() {
        let raw = "{{Stage Info\n|event = [[name]]\n|script = ?\n|restriction = [[No Continues]]\n}}";
        let request = StageRequest::new(StageCategory::Collaboration, "ca", 1, 5)
            .with_collaboration(Some("Street Fighter V Collaboration Event"));
        let article = run(request, raw).expect("process");
        let text = &article.text;
        assert!(text.contains("|event = [[Street Fighter V Collaboration Event]]"));
        assert!(text.contains("{{Street Fighter V}}\n{{CollaborationStages List}}"));
        assert!(text.contains("[[Category:Collaboration Stages]]"));
        assert!(text.contains("[[Category:No Continue Stages]]"));
        assert!(text.contains("[[Category:Gauntlets]]"));
        assert!(!text.contains("|script = ?"));
        assert!(position(text, "[[Category:No Continue Stages]]") < position(text, "[[Category:Gauntlets]]"));
    }

    #[test]
    fn collaboration_without_sentinel_is_fatal() {
        let request = StageRequest::new(StageCategory::Collaboration, "c", 1, 5)
            .with_collaboration(Some("Street Fighter V"));
        let error = run(request, "{{Stage Info\n|script = ?\n}}").expect_err("must fail");
        assert!(matches!(error, PipelineError::MissingPattern { .. }));
    }

    #[test]
    fn collaboration_without_name_is_fatal() {
        let request = StageRequest::new(StageCategory::Collaboration, "c", 1, 5);
        let error = run(request, "|event = [[name]]").expect_err("must fail");
        assert!(matches!(error, PipelineError::MissingValue("collab")));
    }

    #[test]
    fn ranking_dojo_scenario() {
        let raw = "{{Stage Info\n|script = ?\n|time limit = 3 minutes\n}}\n==Strategy==\n-\n==Notes==\nDefault is five minutes.";
        let request = StageRequest::new(StageCategory::RankingDojo, "", 12, 0);
        let article = run(request, raw).expect("process");
        let text = &article.text;
        assert!(text.starts_with("{{LimitedContent}}\n{{Stage Info"));
        assert!(text.contains("|script = {{subst:SUBPAGENAME}}"));
        assert!(text.contains(
            "==Explanation==\n*You have 3 minutes to defeat as many enemies as possible."
        ));
        assert!(text.contains("Default is 3 minutes."));
        assert!(!text.contains("three minutes"));
        assert!(!text.contains("==Strategy=="));
        assert!(text.ends_with("{{DojoStages}}\n[[Category:Ranking Dojo Stages]]"));
    }

    #[test]
    fn ranking_dojo_without_duration_is_fatal() {
        let request = StageRequest::new(StageCategory::RankingDojo, "", 12, 0);
        let error = run(request, "==Strategy==\n-").expect_err("must fail");
        assert!(matches!(error, PipelineError::MissingPattern { rule: "time_limit", .. }));
    }

    #[test]
    fn colosseum_round_scenario() {
        let raw = "{{Stage Info\n|script = ?\n|romaji = ?\n|jpname = ?\n|map = [[File:MapXYZ007 en.png]]\n|energy = 007\n}}";
        let request = StageRequest::new(StageCategory::Colosseum, "", 7, 3);
        let article = run(request, raw).expect("process");
        let text = &article.text;
        assert!(text.starts_with("{{DISPLAYTITLE:Round 4}}\n{{LimitedContent}}\n{{StrategyNeeded}}\n"));
        assert!(text.contains("|script = Round 4\n|romaji = Round 4\n|jpname = Round 4"));
        assert!(text.contains("[[File:MapXYZ000 ja.png]]"));
        assert!(text.contains("|energy = 007"));
        assert!(text.ends_with(
            "{{SpecialStages List}}\n[[Category:Event Stages]]\n[[Category:Restriction Stages]]"
        ));
    }

    #[test]
    fn zero_legends_sub_chapter_category() {
        let raw = "{{Stage Info\n|script = ?\n}}";
        let request = StageRequest::new(StageCategory::ZeroLegends, "", 15, 2);
        let article = run(request, raw).expect("process");
        assert_eq!(
            article.categories,
            vec![
                "[[Category:Sub-chapter 114 Stages]]",
                "[[Category:Zero Legends Stages]]",
            ]
        );
        assert_eq!(article.templates, vec!["{{LegendStages}}"]);
        assert_eq!(
            article.banners,
            vec!["{{LimitedContent}}", "{{StrategyNeeded}}"]
        );
    }

    #[test]
    fn solo_gauntlet_uses_derived_title() {
        let raw = format!(
            "<tabber>\nCrimson Trial Lv.1=\n{{{{Stage Info\n|script = ?\n|restriction = [[No Continues]]\n}}}}\n{STAGE_HEADER_CELL}\n</tabber>"
        );
        let request = StageRequest::new(StageCategory::Gauntlet, "", 1, 0);
        let article = run(request, &raw).expect("process");
        assert!(!article.is_collaboration);
        assert!(article.text.contains("|script = Crimson Trial Lv.X"));
        assert!(article.text.contains("|Crimson Trial"));
        assert_eq!(article.templates, vec!["{{SpecialStages List}}"]);
        assert_eq!(
            article.categories,
            vec!["[[Category:No Continue Stages]]", "[[Category:Gauntlets]]"]
        );
    }

    #[test]
    fn gauntlet_ignores_no_continues_outside_restriction_field() {
        let raw = "<tabber>\nCrimson Trial Lv.1=\n{{Stage Info\n|script = ?\n}}\nUnlike [[No Continues]] stages, retries are allowed.\n</tabber>";
        let request = StageRequest::new(StageCategory::Gauntlet, "", 1, 0);
        let article = run(request, raw).expect("process");
        assert_eq!(article.categories, vec!["[[Category:Gauntlets]]"]);
        assert!(!article.text.contains("[[Category:No Continue Stages]]"));
    }

    #[test]
    fn event_text_with_private_use_characters_processes() {
        let raw = "{{Stage Info\n|script = ?\n|name = icon\u{E000}\n}}";
        let request = StageRequest::new(StageCategory::Event, "s", 1, 0);
        let article = run(request, raw).expect("process");
        assert!(article.text.contains("|name = icon\u{E000}"));
        assert!(article.text.contains("|script = {{subst:PAGENAME}}"));
    }

    #[test]
    fn colosseum_round_at_u32_max_does_not_overflow() {
        let raw = "{{Stage Info\n|script = ?\n}}";
        let request = StageRequest::new(StageCategory::Colosseum, "", 7, u32::MAX);
        let article = run(request, raw).expect("process");
        assert!(article.text.starts_with("{{DISPLAYTITLE:Round 4294967296}}"));
        assert!(article.text.contains("|script = Round 4294967296"));
    }

    #[test]
    fn collaboration_gauntlet_detected_from_content() {
        let raw = "<tabber>\nMerc Trial Lv.1=\n{{Stage Info\n|event = [[name]]\n|script = ?\n}}\n</tabber>";
        let request = StageRequest::new(StageCategory::Gauntlet, "", 1, 0)
            .with_collaboration(Some("Merc Storia"));
        let article = run(request, raw).expect("process");
        assert!(article.is_collaboration);
        assert!(article.text.contains("|event = [[Merc Storia Collaboration Event]]"));
        assert_eq!(
            article.templates,
            vec!["{{Merc Storia}}", "{{CollaborationStages List}}"]
        );
        assert_eq!(
            article.categories,
            vec!["[[Category:Collaboration Stages]]", "[[Category:Gauntlets]]"]
        );
    }

    #[test]
    fn report_flattens_article_fields() {
        let request = StageRequest::new(StageCategory::ZeroLegends, "", 1, 0);
        let article = run(request, "{{Stage Info}}").expect("process");
        let report = ArticleReport {
            generator_warnings: vec!["exit status 1".to_string()],
            article,
        };
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["request"]["category"], "zero-legends");
        assert_eq!(json["generator_warnings"][0], "exit status 1");
        assert!(json["text"].as_str().expect("text").contains("{{Stage Info}}"));
    }
}
