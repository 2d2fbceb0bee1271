use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::inference::ContentView;

pub const DEFAULT_SOURCE_LOCALE: &str = "en";
pub const DEFAULT_TARGET_LOCALE: &str = "ja";

const COLLABORATION_SUFFIX: &str = " Collaboration Event";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageCategory {
    Event,
    Collaboration,
    Gauntlet,
    Colosseum,
    ZeroLegends,
    RankingDojo,
}

/// How a category decides whether its stage belongs to a collaboration event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaborationMode {
    Never,
    Always,
    FromContent,
}

impl StageCategory {
    pub const ALL: [StageCategory; 6] = [
        Self::Event,
        Self::Collaboration,
        Self::Gauntlet,
        Self::Colosseum,
        Self::ZeroLegends,
        Self::RankingDojo,
    ];

    pub fn parse(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "event" => Ok(Self::Event),
            "collab" | "collaboration" => Ok(Self::Collaboration),
            "gauntlet" => Ok(Self::Gauntlet),
            "colosseum" | "sr" => Ok(Self::Colosseum),
            "zl" | "zero-legends" => Ok(Self::ZeroLegends),
            "ranking" | "rank" | "dojo" => Ok(Self::RankingDojo),
            _ => Err(PipelineError::UnsupportedCategory(value.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Collaboration => "collab",
            Self::Gauntlet => "gauntlet",
            Self::Colosseum => "colosseum",
            Self::ZeroLegends => "zl",
            Self::RankingDojo => "ranking",
        }
    }

    /// Stage-type code the generator expects when the category fixes one.
    pub fn fixed_stage_type(self) -> Option<&'static str> {
        match self {
            Self::Colosseum => Some("sr"),
            Self::ZeroLegends => Some("zl"),
            Self::RankingDojo => Some("rank"),
            Self::Event | Self::Collaboration | Self::Gauntlet => None,
        }
    }

    pub fn collaboration_mode(self) -> CollaborationMode {
        match self {
            Self::Collaboration => CollaborationMode::Always,
            Self::Gauntlet => CollaborationMode::FromContent,
            Self::Event | Self::Colosseum | Self::ZeroLegends | Self::RankingDojo => {
                CollaborationMode::Never
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locale {
    pub source: String,
    pub target: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE_LOCALE.to_string(),
            target: DEFAULT_TARGET_LOCALE.to_string(),
        }
    }
}

/// One invocation's parameters. For colosseum requests `chapter` is the map
/// set and `map` is the zero-based round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRequest {
    pub category: StageCategory,
    pub stage_type: String,
    pub chapter: u32,
    pub map: u32,
    pub collaboration: Option<String>,
    pub locale: Locale,
}

impl StageRequest {
    pub fn new(category: StageCategory, stage_type: &str, chapter: u32, map: u32) -> Self {
        let stage_type = category
            .fixed_stage_type()
            .unwrap_or(stage_type)
            .trim()
            .to_string();
        Self {
            category,
            stage_type,
            chapter,
            map,
            collaboration: None,
            locale: Locale::default(),
        }
    }

    pub fn with_collaboration(mut self, name: Option<&str>) -> Self {
        self.collaboration = name
            .map(normalize_collaboration_name)
            .filter(|name| !name.is_empty());
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Checks that can fail before the generator runs.
    pub fn validate(&self) -> Result<()> {
        if self.category.collaboration_mode() == CollaborationMode::Always
            && self.collaboration.is_none()
        {
            return Err(PipelineError::MissingValue("collab"));
        }
        if self.category.fixed_stage_type().is_none()
            && self.category != StageCategory::Gauntlet
            && self.stage_type.is_empty()
        {
            return Err(PipelineError::MissingValue("stage_type"));
        }
        Ok(())
    }

    pub fn round_label(&self) -> String {
        format!("Round {}", u64::from(self.map) + 1)
    }

    pub fn sub_chapter(&self) -> u64 {
        99 + u64::from(self.chapter)
    }
}

/// Operators often paste the full event page title; the rules only want the
/// franchise name.
pub fn normalize_collaboration_name(name: &str) -> String {
    let trimmed = name.trim();
    trimmed
        .strip_suffix(COLLABORATION_SUFFIX)
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub request: StageRequest,
    pub is_collaboration: bool,
}

pub fn classify(request: StageRequest, raw: &str) -> Classification {
    let is_collaboration = match request.category.collaboration_mode() {
        CollaborationMode::Always => true,
        CollaborationMode::Never => false,
        CollaborationMode::FromContent => ContentView::new(raw).has_event_sentinel(),
    };
    Classification {
        request,
        is_collaboration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_codes_and_aliases() {
        assert_eq!(StageCategory::parse("event").expect("event"), StageCategory::Event);
        assert_eq!(
            StageCategory::parse(" Collab ").expect("collab"),
            StageCategory::Collaboration
        );
        assert_eq!(StageCategory::parse("sr").expect("sr"), StageCategory::Colosseum);
        assert_eq!(StageCategory::parse("dojo").expect("dojo"), StageCategory::RankingDojo);
        for category in StageCategory::ALL {
            assert_eq!(StageCategory::parse(category.as_str()).expect("round trip"), category);
        }
    }

    #[test]
    fn parse_rejects_unknown_code() {
        let error = StageCategory::parse("labyrinth").expect_err("must fail");
        assert!(matches!(error, PipelineError::UnsupportedCategory(ref code) if code == "labyrinth"));
        assert!(error.to_string().contains("unsupported stage category"));
    }

    #[test]
    fn fixed_stage_type_overrides_argument() {
        let request = StageRequest::new(StageCategory::Colosseum, "ignored", 7, 3);
        assert_eq!(request.stage_type, "sr");
        let request = StageRequest::new(StageCategory::Event, " a ", 1, 2);
        assert_eq!(request.stage_type, "a");
    }

    #[test]
    fn collaboration_name_drops_event_suffix() {
        assert_eq!(
            normalize_collaboration_name("Street Fighter V Collaboration Event"),
            "Street Fighter V"
        );
        assert_eq!(normalize_collaboration_name("  Merc Storia "), "Merc Storia");
        let request =
            StageRequest::new(StageCategory::Gauntlet, "", 1, 0).with_collaboration(Some("   "));
        assert!(request.collaboration.is_none());
    }

    #[test]
    fn validate_rejects_missing_context_up_front() {
        let collab = StageRequest::new(StageCategory::Collaboration, "c", 1, 0);
        assert!(matches!(collab.validate(), Err(PipelineError::MissingValue("collab"))));
        let collab = collab.with_collaboration(Some("Merc Storia"));
        assert!(collab.validate().is_ok());

        let event = StageRequest::new(StageCategory::Event, " ", 1, 0);
        assert!(matches!(event.validate(), Err(PipelineError::MissingValue("stage_type"))));
        assert!(StageRequest::new(StageCategory::Gauntlet, "", 1, 0).validate().is_ok());
        assert!(StageRequest::new(StageCategory::RankingDojo, "", 12, 0).validate().is_ok());
    }

    #[test]
    fn round_label_and_sub_chapter_are_one_based() {
        let request = StageRequest::new(StageCategory::Colosseum, "", 7, 3);
        assert_eq!(request.round_label(), "Round 4");
        let request = StageRequest::new(StageCategory::ZeroLegends, "", 15, 0);
        assert_eq!(request.sub_chapter(), 114);
    }

    #[test]
    fn round_label_and_sub_chapter_widen_at_u32_max() {
        let request = StageRequest::new(StageCategory::Colosseum, "", 7, u32::MAX);
        assert_eq!(request.round_label(), "Round 4294967296");
        let request = StageRequest::new(StageCategory::ZeroLegends, "", u32::MAX, 0);
        assert_eq!(request.sub_chapter(), 4_294_967_394);
    }

    #[test]
    fn gauntlet_collaboration_comes_from_sentinel() {
        let request = StageRequest::new(StageCategory::Gauntlet, "", 1, 0);
        let classified = classify(request.clone(), "{{Stage Info\n|event = [[name]]\n}}");
        assert!(classified.is_collaboration);
        let classified = classify(request, "{{Stage Info\n|event = [[Some Event]]\n}}");
        assert!(!classified.is_collaboration);
    }

    #[test]
    fn fixed_modes_skip_content_check() {
        let sentinel = "|event = [[name]]";
        let event = StageRequest::new(StageCategory::Event, "s", 1, 0);
        assert!(!classify(event, sentinel).is_collaboration);
        let collab = StageRequest::new(StageCategory::Collaboration, "c", 1, 0);
        assert!(classify(collab, "no sentinel here").is_collaboration);
    }
}
