use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct StageWikiConfig {
    #[serde(default)]
    pub generator: GeneratorSection,
    #[serde(default)]
    pub locale: LocaleSection,
    #[serde(default)]
    pub collaboration: CollaborationSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct GeneratorSection {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    /// Relative paths resolve against the project root.
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct LocaleSection {
    pub source: Option<String>,
    pub target: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct CollaborationSection {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct OutputSection {
    pub clipboard_command: Option<Vec<String>>,
}

/// Load and parse a StageWikiConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<StageWikiConfig> {
    if !config_path.exists() {
        return Ok(StageWikiConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: StageWikiConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

pub fn render_sample_config() -> &'static str {
    "# stagewiki operator defaults; every key is optional.\n\n[generator]\n# program = \"cargo\"\n# args = [\"run\", \"--release\", \"--\"]\n# working_dir = \"../stage-data\"\n\n[locale]\n# source = \"en\"\n# target = \"ja\"\n\n[collaboration]\n# name = \"Street Fighter V\"\n\n[output]\n# clipboard_command = [\"xclip\", \"-selection\", \"clipboard\"]\n"
}
