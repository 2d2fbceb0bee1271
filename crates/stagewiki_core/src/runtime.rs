use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::category::{DEFAULT_SOURCE_LOCALE, DEFAULT_TARGET_LOCALE, Locale};
use crate::config::{StageWikiConfig, render_sample_config};
use crate::generator::GeneratorCommand;
use crate::sink::detect_clipboard_command;

pub const STATE_DIR_NAME: &str = ".stagewiki";
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Config,
    Heuristic,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Config => "config",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub project_root: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        Ok(Self { cwd })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
    pub root_source: ValueSource,
    pub config_source: ValueSource,
}

pub fn resolve_paths(
    context: &ResolutionContext,
    overrides: &PathOverrides,
) -> Result<ResolvedPaths> {
    resolve_paths_with_lookup(context, overrides, |key| env::var(key).ok())
}

fn resolve_paths_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> Result<ResolvedPaths>
where
    F: Fn(&str) -> Option<String>,
{
    let (project_root, root_source) = if let Some(path) = overrides.project_root.as_deref() {
        (absolutize(path, &context.cwd), ValueSource::Flag)
    } else if let Some(value) = non_empty(lookup_env("STAGEWIKI_PROJECT_ROOT")) {
        (absolutize(Path::new(&value), &context.cwd), ValueSource::Env)
    } else {
        (detect_project_root(&context.cwd), ValueSource::Heuristic)
    };
    let state_dir = project_root.join(STATE_DIR_NAME);

    let (config_path, config_source) = if let Some(path) = overrides.config.as_deref() {
        (absolutize(path, &project_root), ValueSource::Flag)
    } else if let Some(value) = non_empty(lookup_env("STAGEWIKI_CONFIG")) {
        (absolutize(Path::new(&value), &project_root), ValueSource::Env)
    } else {
        (state_dir.join(CONFIG_FILENAME), ValueSource::Default)
    };

    Ok(ResolvedPaths {
        project_root,
        state_dir,
        config_path,
        root_source,
        config_source,
    })
}

/// Per-invocation values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct SettingOverrides {
    pub generator_program: Option<String>,
    pub target_locale: Option<String>,
    pub collaboration: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub generator: GeneratorCommand,
    pub locale: Locale,
    pub collaboration: Option<String>,
    pub clipboard: Option<Vec<String>>,
    pub generator_source: ValueSource,
    pub collaboration_source: ValueSource,
    pub clipboard_source: ValueSource,
}

pub fn resolve_settings(
    paths: &ResolvedPaths,
    config: &StageWikiConfig,
    overrides: &SettingOverrides,
) -> Settings {
    resolve_settings_with_lookup(
        paths,
        config,
        overrides,
        |key| env::var(key).ok(),
        detect_clipboard_command,
    )
}

fn resolve_settings_with_lookup<F, D>(
    paths: &ResolvedPaths,
    config: &StageWikiConfig,
    overrides: &SettingOverrides,
    lookup_env: F,
    detect_clipboard: D,
) -> Settings
where
    F: Fn(&str) -> Option<String>,
    D: FnOnce() -> Option<Vec<String>>,
{
    let mut generator = GeneratorCommand::default();
    let generator_source = if let Some(program) = non_empty(overrides.generator_program.clone()) {
        generator.program = program;
        ValueSource::Flag
    } else if let Some(program) = non_empty(lookup_env("STAGEWIKI_GENERATOR")) {
        generator.program = program;
        ValueSource::Env
    } else if let Some(program) = non_empty(config.generator.program.clone()) {
        generator.program = program;
        ValueSource::Config
    } else {
        ValueSource::Default
    };
    if let Some(args) = &config.generator.args {
        generator.prefix_args = args.clone();
    }
    generator.working_dir = config
        .generator
        .working_dir
        .as_deref()
        .map(|dir| absolutize(dir, &paths.project_root));

    let locale = Locale {
        source: non_empty(config.locale.source.clone())
            .unwrap_or_else(|| DEFAULT_SOURCE_LOCALE.to_string()),
        target: non_empty(overrides.target_locale.clone())
            .or_else(|| non_empty(config.locale.target.clone()))
            .unwrap_or_else(|| DEFAULT_TARGET_LOCALE.to_string()),
    };

    let (collaboration, collaboration_source) =
        if let Some(name) = non_empty(overrides.collaboration.clone()) {
            (Some(name), ValueSource::Flag)
        } else if let Some(name) = non_empty(lookup_env("STAGEWIKI_COLLAB_NAME")) {
            (Some(name), ValueSource::Env)
        } else if let Some(name) = non_empty(config.collaboration.name.clone()) {
            (Some(name), ValueSource::Config)
        } else {
            (None, ValueSource::Default)
        };

    let (clipboard, clipboard_source) =
        if let Some(command) = non_empty(lookup_env("STAGEWIKI_CLIPBOARD")) {
            (
                Some(command.split_whitespace().map(str::to_string).collect()),
                ValueSource::Env,
            )
        } else if let Some(command) = config
            .output
            .clipboard_command
            .clone()
            .filter(|command| !command.is_empty())
        {
            (Some(command), ValueSource::Config)
        } else {
            (detect_clipboard(), ValueSource::Heuristic)
        };

    Settings {
        generator,
        locale,
        collaboration,
        clipboard,
        generator_source,
        collaboration_source,
        clipboard_source,
    }
}

impl Settings {
    pub fn diagnostics(&self, paths: &ResolvedPaths) -> String {
        format!(
            "project_root={} ({})\nconfig_path={} ({})\ngenerator={} ({})\ngenerator_dir={}\nlocale={}->{}\ncollaboration={} ({})\nclipboard={} ({})",
            normalize_for_display(&paths.project_root),
            paths.root_source.as_str(),
            normalize_for_display(&paths.config_path),
            paths.config_source.as_str(),
            self.generator.display(&[]),
            self.generator_source.as_str(),
            self.generator
                .working_dir
                .as_deref()
                .map(normalize_for_display)
                .unwrap_or_else(|| "<cwd>".to_string()),
            self.locale.source,
            self.locale.target,
            self.collaboration.as_deref().unwrap_or("<none>"),
            self.collaboration_source.as_str(),
            self.clipboard
                .as_ref()
                .map(|command| command.join(" "))
                .unwrap_or_else(|| "<none>".to_string()),
            self.clipboard_source.as_str(),
        )
    }
}

/// Write the commented sample config. Returns `false` when a config already
/// exists and `force` is not set.
pub fn init_config(paths: &ResolvedPaths, force: bool) -> Result<bool> {
    if paths.config_path.exists() && !force {
        return Ok(false);
    }
    let Some(parent) = paths.config_path.parent() else {
        bail!(
            "config path has no parent: {}",
            paths.config_path.display()
        );
    };
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    fs::write(&paths.config_path, render_sample_config())
        .with_context(|| format!("failed to write {}", paths.config_path.display()))?;
    Ok(true)
}

fn detect_project_root(cwd: &Path) -> PathBuf {
    let mut cursor = Some(cwd);
    while let Some(current) = cursor {
        if current.join(STATE_DIR_NAME).is_dir() {
            return current.to_path_buf();
        }
        cursor = current.parent();
    }
    cwd.to_path_buf()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
