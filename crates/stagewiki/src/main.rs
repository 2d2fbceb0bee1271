use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use stagewiki_core::category::{StageCategory, StageRequest};
use stagewiki_core::config::load_config;
use stagewiki_core::generator::run_generator;
use stagewiki_core::pipeline::{ArticleReport, process};
use stagewiki_core::rules::Registry;
use stagewiki_core::runtime::{
    PathOverrides, ResolutionContext, ResolvedPaths, SettingOverrides, Settings, init_config,
    normalize_for_display, resolve_paths, resolve_settings,
};
use stagewiki_core::sink::{SinkOptions, deliver};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "stagewiki",
    version,
    about = "Turn stage-data generator output into publishable wiki articles"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PROGRAM", help = "Stage-data generator program")]
    generator: Option<String>,
    #[arg(long, global = true, value_name = "CODE", help = "Target locale for image references")]
    locale: Option<String>,
    #[arg(short, long, global = true, value_name = "PATH", help = "Also write the article to a file")]
    output: Option<PathBuf>,
    #[arg(long, global = true, help = "Pipe the article into the clipboard command")]
    copy: bool,
    #[arg(short, long, global = true, help = "Do not echo the article to stdout")]
    quiet: bool,
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    #[arg(short, long, global = true, help = "Log every rule the pipeline applies")]
    verbose: bool,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    config: Option<PathBuf>,
    generator: Option<String>,
    locale: Option<String>,
    output: Option<PathBuf>,
    copy: bool,
    quiet: bool,
    format: OutputFormat,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            config: cli.config.clone(),
            generator: cli.generator.clone(),
            locale: cli.locale.clone(),
            output: cli.output.clone(),
            copy: cli.copy,
            quiet: cli.quiet,
            format: cli.format,
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Ordinary event stage")]
    Event(StageArgs),
    #[command(about = "Collaboration event stage")]
    Collab(CollabArgs),
    #[command(about = "Gauntlet map (collaboration detected from the generator output)")]
    Gauntlet(GauntletArgs),
    #[command(about = "Colosseum restriction round")]
    Colosseum(ColosseumArgs),
    #[command(about = "Zero Legends chapter stage")]
    Zl(ChapterMapArgs),
    #[command(about = "Ranking dojo challenge")]
    Ranking(RankingArgs),
    #[command(about = "Run the pipeline on saved generator output instead of calling the generator")]
    Process(ProcessArgs),
    #[command(about = "Deliver the generator's encounter list unchanged")]
    Encounters(EncountersArgs),
    #[command(about = "Print the rule-set registry as JSON")]
    Rules,
    #[command(about = "Write a commented sample config")]
    Init(InitArgs),
}

#[derive(Debug, Args)]
struct StageArgs {
    #[arg(help = "Stage-type code, e.g. s or a")]
    stage_type: String,
    chapter: u32,
    map: u32,
}

#[derive(Debug, Args)]
struct CollabArgs {
    #[arg(help = "Stage-type code, e.g. c or ca")]
    stage_type: String,
    chapter: u32,
    map: u32,
    #[arg(long, value_name = "NAME", help = "Collaboration name (overrides config)")]
    name: Option<String>,
}

#[derive(Debug, Args)]
struct GauntletArgs {
    chapter: u32,
    map: u32,
    #[arg(long, value_name = "NAME", help = "Collaboration name used if the gauntlet is one")]
    name: Option<String>,
}

#[derive(Debug, Args)]
struct ColosseumArgs {
    map_set: u32,
    #[arg(help = "Zero-based round number")]
    round: u32,
}

#[derive(Debug, Args)]
struct ChapterMapArgs {
    chapter: u32,
    map: u32,
}

#[derive(Debug, Args)]
struct RankingArgs {
    map: u32,
}

#[derive(Debug, Args)]
struct ProcessArgs {
    #[arg(long, value_name = "CODE", help = "event|collab|gauntlet|colosseum|zl|ranking")]
    category: String,
    #[arg(long, default_value = "", value_name = "CODE")]
    stage_type: String,
    #[arg(long, default_value_t = 0)]
    chapter: u32,
    #[arg(long, default_value_t = 0)]
    map: u32,
    #[arg(long, value_name = "NAME")]
    name: Option<String>,
    #[arg(long, value_name = "PATH", help = "Saved generator output (default: stdin)")]
    input: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct EncountersArgs {
    cat: String,
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config")]
    force: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Event(args)) => run_stage(
            &runtime,
            StageCategory::Event,
            StageSelector::new(&args.stage_type, args.chapter, args.map),
            None,
        ),
        Some(Commands::Collab(args)) => run_stage(
            &runtime,
            StageCategory::Collaboration,
            StageSelector::new(&args.stage_type, args.chapter, args.map),
            args.name,
        ),
        Some(Commands::Gauntlet(args)) => run_stage(
            &runtime,
            StageCategory::Gauntlet,
            StageSelector::new("", args.chapter, args.map),
            args.name,
        ),
        Some(Commands::Colosseum(args)) => run_stage(
            &runtime,
            StageCategory::Colosseum,
            StageSelector::new("", args.map_set, args.round),
            None,
        ),
        Some(Commands::Zl(args)) => run_stage(
            &runtime,
            StageCategory::ZeroLegends,
            StageSelector::new("", args.chapter, args.map),
            None,
        ),
        // The dojo map is the chapter slot of the generator's selector.
        Some(Commands::Ranking(args)) => run_stage(
            &runtime,
            StageCategory::RankingDojo,
            StageSelector::new("", args.map, 0),
            None,
        ),
        Some(Commands::Process(args)) => run_process(&runtime, args),
        Some(Commands::Encounters(EncountersArgs { cat })) => run_encounters(&runtime, &cat),
        Some(Commands::Rules) => run_rules(),
        Some(Commands::Init(args)) => run_init(&runtime, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

#[derive(Debug, Clone, Copy)]
struct StageSelector<'a> {
    stage_type: &'a str,
    chapter: u32,
    map: u32,
}

impl<'a> StageSelector<'a> {
    fn new(stage_type: &'a str, chapter: u32, map: u32) -> Self {
        Self {
            stage_type,
            chapter,
            map,
        }
    }

    fn request(self, category: StageCategory, settings: &Settings) -> StageRequest {
        StageRequest::new(category, self.stage_type, self.chapter, self.map)
            .with_collaboration(settings.collaboration.as_deref())
            .with_locale(settings.locale.clone())
    }
}

fn run_stage(
    runtime: &RuntimeOptions,
    category: StageCategory,
    selector: StageSelector<'_>,
    collaboration: Option<String>,
) -> Result<()> {
    let settings = resolve_runtime(runtime, collaboration)?;
    let registry = Registry::builtin();
    let rule_set = registry.lookup(category)?;

    let request = selector.request(category, &settings);
    request.validate()?;
    let args = rule_set.generator_args(&request)?;
    let generated = run_generator(&settings.generator, &args)?;

    let article = process(&registry, request, &generated.stdout)?;
    emit_article(
        runtime,
        &settings,
        &ArticleReport {
            generator_warnings: generated.warnings(),
            article,
        },
    )
}

fn run_process(runtime: &RuntimeOptions, args: ProcessArgs) -> Result<()> {
    let category = StageCategory::parse(&args.category)?;
    let settings = resolve_runtime(runtime, args.name)?;

    let raw = match &args.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => io::read_to_string(io::stdin()).context("failed to read generator output from stdin")?,
    };

    let request = StageSelector::new(&args.stage_type, args.chapter, args.map)
        .request(category, &settings);
    let article = process(&Registry::builtin(), request, &raw.replace("\r\n", "\n"))?;
    emit_article(
        runtime,
        &settings,
        &ArticleReport {
            generator_warnings: Vec::new(),
            article,
        },
    )
}

fn run_encounters(runtime: &RuntimeOptions, cat: &str) -> Result<()> {
    let settings = resolve_runtime(runtime, None)?;
    let generated = run_generator(
        &settings.generator,
        &["encounters".to_string(), cat.to_string()],
    )?;
    let text = generated.stdout.trim();
    deliver(
        text,
        &sink_options(runtime, &settings, runtime.format == OutputFormat::Text)?,
        &mut io::stdout().lock(),
    )?;
    if runtime.format == OutputFormat::Json && !runtime.quiet {
        println!("{}", serde_json::to_string_pretty(&generated)?);
    }
    Ok(())
}

fn run_rules() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&Registry::builtin())?);
    Ok(())
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let wrote = init_config(&paths, args.force)?;
    if wrote {
        println!("Wrote config: {}", normalize_for_display(&paths.config_path));
    } else {
        println!(
            "Config already exists: {} (use --force to overwrite)",
            normalize_for_display(&paths.config_path)
        );
    }
    Ok(())
}

/// File and clipboard always get the article; `--format json` only changes
/// what is echoed.
fn emit_article(runtime: &RuntimeOptions, settings: &Settings, report: &ArticleReport) -> Result<()> {
    let options = sink_options(runtime, settings, runtime.format == OutputFormat::Text)?;
    let delivery = deliver(&report.article.text, &options, &mut io::stdout().lock())?;
    if runtime.format == OutputFormat::Json && !runtime.quiet {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", serde_json::to_string_pretty(report)?)?;
    }
    if runtime.quiet && delivery.copied_with.is_some() {
        eprintln!("Copied");
    }
    Ok(())
}

fn sink_options(runtime: &RuntimeOptions, settings: &Settings, echo: bool) -> Result<SinkOptions> {
    let clipboard = if runtime.copy {
        Some(settings.clipboard.clone().ok_or_else(|| {
            anyhow!(
                "--copy needs a clipboard command; set [output] clipboard_command or STAGEWIKI_CLIPBOARD"
            )
        })?)
    } else {
        None
    };
    Ok(SinkOptions {
        echo: echo && !runtime.quiet,
        output_path: runtime.output.clone(),
        clipboard,
    })
}

fn resolve_runtime(
    runtime: &RuntimeOptions,
    collaboration: Option<String>,
) -> Result<Settings> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_config(&paths.config_path)?;
    let settings = resolve_settings(
        &paths,
        &config,
        &SettingOverrides {
            generator_program: runtime.generator.clone(),
            target_locale: runtime.locale.clone(),
            collaboration,
        },
    );
    if runtime.diagnostics {
        eprintln!("[diagnostics]\n{}", settings.diagnostics(&paths));
    }
    Ok(settings)
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        config: runtime.config.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let project_env = initial.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    resolve_paths(&context, &overrides)
}
