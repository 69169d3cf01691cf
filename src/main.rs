mod config;
mod display;
mod event_log;
mod export;
mod fuzzy_matcher;
mod picker;
mod redact;
mod scope;
mod storage;
mod store_manager;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use colored::*;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::Config;
use export::ExportFormat;
use fuzzy_matcher::FzfMatcher;
use picker::ExclusionOptions;
use redact::Redactor;
use storage::{CmdEvent, ScopeKind};
use store_manager::StoreManager;

const LOG_ENV: &str = "CMDSET_LOG";

#[derive(Parser)]
#[command(name = "cmdset")]
#[command(version, about = "Turn terminal history into a clean script or runbook")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append one finished command to the events log (called by the shell hook)
    Record(RecordArgs),
    /// Show the most recent commands
    Last(LastArgs),
    /// Choose commands, in the order you want them, and save the selection
    Pick(PickArgs),
    /// Render a saved selection as a bash script or markdown runbook
    Export(ExportArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    /// Only commands run inside the current git repository
    Repo,
    /// Every recorded command
    Global,
}

impl From<ScopeArg> for ScopeKind {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Repo => ScopeKind::Repo,
            ScopeArg::Global => ScopeKind::Global,
        }
    }
}

#[derive(Args)]
struct RecordArgs {
    /// Shell that ran the command
    #[arg(long, default_value = "bash")]
    shell: String,
    /// Exit code of the command
    #[arg(long = "exit", default_value_t = 0, allow_negative_numbers = true)]
    exit_code: i32,
    /// Working directory [default: current directory]
    #[arg(long)]
    cwd: Option<PathBuf>,
    /// Wall-clock duration in milliseconds
    #[arg(long)]
    duration_ms: Option<i64>,
    /// Command text
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListFormat {
    Table,
    Json,
}

#[derive(Args)]
struct LastArgs {
    /// Number of commands to show [default: from config, 30]
    #[arg(short = 'n', long)]
    num: Option<usize>,
    /// Scope to show [default: repo when inside a git repository]
    #[arg(long, value_enum)]
    scope: Option<ScopeArg>,
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: ListFormat,
    /// Only commands fuzzily matching this query
    #[arg(long)]
    filter: Option<String>,
}

#[derive(Args)]
struct PickArgs {
    /// Number of commands to offer [default: from config, 50]
    #[arg(short = 'n', long)]
    num: Option<usize>,
    /// Scope to pick from [default: repo when inside a git repository]
    #[arg(long, value_enum)]
    scope: Option<ScopeArg>,
    /// Hide ls, cd, pwd, clear and exit [default: from config, true]
    #[arg(long, action = ArgAction::Set)]
    exclude_common: Option<bool>,
    /// Extra regex of commands to hide (repeatable)
    #[arg(long = "exclude-regex")]
    exclude_regex: Vec<String>,
    /// Only offer commands fuzzily matching this query
    #[arg(long)]
    filter: Option<String>,
}

#[derive(Args)]
struct ExportArgs {
    /// Selection id or path to a selection file [default: most recent]
    #[arg(long)]
    selection: Option<String>,
    /// bash | sh | md | markdown [default: from config, bash]
    #[arg(long)]
    format: Option<String>,
    /// Output file [default: stdout]
    #[arg(long)]
    out: Option<PathBuf>,
    /// Extra regex whose matches are masked (repeatable)
    #[arg(long = "redact-regex")]
    redact_regex: Vec<String>,
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::new()?;
    let store = StoreManager::new_with_config(&config)?;

    match cli.command {
        Commands::Record(args) => record(&store, args),
        Commands::Last(args) => last(&store, &config, args),
        Commands::Pick(args) => pick(&store, &config, args),
        Commands::Export(args) => export_selection(&store, &config, args),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn record(store: &StoreManager, args: RecordArgs) -> Result<()> {
    let cwd = match args.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to read current directory")?,
    };

    let event = CmdEvent {
        kind: "cmd".to_string(),
        ts: Local::now().fixed_offset(),
        shell: args.shell,
        host: env_or_empty(&["HOSTNAME", "HOST"]),
        user: env_or_empty(&["USER", "USERNAME"]),
        cwd: cwd.to_string_lossy().into_owned(),
        cmd: args.command.join(" "),
        exit: args.exit_code,
        duration_ms: args.duration_ms,
    };
    store.append_event(&event)
}

// First non-empty variable among `keys`.
fn env_or_empty(keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| std::env::var(k).ok().filter(|v| !v.is_empty()))
        .unwrap_or_default()
}

/// Scope-filtered events plus the root they were filtered by.
fn scoped_events(store: &StoreManager, scope: ScopeKind) -> Result<(Vec<CmdEvent>, Option<String>)> {
    let repo_root = scope::resolve_repo_root(scope)?;
    let events = store.load_events()?;
    let events = scope::filter_by_scope(events, repo_root.as_deref().unwrap_or_default());
    Ok((events, repo_root))
}

fn narrow(events: Vec<CmdEvent>, filter: Option<&str>) -> Vec<CmdEvent> {
    match filter {
        Some(query) => FzfMatcher::new().filter_events(query, events),
        None => events,
    }
}

fn last(store: &StoreManager, config: &Config, args: LastArgs) -> Result<()> {
    let scope = args.scope.map(ScopeKind::from).unwrap_or_default();
    let (events, repo_root) = scoped_events(store, scope)?;
    let events = narrow(events, args.filter.as_deref());
    let events = picker::take_last(events, args.num.unwrap_or(config.last.num));

    match args.format {
        ListFormat::Json => display::print_json(&events),
        ListFormat::Table => {
            if events.is_empty() {
                println!(
                    "{} ({})",
                    "No commands recorded in this scope yet.".yellow(),
                    store.events_path().display()
                );
                return Ok(());
            }
            display::print_table(&events, repo_root.as_deref().unwrap_or_default())
        }
    }
}

fn pick(store: &StoreManager, config: &Config, args: PickArgs) -> Result<()> {
    let scope = args.scope.map(ScopeKind::from).unwrap_or_default();
    let (events, repo_root) = scoped_events(store, scope)?;

    let mut patterns = config.pick.exclude_regex.clone();
    patterns.extend(args.exclude_regex);
    let exclusions = ExclusionOptions {
        include_common: args.exclude_common.unwrap_or(config.pick.exclude_common),
        patterns,
    };
    let events = picker::filter_exclusions(events, &exclusions.effective_patterns());
    let events = narrow(events, args.filter.as_deref());
    let candidates = picker::take_last(events, args.num.unwrap_or(config.pick.num));

    if candidates.is_empty() {
        println!("{}", "No commands found in this scope.".yellow());
        return Ok(());
    }

    display::print_table(&candidates, repo_root.as_deref().unwrap_or_default())?;
    print!(
        "\n{}",
        "Select commands in the order you want (e.g. \"5 2 3\", \"1-4 7\", or \"all\"): ".bold()
    );
    io::stdout().flush().context("failed to flush prompt")?;

    let items = picker::read_pick(io::stdin().lock(), &candidates)?;
    if items.is_empty() {
        println!("{}", "No commands selected.".yellow());
        return Ok(());
    }

    let selection = picker::build_selection(items, scope, repo_root.as_deref(), Local::now());
    store.save_selection(&selection)?;

    println!();
    println!("{} {}", "Saved selection:".green().bold(), selection.id);
    println!(
        "{}",
        format!(
            "Export: cmdset export --selection {} --format bash --out run.sh",
            selection.id
        )
        .dimmed()
    );
    Ok(())
}

fn export_selection(store: &StoreManager, config: &Config, args: ExportArgs) -> Result<()> {
    let format: ExportFormat = args
        .format
        .as_deref()
        .unwrap_or(config.export.format.as_str())
        .parse()?;
    let selection = store.load_selection(args.selection.as_deref())?;

    let mut patterns = config.export.redact_regex.clone();
    patterns.extend(args.redact_regex);
    let redactor = Redactor::new(&patterns);

    match args.out {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            export::export(&mut out, format, &selection, &redactor, Local::now())
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "{}",
                format!("Wrote {} commands to {}", selection.items.len(), path.display()).green()
            );
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            export::export(&mut out, format, &selection, &redactor, Local::now())?;
        }
    }
    Ok(())
}
