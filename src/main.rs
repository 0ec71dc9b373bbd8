use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repomirror::health::CheckResult;
use repomirror::mirror::MirrorOutcome;
use repomirror::remote::PushOutcome;
use repomirror::{parse_repo_list, Config, HealthCheck, RuntimePaths, SyncEngine, SyncSummary};

#[derive(Parser)]
#[command(name = "repomirror")]
#[command(about = "Mirror upstream repositories to GitHub, GitLab, Bitbucket and Azure DevOps")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to <base-dir>/.config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the local mirrors (defaults to /repos in a container, ./repos otherwise)
    #[arg(short, long, global = true)]
    base_dir: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror every listed repository and push it to all platforms
    Sync {
        /// Repository list, one URL per line
        #[arg(short, long, default_value = "repolist.txt")]
        list: PathBuf,

        /// Stop at the first failure instead of recording it and continuing
        #[arg(long)]
        fail_fast: bool,
    },

    /// Show the repositories a sync would mirror
    List {
        /// Repository list, one URL per line
        #[arg(short, long, default_value = "repolist.txt")]
        list: PathBuf,
    },

    /// Write an empty configuration template
    Init,

    /// System health check and diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting repomirror v{}", env!("CARGO_PKG_VERSION"));

    let paths = RuntimePaths::resolve(cli.base_dir.as_deref(), cli.config.as_deref())
        .context("Failed to resolve runtime paths")?;

    let command = cli.command.unwrap_or(Commands::Sync {
        list: PathBuf::from("repolist.txt"),
        fail_fast: false,
    });

    match command {
        Commands::Sync { list, fail_fast } => cmd_sync(&paths, &list, fail_fast).await,
        Commands::List { list } => cmd_list(&list),
        Commands::Init => cmd_init(&paths),
        Commands::Doctor => cmd_doctor(&paths),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

async fn cmd_sync(paths: &RuntimePaths, list: &Path, fail_fast: bool) -> Result<()> {
    std::fs::create_dir_all(&paths.base_path)
        .with_context(|| format!("Failed to create {}", paths.base_path.display()))?;

    let mut config = Config::load_or_init(&paths.config_file)
        .with_context(|| format!("Failed to load {}", paths.config_file.display()))?;
    config.settings.fail_fast |= fail_fast;

    let repos = parse_repo_list(list)
        .with_context(|| format!("Failed to read repository list {}", list.display()))?;
    if repos.is_empty() {
        warn!("{} lists no repositories", list.display());
        return Ok(());
    }

    let engine = SyncEngine::from_config(&config, paths).with_context(|| {
        format!(
            "Configuration at {} is incomplete; fill it in and rerun",
            paths.config_file.display()
        )
    })?;

    let summary = engine.run(&repos).await.context("Mirror run aborted")?;
    print_summary(&summary);

    if summary.has_failures() {
        anyhow::bail!(
            "{} of {} repositories failed",
            summary.failed_repositories,
            summary.total_repositories
        );
    }

    Ok(())
}

fn cmd_list(list: &Path) -> Result<()> {
    let repos = parse_repo_list(list)
        .with_context(|| format!("Failed to read repository list {}", list.display()))?;

    println!("📋 {} repositories in {}", repos.len(), list.display());
    for (name, url) in &repos {
        println!("   {:<30} {}", name, url);
    }

    Ok(())
}

fn cmd_init(paths: &RuntimePaths) -> Result<()> {
    if paths.config_file.exists() {
        println!(
            "✅ Configuration already exists at {}",
            paths.config_file.display()
        );
        return Ok(());
    }

    Config::load_or_init(&paths.config_file)
        .with_context(|| format!("Failed to write {}", paths.config_file.display()))?;

    println!(
        "✅ Configuration template written to {}",
        paths.config_file.display()
    );
    println!("   Fill in the platform credentials, then run: repomirror sync");
    Ok(())
}

fn cmd_doctor(paths: &RuntimePaths) -> Result<()> {
    let health = HealthCheck::run(paths);

    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed { "✅" } else { "❌" };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 repomirror System Diagnostics");
    println!();
    for (name, result) in health.all_checks() {
        print_check(name, result);
    }
    println!();

    if health.all_passed() {
        println!("✅ Ready to sync");
        Ok(())
    } else {
        anyhow::bail!("Preflight checks failed")
    }
}

fn print_summary(summary: &SyncSummary) {
    println!();
    println!("📊 Mirror run complete in {:.1}s", summary.duration.as_secs_f64());

    for report in &summary.reports {
        let mirror = match &report.mirror {
            Some(MirrorOutcome::Cloned { .. }) => "cloned".to_string(),
            Some(MirrorOutcome::Updated { commits, .. }) => format!("updated ({} commits)", commits),
            Some(MirrorOutcome::AlreadyUpToDate { .. }) => "up to date".to_string(),
            Some(MirrorOutcome::Diverged { reason, .. }) => format!("diverged: {}", reason),
            None => "not mirrored".to_string(),
        };
        let icon = if report.failed() { "❌" } else { "✅" };
        println!("   {} {} - {}", icon, report.name, mirror);

        for sync in &report.platforms {
            let push = match sync.push {
                PushOutcome::Pushed { refs } => format!("pushed {} ref(s)", refs),
                PushOutcome::AlreadyUpToDate => "up to date".to_string(),
            };
            let created = if sync.created { ", created" } else { "" };
            println!("        {}: {}{}", sync.platform, push, created);
        }
        for error in &report.errors {
            println!("        {}", error);
        }
    }

    println!();
    println!("   Repositories: {}", summary.total_repositories);
    println!(
        "   Cloned: {}  Updated: {}  Diverged: {}",
        summary.cloned, summary.updated, summary.diverged
    );
    println!(
        "   Platform repositories created: {}  Pushes: {}  Already up to date: {}",
        summary.repositories_created, summary.pushes, summary.pushes_up_to_date
    );
    if summary.has_failures() {
        println!("   ❌ Failed: {}", summary.failed_repositories);
    }
}
