//! assetcache CLI entry point

use assetcache::cli::{Cli, Commands};
use assetcache::config::ConfigManager;
use assetcache::error::AssetCacheResult;
use assetcache::ui::{self, UiContext};
use clap::Parser;
use console::style;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> AssetCacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Config command works on the file itself, even an invalid one
    if let Commands::Config(args) = cli.command {
        init_tracing(cli.verbose, false);
        return assetcache::cli::commands::config(args, &config_manager).await;
    }

    let config = config_manager.load().await?;
    init_tracing(cli.verbose, config.general.log_format == "json");

    if UiContext::detect().use_fancy_output() {
        ui::init_theme();
    }

    let root = project_root(cli.root, config_manager.path());
    debug!("Project root: {}", root.display());

    match cli.command {
        Commands::Config(_) => unreachable!("Config handled above"),
        Commands::Build(args) => assetcache::cli::commands::build(args, &config, &root).await,
        Commands::Install(args) => assetcache::cli::commands::install(args, &config, &root).await,
        Commands::Fetch(args) => assetcache::cli::commands::fetch(args, &config, &root).await,
        Commands::Cache(args) => assetcache::cli::commands::cache(args, &config, &root).await,
        Commands::Routes(args) => assetcache::cli::commands::routes(args, &config).await,
        Commands::Tags(args) => assetcache::cli::commands::tags(args, &config, &root).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug. Logs go to stderr so command output can be piped.
fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("assetcache=warn"),
        1 => EnvFilter::new("assetcache=info"),
        _ => EnvFilter::new("assetcache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// `--root`, else the config file's directory, else the working directory
fn project_root(root: Option<PathBuf>, config_path: &Path) -> PathBuf {
    if let Some(root) = root {
        return root;
    }
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
