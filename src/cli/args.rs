//! CLI argument definitions using clap derive

use crate::bootstrap::BuildMode;
use crate::fingerprint::NamingTemplate;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// assetcache - versioned asset builds with an offline cache worker
///
/// Fingerprints web assets, generates the precache list, and installs it
/// into a versioned cache store that serves requests cache-first.
#[derive(Parser, Debug)]
#[command(name = "assetcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ASSETCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project directory relative paths resolve against
    /// (defaults to the config file's directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fingerprint assets and write the output tree
    Build(BuildArgs),

    /// Register the worker and install the precache list
    Install(InstallArgs),

    /// Request URLs the way a page would, through the worker
    Fetch(FetchArgs),

    /// Manage cache stores
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Show dev server proxy routes
    Routes(RoutesArgs),

    /// Print layout script and style tags
    Tags(TagsArgs),
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Output naming template (overrides build.naming)
    #[arg(short, long)]
    pub naming: Option<NamingTemplate>,

    /// Output directory (overrides build.out_dir)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Keep existing files in the output directory
    #[arg(long)]
    pub no_clean: bool,
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Serve precache requests from a directory instead of worker.origin
    #[arg(long)]
    pub from_dir: Option<PathBuf>,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URLs to request, absolute or relative to the worker scope
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Serve network requests from a directory instead of worker.origin
    #[arg(long)]
    pub from_dir: Option<PathBuf>,

    /// Skip worker registration (requests go straight to the network)
    #[arg(long)]
    pub no_worker: bool,

    /// Write response bodies to stdout instead of a summary
    #[arg(long)]
    pub body: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cache stores
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove stores left behind by earlier builds
    Gc {
        /// Dry run - show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every cache store
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the routes command
#[derive(Parser, Debug)]
pub struct RoutesArgs {
    /// Show where a single request path is forwarded
    pub path: Option<String>,
}

/// Arguments for the tags command
#[derive(Parser, Debug)]
pub struct TagsArgs {
    /// Asset source the tags point at
    #[arg(short, long, default_value = "prod")]
    pub mode: BuildMode,

    /// Also print the worker registration script
    #[arg(long)]
    pub register: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_build() {
        let cli = Cli::parse_from(["assetcache", "build", "--naming", "hashed", "--no-clean"]);
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.naming, Some(NamingTemplate::Hashed));
                assert!(args.no_clean);
                assert!(args.out.is_none());
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn cli_parses_fetch() {
        let cli = Cli::parse_from(["assetcache", "fetch", "/index.css", "/index.js", "--no-worker"]);
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.urls, vec!["/index.css", "/index.js"]);
                assert!(args.no_worker);
            }
            _ => panic!("expected Fetch command"),
        }
    }

    #[test]
    fn fetch_requires_urls() {
        assert!(Cli::try_parse_from(["assetcache", "fetch"]).is_err());
    }

    #[test]
    fn cli_parses_cache_gc() {
        let cli = Cli::parse_from(["assetcache", "cache", "gc", "--dry-run"]);
        match cli.command {
            Commands::Cache(args) => {
                assert!(matches!(args.action, CacheAction::Gc { dry_run: true }));
            }
            _ => panic!("expected Cache command"),
        }
    }

    #[test]
    fn cli_parses_tags_mode() {
        let cli = Cli::parse_from(["assetcache", "tags", "--mode", "dev", "--register"]);
        match cli.command {
            Commands::Tags(args) => {
                assert_eq!(args.mode, BuildMode::Dev);
                assert!(args.register);
            }
            _ => panic!("expected Tags command"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["assetcache", "routes", "-vv", "-c", "site/assetcache.toml"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("site/assetcache.toml")));
    }
}
