//! Build command - fingerprint assets and write the output tree

use crate::cli::args::BuildArgs;
use crate::config::Config;
use crate::error::{AssetCacheError, AssetCacheResult};
use crate::pipeline::{self, BuildReport};
use crate::ui::{self, TaskSpinner, UiContext};
use crate::worker::format_bytes;
use std::path::Path;

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config, root: &Path) -> AssetCacheResult<()> {
    let ctx = UiContext::detect();
    let config = apply_overrides(args, config);

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Building assets ({} naming)...", config.build.naming));

    let report = match build_blocking(config, root).await {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Build failed");
            return Err(e);
        }
    };

    spinner.stop(&format!("Built {} assets", report.records.len()));

    for record in &report.records {
        ui::key_value(&ctx, &record.logical_name, &record.output_path);
    }

    ui::step_ok_detail(
        &ctx,
        &format!(
            "Wrote {} files ({})",
            report.files,
            format_bytes(report.bytes)
        ),
        &report.out_dir.display().to_string(),
    );
    ui::step_info(
        &ctx,
        &format!(
            "Precache list: {} urls into {}",
            report.precache.urls.len(),
            report.precache.store_name()
        ),
    );
    ui::remark(
        &ctx,
        &format!("tree digest {}", report.digest.get(..16).unwrap_or(&report.digest)),
    );

    Ok(())
}

/// Fingerprinting and compression are CPU and std::fs bound
async fn build_blocking(config: Config, root: &Path) -> AssetCacheResult<BuildReport> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || pipeline::build(&config, &root))
        .await
        .map_err(|e| AssetCacheError::Internal(format!("build task failed: {e}")))?
}

fn apply_overrides(args: BuildArgs, config: &Config) -> Config {
    let mut config = config.clone();
    if let Some(naming) = args.naming {
        config.build.naming = naming;
    }
    if let Some(out) = args.out {
        config.build.out_dir = out;
    }
    if args.no_clean {
        config.build.clean = false;
    }
    config
}
