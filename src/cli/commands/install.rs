//! Install command - register the worker and precache the last build

use crate::bootstrap::{self, LocalWorkerContainer, RegistrationOutcome};
use crate::cli::args::InstallArgs;
use crate::config::Config;
use crate::error::{AssetCacheError, AssetCacheResult};
use crate::ui::{self, TaskSpinner, UiContext};
use crate::worker::{self, format_bytes, WorkerState};
use std::path::Path;

/// Execute the install command
pub async fn execute(args: InstallArgs, config: &Config, root: &Path) -> AssetCacheResult<()> {
    let ctx = UiContext::detect();
    let context = worker::context_from_config(config, root, args.from_dir.as_deref()).await?;
    let store = context.manifest.store_name();
    let urls = context.manifest.urls.len();
    let container = LocalWorkerContainer::new(context);

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Installing {} urls into {}...", urls, store));

    let outcome = bootstrap::register(
        Some(&container),
        &config.worker.script_url,
        &config.worker.scope,
    )
    .await;

    let registration = match outcome {
        RegistrationOutcome::Registered(registration) => registration,
        RegistrationOutcome::Unsupported => {
            spinner.stop_error("No worker runtime");
            return Err(AssetCacheError::RegistrationFailed(
                "no worker runtime available".into(),
            ));
        }
        RegistrationOutcome::Failed(reason) => {
            spinner.stop_error("Registration failed");
            return Err(AssetCacheError::RegistrationFailed(reason));
        }
    };

    let report = match (registration.state, registration.report) {
        (WorkerState::Activated, Some(report)) => report,
        _ => {
            spinner.stop_error("Install failed");
            return Err(AssetCacheError::InstallFailed(
                registration
                    .install_error
                    .unwrap_or_else(|| format!("worker is {}", registration.state)),
            ));
        }
    };

    spinner.stop(&format!(
        "Installed {} entries ({})",
        report.cached,
        format_bytes(report.bytes)
    ));
    ui::step_ok_detail(&ctx, "Worker activated", &report.store);
    for stale in &report.reclaimed {
        ui::step_info(&ctx, &format!("Deleted stale store {}", stale));
    }

    Ok(())
}
