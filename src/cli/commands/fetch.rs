//! Fetch command - request URLs through the worker like a page would

use crate::bootstrap::{self, LocalWorkerContainer, RegistrationOutcome, WorkerContainer};
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{AssetCacheError, AssetCacheResult};
use crate::ui::{self, UiContext};
use crate::worker::{self, format_bytes, FetchOutcome, Request};
use console::style;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config, root: &Path) -> AssetCacheResult<()> {
    let ctx = UiContext::detect();
    let context = worker::context_from_config(config, root, args.from_dir.as_deref()).await?;
    let scope = context.scope.clone();
    let container = LocalWorkerContainer::new(context);

    let runtime: Option<&dyn WorkerContainer> = if args.no_worker {
        None
    } else {
        Some(&container)
    };

    match bootstrap::register(runtime, &config.worker.script_url, &config.worker.scope).await {
        RegistrationOutcome::Registered(registration) => {
            debug!("Worker {}", registration.state);
            if let Some(reason) = registration.install_error {
                ui::step_warn_hint(&ctx, "Worker not controlling requests", &reason);
            }
        }
        RegistrationOutcome::Unsupported => {
            ui::step_info(&ctx, "No worker registered, requests go to the network");
        }
        RegistrationOutcome::Failed(reason) => {
            ui::step_warn_hint(&ctx, "Worker registration failed", &reason);
        }
    }

    let mut failures = 0;
    for url in &args.urls {
        let request = Request::resolve(&scope, url)?;
        match container.fetch(request).await {
            Ok(outcome) if args.body => write_body(&outcome)?,
            Ok(outcome) => print_summary(url, &outcome),
            Err(e) => {
                ui::step_error_detail(&ctx, url, &e.to_string());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(AssetCacheError::User(format!(
            "{} of {} request(s) failed",
            failures,
            args.urls.len()
        )));
    }
    Ok(())
}

fn print_summary(url: &str, outcome: &FetchOutcome) {
    let status = outcome.response.status;
    let status = if outcome.response.is_ok() {
        style(status).green()
    } else {
        style(status).yellow()
    };
    println!(
        "{} {:<8} {} ({})",
        status,
        outcome.source.to_string(),
        url,
        format_bytes(outcome.response.body.len() as u64)
    );
}

fn write_body(outcome: &FetchOutcome) -> AssetCacheResult<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&outcome.response.body)
        .and_then(|_| stdout.flush())
        .map_err(|e| AssetCacheError::io("writing response body", e))
}
