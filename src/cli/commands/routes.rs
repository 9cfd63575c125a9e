//! Routes command - show dev server proxy routes

use crate::cli::args::RoutesArgs;
use crate::config::Config;
use crate::devproxy::ProxyRoutes;
use crate::error::AssetCacheResult;
use crate::ui::{self, UiContext};

/// Execute the routes command
pub async fn execute(args: RoutesArgs, config: &Config) -> AssetCacheResult<()> {
    let ctx = UiContext::detect();
    let routes = ProxyRoutes::from_config(&config.dev)?;

    if let Some(path) = args.path {
        match routes.resolve(&path) {
            Some(target) => println!("{} -> {}", path, target),
            None => println!("{} -> {} (dev server)", path, config.dev.server),
        }
        return Ok(());
    }

    if routes.routes().is_empty() {
        ui::step_info(&ctx, "No proxy routes configured");
        return Ok(());
    }

    for route in routes.routes() {
        ui::key_value(&ctx, &route.prefix, route.target.as_str());
    }
    ui::remark(&ctx, &format!("Everything else: {}", config.dev.server));

    Ok(())
}
