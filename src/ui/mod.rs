//! Terminal output for assetcache commands
//!
//! Interactive terminals get `cliclack` spinners and prompts; CI and piped
//! output fall back to plain `[OK]`/`[WARN]` lines.
//!
//! ```rust,ignore
//! use assetcache::ui::{self, TaskSpinner, UiContext};
//!
//! let ctx = UiContext::detect().with_auto_yes(args.yes);
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Installing precache list...");
//! spinner.stop("Installed 12 entries");
//!
//! ui::step_warn_hint(&ctx, "Worker not controlling requests", "404 for /b.js");
//!
//! if ui::confirm(&ctx, "Remove these stores?", false).await? { /* ... */ }
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    key_value, remark, step_error_detail, step_info, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use prompts::confirm;
pub use theme::{init_theme, AssetCacheTheme};
