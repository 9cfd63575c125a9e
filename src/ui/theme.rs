//! cliclack theme

use cliclack::ThemeState;
use console::Style;

/// Magenta bars, green on submit
#[derive(Debug, Clone, Default)]
pub struct AssetCacheTheme;

impl cliclack::Theme for AssetCacheTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().magenta(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().magenta().dim(),
        }
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().magenta(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().green(),
        }
    }
}

/// Install the theme for every later prompt and spinner
pub fn init_theme() {
    cliclack::set_theme(AssetCacheTheme);
}
