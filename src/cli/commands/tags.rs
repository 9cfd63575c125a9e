//! Tags command - print layout script and style tags

use crate::bootstrap::{registration_snippet, AssetTags, BuildMode, Entrypoints};
use crate::cli::args::TagsArgs;
use crate::config::Config;
use crate::error::AssetCacheResult;
use crate::manifest::{AssetMap, ASSET_MANIFEST_FILE};
use std::path::Path;

/// Execute the tags command
pub async fn execute(args: TagsArgs, config: &Config, root: &Path) -> AssetCacheResult<()> {
    let entries = Entrypoints {
        script: config.build.entry_script.clone(),
        style: config.build.entry_style.clone(),
    };

    let assets = match args.mode {
        BuildMode::Prod => {
            AssetMap::load(&root.join(&config.build.out_dir).join(ASSET_MANIFEST_FILE)).await?
        }
        BuildMode::Dev => AssetMap::default(),
    };

    let tags = AssetTags::render(args.mode, &entries, &assets, &config.dev.server)?;
    println!("{}", tags.scripts);
    println!("{}", tags.styles);

    if args.register {
        println!(
            "{}",
            registration_snippet(&config.worker.script_url, &config.worker.scope)
        );
    }

    Ok(())
}
