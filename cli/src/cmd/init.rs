use std::path::PathBuf;

use anyhow::{bail, Context as _};
use colored::Colorize as _;
use coderound_engine::EngineConfig;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(default_value = "./")]
    dir: PathBuf,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    let path = args.dir.join(EngineConfig::FILENAME);
    if path.exists() {
        bail!("Config file already exists: {:?}", path);
    }
    std::fs::write(&path, EngineConfig::example_toml())
        .with_context(|| format!("Cannot write config file {:?}", path))?;

    println!(
        "{}",
        format!("Wrote example config. (path: {})", path.to_string_lossy()).green()
    );
    Ok(())
}
