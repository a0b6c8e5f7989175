pub mod difficulty;
pub mod evaluate;
pub mod init;
pub mod langs;

use std::path::PathBuf;

use coderound_engine::EngineConfig;

use crate::util;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Path to a config file. Defaults to searching ancestor directories
    /// for `coderound.toml`.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    #[command(alias("e"))]
    Evaluate(evaluate::Args),

    #[command(alias("d"))]
    Difficulty(difficulty::Args),

    InitConfig(init::Args),
    Langs(langs::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Evaluate(args) => evaluate::exec(args, self).await,
            Difficulty(args) => difficulty::exec(args, self),
            InitConfig(args) => init::exec(args, self),
            Langs(args) => langs::exec(args, self),
        }
    }

    pub fn load_config(&self) -> anyhow::Result<EngineConfig> {
        if let Some(path) = &self.config {
            return EngineConfig::from_toml_file(path);
        }
        match EngineConfig::find_file_in_ancestors(util::current_dir()) {
            Some(path) => EngineConfig::from_toml_file(path),
            None => Ok(EngineConfig::default()),
        }
    }
}
