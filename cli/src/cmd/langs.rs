use std::io;

use colored::Colorize as _;
use coderound_engine::{toolchain::ToolchainRegistry, Language};
use strum::IntoEnumIterator as _;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(short, long)]
    pub json: bool,
}

#[derive(serde::Serialize)]
struct LangEntry {
    language: String,
    available: bool,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    let registry = ToolchainRegistry::probe();

    if args.json {
        let entries: Vec<LangEntry> = Language::iter()
            .map(|lang| LangEntry {
                language: lang.to_string(),
                available: registry.is_available(lang),
            })
            .collect();
        serde_json::to_writer_pretty(io::stdout(), &entries)?;
        println!();
        return Ok(());
    }

    for lang in Language::iter() {
        if registry.is_available(lang) {
            println!("{}  {}", "ok".green().bold(), lang);
        } else {
            println!("{}  {} (toolchain not found)", "--".dimmed(), lang);
        }
    }
    Ok(())
}
