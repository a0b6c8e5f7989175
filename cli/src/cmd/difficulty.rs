use std::path::PathBuf;

use anyhow::Context as _;
use coderound_engine::{difficulty, DifficultyProfile};

use super::{GlobalArgs, SubcmdResult};
use crate::util;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// JSON performance-profile file (`-` reads stdin). Flags below override
    /// fields from the file.
    #[arg(short, long)]
    pub profile: Option<PathBuf>,

    #[arg(long)]
    pub experience_years: Option<f64>,

    /// Free-form experience text ("fresher", "3+ years", "1-2 years").
    #[arg(long)]
    pub experience_level: Option<String>,

    /// Rolling test-case accuracy in percent.
    #[arg(long)]
    pub accuracy: Option<f64>,

    /// Rolling average verdict score.
    #[arg(long)]
    pub avg_score: Option<f64>,

    #[arg(long = "skill")]
    pub skills: Vec<String>,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    let mut profile = match &args.profile {
        Some(path) => {
            let input = util::read_input(path)?;
            serde_json::from_str(&input).context("Invalid difficulty profile JSON")?
        }
        None => DifficultyProfile::default(),
    };

    if args.experience_years.is_some() {
        profile.experience_years = args.experience_years;
    }
    if args.experience_level.is_some() {
        profile.experience_level = args.experience_level.clone();
    }
    if args.accuracy.is_some() {
        profile.rolling_accuracy = args.accuracy;
    }
    if args.avg_score.is_some() {
        profile.rolling_average_score = args.avg_score;
    }
    if !args.skills.is_empty() {
        profile.skills = args.skills.clone();
    }

    println!("{}", difficulty::select(&profile));
    Ok(())
}
