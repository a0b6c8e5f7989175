use std::io;
use std::path::PathBuf;

use anyhow::Context as _;
use colored::Colorize as _;
use coderound_engine::{Engine, EvaluateRequest, Verdict};

use super::{GlobalArgs, SubcmdResult};
use crate::util;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// JSON evaluation request file (`-` reads stdin).
    #[arg(short, long, default_value = "-")]
    pub request: PathBuf,

    /// Emit the verdict as JSON instead of a human-readable report.
    #[arg(short, long)]
    pub json: bool,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;
    let input = util::read_input(&args.request)?;
    let req: EvaluateRequest =
        serde_json::from_str(&input).context("Invalid evaluation request JSON")?;

    log::info!("Evaluating a {} submission", req.language);
    let engine = Engine::new(cfg);
    let verdict = engine.evaluate(&req).await?;

    if args.json {
        serde_json::to_writer_pretty(io::stdout(), &verdict)?;
        println!();
        return Ok(());
    }

    print_verdict(&verdict);
    Ok(())
}

fn print_verdict(v: &Verdict) {
    let headline = if v.correctness {
        format!("CORRECT  (score: {}/100)", v.score).green().bold()
    } else {
        format!("INCORRECT  (score: {}/100)", v.score).red().bold()
    };
    println!("{}", headline);

    if v.total_test_cases > 0 {
        let cases = format!(
            "Test cases: {}/{} passed",
            v.test_cases_passed, v.total_test_cases
        );
        if v.test_cases_passed == v.total_test_cases {
            println!("{}", cases.green());
        } else {
            println!("{}", cases.yellow());
        }
    }

    println!(
        "Complexity: {} time, {} space",
        v.time_complexity.cyan(),
        v.space_complexity.cyan()
    );
    println!("\n{}\n{}", "[feedback]".cyan().bold(), v.feedback);
    println!("{}\n{}", "[execution]".cyan().bold(), v.execution_output);
}
