//! `mapbench compare`: iterative and mapped trials back to back.

use console::style;
use mapbench::config::ConfigFile;
use mapbench::scenario::{Scenario, ScenarioContext};

use super::common::{build_harness, TrialArgs};
use super::run::print_report;
use crate::error::CliError;

pub fn run(config: ConfigFile, scenarios: &[Scenario], args: &TrialArgs) -> Result<(), CliError> {
    let config = args.apply(config);
    let harness = build_harness(&config)?;
    let ctx = ScenarioContext::default();

    for scenario in scenarios {
        println!("{}: {}", style(scenario).bold(), scenario.description());
        let variants = scenario.build(&ctx);
        let comparison = harness.compare(&variants.iterative, &variants.mapped)?;

        print_report(&comparison.iterative);
        print_report(&comparison.mapped);

        let speedup = format!("{:.2}x", comparison.speedup());
        let speedup = if comparison.speedup() >= 1.0 {
            style(speedup).green()
        } else {
            style(speedup).red()
        };
        match comparison.results_agree() {
            Some(true) => println!("  speedup    {}  results agree", speedup),
            Some(false) => println!("  speedup    {}  {}", speedup, style("results differ").yellow()),
            None => println!("  speedup    {}", speedup),
        }
        println!();
    }
    Ok(())
}
