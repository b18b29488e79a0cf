//! `mapbench run`: one timed trial of one variant.

use console::style;
use mapbench::bench::{TrialOutcome, TrialReport};
use mapbench::config::ConfigFile;
use mapbench::scenario::{Scenario, ScenarioContext};
use mapbench::variant::{Strategy, Variant};

use super::common::{build_harness, TrialArgs};
use crate::error::CliError;

/// Run a single trial and print its report.
pub fn run(
    config: ConfigFile,
    scenario: Scenario,
    strategy: Strategy,
    args: &TrialArgs,
) -> Result<(), CliError> {
    let config = args.apply(config);
    let harness = build_harness(&config)?;
    let variants = scenario.build(&ScenarioContext::default());

    let variant: &dyn Variant = match strategy {
        Strategy::Iterative => &variants.iterative,
        Strategy::Mapped => &variants.mapped,
    };

    println!(
        "Running {} ({}) against {}",
        style(scenario).bold(),
        strategy,
        config.service.backend
    );
    let report = harness.run_trial(variant)?;
    print_report(&report);
    Ok(())
}

/// Print one trial report.
pub fn print_report(report: &TrialReport) {
    println!(
        "  {:<10} {:>9.3}s  {}",
        report.strategy,
        report.elapsed.as_secs_f64(),
        report.requests
    );
    match &report.outcome {
        TrialOutcome::Results(results) => println!("  {:<10} {} records", "", results.len()),
        TrialOutcome::Exported { job, wait } => println!(
            "  {:<10} job {} {} after {} polls ({}s waited)",
            "",
            job,
            wait.status.state,
            wait.polls,
            wait.waited.as_secs()
        ),
    }
}
