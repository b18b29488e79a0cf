//! `mapbench list`

use mapbench::scenario::Scenario;

use crate::error::CliError;

/// Print the built-in scenarios.
pub fn run() -> Result<(), CliError> {
    println!("Scenarios");
    println!("=========");
    for scenario in Scenario::all() {
        println!("  {:<18} {}", scenario.name(), scenario.description());
    }
    Ok(())
}
