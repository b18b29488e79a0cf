//! Integration tests for the benchmark harness.
//!
//! These tests run full trials against the in-memory backend:
//! - cache-bust probe behaviour across repeated trials
//! - export polling through the job watcher
//! - every built-in scenario, both variants, end to end
//!
//! Run with: `cargo test --test harness_integration`

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use mapbench::bench::{BenchError, Harness, TrialOutcome};
use mapbench::client::{Catalog, InMemoryClient, JobScript};
use mapbench::config::{BenchConfig, ConfigFile};
use mapbench::expr::{Expr, Reducer};
use mapbench::job::{JobState, JobWatcher, Sleeper};
use mapbench::probe::CacheBustProbe;
use mapbench::scenario::{Scenario, ScenarioContext};
use mapbench::variant::{MappedVariant, Sink, Transform};

// ============================================================================
// Helper Functions
// ============================================================================

/// Records requested sleeps instead of blocking.
#[derive(Default)]
struct FakeClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl Sleeper for FakeClock {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

fn catalog() -> Catalog {
    static DEMO: OnceLock<Catalog> = OnceLock::new();
    DEMO.get_or_init(Catalog::demo).clone()
}

fn harness_with(client: InMemoryClient, clock: Arc<FakeClock>) -> Harness<InMemoryClient> {
    let watcher = JobWatcher::new(Duration::from_secs(5)).with_sleeper(clock);
    Harness::new(client, watcher)
}

fn harness() -> Harness<InMemoryClient> {
    harness_with(InMemoryClient::new(catalog()), Arc::new(FakeClock::default()))
}

fn daily_max() -> MappedVariant {
    MappedVariant::new(
        "daily-max",
        Expr::dataset("NASA/ORNL/DAYMET").limit(10),
        Transform::Reduce(Expr::Arg.select(["tmax"]).reduce_region(Reducer::Max, None, 30.0)),
    )
}

// ============================================================================
// Integration Tests
// ============================================================================

/// The probe's second run must miss the response cache just like the first.
#[test]
fn test_probe_is_not_served_from_cache() {
    let client = InMemoryClient::new(catalog()).with_cache(100_000);
    let harness = harness_with(client, Arc::new(FakeClock::default()));

    harness.run_trial(&daily_max()).unwrap();
    let after_first = harness.client().inner().stats();
    harness.run_trial(&daily_max()).unwrap();
    let after_second = harness.client().inner().stats();

    // The variant itself repeats verbatim and hits; the probe never does.
    assert_eq!(after_first.cache_hits, 0);
    assert_eq!(after_second.cache_hits, 1);
    assert_eq!(after_second.cache_misses, after_first.cache_misses + 1);
}

/// A job that completes after two intervals is polled exactly twice.
#[test]
fn test_export_polled_until_complete() {
    let clock = Arc::new(FakeClock::default());
    let harness = harness_with(InMemoryClient::new(catalog()), clock.clone()).without_probe();

    let report = harness
        .run_trial(&daily_max().with_sink(Sink::csv("mapTest")))
        .unwrap();

    match &report.outcome {
        TrialOutcome::Exported { wait, .. } => {
            assert_eq!(wait.polls, 2);
            assert_eq!(wait.status.state, JobState::Completed);
            assert_eq!(wait.waited, Duration::from_secs(10));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(report.requests.status_polls, 2);
    assert_eq!(*clock.sleeps.lock().unwrap(), vec![Duration::from_secs(5); 2]);
}

#[test]
fn test_slow_job_times_out() {
    let client = InMemoryClient::new(catalog()).with_job_script(JobScript {
        queued_polls: 3,
        active_polls: 10,
    });
    let clock = Arc::new(FakeClock::default());
    let watcher = JobWatcher::new(Duration::from_secs(5))
        .with_max_wait(Duration::from_secs(20))
        .with_sleeper(clock);
    let harness = Harness::new(client, watcher).without_probe();

    let err = harness
        .run_trial(&daily_max().with_sink(Sink::csv("slow")))
        .unwrap_err();
    assert!(matches!(err, BenchError::WaitTimeout { .. }), "{:?}", err);
}

#[test]
fn test_configured_probe_and_watcher() {
    let mut file = ConfigFile::default();
    file.benchmark.cache_bust_limit = 50;
    file.benchmark.poll_interval_secs = 1;
    let config = BenchConfig::from(&file);
    config.validate().unwrap();

    let probe: CacheBustProbe = config.probe().unwrap();
    assert_eq!(probe.limit(), 50);

    let harness = Harness::new(InMemoryClient::new(catalog()), config.watcher()).with_probe(probe);
    assert_eq!(harness.watcher().interval(), Duration::from_secs(1));
    let report = harness.run_trial(&daily_max()).unwrap();
    assert_eq!(report.results().unwrap().len(), 10);
}

/// Scenarios that collect results must agree across variants; the mapped
/// variant must always use a single request.
#[test]
fn test_collect_scenarios_agree() {
    let ctx = ScenarioContext::default();
    for scenario in [
        Scenario::YearlyComposite,
        Scenario::PrecipAggregate,
        Scenario::SceneNdvi,
    ] {
        let variants = scenario.build(&ctx);
        let comparison = harness()
            .compare(&variants.iterative, &variants.mapped)
            .unwrap_or_else(|e| panic!("{}: {}", scenario, e));

        assert_eq!(comparison.results_agree(), Some(true), "{}", scenario);
        assert_eq!(comparison.mapped.requests.total(), 1, "{}", scenario);
        assert!(
            comparison.iterative.requests.total() > comparison.mapped.requests.total(),
            "{}",
            scenario
        );
    }
}

#[test]
fn test_yearly_composite_has_one_record_per_year() {
    let variants = Scenario::YearlyComposite.build(&ScenarioContext::default());
    let report = harness().run_trial(&variants.mapped).unwrap();
    let results = report.results().unwrap();
    assert_eq!(results.len(), 28);
    assert!(results.iter().all(|r| r.get("NDVI").is_some()));
}

#[test]
fn test_sampled_export_tables_match() {
    let variants = Scenario::SampledExport.build(&ScenarioContext::default());
    let harness = harness().without_probe();

    let iterative = harness.run_trial(&variants.iterative).unwrap();
    let mapped = harness.run_trial(&variants.mapped).unwrap();

    let table = |outcome: &TrialOutcome| match outcome {
        TrialOutcome::Exported { job, .. } => harness.client().inner().exported_table(job).unwrap(),
        other => panic!("unexpected outcome: {:?}", other),
    };
    let loop_table = table(&iterative.outcome);
    let map_table = table(&mapped.outcome);

    assert!(!map_table.is_empty());
    assert!(loop_table.equivalent(&map_table));
    assert!(map_table.iter().all(|r| r.get("NDVI").is_some()));
    assert!(map_table.iter().all(|r| r.get("system:time_start").is_some()));

    // One length query plus the export, versus a single export.
    assert_eq!(iterative.requests.evaluations, 1);
    assert_eq!(iterative.requests.exports, 1);
    assert_eq!(mapped.requests.evaluations + mapped.requests.maps, 0);
    assert_eq!(mapped.requests.exports, 1);
}
