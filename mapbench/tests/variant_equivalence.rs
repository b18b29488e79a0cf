//! Integration tests comparing the iterative and mapped runners.
//!
//! Both runners are driven against the in-memory backend over the demo
//! catalog, wrapped in a `CountingClient` so request counts can be checked
//! alongside the results.
//!
//! Run with: `cargo test --test variant_equivalence`

use std::sync::OnceLock;

use proptest::prelude::*;

use mapbench::client::{Catalog, ClientError, CountingClient, InMemoryClient};
use mapbench::expr::{Expr, Reducer};
use mapbench::geometry::Geometry;
use mapbench::record::ResultSet;
use mapbench::variant::{
    ElementSource, IterativeVariant, MappedVariant, Transform, Variant, VariantOutcome,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn catalog() -> Catalog {
    static DEMO: OnceLock<Catalog> = OnceLock::new();
    DEMO.get_or_init(Catalog::demo).clone()
}

fn counting_client() -> CountingClient<InMemoryClient> {
    CountingClient::new(InMemoryClient::new(catalog()))
}

fn collect(variant: &dyn Variant, client: &CountingClient<InMemoryClient>) -> ResultSet {
    match variant.run(client).expect("variant run") {
        VariantOutcome::Results(results) => results,
        VariantOutcome::Export(job) => panic!("unexpected export {}", job),
    }
}

/// Sample locations inside the demo grid.
fn points() -> Vec<Geometry> {
    vec![
        Geometry::point(-107.01, 39.01),
        Geometry::point(-106.94, 38.96),
        Geometry::point(-107.06, 39.09),
    ]
}

const DATASETS: &[(&str, &str)] = &[
    ("NASA/ORNL/DAYMET", "prcp"),
    ("NASA/ORNL/DAYMET", "tmax"),
    ("LANDSAT/LT5_L1T", "B4"),
    ("LANDSAT/LT5_L1T_32DAY_NDVI", "NDVI"),
];

const REDUCERS: &[Reducer] = &[Reducer::Mean, Reducer::Max, Reducer::Sum, Reducer::Median];

// ============================================================================
// Integration Tests
// ============================================================================

/// Three scenes reduced as-is: the iterative runner returns the records in
/// input order, the mapped runner returns the same values in collection
/// order. Only the mapped records carry the scene identity.
#[test]
fn test_three_element_identity_reduce() {
    let scenes = Expr::dataset("LANDSAT/LT5_L1T").limit(3);
    let transform = Transform::Reduce(Expr::Arg.reduce_region(Reducer::Mean, None, 30.0));

    let client = counting_client();
    let iterative = collect(
        &IterativeVariant::from_transform("loop", ElementSource::Remote(scenes.clone()), transform.clone()),
        &client,
    );
    let mapped = collect(&MappedVariant::new("map", scenes, transform), &client);

    assert_eq!(iterative.len(), 3);
    assert_eq!(mapped.len(), 3);
    assert_eq!(iterative.normalized(), mapped.normalized());
    assert!(iterative.equivalent(&mapped));

    assert!(iterative.iter().all(|r| r.source_id.is_none()));
    assert!(mapped.iter().all(|r| r.source_id.is_some()));
    assert_ne!(iterative, mapped);
}

#[test]
fn test_literal_path_over_cap_fails() {
    let client = counting_client();
    let variant = MappedVariant::new(
        "too-many",
        Expr::dataset("NASA/ORNL/DAYMET"),
        Transform::Reduce(Expr::Arg.select(["prcp"]).reduce_region(Reducer::Mean, None, 30.0)),
    );
    // 366 images fit; the same records over a 6000-element sequence do not.
    assert!(variant.run(&client).is_ok());

    let numbers = MappedVariant::new(
        "numbers",
        Expr::sequence(0.0, 5999.0, 1.0),
        Transform::Reduce(
            Expr::dataset("NASA/ORNL/DAYMET")
                .limit(1)
                .median()
                .reduce_region(Reducer::Mean, None, 30.0),
        ),
    );
    let err = numbers.run(&client).unwrap_err();
    assert_eq!(err, ClientError::ResultTooLarge { limit: 5000 });
}

/// Sampling every surface reflectance scene at eight pixels yields about
/// 8000 records from roughly a thousand elements. The cap applies to the
/// records, and the whole attempt is still a single map request.
#[test]
fn test_sampled_output_over_cap_fails() {
    let points = [-107.15, -107.05, -106.95, -106.85]
        .into_iter()
        .flat_map(|lon| [39.15, 38.85].map(|lat| Geometry::point(lon, lat)))
        .collect();
    let variant = MappedVariant::new(
        "sr-points",
        Expr::dataset("LEDAPS/LT5_L1T_SR"),
        Transform::SamplePoints {
            prepare: Expr::Arg.select(["B4"]),
            points,
            scale: 30.0,
        },
    );

    let client = counting_client();
    let err = variant.run(&client).unwrap_err();
    assert_eq!(err, ClientError::ResultTooLarge { limit: 5000 });

    let counts = client.snapshot();
    assert_eq!(counts.maps, 1);
    assert_eq!(counts.total(), 1);
}

#[test]
fn test_fetch_all_over_cap_is_not_truncated() {
    use mapbench::client::ComputeClient;

    let client = InMemoryClient::new(Catalog::new());
    let err = client.fetch_all(&Expr::sequence(1.0, 6000.0, 1.0)).unwrap_err();
    assert!(matches!(err, ClientError::ResultTooLarge { .. }));
}

#[test]
fn test_sampled_counts_bounded_by_points() {
    let scenes = Expr::dataset("LANDSAT/LT5_L1T").limit(4);
    let transform = Transform::SamplePoints {
        prepare: Expr::Arg.normalized_difference("B4", "B3"),
        points: points(),
        scale: 30.0,
    };

    let client = counting_client();
    let iterative = collect(
        &IterativeVariant::from_transform("loop", ElementSource::Remote(scenes.clone()), transform.clone()),
        &client,
    );
    assert_eq!(client.snapshot().total(), 1 + 4 * 3);

    let before = client.snapshot();
    let mapped = collect(&MappedVariant::new("map", scenes, transform), &client);
    assert_eq!((client.snapshot() - before).total(), 1);

    // No masked pixels in these scenes: every point yields one record.
    assert_eq!(iterative.len(), 12);
    assert!(iterative.equivalent(&mapped));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_variants_agree(
        n in 1usize..12,
        dataset in 0..DATASETS.len(),
        reducer in 0..REDUCERS.len(),
    ) {
        let (id, band) = DATASETS[dataset];
        let collection = Expr::dataset(id).limit(n);
        let transform = Transform::Reduce(
            Expr::Arg.select([band]).reduce_region(REDUCERS[reducer], None, 30.0),
        );

        let client = counting_client();
        let iterative = collect(
            &IterativeVariant::from_transform("loop", ElementSource::Remote(collection.clone()), transform.clone()),
            &client,
        );
        prop_assert_eq!(client.snapshot().total(), 1 + n as u64);

        let before = client.snapshot();
        let mapped = collect(&MappedVariant::new("map", collection, transform), &client);
        prop_assert_eq!((client.snapshot() - before).total(), 1);

        prop_assert_eq!(iterative.len(), n);
        prop_assert!(iterative.equivalent(&mapped));
    }

    #[test]
    fn test_range_and_sequence_agree(start in 0u32..20, len in 1u32..15, step in 1u32..4) {
        let end = start + (len - 1) * step;
        let source = ElementSource::range(start as f64, end as f64, step as f64);
        let transform = Transform::Reduce(
            Expr::dataset("NASA/ORNL/DAYMET")
                .get(0)
                .select(["tmax"])
                .multiply(Expr::Arg)
                .reduce_region(Reducer::Mean, None, 30.0),
        );

        let client = counting_client();
        let iterative = collect(
            &IterativeVariant::from_transform("loop", source.clone(), transform.clone()),
            &client,
        );
        let mapped = collect(&MappedVariant::new("map", source.collection(), transform), &client);

        prop_assert_eq!(iterative.len(), len as usize);
        prop_assert!(iterative.equivalent(&mapped));
    }
}
