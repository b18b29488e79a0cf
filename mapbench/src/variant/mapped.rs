//! Server-side map runner.

use tracing::debug;

use super::{into_records, Sink, Strategy, Transform, Variant, VariantOutcome};
use crate::client::{ClientError, ComputeClient};
use crate::expr::Expr;

/// Submits one `map(collection, body)` request for the whole collection.
///
/// The client issues a single round trip regardless of collection size. When
/// collected, the output is still a literal and therefore subject to the
/// provider's element cap, counted in records. One-to-many transforms are
/// flattened on the service for both sinks.
#[derive(Clone, Debug, PartialEq)]
pub struct MappedVariant {
    name: String,
    collection: Expr,
    transform: Transform,
    sink: Sink,
}

impl MappedVariant {
    pub fn new(name: impl Into<String>, collection: Expr, transform: Transform) -> Self {
        Self {
            name: name.into(),
            collection,
            transform,
            sink: Sink::Collect,
        }
    }

    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = sink;
        self
    }

    pub fn collection(&self) -> &Expr {
        &self.collection
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    /// The expression exported by an export sink.
    pub fn export_expr(&self) -> Expr {
        let mapped = self.collection.clone().map(self.transform.mapped_body());
        if self.transform.is_one_to_many() {
            mapped.flatten()
        } else {
            mapped
        }
    }
}

impl Variant for MappedVariant {
    fn name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> Strategy {
        Strategy::Mapped
    }

    fn run(&self, client: &dyn ComputeClient) -> Result<VariantOutcome, ClientError> {
        if let Some(request) = self.sink.export_request(self.export_expr()) {
            debug!(variant = %self.name, nodes = request.collection.node_count(), "Exporting mapped graph");
            return client.start_export(&request).map(VariantOutcome::Export);
        }

        let body = self.transform.mapped_body();
        debug!(variant = %self.name, nodes = body.node_count(), "Submitting map");
        let value = if self.transform.is_one_to_many() {
            client.submit_flat_map(&self.collection, &body)?
        } else {
            client.submit_map(&self.collection, &body)?
        };
        into_records(value).map(VariantOutcome::Results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Catalog, CountingClient, InMemoryClient};
    use crate::expr::Reducer;
    use crate::geometry::Geometry;

    fn ndvi_mean() -> Transform {
        Transform::Reduce(
            Expr::Arg
                .normalized_difference("B4", "B3")
                .reduce_region(Reducer::Mean, None, 30.0),
        )
    }

    #[test]
    fn test_single_request_regardless_of_size() {
        for n in [1, 10, 60] {
            let client = CountingClient::new(InMemoryClient::new(Catalog::demo()));
            let variant = MappedVariant::new(
                "scenes",
                Expr::dataset("LANDSAT/LT5_L1T").limit(n),
                ndvi_mean(),
            );
            match variant.run(&client).unwrap() {
                VariantOutcome::Results(results) => assert_eq!(results.len(), n),
                other => panic!("unexpected: {:?}", other),
            }
            assert_eq!(client.snapshot().total(), 1);
            assert_eq!(client.snapshot().maps, 1);
        }
    }

    #[test]
    fn test_records_carry_source_identity() {
        let client = InMemoryClient::new(Catalog::demo());
        let variant = MappedVariant::new("scenes", Expr::dataset("LANDSAT/LT5_L1T").limit(2), ndvi_mean());
        let results = match variant.run(&client).unwrap() {
            VariantOutcome::Results(results) => results,
            other => panic!("unexpected: {:?}", other),
        };
        assert!(results.iter().all(|r| r.source_id.is_some() && r.timestamp.is_some()));
    }

    #[test]
    fn test_collected_output_over_cap_fails() {
        let client = InMemoryClient::new(Catalog::new());
        let variant = MappedVariant::new(
            "numbers",
            Expr::sequence(1.0, 6000.0, 1.0),
            Transform::Reduce(Expr::Arg),
        );
        let err = variant.run(&client).unwrap_err();
        assert_eq!(err, ClientError::ResultTooLarge { limit: 5000 });
    }

    #[test]
    fn test_one_to_many_collect_counts_records_against_cap() {
        // 60 scenes x 100 points is 6000 records from only 60 elements.
        let points = (0..100)
            .map(|i| Geometry::point(-107.19 + 0.0035 * i as f64, 39.0))
            .collect();
        let transform = Transform::SamplePoints {
            prepare: Expr::Arg.select(["B4"]),
            points,
            scale: 30.0,
        };
        let client = CountingClient::new(InMemoryClient::new(Catalog::demo()));
        let variant = MappedVariant::new("scenes", Expr::dataset("LANDSAT/LT5_L1T").limit(60), transform);
        let err = variant.run(&client).unwrap_err();
        assert_eq!(err, ClientError::ResultTooLarge { limit: 5000 });
        assert_eq!(client.snapshot().maps, 1);
        assert_eq!(client.snapshot().total(), 1);
    }

    #[test]
    fn test_one_to_many_collect_under_cap_is_flat() {
        let transform = Transform::SamplePoints {
            prepare: Expr::Arg.select(["B4"]),
            points: vec![Geometry::point(-107.01, 39.01), Geometry::point(-106.94, 38.96)],
            scale: 30.0,
        };
        let client = CountingClient::new(InMemoryClient::new(Catalog::demo()));
        let variant = MappedVariant::new("points", Expr::dataset("LANDSAT/LT5_L1T").limit(5), transform);
        match variant.run(&client).unwrap() {
            VariantOutcome::Results(results) => assert_eq!(results.len(), 10),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(client.snapshot().maps, 1);
    }

    #[test]
    fn test_one_to_many_export_is_flattened() {
        let transform = Transform::SamplePoints {
            prepare: Expr::Arg.select(["B4"]),
            points: vec![Geometry::point(-107.01, 39.01), Geometry::point(-106.94, 38.96)],
            scale: 30.0,
        };
        let variant = MappedVariant::new("mapTest", Expr::dataset("LANDSAT/LT5_L1T").limit(5), transform)
            .with_sink(Sink::csv("mapTest"));
        assert!(matches!(variant.export_expr(), Expr::Flatten { .. }));

        let client = CountingClient::new(InMemoryClient::new(Catalog::demo()));
        let job = match variant.run(&client).unwrap() {
            VariantOutcome::Export(job) => job,
            other => panic!("unexpected: {:?}", other),
        };
        assert_eq!(client.snapshot().total(), 1);
        assert_eq!(client.inner().exported_table(&job).unwrap().len(), 10);
    }
}
