//! Client-side loop runner.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::{into_records, Element, ElementSource, Sink, Strategy, Transform, Variant, VariantOutcome};
use crate::client::{sequence_values, ClientError, ComputeClient};
use crate::expr::Expr;
use crate::job::ExportRequest;
use crate::record::ResultSet;

/// Builds the requests for one element, in the order they should be issued.
pub type ElementBuilder = Arc<dyn Fn(&Element) -> Vec<Expr> + Send + Sync>;

/// Issues one blocking request per element and output.
///
/// With a remote source the loop starts with one `length` query. For each
/// index it then references the element, builds that element's requests and
/// evaluates them in order, so a source of `n` elements with `m` requests
/// each costs `1 + n·m` round trips.
///
/// No check is made against the provider's element cap: very large
/// collections are looped over one request at a time.
///
/// With an export sink no evaluation is issued. The per-element expressions
/// are merged into a single graph on the client and that graph is exported.
#[derive(Clone)]
pub struct IterativeVariant {
    name: String,
    source: ElementSource,
    builder: ElementBuilder,
    sink: Sink,
}

impl IterativeVariant {
    /// Creates a runner with a custom per-element builder.
    pub fn new(
        name: impl Into<String>,
        source: ElementSource,
        builder: impl Fn(&Element) -> Vec<Expr> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            builder: Arc::new(builder),
            sink: Sink::Collect,
        }
    }

    /// Creates a runner that binds each element into `transform`.
    pub fn from_transform(name: impl Into<String>, source: ElementSource, transform: Transform) -> Self {
        Self::new(name, source, move |element: &Element| {
            transform.per_element(&element.to_expr())
        })
    }

    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = sink;
        self
    }

    pub fn source(&self) -> &ElementSource {
        &self.source
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    fn elements(&self, client: &dyn ComputeClient) -> Result<Vec<Element>, ClientError> {
        match &self.source {
            ElementSource::Range { start, end, step } => Ok(sequence_values(*start, *end, *step)?
                .into_iter()
                .map(Element::Number)
                .collect()),
            ElementSource::Remote(collection) => {
                let length = client.length(collection)?;
                debug!(variant = %self.name, length, "Remote collection length");
                Ok((0..length)
                    .map(|i| Element::Remote(collection.clone().get(i)))
                    .collect())
            }
        }
    }
}

impl fmt::Debug for IterativeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterativeVariant")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

impl Variant for IterativeVariant {
    fn name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> Strategy {
        Strategy::Iterative
    }

    fn run(&self, client: &dyn ComputeClient) -> Result<VariantOutcome, ClientError> {
        let elements = self.elements(client)?;

        if let Sink::Export {
            description,
            format,
        } = &self.sink
        {
            let items: Vec<Expr> = elements.iter().flat_map(|e| (self.builder)(e)).collect();
            debug!(variant = %self.name, items = items.len(), "Exporting merged graph");
            let request = ExportRequest::new(Expr::merge(items), description.clone()).with_format(*format);
            return client.start_export(&request).map(VariantOutcome::Export);
        }

        let mut results = ResultSet::default();
        for (index, element) in elements.iter().enumerate() {
            for expr in (self.builder)(element) {
                let value = client.evaluate(&expr)?;
                results.extend(into_records(value)?);
            }
            trace!(variant = %self.name, index, records = results.len(), "Element done");
        }
        Ok(VariantOutcome::Results(results))
    }
}
