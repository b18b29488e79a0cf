//! JSON-over-HTTP compute client.
//!
//! Posts serialized [`Expr`] trees to a compute endpoint and polls export
//! operations.
//!
//! # Endpoints
//!
//! - `POST {endpoint}/v1/projects/{project}/value:compute` with
//!   `{"expression": ...}` → `{"result": <Value>}`
//! - `POST {endpoint}/v1/projects/{project}/table:export` with
//!   `{"expression": ..., "description": ..., "fileFormat": ...}` → `{"name": ...}`
//! - `GET {endpoint}/v1/{name}` → `{"metadata": {"state": ...}, "error": {"message": ...}}`

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::error::ClientError;
use super::http::HttpClient;
use super::{ComputeClient, MAX_LITERAL_ELEMENTS};
use crate::expr::{Expr, Value};
use crate::job::{ExportRequest, JobHandle, JobState, JobStatus};

/// Connection settings for [`RestClient`].
#[derive(Clone, Debug, PartialEq)]
pub struct RestConfig {
    /// Base URL, without a trailing slash.
    pub endpoint: String,

    /// Project the requests are billed to.
    pub project: String,

    /// Bearer token sent with every request.
    pub token: Option<String>,

    /// Element cap reported when the service rejects an oversize result.
    pub max_elements: usize,
}

impl RestConfig {
    pub fn new(endpoint: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            project: project.into(),
            token: None,
            max_elements: MAX_LITERAL_ELEMENTS,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_max_elements(mut self, max_elements: usize) -> Self {
        self.max_elements = max_elements;
        self
    }
}

#[derive(Deserialize)]
struct ComputeResponse {
    result: Value,
}

#[derive(Deserialize)]
struct ExportResponse {
    name: String,
}

#[derive(Deserialize)]
struct OperationResponse {
    metadata: OperationMetadata,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Deserialize)]
struct OperationMetadata {
    state: String,
}

#[derive(Deserialize)]
struct OperationError {
    message: String,
}

/// Compute client speaking JSON to a remote endpoint.
///
/// # Example
///
/// ```no_run
/// use mapbench::client::{ComputeClient, ReqwestClient, RestClient, RestConfig};
/// use mapbench::expr::Expr;
///
/// let http = ReqwestClient::new().unwrap();
/// let config = RestConfig::new("https://compute.example.com", "my-project").with_token("t0k3n");
/// let client = RestClient::new(http, config);
/// let n = client.length(&Expr::dataset("NASA/ORNL/DAYMET")).unwrap();
/// ```
pub struct RestClient<C: HttpClient> {
    http_client: C,
    config: RestConfig,
}

impl<C: HttpClient> RestClient<C> {
    pub fn new(http_client: C, config: RestConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn project_url(&self, method: &str) -> String {
        format!(
            "{}/v1/projects/{}/{}",
            self.config.endpoint, self.config.project, method
        )
    }

    fn operation_url(&self, name: &str) -> String {
        format!("{}/v1/{}", self.config.endpoint, name)
    }

    fn post(&self, url: &str, body: serde_json::Value) -> Result<Vec<u8>, ClientError> {
        self.http_client
            .post_json(url, self.config.token.as_deref(), &body)
            .map_err(|e| self.map_size_error(e))
    }

    fn map_size_error(&self, error: ClientError) -> ClientError {
        match error {
            ClientError::Http { status: 413, .. } => ClientError::ResultTooLarge {
                limit: self.config.max_elements,
            },
            other => other,
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, ClientError> {
    serde_json::from_slice(bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

impl<C: HttpClient> ComputeClient for RestClient<C> {
    fn name(&self) -> &str {
        "REST"
    }

    fn evaluate(&self, expr: &Expr) -> Result<Value, ClientError> {
        let url = self.project_url("value:compute");
        let expression = serde_json::to_value(expr)
            .map_err(|e| ClientError::malformed(format!("Failed to encode expression: {}", e)))?;
        let bytes = self.post(&url, json!({ "expression": expression }))?;
        let response: ComputeResponse = decode(&bytes)?;

        // The cap is enforced here as well; an oversize literal is never truncated.
        if response.result.element_count() > self.config.max_elements {
            return Err(ClientError::ResultTooLarge {
                limit: self.config.max_elements,
            });
        }
        Ok(response.result)
    }

    fn start_export(&self, request: &ExportRequest) -> Result<JobHandle, ClientError> {
        let url = self.project_url("table:export");
        let expression = serde_json::to_value(&request.collection)
            .map_err(|e| ClientError::malformed(format!("Failed to encode expression: {}", e)))?;
        let bytes = self.post(
            &url,
            json!({
                "expression": expression,
                "description": request.description,
                "fileFormat": request.format.as_str(),
            }),
        )?;
        let response: ExportResponse = decode(&bytes)?;
        debug!(job = %response.name, description = %request.description, "Export submitted");
        Ok(JobHandle::new(response.name))
    }

    fn job_status(&self, job: &JobHandle) -> Result<JobStatus, ClientError> {
        let url = self.operation_url(job.id());
        let bytes = self
            .http_client
            .get(&url, self.config.token.as_deref())
            .map_err(|e| match e {
                ClientError::Http { status: 404, .. } => ClientError::UnknownJob(job.id().to_string()),
                other => other,
            })?;
        let response: OperationResponse = decode(&bytes)?;
        let state: JobState = response
            .metadata
            .state
            .parse()
            .map_err(ClientError::Decode)?;

        Ok(JobStatus {
            state,
            error: response.error.map(|e| e.message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockHttpClient;
    use crate::job::ExportFormat;

    fn client(responses: Vec<Result<Vec<u8>, ClientError>>) -> RestClient<MockHttpClient> {
        RestClient::new(
            MockHttpClient::with_responses(responses),
            RestConfig::new("https://compute.example.com/", "proj").with_token("tok"),
        )
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = RestConfig::new("https://a.example.com//", "p");
        assert_eq!(config.endpoint, "https://a.example.com");
        assert_eq!(config.max_elements, MAX_LITERAL_ELEMENTS);
    }

    #[test]
    fn test_evaluate_posts_expression() {
        let client = client(vec![MockHttpClient::json(
            json!({"result": {"type": "number", "value": 28.0}}),
        )]);

        let n = client.length(&Expr::sequence(0.0, 27.0, 1.0)).unwrap();
        assert_eq!(n, 28);

        let requests = client.http_client.requests.lock();
        assert_eq!(requests.len(), 1);
        assert!(requests[0]
            .starts_with("POST https://compute.example.com/v1/projects/proj/value:compute"));
        assert!(requests[0].contains(r#""op":"length""#));
    }

    #[test]
    fn test_evaluate_rejects_oversize_result() {
        let client = RestClient::new(
            MockHttpClient::with_responses(vec![MockHttpClient::json(json!({
                "result": {"type": "list", "value": [{"type": "null"}, {"type": "null"}, {"type": "null"}]}
            }))]),
            RestConfig::new("https://c.example.com", "p").with_max_elements(2),
        );

        let err = client.evaluate(&Expr::dataset("A")).unwrap_err();
        assert_eq!(err, ClientError::ResultTooLarge { limit: 2 });
    }

    #[test]
    fn test_payload_too_large_maps_to_size_error() {
        let client = client(vec![Err(ClientError::Http {
            status: 413,
            message: "too many elements".to_string(),
        })]);
        let err = client.evaluate(&Expr::dataset("A")).unwrap_err();
        assert_eq!(err, ClientError::ResultTooLarge { limit: 5000 });
    }

    #[test]
    fn test_authentication_error_propagates() {
        let client = client(vec![Err(ClientError::Authentication("expired".to_string()))]);
        let err = client.evaluate(&Expr::dataset("A")).unwrap_err();
        assert!(matches!(err, ClientError::Authentication(_)));
    }

    #[test]
    fn test_start_export_and_poll() {
        let client = client(vec![
            MockHttpClient::json(json!({"name": "projects/proj/operations/ABC"})),
            MockHttpClient::json(json!({"metadata": {"state": "RUNNING"}})),
            MockHttpClient::json(json!({
                "metadata": {"state": "FAILED"},
                "error": {"message": "quota exceeded"}
            })),
        ]);

        let request =
            ExportRequest::new(Expr::dataset("A"), "mapTest").with_format(ExportFormat::Csv);
        let job = client.start_export(&request).unwrap();
        assert_eq!(job.id(), "projects/proj/operations/ABC");

        assert_eq!(client.job_status(&job).unwrap().state, JobState::Active);
        let status = client.job_status(&job).unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("quota exceeded"));

        let requests = client.http_client.requests.lock();
        assert!(requests[0].contains(r#""fileFormat":"CSV""#));
        assert!(requests[0].contains(r#""description":"mapTest""#));
        assert_eq!(
            requests[1],
            "GET https://compute.example.com/v1/projects/proj/operations/ABC"
        );
    }

    #[test]
    fn test_unknown_job() {
        let client = client(vec![Err(ClientError::Http {
            status: 404,
            message: "not found".to_string(),
        })]);
        let err = client.job_status(&JobHandle::new("operations/nope")).unwrap_err();
        assert_eq!(err, ClientError::UnknownJob("operations/nope".to_string()));
    }

    #[test]
    fn test_undecodable_state() {
        let client = client(vec![MockHttpClient::json(
            json!({"metadata": {"state": "EXPLODED"}}),
        )]);
        let err = client.job_status(&JobHandle::new("op")).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
