//! HTTP client abstraction for testability

use std::time::Duration;

use super::error::ClientError;

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `bearer` - Optional bearer token for the `Authorization` header
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<Vec<u8>, ClientError>;

    /// Performs an HTTP POST request with a JSON body.
    fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<Vec<u8>, ClientError>;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, ClientError> {
        Self::with_timeout(30)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, ClientError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<Vec<u8>, ClientError> {
        let request = match bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| ClientError::Network(format!("Failed to read response: {}", e)))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(status_error(status.as_u16(), url, &body))
        }
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<Vec<u8>, ClientError> {
        self.send(self.client.get(url), url, bearer)
    }

    fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<Vec<u8>, ClientError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| ClientError::malformed(format!("Failed to encode request: {}", e)))?;
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        self.send(request, url, bearer)
    }
}

/// Maps a non-success status to the matching [`ClientError`].
pub(crate) fn status_error(status: u16, url: &str, body: &[u8]) -> ClientError {
    let message = error_message(body).unwrap_or_else(|| format!("request to {} failed", url));
    match status {
        401 | 403 => ClientError::Authentication(message),
        400 => ClientError::MalformedQuery(message),
        _ => ClientError::Http { status, message },
    }
}

/// Extracts `error.message` from a JSON error body, falling back to the raw text.
fn error_message(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .or_else(|| Some(String::from_utf8_lossy(body).trim().to_string()))
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Mock HTTP client for testing.
    ///
    /// Replies with queued responses in order and records every request as
    /// `"METHOD url body"`.
    #[derive(Default)]
    pub struct MockHttpClient {
        pub responses: Mutex<VecDeque<Result<Vec<u8>, ClientError>>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub fn with_responses(responses: Vec<Result<Vec<u8>, ClientError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn json(value: serde_json::Value) -> Result<Vec<u8>, ClientError> {
            Ok(serde_json::to_vec(&value).unwrap())
        }

        fn next(&self) -> Result<Vec<u8>, ClientError> {
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Network("no response queued".to_string())))
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(&self, url: &str, _bearer: Option<&str>) -> Result<Vec<u8>, ClientError> {
            self.requests.lock().push(format!("GET {}", url));
            self.next()
        }

        fn post_json(
            &self,
            url: &str,
            _bearer: Option<&str>,
            body: &serde_json::Value,
        ) -> Result<Vec<u8>, ClientError> {
            self.requests.lock().push(format!("POST {} {}", url, body));
            self.next()
        }
    }

    #[test]
    fn test_mock_client_replays_in_order() {
        let mock = MockHttpClient::with_responses(vec![Ok(vec![1]), Ok(vec![2])]);
        assert_eq!(mock.get("http://a", None).unwrap(), vec![1]);
        assert_eq!(
            mock.post_json("http://b", None, &serde_json::json!({})).unwrap(),
            vec![2]
        );
        assert!(mock.get("http://c", None).is_err());
        assert_eq!(mock.requests.lock().len(), 3);
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(401, "u", b""),
            ClientError::Authentication(_)
        ));
        assert!(matches!(
            status_error(403, "u", b""),
            ClientError::Authentication(_)
        ));
        assert!(matches!(
            status_error(500, "u", b""),
            ClientError::Http { status: 500, .. }
        ));
    }

    #[test]
    fn test_status_error_extracts_json_message() {
        let body = br#"{"error":{"message":"Band 'B9' not found"}}"#;
        match status_error(400, "u", body) {
            ClientError::MalformedQuery(msg) => assert_eq!(msg, "Band 'B9' not found"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_status_error_falls_back_to_text() {
        match status_error(502, "u", b"  bad gateway \n") {
            ClientError::Http { message, .. } => assert_eq!(message, "bad gateway"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
