//! HTTP batch delivery over reqwest.
//!
//! The client reports a classified [`UploadStatus`] instead of an error:
//! retry policy lives in the upload worker, which only needs to know
//! whether a batch may be attempted again.

use std::time::Duration;

use async_trait::async_trait;
use beacon_core::UploadClient;
use beacon_domain::{BeaconError, UploadStatus};
use reqwest::{Client as ReqwestClient, StatusCode};
use tracing::debug;

/// Uploads newline-delimited record batches to a fixed intake endpoint.
#[derive(Clone)]
pub struct HttpUploadClient {
    client: ReqwestClient,
    endpoint: String,
}

impl HttpUploadClient {
    /// Start building a new upload client.
    pub fn builder(endpoint: impl Into<String>) -> HttpUploadClientBuilder {
        HttpUploadClientBuilder::new(endpoint)
    }

    /// Convenience constructor with default configuration.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, BeaconError> {
        Self::builder(endpoint).build()
    }

    fn classify(status: StatusCode) -> UploadStatus {
        if status.is_success() {
            return UploadStatus::Success;
        }
        if status.is_redirection() {
            return UploadStatus::HttpRedirect;
        }
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UploadStatus::InvalidToken,
            StatusCode::TOO_MANY_REQUESTS => UploadStatus::RateLimited,
            s if s.is_client_error() => UploadStatus::HttpClientError,
            s if s.is_server_error() => UploadStatus::HttpServerError,
            _ => UploadStatus::UnknownError,
        }
    }
}

#[async_trait]
impl UploadClient for HttpUploadClient {
    async fn upload(&self, data: &[u8]) -> UploadStatus {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(data.to_vec())
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                debug!(endpoint = %self.endpoint, %status, bytes = data.len(), "batch uploaded");
                Self::classify(status)
            }
            Err(err) => {
                debug!(endpoint = %self.endpoint, error = %err, "batch upload transport failure");
                UploadStatus::NetworkError
            }
        }
    }
}

/// Builder for [`HttpUploadClient`].
#[derive(Debug)]
pub struct HttpUploadClientBuilder {
    endpoint: String,
    timeout: Duration,
    user_agent: Option<String>,
}

impl HttpUploadClientBuilder {
    fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), timeout: Duration::from_secs(30), user_agent: None }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpUploadClient, BeaconError> {
        // Redirects are classified and reported, never followed
        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| BeaconError::Network(err.to_string()))?;

        Ok(HttpUploadClient { client, endpoint: self.endpoint })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn client_for(server: &MockServer) -> HttpUploadClient {
        HttpUploadClient::builder(format!("{}/intake", server.uri()))
            .timeout(Duration::from_secs(5))
            .build()
            .expect("upload client")
    }

    #[tokio::test]
    async fn posts_batch_bytes_and_reports_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/intake"))
            .and(header("content-type", "application/json"))
            .and(body_bytes(b"{\"a\":1}\n{\"b\":2}".to_vec()))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let status = client.upload(b"{\"a\":1}\n{\"b\":2}").await;

        assert_eq!(status, UploadStatus::Success);
    }

    #[tokio::test]
    async fn classifies_http_status_families() {
        let cases = [
            (301, UploadStatus::HttpRedirect),
            (400, UploadStatus::HttpClientError),
            (401, UploadStatus::InvalidToken),
            (403, UploadStatus::InvalidToken),
            (429, UploadStatus::RateLimited),
            (500, UploadStatus::HttpServerError),
            (503, UploadStatus::HttpServerError),
        ];

        for (code, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(code))
                .mount(&server)
                .await;

            let client = client_for(&server).await;
            let status = client.upload(b"payload").await;

            assert_eq!(status, expected, "status code {code}");
        }
    }

    #[tokio::test]
    async fn connection_failure_reports_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let client = HttpUploadClient::builder(format!("http://{addr}/intake"))
            .timeout(Duration::from_secs(2))
            .build()
            .expect("upload client");

        let status = client.upload(b"payload").await;
        assert_eq!(status, UploadStatus::NetworkError);
    }
}
