//! Upstream forwarder for optimization requests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use routebox_core::{Forward, ForwardOutcome};
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use crate::transport::transport_code;

/// Default bound on a forwarded request, response body included.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(60);

/// Forwards optimization requests to the upstream with reqwest.
///
/// The upstream status is data, not a failure: any received response becomes
/// `Success` (200) or `UpstreamError` (anything else) with the body untouched.
///
/// ```no_run
/// use std::time::Duration;
/// use routebox_reqwest::ReqwestForwarder;
///
/// let forwarder = ReqwestForwarder::new("http://vroom:3000/")
///     .timeout(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestForwarder {
    client: Client,
    url: String,
    timeout: Duration,
}

impl ReqwestForwarder {
    /// Creates a forwarder with a default client.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    /// Creates a forwarder sharing an existing client and its connection pool.
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            timeout: DEFAULT_FORWARD_TIMEOUT,
        }
    }

    /// Sets the bound on a single forwarded request.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn classify(&self, failure: reqwest::Error) -> ForwardOutcome {
        match transport_code(&failure) {
            Some(code) => {
                warn!(%code, error = %failure, "upstream unreachable");
                ForwardOutcome::TransportFailure(code)
            }
            None => {
                error!(error = %failure, "unexpected failure forwarding request");
                ForwardOutcome::UnexpectedFailure(failure.to_string())
            }
        }
    }
}

#[async_trait]
impl Forward for ReqwestForwarder {
    #[instrument(skip_all, fields(upstream = %self.url))]
    async fn forward(&self, body: &Value) -> ForwardOutcome {
        let response = match self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(failure) => return self.classify(failure),
        };

        let status = response.status();
        match response.bytes().await {
            Ok(body) => {
                debug!(status = status.as_u16(), bytes = body.len(), "upstream responded");
                ForwardOutcome::from_response(status, body)
            }
            Err(failure) => self.classify(failure),
        }
    }

    fn target(&self) -> &str {
        &self.url
    }
}
