// ============================================================================
// Upstream Client
// ============================================================================
//
// HTTP client for dispatching authorized requests to backend hosts.
// Handles:
// - Request dispatch with the assembled header set and buffered body
// - Response relay with a streamed body
// - Transport failure classification (timeout vs unreachable)
//
// No retries: a failed dispatch is reported to the caller as-is.
//
// ============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Response};

use crate::config::UpstreamConfig;
use crate::gateway::headers::build_downstream_headers;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("could not reach {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// HTTP client for forwarding requests to upstream hosts
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        // Redirects are the client's business, relay them untouched
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));

        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }

        let client = builder
            .build()
            .context("Failed to create upstream HTTP client")?;

        Ok(Self { client })
    }

    /// Send one request upstream and hand back its response for relay
    pub async fn dispatch(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response<Body>, UpstreamError> {
        let mut request = self.client.request(method, url).headers(headers);
        if !body.is_empty() {
            request = request.body(body);
        }

        let upstream = request.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout {
                    url: url.to_string(),
                }
            } else {
                UpstreamError::Unreachable {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        Ok(relay(upstream))
    }
}

/// Upstream status and end-to-end headers verbatim, body streamed through
fn relay(upstream: reqwest::Response) -> Response<Body> {
    let status = upstream.status();
    let headers = build_downstream_headers(upstream.headers());

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// `host + path`, with the inbound query string carried over
pub fn upstream_url(host: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{}{}?{}", host, path, query),
        _ => format!("{}{}", host, path),
    }
}
