//! Blocking `Transport` implementation on top of `ureq`.

use std::time::Duration;

use tracing::trace;
use ureq::{Agent, RequestBuilder};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody, Transport};

/// Executes requests with a shared `ureq::Agent`.
///
/// The agent pools connections and is safe to share between threads. ureq's
/// status-code-as-error behavior is disabled so 4xx/5xx responses come back
/// as data and `Client` interprets them.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
    timeout: Option<Duration>,
}

impl UreqTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent, timeout }
    }

    /// The tighter of the configured timeout and the context's remaining time.
    fn effective_timeout(&self, ctx: &Context) -> Option<Duration> {
        match (self.timeout, ctx.remaining()) {
            (Some(configured), Some(remaining)) => Some(configured.min(remaining)),
            (configured, remaining) => configured.or(remaining),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for UreqTransport {
    fn execute(&self, ctx: &Context, request: HttpRequest) -> Result<HttpResponse> {
        let timeout = self.effective_timeout(ctx);
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;
        trace!(%method, %url, ?timeout, "sending request");

        let result = match (method, body) {
            (HttpMethod::Get, _) => prepare(self.agent.get(&url), &headers, timeout).call(),
            (HttpMethod::Delete, _) => prepare(self.agent.delete(&url), &headers, timeout).call(),
            (HttpMethod::Post, body) => send(prepare(self.agent.post(&url), &headers, timeout), body),
            (HttpMethod::Put, body) => send(prepare(self.agent.put(&url), &headers, timeout), body),
            (HttpMethod::Patch, body) => {
                send(prepare(self.agent.patch(&url), &headers, timeout), body)
            }
        };
        let response = result.map_err(map_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = ResponseBody::new(response.into_body().into_reader());

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn prepare<B>(
    mut builder: RequestBuilder<B>,
    headers: &[(String, String)],
    timeout: Option<Duration>,
) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.config().timeout_global(timeout).build()
}

fn send(
    builder: RequestBuilder<ureq::typestate::WithBody>,
    body: Option<Vec<u8>>,
) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(&body[..]),
        None => builder.send_empty(),
    }
}

fn map_error(err: ureq::Error) -> Error {
    match err {
        ureq::Error::Timeout(_) => Error::Timeout,
        other => Error::Transport(other.to_string()),
    }
}
