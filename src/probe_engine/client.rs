use super::helpers::{canonical_reason, map_curl_error, parse_status_line};
use crate::config::SecretString;
use crate::probe::{ProbeFailure, ProbeFailureKind, ProbeResult};
use curl::Error as CurlError;
use curl::easy::{Easy2, Handler, List, WriteError};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;
use url::Url;

const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;
const MAX_REDIRECTS: u32 = 30;
const USER_AGENT: &str = concat!("drspulse/", env!("CARGO_PKG_VERSION"));

#[derive(Default)]
struct ResponseCollector {
    body: Vec<u8>,
    limit: usize,
    truncated: bool,
    reason: Option<String>,
}

impl ResponseCollector {
    fn reset(&mut self, limit: usize) {
        self.body.clear();
        self.limit = limit;
        self.truncated = false;
        self.reason = None;
    }
}

impl Handler for ResponseCollector {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        let remaining = self.limit.saturating_sub(self.body.len());
        let take = data.len().min(remaining);
        self.body.extend_from_slice(&data[..take]);
        if take < data.len() {
            self.truncated = true;
        }
        Ok(data.len())
    }

    fn header(&mut self, data: &[u8]) -> bool {
        // A new status line starts each response in a redirect chain.
        if let Some(reason) = parse_status_line(data) {
            self.reason = Some(reason);
        }
        true
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
    Options,
}

impl Method {
    pub fn label(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Options => "OPTIONS",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProbeRequest {
    pub method: Method,
    pub url: Url,
    pub bearer: Option<SecretString>,
    pub content_type: &'static str,
    pub accept: Option<&'static str>,
    pub body: Option<Vec<u8>>,
}

impl ProbeRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            bearer: None,
            content_type: "application/json",
            accept: None,
            body: None,
        }
    }

    pub fn bearer(mut self, token: Option<&SecretString>) -> Self {
        self.bearer = token.cloned();
        self
    }

    pub fn content_type(mut self, value: &'static str) -> Self {
        self.content_type = value;
        self
    }

    pub fn accept(mut self, value: &'static str) -> Self {
        self.accept = Some(value);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: Vec<u8>,
    pub truncated: bool,
    pub effective_url: Option<String>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// One request/response exchange. `response` is `None` when the transport
/// failed before a status was received.
#[derive(Debug)]
pub struct Exchange {
    pub response: Option<HttpResponse>,
    pub result: ProbeResult,
}

#[derive(Clone, Debug, Default)]
pub struct ClientOptions {
    /// Total time allowed per request. `None` keeps the transport default.
    pub timeout: Option<Duration>,
}

pub struct HttpClient {
    easy: Easy2<ResponseCollector>,
    options: ClientOptions,
}

impl HttpClient {
    pub fn new(options: ClientOptions) -> Result<Self, CurlError> {
        let mut easy = Easy2::new(ResponseCollector::default());
        easy.useragent(USER_AGENT)?;
        Ok(Self { easy, options })
    }

    pub fn send(&mut self, request: &ProbeRequest) -> Exchange {
        if let Err(err) = self.prepare(request) {
            let failure = ProbeFailure {
                kind: ProbeFailureKind::IoError,
                message: format!("request setup failed: {err}"),
            };
            return Exchange {
                response: None,
                result: ProbeResult::from_failure(SystemTime::now(), Duration::ZERO, &failure),
            };
        }

        debug!(method = request.method.label(), url = %request.url, "sending probe request");

        let started_at = SystemTime::now();
        let start = Instant::now();
        let performed = self.easy.perform();
        let duration = start.elapsed();

        if let Err(err) = performed {
            let failure = map_curl_error(&err);
            return Exchange {
                response: None,
                result: ProbeResult::from_failure(started_at, duration, &failure),
            };
        }

        let status = self.easy.response_code().unwrap_or(0) as u16;
        let effective_url = self.easy.effective_url().ok().flatten().map(str::to_string);
        let collector = self.easy.get_mut();
        let reason = match collector.reason.take() {
            Some(reason) if !reason.is_empty() => reason,
            _ => canonical_reason(status).to_string(),
        };
        let response = HttpResponse {
            status,
            reason,
            body: std::mem::take(&mut collector.body),
            truncated: collector.truncated,
            effective_url,
        };
        let result = ProbeResult::from_status(started_at, duration, status, &response.reason);

        Exchange {
            response: Some(response),
            result,
        }
    }

    fn prepare(&mut self, request: &ProbeRequest) -> Result<(), CurlError> {
        self.easy.reset();
        self.easy.get_mut().reset(MAX_BODY_BYTES);
        self.easy.useragent(USER_AGENT)?;
        self.easy.url(request.url.as_str())?;
        self.easy.follow_location(true)?;
        self.easy.max_redirections(MAX_REDIRECTS)?;
        self.easy.accept_encoding("")?;
        if let Some(timeout) = self.options.timeout {
            self.easy.timeout(timeout)?;
        }

        match request.method {
            Method::Get => self.easy.get(true)?,
            Method::Post => {
                self.easy.post(true)?;
                let body = request.body.as_deref().unwrap_or_default();
                self.easy.post_fields_copy(body)?;
            }
            Method::Options => self.easy.custom_request("OPTIONS")?,
        }

        let mut headers = List::new();
        headers.append(&format!("content-type: {}", request.content_type))?;
        if let Some(accept) = request.accept {
            headers.append(&format!("accept: {accept}"))?;
        }
        if let Some(token) = &request.bearer {
            headers.append(&format!("authorization: Bearer {}", token.expose()))?;
        }
        // Suppress curl's default `Expect: 100-continue` on POST bodies.
        headers.append("expect:")?;
        self.easy.http_headers(headers)?;
        Ok(())
    }
}
