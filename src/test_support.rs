//! Local stand-in for the remote services, used by unit tests.

use crate::config::{ConfigSnapshot, DeploymentTier, Project, UrlScheme};
use crate::probe::ObjectUri;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub(crate) const TEST_OBJECT_URI: &str = "drs://dg.TEST:obj-123";

#[derive(Clone, Debug)]
pub(crate) struct StubResponse {
    pub status: u16,
    pub reason: &'static str,
    pub body: String,
    pub delay: Option<Duration>,
}

impl StubResponse {
    pub fn json(status: u16, reason: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            reason,
            body: body.into(),
            delay: None,
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::json(200, "OK", body)
    }

    pub fn error(status: u16, reason: &'static str) -> Self {
        Self::json(status, reason, r#"{"error":"stub"}"#)
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Clone, Debug)]
pub(crate) struct StubRoute {
    pub method: &'static str,
    pub path: String,
    pub response: StubResponse,
}

pub(crate) fn route(method: &'static str, path: impl Into<String>, response: StubResponse) -> StubRoute {
    StubRoute {
        method,
        path: path.into(),
        response,
    }
}

#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Minimal HTTP/1.1 server answering one request per connection.
/// Unrouted requests get a 404.
pub(crate) struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown: Arc<AtomicBool>,
}

impl StubServer {
    pub fn start(routes: Vec<StubRoute>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let addr = listener.local_addr().expect("stub addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let recorded = Arc::clone(&requests);
        let stop = Arc::clone(&shutdown);
        thread::spawn(move || {
            for stream in listener.incoming() {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                let routes = routes.clone();
                let recorded = Arc::clone(&recorded);
                thread::spawn(move || handle_connection(stream, &routes, &recorded));
            }
        });

        Self {
            addr,
            requests,
            shutdown,
        }
    }

    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path() == path)
            .collect()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(self.addr);
    }
}

fn handle_connection(
    stream: TcpStream,
    routes: &[StubRoute],
    recorded: &Mutex<Vec<RecordedRequest>>,
) {
    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("").to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; content_length];
    if content_length > 0 && reader.read_exact(&mut body).is_err() {
        return;
    }

    let request = RecordedRequest {
        method,
        target,
        headers,
        body,
    };
    let response = routes
        .iter()
        .find(|route| route.method == request.method && route.path == request.path())
        .map(|route| route.response.clone())
        .unwrap_or_else(|| StubResponse::error(404, "Not Found"));
    recorded.lock().expect("requests lock").push(request);

    if let Some(delay) = response.delay {
        thread::sleep(delay);
    }

    let mut stream = stream;
    let payload = format!(
        "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        response.status,
        response.reason,
        response.body.len(),
        response.body
    );
    let _ = stream.write_all(payload.as_bytes());
    let _ = stream.flush();
}

/// A snapshot with every service pointed at `host` over plain HTTP.
pub(crate) fn snapshot_for(host: &str) -> ConfigSnapshot {
    ConfigSnapshot {
        project: Project::Bdc,
        tier: DeploymentTier::Dev,
        identity_broker_host: host.to_string(),
        identity_provider_key: "fence".to_string(),
        resolver_host: host.to_string(),
        object_service_host: host.to_string(),
        default_object_uri: ObjectUri::parse(TEST_OBJECT_URI).expect("test uri"),
        default_cloud_scheme: "gs".to_string(),
        url_scheme: UrlScheme::Http,
    }
}

/// An address nothing listens on.
pub(crate) fn closed_host() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    addr.to_string()
}

/// Reads a metrics CSV back into header-keyed rows.
pub(crate) fn read_rows(path: &Path) -> io::Result<Vec<BTreeMap<String, String>>> {
    let content = fs::read_to_string(path)?;
    let mut records = parse_records(&content).into_iter();
    let Some(header) = records.next() else {
        return Ok(Vec::new());
    };
    Ok(records
        .map(|fields| header.iter().cloned().zip(fields).collect())
        .collect())
}

fn parse_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        match (ch, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => record.push(std::mem::take(&mut field)),
            ('\r', false) => {}
            ('\n', false) => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            (other, _) => field.push(other),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}
