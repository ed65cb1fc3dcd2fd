use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Timing and outcome of one remote call.
///
/// `status_code` is `None` when no HTTP response was received; `status_text`
/// then carries the failure class and the transport message.
#[derive(Clone, Debug)]
pub struct ProbeResult {
    pub started_at: SystemTime,
    pub duration: Duration,
    pub status_code: Option<u16>,
    pub status_text: String,
}

impl ProbeResult {
    pub fn from_status(started_at: SystemTime, duration: Duration, code: u16, text: &str) -> Self {
        Self {
            started_at,
            duration,
            status_code: Some(code),
            status_text: text.to_string(),
        }
    }

    pub fn from_failure(started_at: SystemTime, duration: Duration, failure: &ProbeFailure) -> Self {
        Self {
            started_at,
            duration,
            status_code: None,
            status_text: format!("{}: {}", failure.kind.label(), failure.message),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status_code, Some(code) if (200..300).contains(&code))
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Payload of a probe (absent on any failure) and its timing record.
pub type Probed<T> = (Option<T>, ProbeResult);

/// Probe results of one flow run, in execution order.
#[derive(Clone, Debug, Default)]
pub struct FlowResult {
    steps: Vec<(String, ProbeResult)>,
}

impl FlowResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a step. A repeated step name replaces the earlier record in place.
    pub fn record(&mut self, step: &str, result: ProbeResult) {
        match self.steps.iter_mut().find(|(name, _)| name == step) {
            Some(existing) => existing.1 = result,
            None => self.steps.push((step.to_string(), result)),
        }
    }

    pub fn get(&self, step: &str) -> Option<&ProbeResult> {
        self.steps
            .iter()
            .find(|(name, _)| name == step)
            .map(|(_, result)| result)
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProbeResult)> {
        self.steps.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ProbeFailureKind {
    DnsFailed,
    ConnectFailed,
    TlsFailed,
    Timeout,
    ReadFailed,
    IoError,
}

impl ProbeFailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProbeFailureKind::DnsFailed => "dns_failed",
            ProbeFailureKind::ConnectFailed => "connect_failed",
            ProbeFailureKind::TlsFailed => "tls_failed",
            ProbeFailureKind::Timeout => "timeout",
            ProbeFailureKind::ReadFailed => "read_failed",
            ProbeFailureKind::IoError => "io_error",
        }
    }
}

/// Transport-level failure: no HTTP status was observed.
#[derive(Clone, Debug)]
pub struct ProbeFailure {
    pub kind: ProbeFailureKind,
    pub message: String,
}

const OBJECT_URI_SCHEME: &str = "drs://";

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ObjectUriError {
    #[error("'{0}' does not start with drs://")]
    MissingScheme(String),
    #[error("'{0}' has no object id after the last ':'")]
    MissingObjectId(String),
}

/// An addressable-object reference of the form `drs://<host-or-prefix>:<id>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectUri {
    uri: String,
    object_id_start: usize,
}

impl ObjectUri {
    pub fn parse(input: &str) -> Result<Self, ObjectUriError> {
        let uri = input.trim();
        let Some(rest) = uri.strip_prefix(OBJECT_URI_SCHEME) else {
            return Err(ObjectUriError::MissingScheme(uri.to_string()));
        };
        let offset = OBJECT_URI_SCHEME.len();
        let object_id_start = match rest.rfind(':') {
            Some(index) => offset + index + 1,
            None => offset,
        };
        if object_id_start >= uri.len() {
            return Err(ObjectUriError::MissingObjectId(uri.to_string()));
        }
        Ok(Self {
            uri: uri.to_string(),
            object_id_start,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn object_id(&self) -> &str {
        &self.uri[self.object_id_start..]
    }
}
