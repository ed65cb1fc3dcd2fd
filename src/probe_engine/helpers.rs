use crate::probe::{ProbeFailure, ProbeFailureKind};
use curl::Error as CurlError;

pub(super) fn map_curl_error(err: &CurlError) -> ProbeFailure {
    let message = err.to_string();

    let kind = if err.is_couldnt_resolve_host() || err.is_couldnt_resolve_proxy() {
        ProbeFailureKind::DnsFailed
    } else if err.is_operation_timedout() {
        ProbeFailureKind::Timeout
    } else if err.is_couldnt_connect() {
        ProbeFailureKind::ConnectFailed
    } else if err.is_ssl_connect_error()
        || err.is_ssl_cacert()
        || err.is_ssl_certproblem()
        || err.is_ssl_cipher()
        || err.is_peer_failed_verification()
    {
        ProbeFailureKind::TlsFailed
    } else if err.is_read_error() || err.is_recv_error() || err.is_got_nothing() {
        ProbeFailureKind::ReadFailed
    } else {
        ProbeFailureKind::IoError
    };

    ProbeFailure { kind, message }
}

/// Returns the reason phrase of an HTTP status line, `Some("")` for a status
/// line without one (HTTP/2), and `None` for any other header line.
pub(super) fn parse_status_line(line: &[u8]) -> Option<String> {
    let line = std::str::from_utf8(line).ok()?.trim_end();
    if !line.starts_with("HTTP/") {
        return None;
    }
    let mut parts = line.splitn(3, ' ');
    let _version = parts.next()?;
    let code = parts.next()?;
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(parts.next().unwrap_or("").trim().to_string())
}

pub(super) fn canonical_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
