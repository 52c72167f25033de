//! Decoding of raw HTTP response text

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^HTTP/(\d+)(?:\.(\d+))?\s+(\d{3})(?:\s+(.*))?$")
        .unwrap_or_else(|e| panic!("status line pattern must compile: {e}"))
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("No HTTP status line found")]
    MissingStatusLine,

    #[error("Malformed status line: {line}")]
    MalformedStatusLine { line: String },

    #[error("Malformed header line: {line}")]
    MalformedHeader { line: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

/// A decoded response: status, headers in order of appearance, body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub version: HttpVersion,
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    /// First value of header `name`, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length")?.trim().parse().ok()
    }
}

/// Parse a response dump, skipping any request printed in front of it
///
/// A status line without a minor version (`HTTP/2 200 OK`) reads as minor
/// version 0. The body runs to the end of the text unless a smaller
/// Content-Length says otherwise.
pub fn parse_response(raw: &str) -> Result<RawResponse, DecodeError> {
    let start = find_status_line(raw).ok_or(DecodeError::MissingStatusLine)?;
    let mut rest = &raw[start..];

    let status_line = take_line(&mut rest);
    let (version, status, reason) = parse_status_line(status_line)?;

    let mut headers: Vec<(String, String)> = Vec::new();
    while !rest.is_empty() {
        let line = take_line(&mut rest);
        if line.is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            // obsolete line folding continues the previous value
            match headers.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                None => {
                    return Err(DecodeError::MalformedHeader {
                        line: line.to_string(),
                    })
                }
            }
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| DecodeError::MalformedHeader {
                line: line.to_string(),
            })?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let mut response = RawResponse {
        version,
        status,
        reason,
        headers,
        body: rest.to_string(),
    };
    if let Some(length) = response.content_length() {
        if length < response.body.len() && response.body.is_char_boundary(length) {
            response.body.truncate(length);
        }
    }
    Ok(response)
}

/// Byte offset of the first line that begins with `HTTP/`
fn find_status_line(raw: &str) -> Option<usize> {
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        if line.trim_start().starts_with("HTTP/") {
            return Some(offset + (line.len() - line.trim_start().len()));
        }
        offset += line.len();
    }
    None
}

/// Pop one line off the front of `rest`, without its terminator
fn take_line<'a>(rest: &mut &'a str) -> &'a str {
    let (line, remainder) = match rest.find('\n') {
        Some(end) => (&rest[..end], &rest[end + 1..]),
        None => (*rest, ""),
    };
    *rest = remainder;
    line.strip_suffix('\r').unwrap_or(line)
}

fn parse_status_line(line: &str) -> Result<(HttpVersion, u16, String), DecodeError> {
    let malformed = || DecodeError::MalformedStatusLine {
        line: line.to_string(),
    };
    let captures = STATUS_LINE.captures(line.trim_end()).ok_or_else(malformed)?;

    let major = captures[1].parse::<u8>().map_err(|_| malformed())?;
    let minor = match captures.get(2) {
        Some(m) => m.as_str().parse::<u8>().map_err(|_| malformed())?,
        None => 0,
    };
    let status = captures[3].parse::<u16>().map_err(|_| malformed())?;
    let reason = captures
        .get(4)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    Ok((HttpVersion { major, minor }, status, reason))
}
