use crate::http::error::ProtocolError;
use crate::http::headers::HttpHeaders;
use crate::http::response::ResponseHead;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Result of scanning an accumulated byte window for a response header.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseOutcome<'a> {
    /// Header terminator not seen yet.
    Incomplete,
    /// Header block parsed; `leftover` is the start of the body.
    Parsed {
        head: ResponseHead,
        leftover: &'a [u8],
    },
    /// Not an HTTP response.
    Malformed(ProtocolError),
}

/// Parses a response status line and header block out of `window`.
///
/// The function keeps no state between calls: feeding it a longer window
/// after `Incomplete` gives the same answer as feeding the whole window
/// at once.
pub fn parse_response(window: &[u8]) -> ParseOutcome<'_> {
    let Some(headers_end) = find_headers_end(window) else {
        return ParseOutcome::Incomplete;
    };
    let leftover = &window[headers_end + HEADER_TERMINATOR.len()..];

    match parse_head(&window[..headers_end]) {
        Ok(head) => ParseOutcome::Parsed { head, leftover },
        Err(e) => ParseOutcome::Malformed(e),
    }
}

fn parse_head(header_bytes: &[u8]) -> Result<ResponseHead, ProtocolError> {
    let headers_str =
        std::str::from_utf8(header_bytes).map_err(|_| ProtocolError::InvalidEncoding)?;

    let mut lines = headers_str.split("\r\n");

    // Status line
    let status_line = lines.next().unwrap_or_default();
    let (version, status, reason) = parse_status_line(status_line)?;

    // Headers
    let mut headers = HttpHeaders::new();
    for line in lines {
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| ProtocolError::MalformedHeader(line.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ProtocolError::MalformedHeader(line.to_string()));
        }
        headers.add(key, value.trim());
    }

    Ok(ResponseHead {
        status,
        reason: reason.to_string(),
        version: version.to_string(),
        headers,
    })
}

fn parse_status_line(line: &str) -> Result<(&str, u16, &str), ProtocolError> {
    let malformed = || ProtocolError::MalformedStatusLine(line.to_string());

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or_else(malformed)?;
    let code = parts.next().ok_or_else(malformed)?;
    let reason = parts.next().unwrap_or_default().trim();

    if !is_http_version(version) {
        return Err(malformed());
    }

    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::InvalidStatusCode(code.to_string()));
    }
    let status = code
        .parse::<u16>()
        .map_err(|_| ProtocolError::InvalidStatusCode(code.to_string()))?;

    Ok((version, status, reason))
}

/// `HTTP/x.y` with single digit major and minor.
fn is_http_version(s: &str) -> bool {
    match s.strip_prefix("HTTP/").map(str::as_bytes) {
        Some([major, b'.', minor]) => major.is_ascii_digit() && minor.is_ascii_digit(),
        _ => false,
    }
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}
