use std::io::{BufRead, ErrorKind};

use crate::error::{ParseErrorKind, RaopError, Result};
use crate::protocol::headers::Headers;

/// Correlation header echoed on every response (RFC 2326 §12.17).
pub const SEQUENCE_HEADER: &str = "CSeq";

pub const CONTENT_LENGTH: &str = "Content-Length";

/// Bounds applied while reading a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    /// Longest start line or header line accepted, excluding the terminator.
    pub max_line_len: usize,
    /// Largest `Content-Length` the server will read.
    pub max_body_len: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_line_len: 8 * 1024,
            max_body_len: 1024 * 1024,
        }
    }
}

/// A parsed RAOP request.
///
/// RAOP borrows the RTSP/HTTP message grammar:
///
/// ```text
/// VERB SP RESOURCE SP VERSION CRLF
/// *(Name: Value CRLF)
/// CRLF
/// [Content-Length bytes of body]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaopRequest {
    /// Request method (`POST`, `OPTIONS`, ...). Never empty.
    pub verb: String,
    /// Resource path, or `*` for connection-level requests. Never empty.
    pub resource: String,
    /// Everything after the second space of the start line.
    pub version: String,
    pub headers: Headers,
    /// Exactly `Content-Length` bytes; empty when the header is absent.
    pub body: Vec<u8>,
}

impl RaopRequest {
    /// Read one request from a buffered stream.
    ///
    /// The body is framed strictly by `Content-Length`: the reader is
    /// drained until exactly that many bytes have arrived, however many
    /// reads that takes. A stream that closes before sending anything
    /// yields [`ParseErrorKind::NoRequest`].
    pub fn read_from<R: BufRead + ?Sized>(reader: &mut R, limits: &ParserLimits) -> Result<Self> {
        let start_line = read_line(reader, limits.max_line_len, ParseErrorKind::MalformedStartLine)?
            .ok_or(RaopError::parse(ParseErrorKind::NoRequest))?;
        let start_line = String::from_utf8(start_line)
            .map_err(|_| RaopError::parse(ParseErrorKind::MalformedStartLine))?;
        let (verb, resource, version) = parse_start_line(&start_line)?;

        if version != "RTSP/1.0" {
            tracing::debug!(version, "client sent non-RTSP/1.0 version");
        }

        let headers = read_headers(reader, limits.max_line_len)?;

        let body_len = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if body_len > limits.max_body_len {
            return Err(RaopError::parse(ParseErrorKind::BodyTooLarge));
        }

        let mut body = vec![0u8; body_len];
        reader.read_exact(&mut body).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                RaopError::parse(ParseErrorKind::UnexpectedEndOfStream)
            } else {
                RaopError::Io(e)
            }
        })?;

        Ok(RaopRequest {
            verb: verb.to_string(),
            resource: resource.to_string(),
            version: version.to_string(),
            headers,
            body,
        })
    }

    /// Look up a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The `CSeq` value, if the client sent one.
    pub fn cseq(&self) -> Option<&str> {
        self.headers.get(SEQUENCE_HEADER)
    }
}

/// Split `VERB SP RESOURCE SP VERSION`.
///
/// Both spaces are mandatory; the version is the remainder of the line.
fn parse_start_line(line: &str) -> Result<(&str, &str, &str)> {
    let malformed = || RaopError::parse(ParseErrorKind::MalformedStartLine);
    let (verb, rest) = line.split_once(' ').ok_or_else(malformed)?;
    let (resource, version) = rest.split_once(' ').ok_or_else(malformed)?;
    if verb.is_empty() || resource.is_empty() {
        return Err(malformed());
    }
    Ok((verb, resource, version.trim()))
}

fn read_headers<R: BufRead + ?Sized>(reader: &mut R, max_line_len: usize) -> Result<Headers> {
    let malformed = || RaopError::parse(ParseErrorKind::MalformedHeaders);
    let mut headers = Headers::new();

    loop {
        let line = read_line(reader, max_line_len, ParseErrorKind::MalformedHeaders)?
            .ok_or(RaopError::parse(ParseErrorKind::UnexpectedEndOfStream))?;
        if line.is_empty() {
            return Ok(headers);
        }
        let line = String::from_utf8(line).map_err(|_| malformed())?;

        if line.starts_with([' ', '\t']) {
            if !headers.continue_last(line.trim()) {
                return Err(malformed());
            }
            continue;
        }

        let (name, value) = line.split_once(':').ok_or_else(malformed)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(malformed());
        }
        headers.append(name, value.trim());
    }
}

/// Read one line, stripping `\n` or `\r\n`.
///
/// Returns `Ok(None)` when the stream ends before the first byte of the
/// line. A line cut off by end of stream is
/// [`ParseErrorKind::UnexpectedEndOfStream`]; a line longer than
/// `max_len` fails with `over_limit`.
fn read_line<R: BufRead + ?Sized>(
    reader: &mut R,
    max_len: usize,
    over_limit: ParseErrorKind,
) -> Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    loop {
        let available = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if available.is_empty() {
            if line.is_empty() {
                return Ok(None);
            }
            return Err(RaopError::parse(ParseErrorKind::UnexpectedEndOfStream));
        }

        let newline = available.iter().position(|&b| b == b'\n');
        let take = newline.unwrap_or(available.len());
        if line.len() + take > max_len + 1 {
            return Err(RaopError::parse(over_limit));
        }
        line.extend_from_slice(&available[..take]);
        let used = newline.map_or(take, |i| i + 1);
        reader.consume(used);

        if newline.is_some() {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.len() > max_len {
                return Err(RaopError::parse(over_limit));
            }
            return Ok(Some(line));
        }
    }
}
