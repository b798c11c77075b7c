use crate::protocol::request::{CONTENT_LENGTH, SEQUENCE_HEADER};

pub const CONTENT_TYPE: &str = "Content-Type";

/// Content type used for opaque handshake payloads.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Server identification sent by AirPort Express-compatible receivers.
pub const SERVER_AGENT: &str = "AirTunes/130.14";

const PROTOCOL_VERSION: &str = "RTSP/1.0";

/// A RAOP response.
///
/// Only two outcomes exist on the wire:
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// Content-Type: application/octet-stream\r\n
/// Content-Length: 142\r\n
/// CSeq: 1\r\n
/// Server: AirTunes/130.14\r\n
/// \r\n
/// <body>
/// ```
///
/// and `RTSP/1.0 400 Bad Request`, which carries no body and no headers
/// other than `CSeq`.
///
/// Uses a builder pattern — chain [`add_header`](Self::add_header) and
/// [`with_body`](Self::with_body), then call [`serialize`](Self::serialize).
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaopResponse {
    pub success: bool,
    /// Caller headers, one value per name.
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub content_type: String,
}

impl RaopResponse {
    fn new(success: bool) -> Self {
        RaopResponse {
            success,
            headers: Vec::new(),
            body: None,
            content_type: OCTET_STREAM.to_string(),
        }
    }

    /// 200 OK.
    pub fn ok() -> Self {
        Self::new(true)
    }

    /// 400 Bad Request — the generic client error.
    pub fn bad_request() -> Self {
        Self::new(false)
    }

    /// Set a header, replacing any value already set under the same name.
    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn status_line(&self) -> &'static str {
        if self.success {
            "200 OK"
        } else {
            "400 Bad Request"
        }
    }

    /// Serialize to wire bytes.
    ///
    /// With a body, `Content-Type` and `Content-Length` come first and
    /// caller headers of the same name are skipped. A failure response
    /// keeps only the sequence header.
    pub fn serialize(&self) -> Vec<u8> {
        let mut head = format!("{} {}\r\n", PROTOCOL_VERSION, self.status_line());

        let body = self.body.as_deref().filter(|_| self.success);
        if let Some(body) = body {
            head.push_str(&format!("{}: {}\r\n", CONTENT_TYPE, self.content_type));
            head.push_str(&format!("{}: {}\r\n", CONTENT_LENGTH, body.len()));
        }

        for (name, value) in &self.headers {
            let computed =
                name.eq_ignore_ascii_case(CONTENT_TYPE) || name.eq_ignore_ascii_case(CONTENT_LENGTH);
            if computed || (!self.success && !name.eq_ignore_ascii_case(SEQUENCE_HEADER)) {
                continue;
            }
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        if let Some(body) = body {
            bytes.extend_from_slice(body);
        }
        bytes
    }
}
