//! RAOP control protocol.
//!
//! This module handles the text-based signaling a sender uses before any
//! audio flows — parsing requests, building responses, routing verbs to
//! capability handlers, and the FairPlay setup handshake.
//!
//! ## Message format
//!
//! RAOP requests follow RTSP/1.0 (RFC 2326 §6) syntax with a binary body:
//!
//! ```text
//! POST /fp-setup RTSP/1.0\r\n
//! CSeq: 1\r\n
//! Content-Length: 16\r\n
//! \r\n
//! <16 bytes>
//! ```
//!
//! Key differences from a regular RTSP server:
//! - One exchange per TCP connection; the server closes after responding.
//! - Only `200 OK` and `400 Bad Request` are ever sent.
//! - Bodies are opaque binary blobs framed by `Content-Length`.
//!
//! ## Supported routes
//!
//! | Verb | Resource | Purpose |
//! |------|----------|---------|
//! | POST | /fp-setup | FairPlay setup, stage 1 |

pub mod fairplay;
pub mod handler;
pub mod headers;
pub mod request;
pub mod response;

pub use fairplay::FairPlaySetup;
pub use handler::{CapabilityHandler, ResourceMatcher, Route, Router};
pub use headers::Headers;
pub use request::{ParserLimits, RaopRequest};
pub use response::RaopResponse;
