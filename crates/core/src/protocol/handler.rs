use std::fmt;
use std::sync::Arc;

use crate::error::{RaopError, Result};
use crate::protocol::fairplay::FairPlaySetup;
use crate::protocol::request::{RaopRequest, SEQUENCE_HEADER};
use crate::protocol::response::{RaopResponse, SERVER_AGENT};

/// A capability negotiated through one route (FairPlay setup, ...).
///
/// Handlers are shared across connection threads and must not keep
/// per-connection state.
pub trait CapabilityHandler: Send + Sync {
    fn handle(&self, request: &RaopRequest) -> Result<RaopResponse>;
}

/// Resource side of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceMatcher {
    /// Matches one resource string. `Exact("*")` matches the literal
    /// `*` used by connection-level requests such as `OPTIONS *`.
    Exact(String),
    /// Matches any resource starting with the prefix.
    Prefix(String),
    /// Matches every resource.
    Any,
}

impl ResourceMatcher {
    pub fn exact(resource: &str) -> Self {
        Self::Exact(resource.to_string())
    }

    pub fn prefix(prefix: &str) -> Self {
        Self::Prefix(prefix.to_string())
    }

    pub fn matches(&self, resource: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == resource,
            Self::Prefix(prefix) => resource.starts_with(prefix.as_str()),
            Self::Any => true,
        }
    }
}

impl fmt::Display for ResourceMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(resource) => write!(f, "{}", resource),
            Self::Prefix(prefix) => write!(f, "{}...", prefix),
            Self::Any => write!(f, "<any>"),
        }
    }
}

/// Pairing of verb and resource matcher with the handler serving it.
pub struct Route {
    verb: String,
    resource: ResourceMatcher,
    handler: Arc<dyn CapabilityHandler>,
}

impl Route {
    pub fn new(verb: &str, resource: ResourceMatcher, handler: Arc<dyn CapabilityHandler>) -> Self {
        Self {
            verb: verb.to_string(),
            resource,
            handler,
        }
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn resource(&self) -> &ResourceMatcher {
        &self.resource
    }

    pub fn matches(&self, verb: &str, resource: &str) -> bool {
        self.verb == verb && self.resource.matches(resource)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("verb", &self.verb)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

/// Route table and request dispatcher.
///
/// Built once at startup, then shared read-only (`Arc<Router>`) by every
/// connection. Routes are tried in registration order; the first match
/// handles the request.
#[derive(Debug)]
pub struct Router {
    routes: Vec<Route>,
    server_agent: String,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            server_agent: SERVER_AGENT.to_string(),
        }
    }

    /// The receiver's route table: `POST /fp-setup` to the FairPlay engine.
    pub fn raop() -> Self {
        Self::new().route(
            "POST",
            ResourceMatcher::exact("/fp-setup"),
            FairPlaySetup::default(),
        )
    }

    pub fn route(
        mut self,
        verb: &str,
        resource: ResourceMatcher,
        handler: impl CapabilityHandler + 'static,
    ) -> Self {
        self.routes.push(Route::new(verb, resource, Arc::new(handler)));
        self
    }

    /// Value of the `Server` header on success responses.
    pub fn with_server_agent(mut self, agent: &str) -> Self {
        self.server_agent = agent.to_string();
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find the first route for `verb` and `resource`.
    pub fn resolve(&self, verb: &str, resource: &str) -> Result<&Route> {
        self.routes
            .iter()
            .find(|route| route.matches(verb, resource))
            .ok_or_else(|| RaopError::UnmatchedRoute {
                verb: verb.to_string(),
                resource: resource.to_string(),
            })
    }

    /// Run a parsed request through its handler.
    ///
    /// Never fails: an unmatched route or a handler error becomes
    /// `400 Bad Request`. The client's `CSeq` is echoed either way.
    pub fn dispatch(&self, request: &RaopRequest) -> RaopResponse {
        let outcome = self
            .resolve(&request.verb, &request.resource)
            .and_then(|route| route.handler.handle(request));

        let mut response = match outcome {
            Ok(response) if response.get_header("Server").is_some() => response,
            Ok(response) => response.add_header("Server", &self.server_agent),
            Err(e) => {
                tracing::warn!(
                    verb = %request.verb,
                    resource = %request.resource,
                    error = %e,
                    "request rejected"
                );
                RaopResponse::bad_request()
            }
        };

        if let Some((name, value)) = request.headers.get_entry(SEQUENCE_HEADER) {
            response = response.add_header(name, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::fairplay::STAGE_ONE_REPLY;
    use crate::protocol::headers::Headers;

    struct Fixed(&'static [u8]);

    struct Branded;

    impl CapabilityHandler for Branded {
        fn handle(&self, _request: &RaopRequest) -> Result<RaopResponse> {
            Ok(RaopResponse::ok().add_header("Server", "AirPlay/381.13"))
        }
    }

    impl CapabilityHandler for Fixed {
        fn handle(&self, _request: &RaopRequest) -> Result<RaopResponse> {
            Ok(RaopResponse::ok().with_body(self.0))
        }
    }

    fn request(verb: &str, resource: &str, cseq: Option<&str>, body: &[u8]) -> RaopRequest {
        let mut headers = Headers::new();
        if let Some(cseq) = cseq {
            headers.append("Cseq", cseq);
        }
        RaopRequest {
            verb: verb.to_string(),
            resource: resource.to_string(),
            version: "RTSP/1.0".to_string(),
            headers,
            body: body.to_vec(),
        }
    }

    #[test]
    fn fp_setup_stage_one() {
        let router = Router::raop();
        let resp = router.dispatch(&request(
            "POST",
            "/fp-setup",
            Some("1"),
            &[0x46, 0x50, 0x4c, 0x59, 0x02, 0x01, 0x01],
        ));
        assert!(resp.success);
        assert_eq!(resp.body.as_deref(), Some(&STAGE_ONE_REPLY[..]));
        assert_eq!(resp.get_header("Cseq"), Some("1"));
        assert_eq!(resp.get_header("Server"), Some(SERVER_AGENT));
    }

    #[test]
    fn unknown_stage_is_success_without_body() {
        let router = Router::raop();
        let resp = router.dispatch(&request(
            "POST",
            "/fp-setup",
            Some("2"),
            &[0x46, 0x50, 0x4c, 0x59, 0x02, 0x01, 0x02],
        ));
        assert!(resp.success);
        assert!(resp.body.is_none());
        let s = String::from_utf8(resp.serialize()).unwrap();
        assert!(s.starts_with("RTSP/1.0 200 OK\r\n"));
        assert!(!s.to_ascii_lowercase().contains("content-length"));
    }

    #[test]
    fn short_handshake_body_is_bad_request() {
        let router = Router::raop();
        let resp = router.dispatch(&request("POST", "/fp-setup", Some("3"), &[0x46]));
        assert!(!resp.success);
        assert_eq!(
            String::from_utf8(resp.serialize()).unwrap(),
            "RTSP/1.0 400 Bad Request\r\nCseq: 3\r\n\r\n"
        );
    }

    #[test]
    fn unmatched_route_is_bad_request() {
        let router = Router::raop();
        let resp = router.dispatch(&request("GET", "/nope", None, b""));
        assert!(!resp.success);
        assert!(resp.body.is_none());
        assert_eq!(
            String::from_utf8(resp.serialize()).unwrap(),
            "RTSP/1.0 400 Bad Request\r\n\r\n"
        );

        // verb must match as well as resource
        let resp = router.dispatch(&request("GET", "/fp-setup", None, b""));
        assert!(!resp.success);
        assert!(matches!(
            router.resolve("GET", "/fp-setup"),
            Err(RaopError::UnmatchedRoute { .. })
        ));
    }

    #[test]
    fn handler_server_header_is_kept() {
        let router = Router::new().route("GET", ResourceMatcher::exact("/info"), Branded);
        let resp = router.dispatch(&request("GET", "/info", Some("1"), b""));
        assert_eq!(resp.get_header("Server"), Some("AirPlay/381.13"));
        assert_eq!(
            resp.headers
                .iter()
                .filter(|(name, _)| name.eq_ignore_ascii_case("server"))
                .count(),
            1
        );
    }

    #[test]
    fn resource_matchers() {
        assert!(ResourceMatcher::exact("*").matches("*"));
        assert!(!ResourceMatcher::exact("*").matches("/fp-setup"));
        assert!(ResourceMatcher::prefix("/pair-").matches("/pair-setup"));
        assert!(!ResourceMatcher::prefix("/pair-").matches("/fp-setup"));
        assert!(ResourceMatcher::Any.matches("rtsp://10.0.0.2/1234"));
    }

    #[test]
    fn extra_routes_use_the_same_dispatch() {
        let router = Router::raop()
            .route("OPTIONS", ResourceMatcher::exact("*"), Fixed(b"opts"))
            .route("GET", ResourceMatcher::prefix("/info"), Fixed(b"info"))
            .route("GET", ResourceMatcher::Any, Fixed(b"fallback"))
            .with_server_agent("test/1.0");
        assert_eq!(router.routes().len(), 4);

        let resp = router.dispatch(&request("OPTIONS", "*", Some("7"), b""));
        assert_eq!(resp.body.as_deref(), Some(&b"opts"[..]));
        assert_eq!(resp.get_header("Server"), Some("test/1.0"));
        assert_eq!(resp.get_header("CSeq"), Some("7"));

        let resp = router.dispatch(&request("GET", "/info/extra", None, b""));
        assert_eq!(resp.body.as_deref(), Some(&b"info"[..]));

        let resp = router.dispatch(&request("GET", "/anything", None, b""));
        assert_eq!(resp.body.as_deref(), Some(&b"fallback"[..]));
    }
}
