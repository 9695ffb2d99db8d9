//! HTTP transport seam
//!
//! The session core never touches sockets or frameworks. It reads the inbound
//! cookie and writes the outbound cookie and cache headers through [`Transport`].
//! Headers must reach the transport before any response body bytes are sent;
//! enforcing that is the transport's job.

use crate::types::NetworkIdentity;
use cookie::Cookie;
use std::collections::HashMap;

/// Cookie and header access for one request/response pair
pub trait Transport {
    /// Value of an inbound cookie
    fn cookie(&self, name: &str) -> Option<String>;

    /// Queue an outbound `Set-Cookie`
    fn set_cookie(&mut self, cookie: Cookie<'static>);

    /// Set a response header, replacing earlier values of the same name
    fn set_header(&mut self, name: &str, value: String);

    /// Add a response header without replacing earlier values
    fn append_header(&mut self, name: &str, value: String);
}

/// Serving context of the current request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Host name the request was served under
    pub server_name: String,
    /// Whether the request arrived over encrypted transport
    pub encrypted: bool,
    /// Client network identity
    pub identity: NetworkIdentity,
}

impl RequestContext {
    /// Create a context for a plain-HTTP request
    pub fn new(server_name: impl Into<String>, identity: NetworkIdentity) -> Self {
        Self {
            server_name: server_name.into(),
            encrypted: false,
            identity,
        }
    }

    /// Mark the request as served over TLS
    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }
}

/// Transport that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: HashMap<String, String>,
    cookies: Vec<Cookie<'static>>,
    headers: Vec<(String, String)>,
}

impl MemoryTransport {
    /// Create a transport with no inbound cookies
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an inbound cookie
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inbound.insert(name.into(), value.into());
        self
    }

    /// Last outbound cookie with the given name
    pub fn outbound_cookie(&self, name: &str) -> Option<&Cookie<'static>> {
        self.cookies.iter().rev().find(|c| c.name() == name)
    }

    /// All outbound cookies in the order they were set
    pub fn outbound_cookies(&self) -> &[Cookie<'static>] {
        &self.cookies
    }

    /// First value of a response header
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).into_iter().next()
    }

    /// All values of a response header
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Response headers in order, including one `Set-Cookie` per cookie
    pub fn response_headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .cookies
            .iter()
            .map(|c| ("Set-Cookie".to_string(), c.to_string()))
            .collect();
        headers.extend(self.headers.iter().cloned());
        headers
    }
}

impl Transport for MemoryTransport {
    fn cookie(&self, name: &str) -> Option<String> {
        self.inbound.get(name).cloned()
    }

    fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.cookies.push(cookie);
    }

    fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }

    fn append_header(&mut self, name: &str, value: String) {
        self.headers.push((name.to_string(), value));
    }
}
