//! Cookie lifetime and attribute policy

use crate::config::{SameSitePolicy, SessionConfig};
use crate::transport::{RequestContext, Transport};
use crate::types::SessionId;
use chrono::{DateTime, Utc};
use cookie::Cookie;
use std::time::Duration;
use time::OffsetDateTime;

/// RFC 1123 date format used by HTTP date headers
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Attribute set of the outbound session cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSitePolicy,
}

/// Decides session lifetime and cookie attributes
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    guest_ttl: Duration,
    remember_ttl: Duration,
    secure: bool,
    http_only: bool,
    same_site: SameSitePolicy,
    path: String,
}

impl CookiePolicy {
    /// Build the policy from configuration
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            guest_ttl: Duration::from_secs(config.guest_ttl),
            remember_ttl: Duration::from_secs(config.remember_ttl),
            secure: config.cookie.secure,
            http_only: config.cookie.http_only,
            same_site: config.cookie.same_site,
            path: config.cookie.path.clone(),
        }
    }

    /// Session lifetime for the given remember flag
    pub fn resolve_ttl(&self, remember: bool) -> Duration {
        if remember {
            self.remember_ttl
        } else {
            self.guest_ttl
        }
    }

    /// Cookie attributes for the current request.
    ///
    /// Encrypted transport forces `secure` and `http_only` on, whatever the
    /// configuration says. Nothing ever turns them off.
    pub fn attributes(&self, context: &RequestContext) -> CookieAttributes {
        CookieAttributes {
            domain: normalize_domain(&context.server_name),
            path: self.path.clone(),
            secure: self.secure || context.encrypted,
            http_only: self.http_only || context.encrypted,
            same_site: self.same_site,
        }
    }

    /// Build the outbound session cookie
    pub fn session_cookie(
        &self,
        name: &str,
        sid: &SessionId,
        context: &RequestContext,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Cookie<'static> {
        let attrs = self.attributes(context);
        let mut cookie = Cookie::build((name.to_string(), sid.to_string()))
            .path(attrs.path)
            .domain(attrs.domain)
            .secure(attrs.secure)
            .http_only(attrs.http_only)
            .same_site(attrs.same_site.into())
            .build();

        let expires_at = now.timestamp().saturating_add(ttl.as_secs() as i64);
        if let Ok(expires) = OffsetDateTime::from_unix_timestamp(expires_at) {
            cookie.set_expires(expires);
        }
        cookie
    }
}

/// Cookie domain for a server name.
///
/// Whitespace is stripped; `localhost` and names without a dot collapse to
/// `localhost`, since browsers reject non-dotted cookie domains.
pub fn normalize_domain(server_name: &str) -> String {
    let domain: String = server_name.chars().filter(|c| !c.is_whitespace()).collect();
    if domain == "localhost" || !domain.contains('.') {
        "localhost".to_string()
    } else {
        domain
    }
}

/// Write the no-cache header set sent with every session resolution
pub fn write_cache_headers(transport: &mut dyn Transport, now: DateTime<Utc>) {
    let stamp = now.format(HTTP_DATE).to_string();
    transport.set_header("Expires", stamp.clone());
    transport.set_header("Last-Modified", stamp);
    transport.set_header(
        "Cache-Control",
        "no-store, no-cache, must-revalidate".to_string(),
    );
    transport.append_header("Cache-Control", "post-check=0, pre-check=0".to_string());
    transport.set_header("Pragma", "no-cache".to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use crate::types::NetworkIdentity;
    use chrono::TimeZone;

    fn policy() -> CookiePolicy {
        CookiePolicy::from_config(&SessionConfig::default())
    }

    fn context(server_name: &str) -> RequestContext {
        RequestContext::new(server_name, NetworkIdentity::direct("10.0.0.1"))
    }

    #[test]
    fn test_ttl_selection() {
        let policy = policy();
        assert_eq!(policy.resolve_ttl(false), Duration::from_secs(3600));
        assert_eq!(policy.resolve_ttl(true), Duration::from_secs(2_592_000));
    }

    #[test]
    fn test_ttl_follows_config() {
        let mut config = SessionConfig::default();
        config.guest_ttl = 60;
        config.remember_ttl = 120;
        let policy = CookiePolicy::from_config(&config);
        assert_eq!(policy.resolve_ttl(false), Duration::from_secs(60));
        assert_eq!(policy.resolve_ttl(true), Duration::from_secs(120));
    }

    #[test]
    fn test_domain_normalization() {
        assert_eq!(normalize_domain("example.com"), "example.com");
        assert_eq!(normalize_domain("localhost"), "localhost");
        assert_eq!(normalize_domain("intranet"), "localhost");
        assert_eq!(normalize_domain(" www.example .com\t"), "www.example.com");
        assert_eq!(normalize_domain(""), "localhost");
    }

    #[test]
    fn test_encrypted_transport_escalates() {
        let mut config = SessionConfig::default();
        config.cookie.secure = false;
        config.cookie.http_only = false;
        let policy = CookiePolicy::from_config(&config);

        let plain = policy.attributes(&context("example.com"));
        assert!(!plain.secure);
        assert!(!plain.http_only);

        let tls = policy.attributes(&context("example.com").encrypted(true));
        assert!(tls.secure);
        assert!(tls.http_only);
    }

    #[test]
    fn test_plain_transport_never_downgrades() {
        let attrs = policy().attributes(&context("example.com"));
        assert!(attrs.secure);
        assert!(attrs.http_only);
        assert_eq!(attrs.same_site, SameSitePolicy::Lax);
        assert_eq!(attrs.path, "/");
    }

    #[test]
    fn test_session_cookie_attributes() {
        let sid = SessionId::from_string("c".repeat(crate::types::TOKEN_LEN)).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let cookie = policy().session_cookie(
            "cms",
            &sid,
            &context("shop.example.com"),
            Duration::from_secs(3600),
            now,
        );

        assert_eq!(cookie.name(), "cms");
        assert_eq!(cookie.value(), sid.as_str());
        assert_eq!(cookie.domain(), Some("shop.example.com"));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(cookie::SameSite::Lax));
        let expires = cookie.expires_datetime().unwrap();
        assert_eq!(expires.unix_timestamp(), now.timestamp() + 3600);
    }

    #[test]
    fn test_cache_headers() {
        let mut transport = MemoryTransport::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        write_cache_headers(&mut transport, now);

        assert_eq!(transport.header("Expires"), Some("Thu, 07 Mar 2024 09:05:02 GMT"));
        assert_eq!(transport.header("Last-Modified"), Some("Thu, 07 Mar 2024 09:05:02 GMT"));
        assert_eq!(
            transport.header_values("Cache-Control"),
            vec!["no-store, no-cache, must-revalidate", "post-check=0, pre-check=0"]
        );
        assert_eq!(transport.header("Pragma"), Some("no-cache"));
    }
}
