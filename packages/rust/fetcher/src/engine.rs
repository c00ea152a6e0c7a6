//! HTTP source fetcher with SSRF protection.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use reqwest::redirect::Policy;
use tracing::{debug, info, instrument, warn};
use url::Url;

use blogmate_shared::http::{client_builder, finish_client};
use blogmate_shared::{BlogMateError, HttpConfig, Result, SourcePage};

use crate::SourceFetcher;
use crate::extract::extract_page;

// ---------------------------------------------------------------------------
// HttpSourceFetcher
// ---------------------------------------------------------------------------

/// Fetches reference pages over HTTP and extracts their readable text.
pub struct HttpSourceFetcher {
    client: Client,
    /// Allow loopback hosts (for integration tests with mock servers).
    /// Shared with the redirect policy so every hop sees the same setting.
    allow_localhost: Arc<AtomicBool>,
}

impl HttpSourceFetcher {
    /// Create a fetcher using the `[http]` fetch timeout. Every redirect hop
    /// is checked against the same SSRF rules as the initial URL.
    pub fn new(http: &HttpConfig) -> Result<Self> {
        let allow_localhost = Arc::new(AtomicBool::new(false));
        let policy = guarded_redirects(http.max_redirects, allow_localhost.clone());
        let client = finish_client(client_builder(http, http.fetch_timeout_secs).redirect(policy))?;
        Ok(Self {
            client,
            allow_localhost,
        })
    }

    /// Allow fetching loopback hosts (for integration tests). Private and
    /// link-local ranges stay blocked.
    pub fn allow_localhost(self) -> Self {
        self.allow_localhost.store(true, Ordering::Relaxed);
        self
    }
}

/// Redirect policy that enforces the hop limit and refuses SSRF targets.
fn guarded_redirects(max_redirects: usize, allow_localhost: Arc<AtomicBool>) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error(format!("too many redirects (limit {max_redirects})"));
        }
        if is_ssrf_target(attempt.url(), allow_localhost.load(Ordering::Relaxed)) {
            warn!(target_url = %attempt.url(), "SSRF protection: redirect blocked");
            let msg = format!(
                "redirect to {} refused: local or private address",
                attempt.url()
            );
            return attempt.error(msg);
        }
        attempt.follow()
    })
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<SourcePage> {
        let parsed =
            Url::parse(url).map_err(|e| BlogMateError::Fetch(format!("invalid URL '{url}': {e}")))?;

        if is_ssrf_target(&parsed, self.allow_localhost.load(Ordering::Relaxed)) {
            warn!(%url, "SSRF protection: blocked");
            return Err(BlogMateError::Fetch(format!(
                "{url}: refusing to fetch a local or private address"
            )));
        }

        debug!("fetching source page");

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| BlogMateError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BlogMateError::Fetch(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BlogMateError::Fetch(format!("{url}: body read failed: {e}")))?;

        let page = extract_page(url, &body);

        info!(
            title = %page.title,
            content_chars = page.content.chars().count(),
            "source page extracted"
        );

        Ok(page)
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
///
/// `allow_loopback` admits loopback hosts only; private, link-local and
/// unique-local ranges are refused regardless.
fn is_ssrf_target(url: &Url, allow_loopback: bool) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    let ip = match url.host() {
        Some(url::Host::Ipv4(v4)) => IpAddr::V4(v4),
        Some(url::Host::Ipv6(v6)) => IpAddr::V6(v6),
        Some(url::Host::Domain(host)) => {
            let host = host.to_ascii_lowercase();
            if host == "localhost" || host.ends_with(".localhost") {
                return !allow_loopback;
            }
            return host.ends_with(".local") || host.ends_with(".internal");
        }
        None => return true,
    };

    if is_loopback(&ip) {
        !allow_loopback
    } else {
        is_private_ip(&ip)
    }
}

/// Loopback, including IPv4-mapped IPv6 (`::ffff:127.0.0.1`).
fn is_loopback(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
        }
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fe80::/10 link-local
                || (first & 0xffc0) == 0xfe80
                // fc00::/7 unique-local
                || (first & 0xfe00) == 0xfc00
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpSourceFetcher {
        HttpSourceFetcher::new(&HttpConfig::default())
            .unwrap()
            .allow_localhost()
    }

    #[test]
    fn ssrf_blocks_file_scheme() {
        let url = Url::parse("file:///etc/passwd").unwrap();
        assert!(is_ssrf_target(&url, false));
        assert!(is_ssrf_target(&url, true));
    }

    #[test]
    fn ssrf_blocks_private_and_loopback() {
        for raw in [
            "http://192.168.1.1/admin",
            "http://10.0.0.1/",
            "http://127.0.0.1:8080/",
            "http://[::1]/",
            "http://localhost:3000/api",
            "http://printer.local/",
            "http://[::ffff:127.0.0.1]/",
            "http://[::ffff:10.0.0.1]/",
            "http://[fe80::1]/",
            "http://[fd00::1]/",
            "http://[fc00::abcd]/",
        ] {
            let url = Url::parse(raw).unwrap();
            assert!(is_ssrf_target(&url, false), "{raw} should be blocked");
        }
    }

    #[test]
    fn loopback_opt_out_keeps_private_ranges_blocked() {
        for raw in ["http://127.0.0.1:8080/", "http://[::1]/", "http://[::ffff:127.0.0.1]/", "http://localhost/"] {
            let url = Url::parse(raw).unwrap();
            assert!(!is_ssrf_target(&url, true), "{raw} should be allowed");
        }
        for raw in ["http://10.0.0.1/", "http://[::ffff:192.168.0.1]/", "http://[fe80::1]/", "http://[fd00::1]/"] {
            let url = Url::parse(raw).unwrap();
            assert!(is_ssrf_target(&url, true), "{raw} should stay blocked");
        }
    }

    #[test]
    fn ssrf_allows_public() {
        for raw in ["https://news.example.com/story", "http://93.184.216.34/", "http://[2606:4700::1111]/"] {
            let url = Url::parse(raw).unwrap();
            assert!(!is_ssrf_target(&url, false), "{raw} should be allowed");
        }
    }

    #[tokio::test]
    async fn default_fetcher_refuses_localhost() {
        let fetcher = HttpSourceFetcher::new(&HttpConfig::default()).unwrap();
        let err = fetcher.fetch("http://127.0.0.1:9/page").await.unwrap_err();
        assert!(matches!(err, BlogMateError::Fetch(_)));
    }

    #[tokio::test]
    async fn default_fetcher_refuses_mapped_loopback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("internal secret"))
            .expect(0)
            .mount(&server)
            .await;

        let port = server.address().port();
        let fetcher = HttpSourceFetcher::new(&HttpConfig::default()).unwrap();
        let err = fetcher
            .fetch(&format!("http://[::ffff:127.0.0.1]:{port}/admin"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlogMateError::Fetch(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn redirect_to_private_address_is_refused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hop"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "http://10.255.255.1/secret"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/hop", server.uri()))
            .await
            .unwrap_err();
        match err {
            BlogMateError::Fetch(msg) => assert!(msg.contains("/hop"), "{msg}"),
            other => panic!("expected Fetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn redirect_to_allowed_host_is_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><main>Moved here</main></body></html>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let page = fetcher().fetch(&format!("{}/old", server.uri())).await.unwrap();
        assert_eq!(page.content, "Moved here");
    }

    #[tokio::test]
    async fn fetches_and_extracts() {
        let server = MockServer::start().await;
        let page = r#"<html><head><title>Rust 2024</title>
            <meta name="description" content="What changed"></head>
            <body><article><p>Editions are opt-in.</p></article></body></html>"#;

        Mock::given(method("GET"))
            .and(path("/story"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/story", server.uri());
        let result = fetcher().fetch(&url).await.unwrap();

        assert_eq!(result.url, url);
        assert_eq!(result.title, "Rust 2024");
        assert_eq!(result.description, "What changed");
        assert_eq!(result.content, "Editions are opt-in.");
    }

    #[tokio::test]
    async fn non_success_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        match err {
            BlogMateError::Fetch(msg) => assert!(msg.contains("404")),
            other => panic!("expected Fetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_fetch_error() {
        let err = fetcher().fetch("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(err, BlogMateError::Fetch(_)));
    }

    #[tokio::test]
    async fn invalid_url_is_fetch_error() {
        let err = fetcher().fetch("not a url").await.unwrap_err();
        assert!(matches!(err, BlogMateError::Fetch(_)));
    }
}
