//! URL fetching with SSRF protection.
//!
//! Before every request (including each redirect hop) the target is
//! checked:
//! - scheme must be http or https
//! - localhost names and internal suffixes are refused
//! - literal and DNS-resolved addresses must be publicly routable
//!
//! The request for a hop connects only to the addresses that were checked
//! for it, so a second DNS answer cannot redirect it elsewhere.
//!
//! HTML is converted to Markdown; long pages are truncated.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::error::{ToolError, ToolResult};
use crate::spec::{Tool, ToolOutput, parse_args};
use crate::state::InvocationState;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CHARS: usize = 20_000;
pub const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;
const MAX_REDIRECTS: usize = 5;
const USER_AGENT: &str = concat!("slackagent/", env!("CARGO_PKG_VERSION"));

const LOCAL_SUFFIXES: &[&str] = &[
    ".local",
    ".localhost",
    ".internal",
    ".intranet",
    ".corp",
    ".home",
    ".lan",
    ".localdomain",
];

/// A checked request target.
#[derive(Debug, Clone)]
pub struct Target {
    pub url: Url,
    /// Addresses the host resolved to when checked. Empty when the host is
    /// a literal address or checks are disabled.
    pub addrs: Vec<SocketAddr>,
}

/// Address checks applied before each request.
#[derive(Debug, Clone, Default)]
pub struct UrlGuard {
    allow_private: bool,
}

impl UrlGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip host and address checks; scheme checks still apply.
    pub fn allow_private_hosts(mut self) -> Self {
        self.allow_private = true;
        self
    }

    /// Parse and check a URL, resolving its host.
    pub async fn check(&self, raw: &str) -> ToolResult<Target> {
        let url = Url::parse(raw.trim())
            .map_err(|e| ToolError::InvalidArguments(format!("invalid URL '{raw}': {e}")))?;
        self.check_url(url).await
    }

    async fn check_url(&self, url: Url) -> ToolResult<Target> {
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ToolError::Blocked(format!(
                    "the {scheme} scheme is not allowed, only http and https"
                )));
            }
        }
        let host = url
            .host_str()
            .ok_or_else(|| ToolError::InvalidArguments("the URL has no host".to_string()))?;

        if self.allow_private {
            return Ok(Target { url, addrs: Vec::new() });
        }

        let host_lower = host.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase();
        if host_lower == "localhost"
            || LOCAL_SUFFIXES.iter().any(|suffix| host_lower.ends_with(suffix))
        {
            return Err(ToolError::Blocked(format!("{host} is a local host name")));
        }

        if let Ok(ip) = host_lower.parse::<IpAddr>() {
            check_ip(ip)?;
            return Ok(Target { url, addrs: Vec::new() });
        }

        let port = url.port_or_known_default().unwrap_or(80);
        let addrs: Vec<_> = tokio::net::lookup_host((host_lower.as_str(), port))
            .await
            .map_err(|_| ToolError::Unavailable(format!("could not resolve {host}")))?
            .collect();
        if addrs.is_empty() {
            return Err(ToolError::Unavailable(format!("could not resolve {host}")));
        }
        if addrs.iter().any(|addr| is_blocked_ip(addr.ip())) {
            return Err(ToolError::Blocked(format!(
                "{host} resolves to a private or reserved address"
            )));
        }
        Ok(Target { url, addrs })
    }
}

fn check_ip(ip: IpAddr) -> ToolResult<()> {
    if is_blocked_ip(ip) {
        return Err(ToolError::Blocked(format!(
            "{ip} is a private or reserved address"
        )));
    }
    Ok(())
}

/// Whether an address is loopback, private, link-local or otherwise not
/// publicly routable.
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_ipv4(v4),
        IpAddr::V6(v6) => is_blocked_ipv6(v6),
    }
}

fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || a == 0
        // Shared address space 100.64.0.0/10.
        || (a == 100 && (64..=127).contains(&b))
        || (a == 192 && b == 0 && c == 0)
        || (a == 192 && b == 0 && c == 2)
        || (a == 198 && b == 51 && c == 100)
        || (a == 203 && b == 0 && c == 113)
        || (a == 198 && (18..=19).contains(&b))
        || a >= 224
}

fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_ipv4(v4);
    }
    let s = ip.segments();
    ip.is_loopback()
        || ip.is_unspecified()
        || s[0] & 0xffc0 == 0xfe80
        || s[0] & 0xffc0 == 0xfec0
        || s[0] & 0xfe00 == 0xfc00
        || s[0] & 0xff00 == 0xff00
        || (s[0] == 0x2001 && (s[1] == 0x0db8 || s[1] == 0))
        || (s[0] == 0x2002
            && is_blocked_ipv4(Ipv4Addr::new(
                (s[1] >> 8) as u8,
                (s[1] & 0xff) as u8,
                (s[2] >> 8) as u8,
                (s[2] & 0xff) as u8,
            )))
}

/// Keep the first `max_chars` characters, noting what was cut.
fn truncate(text: String, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{kept}\n\n[Content truncated at {max_chars} of {total} characters]")
}

#[derive(Debug, Deserialize)]
struct FetchArgs {
    #[serde(default)]
    url: String,
}

/// `fetch_url`.
#[derive(Debug, Clone)]
pub struct FetchUrlTool {
    /// Used as is when a target carries no resolved addresses.
    http: reqwest::Client,
    guard: UrlGuard,
    timeout: Duration,
    max_chars: usize,
}

impl FetchUrlTool {
    pub fn new() -> ToolResult<Self> {
        Ok(Self::with_client(client_builder().build()?))
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            guard: UrlGuard::new(),
            timeout: DEFAULT_TIMEOUT,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    pub fn with_guard(mut self, guard: UrlGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// GET a checked target, connecting only to its checked addresses.
    pub async fn send(&self, target: &Target) -> ToolResult<reqwest::Response> {
        debug!(url = %target.url, pinned = target.addrs.len(), "Fetching");
        let http = match target.url.host_str() {
            Some(host) if !target.addrs.is_empty() => client_builder()
                .resolve_to_addrs(host, &target.addrs)
                .build()?,
            _ => self.http.clone(),
        };
        Ok(http
            .get(target.url.clone())
            .timeout(self.timeout)
            .send()
            .await?)
    }

    /// Fetch a page and render it as text.
    pub async fn fetch(&self, raw_url: &str) -> ToolResult<String> {
        if raw_url.trim().is_empty() {
            return Err(ToolError::InvalidArguments("url must not be empty".to_string()));
        }
        let mut target = self.guard.check(raw_url).await?;

        let mut redirects = 0;
        let response = loop {
            let response = self.send(&target).await?;
            if !response.status().is_redirection() {
                break response;
            }
            redirects += 1;
            if redirects > MAX_REDIRECTS {
                return Err(ToolError::Http(format!("more than {MAX_REDIRECTS} redirects")));
            }
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| ToolError::Http("redirect without a Location header".to_string()))?;
            let next = target
                .url
                .join(location)
                .map_err(|e| ToolError::Http(format!("invalid redirect target: {e}")))?;
            target = self.guard.check_url(next).await?;
        };
        let url = target.url;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Http(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }
        if let Some(length) = response.content_length() {
            if length as usize > MAX_RESPONSE_BYTES {
                return Err(ToolError::Http(format!(
                    "response too large ({length} bytes, limit {MAX_RESPONSE_BYTES} bytes)"
                )));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/plain")
            .to_ascii_lowercase();
        if !is_textual(&content_type) {
            return Err(ToolError::Http(format!(
                "unsupported content type {content_type}"
            )));
        }

        let mut response = response;
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() > MAX_RESPONSE_BYTES {
                return Err(ToolError::Http(format!(
                    "response too large (over {MAX_RESPONSE_BYTES} bytes)"
                )));
            }
        }

        let text = String::from_utf8_lossy(&body);
        let rendered = if content_type.contains("html") {
            html2md::parse_html(&text)
        } else {
            text.into_owned()
        };
        let rendered = rendered.trim();
        if rendered.is_empty() {
            return Ok(format!("{url} returned an empty page."));
        }
        Ok(format!("Content of {url}:\n\n{}", truncate(rendered.to_string(), self.max_chars)))
    }
}

/// Redirects are followed by the tool itself so every hop is checked.
fn client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
}

fn is_textual(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type.contains("json")
        || content_type.contains("xml")
        || content_type.contains("javascript")
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        crate::names::FETCH_URL
    }

    fn description(&self) -> &str {
        "Fetch a public web page and return its text (HTML is converted to Markdown). Only http and https URLs on public hosts are allowed; long pages are truncated."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Absolute http(s) URL"}
            },
            "required": ["url"]
        })
    }

    async fn invoke(&self, args: Value, _state: &InvocationState) -> ToolOutput {
        let result = match parse_args::<FetchArgs>(args) {
            Ok(args) => self.fetch(&args.url).await,
            Err(e) => Err(e),
        };
        ToolOutput::from_result(result)
    }
}
