//! AWS Signature Version 4 request signing.
//!
//! Signs a fully built `reqwest::Request` in place: adds `x-amz-date`,
//! `x-amz-security-token` (for temporary credentials) and `authorization`.
//! Every header present on the request at signing time is signed, plus
//! `host`, which is derived from the URL.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};

use crate::credentials::AwsCredentials;
use crate::error::{AwsError, AwsResult};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Signs requests for one service in one region.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

impl SigV4Signer {
    pub fn new(
        credentials: AwsCredentials,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// A signer for another service sharing these credentials and region.
    pub fn for_service(&self, service: impl Into<String>) -> Self {
        Self {
            credentials: self.credentials.clone(),
            region: self.region.clone(),
            service: service.into(),
        }
    }

    /// Sign a request with the current time.
    pub fn sign(&self, request: &mut reqwest::Request) -> AwsResult<()> {
        self.sign_at(request, Utc::now())
    }

    /// Sign a request as of `now`.
    pub fn sign_at(&self, request: &mut reqwest::Request, now: DateTime<Utc>) -> AwsResult<()> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        insert_header(request.headers_mut(), "x-amz-date", &amz_date)?;
        if let Some(token) = self.credentials.session_token() {
            insert_header(request.headers_mut(), "x-amz-security-token", token)?;
        }

        let host = host_header(request.url())?;
        let body: &[u8] = request.body().and_then(|b| b.as_bytes()).unwrap_or(&[]);
        let (canonical, signed_headers) = canonical_request(
            request.method().as_str(),
            request.url(),
            &host,
            request.headers(),
            body,
        );

        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let to_sign = string_to_sign(&amz_date, &scope, &canonical);
        let key = signing_key(
            self.credentials.secret_access_key(),
            &date,
            &self.region,
            &self.service,
        );
        let signature = hex::encode(hmac(&key, to_sign.as_bytes()));

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.credentials.access_key_id
        );
        let value = HeaderValue::from_str(&authorization)
            .map_err(|e| AwsError::Signing(format!("invalid authorization header: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> AwsResult<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| AwsError::Signing(format!("invalid {name} header: {e}")))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

fn host_header(url: &reqwest::Url) -> AwsResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| AwsError::InvalidEndpoint(format!("{url} has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Build the canonical request and the signed-headers list.
fn canonical_request(
    method: &str,
    url: &reqwest::Url,
    host: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> (String, String) {
    let mut pairs: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| name.as_str() != "authorization")
        .map(|(name, value)| {
            (
                name.as_str().to_ascii_lowercase(),
                normalize_header_value(&String::from_utf8_lossy(value.as_bytes())),
            )
        })
        .collect();
    pairs.push(("host".to_string(), host.to_string()));
    pairs.sort();

    // Repeated headers are joined with commas under a single name.
    let mut merged: Vec<(String, String)> = Vec::with_capacity(pairs.len());
    for (name, value) in pairs {
        match merged.last_mut() {
            Some((last, joined)) if *last == name => {
                joined.push(',');
                joined.push_str(&value);
            }
            _ => merged.push((name, value)),
        }
    }

    let canonical_headers: String = merged
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = merged
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical = format!(
        "{method}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{}",
        canonical_uri(url.path()),
        canonical_query(url),
        hex::encode(Sha256::digest(body)),
    );
    (canonical, signed_headers)
}

/// Encode each path segment of the path as sent. Because the path is
/// already percent-encoded once, this yields the double encoding AWS
/// expects for every service except S3.
fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(uri_encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(url: &reqwest::Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn uri_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    )
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
