//! Slack request signature verification.
//!
//! Slack signs each Events API request with the app's signing secret:
//! `v0=` followed by the hex HMAC-SHA256 of `v0:{timestamp}:{body}`.
//! Requests whose timestamp is more than five minutes away from now are
//! rejected as replays.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Maximum age of a request timestamp in seconds.
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Verify a Slack request signature.
///
/// `timestamp` is the `X-Slack-Request-Timestamp` header, `signature` the
/// `X-Slack-Signature` header, `body` the raw request body.
pub fn verify_signature(signing_secret: &str, timestamp: &str, body: &[u8], signature: &str) -> bool {
    verify_signature_at(
        signing_secret,
        timestamp,
        body,
        signature,
        chrono::Utc::now().timestamp(),
    )
}

fn verify_signature_at(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now: i64,
) -> bool {
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if (now - ts).abs() > MAX_TIMESTAMP_AGE_SECS {
        return false;
    }

    let Some(provided) = signature.strip_prefix("v0=") else {
        return false;
    };
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(signing_secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(body);
    // Constant-time comparison.
    mac.verify_slice(&provided).is_ok()
}

/// Compute the `v0=` signature for a request body.
pub fn compute_signature(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(signing_secret.as_bytes()).expect("HMAC key of any length");
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";

    #[test]
    fn test_slack_documented_example() {
        let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
        let signature = "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503";
        assert!(verify_signature_at(SECRET, "1531420618", body, signature, 1531420618));
        assert_eq!(compute_signature(SECRET, "1531420618", body), signature);
    }

    #[test]
    fn test_valid_signature() {
        let now = chrono::Utc::now().timestamp().to_string();
        let body = br#"{"type":"url_verification"}"#;
        let signature = compute_signature(SECRET, &now, body);
        assert!(verify_signature(SECRET, &now, body, &signature));
    }

    #[test]
    fn test_tampered_body_fails() {
        let now = chrono::Utc::now().timestamp().to_string();
        let signature = compute_signature(SECRET, &now, b"original");
        assert!(!verify_signature(SECRET, &now, b"tampered", &signature));
    }

    #[test]
    fn test_stale_and_future_timestamps_fail() {
        let now = 1_700_000_000;
        for ts in [now - 600, now + 600] {
            let ts = ts.to_string();
            let signature = compute_signature(SECRET, &ts, b"body");
            assert!(!verify_signature_at(SECRET, &ts, b"body", &signature, now));
        }
        let ts = (now - 120).to_string();
        let signature = compute_signature(SECRET, &ts, b"body");
        assert!(verify_signature_at(SECRET, &ts, b"body", &signature, now));
    }

    #[test]
    fn test_malformed_inputs_fail() {
        let now = chrono::Utc::now().timestamp().to_string();
        let signature = compute_signature(SECRET, &now, b"body");
        assert!(!verify_signature(SECRET, "not-a-number", b"body", &signature));
        assert!(!verify_signature(SECRET, &now, b"body", ""));
        assert!(!verify_signature(SECRET, &now, b"body", &signature[3..]));
        assert!(!verify_signature(SECRET, &now, b"body", "v0=zz"));
    }
}
