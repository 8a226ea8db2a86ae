//! Current time lookup.
//!
//! Zones resolve to fixed UTC offsets: a small table of named zones that
//! do not observe daylight saving time, plus explicit `UTC+HH:MM` style
//! offsets.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ToolError, ToolResult};
use crate::spec::{Tool, ToolOutput, parse_args};
use crate::state::InvocationState;

pub const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";

/// Named zone → (abbreviation, offset in minutes).
const ZONES: &[(&str, &str, i32)] = &[
    ("UTC", "UTC", 0),
    ("Etc/UTC", "UTC", 0),
    ("GMT", "GMT", 0),
    ("Asia/Tokyo", "JST", 9 * 60),
    ("Japan", "JST", 9 * 60),
    ("JST", "JST", 9 * 60),
    ("Asia/Seoul", "KST", 9 * 60),
    ("Asia/Shanghai", "CST", 8 * 60),
    ("Asia/Hong_Kong", "HKT", 8 * 60),
    ("Asia/Taipei", "CST", 8 * 60),
    ("Asia/Singapore", "SGT", 8 * 60),
    ("Asia/Manila", "PHT", 8 * 60),
    ("Asia/Bangkok", "ICT", 7 * 60),
    ("Asia/Jakarta", "WIB", 7 * 60),
    ("Asia/Ho_Chi_Minh", "ICT", 7 * 60),
    ("Asia/Kolkata", "IST", 5 * 60 + 30),
    ("Asia/Dubai", "GST", 4 * 60),
    ("Europe/Moscow", "MSK", 3 * 60),
    ("America/Phoenix", "MST", -7 * 60),
    ("Pacific/Honolulu", "HST", -10 * 60),
];

/// A resolved zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub name: String,
    pub abbreviation: String,
    pub offset: FixedOffset,
}

/// Resolve a zone name or an explicit offset (`+09:00`, `UTC-5`,
/// `GMT+5:30`). Names match case-insensitively.
pub fn resolve_zone(input: &str) -> ToolResult<Zone> {
    let input = input.trim();
    if let Some((name, abbreviation, minutes)) = ZONES
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(input))
    {
        let offset = FixedOffset::east_opt(minutes * 60)
            .ok_or_else(|| ToolError::InvalidArguments(format!("invalid offset for {name}")))?;
        return Ok(Zone {
            name: (*name).to_string(),
            abbreviation: (*abbreviation).to_string(),
            offset,
        });
    }

    if let Some(offset) = parse_offset(input) {
        let label = format!("UTC{offset}");
        return Ok(Zone {
            name: label.clone(),
            abbreviation: label,
            offset,
        });
    }

    let supported = ZONES
        .iter()
        .map(|(name, _, _)| *name)
        .collect::<Vec<_>>()
        .join(", ");
    Err(ToolError::InvalidArguments(format!(
        "unknown timezone '{input}'. Supported zones: {supported}, or an offset such as +09:00"
    )))
}

fn parse_offset(input: &str) -> Option<FixedOffset> {
    let upper = input.to_ascii_uppercase();
    let rest = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);
    let (sign, rest) = match rest.chars().next()? {
        '+' => (1, &rest[1..]),
        '-' => (-1, &rest[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if rest.len() == 4 && rest.is_ascii() => {
            (rest[..2].parse().ok()?, rest[2..].parse().ok()?)
        }
        None => (rest.parse().ok()?, 0),
    };
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Render `now` in `zone`.
pub fn format_time(now: DateTime<Utc>, zone: &Zone) -> String {
    let local = now.with_timezone(&zone.offset);
    format!(
        "{} {} ({}, UTC{}), {}",
        local.format("%Y-%m-%d %H:%M:%S"),
        zone.abbreviation,
        zone.name,
        zone.offset,
        local.format("%A")
    )
}

#[derive(Debug, Deserialize)]
struct TimeArgs {
    #[serde(default)]
    timezone: Option<String>,
}

/// `get_current_time`.
#[derive(Debug, Clone)]
pub struct CurrentTimeTool {
    default_zone: String,
}

impl Default for CurrentTimeTool {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl CurrentTimeTool {
    pub fn new(default_zone: impl Into<String>) -> Self {
        Self {
            default_zone: default_zone.into(),
        }
    }

    fn run(&self, args: Value) -> ToolResult<String> {
        let args: TimeArgs = parse_args(args)?;
        let requested = args
            .timezone
            .as_deref()
            .map(str::trim)
            .filter(|z| !z.is_empty())
            .unwrap_or(self.default_zone.as_str());
        let zone = resolve_zone(requested)?;
        Ok(format!("Current time: {}", format_time(Utc::now(), &zone)))
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        crate::names::GET_CURRENT_TIME
    }

    fn description(&self) -> &str {
        "Get the current date and time. Defaults to Japan Standard Time (Asia/Tokyo); pass a zone name or an offset such as +05:30 for another zone."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "timezone": {"type": "string", "description": "Zone name (e.g. Asia/Tokyo, UTC) or offset (e.g. +09:00)"}
            }
        })
    }

    async fn invoke(&self, args: Value, _state: &InvocationState) -> ToolOutput {
        ToolOutput::from_result(self.run(args))
    }
}
