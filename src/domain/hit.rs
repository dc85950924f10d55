use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Canonical wire layout expected by the tracker's `cdt` parameter.
pub const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A hit timestamp after layout resolution.
///
/// Holds the wall-clock time exactly as written in the source line; any
/// offset present in the input is not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTimestamp(NaiveDateTime);

impl NormalizedTimestamp {
    pub fn new(datetime: NaiveDateTime) -> Self {
        Self(datetime)
    }

    pub fn hms(&self) -> (u32, u32, u32) {
        (self.0.hour(), self.0.minute(), self.0.second())
    }

    /// `YYYY-MM-DD HH:MM:SS`, no zone component.
    pub fn wire_format(&self) -> String {
        self.0.format(WIRE_TIMESTAMP_FORMAT).to_string()
    }
}

/// One observed client request, extracted from a single log line.
///
/// Created only by the line parser. `url` is never empty and `status` is
/// always a three digit string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    pub ip: String,
    /// Raw timestamp field as it appeared in the line
    pub timestamp: String,
    /// `None` when the raw timestamp matched no known layout
    pub normalized: Option<NormalizedTimestamp>,
    pub method: String,
    pub url: String,
    pub protocol: String,
    pub status: String,
    pub size: String,
    pub referrer: String,
    pub user_agent: String,
    /// Virtual host, for formats that carry one
    pub host: Option<String>,
}

impl HitRecord {
    /// Resolve the fully-qualified URL reported to the tracker.
    ///
    /// Absolute request URLs are kept; otherwise the configured website URL
    /// wins over the record's own host.
    pub fn resolved_url(&self, website_url: Option<&str>) -> String {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            return self.url.clone();
        }

        match (website_url, self.host.as_deref()) {
            (Some(base), _) if !base.is_empty() => join_url(base, &self.url),
            (_, Some(host)) if !host.is_empty() => join_url(&format!("https://{host}"), &self.url),
            _ => self.url.clone(),
        }
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base.trim_end_matches('/'), path),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}
