// ── Query output envelope ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bgp::BgpRouteTable;
use super::traceroute::TracerouteResult;

/// What a query produced: raw device text or a canonical structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutputData {
    /// One entry per executed command.
    Raw(Vec<String>),
    BgpTable(BgpRouteTable),
    Traceroute(TracerouteResult),
}

impl OutputData {
    pub fn format(&self) -> OutputFormat {
        match self {
            Self::Raw(_) => OutputFormat::Text,
            Self::BgpTable(_) | Self::Traceroute(_) => OutputFormat::Structured,
        }
    }

    pub fn as_raw(&self) -> Option<&[String]> {
        match self {
            Self::Raw(lines) => Some(lines),
            _ => None,
        }
    }

    /// True when there is nothing worth showing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Raw(lines) => lines.iter().all(|l| l.trim().is_empty()),
            Self::BgpTable(table) => table.is_empty(),
            Self::Traceroute(trace) => trace.hops.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Structured,
}

/// The result handed back to callers, and what the cache stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutput {
    pub output: OutputData,
    pub format: OutputFormat,
    pub fingerprint: String,
    pub cached: bool,
    pub runtime_ms: u64,
    /// When the device was actually queried.
    pub timestamp: DateTime<Utc>,
}
