// ── Traceroute parsers ──
//
// Each parser reads the combined output of a traceroute directive into a
// `TracerouteResult`. Multi-command outputs are joined before parsing so
// hop numbering stays continuous.

pub mod mikrotik;
pub mod text;

use tracing::debug;

use crate::error::CoreError;
use crate::model::TracerouteResult;
use crate::platform::Platform;

pub type ParseFn = fn(&str, &str, &str) -> Result<TracerouteResult, CoreError>;

/// A vendor traceroute parser and the platforms it serves.
#[derive(Debug, Clone, Copy)]
pub struct TracerouteParser {
    pub name: &'static str,
    pub platforms: &'static [Platform],
    pub parse: ParseFn,
}

pub const PARSERS: &[TracerouteParser] = &[
    TracerouteParser {
        name: "traceroute_juniper",
        platforms: &[Platform::Juniper],
        parse: text::parse_unix,
    },
    TracerouteParser {
        name: "traceroute_arista",
        platforms: &[Platform::AristaEos],
        parse: text::parse_unix,
    },
    TracerouteParser {
        name: "traceroute_frr",
        platforms: &[Platform::Frr, Platform::FrrAgent],
        parse: text::parse_unix,
    },
    TracerouteParser {
        name: "traceroute_huawei",
        platforms: &[Platform::Huawei],
        parse: text::parse_vrp,
    },
    TracerouteParser {
        name: "traceroute_mikrotik",
        platforms: &[Platform::MikrotikRouteros, Platform::MikrotikSwitchos],
        parse: mikrotik::parse,
    },
];

/// Fallback for platforms without a dedicated parser.
pub const GENERIC: TracerouteParser = TracerouteParser {
    name: "traceroute_generic",
    platforms: &[],
    parse: text::parse_generic,
};

impl TracerouteParser {
    pub fn for_platform(platform: Platform) -> &'static Self {
        PARSERS
            .iter()
            .find(|p| p.platforms.contains(&platform))
            .unwrap_or(&GENERIC)
    }

    /// Parse the joined outputs and keep them as `raw_output`.
    pub fn parse_all(
        &self,
        outputs: &[String],
        target: &str,
        source: &str,
    ) -> Result<TracerouteResult, CoreError> {
        let combined = outputs.join("\n");
        let mut result = (self.parse)(&combined, target, source)?;
        debug!(parser = self.name, hops = result.hop_count(), "parsed traceroute output");
        result.raw_output = Some(combined);
        Ok(result)
    }
}
