// ── BGP route parsers ──
//
// One parser per platform family. Each turns a single command's output into
// a `BgpRouteTable`; `BgpParser::parse_all` merges the tables of a
// multi-command query.

pub mod arista;
pub mod frr;
pub mod huawei;
pub mod juniper;
pub mod mikrotik;

use tracing::debug;

use crate::error::CoreError;
use crate::model::{BgpRouteTable, WinningWeight};
use crate::platform::Platform;

pub type ParseFn = fn(&str) -> Result<BgpRouteTable, CoreError>;

/// A vendor BGP parser and the platforms it serves.
#[derive(Debug, Clone, Copy)]
pub struct BgpParser {
    pub name: &'static str,
    pub platforms: &'static [Platform],
    pub winning_weight: WinningWeight,
    pub parse: ParseFn,
}

pub const PARSERS: &[BgpParser] = &[
    BgpParser {
        name: "bgp_route_juniper",
        platforms: &[Platform::Juniper],
        winning_weight: WinningWeight::Low,
        parse: juniper::parse,
    },
    BgpParser {
        name: "bgp_route_arista",
        platforms: &[Platform::AristaEos],
        winning_weight: WinningWeight::High,
        parse: arista::parse,
    },
    BgpParser {
        name: "bgp_route_frr",
        platforms: &[Platform::Frr, Platform::FrrAgent],
        winning_weight: WinningWeight::High,
        parse: frr::parse,
    },
    BgpParser {
        name: "bgp_route_huawei",
        platforms: &[Platform::Huawei],
        winning_weight: WinningWeight::High,
        parse: huawei::parse,
    },
    BgpParser {
        name: "bgp_route_mikrotik",
        platforms: &[Platform::MikrotikRouteros, Platform::MikrotikSwitchos],
        winning_weight: WinningWeight::Low,
        parse: mikrotik::parse,
    },
];

impl BgpParser {
    pub fn for_platform(platform: Platform) -> Option<&'static Self> {
        PARSERS.iter().find(|p| p.platforms.contains(&platform))
    }

    /// Parse every non-blank output and merge the results.
    pub fn parse_all(&self, outputs: &[String]) -> Result<BgpRouteTable, CoreError> {
        let mut merged: Option<BgpRouteTable> = None;
        for output in outputs.iter().filter(|o| !o.trim().is_empty()) {
            let table = (self.parse)(output)?;
            debug!(parser = self.name, routes = table.count, "parsed BGP output");
            match merged.as_mut() {
                Some(existing) => existing.merge(table),
                None => merged = Some(table),
            }
        }
        Ok(merged.unwrap_or_else(|| BgpRouteTable::empty("default", self.winning_weight)))
    }
}
