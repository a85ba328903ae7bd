// Huawei VRP `display bgp routing-table <prefix>` text output.
//
// Paths are printed as blocks separated by blank lines. The
// "BGP routing table entry information of" header appears once per prefix,
// so later path blocks inherit the prefix of the last header seen.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;
use crate::model::{BgpRoute, BgpRouteTable, RpkiState, WinningWeight};
use crate::normalize::asn_tokens;

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)([dhms])").expect("valid duration regex"));

/// `84d11h53m07s` as seconds, saturating on absurd values.
fn duration_secs(raw: &str) -> i64 {
    DURATION
        .captures_iter(raw)
        .filter_map(|c| {
            let n: i64 = c[1].parse().ok()?;
            let unit = match &c[2] {
                "d" => 86_400,
                "h" => 3_600,
                "m" => 60,
                _ => 1,
            };
            Some(n.saturating_mul(unit))
        })
        .fold(0, i64::saturating_add)
}

/// `<65000:1>, <65000:2>` to a list; `none` is empty.
fn community_list(raw: &str) -> Vec<String> {
    if raw.trim().eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    raw.split(", ")
        .map(|c| c.trim().trim_start_matches('<').trim_end_matches('>').to_owned())
        .filter(|c| !c.is_empty())
        .collect()
}

#[derive(Debug, Default)]
struct PathBlock {
    prefix: Option<String>,
    from: String,
    duration: i64,
    original_next_hop: String,
    relay_next_hop: String,
    communities: Vec<String>,
    as_path: Vec<u32>,
    med: i64,
    local_preference: Option<i64>,
    preference: i64,
    best: bool,
    selected: bool,
    has_path: bool,
}

impl PathBlock {
    fn read_line(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix("BGP routing table entry information of") {
            self.prefix = Some(rest.trim().trim_end_matches(':').to_owned());
        } else if let Some(rest) = line.strip_prefix("From:") {
            self.from = rest.trim().split(" (").next().unwrap_or_default().to_owned();
            self.has_path = true;
        } else if let Some(rest) = line.strip_prefix("Route Duration:") {
            self.duration = duration_secs(rest);
        } else if let Some(rest) = line.strip_prefix("Original nexthop:") {
            rest.trim().clone_into(&mut self.original_next_hop);
        } else if let Some(rest) = line.strip_prefix("Relay IP Nexthop:") {
            rest.trim().clone_into(&mut self.relay_next_hop);
        } else if let Some(rest) = line
            .strip_prefix("Community:")
            .or_else(|| line.strip_prefix("Large-Community:"))
            .or_else(|| line.strip_prefix("Ext-Community:"))
        {
            self.communities.extend(community_list(rest));
        } else if line.starts_with("AS-path") {
            self.read_attributes(line);
        }
    }

    /// `AS-path 174 13335, origin igp, MED 0, localpref 100, pref-val 0, valid, external, best, select, pre 255`
    fn read_attributes(&mut self, line: &str) {
        self.has_path = true;
        for field in line.split(',').map(str::trim) {
            if let Some(path) = field.strip_prefix("AS-path") {
                self.as_path = asn_tokens(path);
            } else if let Some(med) = field.strip_prefix("MED ") {
                self.med = med.trim().parse().unwrap_or(0);
            } else if let Some(lp) = field.strip_prefix("localpref ") {
                self.local_preference = lp.trim().parse().ok();
            } else if let Some(pre) = field.strip_prefix("pre ") {
                self.preference = pre.trim().parse().unwrap_or(0);
            } else {
                match field {
                    "best" => self.best = true,
                    "select" => self.selected = true,
                    _ => {}
                }
            }
        }
    }

    fn into_route(self, prefix: String) -> BgpRoute {
        let next_hop = if self.original_next_hop.is_empty() {
            self.relay_next_hop
        } else {
            self.original_next_hop
        };
        BgpRoute {
            prefix,
            active: self.best || self.selected,
            age: self.duration,
            weight: self.preference,
            med: self.med,
            local_preference: self.local_preference.unwrap_or(100),
            source_as: self.as_path.last().copied().unwrap_or(0),
            as_path: self.as_path,
            communities: self.communities,
            next_hop,
            source_rid: String::new(),
            peer_rid: self.from,
            // VRP's "valid" flag is BGP path validity, not origin validation.
            rpki_state: RpkiState::Unverified,
            next_hop_asn: None,
            next_hop_org: None,
        }
    }
}

pub fn parse(output: &str) -> Result<BgpRouteTable, CoreError> {
    let mut routes = Vec::new();
    let mut prefix: Option<String> = None;

    for block in output.split("\n\n").flat_map(|b| b.split("\r\n\r\n")) {
        let mut path = PathBlock::default();
        for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
            path.read_line(line);
        }
        if let Some(p) = path.prefix.take() {
            prefix = Some(p);
        }
        if !path.has_path {
            continue;
        }
        if let Some(p) = &prefix {
            routes.push(path.into_route(p.clone()));
        }
    }

    Ok(BgpRouteTable::new("default", routes, WinningWeight::High))
}
