// MikroTik RouterOS `/routing route print detail` (v7) and
// `/ip route print detail` (v6) key=value output.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;
use crate::model::{BgpRoute, BgpRouteTable, RpkiState, WinningWeight};

/// `key=value` or `key="quoted value"`; keys may carry dots and dashes.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z0-9_.-]+)=("[^"]*"|\S+)"#).expect("valid token regex")
});

/// Status flags opening a route entry, optionally preceded by its index.
static FLAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d+\s+)?([DXIAcmsroivmyH+b]+)\s+").expect("valid flags regex")
});

static ASN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,10}\b").expect("valid ASN regex"));

fn is_noise(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with('>') || line.starts_with("Flags:") || line.starts_with('[') || line.starts_with('#')
}

fn list(value: &str) -> Vec<String> {
    if value.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
        .collect()
}

fn rpki_state(value: &str) -> RpkiState {
    match value.trim().to_lowercase().as_str() {
        "invalid" => RpkiState::Invalid,
        "valid" => RpkiState::Valid,
        "unverified" => RpkiState::Unverified,
        _ => RpkiState::Unknown,
    }
}

fn parse_block(block: &[&str]) -> Option<BgpRoute> {
    let text = block.join(" ");
    if !text.contains("dst-address=") && !format!(" {text}").contains(" dst=") {
        return None;
    }

    let active = block
        .first()
        .and_then(|first| FLAGS.captures(first))
        .is_some_and(|c| c[1].contains('A'));

    let mut route = BgpRoute {
        prefix: String::new(),
        active,
        age: -1,
        weight: 20,
        med: 0,
        local_preference: 100,
        as_path: Vec::new(),
        communities: Vec::new(),
        next_hop: String::new(),
        source_as: 0,
        source_rid: String::new(),
        peer_rid: String::new(),
        rpki_state: RpkiState::Unknown,
        next_hop_asn: None,
        next_hop_org: None,
    };
    let mut large = Vec::new();
    let mut extended = Vec::new();

    for token in TOKEN.captures_iter(&text) {
        let key = &token[1];
        let value = token[2].trim_matches('"');
        match key {
            "dst-address" | "dst" => value.clone_into(&mut route.prefix),
            "gateway" | "nexthop" => {
                route.next_hop = value.split('%').next().unwrap_or_default().to_owned();
            }
            "distance" => route.weight = value.parse().unwrap_or(route.weight),
            ".as-path" | "as-path" | "bgp-as-path" if !value.eq_ignore_ascii_case("none") => {
                route.as_path = ASN
                    .find_iter(value)
                    .filter_map(|m| m.as_str().parse::<u32>().ok())
                    .filter(|asn| *asn > 0)
                    .collect();
            }
            ".med" | "med" | "bgp-med" => route.med = value.parse().unwrap_or(0),
            ".local-pref" | "local-pref" | "bgp-local-pref" => {
                route.local_preference = value.parse().unwrap_or(100);
            }
            ".communities" | "communities" | "bgp-communities" => route.communities = list(value),
            ".large-communities" | "large-communities" | "bgp-large-communities" => {
                large = list(value);
            }
            "bgp-ext-communities" => extended = list(value),
            "rpki" => route.rpki_state = rpki_state(value),
            _ => {}
        }
    }

    if route.prefix.is_empty() {
        return None;
    }
    route.communities.extend(large);
    route.communities.extend(extended);
    route.source_as = route.as_path.last().copied().unwrap_or(0);
    route.peer_rid.clone_from(&route.next_hop);
    Some(route)
}

pub fn parse(output: &str) -> Result<BgpRouteTable, CoreError> {
    let mut routes = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in output.lines().filter(|l| !is_noise(l)) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            routes.extend(parse_block(&block));
            block.clear();
            continue;
        }
        if FLAGS.is_match(trimmed) && !block.is_empty() {
            routes.extend(parse_block(&block));
            block.clear();
        }
        block.push(trimmed);
    }
    routes.extend(parse_block(&block));

    Ok(BgpRouteTable::new("default", routes, WinningWeight::Low))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const V7: &str = r#"[admin@edge] > /routing route print detail where dst-address=1.1.1.0/24
Flags: X - disabled, F - filtered, U - unreachable, A - active;
c - connect, s - static, r - rip, b - bgp, o - ospf, d - dhcp, v - vpn, m - modem, y - copy;
H - hw-offloaded; + - ecmp, B - blackhole
 Ab   afi=ip4 contribution=active dst-address=1.1.1.0/24 routing-table=main
       gateway=192.0.2.1%vlan-2000 immediate-gw=192.0.2.1%vlan-2000 distance=20 scope=40
       target-scope=10 belongs-to="bgp-IP-192.0.2.1"
       bgp.peer-cache-id=*4001 .as-path="174,13335" .communities=174:21000,65000:1
       .local-pref=150 .med=0 .large-communities=65000:1:1 rpki=valid
 b    afi=ip4 contribution=candidate dst-address=1.1.1.0/24 routing-table=main
       gateway=192.0.2.2 distance=20 scope=40 target-scope=10
       .as-path="3356,13335" .med=10
"#;

    #[test]
    fn parses_v7_detail() {
        let table = parse(V7).unwrap();
        assert_eq!(table.count, 2);
        assert_eq!(table.winning_weight, WinningWeight::Low);

        let best = &table.routes[0];
        assert!(best.active);
        assert_eq!(best.prefix, "1.1.1.0/24");
        assert_eq!(best.next_hop, "192.0.2.1");
        assert_eq!(best.peer_rid, "192.0.2.1");
        assert_eq!(best.as_path, vec![174, 13335]);
        assert_eq!(best.source_as, 13335);
        assert_eq!(best.local_preference, 150);
        assert_eq!(best.communities, vec!["174:21000", "65000:1", "65000:1:1"]);
        assert_eq!(best.rpki_state, RpkiState::Valid);
        assert_eq!(best.age, -1);

        let other = &table.routes[1];
        assert!(!other.active);
        assert_eq!(other.med, 10);
        assert_eq!(other.local_preference, 100);
        assert_eq!(other.rpki_state, RpkiState::Unknown);
    }

    #[test]
    fn v6_dst_key_and_blank_separators() {
        let output = "A  dst=10.0.0.0/8 gateway=192.0.2.1 bgp-as-path=\"65001\"\n\n   dst=10.0.0.0/8 gateway=192.0.2.2 distance=200\n";
        let table = parse(output).unwrap();
        assert_eq!(table.count, 2);
        assert!(table.routes[0].active);
        assert_eq!(table.routes[1].weight, 200);
    }

    #[test]
    fn blocks_without_destination_are_ignored() {
        assert!(parse("foo=bar\nbaz=qux\n").unwrap().is_empty());
    }
}
