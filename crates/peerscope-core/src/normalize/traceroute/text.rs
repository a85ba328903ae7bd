// Line-oriented traceroute output: traceroute(8) style (Junos, EOS, FRR),
// VRP `tracert`, and IOS/generic fallbacks.
//
// A hop line is `<hop number>` followed by a sequence of probe tokens:
// `*` for a lost probe, `name (addr)` or a bare address switching the
// responder, `<MPLS:...>` label stacks, and `N ms`/`N msec` round-trip times.
// Reading the tokens left to right covers plain hops, partial timeouts,
// multipath hops and MPLS-labelled hops with one grammar. Lines without a hop
// number that name a responder continue the previous hop.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;
use crate::model::{TracerouteHop, TracerouteResult};

static HOP_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+(.*)$").expect("valid hop line regex"));

static PROBE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?P<lost>\*)
        | <[^>]*>
        | (?P<rtt>\d+(?:\.\d+)?)\s*(?:msec|ms)\b
        | (?P<host>[^\s()]+)\s+\((?P<addr>[^)]*)\)
        | (?P<bare>\S+)
        ",
    )
    .expect("valid probe token regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct Responder {
    name: Option<String>,
    address: Option<String>,
}

/// Probe tokens collected for one hop.
#[derive(Debug, Default)]
struct Probes {
    responders: Vec<Responder>,
    rtts: Vec<f64>,
    lost: u32,
}

fn is_ip(raw: &str) -> bool {
    raw.parse::<IpAddr>().is_ok()
}

impl Probes {
    /// Read tokens from `rest`. The first bare token of a numbered hop line is
    /// its responder even when it is a name rather than an address.
    fn read(&mut self, rest: &str, numbered: bool) {
        let mut first = numbered;
        for token in PROBE_TOKEN.captures_iter(rest) {
            if token.name("lost").is_some() {
                self.lost += 1;
            } else if let Some(rtt) = token.name("rtt") {
                if let Ok(value) = rtt.as_str().parse() {
                    self.rtts.push(value);
                }
            } else if let (Some(host), Some(addr)) = (token.name("host"), token.name("addr")) {
                if is_ip(addr.as_str().trim()) {
                    self.responders.push(Responder {
                        name: Some(host.as_str().to_owned()),
                        address: Some(addr.as_str().trim().to_owned()),
                    });
                }
            } else if let Some(bare) = token.name("bare") {
                let bare = bare.as_str();
                if is_ip(bare) {
                    self.responders.push(Responder {
                        name: None,
                        address: Some(bare.to_owned()),
                    });
                } else if first && self.rtts.is_empty() && self.responders.is_empty() {
                    self.responders.push(Responder {
                        name: Some(bare.to_owned()),
                        address: None,
                    });
                }
            }
            first = false;
        }
    }

    fn names_responder(&self) -> bool {
        self.responders.iter().any(|r| r.address.is_some())
    }

    fn into_hop(self, hop_number: u32) -> TracerouteHop {
        if self.rtts.is_empty() && self.responders.is_empty() {
            return TracerouteHop::timeout(hop_number, self.lost.max(1));
        }

        let received = u32::try_from(self.rtts.len()).unwrap_or(u32::MAX);
        let mut hop = TracerouteHop {
            hop_number,
            ..TracerouteHop::default()
        };
        hop.set_rtts(&self.rtts, received.saturating_add(self.lost));

        let Some(first) = self.responders.first() else {
            return hop;
        };
        if let Some(address) = &first.address {
            hop.set_address(address);
        }
        hop.hostname = if self.responders.len() > 1 {
            let mut labels: Vec<&str> = Vec::new();
            for r in &self.responders {
                let label = r.name.as_deref().or(r.address.as_deref()).unwrap_or_default();
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
            Some(labels.join(" / "))
        } else {
            first
                .name
                .clone()
                .filter(|name| first.address.as_ref() != Some(name))
        };
        hop
    }
}

/// Parse hop lines, skipping any line `is_header` claims. Header lines are
/// also offered to `TracerouteResult::apply_header`.
fn parse_lines(
    text: &str,
    target: &str,
    source: &str,
    is_header: fn(&str) -> bool,
) -> TracerouteResult {
    let mut result = TracerouteResult::new(target, source);
    let mut current: Option<(u32, Probes)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_header(trimmed) {
            result.apply_header(trimmed);
            continue;
        }

        let numbered = HOP_LINE
            .captures(trimmed)
            .and_then(|c| Some((c[1].parse::<u32>().ok()?, c.get(2)?.as_str())));

        match numbered {
            Some((hop_number, rest)) => {
                if let Some((n, probes)) = current.take() {
                    result.hops.push(probes.into_hop(n));
                }
                let mut probes = Probes::default();
                probes.read(rest, true);
                current = Some((hop_number, probes));
            }
            None => {
                let mut extra = Probes::default();
                extra.read(trimmed, false);
                if let Some((_, probes)) = current.as_mut().filter(|_| extra.names_responder()) {
                    probes.responders.extend(extra.responders);
                    probes.rtts.extend(extra.rtts);
                    probes.lost += extra.lost;
                }
            }
        }
    }
    if let Some((n, probes)) = current {
        result.hops.push(probes.into_hop(n));
    }

    result.trim_trailing_timeouts();
    result
}

fn contains_any(line: &str, needles: &[&str]) -> bool {
    let lower = line.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

fn unix_header(line: &str) -> bool {
    contains_any(
        line,
        &["traceroute to", "traceroute6 to", "hops max", "byte packets", "mpls label="],
    )
}

fn vrp_header(line: &str) -> bool {
    contains_any(line, &["traceroute to", "max hops", "press ctrl_c"])
}

fn generic_header(line: &str) -> bool {
    contains_any(
        line,
        &["traceroute", "tracing the route", "escape sequence", "vrf info"],
    )
}

/// Junos, EOS and FRR `traceroute` output.
pub fn parse_unix(text: &str, target: &str, source: &str) -> Result<TracerouteResult, CoreError> {
    Ok(parse_lines(text, target, source, unix_header))
}

/// Huawei VRP `tracert` output: one probe per line by default.
pub fn parse_vrp(text: &str, target: &str, source: &str) -> Result<TracerouteResult, CoreError> {
    Ok(parse_lines(text, target, source, vrp_header))
}

/// Cisco IOS and anything else numbering its hops.
pub fn parse_generic(
    text: &str,
    target: &str,
    source: &str,
) -> Result<TracerouteResult, CoreError> {
    Ok(parse_lines(text, target, source, generic_header))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unix(text: &str) -> TracerouteResult {
        parse_unix(text, "1.1.1.1", "edge1").unwrap()
    }

    #[test]
    fn plain_hop() {
        let result = unix(" 1  er03 (102.209.241.6)  0.285 ms  0.177 ms  0.137 ms");
        let hop = &result.hops[0];
        assert_eq!(hop.hop_number, 1);
        assert_eq!(hop.ip_address.as_deref(), Some("102.209.241.6"));
        assert_eq!(hop.hostname.as_deref(), Some("er03"));
        assert_eq!(hop.rtt1, Some(0.285));
        assert_eq!(hop.rtt2, Some(0.177));
        assert_eq!(hop.rtt3, Some(0.137));
        assert_eq!(hop.loss_pct, Some(0));
        assert_eq!(hop.sent_count, Some(3));
    }

    #[test]
    fn header_and_timeouts() {
        let text = "traceroute to 1.1.1.1 (1.1.1.1), 30 hops max, 52 byte packets
 1  10.0.0.1 (10.0.0.1)  0.5 ms  0.4 ms  0.4 ms
 2  * * *
 3  * * 2001:978:3::12e (2001:978:3::12e)  200.936 ms
 4  * 130.117.15.146 (130.117.15.146)  162.503 ms  162.773 ms
 5  80.231.196.36 (80.231.196.36)  328.264 ms  328.938 ms *";
        let result = unix(text);
        assert_eq!(result.max_hops, 30);
        assert_eq!(result.packet_size, 52);
        assert_eq!(result.hop_count(), 5);

        let timeout = &result.hops[1];
        assert!(timeout.is_timeout());
        assert_eq!(timeout.loss_pct, Some(100));
        assert_eq!(timeout.sent_count, Some(3));

        assert_eq!(result.hops[2].loss_pct, Some(66));
        assert_eq!(result.hops[2].ip_address.as_deref(), Some("2001:978:3::12e"));
        assert_eq!(result.hops[2].hostname, None);
        assert_eq!(result.hops[3].loss_pct, Some(33));
        assert_eq!(result.hops[4].loss_pct, Some(33));
        assert_eq!(result.hops[4].rtt3, None);
    }

    #[test]
    fn multipath_hop_names_every_responder() {
        let result = unix(
            " 3  197.157.77.179 (197.157.77.179)  169.860 ms 41.78.188.48 (41.78.188.48)  185.519 ms  1006.603 ms",
        );
        let hop = &result.hops[0];
        assert_eq!(hop.ip_address.as_deref(), Some("197.157.77.179"));
        assert_eq!(hop.hostname.as_deref(), Some("197.157.77.179 / 41.78.188.48"));
        assert_eq!(hop.rtt3, Some(1006.603));
        assert_eq!(hop.loss_pct, Some(0));
    }

    #[test]
    fn mpls_labels_are_ignored() {
        let text = " 2  41.78.188.48 (41.78.188.48) <MPLS:L=116443,E=0,S=1,T=1>  1653.906 ms  12.1 ms
     MPLS Label=299856 CoS=0 TTL=1 S=1";
        let hop = &unix(text).hops[0];
        assert_eq!(hop.ip_address.as_deref(), Some("41.78.188.48"));
        assert_eq!(hop.rtt1, Some(1653.906));
        assert_eq!(hop.rtt2, Some(12.1));
    }

    #[test]
    fn continuation_lines_join_the_previous_hop() {
        let text = " 4  core1.example.net (192.0.2.1)  10.1 ms
    core2.example.net (192.0.2.2)  11.2 ms  11.0 ms";
        let result = unix(text);
        assert_eq!(result.hop_count(), 1);
        let hop = &result.hops[0];
        assert_eq!(hop.hostname.as_deref(), Some("core1.example.net / core2.example.net"));
        assert_eq!(hop.rtt3, Some(11.0));
    }

    #[test]
    fn trailing_timeouts_are_trimmed() {
        let mut text = String::from(" 1  10.0.0.1 (10.0.0.1)  1 ms\n");
        for n in 2..=12 {
            text.push_str(&format!("{n:2}  * * *\n"));
        }
        let result = unix(&text);
        assert_eq!(result.hop_count(), 4);
    }

    #[test]
    fn vrp_single_probe_lines() {
        let text = " traceroute to  1.1.1.1(1.1.1.1), max hops: 30 ,packet length: 40,press CTRL_C to break
 1 172.24.165.197 1 ms
 2 *
 3 1.1.1.1 12 ms";
        let result = parse_vrp(text, "1.1.1.1", "edge1").unwrap();
        assert_eq!(result.hop_count(), 3);
        assert_eq!(result.packet_size, 40);
        assert_eq!(result.hops[0].sent_count, Some(1));
        assert_eq!(result.hops[0].loss_pct, Some(0));
        assert_eq!(result.hops[1].sent_count, Some(1));
        assert_eq!(result.hops[1].loss_pct, Some(100));
    }

    #[test]
    fn ios_msec_lines() {
        let text = "Type escape sequence to abort.
Tracing the route to 1.1.1.1
VRF info: (vrf in name/id, vrf out name/id)
  1 10.0.0.1 4 msec 0 msec 4 msec
  2 core.example.net 8 msec 8 msec 12 msec
  3  *  *  *";
        let result = parse_generic(text, "1.1.1.1", "edge1").unwrap();
        assert_eq!(result.hop_count(), 3);
        assert_eq!(result.hops[0].ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(result.hops[0].rtt3, Some(4.0));
        assert_eq!(result.hops[1].ip_address, None);
        assert_eq!(result.hops[1].hostname.as_deref(), Some("core.example.net"));
        assert!(result.hops[2].is_timeout());
    }
}
