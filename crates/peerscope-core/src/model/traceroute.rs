// ── Canonical traceroute model ──

use std::net::IpAddr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Probes per hop unless the device reports otherwise.
pub const DEFAULT_PROBES: u32 = 3;

const MAX_TRAILING_TIMEOUTS: usize = 3;
const CLEANUP_THRESHOLD: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TracerouteHop {
    pub hop_number: u32,
    /// Validated address. `None` for timeouts and truncated addresses.
    pub ip_address: Option<String>,
    /// Address as printed when it could not be validated.
    pub display_ip: Option<String>,
    pub hostname: Option<String>,
    pub rtt1: Option<f64>,
    pub rtt2: Option<f64>,
    pub rtt3: Option<f64>,
    pub loss_pct: Option<u32>,
    pub sent_count: Option<u32>,
    pub last_rtt: Option<f64>,
    pub best_rtt: Option<f64>,
    pub worst_rtt: Option<f64>,
    pub asn: Option<String>,
    pub org: Option<String>,
    pub prefix: Option<String>,
    pub country: Option<String>,
}

impl TracerouteHop {
    /// A hop where every probe timed out.
    pub fn timeout(hop_number: u32, sent: u32) -> Self {
        Self {
            hop_number,
            loss_pct: Some(100),
            sent_count: Some(sent),
            ..Self::default()
        }
    }

    /// A hop that answered `rtts.len()` out of `sent` probes.
    pub fn responsive(hop_number: u32, address: &str, rtts: &[f64], sent: u32) -> Self {
        let mut hop = Self {
            hop_number,
            ..Self::default()
        };
        hop.set_address(address);
        hop.set_rtts(rtts, sent);
        hop
    }

    /// Store `raw` as the hop address if it is a valid IP, otherwise as display text.
    pub fn set_address(&mut self, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.parse::<IpAddr>().is_ok() {
            self.ip_address = Some(trimmed.to_owned());
        } else if !trimmed.is_empty() {
            self.display_ip = Some(trimmed.to_owned());
        }
    }

    /// Fill the three RTT slots and the derived statistics.
    pub fn set_rtts(&mut self, rtts: &[f64], sent: u32) {
        let mut slots = rtts.iter().copied();
        self.rtt1 = slots.next();
        self.rtt2 = slots.next();
        self.rtt3 = slots.next();

        let received = u32::try_from(rtts.len()).unwrap_or(u32::MAX);
        let sent = sent.max(received).max(1);
        self.sent_count = Some(sent);
        self.loss_pct = Some((sent - received) * 100 / sent);
        self.last_rtt = rtts.last().copied();
        self.best_rtt = rtts.iter().copied().reduce(f64::min);
        self.worst_rtt = rtts.iter().copied().reduce(f64::max);
    }

    /// Mean of the RTT slots that have a value.
    pub fn avg_rtt(&self) -> Option<f64> {
        let values: Vec<f64> = [self.rtt1, self.rtt2, self.rtt3]
            .into_iter()
            .flatten()
            .collect();
        if values.is_empty() {
            return None;
        }
        let count = u32::try_from(values.len()).ok()?;
        Some(values.iter().sum::<f64>() / f64::from(count))
    }

    /// No address and no RTT at all.
    pub fn is_timeout(&self) -> bool {
        self.ip_address.is_none()
            && self.display_ip.is_none()
            && [self.rtt1, self.rtt2, self.rtt3].iter().all(Option::is_none)
    }

    /// The address to show users, validated or not.
    pub fn ip_display(&self) -> Option<&str> {
        self.display_ip.as_deref().or(self.ip_address.as_deref())
    }
}

/// Name and country for an ASN seen along the path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnOrganization {
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracerouteResult {
    pub target: String,
    pub source: String,
    pub hops: Vec<TracerouteHop>,
    pub max_hops: u32,
    pub packet_size: u32,
    pub raw_output: Option<String>,
    #[serde(default)]
    pub asn_organizations: IndexMap<String, AsnOrganization>,
}

impl TracerouteResult {
    pub fn new(target: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
            hops: Vec::new(),
            max_hops: 30,
            packet_size: 60,
            raw_output: None,
            asn_organizations: IndexMap::new(),
        }
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// Pick `max_hops` and `packet_size` out of a
    /// `traceroute to X (Y), 30 hops max, 60 byte packets` banner, or the
    /// VRP form `max hops: 30 ,packet length: 40`.
    pub fn apply_header(&mut self, line: &str) {
        let words: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|w| !w.is_empty())
            .collect();
        for pair in words.windows(2) {
            let [first, second] = pair else { continue };
            let (hops, size) = match (*first, *second) {
                (value, "hops") | ("hops:", value) => (value.parse().ok(), None),
                (value, "byte") | ("length:", value) => (None, value.parse().ok()),
                _ => (None, None),
            };
            if let Some(n) = hops {
                self.max_hops = n;
            }
            if let Some(n) = size {
                self.packet_size = n;
            }
        }
    }

    /// Drop runs of timeouts past the last responsive hop, keeping at most three.
    pub fn trim_trailing_timeouts(&mut self) {
        if self.hops.len() <= CLEANUP_THRESHOLD {
            return;
        }
        let Some(last_real) = self.hops.iter().rposition(|h| !h.is_timeout()) else {
            return;
        };
        self.hops.truncate(last_real + 1 + MAX_TRAILING_TIMEOUTS);
    }

    /// Append hops from another run of the same trace.
    pub fn merge(&mut self, other: Self) {
        self.hops.extend(other.hops);
        self.hops.sort_by_key(|h| h.hop_number);
        if let Some(raw) = other.raw_output {
            match &mut self.raw_output {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(&raw);
                }
                None => self.raw_output = Some(raw),
            }
        }
        self.asn_organizations.extend(other.asn_organizations);
    }

    /// Distinct ASNs in first-seen order.
    pub fn unique_asns(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for asn in self.hops.iter().filter_map(|h| h.asn.as_deref()) {
            if !seen.contains(&asn) {
                seen.push(asn);
            }
        }
        seen
    }

    /// `AS1 -> AS2 -> ...` with consecutive repeats collapsed.
    pub fn as_path_summary(&self) -> String {
        let mut path: Vec<&str> = Vec::new();
        for asn in self.hops.iter().filter_map(|h| h.asn.as_deref()) {
            if path.last() != Some(&asn) {
                path.push(asn);
            }
        }
        if path.is_empty() {
            "Unknown".into()
        } else {
            path.join(" -> ")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn responsive_hop_statistics() {
        let hop = TracerouteHop::responsive(4, "192.0.2.1", &[1.0, 3.0], 3);
        assert_eq!(hop.ip_address.as_deref(), Some("192.0.2.1"));
        assert_eq!(hop.loss_pct, Some(33));
        assert_eq!(hop.best_rtt, Some(1.0));
        assert_eq!(hop.worst_rtt, Some(3.0));
        assert_eq!(hop.avg_rtt(), Some(2.0));
        assert!(!hop.is_timeout());
    }

    #[test]
    fn truncated_address_kept_for_display_only() {
        let hop = TracerouteHop::responsive(2, "2001:db8:1234:5678:...", &[5.0], 1);
        assert_eq!(hop.ip_address, None);
        assert_eq!(hop.ip_display(), Some("2001:db8:1234:5678:..."));
    }

    #[test]
    fn header_sets_limits() {
        let mut result = TracerouteResult::new("1.1.1.1", "192.0.2.1");
        result.apply_header("traceroute to 1.1.1.1 (1.1.1.1), 64 hops max, 52 byte packets");
        assert_eq!(result.max_hops, 64);
        assert_eq!(result.packet_size, 52);

        let mut vrp = TracerouteResult::new("1.1.1.1", "");
        vrp.apply_header(" traceroute to  1.1.1.1(1.1.1.1), max hops: 20 ,packet length: 40,press CTRL_C to break");
        assert_eq!(vrp.max_hops, 20);
        assert_eq!(vrp.packet_size, 40);
    }

    #[test]
    fn trailing_timeouts_are_capped() {
        let mut result = TracerouteResult::new("1.1.1.1", "");
        result.hops.push(TracerouteHop::responsive(1, "10.0.0.1", &[1.0], 1));
        result.hops.push(TracerouteHop::responsive(2, "10.0.0.2", &[2.0], 1));
        for n in 3..=10 {
            result.hops.push(TracerouteHop::timeout(n, 3));
        }
        result.trim_trailing_timeouts();
        assert_eq!(result.hop_count(), 5);
        assert_eq!(result.hops.last().unwrap().hop_number, 5);
    }

    #[test]
    fn short_traces_are_left_alone() {
        let mut result = TracerouteResult::new("1.1.1.1", "");
        result.hops.push(TracerouteHop::responsive(1, "10.0.0.1", &[1.0], 1));
        for n in 2..=5 {
            result.hops.push(TracerouteHop::timeout(n, 3));
        }
        result.trim_trailing_timeouts();
        assert_eq!(result.hop_count(), 5);
    }

    #[test]
    fn as_path_summary_collapses_repeats() {
        let mut result = TracerouteResult::new("1.1.1.1", "");
        assert_eq!(result.as_path_summary(), "Unknown");
        for (n, asn) in [(1, Some("65000")), (2, Some("65000")), (3, None), (4, Some("13335"))] {
            let mut hop = TracerouteHop::responsive(n, "10.0.0.1", &[1.0], 1);
            hop.asn = asn.map(str::to_owned);
            result.hops.push(hop);
        }
        assert_eq!(result.as_path_summary(), "65000 -> 13335");
        assert_eq!(result.unique_asns(), vec!["65000", "13335"]);
    }
}
