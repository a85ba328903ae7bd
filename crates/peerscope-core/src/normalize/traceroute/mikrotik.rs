// RouterOS `/tool traceroute` tables.
//
// RouterOS redraws the whole table as probes come in, so the output holds
// several snapshots; only the last one is read. v7 prints a `Columns:` banner
// and numbered rows, v6 prints unnumbered rows that may repeat an address
// with growing SENT counts.

use indexmap::IndexMap;

use crate::error::CoreError;
use crate::model::{TracerouteHop, TracerouteResult};

const PAGER: &str = "-- [Q quit|C-z pause]";

fn is_table_header(line: &str) -> bool {
    let starts_with_digit = line.trim_start().starts_with(|c: char| c.is_ascii_digit());
    (line.contains("Columns:") && line.contains("ADDRESS"))
        || (line.contains("ADDRESS")
            && line.contains("LOSS")
            && line.contains("SENT")
            && !starts_with_digit)
}

fn parse_rtt(raw: &str) -> Option<f64> {
    match raw {
        "timeout" | "-" | "0ms" => None,
        other => other.trim_end_matches("ms").parse().ok(),
    }
}

fn parse_loss(raw: &str) -> Option<u32> {
    raw.strip_suffix('%')?.parse().ok()
}

/// Loss, sent and the four RTT columns (`LAST AVG BEST WORST`).
#[derive(Debug, Default)]
struct Stats<'a> {
    loss: Option<u32>,
    sent: Option<u32>,
    last: Option<&'a str>,
    avg: Option<&'a str>,
    best: Option<&'a str>,
    worst: Option<&'a str>,
}

impl<'a> Stats<'a> {
    /// Read `LOSS SENT [LAST [AVG BEST WORST]]` starting at `parts[0]`.
    fn read(parts: &[&'a str]) -> Option<Self> {
        let loss = parse_loss(parts.first()?)?;
        let sent = parts.get(1)?.parse().ok()?;
        Some(Self {
            loss: Some(loss),
            sent: Some(sent),
            last: parts.get(2).copied(),
            avg: parts.get(3).copied(),
            best: parts.get(4).copied(),
            worst: parts.get(5).copied().or_else(|| parts.get(4).copied()),
        })
    }

    fn into_hop(self, hop_number: u32, address: Option<&str>) -> TracerouteHop {
        let best = self.best.and_then(parse_rtt);
        let avg = self.avg.and_then(parse_rtt);
        let worst = self.worst.and_then(parse_rtt);
        let mut hop = TracerouteHop {
            hop_number,
            rtt1: best,
            rtt2: avg,
            rtt3: worst,
            loss_pct: self.loss,
            sent_count: self.sent,
            last_rtt: self.last.and_then(parse_rtt),
            best_rtt: best,
            worst_rtt: worst,
            ..TracerouteHop::default()
        };
        if let Some(address) = address {
            hop.set_address(address);
        }
        hop
    }
}

/// Indented `LOSS SENT timeout` row continuing the hop sequence.
fn continuation_timeout(raw: &str, parts: &[&str]) -> bool {
    raw.starts_with([' ', '\t'])
        && raw.contains('%')
        && (raw.contains("timeout") || raw.contains("0ms"))
        && parts.first().is_some_and(|p| p.ends_with('%'))
}

fn parse_columnar<'a>(rows: impl Iterator<Item = &'a str>) -> Vec<TracerouteHop> {
    let mut hops = Vec::new();
    let mut next_hop = 1;
    for raw in rows {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        if continuation_timeout(raw, &parts) {
            if let Some(stats) = Stats::read(&parts) {
                hops.push(stats.into_hop(next_hop, None));
                next_hop += 1;
            }
            continue;
        }
        let Some(hop_number) = parts.first().and_then(|p| p.parse::<u32>().ok()) else {
            continue;
        };
        let hop = match parts.get(1) {
            Some(address) if parts.len() >= 8 && !address.ends_with('%') => {
                Stats::read(&parts[2..]).map(|s| s.into_hop(hop_number, Some(address)))
            }
            Some(loss) if parts.len() >= 3 && loss.ends_with('%') => {
                Stats::read(&parts[1..]).map(|s| {
                    let last_only = Stats {
                        avg: None,
                        best: None,
                        worst: None,
                        ..s
                    };
                    last_only.into_hop(hop_number, None)
                })
            }
            _ => None,
        };
        if let Some(hop) = hop {
            next_hop = next_hop.max(hop_number + 1);
            hops.push(hop);
        }
    }
    hops
}

/// v6 rows have no hop numbers and repeat addresses as probes accumulate;
/// keep each address's row with the highest SENT count, in first-seen order.
fn parse_legacy<'a>(rows: impl Iterator<Item = &'a str>) -> Vec<TracerouteHop> {
    let mut latest: IndexMap<String, TracerouteHop> = IndexMap::new();
    let mut position = 0u32;
    for raw in rows {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        let Some(first) = parts.first() else { continue };
        position += 1;

        let (key, hop) = if first.ends_with('%') {
            let Some(stats) = Stats::read(&parts) else { continue };
            (format!("timeout-{position}"), stats.into_hop(0, None))
        } else {
            if parts.len() < 6 {
                continue;
            }
            let Some(stats) = Stats::read(&parts[1..]) else { continue };
            ((*first).to_owned(), stats.into_hop(0, Some(first)))
        };

        match latest.get_mut(&key) {
            Some(existing) if hop.sent_count >= existing.sent_count => *existing = hop,
            Some(_) => {}
            None => {
                latest.insert(key, hop);
            }
        }
    }
    latest
        .into_values()
        .zip(1..)
        .map(|(hop, n)| TracerouteHop { hop_number: n, ..hop })
        .collect()
}

pub fn parse(text: &str, target: &str, source: &str) -> Result<TracerouteResult, CoreError> {
    let mut result = TracerouteResult::new(target, source);
    let lines: Vec<&str> = text.lines().collect();

    let Some(start) = lines.iter().rposition(|l| is_table_header(l)) else {
        return Ok(result);
    };
    let columnar = lines.get(start).is_some_and(|l| l.contains("Columns:"));

    let rows = lines
        .iter()
        .skip(start)
        .take_while(|l| !l.contains(PAGER))
        .filter(|l| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with('#') && !is_table_header(l)
        })
        .copied();

    result.hops = if columnar {
        parse_columnar(rows)
    } else {
        parse_legacy(rows)
    };
    result.trim_trailing_timeouts();
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const V7: &str = "Columns: ADDRESS, LOSS, SENT, LAST, AVG, BEST, WORST, STD-DEV
#  ADDRESS         LOSS  SENT  LAST   AVG  BEST  WORST  STD-DEV
1  10.0.0.41       0%       1  0.5ms  0.5  0.5   0.5          0
2  185.73.201.193  0%       1  0.4ms  0.4  0.4   0.4          0
-- [Q quit|C-z pause]
Columns: ADDRESS, LOSS, SENT, LAST, AVG, BEST, WORST, STD-DEV
#  ADDRESS         LOSS  SENT  LAST   AVG  BEST  WORST  STD-DEV
1  10.0.0.41       0%       3  0.6ms  0.5  0.4   0.6        0.1
2  185.73.201.193  0%       3  0.4ms  0.4  0.3   0.5        0.1
3                  100%     3  timeout
4  1.1.1.1         0%       3  12.1ms 12   11.8  12.3       0.2
-- [Q quit|C-z pause]
";

    #[test]
    fn reads_the_last_columnar_table() {
        let result = parse(V7, "1.1.1.1", "edge1").unwrap();
        assert_eq!(result.hop_count(), 4);

        let first = &result.hops[0];
        assert_eq!(first.ip_address.as_deref(), Some("10.0.0.41"));
        assert_eq!(first.sent_count, Some(3));
        assert_eq!(first.rtt1, Some(0.4));
        assert_eq!(first.rtt2, Some(0.5));
        assert_eq!(first.rtt3, Some(0.6));
        assert_eq!(first.last_rtt, Some(0.6));

        let timeout = &result.hops[2];
        assert!(timeout.is_timeout());
        assert_eq!(timeout.loss_pct, Some(100));
        assert_eq!(timeout.hop_number, 3);

        assert_eq!(result.hops[3].hop_number, 4);
        assert_eq!(result.hops[3].best_rtt, Some(11.8));
    }

    #[test]
    fn legacy_rows_keep_final_stats() {
        let text = "ADDRESS                          LOSS SENT    LAST     AVG    BEST   WORST STD-DEV STATUS
196.60.8.198                       0%    1  17.1ms    17.1    17.1    17.1       0
196.60.8.198                       0%    3  17.3ms    17.2    17.1    17.3     0.1
2001:db8:1234:5678:...             0%    3  20.1ms    20.0    19.9    20.1     0.1
                                 100%    3 timeout
1.1.1.1                            0%    3  21.0ms    21.0    20.9    21.1     0.1
";
        let result = parse(text, "1.1.1.1", "edge1").unwrap();
        assert_eq!(result.hop_count(), 4);
        assert_eq!(result.hops[0].hop_number, 1);
        assert_eq!(result.hops[0].sent_count, Some(3));
        assert_eq!(result.hops[0].rtt3, Some(17.3));

        let truncated = &result.hops[1];
        assert_eq!(truncated.ip_address, None);
        assert_eq!(truncated.display_ip.as_deref(), Some("2001:db8:1234:5678:..."));

        assert!(result.hops[2].is_timeout());
        assert_eq!(result.hops[3].ip_address.as_deref(), Some("1.1.1.1"));
        assert_eq!(result.hops[3].hop_number, 4);
    }

    #[test]
    fn no_table_is_an_empty_result() {
        let result = parse("[admin@edge] > /tool traceroute 1.1.1.1", "1.1.1.1", "").unwrap();
        assert_eq!(result.hop_count(), 0);
    }
}
