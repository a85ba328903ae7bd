// Bulk whois lookups against bgp.tools (or a compatible server).
//
// One TCP connection per batch: `begin`, `verbose`, one resource per line,
// `end`. The server answers with one `|`-separated row per resource and
// closes the connection.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::Error;

/// One row of a verbose address lookup.
///
/// `AS | IP | BGP Prefix | CC | Registry | Allocated | AS Name`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoisRecord {
    pub asn: String,
    pub ip: String,
    pub prefix: String,
    pub country: String,
    pub registry: String,
    pub allocated: String,
    pub org: String,
}

/// One row of a verbose ASN lookup.
///
/// `AS | CC | Registry | Allocated | AS Name`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsnRecord {
    pub asn: String,
    pub country: String,
    pub registry: String,
    pub allocated: String,
    pub name: String,
}

fn columns(line: &str) -> Vec<&str> {
    line.split('|').map(str::trim).collect()
}

/// A column is unset when bgp.tools has nothing for it.
fn known(value: &str) -> bool {
    !value.is_empty() && !value.eq_ignore_ascii_case("na") && value != "-"
}

fn is_asn(column: &str) -> bool {
    !column.is_empty() && column.chars().all(|c| c.is_ascii_digit())
}

/// Parse address rows, skipping the header and anything malformed.
pub fn parse_addresses(output: &str) -> Vec<WhoisRecord> {
    output
        .lines()
        .map(columns)
        .filter(|cols| cols.len() == 7 && is_asn(cols[0]))
        .map(|cols| WhoisRecord {
            asn: cols[0].to_owned(),
            ip: cols[1].to_owned(),
            prefix: cols[2].to_owned(),
            country: cols[3].to_owned(),
            registry: cols[4].to_owned(),
            allocated: cols[5].to_owned(),
            org: cols[6].to_owned(),
        })
        .collect()
}

/// Parse ASN rows, skipping the header and anything malformed.
pub fn parse_asns(output: &str) -> Vec<AsnRecord> {
    output
        .lines()
        .map(columns)
        .filter(|cols| cols.len() == 5 && is_asn(cols[0]))
        .map(|cols| AsnRecord {
            asn: cols[0].to_owned(),
            country: cols[1].to_owned(),
            registry: cols[2].to_owned(),
            allocated: cols[3].to_owned(),
            name: cols[4].to_owned(),
        })
        .collect()
}

impl WhoisRecord {
    /// ASN as reported, `None` for unrouted space (`AS 0`).
    pub fn routed_asn(&self) -> Option<&str> {
        (known(&self.asn) && self.asn != "0").then_some(self.asn.as_str())
    }

    pub fn known_org(&self) -> Option<&str> {
        known(&self.org).then_some(self.org.as_str())
    }

    pub fn known_prefix(&self) -> Option<&str> {
        known(&self.prefix).then_some(self.prefix.as_str())
    }

    pub fn known_country(&self) -> Option<&str> {
        known(&self.country).then_some(self.country.as_str())
    }
}

pub struct WhoisClient {
    server: String,
    timeout: Duration,
}

impl WhoisClient {
    /// `server` is `host:port`, e.g. `bgp.tools:43`.
    pub fn new(server: impl Into<String>, timeout: Duration) -> Self {
        Self {
            server: server.into(),
            timeout,
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Look up addresses in one batch.
    pub async fn lookup_addresses(&self, addresses: &[String]) -> Result<Vec<WhoisRecord>, Error> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let output = self.bulk(addresses.iter().map(String::as_str)).await?;
        Ok(parse_addresses(&output))
    }

    /// Look up ASNs (bare numbers) in one batch.
    pub async fn lookup_asns(&self, asns: &[String]) -> Result<Vec<AsnRecord>, Error> {
        if asns.is_empty() {
            return Ok(Vec::new());
        }
        let resources: Vec<String> = asns.iter().map(|a| format!("AS{a}")).collect();
        let output = self.bulk(resources.iter().map(String::as_str)).await?;
        Ok(parse_asns(&output))
    }

    async fn bulk<'a>(&self, resources: impl Iterator<Item = &'a str>) -> Result<String, Error> {
        let mut query = String::from("begin\nverbose\n");
        for resource in resources {
            query.push_str(resource);
            query.push('\n');
        }
        query.push_str("end\n");

        let exchange = async {
            debug!(server = %self.server, "opening whois connection");
            let mut stream = TcpStream::connect(&self.server)
                .await
                .map_err(|e| Error::Connection {
                    message: format!("{}: {e}", self.server),
                })?;
            stream.write_all(query.as_bytes()).await?;
            stream.shutdown().await?;

            let mut response = Vec::new();
            stream.read_to_end(&mut response).await?;
            debug!(server = %self.server, bytes = response.len(), "whois response");
            Ok::<_, Error>(String::from_utf8_lossy(&response).into_owned())
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESSES: &str = "\
AS      | IP               | BGP Prefix          | CC | Registry | Allocated  | AS Name
13335   | 1.1.1.1          | 1.1.1.0/24          | US | ARIN     | 2010-07-14 | Cloudflare, Inc.
0       | 10.0.0.1         | NA                  | ZZ | NA       | NA         | NA
";

    #[test]
    fn parses_address_rows_and_skips_the_header() {
        let records = parse_addresses(ADDRESSES);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].asn, "13335");
        assert_eq!(records[0].prefix, "1.1.1.0/24");
        assert_eq!(records[0].org, "Cloudflare, Inc.");
        assert_eq!(records[0].routed_asn(), Some("13335"));
    }

    #[test]
    fn unrouted_rows_have_no_known_fields() {
        let records = parse_addresses(ADDRESSES);
        let unrouted = &records[1];
        assert_eq!(unrouted.routed_asn(), None);
        assert_eq!(unrouted.known_org(), None);
        assert_eq!(unrouted.known_prefix(), None);
    }

    #[test]
    fn parses_asn_rows() {
        let output = "\
AS      | CC | Registry | Allocated  | AS Name
174     | US | ARIN     | 1991-11-25 | Cogent Communications
garbage line
";
        let records = parse_asns(output);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].asn, "174");
        assert_eq!(records[0].name, "Cogent Communications");
    }
}
