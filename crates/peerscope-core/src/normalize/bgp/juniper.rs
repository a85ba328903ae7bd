// Junos `show route ... detail | display xml`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::CoreError;
use crate::model::{BgpRoute, BgpRouteTable, RpkiState, WinningWeight};
use crate::normalize::{as_list, asn_tokens, int, text, xml};

const PARSER: &str = "juniper";

/// CLI banners such as `{master}` interleaved with the XML.
static BANNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\{.+\}\s*$").expect("valid banner regex"));

fn clean(output: &str) -> String {
    output
        .lines()
        .filter(|line| !line.trim().is_empty() && !BANNER.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn rpki_state(value: Option<&Value>) -> RpkiState {
    match text(value).as_deref() {
        Some("invalid") => RpkiState::Invalid,
        Some("valid") => RpkiState::Valid,
        Some("unknown") => RpkiState::Unknown,
        _ => RpkiState::Unverified,
    }
}

fn age(value: Option<&Value>) -> Result<i64, CoreError> {
    match value {
        Some(Value::Object(obj)) => Ok(int(obj.get("@junos:seconds")).unwrap_or(0)),
        Some(other) => int(Some(other))
            .ok_or_else(|| CoreError::parsing(PARSER, format!("unexpected age format {other}"))),
        None => Ok(0),
    }
}

/// `nh` for router next hops, `protocol-nh` for indirect ones.
fn next_hop(entry: &Value) -> String {
    let hops = as_list(entry.get("nh").or_else(|| entry.get("protocol-nh")));
    for hop in &hops {
        if hop.get("selected-next-hop").is_some() {
            return text(hop.get("to")).unwrap_or_default();
        }
        if let Some(to) = text(hop.get("to")) {
            return to;
        }
    }
    String::new()
}

fn route(prefix: &str, entry: &Value) -> Result<BgpRoute, CoreError> {
    let attrs = entry.get("bgp-path-attributes");
    let path = attrs
        .and_then(|a| a.get("attr-as-path-effective"))
        .and_then(|a| text(a.get("attr-value")))
        .or_else(|| text(entry.get("as-path")))
        .unwrap_or_default();
    let aggregator = attrs
        .and_then(|a| a.get("attr-aggregator"))
        .and_then(|a| a.get("attr-value"));

    let communities = entry
        .get("communities")
        .map(|c| as_list(c.get("community")))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|c| text(Some(c)))
        .collect();

    let required = |key: &str| {
        int(entry.get(key))
            .ok_or_else(|| CoreError::parsing(PARSER, format!("{key} was not found in the response")))
    };

    Ok(BgpRoute {
        prefix: prefix.to_owned(),
        active: text(entry.get("active-tag")).as_deref() == Some("*"),
        age: age(entry.get("age"))?,
        weight: required("preference")?,
        med: int(entry.get("metric")).unwrap_or(0),
        local_preference: required("local-preference")?,
        as_path: asn_tokens(&path),
        communities,
        next_hop: next_hop(entry),
        source_as: aggregator
            .and_then(|a| int(a.get("aggr-as-number")))
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
        source_rid: aggregator
            .and_then(|a| text(a.get("aggr-router-id")))
            .unwrap_or_default(),
        peer_rid: text(entry.get("peer-id")).unwrap_or_default(),
        rpki_state: rpki_state(entry.get("validation-state")),
        next_hop_asn: None,
        next_hop_org: None,
    })
}

/// `inet.0` is the default table; `blue.inet.0` belongs to VRF `blue`.
fn vrf_name(table_name: &str) -> String {
    let parts: Vec<&str> = table_name.split('.').collect();
    match parts.as_slice() {
        [_, _] | [] => "default".into(),
        [first, ..] => (*first).to_owned(),
    }
}

pub fn parse(output: &str) -> Result<BgpRouteTable, CoreError> {
    let doc = xml::to_json(&clean(output)).map_err(|e| CoreError::parsing(PARSER, e))?;

    let base = match doc.get("rpc-reply") {
        Some(reply) => {
            if let Some(message) = reply.get("xnm:error").and_then(|e| text(e.get("message"))) {
                return Err(CoreError::parsing(PARSER, format!("error from device: {message}")));
            }
            reply.get("route-information")
        }
        None => doc.get("route-information"),
    }
    .ok_or_else(|| CoreError::parsing(PARSER, "route-information was not found in the response"))?;

    let mut table = BgpRouteTable::empty("default", WinningWeight::Low);
    for route_table in as_list(base.get("route-table")) {
        let vrf = vrf_name(&text(route_table.get("table-name")).unwrap_or_default());
        let mut routes = Vec::new();
        for rt in as_list(route_table.get("rt")) {
            let destination = text(rt.get("rt-destination")).ok_or_else(|| {
                CoreError::parsing(PARSER, "rt-destination was not found in the response")
            })?;
            let prefix = match text(rt.get("rt-prefix-length")) {
                Some(len) if !destination.contains('/') => format!("{destination}/{len}"),
                _ => destination,
            };
            for entry in as_list(rt.get("rt-entry")) {
                routes.push(route(&prefix, entry)?);
            }
        }
        table.vrf = vrf;
        table.merge(BgpRouteTable::new("default", routes, WinningWeight::Low));
    }
    Ok(table)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
<rpc-reply xmlns:junos="http://xml.juniper.net/junos/21.4R0/junos">
    <route-information xmlns="http://xml.juniper.net/junos/21.4R0/junos-routing">
        <route-table>
            <table-name>inet.0</table-name>
            <destination-count>1</destination-count>
            <rt junos:style="detail">
                <rt-destination>1.1.1.0</rt-destination>
                <rt-prefix-length>24</rt-prefix-length>
                <rt-entry>
                    <active-tag>*</active-tag>
                    <protocol-name>BGP</protocol-name>
                    <preference>170</preference>
                    <age junos:seconds="86400">1d 00:00:00</age>
                    <local-preference>150</local-preference>
                    <metric>10</metric>
                    <peer-id>192.0.2.1</peer-id>
                    <nh>
                        <selected-next-hop/>
                        <to>192.0.2.254</to>
                    </nh>
                    <as-path>13335 I</as-path>
                    <validation-state>valid</validation-state>
                    <communities>
                        <community>13335:10</community>
                        <community>65000:1</community>
                    </communities>
                    <bgp-path-attributes>
                        <attr-as-path-effective>
                            <attr-value>174 13335 I</attr-value>
                        </attr-as-path-effective>
                        <attr-aggregator>
                            <attr-value>
                                <aggr-as-number>13335</aggr-as-number>
                                <aggr-router-id>10.0.0.1</aggr-router-id>
                            </attr-value>
                        </attr-aggregator>
                    </bgp-path-attributes>
                </rt-entry>
                <rt-entry>
                    <preference>170</preference>
                    <age>300</age>
                    <local-preference>100</local-preference>
                    <peer-id>192.0.2.2</peer-id>
                    <protocol-nh><to>198.51.100.1</to></protocol-nh>
                    <as-path>3356 13335 I</as-path>
                </rt-entry>
            </rt>
        </route-table>
    </route-information>
</rpc-reply>
{master}
"#;

    #[test]
    fn parses_detail_xml() {
        let table = parse(SAMPLE).unwrap();
        assert_eq!(table.vrf, "default");
        assert_eq!(table.count, 2);
        assert_eq!(table.winning_weight, WinningWeight::Low);

        let best = &table.routes[0];
        assert_eq!(best.prefix, "1.1.1.0/24");
        assert!(best.active);
        assert_eq!(best.age, 86400);
        assert_eq!(best.weight, 170);
        assert_eq!(best.med, 10);
        assert_eq!(best.local_preference, 150);
        assert_eq!(best.as_path, vec![174, 13335]);
        assert_eq!(best.communities, vec!["13335:10", "65000:1"]);
        assert_eq!(best.next_hop, "192.0.2.254");
        assert_eq!(best.source_as, 13335);
        assert_eq!(best.source_rid, "10.0.0.1");
        assert_eq!(best.peer_rid, "192.0.2.1");
        assert_eq!(best.rpki_state, RpkiState::Valid);

        let backup = &table.routes[1];
        assert!(!backup.active);
        assert_eq!(backup.age, 300);
        assert_eq!(backup.as_path, vec![3356, 13335]);
        assert_eq!(backup.next_hop, "198.51.100.1");
        assert_eq!(backup.rpki_state, RpkiState::Unverified);
    }

    #[test]
    fn reparsing_is_stable() {
        assert_eq!(parse(SAMPLE).unwrap(), parse(SAMPLE).unwrap());
    }

    #[test]
    fn device_errors_surface() {
        let reply = r"<rpc-reply><xnm:error><message>syntax error</message></xnm:error></rpc-reply>";
        let err = parse(reply).unwrap_err();
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn no_routes_is_an_empty_table() {
        let reply = r"<rpc-reply><route-information><route-table><table-name>inet.0</table-name></route-table></route-information></rpc-reply>";
        let table = parse(reply).unwrap();
        assert_eq!(table.count, 0);
    }

    #[test]
    fn vrf_from_table_name() {
        assert_eq!(vrf_name("inet.0"), "default");
        assert_eq!(vrf_name("blue.inet.0"), "blue");
    }
}
