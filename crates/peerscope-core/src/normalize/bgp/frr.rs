// FRRouting `show bgp ... json`, as returned by vtysh or the agent.

use serde::Deserialize;

use crate::error::CoreError;
use crate::model::{BgpRoute, BgpRouteTable, RpkiState, WinningWeight};
use crate::normalize::age_since;

const PARSER: &str = "frr";

// ── Response model ──

#[derive(Debug, Deserialize)]
struct Response {
    prefix: String,
    #[serde(default)]
    paths: Vec<Path>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Path {
    aspath: AsPath,
    #[serde(default)]
    aggregator_as: u32,
    #[serde(default)]
    aggregator_id: String,
    #[serde(default = "default_local_pref")]
    loc_prf: i64,
    #[serde(default)]
    med: i64,
    #[serde(default)]
    weight: i64,
    #[serde(default)]
    last_update: Option<Epoch>,
    #[serde(default)]
    bestpath: Option<BestPath>,
    #[serde(default)]
    community: Option<Communities>,
    #[serde(default)]
    nexthops: Vec<NextHop>,
    peer: Peer,
}

fn default_local_pref() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
struct AsPath {
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(default)]
    list: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct Epoch {
    epoch: f64,
}

#[derive(Debug, Deserialize)]
struct BestPath {
    #[serde(default)]
    overall: bool,
}

#[derive(Debug, Deserialize)]
struct Communities {
    #[serde(default)]
    list: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NextHop {
    ip: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Peer {
    peer_id: String,
}

impl Path {
    fn into_route(self, prefix: &str) -> BgpRoute {
        BgpRoute {
            prefix: prefix.to_owned(),
            active: self.bestpath.is_some_and(|b| b.overall),
            age: self.last_update.map_or(0, |u| age_since(u.epoch)),
            weight: self.weight,
            med: self.med,
            local_preference: self.loc_prf,
            as_path: self
                .aspath
                .segments
                .into_iter()
                .next()
                .map(|s| s.list)
                .unwrap_or_default(),
            communities: self.community.map(|c| c.list).unwrap_or_default(),
            next_hop: self
                .nexthops
                .into_iter()
                .next()
                .map(|n| n.ip)
                .unwrap_or_default(),
            source_as: self.aggregator_as,
            source_rid: self.aggregator_id,
            peer_rid: self.peer.peer_id,
            // FRR only reports origin validation when its RPKI module is loaded.
            rpki_state: RpkiState::Unverified,
            next_hop_asn: None,
            next_hop_org: None,
        }
    }
}

pub fn parse(output: &str) -> Result<BgpRouteTable, CoreError> {
    let response: Response = serde_json::from_str(output)
        .map_err(|e| CoreError::parsing(PARSER, format!("error parsing response data: {e}")))?;
    let prefix = response.prefix;
    let routes = response
        .paths
        .into_iter()
        .map(|path| path.into_route(&prefix))
        .collect();
    Ok(BgpRouteTable::new("default", routes, WinningWeight::High))
}
