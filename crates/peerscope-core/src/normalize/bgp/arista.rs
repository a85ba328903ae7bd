// Arista EOS `show ip bgp ... detail | json`.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::CoreError;
use crate::model::{BgpRoute, BgpRouteTable, RpkiState, WinningWeight};
use crate::normalize::{age_since, asn_tokens};

const PARSER: &str = "arista_eos";

// ── Response model ──

#[derive(Debug, Deserialize)]
struct Response {
    vrfs: IndexMap<String, Vrf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Vrf {
    #[serde(default)]
    vrf: Option<String>,
    #[serde(default)]
    bgp_route_entries: IndexMap<String, RouteEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteEntry {
    #[serde(default)]
    bgp_route_paths: Vec<RoutePath>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutePath {
    #[serde(default)]
    as_path_entry: AsPathEntry,
    #[serde(default)]
    med: i64,
    local_preference: i64,
    #[serde(default)]
    weight: i64,
    peer_entry: PeerEntry,
    #[serde(default)]
    timestamp: Option<f64>,
    next_hop: String,
    route_type: RouteType,
    /// Absent for as-path and community lookups.
    #[serde(default)]
    route_detail: Option<RouteDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AsPathEntry {
    #[serde(default)]
    as_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeerEntry {
    peer_router_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteType {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    origin_validity: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteDetail {
    #[serde(default)]
    community_list: Vec<String>,
}

fn rpki_state(validity: Option<&str>) -> RpkiState {
    match validity {
        Some("invalid") => RpkiState::Invalid,
        Some("valid") => RpkiState::Valid,
        Some("notFound") => RpkiState::Unknown,
        _ => RpkiState::Unverified,
    }
}

impl RoutePath {
    fn into_route(self, prefix: &str) -> BgpRoute {
        let as_path = asn_tokens(&self.as_path_entry.as_path);
        BgpRoute {
            prefix: prefix.to_owned(),
            active: self.route_type.active,
            age: self.timestamp.map_or(0, age_since),
            weight: self.weight,
            med: self.med,
            local_preference: self.local_preference,
            source_as: as_path.first().copied().unwrap_or(0),
            as_path,
            communities: self.route_detail.map(|d| d.community_list).unwrap_or_default(),
            next_hop: self.next_hop,
            source_rid: self.peer_entry.peer_router_id.clone(),
            peer_rid: self.peer_entry.peer_router_id,
            rpki_state: rpki_state(self.route_type.origin_validity.as_deref()),
            next_hop_asn: None,
            next_hop_org: None,
        }
    }
}

pub fn parse(output: &str) -> Result<BgpRouteTable, CoreError> {
    let response: Response = serde_json::from_str(output)
        .map_err(|e| CoreError::parsing(PARSER, format!("error parsing response data: {e}")))?;

    let (key, vrf) = response
        .vrfs
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::parsing(PARSER, "vrfs was not found in the response"))?;

    let routes = vrf
        .bgp_route_entries
        .into_iter()
        .flat_map(|(prefix, entry)| {
            entry
                .bgp_route_paths
                .into_iter()
                .map(move |path| path.into_route(&prefix))
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(BgpRouteTable::new(
        vrf.vrf.unwrap_or(key),
        routes,
        WinningWeight::High,
    ))
}
